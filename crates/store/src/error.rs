use common::{OrderId, ProductId};
use thiserror::Error;

/// Errors that can occur when interacting with the catalog, order or user stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The product does not exist in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// A stock decrement asked for more units than are on hand.
    /// Stock is left untouched.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// A stock increment would exceed the largest storable quantity.
    /// Stock is left untouched.
    #[error("Stock overflow for product {product_id}: cannot add {amount}")]
    StockOverflow { product_id: ProductId, amount: u32 },

    /// An order was submitted with two lines for the same product.
    #[error("Duplicate line for product {product_id} in order {order_id}")]
    DuplicateLine {
        order_id: OrderId,
        product_id: ProductId,
    },

    /// Page number or page size was zero.
    #[error("Invalid page request: page {page}, page size {page_size}")]
    InvalidPage { page: u32, page_size: u32 },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
