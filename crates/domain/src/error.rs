//! Fulfillment error types.

use common::{OrderId, ProductId, UserId};
use store::StoreError;
use thiserror::Error;

/// Errors returned by the fulfillment service.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// The request carried no items.
    #[error("Order has no items")]
    EmptyOrder,

    /// An item quantity was zero, negative or too large to stock.
    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },

    /// The ordering user is not registered.
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// A requested product is not in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The advisory stock check failed; nothing was written.
    #[error(
        "Insufficient stock for {product_name} ({product_id}): requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        requested: u32,
        available: u32,
    },

    /// A line total or the order total is too large to represent.
    #[error("Order total overflows at product {product_id}")]
    AmountOverflow { product_id: ProductId },

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Stock ran out between the advisory check and the commit. The order
    /// was withdrawn and every committed decrement restored.
    #[error(
        "Stock conflict on product {product_id} while committing order {order_id}: requested {requested}, available {available}"
    )]
    StockCommitConflict {
        order_id: OrderId,
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The stock commit failed with a storage fault, or withdrawing the
    /// order afterwards did not complete. A faulted decrement may have been
    /// applied, so stock and orders must be reconciled by hand.
    #[error("Order {order_id} requires manual reconciliation: {reason}")]
    ReconciliationRequired { order_id: OrderId, reason: String },

    /// An error occurred in a store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl FulfillmentError {
    /// Short label used as the `reason` tag on rejection metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyOrder => "empty_order",
            Self::InvalidQuantity { .. } => "invalid_quantity",
            Self::UserNotFound(_) => "user_not_found",
            Self::ProductNotFound(_) => "product_not_found",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::AmountOverflow { .. } => "amount_overflow",
            Self::OrderNotFound(_) => "order_not_found",
            Self::StockCommitConflict { .. } => "stock_commit_conflict",
            Self::ReconciliationRequired { .. } => "reconciliation_required",
            Self::Store(_) => "store",
        }
    }
}

/// Convenience result type for fulfillment operations.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
