//! Storage layer for the order fulfillment backend.
//!
//! Three seams, each with an in-memory and a PostgreSQL implementation:
//! - [`CatalogStore`]: products and the atomically guarded stock counter
//! - [`OrderStore`]: order headers with their line items, written atomically
//! - [`UserDirectory`]: read access to registered users

pub mod catalog;
pub mod directory;
pub mod error;
pub mod memory;
pub mod order;
pub mod page;
pub mod postgres;
pub mod status;

pub use catalog::{CatalogStore, CatalogStoreExt, NewProduct, Product, ProductUpdate};
pub use directory::{NewAddress, User, UserDirectory};
pub use error::{Result, StoreError};
pub use memory::{InMemoryCatalogStore, InMemoryOrderStore, InMemoryUserDirectory};
pub use order::{NewOrder, Order, OrderLine, OrderStore};
pub use page::{Page, PageRequest};
pub use postgres::{
    PostgresCatalogStore, PostgresOrderStore, PostgresUserDirectory, run_migrations,
};
pub use status::OrderStatus;
