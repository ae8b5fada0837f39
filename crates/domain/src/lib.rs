//! Order fulfillment for the catalog and order stores.
//!
//! This crate provides:
//! - [`FulfillmentService`]: order creation with a stock commit and rollback,
//!   status updates, and order lookup
//! - [`OrderRequest`]: the inbound shape of an order
//! - Shipped notifications delivered in the background by a
//!   [`NotificationDispatcher`] with bounded retry

pub mod error;
pub mod notification;
pub mod request;
pub mod service;

pub use error::{FulfillmentError, Result};
pub use notification::{
    InMemoryNotificationGateway, LoggingGateway, NotificationDispatcher, NotificationError,
    NotificationGateway, NotificationQueue, RetryPolicy, ShippedNotice,
};
pub use request::{OrderItemRequest, OrderRequest};
pub use service::FulfillmentService;
