//! Customer notifications, delivered off the request path.

mod dispatcher;
mod gateway;

pub use dispatcher::{NotificationDispatcher, NotificationQueue, RetryPolicy};
pub use gateway::{
    InMemoryNotificationGateway, LoggingGateway, NotificationError, NotificationGateway,
    ShippedNotice,
};
