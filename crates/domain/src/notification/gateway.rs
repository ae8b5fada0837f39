//! Notification gateway trait and implementations.

use std::sync::Arc;

use async_trait::async_trait;
use common::OrderId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors raised while delivering a notification.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The gateway could not deliver the message.
    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    /// The dispatcher is no longer running.
    #[error("Notification dispatcher is closed")]
    Closed,

    /// The dispatch queue is full.
    #[error("Notification queue is full")]
    QueueFull,
}

/// An "order shipped" message for one customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippedNotice {
    pub email: String,
    pub order_id: OrderId,
    pub username: String,
}

impl ShippedNotice {
    pub fn new(email: impl Into<String>, order_id: OrderId, username: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            order_id,
            username: username.into(),
        }
    }
}

/// Outbound delivery of customer notifications.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Tells a customer that their order has shipped.
    async fn send_shipped(&self, notice: &ShippedNotice) -> Result<(), NotificationError>;
}

#[async_trait]
impl<G: NotificationGateway + ?Sized> NotificationGateway for Arc<G> {
    async fn send_shipped(&self, notice: &ShippedNotice) -> Result<(), NotificationError> {
        (**self).send_shipped(notice).await
    }
}

/// Gateway that writes each notice to the log instead of sending mail.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingGateway;

#[async_trait]
impl NotificationGateway for LoggingGateway {
    async fn send_shipped(&self, notice: &ShippedNotice) -> Result<(), NotificationError> {
        tracing::info!(
            email = %notice.email,
            order_id = %notice.order_id,
            username = %notice.username,
            "order shipped notification"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    delivered: Vec<ShippedNotice>,
    attempts: usize,
    fail_on_send: bool,
}

/// In-memory gateway that records deliveries, for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryNotificationGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following send fail until switched back.
    pub async fn set_fail_on_send(&self, fail: bool) {
        self.state.write().await.fail_on_send = fail;
    }

    /// Notices delivered so far, oldest first.
    pub async fn delivered(&self) -> Vec<ShippedNotice> {
        self.state.read().await.delivered.clone()
    }

    /// Number of send attempts, failed ones included.
    pub async fn attempts(&self) -> usize {
        self.state.read().await.attempts
    }
}

#[async_trait]
impl NotificationGateway for InMemoryNotificationGateway {
    async fn send_shipped(&self, notice: &ShippedNotice) -> Result<(), NotificationError> {
        let mut state = self.state.write().await;
        state.attempts += 1;

        if state.fail_on_send {
            return Err(NotificationError::Delivery("mail server unavailable".to_string()));
        }

        state.delivered.push(notice.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_delivered_notices() {
        let gateway = InMemoryNotificationGateway::new();
        let notice = ShippedNotice::new("a@example.com", OrderId::new(), "alice");

        gateway.send_shipped(&notice).await.unwrap();

        assert_eq!(gateway.delivered().await, vec![notice]);
        assert_eq!(gateway.attempts().await, 1);
    }

    #[tokio::test]
    async fn failing_gateway_counts_attempts() {
        let gateway = InMemoryNotificationGateway::new();
        gateway.set_fail_on_send(true).await;
        let notice = ShippedNotice::new("a@example.com", OrderId::new(), "alice");

        assert!(gateway.send_shipped(&notice).await.is_err());
        assert!(gateway.send_shipped(&notice).await.is_err());

        assert!(gateway.delivered().await.is_empty());
        assert_eq!(gateway.attempts().await, 2);
    }

    #[tokio::test]
    async fn logging_gateway_always_succeeds() {
        let notice = ShippedNotice::new("a@example.com", OrderId::new(), "alice");
        assert!(LoggingGateway.send_shipped(&notice).await.is_ok());
    }
}
