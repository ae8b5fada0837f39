//! Background delivery of notifications with bounded retry.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::gateway::{NotificationError, NotificationGateway, ShippedNotice};

/// Retry policy for a single notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total delivery attempts, the first one included. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each following retry.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// A policy that tries exactly once.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff.saturating_mul(1 << exponent)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200))
    }
}

#[derive(Debug)]
enum Message {
    Shipped(ShippedNotice),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Sending side of the dispatcher, cheap to clone.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    sender: mpsc::Sender<Message>,
}

impl NotificationQueue {
    /// Queues a notice without waiting. Fails if the queue is full or the
    /// dispatcher has stopped.
    pub fn enqueue(&self, notice: ShippedNotice) -> Result<(), NotificationError> {
        self.sender
            .try_send(Message::Shipped(notice))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => NotificationError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => NotificationError::Closed,
            })
    }

    /// Waits until every notice queued before this call has been handled,
    /// delivered or given up on.
    pub async fn flush(&self) -> Result<(), NotificationError> {
        let (done, finished) = oneshot::channel();
        self.sender
            .send(Message::Flush(done))
            .await
            .map_err(|_| NotificationError::Closed)?;
        finished.await.map_err(|_| NotificationError::Closed)
    }
}

/// Owns the background task that delivers queued notices through a gateway.
pub struct NotificationDispatcher {
    queue: NotificationQueue,
    worker: JoinHandle<()>,
}

impl NotificationDispatcher {
    /// Spawns the delivery task on the current tokio runtime.
    pub fn spawn<G>(gateway: G, policy: RetryPolicy, capacity: usize) -> Self
    where
        G: NotificationGateway + 'static,
    {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run(gateway, policy, receiver));
        Self {
            queue: NotificationQueue { sender },
            worker,
        }
    }

    /// Returns a handle for queueing notices.
    pub fn queue(&self) -> NotificationQueue {
        self.queue.clone()
    }

    /// Delivers everything already queued, then stops the task.
    pub async fn shutdown(self) {
        if self.queue.sender.send(Message::Shutdown).await.is_err() {
            tracing::debug!("notification dispatcher already stopped");
        }
        if let Err(e) = self.worker.await {
            tracing::error!(error = %e, "notification dispatcher task failed");
        }
    }
}

async fn run<G: NotificationGateway>(
    gateway: G,
    policy: RetryPolicy,
    mut receiver: mpsc::Receiver<Message>,
) {
    while let Some(message) = receiver.recv().await {
        match message {
            Message::Shipped(notice) => deliver(&gateway, &policy, &notice).await,
            Message::Flush(done) => {
                let _ = done.send(());
            }
            Message::Shutdown => break,
        }
    }
    tracing::debug!("notification dispatcher stopped");
}

#[tracing::instrument(skip(gateway, policy, notice), fields(order_id = %notice.order_id))]
async fn deliver<G: NotificationGateway>(gateway: &G, policy: &RetryPolicy, notice: &ShippedNotice) {
    let max_attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        match gateway.send_shipped(notice).await {
            Ok(()) => {
                metrics::counter!("notifications_sent_total").increment(1);
                tracing::debug!(attempt, "shipped notification delivered");
                return;
            }
            Err(e) if attempt < max_attempts => {
                tracing::warn!(attempt, error = %e, "shipped notification failed, retrying");
                tokio::time::sleep(policy.delay_after(attempt)).await;
                attempt += 1;
            }
            Err(e) => {
                metrics::counter!("notifications_failed_total").increment(1);
                tracing::warn!(
                    attempt,
                    email = %notice.email,
                    error = %e,
                    "shipped notification dropped"
                );
                return;
            }
        }
    }
}
