//! Order fulfillment service.

use std::time::Instant;

use common::{Money, OrderId, UserId};
use store::{
    CatalogStore, NewOrder, Order, OrderLine, OrderStatus, OrderStore, StoreError, UserDirectory,
};

use crate::error::{FulfillmentError, Result};
use crate::notification::{NotificationQueue, ShippedNotice};
use crate::request::OrderRequest;

/// Places orders against the catalog and moves them through their statuses.
///
/// Order creation runs in two phases: every line is priced and checked
/// against current stock, the order is written atomically, and only then is
/// stock committed with one guarded decrement per line. The decrement is the
/// authoritative check; if it refuses, the order is withdrawn and any stock
/// already taken for it is put back.
pub struct FulfillmentService<C, O, U>
where
    C: CatalogStore,
    O: OrderStore,
    U: UserDirectory,
{
    catalog: C,
    orders: O,
    users: U,
    notifications: Option<NotificationQueue>,
}

impl<C, O, U> FulfillmentService<C, O, U>
where
    C: CatalogStore,
    O: OrderStore,
    U: UserDirectory,
{
    /// Creates a service that sends no notifications.
    pub fn new(catalog: C, orders: O, users: U) -> Self {
        Self {
            catalog,
            orders,
            users,
            notifications: None,
        }
    }

    /// Sends shipped notices through the given queue.
    pub fn with_notifications(mut self, queue: NotificationQueue) -> Self {
        self.notifications = Some(queue);
        self
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn orders(&self) -> &O {
        &self.orders
    }

    /// Places an order.
    ///
    /// Returns the stored order in status `pending`. Validation, user,
    /// product and stock failures leave no trace in any store.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id, items = request.items.len()))]
    pub async fn create_order(&self, request: OrderRequest) -> Result<Order> {
        let started = Instant::now();
        let result = self.place_order(&request).await;

        match &result {
            Ok(order) => {
                metrics::counter!("orders_created_total").increment(1);
                metrics::histogram!("order_create_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(
                    order_id = %order.id,
                    total = %order.total_amount,
                    lines = order.item_count(),
                    "order created"
                );
            }
            Err(e) => {
                metrics::counter!("orders_rejected_total", "reason" => e.kind()).increment(1);
                tracing::info!(reason = e.kind(), error = %e, "order rejected");
            }
        }

        result
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<Order> {
        let items = request.validated_items()?;

        self.users
            .get_user(request.user_id)
            .await?
            .ok_or(FulfillmentError::UserNotFound(request.user_id))?;

        let mut lines = Vec::with_capacity(items.len());
        let mut total = Money::zero();
        for (product_id, quantity) in items {
            let product = self
                .catalog
                .get_product(product_id)
                .await?
                .ok_or(FulfillmentError::ProductNotFound(product_id))?;

            if quantity > product.stock_quantity {
                return Err(FulfillmentError::InsufficientStock {
                    product_id,
                    product_name: product.name,
                    requested: quantity,
                    available: product.stock_quantity,
                });
            }

            let line = OrderLine::new(product_id, quantity, product.price);
            total = line
                .line_total()
                .and_then(|line_total| total.checked_add(line_total))
                .map_err(|_| FulfillmentError::AmountOverflow { product_id })?;
            lines.push(line);
        }

        let order = self
            .orders
            .create_order(NewOrder {
                user_id: request.user_id,
                address_id: request.address_id,
                lines,
                total_amount: total,
            })
            .await?;

        self.commit_stock(&order).await?;
        Ok(order)
    }

    /// Takes stock for every line of a stored order, withdrawing the order
    /// if any decrement fails.
    ///
    /// A refused decrement is a stock conflict. Any other failure may have
    /// been applied without an acknowledgement, so it is reported as needing
    /// reconciliation even when the withdrawal succeeds.
    async fn commit_stock(&self, order: &Order) -> Result<()> {
        for (index, line) in order.lines.iter().enumerate() {
            let Err(err) = self
                .catalog
                .decrement_stock(line.product_id, line.quantity)
                .await
            else {
                continue;
            };

            let conflict = matches!(err, StoreError::InsufficientStock { .. });
            if conflict {
                metrics::counter!("stock_commit_conflicts_total").increment(1);
                tracing::warn!(
                    order_id = %order.id,
                    product_id = %line.product_id,
                    error = %err,
                    "stock commit refused, withdrawing order"
                );
            } else {
                tracing::error!(
                    order_id = %order.id,
                    product_id = %line.product_id,
                    error = %err,
                    "stock commit failed, withdrawing order"
                );
            }

            self.withdraw(order, &order.lines[..index]).await?;

            return Err(match err {
                StoreError::InsufficientStock {
                    product_id,
                    requested,
                    available,
                } => FulfillmentError::StockCommitConflict {
                    order_id: order.id,
                    product_id,
                    requested,
                    available,
                },
                other => {
                    metrics::counter!("orders_reconciliation_required_total").increment(1);
                    FulfillmentError::ReconciliationRequired {
                        order_id: order.id,
                        reason: format!(
                            "decrement {} x{} failed and may have been applied: {other}",
                            line.product_id, line.quantity
                        ),
                    }
                }
            });
        }
        Ok(())
    }

    /// Restores the stock taken for `committed` and deletes the order.
    /// Every step is attempted even if an earlier one fails.
    #[tracing::instrument(skip(self, order, committed), fields(order_id = %order.id))]
    async fn withdraw(&self, order: &Order, committed: &[OrderLine]) -> Result<()> {
        let mut failures = Vec::new();

        for line in committed.iter().rev() {
            if let Err(e) = self
                .catalog
                .increment_stock(line.product_id, line.quantity)
                .await
            {
                failures.push(format!(
                    "restock {} x{}: {e}",
                    line.product_id, line.quantity
                ));
            }
        }

        if let Err(e) = self.orders.delete_order(order.id).await {
            failures.push(format!("delete order: {e}"));
        }

        if failures.is_empty() {
            return Ok(());
        }

        let reason = failures.join("; ");
        metrics::counter!("orders_reconciliation_required_total").increment(1);
        tracing::error!(order_id = %order.id, %reason, "order withdrawal incomplete");
        Err(FulfillmentError::ReconciliationRequired {
            order_id: order.id,
            reason,
        })
    }

    /// Sets an order's status. Moving to `shipped` queues a notice for the
    /// customer; delivery problems never affect the result.
    #[tracing::instrument(skip(self, status), fields(status = %status))]
    pub async fn update_order_status(&self, order_id: OrderId, status: OrderStatus) -> Result<Order> {
        self.orders
            .get_order(order_id)
            .await?
            .ok_or(FulfillmentError::OrderNotFound(order_id))?;

        let updated = self
            .orders
            .update_status(order_id, status.normalized())
            .await
            .map_err(|e| match e {
                StoreError::OrderNotFound(id) => FulfillmentError::OrderNotFound(id),
                other => FulfillmentError::Store(other),
            })?;

        metrics::counter!("order_status_updates_total").increment(1);

        if updated.status.is_shipped() {
            self.notify_shipped(&updated).await;
        }

        Ok(updated)
    }

    async fn notify_shipped(&self, order: &Order) {
        let Some(queue) = &self.notifications else {
            return;
        };

        let user = match self.users.get_user(order.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::warn!(order_id = %order.id, user_id = %order.user_id, "shipped notice skipped: user not found");
                return;
            }
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "shipped notice skipped: user lookup failed");
                return;
            }
        };

        if user.email.is_empty() {
            tracing::info!(order_id = %order.id, user_id = %user.id, "shipped notice skipped: no email");
            return;
        }

        let notice = ShippedNotice::new(user.email, order.id, user.username);
        if let Err(e) = queue.enqueue(notice) {
            metrics::counter!("notifications_failed_total").increment(1);
            tracing::warn!(order_id = %order.id, error = %e, "shipped notice not queued");
        }
    }

    /// Loads an order with its lines.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.orders
            .get_order(order_id)
            .await?
            .ok_or(FulfillmentError::OrderNotFound(order_id))
    }

    /// Lists a user's orders, oldest first.
    pub async fn list_user_orders(&self, user_id: UserId) -> Result<Vec<Order>> {
        Ok(self.orders.list_orders_for_user(user_id).await?)
    }

    /// Deletes an order and its lines. Stock is not restored.
    #[tracing::instrument(skip(self))]
    pub async fn delete_order(&self, order_id: OrderId) -> Result<()> {
        self.orders
            .delete_order(order_id)
            .await
            .map_err(|e| match e {
                StoreError::OrderNotFound(id) => FulfillmentError::OrderNotFound(id),
                other => FulfillmentError::Store(other),
            })
    }
}
