use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AddressId, Money, MoneyError, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::{OrderStatus, Result};

/// One line of an order: a product, a quantity and the unit price at order time.
///
/// Lines are written together with their order and never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub price_at_time: Money,
}

impl OrderLine {
    pub fn new(product_id: ProductId, quantity: u32, price_at_time: Money) -> Self {
        Self {
            product_id,
            quantity,
            price_at_time,
        }
    }

    /// Returns `price_at_time * quantity`.
    pub fn line_total(&self) -> std::result::Result<Money, MoneyError> {
        self.price_at_time.checked_mul(self.quantity)
    }
}

/// A persisted order with its lines in the order they were requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub address_id: AddressId,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<OrderLine>,
}

impl Order {
    /// Returns the number of lines.
    pub fn item_count(&self) -> usize {
        self.lines.len()
    }

    /// Returns the line for a product, if present.
    pub fn line(&self, product_id: ProductId) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }
}

/// An order ready to be written.
///
/// `total_amount` is stored as given; it is computed once by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub address_id: AddressId,
    pub lines: Vec<OrderLine>,
    pub total_amount: Money,
}

impl NewOrder {
    /// Builds an order whose total is the sum of its line totals.
    pub fn priced(
        user_id: UserId,
        address_id: AddressId,
        lines: Vec<OrderLine>,
    ) -> std::result::Result<Self, MoneyError> {
        let line_totals = lines
            .iter()
            .map(OrderLine::line_total)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            user_id,
            address_id,
            total_amount: Money::checked_sum(line_totals)?,
            lines,
        })
    }
}

/// Durable order headers and their line items.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Writes the order header and all of its lines as one atomic unit,
    /// with status `pending`.
    ///
    /// Either the whole order becomes visible or none of it does. An empty
    /// line list is accepted.
    async fn create_order(&self, order: NewOrder) -> Result<Order>;

    /// Loads an order with its lines. Returns None if it does not exist.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists all orders placed by a user, oldest first.
    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Overwrites the status and returns the updated order.
    ///
    /// Fails with `OrderNotFound` if the order does not exist.
    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<Order>;

    /// Deletes an order together with its lines.
    ///
    /// Fails with `OrderNotFound` if the order does not exist.
    async fn delete_order(&self, id: OrderId) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_total_multiplies_snapshot_price() {
        let line = OrderLine::new(ProductId::new(), 3, Money::from_cents(1999));
        assert_eq!(line.line_total().unwrap(), Money::from_cents(5997));
    }

    #[test]
    fn line_total_overflow_is_an_error() {
        let price =
            Money::new(rust_decimal::Decimal::from_i128_with_scale(5 * 10i128.pow(26), 0)).unwrap();
        let line = OrderLine::new(ProductId::new(), 2, price);
        assert_eq!(line.line_total(), Err(MoneyError::Overflow));
        assert!(NewOrder::priced(UserId::new(), AddressId::new(), vec![line]).is_err());
    }

    #[test]
    fn priced_order_sums_lines() {
        let order = NewOrder::priced(
            UserId::new(),
            AddressId::new(),
            vec![
                OrderLine::new(ProductId::new(), 2, Money::from_cents(1000)),
                OrderLine::new(ProductId::new(), 1, Money::from_cents(550)),
            ],
        )
        .unwrap();
        assert_eq!(order.total_amount, Money::from_cents(2550));
    }

    #[test]
    fn priced_empty_order_is_zero() {
        let order = NewOrder::priced(UserId::new(), AddressId::new(), vec![]).unwrap();
        assert!(order.total_amount.is_zero());
    }
}
