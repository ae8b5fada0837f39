//! Shared types for the order fulfillment backend.

mod money;
mod types;

pub use money::{MONEY_SCALE, Money, MoneyError};
pub use types::{AddressId, OrderId, ProductId, UserId};
