//! Inbound order requests.

use common::{AddressId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::{FulfillmentError, Result};

/// One requested product and quantity.
///
/// The quantity is signed so that zero and negative values from callers
/// reach validation instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

impl OrderItemRequest {
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// A request to place an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub user_id: UserId,
    pub address_id: AddressId,
    pub items: Vec<OrderItemRequest>,
}

impl OrderRequest {
    pub fn new(user_id: UserId, address_id: AddressId) -> Self {
        Self {
            user_id,
            address_id,
            items: Vec::new(),
        }
    }

    /// Adds an item to the request.
    pub fn with_item(mut self, product_id: ProductId, quantity: i64) -> Self {
        self.items.push(OrderItemRequest::new(product_id, quantity));
        self
    }

    /// Checks the request shape and returns one `(product, quantity)` pair
    /// per distinct product, in order of first appearance.
    ///
    /// Repeated products are merged by summing their quantities.
    pub(crate) fn validated_items(&self) -> Result<Vec<(ProductId, u32)>> {
        if self.items.is_empty() {
            return Err(FulfillmentError::EmptyOrder);
        }

        let mut merged: Vec<(ProductId, u32)> = Vec::with_capacity(self.items.len());
        for item in &self.items {
            let invalid = || FulfillmentError::InvalidQuantity {
                product_id: item.product_id,
                quantity: item.quantity,
            };

            if item.quantity <= 0 {
                return Err(invalid());
            }
            let quantity = u32::try_from(item.quantity).map_err(|_| invalid())?;

            match merged.iter_mut().find(|(id, _)| *id == item.product_id) {
                Some((_, existing)) => {
                    *existing = existing.checked_add(quantity).ok_or_else(invalid)?;
                }
                None => merged.push((item.product_id, quantity)),
            }
        }

        Ok(merged)
    }
}
