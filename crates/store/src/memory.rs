use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, ProductId, UserId};
use tokio::sync::RwLock;

use crate::{
    CatalogStore, NewOrder, NewProduct, Order, OrderStatus, OrderStore, Product, ProductUpdate,
    Result, StoreError, User, UserDirectory,
};

// stock_quantity is an INTEGER column
const MAX_STOCK: u32 = i32::MAX as u32;

fn simulated_failure(operation: &str) -> StoreError {
    StoreError::Database(sqlx::Error::Io(std::io::Error::other(format!(
        "simulated {operation} failure"
    ))))
}

#[derive(Debug, Default)]
struct CatalogState {
    // insertion order doubles as the stable listing order
    products: Vec<Product>,
    fail_on_increment: bool,
}

impl CatalogState {
    fn find_mut(&mut self, id: ProductId) -> Result<&mut Product> {
        self.products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::ProductNotFound(id))
    }
}

/// In-memory catalog store.
///
/// Stock changes happen under a single write lock, so the guard and the
/// write of `decrement_stock` cannot interleave with another caller.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogStore {
    state: Arc<RwLock<CatalogState>>,
}

impl InMemoryCatalogStore {
    /// Creates a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures `increment_stock` to fail.
    pub async fn set_fail_on_increment(&self, fail: bool) {
        self.state.write().await.fail_on_increment = fail;
    }

    /// Returns the number of products in the catalog.
    pub async fn product_count(&self) -> usize {
        self.state.read().await.products.len()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let state = self.state.read().await;
        Ok(state.products.iter().find(|p| p.id == id).cloned())
    }

    async fn decrement_stock(&self, id: ProductId, amount: u32) -> Result<Product> {
        let mut state = self.state.write().await;
        let product = state.find_mut(id)?;

        if product.stock_quantity < amount {
            return Err(StoreError::InsufficientStock {
                product_id: id,
                requested: amount,
                available: product.stock_quantity,
            });
        }

        product.stock_quantity -= amount;
        Ok(product.clone())
    }

    async fn increment_stock(&self, id: ProductId, amount: u32) -> Result<Product> {
        let mut state = self.state.write().await;
        if state.fail_on_increment {
            return Err(simulated_failure("increment_stock"));
        }

        let product = state.find_mut(id)?;
        product.stock_quantity = product
            .stock_quantity
            .checked_add(amount)
            .filter(|stock| *stock <= MAX_STOCK)
            .ok_or(StoreError::StockOverflow {
                product_id: id,
                amount,
            })?;
        Ok(product.clone())
    }

    async fn list_products(
        &self,
        offset: u64,
        limit: u64,
        category: Option<&str>,
    ) -> Result<(Vec<Product>, u64)> {
        let state = self.state.read().await;
        let matching: Vec<&Product> = state
            .products
            .iter()
            .filter(|p| category.is_none() || p.category.as_deref() == category)
            .collect();

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Ok((items, total))
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let product = Product {
            id: ProductId::new(),
            name: product.name,
            price: product.price,
            description: product.description,
            stock_quantity: product.stock_quantity,
            category: product.category,
            created_at: Utc::now(),
        };

        self.state.write().await.products.push(product.clone());
        Ok(product)
    }

    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product> {
        let mut state = self.state.write().await;
        let product = state.find_mut(id)?;
        update.apply_to(product);
        Ok(product.clone())
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let mut state = self.state.write().await;
        let before = state.products.len();
        state.products.retain(|p| p.id != id);

        if state.products.len() == before {
            return Err(StoreError::ProductNotFound(id));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct OrderState {
    orders: Vec<Order>,
    fail_on_create: bool,
    fail_on_delete: bool,
}

/// In-memory order store.
///
/// An order and its lines are inserted with one push, so readers never see
/// a header without its lines.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<OrderState>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures `create_order` to fail.
    pub async fn set_fail_on_create(&self, fail: bool) {
        self.state.write().await.fail_on_create = fail;
    }

    /// Configures `delete_order` to fail.
    pub async fn set_fail_on_delete(&self, fail: bool) {
        self.state.write().await.fail_on_delete = fail;
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the total number of stored lines across all orders.
    pub async fn line_count(&self) -> usize {
        self.state
            .read()
            .await
            .orders
            .iter()
            .map(|o| o.lines.len())
            .sum()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create_order(&self, order: NewOrder) -> Result<Order> {
        let id = OrderId::new();

        let mut seen = HashSet::new();
        for line in &order.lines {
            if !seen.insert(line.product_id) {
                return Err(StoreError::DuplicateLine {
                    order_id: id,
                    product_id: line.product_id,
                });
            }
        }

        let mut state = self.state.write().await;
        if state.fail_on_create {
            return Err(simulated_failure("create_order"));
        }

        let order = Order {
            id,
            user_id: order.user_id,
            address_id: order.address_id,
            status: OrderStatus::Pending,
            total_amount: order.total_amount,
            created_at: Utc::now(),
            lines: order.lines,
        };
        state.orders.push(order.clone());

        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(StoreError::OrderNotFound(id))?;

        order.status = status.normalized();
        Ok(order.clone())
    }

    async fn delete_order(&self, id: OrderId) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_delete {
            return Err(simulated_failure("delete_order"));
        }

        let before = state.orders.len();
        state.orders.retain(|o| o.id != id);

        if state.orders.len() == before {
            return Err(StoreError::OrderNotFound(id));
        }
        Ok(())
    }
}

/// In-memory user directory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<UserId, User>>>,
}

impl InMemoryUserDirectory {
    /// Creates a new empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a user.
    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}
