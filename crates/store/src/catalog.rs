use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

use crate::{Page, PageRequest, Result};

/// A catalog product with its on-hand stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub description: Option<String>,
    pub stock_quantity: u32,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: Money,
    pub description: Option<String>,
    pub stock_quantity: u32,
    pub category: Option<String>,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, price: Money, stock_quantity: u32) -> Self {
        Self {
            name: name.into(),
            price,
            description: None,
            stock_quantity,
            category: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Partial update of a catalog product. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub price: Option<Money>,
    pub description: Option<String>,
    pub stock_quantity: Option<u32>,
    pub category: Option<String>,
}

impl ProductUpdate {
    /// Applies the update to a product in place.
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(description) = &self.description {
            product.description = Some(description.clone());
        }
        if let Some(stock) = self.stock_quantity {
            product.stock_quantity = stock;
        }
        if let Some(category) = &self.category {
            product.category = Some(category.clone());
        }
    }
}

/// Durable product records with an atomically guarded stock counter.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Looks up a product. Returns None if it does not exist.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Removes `amount` units from stock and returns the updated product.
    ///
    /// The check and the write are one conditional update: if fewer than
    /// `amount` units are on hand the call fails with `InsufficientStock`
    /// and stock is not touched. Stock can never go negative.
    async fn decrement_stock(&self, id: ProductId, amount: u32) -> Result<Product>;

    /// Returns `amount` units to stock and returns the updated product.
    async fn increment_stock(&self, id: ProductId, amount: u32) -> Result<Product>;

    /// Lists products in a stable order, optionally filtered by category.
    ///
    /// Returns the requested slice and the total number of matching products.
    async fn list_products(
        &self,
        offset: u64,
        limit: u64,
        category: Option<&str>,
    ) -> Result<(Vec<Product>, u64)>;

    /// Adds a product to the catalog.
    async fn create_product(&self, product: NewProduct) -> Result<Product>;

    /// Updates a product, failing with `ProductNotFound` if it does not exist.
    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product>;

    /// Removes a product. Historical order lines keep their reference.
    async fn delete_product(&self, id: ProductId) -> Result<()>;
}

/// Extension trait providing convenience methods for catalog stores.
#[async_trait]
pub trait CatalogStoreExt: CatalogStore {
    /// Fetches one page of the catalog.
    async fn product_page(
        &self,
        request: PageRequest,
        category: Option<&str>,
    ) -> Result<Page<Product>> {
        let (items, total) = self
            .list_products(request.offset(), request.limit(), category)
            .await?;
        Ok(Page::new(items, request, total))
    }
}

// Blanket implementation for all CatalogStore implementations
impl<T: CatalogStore + ?Sized> CatalogStoreExt for T {}
