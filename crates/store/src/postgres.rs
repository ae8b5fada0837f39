use async_trait::async_trait;
use common::{AddressId, Money, OrderId, ProductId, UserId};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CatalogStore, NewAddress, NewOrder, NewProduct, Order, OrderLine, OrderStatus, OrderStore,
    Product, ProductUpdate, Result, StoreError, User, UserDirectory,
};

const PRODUCT_COLUMNS: &str =
    "id, name, price, description, stock_quantity, category, created_at";

const ORDER_COLUMNS: &str = "id, user_id, address_id, status, total_amount, created_at";

/// Applies the schema migrations in `migrations/`.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

fn to_db_int(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|e| StoreError::Database(sqlx::Error::Encode(Box::new(e))))
}

fn from_db_int(value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))
}

fn to_money(value: Decimal) -> Result<Money> {
    Money::new(value).map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        price: to_money(row.try_get("price")?)?,
        description: row.try_get("description")?,
        stock_quantity: from_db_int(row.try_get("stock_quantity")?)?,
        category: row.try_get("category")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_line(row: &PgRow) -> Result<OrderLine> {
    Ok(OrderLine {
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        quantity: from_db_int(row.try_get("quantity")?)?,
        price_at_time: to_money(row.try_get("price_at_time")?)?,
    })
}

fn row_to_order(row: &PgRow, lines: Vec<OrderLine>) -> Result<Order> {
    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        address_id: AddressId::from_uuid(row.try_get::<Uuid, _>("address_id")?),
        status: OrderStatus::from(row.try_get::<String, _>("status")?),
        total_amount: to_money(row.try_get("total_amount")?)?,
        created_at: row.try_get("created_at")?,
        lines,
    })
}

/// PostgreSQL-backed catalog store.
#[derive(Clone)]
pub struct PostgresCatalogStore {
    pool: PgPool,
}

impl PostgresCatalogStore {
    /// Creates a new PostgreSQL catalog store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn decrement_stock(&self, id: ProductId, amount: u32) -> Result<Product> {
        let requested = to_db_int(amount)?;

        // Guard and write in one statement: a row is only returned if the
        // stock covered the request at the moment of the update.
        let row = sqlx::query(&format!(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity - $2
            WHERE id = $1 AND stock_quantity >= $2
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(requested)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return row_to_product(&row);
        }

        // Nothing updated: report why. This read does not affect the outcome.
        let available: Option<i32> =
            sqlx::query_scalar("SELECT stock_quantity FROM products WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        match available {
            Some(available) => {
                metrics::counter!("stock_decrements_rejected_total").increment(1);
                Err(StoreError::InsufficientStock {
                    product_id: id,
                    requested: amount,
                    available: from_db_int(available)?,
                })
            }
            None => Err(StoreError::ProductNotFound(id)),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn increment_stock(&self, id: ProductId, amount: u32) -> Result<Product> {
        let overflow = || StoreError::StockOverflow {
            product_id: id,
            amount,
        };
        let added = i32::try_from(amount).map_err(|_| overflow())?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + $2
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(added)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            // 22003: numeric_value_out_of_range
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.code().as_deref() == Some("22003")
            {
                return overflow();
            }
            StoreError::Database(e)
        })?;

        match row {
            Some(row) => row_to_product(&row),
            None => Err(StoreError::ProductNotFound(id)),
        }
    }

    async fn list_products(
        &self,
        offset: u64,
        limit: u64,
        category: Option<&str>,
    ) -> Result<(Vec<Product>, u64)> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE ($1::text IS NULL OR category = $1)
            ORDER BY created_at ASC, id ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(category)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE ($1::text IS NULL OR category = $1)",
        )
        .bind(category)
        .fetch_one(&self.pool)
        .await?;

        let items = rows.iter().map(row_to_product).collect::<Result<Vec<_>>>()?;
        Ok((items, total.max(0) as u64))
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (id, name, price, description, stock_quantity, category)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(ProductId::new().as_uuid())
        .bind(&product.name)
        .bind(product.price.amount())
        .bind(&product.description)
        .bind(to_db_int(product.stock_quantity)?)
        .bind(&product.category)
        .fetch_one(&self.pool)
        .await?;

        row_to_product(&row)
    }

    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product> {
        let stock = update.stock_quantity.map(to_db_int).transpose()?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE products SET
                name = COALESCE($2, name),
                price = COALESCE($3, price),
                description = COALESCE($4, description),
                stock_quantity = COALESCE($5, stock_quantity),
                category = COALESCE($6, category)
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(&update.name)
        .bind(update.price.map(|p| p.amount()))
        .bind(&update.description)
        .bind(stock)
        .bind(&update.category)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_product(&row),
            None => Err(StoreError::ProductNotFound(id)),
        }
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ProductNotFound(id));
        }
        Ok(())
    }
}

/// PostgreSQL-backed order store.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, quantity, price_at_time
            FROM order_line_items
            WHERE order_id = $1
            ORDER BY line_no ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_line).collect()
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[tracing::instrument(skip(self, order), fields(user_id = %order.user_id, lines = order.lines.len()))]
    async fn create_order(&self, order: NewOrder) -> Result<Order> {
        let id = OrderId::new();

        // Header and lines share one transaction; dropping `tx` on any
        // early return rolls the whole order back.
        let mut tx = self.pool.begin().await?;

        let header = sqlx::query(&format!(
            r#"
            INSERT INTO orders (id, user_id, address_id, status, total_amount)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.address_id.as_uuid())
        .bind(OrderStatus::Pending.as_str())
        .bind(order.total_amount.amount())
        .fetch_one(&mut *tx)
        .await?;

        for (line_no, line) in order.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_line_items (order_id, product_id, line_no, quantity, price_at_time)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(id.as_uuid())
            .bind(line.product_id.as_uuid())
            .bind(i32::try_from(line_no).unwrap_or(i32::MAX))
            .bind(to_db_int(line.quantity)?)
            .bind(line.price_at_time.amount())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("order_line_items_pkey")
                {
                    return StoreError::DuplicateLine {
                        order_id: id,
                        product_id: line.product_id,
                    };
                }
                StoreError::Database(e)
            })?;
        }

        let created = row_to_order(&header, order.lines)?;
        tx.commit().await?;
        Ok(created)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let lines = self.load_lines(id).await?;
                Ok(Some(row_to_order(&row, lines)?))
            }
            None => Ok(None),
        }
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            let id = OrderId::from_uuid(row.try_get::<Uuid, _>("id")?);
            let lines = self.load_lines(id).await?;
            orders.push(row_to_order(row, lines)?);
        }
        Ok(orders)
    }

    #[tracing::instrument(skip(self, status), fields(status = %status))]
    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let row = sqlx::query(&format!(
            "UPDATE orders SET status = $2 WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let lines = self.load_lines(id).await?;
                row_to_order(&row, lines)
            }
            None => Err(StoreError::OrderNotFound(id)),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn delete_order(&self, id: OrderId) -> Result<()> {
        // order_line_items rows go with the header via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::OrderNotFound(id));
        }
        Ok(())
    }
}

/// PostgreSQL-backed user directory over the `users` and `addresses` tables.
#[derive(Clone)]
pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    /// Creates a new PostgreSQL user directory.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Registers a user.
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        description: Option<&str>,
    ) -> Result<User> {
        let id = UserId::new();
        sqlx::query(
            "INSERT INTO users (id, username, email, description) VALUES ($1, $2, $3, $4)",
        )
        .bind(id.as_uuid())
        .bind(username)
        .bind(email)
        .bind(description)
        .execute(&self.pool)
        .await?;

        Ok(User::new(id, email, username))
    }

    /// Number of registered users.
    pub async fn user_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    /// Adds a delivery address for a user.
    pub async fn add_address(&self, user_id: UserId, address: &NewAddress) -> Result<AddressId> {
        let id = AddressId::new();
        sqlx::query(
            r#"
            INSERT INTO addresses (id, user_id, street, city, state, zip_code, country, is_primary)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(&address.street)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.zip_code)
        .bind(&address.country)
        .bind(address.is_primary)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, email, username FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(User {
                id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
                email: row.try_get("email")?,
                username: row.try_get("username")?,
            })),
            None => Ok(None),
        }
    }
}
