//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container and truncate every table
//! before each test, so they run serially. Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration
//! ```

use std::sync::Arc;

use common::{AddressId, Money, UserId};
use serial_test::serial;
use sqlx::PgPool;
use store::{
    CatalogStore, CatalogStoreExt, NewAddress, NewOrder, NewProduct, OrderLine, OrderStatus,
    OrderStore, PageRequest, PostgresCatalogStore, PostgresOrderStore, PostgresUserDirectory,
    ProductUpdate, StoreError, UserDirectory,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_order_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Fresh pool with every table cleared
async fn get_test_pool() -> PgPool {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_line_items, orders, products, addresses, users CASCADE")
        .execute(&pool)
        .await
        .unwrap();

    pool
}

struct Stores {
    catalog: PostgresCatalogStore,
    orders: PostgresOrderStore,
    users: PostgresUserDirectory,
}

async fn get_test_stores() -> Stores {
    let pool = get_test_pool().await;
    Stores {
        catalog: PostgresCatalogStore::new(pool.clone()),
        orders: PostgresOrderStore::new(pool.clone()),
        users: PostgresUserDirectory::new(pool),
    }
}

async fn register_customer(users: &PostgresUserDirectory, name: &str) -> (UserId, AddressId) {
    let user = users
        .create_user(name, &format!("{name}@example.com"), None)
        .await
        .unwrap();
    let address = users
        .add_address(
            user.id,
            &NewAddress {
                street: "1 Main St".to_string(),
                city: "Springfield".to_string(),
                state: Some("IL".to_string()),
                zip_code: Some("62701".to_string()),
                country: "US".to_string(),
                is_primary: true,
            },
        )
        .await
        .unwrap();
    (user.id, address)
}

fn money(cents: u64) -> Money {
    Money::from_cents(cents)
}

#[tokio::test]
#[serial]
async fn create_and_get_product_keeps_two_decimal_price() {
    let stores = get_test_stores().await;

    let created = stores
        .catalog
        .create_product(
            NewProduct::new("Widget", money(1050), 7)
                .with_description("A widget")
                .with_category("tools"),
        )
        .await
        .unwrap();

    let fetched = stores
        .catalog
        .get_product(created.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.price, money(1050));
    assert_eq!(fetched.price.to_string(), "10.50");
    assert_eq!(fetched.stock_quantity, 7);
    assert_eq!(fetched.category.as_deref(), Some("tools"));
}

#[tokio::test]
#[serial]
async fn decrement_stock_refuses_to_overdraw() {
    let stores = get_test_stores().await;
    let product = stores
        .catalog
        .create_product(NewProduct::new("Gadget", money(500), 3))
        .await
        .unwrap();

    let after = stores.catalog.decrement_stock(product.id, 2).await.unwrap();
    assert_eq!(after.stock_quantity, 1);

    let err = stores
        .catalog
        .decrement_stock(product.id, 2)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::InsufficientStock {
            requested: 2,
            available: 1,
            ..
        }
    ));

    let unchanged = stores
        .catalog
        .get_product(product.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged.stock_quantity, 1);
}

#[tokio::test]
#[serial]
async fn decrement_unknown_product_is_not_found() {
    let stores = get_test_stores().await;
    let missing = common::ProductId::new();

    let err = stores
        .catalog
        .decrement_stock(missing, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ProductNotFound(id) if id == missing));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn concurrent_decrements_never_oversell() {
    let stores = get_test_stores().await;
    let product = stores
        .catalog
        .create_product(NewProduct::new("Limited", money(100), 10))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..25 {
        let catalog = stores.catalog.clone();
        handles.push(tokio::spawn(async move {
            catalog.decrement_stock(product.id, 1).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(StoreError::InsufficientStock { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(succeeded, 10);
    let remaining = stores
        .catalog
        .get_product(product.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(remaining.stock_quantity, 0);
}

#[tokio::test]
#[serial]
async fn increment_and_update_product() {
    let stores = get_test_stores().await;
    let product = stores
        .catalog
        .create_product(NewProduct::new("Bolt", money(25), 4))
        .await
        .unwrap();

    let restocked = stores.catalog.increment_stock(product.id, 6).await.unwrap();
    assert_eq!(restocked.stock_quantity, 10);

    let updated = stores
        .catalog
        .update_product(
            product.id,
            ProductUpdate {
                price: Some(money(30)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.price, money(30));
    assert_eq!(updated.name, "Bolt");
    assert_eq!(updated.stock_quantity, 10);
}

#[tokio::test]
#[serial]
async fn increment_past_integer_range_is_refused() {
    let stores = get_test_stores().await;
    let product = stores
        .catalog
        .create_product(NewProduct::new("Nut", money(5), 10))
        .await
        .unwrap();

    for amount in [i32::MAX as u32, u32::MAX] {
        let err = stores
            .catalog
            .increment_stock(product.id, amount)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StockOverflow { amount: got, .. } if got == amount));
    }

    let unchanged = stores
        .catalog
        .get_product(product.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged.stock_quantity, 10);
}

#[tokio::test]
#[serial]
async fn product_pages_follow_creation_order() {
    let stores = get_test_stores().await;
    let mut ids = Vec::new();
    for i in 0..15 {
        let product = stores
            .catalog
            .create_product(NewProduct::new(format!("Item {i}"), money(100 + i), 1))
            .await
            .unwrap();
        ids.push(product.id);
    }

    let page = stores
        .catalog
        .product_page(PageRequest::new(2, 5).unwrap(), None)
        .await
        .unwrap();
    assert_eq!(page.total_items, 15);
    assert_eq!(page.total_pages, 3);
    assert!(page.has_next);
    assert!(page.has_prev);
    let page_ids: Vec<_> = page.items.iter().map(|p| p.id).collect();
    assert_eq!(page_ids, ids[5..10].to_vec());

    let beyond = stores
        .catalog
        .product_page(PageRequest::new(10, 5).unwrap(), None)
        .await
        .unwrap();
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.total_items, 15);
    assert!(!beyond.has_next);
}

#[tokio::test]
#[serial]
async fn product_pages_filter_by_category() {
    let stores = get_test_stores().await;
    for (name, category) in [("Hammer", "tools"), ("Apple", "food"), ("Saw", "tools")] {
        stores
            .catalog
            .create_product(NewProduct::new(name, money(100), 1).with_category(category))
            .await
            .unwrap();
    }

    let tools = stores
        .catalog
        .product_page(PageRequest::first(), Some("tools"))
        .await
        .unwrap();
    assert_eq!(tools.total_items, 2);
    assert!(
        tools
            .items
            .iter()
            .all(|p| p.category.as_deref() == Some("tools"))
    );
}

#[tokio::test]
#[serial]
async fn create_order_writes_header_and_lines_together() {
    let stores = get_test_stores().await;
    let (user_id, address_id) = register_customer(&stores.users, "alice").await;
    let a = common::ProductId::new();
    let b = common::ProductId::new();

    let order = stores
        .orders
        .create_order(NewOrder::priced(
            user_id,
            address_id,
            vec![OrderLine::new(a, 2, money(1000)), OrderLine::new(b, 1, money(550))],
        ).unwrap())
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount, money(2550));

    let loaded = stores.orders.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.lines.len(), 2);
    assert_eq!(loaded.lines[0].product_id, a);
    assert_eq!(loaded.lines[1].product_id, b);
    assert_eq!(loaded.total_amount, money(2550));
}

#[tokio::test]
#[serial]
async fn duplicate_product_line_rolls_back_the_whole_order() {
    let stores = get_test_stores().await;
    let (user_id, address_id) = register_customer(&stores.users, "bob").await;
    let a = common::ProductId::new();

    let err = stores
        .orders
        .create_order(NewOrder::priced(
            user_id,
            address_id,
            vec![OrderLine::new(a, 1, money(100)), OrderLine::new(a, 2, money(100))],
        ).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateLine { product_id, .. } if product_id == a));

    let orders = stores.orders.list_orders_for_user(user_id).await.unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
#[serial]
async fn status_can_be_overwritten_freely() {
    let stores = get_test_stores().await;
    let (user_id, address_id) = register_customer(&stores.users, "carol").await;

    let order = stores
        .orders
        .create_order(NewOrder::priced(
            user_id,
            address_id,
            vec![OrderLine::new(common::ProductId::new(), 1, money(100))],
        ).unwrap())
        .await
        .unwrap();

    let shipped = stores
        .orders
        .update_status(order.id, OrderStatus::Shipped)
        .await
        .unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);

    let back = stores
        .orders
        .update_status(order.id, OrderStatus::from("on_hold"))
        .await
        .unwrap();
    assert_eq!(back.status.as_str(), "on_hold");

    let err = stores
        .orders
        .update_status(common::OrderId::new(), OrderStatus::Delivered)
        .await;
    assert!(matches!(err, Err(StoreError::OrderNotFound(_))));
}

#[tokio::test]
#[serial]
async fn delete_order_cascades_to_lines() {
    let stores = get_test_stores().await;
    let (user_id, address_id) = register_customer(&stores.users, "dave").await;

    let order = stores
        .orders
        .create_order(NewOrder::priced(
            user_id,
            address_id,
            vec![OrderLine::new(common::ProductId::new(), 3, money(200))],
        ).unwrap())
        .await
        .unwrap();

    stores.orders.delete_order(order.id).await.unwrap();
    assert!(stores.orders.get_order(order.id).await.unwrap().is_none());

    let pool = stores.orders.pool();
    let remaining: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM order_line_items WHERE order_id = $1")
            .bind(order.id.as_uuid())
            .fetch_one(pool)
            .await
            .unwrap();
    assert_eq!(remaining, 0);

    let again = stores.orders.delete_order(order.id).await;
    assert!(matches!(again, Err(StoreError::OrderNotFound(_))));
}

#[tokio::test]
#[serial]
async fn list_orders_for_user_only_returns_their_orders() {
    let stores = get_test_stores().await;
    let (alice, alice_addr) = register_customer(&stores.users, "alice").await;
    let (bob, bob_addr) = register_customer(&stores.users, "bob").await;

    for _ in 0..2 {
        stores
            .orders
            .create_order(NewOrder::priced(
                alice,
                alice_addr,
                vec![OrderLine::new(common::ProductId::new(), 1, money(100))],
            ).unwrap())
            .await
            .unwrap();
    }
    stores
        .orders
        .create_order(NewOrder::priced(
            bob,
            bob_addr,
            vec![OrderLine::new(common::ProductId::new(), 1, money(100))],
        ).unwrap())
        .await
        .unwrap();

    let alice_orders = stores.orders.list_orders_for_user(alice).await.unwrap();
    assert_eq!(alice_orders.len(), 2);
    assert!(alice_orders.iter().all(|o| o.user_id == alice));
}

#[tokio::test]
#[serial]
async fn user_directory_reads_registered_users() {
    let stores = get_test_stores().await;
    let (user_id, _) = register_customer(&stores.users, "erin").await;

    let user = stores.users.get_user(user_id).await.unwrap().unwrap();
    assert_eq!(user.username, "erin");
    assert_eq!(user.email, "erin@example.com");

    assert!(stores.users.get_user(UserId::new()).await.unwrap().is_none());
    assert_eq!(stores.users.user_count().await.unwrap(), 1);
}
