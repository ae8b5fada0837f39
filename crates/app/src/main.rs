//! Order fulfillment process entry point.

use anyhow::Context;
use app::{Config, seed, telemetry};
use domain::{FulfillmentService, LoggingGateway, NotificationDispatcher, RetryPolicy};
use store::{
    CatalogStoreExt, PageRequest, PostgresCatalogStore, PostgresOrderStore, PostgresUserDirectory,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Configuration and tracing
    let config = Config::from_env()?;
    telemetry::init(&config);

    // 2. Database and schema
    let pool = app::db::connect(&config).await?;
    store::run_migrations(&pool)
        .await
        .context("running migrations")?;

    // 3. Notification delivery
    let dispatcher = NotificationDispatcher::spawn(
        LoggingGateway,
        RetryPolicy::new(config.notify_max_attempts, config.notify_backoff),
        config.notify_queue_capacity,
    );

    // 4. Service over the PostgreSQL stores
    let users = PostgresUserDirectory::new(pool.clone());
    let service = FulfillmentService::new(
        PostgresCatalogStore::new(pool.clone()),
        PostgresOrderStore::new(pool.clone()),
        users.clone(),
    )
    .with_notifications(dispatcher.queue());

    if config.seed_demo {
        seed::seed_demo(&users, &service).await?;
    }

    // 5. Report catalog state
    let page = service
        .catalog()
        .product_page(PageRequest::first(), None)
        .await?;
    tracing::info!(
        products = page.total_items,
        pages = page.total_pages,
        "catalog ready"
    );
    for product in &page.items {
        tracing::info!(
            product_id = %product.id,
            name = %product.name,
            price = %product.price,
            stock = product.stock_quantity,
            "product"
        );
    }

    // 6. Deliver pending notifications, then close the pool
    dispatcher.shutdown().await;
    pool.close().await;
    tracing::info!("shut down");

    Ok(())
}
