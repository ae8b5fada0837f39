//! Database connection at start-up.

use std::time::Duration;

use anyhow::Context;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::Config;

const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Opens the connection pool, retrying while the database comes up.
pub async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    let attempts = config.connect_attempts.max(1);
    let mut attempt = 1;

    loop {
        let result = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&config.database_url)
            .await;

        match result {
            Ok(pool) => {
                tracing::info!(attempt, "connected to database");
                return Ok(pool);
            }
            Err(e) if attempt < attempts => {
                tracing::warn!(attempt, attempts, error = %e, "database unavailable, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("connecting to database after {attempts} attempts"));
            }
        }
    }
}
