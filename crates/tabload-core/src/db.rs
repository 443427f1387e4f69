//! Connection pool setup

use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::store::postgres::classify;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Build a pool and open its first connection
pub async fn create_pool(config: &DatabaseConfig) -> StorageResult<PgPool> {
    let connect_options = config
        .connect_options()
        .map_err(|e| StorageError::Connection(Box::new(e)))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect_with(connect_options)
        .await
        .map_err(|e| match classify(e, false) {
            StorageError::Query(source) => StorageError::Connection(source),
            other => other,
        })?;

    tracing::info!(
        target_db = %config.target(),
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database connection pool created"
    );

    Ok(pool)
}

pub async fn health_check(pool: &PgPool) -> StorageResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(|e| classify(e, false))
}
