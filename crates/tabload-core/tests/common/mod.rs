//! Common test utilities for tabload integration tests
//!
//! Provides a throwaway PostgreSQL container and small dataset builders.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::TestPostgres;
//!
//! #[tokio::test]
//! async fn test_with_postgres() {
//!     let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
//!     sqlx::query("SELECT 1").execute(pg.pool()).await.expect("Query failed");
//! }
//! ```

#![allow(dead_code)]

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tabload_common::{Dataset, Value};
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::{debug, info};

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

/// PostgreSQL container with a connected pool
pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
    connection_string: String,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        Self::start_with_options(PostgresOptions::default()).await
    }

    pub async fn start_with_options(options: PostgresOptions) -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag(&options.version)
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let connection_string =
            format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

        debug!("PostgreSQL connection: {}", connection_string);

        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(Duration::from_secs(options.acquire_timeout_secs))
            .connect(&connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self {
            _container: container,
            pool,
            connection_string,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn pool_clone(&self) -> PgPool {
        self.pool.clone()
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

/// Configuration options for the PostgreSQL test container
pub struct PostgresOptions {
    /// PostgreSQL version/tag (default: "16-alpine")
    pub version: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PostgresOptions {
    fn default() -> Self {
        Self {
            version: "16-alpine".to_string(),
            max_connections: 5,
            acquire_timeout_secs: 30,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Initialize tracing for tests; safe to call more than once
pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,tabload_core=debug,sqlx=warn,testcontainers=info")
        }))
        .with_test_writer()
        .try_init();
}

/// Two-column dataset of `(name, n)` pairs
pub fn pairs(rows: &[(&str, i64)]) -> Dataset {
    Dataset::from_rows(
        vec!["name".to_string(), "n".to_string()],
        rows.iter()
            .map(|(name, n)| vec![Value::from(*name), Value::Int(*n)])
            .collect(),
    )
    .expect("pairs are rectangular")
}
