//! Configuration management

use crate::upload::{UploadMode, UploadOptions};
use crate::writer::POSTGRES_MAX_BIND_PARAMS;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default database host when no `DATABASE_URL` is given.
pub const DEFAULT_DB_HOST: &str = "localhost";

/// Default database port.
pub const DEFAULT_DB_PORT: u16 = 5432;

/// Default database name.
pub const DEFAULT_DB_NAME: &str = "postgres";

/// Default database user.
pub const DEFAULT_DB_USER: &str = "postgres";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 1;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub upload: UploadConfig,
}

/// Database configuration.
///
/// `url` wins when set; otherwise the discrete connection parameters are used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(skip_serializing)]
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// Upload defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub mode: UploadMode,
    pub timeout_secs: Option<u64>,
    pub strict_schema: bool,
    pub max_bind_params: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            name: DEFAULT_DB_NAME.to_string(),
            user: DEFAULT_DB_USER.to_string(),
            password: None,
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
            connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
            idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            mode: UploadMode::Incremental,
            timeout_secs: None,
            strict_schema: false,
            max_bind_params: POSTGRES_MAX_BIND_PARAMS,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

impl Config {
    /// Load configuration from `.env`, the environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from the process environment only
    pub fn from_env() -> anyhow::Result<Self> {
        let mode = match std::env::var("TABLOAD_MODE") {
            Ok(raw) => raw.parse().map_err(|e: String| anyhow::anyhow!(e))?,
            Err(_) => UploadMode::Incremental,
        };

        let config = Config {
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
                host: std::env::var("DB_HOST").unwrap_or_else(|_| DEFAULT_DB_HOST.to_string()),
                port: env_parse("DB_PORT").unwrap_or(DEFAULT_DB_PORT),
                name: std::env::var("DB_NAME").unwrap_or_else(|_| DEFAULT_DB_NAME.to_string()),
                user: std::env::var("DB_USER").unwrap_or_else(|_| DEFAULT_DB_USER.to_string()),
                password: std::env::var("DB_PASSWORD").ok(),
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
                min_connections: env_parse("DATABASE_MIN_CONNECTIONS")
                    .unwrap_or(DEFAULT_DATABASE_MIN_CONNECTIONS),
                connect_timeout_secs: env_parse("DATABASE_CONNECT_TIMEOUT")
                    .unwrap_or(DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS),
                idle_timeout_secs: env_parse("DATABASE_IDLE_TIMEOUT")
                    .unwrap_or(DEFAULT_DATABASE_IDLE_TIMEOUT_SECS),
            },
            upload: UploadConfig {
                mode,
                timeout_secs: env_parse("TABLOAD_TIMEOUT_SECS"),
                strict_schema: env_parse("TABLOAD_STRICT_SCHEMA").unwrap_or(false),
                max_bind_params: env_parse("TABLOAD_MAX_BIND_PARAMS").unwrap_or(POSTGRES_MAX_BIND_PARAMS),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.url.is_none() && self.database.host.is_empty() {
            anyhow::bail!("Database host cannot be empty when DATABASE_URL is not set");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.upload.max_bind_params == 0 || self.upload.max_bind_params > POSTGRES_MAX_BIND_PARAMS {
            anyhow::bail!(
                "Upload max_bind_params must be between 1 and {}, got {}",
                POSTGRES_MAX_BIND_PARAMS,
                self.upload.max_bind_params
            );
        }

        if self.upload.timeout_secs == Some(0) {
            anyhow::bail!("Upload timeout must be greater than 0 seconds");
        }

        Ok(())
    }
}

impl DatabaseConfig {
    /// Connection options for the pool
    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        if let Some(url) = &self.url {
            return url.parse();
        }

        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.name)
            .username(&self.user);
        if let Some(password) = &self.password {
            options = options.password(password);
        }
        Ok(options)
    }

    /// Where this configuration points, without credentials
    pub fn target(&self) -> String {
        match self.connect_options() {
            Ok(options) => format!(
                "{}:{}/{}",
                options.get_host(),
                options.get_port(),
                options.get_database().unwrap_or(DEFAULT_DB_NAME)
            ),
            Err(_) => "<invalid DATABASE_URL>".to_string(),
        }
    }
}

impl UploadConfig {
    pub fn to_options(&self) -> UploadOptions {
        UploadOptions {
            mode: self.mode,
            timeout: self.timeout_secs.map(Duration::from_secs),
            strict_schema: self.strict_schema,
            max_bind_params: self.max_bind_params,
        }
    }
}
