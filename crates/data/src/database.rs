use anyhow::{anyhow, Context, Result};
use ipo_advisor_core::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::repositories::Repositories;

/// `SQLite` store holding the raw observation and prediction tables.
#[derive(Clone)]
pub struct DatabaseClient {
    pool: SqlitePool,
}

impl DatabaseClient {
    /// Opens the database, creating the file and its parent directory if needed,
    /// and applies migrations.
    ///
    /// # Arguments
    ///
    /// * `database_url` - `SQLite` database URL (e.g., `<sqlite://data/ipo_advisor.db>`)
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created, the connection fails,
    /// or migrations fail.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        if let Some(parent) = sqlite_file_path(database_url).and_then(Path::parent) {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        Self::open(options, max_connections).await
    }

    /// Opens a database that must already exist, and applies migrations.
    ///
    /// # Errors
    ///
    /// Returns error if the database file is missing or the connection fails.
    pub async fn open_existing(database_url: &str, max_connections: u32) -> Result<Self> {
        if let Some(path) = sqlite_file_path(database_url) {
            if !path.exists() {
                return Err(anyhow!("Database not found at {}", path.display()));
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(false);
        Self::open(options, max_connections).await
    }

    /// Opens the database described by the configuration, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns error if connection or migrations fail.
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::connect(&config.url, config.max_connections).await
    }

    /// Creates an in-memory database for testing.
    ///
    /// A single long-lived connection keeps the in-memory schema alive.
    ///
    /// # Errors
    ///
    /// Returns error if connection fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    async fn open(options: SqliteConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::debug!("Database ready");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Repositories sharing this client's pool.
    #[must_use]
    pub fn repositories(&self) -> Repositories {
        Repositories::new(self.pool.clone())
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// File path behind a `sqlite:` URL, or `None` for in-memory databases.
fn sqlite_file_path(database_url: &str) -> Option<&Path> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);

    if path.is_empty() || path.starts_with(":memory:") {
        None
    } else {
        Some(Path::new(path))
    }
}
