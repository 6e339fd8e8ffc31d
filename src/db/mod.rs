//! Database module for Photostream
//!
//! Provides the SQLite pool backing credential and sync-state persistence,
//! plus idempotent schema initialization.

use std::path::PathBuf;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use crate::core::error::{PhotostreamError, Result};

/// SQLite connection pool configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database file path
    pub db_path: PathBuf,

    /// Maximum number of connections
    pub max_connections: u32,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Whether to enable WAL mode
    pub enable_wal: bool,

    /// Busy timeout in milliseconds
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_path: directories::ProjectDirs::from("com", "photostream", "Photostream")
                .map(|dirs| dirs.data_local_dir().join("photostream.db"))
                .unwrap_or_else(|| PathBuf::from("photostream.db")),
            max_connections: 5,
            connect_timeout_secs: 30,
            enable_wal: cfg!(feature = "wal"),
            busy_timeout_ms: 5000,
        }
    }
}

impl DatabaseConfig {
    /// Create a new DatabaseConfig with the specified path
    pub fn with_path(db_path: PathBuf) -> Self {
        Self {
            db_path,
            ..Default::default()
        }
    }

    /// Set WAL mode
    pub fn with_wal(mut self, enable: bool) -> Self {
        self.enable_wal = enable;
        self
    }

    /// Set maximum connections
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}

/// Create a SQLite connection pool with the given configuration
///
/// # Errors
///
/// Returns an error if the database cannot be created or connected to
pub async fn create_database_pool(config: &DatabaseConfig) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = config.db_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let connect_options = SqliteConnectOptions::new()
        .filename(&config.db_path)
        .create_if_missing(true)
        .journal_mode(if config.enable_wal {
            SqliteJournalMode::Wal
        } else {
            SqliteJournalMode::Delete
        })
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms as u64))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect_with(connect_options)
        .await
        .map_err(PhotostreamError::Database)?;

    tracing::info!(
        "Database pool created: {:?} (WAL: {}, connections: {})",
        config.db_path,
        config.enable_wal,
        config.max_connections
    );

    Ok(pool)
}

/// Create the tables the engine reads and writes
///
/// `credentials` is owned by this crate; `sync_state` is owned by the external
/// ingestion job and only read here, but the table must exist so the monitor
/// can treat a missing row as idle instead of failing.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS credentials (
            principal_id      TEXT PRIMARY KEY,
            access_token_enc  BLOB NOT NULL,
            refresh_token_enc BLOB NOT NULL,
            scope             TEXT NOT NULL DEFAULT '',
            expires_at        TEXT NOT NULL,
            updated_at        TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(PhotostreamError::Database)?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sync_state (
            principal_id      TEXT PRIMARY KEY,
            status            TEXT NOT NULL,
            pending_folders   TEXT NOT NULL DEFAULT '[]',
            folders_processed INTEGER NOT NULL DEFAULT 0,
            completed_at      TEXT,
            error             TEXT,
            updated_at        TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(PhotostreamError::Database)?;

    Ok(())
}
