//! Photostream - signed asset URL caching and credential refresh engine
//!
//! This crate provides the media-delivery plumbing for a cloud photo
//! gallery including:
//! - Encrypted OAuth credential storage with single-flight refresh
//! - TTL caches of issuer-signed asset URLs, one per asset class
//! - Proactive background URL renewal and bounded render-failure recovery
//! - Provider sync status monitoring with terminal-transition events
//! - SQLite database with WAL mode for concurrent access

pub mod core;
pub mod credential;
pub mod db;
pub mod ingest;
pub mod logging;
pub mod urlcache;

// Re-export commonly used items
pub use crate::core::config::AppConfig;
pub use crate::core::error::{PhotostreamError, Result};
pub use crate::core::session::GallerySession;
pub use crate::credential::{CredentialError, CredentialStore, TokenCipher};
pub use crate::db::{create_database_pool, init_schema, DatabaseConfig};
pub use crate::ingest::{SyncEvent, SyncState, SyncStatus, SyncStatusMonitor};
pub use crate::urlcache::{AssetClass, AssetUrlCache, IssuerError, SignedUrlIssuer};
