//! Error types for Photostream
//!
//! Each subsystem defines its own error enum; this module aggregates them
//! into the crate-level `PhotostreamError`.

use thiserror::Error;

pub use crate::credential::error::CredentialError;
pub use crate::urlcache::error::IssuerError;

/// Result type alias for Photostream operations
pub type Result<T> = std::result::Result<T, PhotostreamError>;

/// Main error type for Photostream
#[derive(Error, Debug)]
pub enum PhotostreamError {
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Issuer error: {0}")]
    Issuer(#[from] IssuerError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config parse failed: {reason}")]
    ParseFailed { reason: String },

    #[error("Invalid config value: {field} = {value}")]
    InvalidValue { field: String, value: String },

    #[error("Invalid cipher key: {reason}")]
    InvalidCipherKey { reason: String },
}
