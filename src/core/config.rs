//! Configuration module for Photostream
//!
//! Handles engine configuration including:
//! - OAuth refresh endpoint and client credentials
//! - Credential cipher key material
//! - Per-asset-class issuer endpoints and cache tuning
//! - Ingestion status polling

use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;

use crate::urlcache::AssetClass;

/// Main engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// OAuth refresh settings
    pub oauth: OAuthConfig,

    /// Credential cipher settings
    pub cipher: CipherConfig,

    /// URL cache tuning
    pub cache: CacheConfig,

    /// Ingestion status monitor settings
    pub sync: SyncConfig,
}

/// OAuth refresh endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    /// Token endpoint URL for refresh-grant calls
    pub token_endpoint: String,

    /// OAuth client id
    pub client_id: String,

    /// OAuth client secret
    pub client_secret: SecretString,

    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

/// Credential cipher configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CipherConfig {
    /// 32-byte AES-256 key, hex encoded (64 characters)
    pub key_hex: SecretString,
}

/// URL cache tuning
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Base URL of the signed-URL issuing service
    pub issuer_base_url: String,

    /// Safety buffer subtracted from entry expiry when partitioning
    /// fresh vs. stale ids, in seconds
    pub renewal_margin_secs: u64,

    /// Background renewal interval in seconds. Must stay shorter than
    /// the issuer's TTL (5-10 minutes in practice).
    pub renewal_interval_secs: u64,

    /// Issuer request timeout in milliseconds
    pub timeout_ms: u64,
}

/// Ingestion status monitor settings
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Poll interval in milliseconds while ingestion is active
    pub poll_interval_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            oauth: OAuthConfig::default(),
            cipher: CipherConfig::default(),
            cache: CacheConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            token_endpoint: "https://oauth2.photoprovider.example/token".to_string(),
            client_id: String::new(),
            client_secret: SecretString::new(String::new()),
            timeout_ms: 10_000,
        }
    }
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            key_hex: SecretString::new(String::new()),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            issuer_base_url: "https://media.photoprovider.example/v1".to_string(),
            renewal_margin_secs: 30,
            renewal_interval_secs: 240,
            timeout_ms: 10_000,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_500,
        }
    }
}

impl OAuthConfig {
    /// Set the token endpoint
    pub fn with_token_endpoint(mut self, endpoint: String) -> Self {
        self.token_endpoint = endpoint;
        self
    }

    /// Set the client credentials
    pub fn with_client(mut self, client_id: String, client_secret: SecretString) -> Self {
        self.client_id = client_id;
        self.client_secret = client_secret;
        self
    }
}

impl CipherConfig {
    /// Set the hex-encoded cipher key
    pub fn with_key_hex(mut self, key_hex: SecretString) -> Self {
        self.key_hex = key_hex;
        self
    }
}

impl CacheConfig {
    /// Set the issuer base URL
    pub fn with_issuer_base_url(mut self, url: String) -> Self {
        self.issuer_base_url = url;
        self
    }

    /// Set the background renewal interval
    pub fn with_renewal_interval_secs(mut self, secs: u64) -> Self {
        self.renewal_interval_secs = secs;
        self
    }

    /// Issuer endpoint for an asset class
    pub fn endpoint_for(&self, class: AssetClass) -> String {
        format!("{}/urls/{}", self.issuer_base_url, class.as_str())
    }

    /// Renewal margin as a `Duration`
    pub fn renewal_margin(&self) -> Duration {
        Duration::from_secs(self.renewal_margin_secs)
    }

    /// Renewal interval as a `Duration`
    pub fn renewal_interval(&self) -> Duration {
        Duration::from_secs(self.renewal_interval_secs)
    }
}

impl SyncConfig {
    /// Set the poll interval in milliseconds
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Poll interval as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
