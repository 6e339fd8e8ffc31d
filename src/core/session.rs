//! Per-principal session wiring
//!
//! A `GallerySession` owns one connected principal's credential store, the
//! three asset URL caches, and the sync monitor. Everything it spawns is
//! cancelled and joined by `shutdown`; dropping the session without calling
//! it leaks no state beyond detached tasks that exit on their next tick.

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tracing::info;

use crate::core::config::AppConfig;
use crate::core::error::PhotostreamError;
use crate::credential::{CredentialStore, HttpOAuthClient, TokenCipher};
use crate::ingest::SyncStatusMonitor;
use crate::urlcache::{AssetClass, AssetUrlCache, HttpSignedUrlIssuer, UrlCacheConfig};

/// One signed-in principal's runtime state
pub struct GallerySession {
    principal_id: String,
    credentials: Arc<CredentialStore>,
    thumbnails: Arc<AssetUrlCache>,
    previews: Arc<AssetUrlCache>,
    videos: Arc<AssetUrlCache>,
    monitor: Arc<SyncStatusMonitor>,
}

impl GallerySession {
    /// Assemble the session and start its background work
    ///
    /// Each asset class gets its own cache over its own issuer endpoint;
    /// all three share one credential store, so a token refresh triggered by
    /// one class serves the others too.
    pub fn start(
        config: &AppConfig,
        pool: SqlitePool,
        principal_id: &str,
    ) -> Result<Self, PhotostreamError> {
        let cipher = Arc::new(TokenCipher::from_hex(&config.cipher.key_hex)?);
        let refresh_client = Arc::new(HttpOAuthClient::new(&config.oauth)?);
        let credentials = Arc::new(CredentialStore::new(
            pool.clone(),
            cipher,
            refresh_client,
        ));

        let cache_config = UrlCacheConfig {
            renewal_margin: config.cache.renewal_margin(),
            renewal_interval: config.cache.renewal_interval(),
        };
        let issuer_timeout = Duration::from_millis(config.cache.timeout_ms);
        let build_cache = |class: AssetClass| -> Result<Arc<AssetUrlCache>, PhotostreamError> {
            let issuer = HttpSignedUrlIssuer::new(
                config.cache.endpoint_for(class),
                principal_id.to_string(),
                Arc::clone(&credentials),
                issuer_timeout,
            )?;
            let cache = Arc::new(AssetUrlCache::new(
                class,
                cache_config.clone(),
                Arc::new(issuer),
            ));
            cache.start_renewal();
            Ok(cache)
        };

        let thumbnails = build_cache(AssetClass::Thumbnail)?;
        let previews = build_cache(AssetClass::Preview)?;
        let videos = build_cache(AssetClass::Video)?;

        let monitor = Arc::new(SyncStatusMonitor::new(
            pool,
            principal_id.to_string(),
            config.sync.poll_interval(),
        ));

        info!(principal = %principal_id, "Gallery session started");
        Ok(Self {
            principal_id: principal_id.to_string(),
            credentials,
            thumbnails,
            previews,
            videos,
            monitor,
        })
    }

    pub fn principal_id(&self) -> &str {
        &self.principal_id
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// URL cache for one asset class
    pub fn cache(&self, class: AssetClass) -> &Arc<AssetUrlCache> {
        match class {
            AssetClass::Thumbnail => &self.thumbnails,
            AssetClass::Preview => &self.previews,
            AssetClass::Video => &self.videos,
        }
    }

    pub fn sync_monitor(&self) -> &Arc<SyncStatusMonitor> {
        &self.monitor
    }

    /// Stop all background work and wait for it to finish
    pub async fn shutdown(&self) {
        self.thumbnails.shutdown().await;
        self.previews.shutdown().await;
        self.videos.shutdown().await;
        self.monitor.shutdown().await;
        info!(principal = %self.principal_id, "Gallery session stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CipherConfig;
    use crate::db::init_schema;
    use crate::ingest::SyncStatus;
    use secrecy::SecretString;
    use sqlx::sqlite::SqlitePoolOptions;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.cipher = CipherConfig::default().with_key_hex(SecretString::new("ab".repeat(32)));
        config
    }

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_session_start_and_shutdown() {
        let pool = memory_pool().await;
        let session = GallerySession::start(&test_config(), pool, "principal-1").unwrap();

        assert_eq!(session.principal_id(), "principal-1");
        assert!(session.cache(AssetClass::Thumbnail).is_empty());
        assert_eq!(session.cache(AssetClass::Video).class(), AssetClass::Video);
        assert!(!session.credentials().has_credential("principal-1").await.unwrap());

        let state = session.sync_monitor().current_state().await.unwrap();
        assert_eq!(state.status, SyncStatus::Idle);
        assert!(!session.sync_monitor().is_active());

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_session_rejects_bad_cipher_key() {
        let pool = memory_pool().await;
        let mut config = test_config();
        config.cipher.key_hex = SecretString::new("too short".to_string());

        let result = GallerySession::start(&config, pool, "principal-1");
        assert!(matches!(result, Err(PhotostreamError::Config(_))));
    }
}
