//! TTL cache over issuer-signed asset URLs
//!
//! Freshness lives in exactly one place: an entry is served while
//! `now < expires_at` and re-fetched once `expires_at - renewal_margin`
//! has passed. Fetches are batched per resolve call and coalesced per cache
//! instance; failures never evict what is already cached.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::issuer::SignedUrlIssuer;
use super::{AssetClass, AssetId, CacheEntry};

/// URL cache tuning
#[derive(Debug, Clone)]
pub struct UrlCacheConfig {
    /// Safety buffer subtracted from entry expiry when deciding staleness
    pub renewal_margin: Duration,
    /// Background renewal period; must stay below the issuer's TTL
    pub renewal_interval: Duration,
}

impl Default for UrlCacheConfig {
    fn default() -> Self {
        Self {
            renewal_margin: Duration::from_secs(30),
            renewal_interval: Duration::from_secs(240),
        }
    }
}

/// Client-side TTL cache of asset id to signed URL for one asset class
pub struct AssetUrlCache {
    class: AssetClass,
    config: UrlCacheConfig,
    issuer: Arc<dyn SignedUrlIssuer>,
    entries: RwLock<HashMap<AssetId, CacheEntry>>,
    /// Assets that already used their single recovery attempt
    recovered: Mutex<HashSet<AssetId>>,
    /// Coalescing guard: at most one outstanding issuer fetch per instance
    in_flight: tokio::sync::Mutex<()>,
    shutdown: CancellationToken,
    renewal_task: Mutex<Option<JoinHandle<()>>>,
}

impl AssetUrlCache {
    /// Create a cache for one asset class over the given issuer
    pub fn new(
        class: AssetClass,
        config: UrlCacheConfig,
        issuer: Arc<dyn SignedUrlIssuer>,
    ) -> Self {
        Self {
            class,
            config,
            issuer,
            entries: RwLock::new(HashMap::new()),
            recovered: Mutex::new(HashSet::new()),
            in_flight: tokio::sync::Mutex::new(()),
            shutdown: CancellationToken::new(),
            renewal_task: Mutex::new(None),
        }
    }

    /// Asset class served by this instance
    pub fn class(&self) -> AssetClass {
        self.class
    }

    /// Resolve a set of asset ids to signed URLs, best effort
    ///
    /// Stale or missing ids are fetched from the issuer in one batched call;
    /// already-fresh ids are never re-requested. Ids the issuer does not
    /// return are simply absent from the result. A resolve arriving while
    /// another fetch is outstanding performs no network call and returns
    /// current cached state; the next trigger retries.
    pub async fn resolve(
        &self,
        ids: &[AssetId],
        cancel: &CancellationToken,
    ) -> HashMap<AssetId, String> {
        let stale = self.partition_stale(ids);

        if !stale.is_empty() {
            match self.in_flight.try_lock() {
                Ok(_guard) => self.fetch_and_merge(&stale, cancel).await,
                Err(_) => {
                    tracing::debug!(
                        class = %self.class,
                        count = stale.len(),
                        "Fetch already in flight, serving cached state"
                    );
                }
            }
        }

        self.snapshot(ids)
    }

    /// Pure read: the cached URL for an asset, if present and unexpired
    pub fn current_url(&self, id: &str) -> Option<String> {
        let now = Instant::now();
        self.entries
            .read()
            .get(id)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.url.clone())
    }

    /// Drop the cached entry for an asset immediately
    pub fn invalidate(&self, id: &str) {
        self.entries.write().remove(id);
    }

    /// One bounded recovery attempt per asset per cache lifetime
    ///
    /// The first call invalidates and fetches from the issuer; every later
    /// call for the same asset is a no-op that returns current cached state,
    /// signalling permanent unavailability (the UI freezes on a placeholder
    /// instead of looping).
    pub async fn recover_once(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Option<String> {
        if !self.recovered.lock().insert(id.to_string()) {
            tracing::debug!(class = %self.class, id, "Recovery already spent for asset");
            return self.current_url(id);
        }

        tracing::info!(class = %self.class, id, "Render failure, attempting URL recovery");
        self.invalidate(id);
        let ids = [id.to_string()];
        // Unlike resolve, recovery waits out any in-flight fetch: the one
        // attempt this asset gets must reach the issuer
        let _guard = self.in_flight.lock().await;
        self.fetch_and_merge(&ids, cancel).await;
        self.current_url(id)
    }

    /// Number of tracked assets (expired entries included)
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache tracks no assets
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Start the proactive renewal task
    ///
    /// Re-resolves all tracked ids on a fixed period so render time rarely
    /// observes an expired URL. Idempotent; `shutdown` cancels it.
    pub fn start_renewal(self: &Arc<Self>) {
        let mut slot = self.renewal_task.lock();
        if slot.is_some() {
            return;
        }

        let cache = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cache.config.renewal_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; nothing is stale yet
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cache.shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let ids: Vec<AssetId> =
                            cache.entries.read().keys().cloned().collect();
                        if ids.is_empty() {
                            continue;
                        }
                        tracing::debug!(
                            class = %cache.class,
                            tracked = ids.len(),
                            "Proactive signed-URL renewal"
                        );
                        cache.resolve(&ids, &cache.shutdown).await;
                    }
                }
            }
            tracing::debug!(class = %cache.class, "Renewal task stopped");
        });

        *slot = Some(handle);
    }

    /// Cancel background work and wait for it to finish
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self.renewal_task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Ids whose entry is missing, expired, or inside the renewal margin
    fn partition_stale(&self, ids: &[AssetId]) -> Vec<AssetId> {
        let horizon = Instant::now() + self.config.renewal_margin;
        let entries = self.entries.read();
        ids.iter()
            .filter(|id| {
                entries
                    .get(*id)
                    .map_or(true, |entry| entry.expires_at <= horizon)
            })
            .cloned()
            .collect()
    }

    async fn fetch_and_merge(&self, stale: &[AssetId], cancel: &CancellationToken) {
        let result = tokio::select! {
            result = self.issuer.request(stale, cancel) => result,
            _ = self.shutdown.cancelled() => return,
        };

        match result {
            Ok(batch) => {
                let expires_at = Instant::now() + batch.ttl;
                let mut entries = self.entries.write();
                for (id, url) in batch.urls {
                    entries.insert(id, CacheEntry { url, expires_at });
                }
            }
            Err(e) => {
                // Availability over freshness: existing entries stay as-is
                // and keep being served until they actually expire
                tracing::warn!(
                    class = %self.class,
                    count = stale.len(),
                    error = %e,
                    "Signed-URL fetch failed, keeping stale entries"
                );
            }
        }
    }

    fn snapshot(&self, ids: &[AssetId]) -> HashMap<AssetId, String> {
        let now = Instant::now();
        let entries = self.entries.read();
        ids.iter()
            .filter_map(|id| {
                entries
                    .get(id)
                    .filter(|entry| entry.expires_at > now)
                    .map(|entry| (id.clone(), entry.url.clone()))
            })
            .collect()
    }
}
