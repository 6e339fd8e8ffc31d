//! Signed asset URL caching for Photostream
//!
//! Provider-issued asset URLs are short lived (5-10 minutes in practice).
//! `AssetUrlCache` keeps one TTL cache per asset class, batches and coalesces
//! issuer traffic, proactively renews tracked URLs in the background, and
//! bounds render-time error recovery to a single attempt per asset.

pub mod cache;
pub mod error;
pub mod issuer;


use tokio::time::Instant;

pub use cache::{AssetUrlCache, UrlCacheConfig};
pub use error::IssuerError;
pub use issuer::{HttpSignedUrlIssuer, SignedUrlBatch, SignedUrlIssuer};

/// Opaque provider asset identifier
pub type AssetId = String;

/// Asset classes served by the issuer, with distinct endpoints but an
/// identical cache contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetClass {
    /// Grid thumbnails
    Thumbnail,
    /// High-resolution previews
    Preview,
    /// Video playback URLs
    Video,
}

impl AssetClass {
    /// Endpoint path segment for this class
    pub fn as_str(self) -> &'static str {
        match self {
            AssetClass::Thumbnail => "thumbnail",
            AssetClass::Preview => "preview",
            AssetClass::Video => "video",
        }
    }
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cached signed URL with its computed expiry
///
/// Entries are replaced whole on merge; monotonic `tokio::time::Instant`
/// keeps expiry immune to wall-clock jumps and testable under a paused clock.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The signed URL
    pub url: String,
    /// When the URL stops being served
    pub expires_at: Instant,
}
