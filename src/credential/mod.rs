//! Credential storage and refresh for Photostream
//!
//! Holds one OAuth credential per principal, persisted with both token fields
//! encrypted. `CredentialStore::get_valid_access_token` is the only way a
//! token leaves this module; it refreshes transparently near expiry and
//! single-flights concurrent refreshes per principal.

pub mod cipher;
pub mod error;
pub mod refresh;
pub mod store;


use chrono::{DateTime, Utc};

pub use cipher::TokenCipher;
pub use error::{CredentialError, CredentialResult};
pub use refresh::{HttpOAuthClient, OAuthRefreshClient, TokenResponse};
pub use store::CredentialStore;

/// A decrypted credential. Never leaves this module; callers only ever see
/// the access token string.
#[derive(Debug, Clone)]
pub(crate) struct Credential {
    #[allow(dead_code)]
    pub principal_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub scope: String,
    pub expires_at: DateTime<Utc>,
}
