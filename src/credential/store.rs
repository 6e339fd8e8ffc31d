//! Per-principal credential storage with transparent refresh
//!
//! One credential row per principal, secrets encrypted at rest. Access tokens
//! are refreshed before they enter the 60-second safety margin, and refreshes
//! for the same principal are single-flighted: some providers invalidate the
//! previous refresh token on rotation, so a duplicate in-flight refresh can
//! cause rolling failures.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::cipher::TokenCipher;
use super::error::{CredentialError, CredentialResult};
use super::refresh::OAuthRefreshClient;
use super::Credential;

/// Seconds before expiry at which a token is no longer handed out
const SAFETY_MARGIN_SECS: i64 = 60;

/// Credential store backed by SQLite
pub struct CredentialStore {
    pool: SqlitePool,
    cipher: Arc<TokenCipher>,
    refresh_client: Arc<dyn OAuthRefreshClient>,
    /// Single-flight locks keyed by principal id
    refresh_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CredentialStore {
    /// Create a store over the given pool, cipher, and refresh client
    pub fn new(
        pool: SqlitePool,
        cipher: Arc<TokenCipher>,
        refresh_client: Arc<dyn OAuthRefreshClient>,
    ) -> Self {
        Self {
            pool,
            cipher,
            refresh_client,
            refresh_locks: DashMap::new(),
        }
    }

    /// Return a usable access token, refreshing first when the stored token
    /// is within the safety margin of expiry
    ///
    /// Refreshes for the same principal are collapsed into one upstream call;
    /// concurrent callers wait on the same lock and re-read the refreshed row.
    pub async fn get_valid_access_token(
        &self,
        principal_id: &str,
        cancel: &CancellationToken,
    ) -> CredentialResult<String> {
        let credential = self.load(principal_id).await?;
        if !Self::needs_refresh(&credential, Utc::now()) {
            return Ok(credential.access_token);
        }

        let lock = self
            .refresh_locks
            .entry(principal_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let _guard = tokio::select! {
            guard = lock.lock() => guard,
            _ = cancel.cancelled() => return Err(CredentialError::Cancelled),
        };

        // Another caller may have refreshed while we waited on the lock
        let credential = self.load(principal_id).await?;
        if !Self::needs_refresh(&credential, Utc::now()) {
            return Ok(credential.access_token);
        }

        tracing::debug!(principal_id, "Access token within safety margin, refreshing");

        let response = tokio::select! {
            result = self.refresh_client.refresh(&credential.refresh_token) => result?,
            _ = cancel.cancelled() => return Err(CredentialError::Cancelled),
        };

        let now = Utc::now();
        let expires_at =
            now + ChronoDuration::seconds(response.expires_in - SAFETY_MARGIN_SECS);
        // Keep the original refresh token unless the provider rotated it
        let refresh_token = response
            .refresh_token
            .unwrap_or(credential.refresh_token);
        let scope = response.scope.unwrap_or(credential.scope);

        self.persist(
            principal_id,
            &response.access_token,
            &refresh_token,
            &scope,
            expires_at,
        )
        .await?;

        tracing::info!(principal_id, %expires_at, "Credential refreshed");
        Ok(response.access_token)
    }

    /// Store a credential, replacing any existing one for the principal
    ///
    /// Called after the (out-of-scope) interactive consent flow completes.
    pub async fn store_credential(
        &self,
        principal_id: &str,
        access_token: &str,
        refresh_token: &str,
        scope: &str,
        expires_at: DateTime<Utc>,
    ) -> CredentialResult<()> {
        self.persist(principal_id, access_token, refresh_token, scope, expires_at)
            .await
    }

    /// Drop the stored credential for a principal
    pub async fn remove_credential(&self, principal_id: &str) -> CredentialResult<()> {
        sqlx::query("DELETE FROM credentials WHERE principal_id = ?")
            .bind(principal_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Whether a credential row exists for the principal
    pub async fn has_credential(&self, principal_id: &str) -> CredentialResult<bool> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM credentials WHERE principal_id = ?")
                .bind(principal_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0 > 0)
    }

    fn needs_refresh(credential: &Credential, now: DateTime<Utc>) -> bool {
        credential.expires_at - now <= ChronoDuration::seconds(SAFETY_MARGIN_SECS)
    }

    async fn load(&self, principal_id: &str) -> CredentialResult<Credential> {
        let row: Option<(Vec<u8>, Vec<u8>, String, String)> = sqlx::query_as(
            r#"
            SELECT access_token_enc, refresh_token_enc, scope, expires_at
            FROM credentials
            WHERE principal_id = ?
            "#,
        )
        .bind(principal_id)
        .fetch_optional(&self.pool)
        .await?;

        let (access_enc, refresh_enc, scope, expires_at) =
            row.ok_or_else(|| CredentialError::NotFound {
                principal_id: principal_id.to_string(),
            })?;

        let expires_at = DateTime::parse_from_rfc3339(&expires_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| CredentialError::Malformed {
                reason: format!("bad expires_at: {}", e),
            })?;

        Ok(Credential {
            principal_id: principal_id.to_string(),
            access_token: self.cipher.decrypt(&access_enc)?,
            refresh_token: self.cipher.decrypt(&refresh_enc)?,
            scope,
            expires_at,
        })
    }

    async fn persist(
        &self,
        principal_id: &str,
        access_token: &str,
        refresh_token: &str,
        scope: &str,
        expires_at: DateTime<Utc>,
    ) -> CredentialResult<()> {
        let access_enc = self.cipher.encrypt(access_token)?;
        let refresh_enc = self.cipher.encrypt(refresh_token)?;

        sqlx::query(
            r#"
            INSERT INTO credentials
                (principal_id, access_token_enc, refresh_token_enc, scope, expires_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (principal_id) DO UPDATE SET
                access_token_enc = excluded.access_token_enc,
                refresh_token_enc = excluded.refresh_token_enc,
                scope = excluded.scope,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(principal_id)
        .bind(&access_enc)
        .bind(&refresh_enc)
        .bind(scope)
        .bind(expires_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
