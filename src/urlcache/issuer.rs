//! Signed-URL issuer client
//!
//! The issuer is the cache's only network dependency. It sits behind a trait
//! so cache behaviour is testable without HTTP; the real implementation
//! obtains its bearer token from `CredentialStore` on every request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::error::IssuerError;
use super::AssetId;
use crate::credential::CredentialStore;

/// One batched issuer response: URLs for the ids the issuer knows, plus a
/// single TTL covering the batch
#[derive(Debug, Clone)]
pub struct SignedUrlBatch {
    /// Signed URL per asset id; ids the issuer does not recognize are absent
    pub urls: HashMap<AssetId, String>,
    /// Validity window for every URL in the batch
    pub ttl: Duration,
}

/// Issues signed URLs for a batch of asset ids
#[async_trait]
pub trait SignedUrlIssuer: Send + Sync {
    async fn request(
        &self,
        ids: &[AssetId],
        cancel: &CancellationToken,
    ) -> Result<SignedUrlBatch, IssuerError>;
}

#[derive(Debug, Serialize)]
struct IssuerRequest<'a> {
    asset_ids: &'a [AssetId],
}

#[derive(Debug, Deserialize)]
struct IssuerResponse {
    urls: HashMap<AssetId, String>,
    ttl_seconds: u64,
}

/// reqwest-backed issuer client for one asset class endpoint
pub struct HttpSignedUrlIssuer {
    client: reqwest::Client,
    endpoint: String,
    principal_id: String,
    credentials: Arc<CredentialStore>,
}

impl HttpSignedUrlIssuer {
    /// Build an issuer client for a class-specific endpoint
    pub fn new(
        endpoint: String,
        principal_id: String,
        credentials: Arc<CredentialStore>,
        timeout: Duration,
    ) -> Result<Self, IssuerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IssuerError::Unavailable {
                reason: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint,
            principal_id,
            credentials,
        })
    }
}

#[async_trait]
impl SignedUrlIssuer for HttpSignedUrlIssuer {
    async fn request(
        &self,
        ids: &[AssetId],
        cancel: &CancellationToken,
    ) -> Result<SignedUrlBatch, IssuerError> {
        // Credential failures are indistinguishable from issuer outages as
        // far as the cache is concerned
        let token = self
            .credentials
            .get_valid_access_token(&self.principal_id, cancel)
            .await
            .map_err(|e| IssuerError::Unavailable {
                reason: format!("credential unavailable: {}", e),
            })?;

        let send = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&IssuerRequest { asset_ids: ids })
            .send();

        let response = tokio::select! {
            result = send => result.map_err(|e| IssuerError::Unavailable {
                reason: format!("request failed: {}", e),
            })?,
            _ = cancel.cancelled() => return Err(IssuerError::Cancelled),
        };

        if !response.status().is_success() {
            let status = response.status();
            return Err(IssuerError::Unavailable {
                reason: format!("HTTP {}", status),
            });
        }

        let body: IssuerResponse =
            response
                .json()
                .await
                .map_err(|e| IssuerError::Unavailable {
                    reason: format!("malformed response: {}", e),
                })?;

        Ok(SignedUrlBatch {
            urls: body.urls,
            ttl: Duration::from_secs(body.ttl_seconds),
        })
    }
}
