//! Upstream OAuth refresh client
//!
//! The refresh-grant call sits behind a trait so the store can be exercised
//! in tests without a network.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::CredentialError;
use crate::core::config::OAuthConfig;

/// Successful token response from the provider
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// New access token
    pub access_token: String,

    /// Lifetime of the access token in seconds
    pub expires_in: i64,

    /// Granted scope, if the provider echoes it
    #[serde(default)]
    pub scope: Option<String>,

    /// Rotated refresh token. Absent when the provider keeps the original.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Client for the provider's token endpoint
#[async_trait]
pub trait OAuthRefreshClient: Send + Sync {
    /// Exchange a refresh token for a fresh access token
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, CredentialError>;
}

/// reqwest-backed refresh client
pub struct HttpOAuthClient {
    client: reqwest::Client,
    token_endpoint: String,
    client_id: String,
    client_secret: SecretString,
}

impl HttpOAuthClient {
    /// Build a client from OAuth configuration
    pub fn new(config: &OAuthConfig) -> Result<Self, CredentialError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| CredentialError::Http {
                reason: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            token_endpoint: config.token_endpoint.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }
}

#[async_trait]
impl OAuthRefreshClient for HttpOAuthClient {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, CredentialError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
        ];

        let response = self
            .client
            .post(&self.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| CredentialError::Http {
                reason: format!("Refresh request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::RefreshFailed {
                status,
                reason: body,
            });
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| CredentialError::Http {
                reason: format!("Failed to parse token response: {}", e),
            })
    }
}
