//! Credential subsystem errors

use thiserror::Error;

/// Result type for credential operations
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

/// Errors from credential storage and refresh
#[derive(Error, Debug)]
pub enum CredentialError {
    /// No stored credential for the principal. The caller must fall back to
    /// interactive authorization; never retried here.
    #[error("No credential stored for principal: {principal_id}")]
    NotFound { principal_id: String },

    /// The upstream provider rejected the refresh call. Propagated as-is,
    /// never auto-retried.
    #[error("Credential refresh rejected upstream (HTTP {status}): {reason}")]
    RefreshFailed { status: u16, reason: String },

    /// Ciphertext tamper or key mismatch. Fatal for this credential; callers
    /// treat it the same as a missing credential.
    #[error("Credential decryption failed")]
    Decryption,

    #[error("Credential encryption failed")]
    Encryption,

    /// The caller-supplied cancellation token fired mid-operation
    #[error("Credential operation cancelled")]
    Cancelled,

    #[error("Refresh request failed: {reason}")]
    Http { reason: String },

    #[error("Credential storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Stored credential is malformed: {reason}")]
    Malformed { reason: String },
}
