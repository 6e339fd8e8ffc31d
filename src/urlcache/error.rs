//! URL issuer errors

use thiserror::Error;

/// Errors from the signed-URL issuing service
///
/// Credential failures, network failures, and upstream 5xx all collapse into
/// `Unavailable`: the cache reacts to every one of them the same way, by
/// serving the last known URLs.
#[derive(Error, Debug)]
pub enum IssuerError {
    #[error("Signed-URL issuer unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Issuer request cancelled")]
    Cancelled,
}
