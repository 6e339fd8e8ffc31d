//! Credential encryption at rest
//!
//! Access and refresh tokens are persisted as AES-256-GCM blobs laid out as
//! `nonce (12 bytes) ∥ ciphertext`. The key is parsed once from hex-encoded
//! configuration and held for the cipher's lifetime.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use secrecy::{ExposeSecret, SecretString};

use super::error::CredentialError;
use crate::core::error::ConfigError;

/// AES-GCM nonce length in bytes
const NONCE_LEN: usize = 12;

/// Symmetric cipher for credential secrets
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    /// Build a cipher from a 64-character hex key
    pub fn from_hex(key_hex: &SecretString) -> Result<Self, ConfigError> {
        let bytes = hex::decode(key_hex.expose_secret()).map_err(|e| {
            ConfigError::InvalidCipherKey {
                reason: format!("key is not valid hex: {}", e),
            }
        })?;
        if bytes.len() != 32 {
            return Err(ConfigError::InvalidCipherKey {
                reason: format!("expected 32 bytes, got {}", bytes.len()),
            });
        }
        let key = Key::<Aes256Gcm>::from_slice(&bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Build a cipher from raw key bytes
    pub fn from_bytes(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    /// Encrypt a secret, producing `nonce ∥ ciphertext`
    pub fn encrypt(&self, plaintext: &str) -> Result<Vec<u8>, CredentialError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CredentialError::Encryption)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Decrypt a `nonce ∥ ciphertext` blob
    ///
    /// Fails with `Decryption` on truncated input, tampered ciphertext, or a
    /// key mismatch. Callers treat this as fatal for the credential.
    pub fn decrypt(&self, blob: &[u8]) -> Result<String, CredentialError> {
        if blob.len() <= NONCE_LEN {
            return Err(CredentialError::Decryption);
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CredentialError::Decryption)?;
        String::from_utf8(plaintext).map_err(|_| CredentialError::Decryption)
    }
}
