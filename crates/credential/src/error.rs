//! Credential errors.

use thiserror::Error;

/// Errors raised by the credential manager.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Payload could not be encrypted.
    #[error("encryption failed")]
    Encryption,

    /// Payload could not be decrypted (wrong key, tampered or truncated
    /// blob). Deliberately carries no detail.
    #[error("decryption failed")]
    Decryption,

    /// The credential does not exist or is not visible to the caller.
    #[error("credential not found")]
    NotFound,

    /// OAuth refresh failed.
    #[error("token refresh failed: {0}")]
    Refresh(String),

    /// Underlying storage failure.
    #[error(transparent)]
    Storage(#[from] skein_storage::StorageError),

    /// Payload (de)serialization failure.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}
