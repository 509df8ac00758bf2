#![warn(missing_docs)]

//! # Skein Credential
//!
//! Credential material handling: AES-256-GCM sealed blobs, per-user
//! isolated fetch, a short-TTL decryption cache, and OAuth token refresh.
//!
//! The symmetric key exists only in process memory (zeroized on drop);
//! decrypted values are never logged and never leave the manager except to
//! the execution context that requested them.

pub mod crypto;
pub mod error;
pub mod manager;

pub use crypto::{EncryptionKey, SealedBlob};
pub use error::CredentialError;
pub use manager::{CredentialManager, credential_type_catalog};
