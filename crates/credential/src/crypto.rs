//! AES-256-GCM sealing of credential payloads.
//!
//! Wire format of a sealed blob: `base64(nonce ‖ ciphertext)`, with the
//! 12-byte nonce generated fresh per seal. The key is derived from
//! operator-provided key material via SHA-256, so any sufficiently long
//! secret string works as `SKEIN_CREDENTIAL_KEY`.

use aes_gcm::aead::{Aead, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, KeyInit, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::{ExposeSecret, SecretBox};
use sha2::{Digest, Sha256};

use crate::error::CredentialError;

const NONCE_LEN: usize = 12;

/// A sealed (encrypted, base64-encoded) payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBlob(pub String);

impl SealedBlob {
    /// The transport form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The process-scoped symmetric key. Key bytes are zeroized on drop and
/// never appear in `Debug` output.
pub struct EncryptionKey {
    key: SecretBox<[u8; 32]>,
}

impl EncryptionKey {
    /// Derive the key from operator key material.
    #[must_use]
    pub fn derive(material: &str) -> Self {
        let digest = Sha256::digest(material.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self {
            key: SecretBox::new(Box::new(key)),
        }
    }

    /// Seal a plaintext payload.
    pub fn seal(&self, plaintext: &[u8]) -> Result<SealedBlob, CredentialError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.key.expose_secret()));
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CredentialError::Encryption)?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);
        Ok(SealedBlob(BASE64.encode(combined)))
    }

    /// Open a sealed payload.
    pub fn open(&self, blob: &str) -> Result<Vec<u8>, CredentialError> {
        let combined = BASE64
            .decode(blob)
            .map_err(|_| CredentialError::Decryption)?;
        if combined.len() <= NONCE_LEN {
            return Err(CredentialError::Decryption);
        }
        let (nonce, ciphertext) = combined.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.key.expose_secret()));
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CredentialError::Decryption)
    }

    /// Seal a JSON value.
    pub fn seal_json(&self, value: &serde_json::Value) -> Result<SealedBlob, CredentialError> {
        let bytes = serde_json::to_vec(value)?;
        self.seal(&bytes)
    }

    /// Open a sealed payload as JSON.
    pub fn open_json(&self, blob: &str) -> Result<serde_json::Value, CredentialError> {
        let bytes = self.open(blob)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let key = EncryptionKey::derive("test key material");
        let blob = key.seal(b"secret payload").unwrap();
        assert_eq!(key.open(blob.as_str()).unwrap(), b"secret payload");
    }

    #[test]
    fn nonces_differ_per_seal() {
        let key = EncryptionKey::derive("k");
        let a = key.seal(b"same").unwrap();
        let b = key.seal(b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let sealed = EncryptionKey::derive("key one").seal(b"data").unwrap();
        let err = EncryptionKey::derive("key two")
            .open(sealed.as_str())
            .unwrap_err();
        assert!(matches!(err, CredentialError::Decryption));
    }

    #[test]
    fn tampered_blob_fails() {
        let key = EncryptionKey::derive("k");
        let mut blob = key.seal(b"data").unwrap().0;
        blob.replace_range(..2, "zz");
        assert!(key.open(&blob).is_err());
    }

    #[test]
    fn garbage_input_fails_cleanly() {
        let key = EncryptionKey::derive("k");
        assert!(key.open("not base64 !!!").is_err());
        assert!(key.open("").is_err());
    }

    #[test]
    fn json_roundtrip() {
        let key = EncryptionKey::derive("k");
        let value = json!({"api_key": "sk-123", "nested": {"n": 1}});
        let blob = key.seal_json(&value).unwrap();
        assert_eq!(key.open_json(blob.as_str()).unwrap(), value);
    }

    #[test]
    fn debug_never_shows_key() {
        let key = EncryptionKey::derive("super secret");
        assert_eq!(format!("{key:?}"), "EncryptionKey(..)");
    }
}
