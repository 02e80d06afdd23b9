//! Payload encryption for the CAT2 route
//!
//! The transform itself sits behind [`PayloadEncryptor`]; the shipped
//! implementation is AES-256-GCM with a random 96-bit nonce written in
//! front of the ciphertext:
//!
//! ```text
//! | nonce (12 bytes) | ciphertext | GCM tag (16 bytes) |
//! ```
//!
//! [`EncryptionStage`] decides whether a bundle needs the transform at all:
//! names matching the encryption-exclusion patterns are already encrypted
//! and pass through unchanged.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use zeroize::Zeroizing;

use super::filter::PatternSet;
use crate::error::Result;
use crate::protocol::s3::{read_body, ObjectBody, ObjectRef};

/// AES-256-GCM nonce size (96 bits = 12 bytes).
const NONCE_SIZE: usize = 12;

/// AES-256 key size (256 bits = 32 bytes).
pub const KEY_SIZE: usize = 32;

/// Encryption errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Encryption failed.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed (likely tampered data or wrong key).
    #[error("decryption failed: data may be corrupted or tampered")]
    DecryptionFailed,

    /// Key material is not a base64-encoded 32-byte key.
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),
}

/// Result type for crypto operations.
pub type CryptoResult<T> = std::result::Result<T, CryptoError>;

/// Opaque byte transform applied to bundles on the CAT2 route
pub trait PayloadEncryptor: Send + Sync {
    /// Encrypt a complete payload. Either the whole output or an error.
    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>>;
}

/// AES-256-GCM payload encryptor.
///
/// The key is zeroed from memory when the encryptor is dropped.
pub struct AesGcmEncryptor {
    key: Zeroizing<[u8; KEY_SIZE]>,
}

impl AesGcmEncryptor {
    /// Creates an encryptor from raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not exactly 32 bytes.
    pub fn new(key: &[u8]) -> CryptoResult<Self> {
        if key.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKey(format!(
                "expected {} bytes, got {}",
                KEY_SIZE,
                key.len()
            )));
        }
        let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
        bytes.copy_from_slice(key);
        Ok(Self { key: bytes })
    }

    /// Creates an encryptor from a base64-encoded key.
    pub fn from_base64(encoded: &SecretString) -> CryptoResult<Self> {
        let decoded = Zeroizing::new(
            base64::engine::general_purpose::STANDARD
                .decode(encoded.expose_secret().trim())
                .map_err(|e| CryptoError::InvalidKey(e.to_string()))?,
        );
        Self::new(&decoded)
    }

    fn cipher(&self) -> CryptoResult<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.key[..])
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
    }

    /// Reverses [`PayloadEncryptor::encrypt`]
    pub fn decrypt(&self, sealed: &[u8]) -> CryptoResult<Vec<u8>> {
        if sealed.len() < NONCE_SIZE {
            return Err(CryptoError::DecryptionFailed);
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        self.cipher()
            .map_err(|_| CryptoError::DecryptionFailed)?
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

impl PayloadEncryptor for AesGcmEncryptor {
    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher()?
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }
}

/// Bytes ready for upload
pub struct PreparedPayload {
    pub bytes: Zeroizing<Vec<u8>>,
    /// False when the name matched an encryption-exclusion pattern
    pub encrypted: bool,
}

impl PreparedPayload {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Applies the encryptor unless the bundle is already encrypted
pub struct EncryptionStage<'a> {
    exclusions: &'a PatternSet,
    encryptor: Option<&'a dyn PayloadEncryptor>,
}

impl<'a> EncryptionStage<'a> {
    pub fn new(exclusions: &'a PatternSet, encryptor: Option<&'a dyn PayloadEncryptor>) -> Self {
        Self {
            exclusions,
            encryptor,
        }
    }

    /// True when `object` skips encryption
    pub fn is_excluded(&self, object: &ObjectRef) -> bool {
        self.exclusions.matches(&object.key)
    }

    /// Read the whole body and produce the bytes to upload.
    ///
    /// The caller keeps ownership of `body` and is responsible for closing it.
    pub async fn prepare(
        &self,
        object: &ObjectRef,
        body: &mut dyn ObjectBody,
    ) -> Result<PreparedPayload> {
        let raw = read_body(body).await?;
        tracing::debug!(object = %object, bytes = raw.len(), "Bundle downloaded");

        if self.is_excluded(object) {
            tracing::info!(object = %object, "Bundle is already encrypted. Skipping encryption step");
            return Ok(PreparedPayload {
                bytes: raw,
                encrypted: false,
            });
        }

        let encryptor = self.encryptor.ok_or_else(|| {
            crate::error::RelayError::Config("no payload encryptor configured".to_string())
        })?;

        tracing::info!(object = %object, "Encrypting bundle contents");
        let sealed = Zeroizing::new(encryptor.encrypt(&raw)?);
        tracing::info!(object = %object, bytes = sealed.len(), "Bundle encrypted");

        Ok(PreparedPayload {
            bytes: sealed,
            encrypted: true,
        })
    }
}
