//! AES-256-GCM encryption and decryption of individual string fields.
//!
//! **IV length:** the cipher is instantiated with a 16-byte (128-bit) nonce so
//! that values written by earlier deployments keep decrypting. GCM derives its
//! counter block from a non-96-bit IV through GHASH; the result is still a
//! standard AES-256-GCM construction.
//!
//! **Never reuse an IV under the same key.** Each call draws a fresh IV from the
//! OS CSPRNG.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use aes_gcm::{
    aead::{consts::U16, rand_core::RngCore, AeadInPlace, KeyInit, OsRng},
    aes::Aes256,
    AesGcm, Key, Nonce, Tag,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::key::{FieldKey, KeyStatus};

/// Byte length of the initialisation vector prefix.
pub const IV_LEN: usize = 16;

/// Byte length of the GCM authentication tag.
pub const TAG_LEN: usize = 16;

/// Shortest decoded value that can have come from [`FieldCipher::encrypt_field`].
pub const HEADER_LEN: usize = IV_LEN + TAG_LEN;

/// AES-256-GCM with a 128-bit nonce and a 128-bit tag.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// Errors produced by the cipher layer.
#[derive(Debug, Error)]
pub enum CipherError {
    /// No usable key is configured.
    #[error("no field-encryption key configured")]
    NoKey,

    /// The stored value is not base64 or is too short to carry an IV and tag.
    #[error("value is not an encrypted field")]
    NotEncrypted,

    /// AES-GCM encryption failed, or the tag did not verify (wrong key or tampered data).
    #[error("aead operation failed")]
    AeadFailure,

    /// Decryption succeeded but the plaintext is not UTF-8.
    #[error("decrypted field is not valid UTF-8")]
    InvalidUtf8,

    /// JSON (de)serialisation of a structured field failed.
    #[error("field JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Counters for the degraded paths, exposed on the health endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CipherStats {
    /// Fields stored without encryption because no key was configured.
    pub plaintext_writes: u64,
    /// Stored fields that failed authentication and were returned unchanged.
    pub decrypt_failures: u64,
}

struct Inner {
    aead: Option<Aes256Gcm16>,
    plaintext_writes: AtomicU64,
    decrypt_failures: AtomicU64,
}

/// Field-level codec shared by every request handler.
///
/// The key is parsed once when the cipher is built; the value is cheaply
/// cloneable and read-only afterwards, so no locking is needed.
#[derive(Clone)]
pub struct FieldCipher {
    inner: Arc<Inner>,
}

impl FieldCipher {
    /// Build a cipher from the outcome of [`FieldKey::load`].
    ///
    /// A missing or invalid key yields a pass-through cipher: fields are stored
    /// and returned as plaintext. That availability-over-confidentiality mode is
    /// announced once here at `warn`.
    pub fn new(status: KeyStatus) -> Self {
        match status {
            KeyStatus::Usable(key) => {
                info!("field encryption enabled (AES-256-GCM)");
                Self::from_key(&key)
            }
            KeyStatus::Missing => {
                warn!("ENCRYPTION_KEY not set; profile fields will be stored as plaintext");
                Self::disabled()
            }
            KeyStatus::Invalid(reason) => {
                warn!(
                    reason,
                    "ENCRYPTION_KEY unusable; profile fields will be stored as plaintext"
                );
                Self::disabled()
            }
        }
    }

    /// Build an enabled cipher from a key.
    pub fn from_key(key: &FieldKey) -> Self {
        Self::with_aead(Some(Aes256Gcm16::new(Key::<Aes256Gcm16>::from_slice(
            key.as_bytes(),
        ))))
    }

    /// Build a pass-through cipher with no key.
    pub fn disabled() -> Self {
        Self::with_aead(None)
    }

    fn with_aead(aead: Option<Aes256Gcm16>) -> Self {
        Self {
            inner: Arc::new(Inner {
                aead,
                plaintext_writes: AtomicU64::new(0),
                decrypt_failures: AtomicU64::new(0),
            }),
        }
    }

    /// Returns `true` if a usable key is configured.
    pub fn is_enabled(&self) -> bool {
        self.inner.aead.is_some()
    }

    /// Snapshot of the degraded-path counters.
    pub fn stats(&self) -> CipherStats {
        CipherStats {
            plaintext_writes: self.inner.plaintext_writes.load(Ordering::Relaxed),
            decrypt_failures: self.inner.decrypt_failures.load(Ordering::Relaxed),
        }
    }

    /// Encrypt a plaintext field into `base64(iv || tag || ciphertext)`.
    ///
    /// Without a key the plaintext is returned unchanged and counted in
    /// [`CipherStats::plaintext_writes`].
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::AeadFailure`] on an internal AEAD error (only
    /// reachable for inputs beyond the GCM length limit).
    pub fn encrypt_field(&self, plaintext: &str) -> Result<String, CipherError> {
        let Some(aead) = &self.inner.aead else {
            self.inner.plaintext_writes.fetch_add(1, Ordering::Relaxed);
            debug!("no field-encryption key; storing field as plaintext");
            return Ok(plaintext.to_owned());
        };

        let mut out = vec![0u8; HEADER_LEN + plaintext.len()];
        let (header, body) = out.split_at_mut(HEADER_LEN);
        let (iv, tag_slot) = header.split_at_mut(IV_LEN);

        OsRng.fill_bytes(iv);
        body.copy_from_slice(plaintext.as_bytes());

        let tag = aead
            .encrypt_in_place_detached(Nonce::<U16>::from_slice(iv), b"", body)
            .map_err(|_| CipherError::AeadFailure)?;
        tag_slot.copy_from_slice(&tag);

        Ok(STANDARD.encode(out))
    }

    /// Strict decryption: returns a tagged error instead of falling back.
    ///
    /// # Errors
    ///
    /// - [`CipherError::NoKey`] if no key is configured.
    /// - [`CipherError::NotEncrypted`] if `stored` is not base64 or decodes to
    ///   fewer than [`HEADER_LEN`] bytes.
    /// - [`CipherError::AeadFailure`] if the tag does not verify.
    /// - [`CipherError::InvalidUtf8`] if the plaintext is not UTF-8.
    pub fn try_decrypt_field(&self, stored: &str) -> Result<String, CipherError> {
        let aead = self.inner.aead.as_ref().ok_or(CipherError::NoKey)?;

        let mut raw = STANDARD
            .decode(stored)
            .map_err(|_| CipherError::NotEncrypted)?;
        if raw.len() < HEADER_LEN {
            return Err(CipherError::NotEncrypted);
        }

        let (header, body) = raw.split_at_mut(HEADER_LEN);
        let (iv, tag) = header.split_at(IV_LEN);
        aead.decrypt_in_place_detached(
            Nonce::<U16>::from_slice(iv),
            b"",
            body,
            Tag::<U16>::from_slice(tag),
        )
        .map_err(|_| CipherError::AeadFailure)?;

        String::from_utf8(body.to_vec()).map_err(|_| CipherError::InvalidUtf8)
    }

    /// Lenient (fail-open) decryption.
    ///
    /// Returns the plaintext on success. In every other case the stored value
    /// is returned unchanged: no key, a value that was never encrypted, or a
    /// value that fails authentication. Authentication failures are logged at
    /// `warn` and counted in [`CipherStats::decrypt_failures`]; callers that
    /// need to tell these apart use [`FieldCipher::try_decrypt_field`].
    pub fn decrypt_field(&self, stored: &str) -> String {
        match self.try_decrypt_field(stored) {
            Ok(plaintext) => plaintext,
            Err(CipherError::NoKey) => stored.to_owned(),
            Err(CipherError::NotEncrypted) => {
                debug!("stored field is not in encrypted form; returning as-is");
                stored.to_owned()
            }
            Err(e) => {
                self.inner.decrypt_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "field decryption failed; returning stored value unchanged");
                stored.to_owned()
            }
        }
    }

    /// Serialise `value` as JSON text and encrypt it as a single field.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Json`] if serialisation fails, or any error from
    /// [`FieldCipher::encrypt_field`].
    pub fn encrypt_json<T: Serialize>(&self, value: &T) -> Result<String, CipherError> {
        let text = serde_json::to_string(value)?;
        self.encrypt_field(&text)
    }

    /// Decrypt a field produced by [`FieldCipher::encrypt_json`] and parse it.
    ///
    /// Uses the lenient path, so JSON stored as plaintext (no key at write
    /// time) still parses.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Json`] if the recovered text is not valid JSON
    /// for `T`.
    pub fn decrypt_json<T: DeserializeOwned>(&self, stored: &str) -> Result<T, CipherError> {
        let text = self.decrypt_field(stored);
        Ok(serde_json::from_str(&text)?)
    }
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCipher")
            .field("enabled", &self.is_enabled())
            .field("stats", &self.stats())
            .finish()
    }
}

impl Default for FieldCipher {
    fn default() -> Self {
        Self::disabled()
    }
}
