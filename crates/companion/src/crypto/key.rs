//! [`FieldKey`]: loading and holding the 256-bit field-encryption key.

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Fixed-size key buffer that holds exactly [`KEY_LEN`] bytes.
///
/// When this type is dropped, the memory is overwritten with zeroes to
/// minimise the window during which plaintext key material lives in RAM.
pub struct FieldKey(Box<[u8; KEY_LEN]>);

impl FieldKey {
    /// Wrap raw key bytes.
    ///
    /// Returns `None` unless `bytes` is exactly [`KEY_LEN`] long.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != KEY_LEN {
            return None;
        }
        let mut buf = Box::new([0u8; KEY_LEN]);
        buf.copy_from_slice(bytes);
        Some(Self(buf))
    }

    /// Parse the external (standard base64) representation of the key.
    ///
    /// Absent or blank input is [`KeyStatus::Missing`]. Undecodable input or
    /// a decoded length other than [`KEY_LEN`] is [`KeyStatus::Invalid`],
    /// which callers treat the same as missing.
    pub fn load(encoded: Option<&str>) -> KeyStatus {
        let encoded = match encoded.map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => return KeyStatus::Missing,
        };
        let mut raw = match STANDARD.decode(encoded) {
            Ok(raw) => raw,
            Err(_) => return KeyStatus::Invalid("not valid base64"),
        };
        let status = match Self::from_bytes(&raw) {
            Some(key) => KeyStatus::Usable(key),
            None => KeyStatus::Invalid("decoded key is not 32 bytes"),
        };
        raw.iter_mut().for_each(|b| *b = 0);
        status
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl Drop for FieldKey {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material, not even in debug builds.
        f.write_str("FieldKey([REDACTED])")
    }
}

/// Outcome of loading the configured key.
#[derive(Debug)]
pub enum KeyStatus {
    /// A 32-byte key is available.
    Usable(FieldKey),
    /// No key is configured.
    Missing,
    /// A key is configured but unusable; the reason is safe to log.
    Invalid(&'static str),
}
