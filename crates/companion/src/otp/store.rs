//! [`OtpStore`]: expiring, single-use passcodes keyed by phone number.

use std::{collections::HashMap, sync::Arc, time::Duration};

use aes_gcm::aead::{rand_core::RngCore, OsRng};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::{sync::RwLock, time::Instant};

/// Number of decimal digits in an issued code.
pub const CODE_DIGITS: usize = 6;

const CODE_SPACE: u32 = 1_000_000;

/// Largest multiple of [`CODE_SPACE`] that fits in a `u32`; draws at or above
/// it are rejected to keep codes uniform.
const REJECTION_LIMIT: u32 = (u32::MAX / CODE_SPACE) * CODE_SPACE;

/// Errors produced by the OTP layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OtpError {
    #[error("invalid phone number")]
    InvalidPhone,

    /// No code has been issued for this phone (or it was already used).
    #[error("no pending code for this phone")]
    NotFound,

    #[error("code expired")]
    Expired,

    #[error("code does not match")]
    Mismatch,

    /// The pending code was discarded after too many wrong guesses.
    #[error("too many attempts")]
    TooManyAttempts,
}

#[derive(Debug)]
struct OtpEntry {
    digest: [u8; 32],
    expires_at: Instant,
    failed_attempts: u32,
}

impl OtpEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Thread-safe store of pending passcodes.
///
/// Only the SHA-256 digest of each code is kept. Entries expire after the
/// configured TTL and are removed on access or by [`OtpStore::purge_expired`].
/// An entry is also discarded once it has absorbed `max_attempts` wrong
/// guesses, so a code cannot be brute-forced within its lifetime.
#[derive(Clone, Debug)]
pub struct OtpStore {
    inner: Arc<RwLock<HashMap<String, OtpEntry>>>,
    ttl: Duration,
    max_attempts: u32,
}

impl OtpStore {
    /// Create an empty store whose codes live for `ttl` and survive at most
    /// `max_attempts` wrong guesses.
    pub fn new(ttl: Duration, max_attempts: u32) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of pending entries, expired ones included until purged.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Issue a fresh code for `phone`, replacing any pending one.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::InvalidPhone`] if the number does not normalise.
    pub async fn issue(&self, phone: &str) -> Result<String, OtpError> {
        let phone = normalize_phone(phone)?;
        let code = generate_code();
        let entry = OtpEntry {
            digest: digest(&code),
            expires_at: Instant::now() + self.ttl,
            failed_attempts: 0,
        };
        self.inner.write().await.insert(phone, entry);
        Ok(code)
    }

    /// Check `code` against the pending entry for `phone`.
    ///
    /// A match consumes the entry. An expired entry is removed and reported as
    /// [`OtpError::Expired`]. A mismatch leaves the entry in place until the
    /// attempt limit is reached; the guess that reaches it removes the entry
    /// and reports [`OtpError::TooManyAttempts`].
    pub async fn verify(&self, phone: &str, code: &str) -> Result<(), OtpError> {
        let phone = normalize_phone(phone)?;
        let mut map = self.inner.write().await;
        let entry = map.get_mut(&phone).ok_or(OtpError::NotFound)?;

        if entry.is_expired(Instant::now()) {
            map.remove(&phone);
            return Err(OtpError::Expired);
        }
        if entry.digest != digest(code.trim()) {
            entry.failed_attempts += 1;
            if entry.failed_attempts >= self.max_attempts {
                map.remove(&phone);
                return Err(OtpError::TooManyAttempts);
            }
            return Err(OtpError::Mismatch);
        }
        map.remove(&phone);
        Ok(())
    }

    /// Drop every expired entry, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut map = self.inner.write().await;
        let before = map.len();
        map.retain(|_, entry| !entry.is_expired(now));
        before - map.len()
    }
}

/// Trim the number and check it is an optional `+` followed by 6–15 digits.
pub fn normalize_phone(phone: &str) -> Result<String, OtpError> {
    let phone = phone.trim();
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if !(6..=15).contains(&digits.len()) || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(OtpError::InvalidPhone);
    }
    Ok(phone.to_owned())
}

fn generate_code() -> String {
    let value = loop {
        let draw = OsRng.next_u32();
        if draw < REJECTION_LIMIT {
            break draw % CODE_SPACE;
        }
    };
    format!("{value:0width$}", width = CODE_DIGITS)
}

fn digest(code: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(code.as_bytes()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHONE: &str = "+919876543210";
    const ATTEMPTS: u32 = 5;

    fn wrong_code(code: &str) -> &'static str {
        if code == "000000" {
            "000001"
        } else {
            "000000"
        }
    }

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_DIGITS);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn phone_validation() {
        assert_eq!(normalize_phone("  +91987654 ").unwrap(), "+91987654");
        assert_eq!(normalize_phone("98765"), Err(OtpError::InvalidPhone));
        assert_eq!(normalize_phone("98765abc12"), Err(OtpError::InvalidPhone));
        assert_eq!(normalize_phone("+1234567890123456"), Err(OtpError::InvalidPhone));
    }

    #[tokio::test]
    async fn issue_then_verify_consumes_code() {
        let store = OtpStore::new(Duration::from_secs(300), ATTEMPTS);
        let code = store.issue(PHONE).await.unwrap();
        assert_eq!(store.len().await, 1);
        store.verify(PHONE, &code).await.unwrap();
        assert_eq!(store.verify(PHONE, &code).await, Err(OtpError::NotFound));
    }

    #[tokio::test]
    async fn mismatch_keeps_entry() {
        let store = OtpStore::new(Duration::from_secs(300), ATTEMPTS);
        let code = store.issue(PHONE).await.unwrap();
        assert_eq!(store.verify(PHONE, wrong_code(&code)).await, Err(OtpError::Mismatch));
        assert!(store.verify(PHONE, &code).await.is_ok());
    }

    #[tokio::test]
    async fn reissue_replaces_previous_code() {
        let store = OtpStore::new(Duration::from_secs(300), ATTEMPTS);
        let first = store.issue(PHONE).await.unwrap();
        let second = store.issue(PHONE).await.unwrap();
        assert_eq!(store.len().await, 1);
        if first != second {
            assert_eq!(store.verify(PHONE, &first).await, Err(OtpError::Mismatch));
        }
        assert!(store.verify(PHONE, &second).await.is_ok());
    }

    #[tokio::test]
    async fn expired_code_is_rejected_and_removed() {
        let store = OtpStore::new(Duration::ZERO, ATTEMPTS);
        let code = store.issue(PHONE).await.unwrap();
        assert_eq!(store.verify(PHONE, &code).await, Err(OtpError::Expired));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn purge_removes_only_expired() {
        let expired = OtpStore::new(Duration::ZERO, ATTEMPTS);
        expired.issue(PHONE).await.unwrap();
        expired.issue("+14155550100").await.unwrap();
        assert_eq!(expired.purge_expired().await, 2);
        assert_eq!(expired.len().await, 0);

        let live = OtpStore::new(Duration::from_secs(300), ATTEMPTS);
        live.issue(PHONE).await.unwrap();
        assert_eq!(live.purge_expired().await, 0);
        assert_eq!(live.len().await, 1);
    }

    #[tokio::test]
    async fn correct_code_is_refused_after_attempt_limit() {
        let store = OtpStore::new(Duration::from_secs(300), ATTEMPTS);
        let code = store.issue(PHONE).await.unwrap();
        let wrong = wrong_code(&code);
        for _ in 1..ATTEMPTS {
            assert_eq!(store.verify(PHONE, wrong).await, Err(OtpError::Mismatch));
        }
        assert_eq!(
            store.verify(PHONE, wrong).await,
            Err(OtpError::TooManyAttempts)
        );
        assert_eq!(store.len().await, 0);
        assert_eq!(store.verify(PHONE, &code).await, Err(OtpError::NotFound));
    }

    #[tokio::test]
    async fn reissue_resets_attempt_count() {
        let store = OtpStore::new(Duration::from_secs(300), 2);
        let first = store.issue(PHONE).await.unwrap();
        assert_eq!(
            store.verify(PHONE, wrong_code(&first)).await,
            Err(OtpError::Mismatch)
        );
        let second = store.issue(PHONE).await.unwrap();
        assert_eq!(
            store.verify(PHONE, wrong_code(&second)).await,
            Err(OtpError::Mismatch)
        );
        assert!(store.verify(PHONE, &second).await.is_ok());
    }
}
