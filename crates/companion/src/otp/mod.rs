//! One-time passcodes for phone login.
//!
//! Codes are held in an explicit [`OtpStore`] owned by the application state,
//! never in a process-wide map. A background task evicts expired entries.
//!
//! # Security invariants
//!
//! - Codes are stored as SHA-256 digests only.
//! - Codes and phone numbers are never logged.

pub mod store;

pub use store::{normalize_phone, OtpError, OtpStore};

use std::time::Duration;

use tokio::time;
use tracing::debug;

/// Spawn a background task that periodically drops expired codes.
pub fn purge_task(store: OtpStore, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        // First tick fires immediately; nothing to purge yet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = store.purge_expired().await;
            if removed > 0 {
                let pending = store.len().await;
                debug!(removed, pending, "purged expired one-time codes");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn purge_task_evicts_expired_codes_on_tick() {
        let store = OtpStore::new(Duration::from_secs(1), 5);
        store.issue("+919876543210").await.unwrap();
        let task = purge_task(store.clone(), Duration::from_secs(10));

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.len().await, 1, "no purge before the first interval");

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(store.len().await, 0);
        task.abort();
    }
}
