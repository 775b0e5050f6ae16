//! Hospital and NGO directory: seed-file loading, caching, and search.
//!
//! # Responsibilities
//!
//! - Read the directory seed (YAML, falling back to JSON) at startup and on a
//!   refresh interval.
//! - Validate the snapshot (unique ids, sane coordinates) and swap it into
//!   [`DirectoryCache`].
//! - Text search plus optional geo ranking for the HTTP handlers.
//! - Accept and persist user-submitted NGOs, which survive seed reloads.
//!
//! # Module invariants
//!
//! - **No crypto dependencies.** Directory data is public and never touches
//!   `crate::crypto`.

pub mod cache;
pub mod model;
pub mod nearby;
pub mod submissions;

pub use cache::{DirectoryCache, DirectoryError, DirectorySnapshot};
pub use model::{search_hospitals, search_ngos, Hospital, HospitalFilter, Listing, Ngo};
pub use nearby::nearby;
pub use submissions::NgoSubmissions;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio::time;
use tracing::{info, warn};

/// Where the directory seed comes from.
///
/// `read` may block; [`load_all`] calls it on the blocking pool.
#[cfg_attr(test, mockall::automock)]
pub trait DirectorySource: Send + Sync {
    /// Human-readable origin, used in log fields.
    fn describe(&self) -> String;

    /// Return the full seed document as text.
    fn read(&self) -> Result<String>;
}

/// Seed file on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DirectorySource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read(&self) -> Result<String> {
        std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read directory file {}", self.path.display()))
    }
}

/// Parse a seed document, trying YAML first and JSON second.
///
/// # Errors
///
/// Returns an error if the text is neither, or if validation fails.
pub fn parse_snapshot(text: &str) -> Result<DirectorySnapshot> {
    let snapshot: DirectorySnapshot = if let Ok(parsed) = serde_yaml::from_str(text) {
        parsed
    } else if let Ok(parsed) = serde_json::from_str(text) {
        parsed
    } else {
        anyhow::bail!("failed to parse directory: not valid YAML or JSON");
    };
    Ok(snapshot.validate()?)
}

/// Read, parse and validate the directory, then atomically replace the cache.
///
/// # Errors
///
/// Returns an error if the source cannot be read or the document is invalid.
/// The cache is left untouched in that case.
pub async fn load_all(source: Arc<dyn DirectorySource>, cache: &DirectoryCache) -> Result<()> {
    let reader = Arc::clone(&source);
    let text = tokio::task::spawn_blocking(move || reader.read())
        .await
        .context("directory read task failed")??;
    let snapshot = parse_snapshot(&text)
        .with_context(|| format!("invalid directory from {}", source.describe()))?;

    if snapshot.hospitals.is_empty() && snapshot.ngos.is_empty() {
        warn!(source = %source.describe(), "directory has no entries");
    }

    cache.replace(snapshot);
    info!(
        source = %source.describe(),
        hospitals = cache.hospital_count(),
        ngos = cache.ngo_count(),
        "directory loaded"
    );
    Ok(())
}

/// Spawn a background task that periodically reloads the directory.
///
/// On failure the previous snapshot is retained and a warning is emitted;
/// the service continues to serve stale entries.
pub fn refresh_task(
    source: Arc<dyn DirectorySource>,
    interval: Duration,
    cache: DirectoryCache,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        // The first tick fires immediately; startup already loaded once.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = load_all(Arc::clone(&source), &cache).await {
                warn!(error = %e, "directory refresh failed; retaining previous snapshot");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    const YAML: &str = r#"
hospitals:
  - id: 1
    name: Balrampur Hospital
    city: Lucknow
    type: Government
    beds: 756
    lat: 26.8467
    lng: 80.9462
  - id: 2
    name: Unmapped Clinic
ngos:
  - id: 10
    name: Sahayata Trust
    city: Lucknow
"#;

    fn source_returning(text: &'static str) -> Arc<dyn DirectorySource> {
        let mut source = MockDirectorySource::new();
        source.expect_read().returning(move || Ok(text.to_owned()));
        source.expect_describe().returning(|| "mock".to_owned());
        Arc::new(source)
    }

    #[test]
    fn parses_yaml() {
        let snap = parse_snapshot(YAML).unwrap();
        assert_eq!(snap.hospitals.len(), 2);
        assert_eq!(snap.hospitals[0].kind.as_deref(), Some("Government"));
        assert_eq!(snap.hospitals[1].lat, None);
        assert_eq!(snap.ngos[0].id, 10);
    }

    #[test]
    fn parses_json() {
        let snap = parse_snapshot(r#"{"hospitals":[{"id":5,"name":"PGI","lat":26.74,"lng":80.93}]}"#)
            .unwrap();
        assert_eq!(snap.hospitals[0].id, 5);
        assert!(snap.ngos.is_empty());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_snapshot("hospitals: [ {id: ").is_err());
    }

    #[tokio::test]
    async fn load_all_replaces_cache() {
        let cache = DirectoryCache::new();
        load_all(source_returning(YAML), &cache).await.unwrap();
        assert_eq!(cache.hospital_count(), 2);
        assert_eq!(cache.ngo_count(), 1);
    }

    #[tokio::test]
    async fn failed_load_keeps_previous_snapshot() {
        let cache = DirectoryCache::new();
        load_all(source_returning(YAML), &cache).await.unwrap();

        let mut broken = MockDirectorySource::new();
        broken
            .expect_read()
            .returning(|| Err(anyhow::anyhow!("file vanished")));
        broken.expect_describe().returning(|| "mock".to_owned());

        assert!(load_all(Arc::new(broken), &cache).await.is_err());
        assert_eq!(cache.hospital_count(), 2);
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let cache = DirectoryCache::new();
        let dup = "hospitals:\n  - {id: 1, name: A}\n  - {id: 1, name: B}\n";
        assert!(load_all(source_returning(dup), &cache).await.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn file_source_reports_missing_file() {
        let source = FileSource::new("/nonexistent/directory.yaml");
        assert!(source.read().is_err());
        assert_eq!(source.describe(), "/nonexistent/directory.yaml");
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_failure_keeps_loaded_snapshot() {
        let reads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reads);
        let mut source = MockDirectorySource::new();
        source.expect_read().returning(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(YAML.to_owned())
            } else {
                Err(anyhow::anyhow!("seed file unreadable"))
            }
        });
        source.expect_describe().returning(|| "mock".to_owned());
        let source: Arc<dyn DirectorySource> = Arc::new(source);

        let cache = DirectoryCache::new();
        load_all(Arc::clone(&source), &cache).await.unwrap();
        let task = refresh_task(source, Duration::from_secs(60), cache.clone());

        // Two failed refreshes after the initial load.
        while reads.load(Ordering::SeqCst) < 3 {
            time::sleep(Duration::from_secs(30)).await;
        }
        assert_eq!(cache.hospital_count(), 2);
        assert_eq!(cache.ngo(10).unwrap().name, "Sahayata Trust");
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_picks_up_new_seed() {
        let reads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reads);
        let mut source = MockDirectorySource::new();
        source.expect_read().returning(move || {
            Ok(if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                YAML.to_owned()
            } else {
                "hospitals:\n  - {id: 9, name: KGMU}\n".to_owned()
            })
        });
        source.expect_describe().returning(|| "mock".to_owned());
        let source: Arc<dyn DirectorySource> = Arc::new(source);

        let cache = DirectoryCache::new();
        load_all(Arc::clone(&source), &cache).await.unwrap();
        let task = refresh_task(source, Duration::from_secs(60), cache.clone());

        while cache.hospital(9).is_err() {
            time::sleep(Duration::from_secs(30)).await;
        }
        assert_eq!(cache.hospital_count(), 1);
        assert_eq!(cache.ngo_count(), 0);
        task.abort();
    }
}
