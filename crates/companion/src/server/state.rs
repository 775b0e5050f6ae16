//! Shared application state injected into every Axum handler.

use std::{path::Path, sync::Arc};

use crate::appointments::AppointmentStore;
use crate::auth::SessionSigner;
use crate::config::Config;
use crate::crypto::FieldCipher;
use crate::directory::{DirectoryCache, NgoSubmissions};
use crate::geo::RadiusBounds;
use crate::metrics::MetricStore;
use crate::otp::OtpStore;
use crate::persist::{FileRepo, PersistError, RecordRepo};
use crate::profile::ProfileStore;

use super::middleware::AuthThrottle;

/// Backing storage for each persisted collection.
#[derive(Clone)]
pub struct RecordRepos {
    pub profiles: Arc<dyn RecordRepo>,
    pub appointments: Arc<dyn RecordRepo>,
    pub metrics: Arc<dyn RecordRepo>,
    pub ngos: Arc<dyn RecordRepo>,
}

impl RecordRepos {
    /// One JSON file per collection under `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            profiles: Arc::new(FileRepo::in_dir(dir, "profiles.json")),
            appointments: Arc::new(FileRepo::in_dir(dir, "appointments.json")),
            metrics: Arc::new(FileRepo::in_dir(dir, "metrics.json")),
            ngos: Arc::new(FileRepo::in_dir(dir, "ngos.json")),
        }
    }
}

/// Application state shared across all request handlers.
///
/// All fields are cheaply cloneable (`Arc`-wrapped or already `Arc`-backed) so
/// that Axum can clone the state for each request without copying expensive data.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Field codec; also the source of the degraded-path counters.
    pub cipher: FieldCipher,
    /// Profiles with encrypted PII fields.
    pub profiles: ProfileStore,
    pub appointments: AppointmentStore,
    pub metrics: MetricStore,
    /// Pending one-time codes.
    pub otp: OtpStore,
    /// Issues and verifies bearer tokens.
    pub sessions: SessionSigner,
    /// Lock-free hospital/NGO snapshot.
    pub directory: DirectoryCache,
    /// Writes user-submitted NGOs into `directory`.
    pub ngo_submissions: NgoSubmissions,
    /// Accepted search radius range.
    pub radius_bounds: RadiusBounds,
    /// Shared limit on `/api/auth/*`.
    pub auth_throttle: AuthThrottle,
    /// Return issued codes in the response body (development only).
    pub otp_echo_code: bool,
    /// Single CORS origin; also the base of profile links.
    pub frontend_origin: Arc<String>,
}

impl AppState {
    /// Assemble the state from validated configuration, the already-built
    /// cipher and directory cache, and the record storage. Saved records are
    /// loaded here; submitted NGOs are published into `directory`.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistError`] if any saved collection cannot be read.
    pub async fn load(
        cfg: &Config,
        cipher: FieldCipher,
        directory: DirectoryCache,
        repos: RecordRepos,
    ) -> Result<Self, PersistError> {
        Ok(Self {
            profiles: ProfileStore::load(cipher.clone(), repos.profiles).await?,
            appointments: AppointmentStore::load(repos.appointments).await?,
            metrics: MetricStore::load(repos.metrics).await?,
            ngo_submissions: NgoSubmissions::load(repos.ngos, directory.clone()).await?,
            cipher,
            otp: OtpStore::new(cfg.otp_ttl(), cfg.otp_max_attempts),
            sessions: SessionSigner::new(&cfg.session_secret, cfg.session_ttl()),
            directory,
            radius_bounds: cfg.radius_bounds(),
            auth_throttle: cfg.auth_throttle(),
            otp_echo_code: cfg.otp_echo_code,
            frontend_origin: Arc::new(cfg.frontend_origin.clone()),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::tests::valid;
    use crate::persist::tests::MemoryRepo;

    impl RecordRepos {
        pub(crate) fn memory() -> Self {
            Self {
                profiles: MemoryRepo::shared(),
                appointments: MemoryRepo::shared(),
                metrics: MemoryRepo::shared(),
                ngos: MemoryRepo::shared(),
            }
        }
    }

    /// State over in-memory storage and the default test configuration.
    pub(crate) async fn state_with(cipher: FieldCipher, directory: DirectoryCache) -> AppState {
        AppState::load(&valid(), cipher, directory, RecordRepos::memory())
            .await
            .unwrap()
    }

    #[test]
    fn file_layout() {
        let repos = RecordRepos::in_dir("data/records");
        assert_eq!(repos.profiles.describe(), "file:data/records/profiles.json");
        assert_eq!(repos.ngos.describe(), "file:data/records/ngos.json");
    }

    #[tokio::test]
    async fn saved_ngos_are_published_on_load() {
        let repos = RecordRepos::memory();
        repos.ngos.save(r#"[{"id": 3, "name": "Seva Foundation"}]"#).unwrap();
        let directory = DirectoryCache::new();
        AppState::load(&valid(), FieldCipher::disabled(), directory.clone(), repos)
            .await
            .unwrap();
        assert_eq!(directory.ngo(3).unwrap().name, "Seva Foundation");
    }
}
