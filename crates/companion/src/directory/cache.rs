//! In-memory snapshot of the hospital and NGO directory.
//!
//! The snapshot is loaded at startup and refreshed on a configurable interval.
//! The cache uses `arc-swap` for lock-free reads on the hot path.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use arc_swap::ArcSwap;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use super::model::{Hospital, Ngo};

/// Errors from the directory layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("unknown hospital: {0}")]
    UnknownHospital(i64),

    #[error("unknown ngo: {0}")]
    UnknownNgo(i64),

    /// Two entries of the same kind share an id.
    #[error("duplicate {kind} id {id} in directory")]
    DuplicateId { kind: &'static str, id: i64 },

    #[error("invalid ngo: {0}")]
    InvalidSubmission(&'static str),
}

/// One complete, validated directory as read from the seed file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectorySnapshot {
    #[serde(default)]
    pub hospitals: Vec<Hospital>,
    #[serde(default)]
    pub ngos: Vec<Ngo>,
}

impl DirectorySnapshot {
    /// Reject duplicate ids and clear coordinates that are not valid positions.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::DuplicateId`] on the first repeated id.
    pub fn validate(mut self) -> Result<Self, DirectoryError> {
        ensure_unique("hospital", self.hospitals.iter().map(|h| h.id))?;
        ensure_unique("ngo", self.ngos.iter().map(|n| n.id))?;

        for h in &mut self.hospitals {
            if !valid_position(h.lat, h.lng) {
                warn!(hospital_id = h.id, "ignoring invalid coordinates");
                h.lat = None;
                h.lng = None;
            }
        }
        for n in &mut self.ngos {
            if !valid_position(n.lat, n.lng) {
                warn!(ngo_id = n.id, "ignoring invalid coordinates");
                n.lat = None;
                n.lng = None;
            }
        }
        Ok(self)
    }
}

fn ensure_unique(kind: &'static str, ids: impl Iterator<Item = i64>) -> Result<(), DirectoryError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(DirectoryError::DuplicateId { kind, id });
        }
    }
    Ok(())
}

/// Half-specified pairs are left alone (they never match a geo query anyway);
/// only fully specified pairs are range-checked.
pub(super) fn valid_position(lat: Option<f64>, lng: Option<f64>) -> bool {
    match (lat, lng) {
        (Some(lat), Some(lng)) => {
            lat.is_finite()
                && lng.is_finite()
                && (-90.0..=90.0).contains(&lat)
                && (-180.0..=180.0).contains(&lng)
        }
        _ => true,
    }
}

/// The two inputs of the published snapshot.
#[derive(Debug, Default)]
struct Layers {
    seed: DirectorySnapshot,
    submitted: Vec<Ngo>,
}

/// Shared, lock-free directory cache.
///
/// Internally backed by [`ArcSwap`] so readers never block and the background
/// refresh task can atomically swap in a completely new snapshot. The
/// published snapshot is the seed plus user-submitted NGOs; writers rebuild
/// it under a short mutex, readers never take it.
#[derive(Clone, Debug)]
pub struct DirectoryCache {
    inner: Arc<ArcSwap<DirectorySnapshot>>,
    layers: Arc<Mutex<Layers>>,
}

impl DirectoryCache {
    /// Create a new, empty [`DirectoryCache`].
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(DirectorySnapshot::default())),
            layers: Arc::new(Mutex::new(Layers::default())),
        }
    }

    /// The current snapshot. Cheap; holds no lock.
    pub fn snapshot(&self) -> Arc<DirectorySnapshot> {
        self.inner.load_full()
    }

    pub fn hospital_count(&self) -> usize {
        self.inner.load().hospitals.len()
    }

    pub fn ngo_count(&self) -> usize {
        self.inner.load().ngos.len()
    }

    /// Returns `true` if the snapshot holds no entries at all.
    pub fn is_empty(&self) -> bool {
        let snap = self.inner.load();
        snap.hospitals.is_empty() && snap.ngos.is_empty()
    }

    /// Look up a hospital by id.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::UnknownHospital`] if `id` is not present.
    pub fn hospital(&self, id: i64) -> Result<Hospital, DirectoryError> {
        self.inner
            .load()
            .hospitals
            .iter()
            .find(|h| h.id == id)
            .cloned()
            .ok_or(DirectoryError::UnknownHospital(id))
    }

    /// Look up an NGO by id.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::UnknownNgo`] if `id` is not present.
    pub fn ngo(&self, id: i64) -> Result<Ngo, DirectoryError> {
        self.inner
            .load()
            .ngos
            .iter()
            .find(|n| n.id == id)
            .cloned()
            .ok_or(DirectoryError::UnknownNgo(id))
    }

    /// Atomically replace the seed part of the snapshot. Submitted NGOs are
    /// carried over.
    pub fn replace(&self, snapshot: DirectorySnapshot) {
        let mut layers = self.lock_layers();
        layers.seed = snapshot;
        self.publish(&layers);
    }

    /// Atomically replace the submitted NGOs.
    pub fn set_submitted(&self, ngos: Vec<Ngo>) {
        let mut layers = self.lock_layers();
        layers.submitted = ngos;
        self.publish(&layers);
    }

    /// One past the largest NGO id currently known, seed or submitted.
    pub fn next_ngo_id(&self) -> i64 {
        let layers = self.lock_layers();
        layers
            .seed
            .ngos
            .iter()
            .chain(&layers.submitted)
            .map(|n| n.id)
            .max()
            .map_or(1, |id| id + 1)
    }

    fn lock_layers(&self) -> MutexGuard<'_, Layers> {
        self.layers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A submitted NGO whose id reappears in the seed is shadowed by the seed
    /// entry.
    fn publish(&self, layers: &Layers) {
        let mut snapshot = layers.seed.clone();
        let seeded: HashSet<i64> = snapshot.ngos.iter().map(|n| n.id).collect();
        for ngo in &layers.submitted {
            if seeded.contains(&ngo.id) {
                warn!(ngo_id = ngo.id, "submitted ngo shadowed by seed entry");
                continue;
            }
            snapshot.ngos.push(ngo.clone());
        }
        self.inner.store(Arc::new(snapshot));
    }
}

impl Default for DirectoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hospital(id: i64, lat: Option<f64>, lng: Option<f64>) -> Hospital {
        Hospital {
            id,
            name: format!("Hospital {id}"),
            address: None,
            city: None,
            state: None,
            contact: None,
            kind: None,
            beds: None,
            lat,
            lng,
        }
    }

    #[test]
    fn initially_empty() {
        let cache = DirectoryCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.hospital_count(), 0);
        assert_eq!(cache.hospital(1), Err(DirectoryError::UnknownHospital(1)));
    }

    #[test]
    fn replace_and_lookup() {
        let cache = DirectoryCache::new();
        cache.replace(DirectorySnapshot {
            hospitals: vec![hospital(7, None, None)],
            ngos: vec![],
        });
        assert_eq!(cache.hospital_count(), 1);
        assert_eq!(cache.hospital(7).unwrap().id, 7);
        assert_eq!(cache.ngo(7), Err(DirectoryError::UnknownNgo(7)));
    }

    #[test]
    fn replace_is_atomic() {
        let cache = DirectoryCache::new();
        cache.replace(DirectorySnapshot {
            hospitals: vec![hospital(1, None, None)],
            ngos: vec![],
        });
        let before = cache.snapshot();
        cache.replace(DirectorySnapshot {
            hospitals: vec![hospital(2, None, None)],
            ngos: vec![],
        });
        // Readers holding the old snapshot keep a consistent view.
        assert_eq!(before.hospitals[0].id, 1);
        assert!(cache.hospital(1).is_err());
        assert!(cache.hospital(2).is_ok());
    }

    #[test]
    fn validate_rejects_duplicate_ids() {
        let snap = DirectorySnapshot {
            hospitals: vec![hospital(1, None, None), hospital(1, None, None)],
            ngos: vec![],
        };
        assert_eq!(
            snap.validate().unwrap_err(),
            DirectoryError::DuplicateId {
                kind: "hospital",
                id: 1
            }
        );
    }

    #[test]
    fn validate_clears_out_of_range_coordinates() {
        let snap = DirectorySnapshot {
            hospitals: vec![hospital(1, Some(123.0), Some(80.0)), hospital(2, Some(26.8), Some(80.9))],
            ngos: vec![],
        }
        .validate()
        .unwrap();
        assert_eq!(snap.hospitals[0].lat, None);
        assert_eq!(snap.hospitals[0].lng, None);
        assert_eq!(snap.hospitals[1].lat, Some(26.8));
    }

    fn ngo(id: i64) -> Ngo {
        Ngo {
            id,
            name: format!("NGO {id}"),
            description: None,
            contact: None,
            website: None,
            city: None,
            tags: None,
            lat: None,
            lng: None,
        }
    }

    #[test]
    fn submitted_ngos_survive_seed_reload() {
        let cache = DirectoryCache::new();
        cache.replace(DirectorySnapshot {
            hospitals: vec![],
            ngos: vec![ngo(10)],
        });
        assert_eq!(cache.next_ngo_id(), 11);
        cache.set_submitted(vec![ngo(11)]);
        assert_eq!(cache.next_ngo_id(), 12);

        cache.replace(DirectorySnapshot {
            hospitals: vec![hospital(1, None, None)],
            ngos: vec![ngo(10), ngo(12)],
        });
        assert_eq!(cache.ngo_count(), 3);
        assert!(cache.ngo(11).is_ok());
        assert_eq!(cache.next_ngo_id(), 13);
    }

    #[test]
    fn seed_entry_shadows_submitted_id() {
        let cache = DirectoryCache::new();
        cache.set_submitted(vec![ngo(1)]);
        cache.replace(DirectorySnapshot {
            hospitals: vec![],
            ngos: vec![Ngo {
                name: "Seeded".into(),
                ..ngo(1)
            }],
        });
        assert_eq!(cache.ngo_count(), 1);
        assert_eq!(cache.ngo(1).unwrap().name, "Seeded");
    }

    #[test]
    fn first_ngo_id_is_one() {
        assert_eq!(DirectoryCache::new().next_ngo_id(), 1);
    }
}
