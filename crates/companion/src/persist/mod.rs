//! Durable record files.
//!
//! Each collection (profiles, appointments, metrics, submitted NGOs) is one
//! JSON document behind a [`RecordRepo`]. Writes go through [`Persisted`],
//! which mutates a draft, saves it, and only then publishes it in memory, so
//! a failed save leaves both the file and the in-memory copy unchanged.

pub mod file;

pub use file::FileRepo;

use std::{fmt, sync::Arc};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors produced while reading or writing a record file.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("record file i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("record file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("record file task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Errors produced by the per-user record stores.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record not found")]
    NotFound,

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Blocking storage for one serialised document.
///
/// Implementations are called from `spawn_blocking`, never directly on the
/// async runtime.
#[cfg_attr(test, mockall::automock)]
pub trait RecordRepo: Send + Sync {
    /// Human-readable location, for logs.
    fn describe(&self) -> String;

    /// The saved document, or `None` when nothing has been saved yet.
    fn load(&self) -> Result<Option<String>, PersistError>;

    /// Replace the saved document.
    fn save(&self, contents: &str) -> Result<(), PersistError>;
}

/// Rows with a monotonically increasing integer id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table<T> {
    pub next_id: i64,
    pub records: Vec<T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            records: Vec::new(),
        }
    }
}

impl<T> Table<T> {
    pub fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Read and parse the document behind `repo` off the async runtime.
pub async fn load_json<D>(repo: &Arc<dyn RecordRepo>) -> Result<Option<D>, PersistError>
where
    D: DeserializeOwned,
{
    let repo = Arc::clone(repo);
    let raw = tokio::task::spawn_blocking(move || repo.load()).await??;
    Ok(raw.map(|s| serde_json::from_str(&s)).transpose()?)
}

/// Serialise `doc` and hand it to `repo` off the async runtime.
pub async fn save_json<D>(repo: &Arc<dyn RecordRepo>, doc: &D) -> Result<(), PersistError>
where
    D: Serialize,
{
    let contents = serde_json::to_string_pretty(doc)?;
    let repo = Arc::clone(repo);
    tokio::task::spawn_blocking(move || repo.save(&contents)).await?
}

/// An in-memory document mirrored to a [`RecordRepo`].
pub struct Persisted<D> {
    repo: Arc<dyn RecordRepo>,
    doc: Arc<Mutex<D>>,
}

impl<D> Clone for Persisted<D> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            doc: Arc::clone(&self.doc),
        }
    }
}

impl<D> fmt::Debug for Persisted<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persisted")
            .field("repo", &self.repo.describe())
            .finish_non_exhaustive()
    }
}

impl<D> Persisted<D>
where
    D: Default + Clone + Serialize + DeserializeOwned + Send + 'static,
{
    /// Load the saved document, starting from `D::default()` when none exists.
    pub async fn load(repo: Arc<dyn RecordRepo>) -> Result<Self, PersistError> {
        let doc = load_json::<D>(&repo).await?.unwrap_or_default();
        Ok(Self {
            repo,
            doc: Arc::new(Mutex::new(doc)),
        })
    }

    /// Run `f` against the current document.
    pub async fn read<R>(&self, f: impl FnOnce(&D) -> R) -> R {
        let doc = self.doc.lock().await;
        f(&doc)
    }

    /// Apply `f` to a copy of the document, save the copy, then publish it.
    ///
    /// Writers are serialised. If `f` fails nothing is saved; if the save
    /// fails the in-memory document is left as it was.
    pub async fn update<R, E>(&self, f: impl FnOnce(&mut D) -> Result<R, E>) -> Result<R, E>
    where
        E: From<PersistError>,
    {
        let mut doc = self.doc.lock().await;
        let mut draft = doc.clone();
        let out = f(&mut draft)?;
        save_json(&self.repo, &draft).await?;
        *doc = draft;
        Ok(out)
    }
}
