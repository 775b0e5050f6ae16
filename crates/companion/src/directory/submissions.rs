//! NGOs added through `POST /api/ngos`, persisted apart from the seed file.

use std::sync::Arc;

use common::protocol::NgoCreate;
use tokio::sync::Mutex;
use tracing::info;

use super::{model::ngo_from_request, DirectoryCache, Ngo};
use crate::persist::{PersistError, Persisted, RecordError, RecordRepo};

/// Accepts NGO submissions and keeps [`DirectoryCache`] in step with the
/// saved list.
#[derive(Clone, Debug)]
pub struct NgoSubmissions {
    saved: Persisted<Vec<Ngo>>,
    cache: DirectoryCache,
    /// Held across id allocation, save and publish.
    submit_lock: Arc<Mutex<()>>,
}

impl NgoSubmissions {
    /// Load saved submissions from `repo` and publish them into `cache`.
    pub async fn load(repo: Arc<dyn RecordRepo>, cache: DirectoryCache) -> Result<Self, PersistError> {
        let saved: Persisted<Vec<Ngo>> = Persisted::load(repo).await?;
        let restored = saved.read(|list| list.clone()).await;
        if !restored.is_empty() {
            info!(count = restored.len(), "restored submitted ngos");
        }
        cache.set_submitted(restored);
        Ok(Self {
            saved,
            cache,
            submit_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Validate, save and publish a new NGO.
    ///
    /// # Errors
    ///
    /// [`RecordError::Invalid`] if the request is rejected,
    /// [`RecordError::Persist`] if it cannot be saved. The directory is
    /// unchanged in both cases.
    pub async fn submit(&self, req: NgoCreate) -> Result<Ngo, RecordError> {
        let _guard = self.submit_lock.lock().await;
        let ngo = ngo_from_request(self.cache.next_ngo_id(), req)
            .map_err(|e| RecordError::Invalid(e.to_string()))?;

        let all = self
            .saved
            .update(|list| {
                list.push(ngo.clone());
                Ok::<_, RecordError>(list.clone())
            })
            .await?;
        self.cache.set_submitted(all);
        info!(ngo_id = ngo.id, "ngo submitted");
        Ok(ngo)
    }
}
