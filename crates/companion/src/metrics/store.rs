//! [`MetricStore`]: record, list and delete health readings.

use std::{cmp::Reverse, sync::Arc};

use chrono::Utc;
use common::protocol::{Metric, MetricCreate};

use crate::persist::{PersistError, Persisted, RecordError, RecordRepo, Table};

#[derive(Clone, Debug)]
pub struct MetricStore {
    table: Persisted<Table<Metric>>,
}

impl MetricStore {
    /// Load saved readings from `repo`.
    pub async fn load(repo: Arc<dyn RecordRepo>) -> Result<Self, PersistError> {
        Ok(Self {
            table: Persisted::load(repo).await?,
        })
    }

    /// Up to `limit` readings of `user_id`, newest first, optionally only of
    /// one `kind`.
    pub async fn list(&self, user_id: &str, kind: Option<&str>, limit: usize) -> Vec<Metric> {
        let mut rows: Vec<Metric> = self
            .table
            .read(|t| {
                t.records
                    .iter()
                    .filter(|m| m.user_id == user_id)
                    .filter(|m| kind.map_or(true, |k| m.kind == k))
                    .cloned()
                    .collect()
            })
            .await;
        rows.sort_by_key(|m| (Reverse(m.recorded_at), Reverse(m.id)));
        rows.truncate(limit);
        rows
    }

    /// Record a reading for `user_id`, stamped with the current time.
    ///
    /// # Errors
    ///
    /// [`RecordError::Invalid`] for a blank type or a non-finite value.
    pub async fn record(&self, user_id: &str, req: MetricCreate) -> Result<Metric, RecordError> {
        let kind = req.kind.trim();
        if kind.is_empty() {
            return Err(RecordError::Invalid("type must not be empty".into()));
        }
        if !req.value.is_finite() {
            return Err(RecordError::Invalid("value must be a finite number".into()));
        }
        let kind = kind.to_owned();

        self.table
            .update(|t| {
                let metric = Metric {
                    id: t.allocate_id(),
                    user_id: user_id.to_owned(),
                    kind,
                    value: req.value,
                    recorded_at: Utc::now(),
                };
                t.records.push(metric.clone());
                Ok(metric)
            })
            .await
    }

    /// Remove reading `id` of `user_id`.
    pub async fn delete(&self, user_id: &str, id: i64) -> Result<(), RecordError> {
        self.table
            .update(|t| {
                let pos = t
                    .records
                    .iter()
                    .position(|m| m.id == id && m.user_id == user_id)
                    .ok_or(RecordError::NotFound)?;
                t.records.remove(pos);
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::tests::MemoryRepo;

    const ASHA: &str = "+919876543210";

    fn reading(kind: &str, value: f64) -> MetricCreate {
        MetricCreate {
            kind: kind.into(),
            value,
        }
    }

    async fn store() -> MetricStore {
        MetricStore::load(MemoryRepo::shared()).await.unwrap()
    }

    #[tokio::test]
    async fn record_rejects_blank_type_and_non_finite_value() {
        let store = store().await;
        assert!(matches!(
            store.record(ASHA, reading(" ", 1.0)).await,
            Err(RecordError::Invalid(_))
        ));
        assert!(matches!(
            store.record(ASHA, reading("hr", f64::NAN)).await,
            Err(RecordError::Invalid(_))
        ));
        assert!(store.list(ASHA, None, 50).await.is_empty());
    }

    #[tokio::test]
    async fn list_filters_by_type_and_limits_newest_first() {
        let store = store().await;
        for v in [70.0, 72.0, 75.0] {
            store.record(ASHA, reading("hr", v)).await.unwrap();
        }
        store.record(ASHA, reading("glucose", 5.4)).await.unwrap();
        store.record("+14155550100", reading("hr", 90.0)).await.unwrap();

        let hr = store.list(ASHA, Some("hr"), 2).await;
        let values: Vec<f64> = hr.iter().map(|m| m.value).collect();
        assert_eq!(values, [75.0, 72.0]);
        assert_eq!(store.list(ASHA, None, 50).await.len(), 4);
    }

    #[tokio::test]
    async fn delete_is_scoped_to_owner() {
        let store = store().await;
        let m = store.record(ASHA, reading("hr", 70.0)).await.unwrap();
        assert!(matches!(
            store.delete("+14155550100", m.id).await,
            Err(RecordError::NotFound)
        ));
        store.delete(ASHA, m.id).await.unwrap();
        assert!(store.list(ASHA, None, 50).await.is_empty());
    }
}
