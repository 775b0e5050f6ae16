//! [`AppointmentStore`]: create, list, patch and delete appointments.

use std::{cmp::Reverse, sync::Arc};

use chrono::{DateTime, Utc};
use common::protocol::{Appointment, AppointmentCreate, AppointmentUpdate};

use crate::persist::{PersistError, Persisted, RecordError, RecordRepo, Table};

#[derive(Clone, Debug)]
pub struct AppointmentStore {
    table: Persisted<Table<Appointment>>,
}

impl AppointmentStore {
    /// Load saved appointments from `repo`.
    pub async fn load(repo: Arc<dyn RecordRepo>) -> Result<Self, PersistError> {
        Ok(Self {
            table: Persisted::load(repo).await?,
        })
    }

    /// Appointments of `user_id`, latest start first. Undated appointments
    /// come before dated ones; ties go to the newer id.
    pub async fn list(&self, user_id: &str) -> Vec<Appointment> {
        let mut rows: Vec<Appointment> = self
            .table
            .read(|t| {
                t.records
                    .iter()
                    .filter(|a| a.user_id == user_id)
                    .cloned()
                    .collect()
            })
            .await;
        rows.sort_by_key(|a| (a.start_time.is_some(), Reverse(a.start_time), Reverse(a.id)));
        rows
    }

    /// Book a new appointment for `user_id`.
    ///
    /// # Errors
    ///
    /// [`RecordError::Invalid`] for a blank provider or reason, or an end
    /// before the start.
    pub async fn create(
        &self,
        user_id: &str,
        req: AppointmentCreate,
    ) -> Result<Appointment, RecordError> {
        let provider = required(&req.provider, "provider")?;
        let reason = optional(req.reason, "reason")?;
        check_window(req.start_time, req.end_time)?;

        self.table
            .update(|t| {
                let now = Utc::now();
                let appointment = Appointment {
                    id: t.allocate_id(),
                    user_id: user_id.to_owned(),
                    provider,
                    reason,
                    start_time: req.start_time,
                    end_time: req.end_time,
                    status: req.status.unwrap_or_default(),
                    created_at: now,
                    updated_at: now,
                };
                t.records.push(appointment.clone());
                Ok(appointment)
            })
            .await
    }

    /// Apply the fields present in `req` to appointment `id` of `user_id`.
    ///
    /// # Errors
    ///
    /// [`RecordError::NotFound`] if `user_id` owns no such appointment;
    /// [`RecordError::Invalid`] as for [`AppointmentStore::create`], checked
    /// against the merged result.
    pub async fn update(
        &self,
        user_id: &str,
        id: i64,
        req: AppointmentUpdate,
    ) -> Result<Appointment, RecordError> {
        let provider = req
            .provider
            .as_deref()
            .map(|p| required(p, "provider"))
            .transpose()?;
        let reason = optional(req.reason, "reason")?;

        self.table
            .update(|t| {
                let row = t
                    .records
                    .iter_mut()
                    .find(|a| a.id == id && a.user_id == user_id)
                    .ok_or(RecordError::NotFound)?;
                let start_time = req.start_time.or(row.start_time);
                let end_time = req.end_time.or(row.end_time);
                check_window(start_time, end_time)?;

                if let Some(provider) = provider {
                    row.provider = provider;
                }
                if reason.is_some() {
                    row.reason = reason;
                }
                row.start_time = start_time;
                row.end_time = end_time;
                if let Some(status) = req.status {
                    row.status = status;
                }
                row.updated_at = Utc::now();
                Ok(row.clone())
            })
            .await
    }

    /// Remove appointment `id` of `user_id`.
    pub async fn delete(&self, user_id: &str, id: i64) -> Result<(), RecordError> {
        self.table
            .update(|t| {
                let pos = t
                    .records
                    .iter()
                    .position(|a| a.id == id && a.user_id == user_id)
                    .ok_or(RecordError::NotFound)?;
                t.records.remove(pos);
                Ok(())
            })
            .await
    }
}

fn required(value: &str, field: &str) -> Result<String, RecordError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(RecordError::Invalid(format!("{field} must not be empty")));
    }
    Ok(value.to_owned())
}

fn optional(value: Option<String>, field: &str) -> Result<Option<String>, RecordError> {
    value.as_deref().map(|v| required(v, field)).transpose()
}

fn check_window(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<(), RecordError> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(RecordError::Invalid(
            "end_time must not be before start_time".into(),
        )),
        _ => Ok(()),
    }
}
