//! [`ProfileStore`]: per-user profiles with PII fields encrypted at rest.

use std::{collections::HashMap, sync::Arc};

use common::protocol::{EmergencyCard, ProfileResponse, ProfileUpdate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::auth::unix_now;
use crate::crypto::{CipherError, FieldCipher};
use crate::persist::{PersistError, Persisted, RecordRepo};

/// Errors produced by [`ProfileStore::upsert`].
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Profile as persisted. Every `Some` text field is the output of
/// [`FieldCipher::encrypt_field`]; `allergies` is the output of
/// [`FieldCipher::encrypt_json`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct StoredProfile {
    full_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    blood_group: Option<String>,
    emergency_contact: Option<String>,
    allergies: Option<String>,
    updated_at: u64,
}

type Profiles = HashMap<String, StoredProfile>;

/// Thread-safe profile store keyed by user id (the token subject).
///
/// Only ciphertext reaches the backing [`RecordRepo`].
#[derive(Clone, Debug)]
pub struct ProfileStore {
    profiles: Persisted<Profiles>,
    cipher: FieldCipher,
}

impl ProfileStore {
    /// Load saved profiles from `repo`.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistError`] if the saved document cannot be read or
    /// parsed.
    pub async fn load(cipher: FieldCipher, repo: Arc<dyn RecordRepo>) -> Result<Self, PersistError> {
        let profiles = Persisted::load(repo).await?;
        Ok(Self { profiles, cipher })
    }

    /// Create or update the profile of `user_id`.
    ///
    /// Fields present in `update` replace the stored value; a blank string
    /// (or an empty allergy list) clears the field. Absent fields are kept.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Cipher`] if a field cannot be encrypted and
    /// [`ProfileError::Persist`] if the save fails. Nothing is written in
    /// either case.
    pub async fn upsert(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<ProfileResponse, ProfileError> {
        let full_name = self.seal(update.full_name)?;
        let email = self.seal(update.email)?;
        let phone = self.seal(update.phone)?;
        let blood_group = self.seal(update.blood_group)?;
        let emergency_contact = self.seal(update.emergency_contact)?;
        let allergies = self.seal_list(update.allergies)?;

        let stored = self
            .profiles
            .update(|map| {
                let entry = map.entry(user_id.to_owned()).or_default();
                apply(&mut entry.full_name, full_name);
                apply(&mut entry.email, email);
                apply(&mut entry.phone, phone);
                apply(&mut entry.blood_group, blood_group);
                apply(&mut entry.emergency_contact, emergency_contact);
                apply(&mut entry.allergies, allergies);
                entry.updated_at = unix_now();
                Ok::<_, ProfileError>(entry.clone())
            })
            .await?;

        Ok(self.open(user_id, &stored))
    }

    /// The decrypted profile of `user_id`, if one exists.
    pub async fn get(&self, user_id: &str) -> Option<ProfileResponse> {
        let stored = self.profiles.read(|map| map.get(user_id).cloned()).await?;
        Some(self.open(user_id, &stored))
    }

    /// Emergency card for `user_id`, with placeholders for missing fields.
    pub async fn emergency_card(&self, user_id: &str, frontend_origin: &str) -> EmergencyCard {
        let profile = self.get(user_id).await;
        let profile = profile.as_ref();
        let or = |v: Option<&String>, fallback: &str| v.cloned().unwrap_or_else(|| fallback.to_owned());
        EmergencyCard {
            id: user_id.to_owned(),
            name: or(profile.and_then(|p| p.full_name.as_ref()), "Unknown"),
            blood_group: or(profile.and_then(|p| p.blood_group.as_ref()), "NA"),
            emergency_contact: or(profile.and_then(|p| p.emergency_contact.as_ref()), "NA"),
            profile_url: format!("{}/settings", frontend_origin.trim_end_matches('/')),
        }
    }

    /// Encrypt an incoming field. `Some(None)` means "clear".
    fn seal(&self, value: Option<String>) -> Result<Option<Option<String>>, CipherError> {
        match value {
            None => Ok(None),
            Some(v) if v.trim().is_empty() => Ok(Some(None)),
            Some(v) => Ok(Some(Some(self.cipher.encrypt_field(&v)?))),
        }
    }

    /// Encrypt an incoming list as one JSON field. Blank entries are dropped;
    /// a list with nothing left clears the field.
    fn seal_list(&self, value: Option<Vec<String>>) -> Result<Option<Option<String>>, CipherError> {
        let Some(items) = value else {
            return Ok(None);
        };
        let items: Vec<String> = items
            .into_iter()
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
        if items.is_empty() {
            return Ok(Some(None));
        }
        Ok(Some(Some(self.cipher.encrypt_json(&items)?)))
    }

    fn open(&self, user_id: &str, stored: &StoredProfile) -> ProfileResponse {
        let open = |v: &Option<String>| v.as_deref().map(|s| self.cipher.decrypt_field(s));
        let allergies = stored.allergies.as_deref().and_then(|s| {
            self.cipher
                .decrypt_json::<Vec<String>>(s)
                .map_err(|e| warn!(error = %e, "stored allergy list unreadable"))
                .ok()
        });
        ProfileResponse {
            user_id: user_id.to_owned(),
            full_name: open(&stored.full_name),
            email: open(&stored.email),
            phone: open(&stored.phone),
            blood_group: open(&stored.blood_group),
            emergency_contact: open(&stored.emergency_contact),
            allergies,
            updated_at: stored.updated_at,
        }
    }
}

fn apply(slot: &mut Option<String>, sealed: Option<Option<String>>) {
    if let Some(value) = sealed {
        *slot = value;
    }
}
