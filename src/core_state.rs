//! Application state shared by every request handler.
//!
//! `CoreState` is built once at startup from `Settings` and wrapped in
//! `Arc`. It owns the collaborator handles (object store, messaging relay),
//! one prescription draft per operator, and the cached doctor profile used
//! for letterheads.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::config::Settings;
use crate::db::{self, DatabaseError};
use crate::delivery::{DeliveryError, MessageRelay, WhatsAppRelay};
use crate::models::DoctorProfile;
use crate::query::{CachedQuery, QueryState};
use crate::render::Letterhead;
use crate::storage::{HttpObjectStore, LocalObjectStore, ObjectStore, StorageError};
use crate::wizard::PrescriptionDraft;

pub struct CoreState {
    pub settings: Settings,
    pub db_path: PathBuf,
    pub store: Arc<dyn ObjectStore>,
    pub relay: Option<Arc<dyn MessageRelay>>,
    /// Work-in-progress prescription per operator.
    drafts: Mutex<HashMap<String, Arc<Mutex<PrescriptionDraft>>>>,
    /// Doctor profile per operator, invalidated on profile writes.
    profiles: Mutex<HashMap<String, CachedQuery<Option<DoctorProfile>>>>,
}

impl CoreState {
    /// Wire collaborators from settings: the remote object store when a
    /// storage URL is configured, the local store otherwise, and the
    /// WhatsApp relay only when a relay URL is configured.
    pub fn from_settings(settings: Settings) -> Result<Self, CoreError> {
        let store: Arc<dyn ObjectStore> = match &settings.storage_url {
            Some(url) => Arc::new(HttpObjectStore::new(url, settings.http_timeout_secs)?),
            None => Arc::new(LocalObjectStore::new(&settings.files_dir())),
        };
        let relay: Option<Arc<dyn MessageRelay>> = match &settings.relay_url {
            Some(url) => Some(Arc::new(WhatsAppRelay::new(
                url,
                settings.relay_token.as_deref(),
                settings.http_timeout_secs,
            )?)),
            None => None,
        };

        tracing::info!(
            data_dir = %settings.data_dir.display(),
            remote_storage = settings.storage_url.is_some(),
            delivery_enabled = relay.is_some(),
            "Core state configured"
        );

        let db_path = settings.database_path();
        let state = Self::with_parts(settings, db_path, store, relay);
        // Apply migrations up front so the first request does not pay for it.
        state.open_db()?;
        Ok(state)
    }

    pub fn with_parts(
        settings: Settings,
        db_path: PathBuf,
        store: Arc<dyn ObjectStore>,
        relay: Option<Arc<dyn MessageRelay>>,
    ) -> Self {
        Self {
            settings,
            db_path,
            store,
            relay,
            drafts: Mutex::new(HashMap::new()),
            profiles: Mutex::new(HashMap::new()),
        }
    }

    /// Open a database connection. Connections are per call; SQLite
    /// serializes writers.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.db_path).map_err(CoreError::Database)
    }

    // ── Drafts ──────────────────────────────────────────────

    /// Run `f` against the operator's draft, creating an empty one on first
    /// use. Only that operator's draft is locked while `f` runs.
    pub fn with_draft<T, F>(&self, operator: &str, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(&mut PrescriptionDraft) -> T,
    {
        let slot = {
            let mut drafts = self.drafts.lock().map_err(|_| CoreError::LockPoisoned)?;
            drafts
                .entry(operator.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(PrescriptionDraft::new())))
                .clone()
        };
        let mut draft = slot.lock().map_err(|_| CoreError::LockPoisoned)?;
        Ok(f(&mut draft))
    }

    // ── Doctor profile cache ────────────────────────────────

    /// The operator's doctor profile, read through the cache.
    pub fn doctor_profile(&self, operator: &str) -> Result<Option<DoctorProfile>, CoreError> {
        let mut profiles = self.profiles.lock().map_err(|_| CoreError::LockPoisoned)?;
        let query = profiles.entry(operator.to_string()).or_default();
        query.get_or_fetch(|| {
            let conn = self.open_db()?;
            db::get_doctor_profile(&conn, operator).map_err(CoreError::Database)
        })
    }

    /// Current cache state for the operator's profile without fetching.
    pub fn profile_state(&self, operator: &str) -> Result<QueryState<Option<DoctorProfile>>, CoreError> {
        let profiles = self.profiles.lock().map_err(|_| CoreError::LockPoisoned)?;
        Ok(profiles
            .get(operator)
            .map(|q| q.state().clone())
            .unwrap_or(QueryState::Loading))
    }

    pub fn letterhead_for(&self, operator: &str) -> Result<Letterhead, CoreError> {
        let profile = self.doctor_profile(operator)?;
        Ok(Letterhead::from_profile(profile.as_ref()))
    }

    pub fn invalidate_profile(&self, operator: &str) -> Result<(), CoreError> {
        let mut profiles = self.profiles.lock().map_err(|_| CoreError::LockPoisoned)?;
        if let Some(query) = profiles.get_mut(operator) {
            query.invalidate();
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Delivery setup error: {0}")]
    Delivery(#[from] DeliveryError),
}
