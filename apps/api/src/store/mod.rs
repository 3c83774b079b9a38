//! Application store — the ordered, durable list of generated letters.
//!
//! Newest first by insertion. The in-memory list is authoritative for the running
//! session: every mutation is written through to storage, and a failed write is
//! logged without undoing the mutation.

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{Application, ApplicationPatch};

pub mod storage;

pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};

/// Storage key for the persisted collection.
pub const STORAGE_KEY: &str = "cotletter-applications";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored applications are not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

pub struct ApplicationStore {
    storage: Arc<dyn KeyValueStorage>,
    applications: RwLock<Vec<Application>>,
}

impl ApplicationStore {
    /// Loads the persisted collection, or starts empty if none exists.
    pub fn open(storage: Arc<dyn KeyValueStorage>) -> Result<Self, StoreError> {
        let applications = match storage.load(STORAGE_KEY)? {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };
        debug!("Application store opened with {} records", applications.len());
        Ok(Self {
            storage,
            applications: RwLock::new(applications),
        })
    }

    /// Opens an empty, non-durable store.
    pub fn in_memory() -> Self {
        Self {
            storage: Arc::new(MemoryStorage::new()),
            applications: RwLock::new(Vec::new()),
        }
    }

    /// Prepends `application`. The caller supplies a fresh id and `created_at`.
    pub fn add(&self, application: Application) {
        let mut apps = self.applications.write();
        apps.insert(0, application);
        self.persist(&apps);
    }

    /// Merges `patch` into the record with `id`. A missing record is a no-op.
    /// Returns whether a record was updated.
    pub fn update(&self, id: &str, patch: ApplicationPatch) -> bool {
        let mut apps = self.applications.write();
        let Some(app) = apps.iter_mut().find(|a| a.id == id) else {
            debug!("Update skipped, application {id} not found");
            return false;
        };
        app.apply(patch);
        self.persist(&apps);
        true
    }

    /// Removes the record with `id`. A missing record is a no-op.
    /// Returns whether a record was removed.
    pub fn delete(&self, id: &str) -> bool {
        let mut apps = self.applications.write();
        let before = apps.len();
        apps.retain(|a| a.id != id);
        if apps.len() == before {
            debug!("Delete skipped, application {id} not found");
            return false;
        }
        self.persist(&apps);
        true
    }

    /// Snapshot of the collection, newest first.
    pub fn list(&self) -> Vec<Application> {
        self.applications.read().clone()
    }

    pub fn get_all(&self) -> Vec<Application> {
        self.list()
    }

    pub fn get(&self, id: &str) -> Option<Application> {
        self.applications.read().iter().find(|a| a.id == id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.applications.read().iter().any(|a| a.id == id)
    }

    pub fn len(&self) -> usize {
        self.applications.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, apps: &[Application]) {
        let result = serde_json::to_string(apps)
            .map_err(StoreError::from)
            .and_then(|json| self.storage.save(STORAGE_KEY, &json));
        if let Err(e) = result {
            warn!("Failed to persist applications (in-memory state kept): {e}");
        }
    }
}
