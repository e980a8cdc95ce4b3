use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Metadata row linking a file name to its key and blob location.
///
/// `key` is stored as plain text next to the record: read access to the
/// metadata store is enough to decrypt every blob it points at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    pub id: Uuid,
    pub name: String,
    /// Base64-encoded per-file key.
    pub key: String,
    /// Opaque locator into the blob store.
    pub location: String,
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn new(name: String, key: String, location: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            key,
            location,
            created_at: Utc::now(),
        }
    }
}

/// Errors produced by metadata store implementations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    /// A record with this name already exists.
    #[error("record already exists for name: {name}")]
    Duplicate { name: String },
    /// Underlying database failure.
    #[error("metadata backend failure: {reason}")]
    Backend { reason: String },
}

/// Keyed-record table of uploaded files. Names are unique.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a new record. Fails with `Duplicate` if the name is taken.
    async fn create(&self, record: &FileRecord) -> Result<(), MetadataError>;

    /// Look up a record by file name.
    async fn find_by_name(&self, name: &str) -> Result<Option<FileRecord>, MetadataError>;
}

/// In-memory metadata store for tests and smoke runs.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMetadataStore {
    inner: Arc<Mutex<HashMap<String, FileRecord>>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutate a stored record in place, bypassing the create-only contract.
    /// Used to inject faults (e.g. a corrupted key) in tests.
    /// Returns `false` when no record has this name.
    pub fn modify(&self, name: &str, f: impl FnOnce(&mut FileRecord)) -> bool {
        let Ok(mut map) = self.inner.lock() else {
            return false;
        };
        match map.get_mut(name) {
            Some(record) => {
                f(record);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn create(&self, record: &FileRecord) -> Result<(), MetadataError> {
        let mut map = self.inner.lock().map_err(|err| MetadataError::Backend {
            reason: format!("lock poisoned: {err}"),
        })?;

        if map.contains_key(&record.name) {
            return Err(MetadataError::Duplicate {
                name: record.name.clone(),
            });
        }
        map.insert(record.name.clone(), record.clone());
        Ok(())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<FileRecord>, MetadataError> {
        let map = self.inner.lock().map_err(|err| MetadataError::Backend {
            reason: format!("lock poisoned: {err}"),
        })?;
        Ok(map.get(name).cloned())
    }
}
