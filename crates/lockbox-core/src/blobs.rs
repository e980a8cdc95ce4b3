use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Errors produced by blob store implementations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlobStoreError {
    /// Nothing is stored at the requested location.
    #[error("blob not found at location: {location}")]
    NotFound { location: String },
    /// The path or location cannot be mapped into the backend.
    #[error("invalid blob path: {path}")]
    InvalidPath { path: String },
    /// Underlying storage failure.
    #[error("storage failure: {reason}")]
    Storage { reason: String },
}

/// Backend-agnostic storage for encrypted blobs.
///
/// `save` takes a requested path and returns the location the blob was
/// actually written to. Backends never overwrite: if the path is taken they
/// pick another one (see [`alternate_path`]).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist bytes durably and return their location.
    async fn save(&self, path: &str, bytes: &[u8]) -> Result<String, BlobStoreError>;

    /// Whether a blob exists at `location`.
    async fn exists(&self, location: &str) -> Result<bool, BlobStoreError>;

    /// Read the full blob at `location`.
    async fn open(&self, location: &str) -> Result<Vec<u8>, BlobStoreError>;
}

/// Derive a fresh candidate for a taken path by inserting a random suffix
/// before the extension: `dir/report.pdf` -> `dir/report_1f3a9c2.pdf`.
pub fn alternate_path(path: &str) -> String {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(7).collect();
    let (dir, file) = match path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, path),
    };
    let file = match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{suffix}.{ext}"),
        _ => format!("{file}_{suffix}"),
    };
    match dir {
        Some(dir) => format!("{dir}/{file}"),
        None => file,
    }
}

/// In-memory blob store for tests and smoke runs.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBlobStore {
    inner: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a blob out-of-band. Returns whether anything was removed.
    pub fn remove(&self, location: &str) -> bool {
        self.inner
            .lock()
            .map(|mut map| map.remove(location).is_some())
            .unwrap_or(false)
    }

    /// Mutate stored bytes in place (fault injection in tests).
    pub fn modify(&self, location: &str, f: impl FnOnce(&mut Vec<u8>)) -> bool {
        let Ok(mut map) = self.inner.lock() else {
            return false;
        };
        match map.get_mut(location) {
            Some(bytes) => {
                f(bytes);
                true
            }
            None => false,
        }
    }

    /// Raw stored bytes, as written by `save`.
    pub fn raw(&self, location: &str) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .ok()
            .and_then(|map| map.get(location).cloned())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn save(&self, path: &str, bytes: &[u8]) -> Result<String, BlobStoreError> {
        if path.is_empty() {
            return Err(BlobStoreError::InvalidPath {
                path: path.to_string(),
            });
        }
        let mut map = self.inner.lock().map_err(|err| BlobStoreError::Storage {
            reason: format!("lock poisoned: {err}"),
        })?;

        let mut location = path.to_string();
        while map.contains_key(&location) {
            location = alternate_path(path);
        }
        map.insert(location.clone(), bytes.to_vec());
        Ok(location)
    }

    async fn exists(&self, location: &str) -> Result<bool, BlobStoreError> {
        let map = self.inner.lock().map_err(|err| BlobStoreError::Storage {
            reason: format!("lock poisoned: {err}"),
        })?;
        Ok(map.contains_key(location))
    }

    async fn open(&self, location: &str) -> Result<Vec<u8>, BlobStoreError> {
        let map = self.inner.lock().map_err(|err| BlobStoreError::Storage {
            reason: format!("lock poisoned: {err}"),
        })?;
        map.get(location)
            .cloned()
            .ok_or_else(|| BlobStoreError::NotFound {
                location: location.to_string(),
            })
    }
}
