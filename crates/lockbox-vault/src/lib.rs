//! Encrypted file vault: per-file keys, blob-then-metadata persistence.
//!
//! `store` encrypts content under a fresh key, writes the ciphertext to the
//! blob store, and only then records `{name, key, location}` in the metadata
//! store. `retrieve` walks the same chain backwards.

mod error;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lockbox_core::{
    blobs::{BlobStore, BlobStoreError},
    records::{FileRecord, MetadataError, MetadataStore},
};
use lockbox_storage::cipher::{self, CipherError};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

pub use crate::error::VaultError;

/// Directory (path prefix) that encrypted blobs are saved under.
pub const BLOB_DIR: &str = "encrypted_files";

/// Result of a successful store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredFile {
    pub name: String,
    pub location: String,
    pub created_at: DateTime<Utc>,
}

/// Orchestrates upload and retrieval over injected collaborators.
#[derive(Clone)]
pub struct VaultService {
    blobs: Arc<dyn BlobStore>,
    records: Arc<dyn MetadataStore>,
}

impl VaultService {
    pub fn new(blobs: Arc<dyn BlobStore>, records: Arc<dyn MetadataStore>) -> Self {
        Self { blobs, records }
    }

    /// Encrypt and persist `content` under `name`.
    ///
    /// The blob is durably written before the metadata record is created. If
    /// the record write fails the blob is left behind as an orphan; no
    /// compensating delete is attempted.
    #[instrument(skip(self, content), fields(size = content.len()))]
    pub async fn store(&self, name: &str, content: &[u8]) -> Result<StoredFile, VaultError> {
        if name.is_empty() {
            return Err(VaultError::InvalidInput("File name not provided".into()));
        }
        if content.is_empty() {
            return Err(VaultError::InvalidInput(format!("File '{name}' is empty.")));
        }
        let path = blob_path(name)?;

        if self
            .records
            .find_by_name(name)
            .await
            .map_err(VaultError::internal)?
            .is_some()
        {
            return Err(VaultError::AlreadyExists {
                name: name.to_string(),
            });
        }

        let key = cipher::generate_key();
        let ciphertext = cipher::encrypt(content, &key).map_err(VaultError::internal)?;

        let location = self
            .blobs
            .save(&path, &ciphertext)
            .await
            .map_err(|err| VaultError::StorageWrite {
                reason: err.to_string(),
            })?;

        let record = FileRecord::new(name.to_string(), cipher::encode_key(&key), location);
        if let Err(err) = self.records.create(&record).await {
            warn!(location = %record.location, error = %err, "metadata write failed; blob orphaned");
            return Err(match err {
                MetadataError::Duplicate { name } => VaultError::AlreadyExists { name },
                MetadataError::Backend { reason } => VaultError::MetadataWrite { reason },
            });
        }

        info!(location = %record.location, "file stored");
        Ok(StoredFile {
            name: record.name,
            location: record.location,
            created_at: record.created_at,
        })
    }

    /// Look up, fetch and decrypt the file stored under `name`.
    #[instrument(skip(self))]
    pub async fn retrieve(&self, name: &str) -> Result<Vec<u8>, VaultError> {
        if name.is_empty() {
            return Err(VaultError::InvalidInput("File name not provided".into()));
        }

        let record = self
            .records
            .find_by_name(name)
            .await
            .map_err(VaultError::internal)?
            .ok_or_else(|| VaultError::RecordNotFound {
                name: name.to_string(),
            })?;

        let blob_not_found = || {
            warn!(location = %record.location, "record has no backing blob");
            VaultError::BlobNotFound {
                name: name.to_string(),
            }
        };
        if !self
            .blobs
            .exists(&record.location)
            .await
            .map_err(VaultError::internal)?
        {
            return Err(blob_not_found());
        }
        let ciphertext = match self.blobs.open(&record.location).await {
            Ok(bytes) => bytes,
            Err(BlobStoreError::NotFound { .. }) => return Err(blob_not_found()),
            Err(err) => return Err(VaultError::internal(err)),
        };

        // A key that no longer decodes is reported like a wrong key.
        let key = cipher::decode_key(&record.key).map_err(|err| {
            warn!(error = %err, "stored key is malformed");
            VaultError::Authentication
        })?;

        cipher::decrypt(&ciphertext, &key).map_err(|err| match err {
            CipherError::Authentication => VaultError::Authentication,
            other => VaultError::internal(other),
        })
    }
}

/// Blob path for a file name: the last path component, restricted to
/// `[A-Za-z0-9._-]`, with leading dots removed.
pub fn blob_path(name: &str) -> Result<String, VaultError> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        return Err(VaultError::InvalidInput(format!(
            "File name '{name}' cannot be used as a storage path."
        )));
    }
    Ok(format!("{BLOB_DIR}/{cleaned}"))
}
