use std::{
    fs,
    io::{self, Write},
    path::{Component, Path, PathBuf},
};

use async_trait::async_trait;
use lockbox_core::blobs::{alternate_path, BlobStore, BlobStoreError};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

/// Attempts at finding a free path before giving up.
const MAX_NAME_ATTEMPTS: usize = 16;

/// Blob store rooted at a local directory.
///
/// Locations are `/`-separated paths relative to the root. Blobs are written
/// to a temp file next to their target and persisted without clobbering, so a
/// location is only ever visible once its bytes are fully on disk.
#[derive(Debug, Clone)]
pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, location: &str) -> Result<PathBuf, BlobStoreError> {
        let relative = Path::new(location);
        let invalid = || BlobStoreError::InvalidPath {
            path: location.to_string(),
        };
        if location.is_empty() || relative.is_absolute() {
            return Err(invalid());
        }
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(invalid());
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    #[instrument(skip_all, fields(path = %path))]
    async fn save(&self, path: &str, bytes: &[u8]) -> Result<String, BlobStoreError> {
        let mut candidate = path.to_string();
        for _ in 0..MAX_NAME_ATTEMPTS {
            let target = self.resolve(&candidate)?;
            if write_new(&target, bytes).map_err(storage_err)? {
                debug!(location = %candidate, size = bytes.len(), "blob written");
                return Ok(candidate);
            }
            candidate = alternate_path(path);
        }
        Err(BlobStoreError::Storage {
            reason: format!("no free location for {path} after {MAX_NAME_ATTEMPTS} attempts"),
        })
    }

    #[instrument(skip_all, fields(location = %location))]
    async fn exists(&self, location: &str) -> Result<bool, BlobStoreError> {
        let path = self.resolve(location)?;
        match fs::metadata(path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(storage_err(err)),
        }
    }

    #[instrument(skip_all, fields(location = %location))]
    async fn open(&self, location: &str) -> Result<Vec<u8>, BlobStoreError> {
        let path = self.resolve(location)?;
        fs::read(path).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                BlobStoreError::NotFound {
                    location: location.to_string(),
                }
            } else {
                storage_err(err)
            }
        })
    }
}

/// Write `bytes` to `target` unless it already exists. Returns `false` when
/// the target was taken.
fn write_new(target: &Path, bytes: &[u8]) -> io::Result<bool> {
    let parent = target
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid storage path"))?;
    fs::create_dir_all(parent)?;
    if target.exists() {
        return Ok(false);
    }

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    match tmp.persist_noclobber(target) {
        Ok(_) => Ok(true),
        Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(err) => Err(err.error),
    }
}

fn storage_err<E: ToString>(err: E) -> BlobStoreError {
    BlobStoreError::Storage {
        reason: err.to_string(),
    }
}
