use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::config::Config;
use color_eyre::{eyre::WrapErr, Result};
use dirs::data_dir;
use lockbox_storage::{fs_blob_store::FilesystemBlobStore, sqlite_metadata::SqliteMetadataStore};
use lockbox_vault::VaultService;
use tracing::debug;

/// Subdirectory of the data dir holding encrypted blobs.
const MEDIA_DIR: &str = "media";

/// Resolve the default data directory for lockbox.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("lockbox"))
}

/// Data directory with config override applied.
pub fn data_dir_from_config(config: &Config) -> Result<PathBuf> {
    match &config.data_dir {
        Some(root) => Ok(root.clone()),
        None => default_data_dir(),
    }
}

pub fn database_url(config: &Config, data_dir: &Path) -> String {
    config
        .database_url
        .clone()
        .unwrap_or_else(|| format!("sqlite://{}", data_dir.join("metadata.db").display()))
}

/// Open the blob store and metadata database described by `config`.
pub async fn vault_from_config(config: &Config) -> Result<VaultService> {
    let root = data_dir_from_config(config)?;
    let media_root = root.join(MEDIA_DIR);
    std::fs::create_dir_all(&media_root)?;
    let url = database_url(config, &root);
    debug!(?media_root, %url, "initializing vault storage");

    let records = SqliteMetadataStore::connect(&url)
        .await
        .wrap_err_with(|| format!("failed to open metadata database {url}"))?;
    Ok(VaultService::new(
        Arc::new(FilesystemBlobStore::new(media_root)),
        Arc::new(records),
    ))
}
