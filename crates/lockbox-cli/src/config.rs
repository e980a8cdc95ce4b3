use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::Result;
use dirs::config_dir;
use lockbox_http::{HttpSettings, DEFAULT_MAX_UPLOAD_BYTES};
use serde::{Deserialize, Serialize};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_MEDIA_URL: &str = "/media/";
const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000";

/// User-level configuration loaded from `~/.config/lockbox/config.toml` (platform-specific).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Override for the data directory (blobs and the default database).
    pub data_dir: Option<PathBuf>,
    /// SQLite URL of the metadata database.
    pub database_url: Option<String>,
    pub server: Option<ServerConfig>,
    pub client: Option<ClientConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: Option<String>,
    pub media_url: Option<String>,
    pub max_upload_bytes: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the server `push` and `pull` talk to.
    pub endpoint: Option<String>,
}

impl Config {
    /// Defaults written by `lockbox config init`.
    pub fn defaults() -> Self {
        Self {
            data_dir: None,
            database_url: None,
            server: Some(ServerConfig {
                bind_addr: Some(DEFAULT_BIND_ADDR.into()),
                media_url: Some(DEFAULT_MEDIA_URL.into()),
                max_upload_bytes: Some(DEFAULT_MAX_UPLOAD_BYTES),
            }),
            client: Some(ClientConfig {
                endpoint: Some(DEFAULT_ENDPOINT.into()),
            }),
        }
    }

    pub fn bind_addr(&self) -> String {
        self.server
            .as_ref()
            .and_then(|s| s.bind_addr.clone())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
    }

    pub fn http_settings(&self) -> HttpSettings {
        let defaults = HttpSettings::default();
        let server = self.server.clone().unwrap_or_default();
        HttpSettings {
            media_url: server.media_url.unwrap_or(defaults.media_url),
            max_upload_bytes: server.max_upload_bytes.unwrap_or(defaults.max_upload_bytes),
        }
    }

    pub fn endpoint(&self) -> String {
        self.client
            .as_ref()
            .and_then(|c| c.endpoint.clone())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
    }
}

/// Load config from `path`, or from the default location when `None`.
pub fn load(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_from_path(path),
        None => load_from_path(default_path()?),
    }
}

/// Load config from a given path; if missing or empty, return defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let cfg: Config = toml::from_str(&contents)?;
    Ok(cfg)
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
    Ok(base.join("lockbox").join("config.toml"))
}

/// Write `config` to `path` unless a file is already there. Returns the path.
pub fn write_default_if_missing(config: &Config, path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}
