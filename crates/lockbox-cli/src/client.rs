use std::path::{Path, PathBuf};

use color_eyre::{eyre::eyre, Result};
use lockbox_http::UploadResponse;
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use serde::Deserialize;
use tracing::{debug, instrument};

/// Thin HTTP client for a lockbox server.
pub struct VaultClient {
    http: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl VaultClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self {
            http: Client::new(),
            endpoint,
        }
    }

    fn files_url(&self) -> String {
        format!("{}/files", self.endpoint)
    }

    /// Upload `content` under `name`.
    #[instrument(skip_all, fields(name = %name))]
    pub async fn upload(&self, name: &str, content: Vec<u8>) -> Result<UploadResponse> {
        let form = Form::new().part("file", Part::bytes(content).file_name(name.to_string()));
        let response = self
            .http
            .post(self.files_url())
            .multipart(form)
            .send()
            .await?;
        let response = check(response).await?;
        Ok(response.json::<UploadResponse>().await?)
    }

    /// Fetch the plaintext stored under `name`.
    #[instrument(skip_all, fields(name = %name))]
    pub async fn download(&self, name: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(self.files_url())
            .query(&[("file_name", name)])
            .send()
            .await?;
        let response = check(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Turn a non-2xx response into an error carrying the server's message.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or(body);
    debug!(%status, %message, "server rejected request");
    Err(eyre!("server returned {status}: {message}"))
}

/// `lockbox push`: read `path` and upload it.
pub async fn push(client: &VaultClient, path: &Path, name: Option<String>) -> Result<UploadResponse> {
    let name = match name {
        Some(name) => name,
        None => path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| eyre!("cannot derive a file name from {}", path.display()))?,
    };
    let content = tokio::fs::read(path).await?;
    client.upload(&name, content).await
}

/// `lockbox pull`: download `name` and write it to `output`, or to its final
/// path component in the working directory.
pub async fn pull(client: &VaultClient, name: &str, output: Option<PathBuf>) -> Result<PathBuf> {
    let output = match output {
        Some(output) => output,
        None => default_output(name)?,
    };
    let content = client.download(name).await?;
    tokio::fs::write(&output, content).await?;
    Ok(output)
}

fn default_output(name: &str) -> Result<PathBuf> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    if base.is_empty() || base == "." || base == ".." {
        return Err(eyre!("cannot derive an output file from '{name}'; pass --output"));
    }
    Ok(PathBuf::from(base))
}
