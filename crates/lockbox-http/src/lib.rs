//! HTTP boundary for the vault: upload, download and health routes.

mod error;
mod files;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Json, Router,
};
use lockbox_vault::VaultService;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use crate::{
    error::ApiError,
    files::{DownloadQuery, UploadResponse},
};

/// Default cap on request bodies: 100 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Settings of the HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    /// Prefix joined with a blob location to build `file_url`.
    pub media_url: String,
    pub max_upload_bytes: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            media_url: "/media/".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) vault: VaultService,
    pub(crate) media_url: Arc<str>,
}

/// Build the application router around a vault.
pub fn router(vault: VaultService, settings: &HttpSettings) -> Router {
    let state = AppState {
        vault,
        media_url: Arc::from(settings.media_url.as_str()),
    };

    Router::new()
        .route("/files", post(files::upload).get(files::download))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(settings.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `app` on `listener` until Ctrl-C.
pub async fn serve(listener: TcpListener, app: Router) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "failed to listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod test {
    use axum::http::StatusCode;
    use axum_test::{
        multipart::{MultipartForm, Part},
        TestServer,
    };
    use lockbox_core::{
        blobs::InMemoryBlobStore,
        records::{FileRecord, InMemoryMetadataStore, MetadataStore},
    };
    use serde_json::Value;

    use super::*;

    struct Harness {
        server: TestServer,
        blobs: InMemoryBlobStore,
        records: InMemoryMetadataStore,
    }

    fn create_test_server_with_settings(settings: HttpSettings) -> anyhow::Result<Harness> {
        let blobs = InMemoryBlobStore::new();
        let records = InMemoryMetadataStore::new();
        let vault = VaultService::new(Arc::new(blobs.clone()), Arc::new(records.clone()));
        let server = TestServer::new(router(vault, &settings))?;
        Ok(Harness {
            server,
            blobs,
            records,
        })
    }

    fn create_test_server() -> anyhow::Result<Harness> {
        create_test_server_with_settings(HttpSettings::default())
    }

    fn file_form(name: &str, content: &[u8]) -> MultipartForm {
        MultipartForm::new().add_part("file", Part::bytes(content.to_vec()).file_name(name))
    }

    fn error_of(body: &Value) -> &str {
        body["error"].as_str().unwrap_or_default()
    }

    #[tokio::test]
    async fn upload_success() -> anyhow::Result<()> {
        let h = create_test_server()?;

        let response = h
            .server
            .post("/files")
            .multipart(file_form("test.txt", b"Hello World"))
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let body: UploadResponse = response.json();
        assert_eq!(body.message, "File uploaded and encrypted successfully");
        assert_eq!(body.file_url, "/media/encrypted_files/test.txt");
        assert!(h.records.find_by_name("test.txt").await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn upload_without_file_is_bad_request() -> anyhow::Result<()> {
        let h = create_test_server()?;

        let response = h.server.post("/files").await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error_of(&response.json()), "No file uploaded");

        let response = h
            .server
            .post("/files")
            .multipart(MultipartForm::new().add_text("note", "no file here"))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error_of(&response.json()), "No file uploaded");
        assert!(h.blobs.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn upload_with_blank_filename_counts_as_no_file() -> anyhow::Result<()> {
        let h = create_test_server()?;
        let response = h
            .server
            .post("/files")
            .multipart(file_form("", b"Hello World"))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error_of(&response.json()), "No file uploaded");
        assert!(h.blobs.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn upload_empty_file_is_bad_request() -> anyhow::Result<()> {
        let h = create_test_server()?;
        let response = h
            .server
            .post("/files")
            .multipart(file_form("empty.txt", b""))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error_of(&response.json()), "File 'empty.txt' is empty.");
        Ok(())
    }

    #[tokio::test]
    async fn upload_duplicate_is_conflict() -> anyhow::Result<()> {
        let h = create_test_server()?;
        h.server
            .post("/files")
            .multipart(file_form("test.txt", b"one"))
            .await
            .assert_status_ok();

        let response = h
            .server
            .post("/files")
            .multipart(file_form("test.txt", b"two"))
            .await;
        assert_eq!(response.status_code(), StatusCode::CONFLICT);
        assert_eq!(error_of(&response.json()), "File 'test.txt' already exists.");
        Ok(())
    }

    #[tokio::test]
    async fn upload_over_limit_is_rejected() -> anyhow::Result<()> {
        let h = create_test_server_with_settings(HttpSettings {
            max_upload_bytes: 64,
            ..HttpSettings::default()
        })?;
        let response = h
            .server
            .post("/files")
            .multipart(file_form("big.bin", &[0u8; 1024]))
            .await;
        assert!(response.status_code().is_client_error());
        assert!(h.records.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn retrieve_success() -> anyhow::Result<()> {
        let h = create_test_server()?;
        h.server
            .post("/files")
            .multipart(file_form("test.txt", b"Hello World"))
            .await
            .assert_status_ok();

        let response = h
            .server
            .get("/files")
            .add_query_param("file_name", "test.txt")
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.as_bytes().as_ref(), b"Hello World");
        assert_eq!(
            response.header("content-disposition"),
            r#"attachment; filename="test.txt""#
        );
        assert_eq!(
            response.header("content-type"),
            "application/octet-stream"
        );
        Ok(())
    }

    #[tokio::test]
    async fn retrieve_without_name_is_bad_request() -> anyhow::Result<()> {
        let h = create_test_server()?;
        let response = h.server.get("/files").await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error_of(&response.json()), "File name not provided");
        Ok(())
    }

    #[tokio::test]
    async fn retrieve_file_not_found_in_db() -> anyhow::Result<()> {
        let h = create_test_server()?;
        let response = h
            .server
            .get("/files")
            .add_query_param("file_name", "nonexistent.txt")
            .await;

        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            error_of(&response.json()),
            "File 'nonexistent.txt' not found in the database."
        );
        Ok(())
    }

    #[tokio::test]
    async fn retrieve_file_not_found_in_storage() -> anyhow::Result<()> {
        let h = create_test_server()?;
        h.records
            .create(&FileRecord::new(
                "test.txt".into(),
                "testkey".into(),
                "invalid_path.txt".into(),
            ))
            .await?;

        let response = h
            .server
            .get("/files")
            .add_query_param("file_name", "test.txt")
            .await;

        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            error_of(&response.json()),
            "File 'test.txt' not found on the storage system."
        );
        Ok(())
    }

    #[tokio::test]
    async fn retrieve_decryption_failure() -> anyhow::Result<()> {
        let h = create_test_server()?;
        h.server
            .post("/files")
            .multipart(file_form("test.txt", b"Hello World"))
            .await
            .assert_status_ok();
        assert!(h.records.modify("test.txt", |r| r.key = "invalid_key".into()));

        let response = h
            .server
            .get("/files")
            .add_query_param("file_name", "test.txt")
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            error_of(&response.json()),
            "Decryption failed. Invalid encryption key or corrupted file."
        );
        Ok(())
    }

    #[tokio::test]
    async fn retrieve_tampered_blob_fails_decryption() -> anyhow::Result<()> {
        let h = create_test_server()?;
        h.server
            .post("/files")
            .multipart(file_form("test.txt", b"Hello World"))
            .await
            .assert_status_ok();
        assert!(h
            .blobs
            .modify("encrypted_files/test.txt", |bytes| bytes[20] ^= 0xff));

        let response = h
            .server
            .get("/files")
            .add_query_param("file_name", "test.txt")
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn health_reports_ok() -> anyhow::Result<()> {
        let h = create_test_server()?;
        let response = h.server.get("/health").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
        Ok(())
    }
}
