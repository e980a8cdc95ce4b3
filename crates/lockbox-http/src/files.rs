//! `POST /files` (multipart upload) and `GET /files?file_name=` (download).

use axum::{
    extract::{multipart::MultipartRejection, Multipart, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{error::ApiError, AppState};

/// Multipart field carrying the uploaded file.
const FILE_FIELD: &str = "file";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadResponse {
    pub message: String,
    pub file_url: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub file_name: Option<String>,
}

#[instrument(skip_all)]
pub(crate) async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    // Not a multipart body at all: nothing was uploaded.
    let Ok(mut multipart) = multipart else {
        return Err(ApiError::bad_request("No file uploaded"));
    };

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(|err| {
        ApiError::new(
            err.status(),
            format!("Invalid multipart data: {}", err.body_text()),
        )
    })? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let Some(file_name) = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
        else {
            debug!("skipping file field without filename");
            continue;
        };
        let data = field.bytes().await.map_err(|err| {
            ApiError::new(
                err.status(),
                format!("Failed to read file '{file_name}': {}", err.body_text()),
            )
        })?;
        upload = Some((file_name, data));
        break;
    }

    let Some((file_name, data)) = upload else {
        return Err(ApiError::bad_request("No file uploaded"));
    };
    debug!(file_name = %file_name, size = data.len(), "received upload");

    let stored = state
        .vault
        .store(&file_name, &data)
        .await
        .map_err(ApiError::upload)?;

    Ok(Json(UploadResponse {
        message: "File uploaded and encrypted successfully".to_string(),
        file_url: format!("{}{}", state.media_url, stored.location),
    }))
}

#[instrument(skip_all)]
pub(crate) async fn download(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let file_name = query
        .file_name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::bad_request("File name not provided"))?;

    let content = state
        .vault
        .retrieve(&file_name)
        .await
        .map_err(ApiError::retrieval)?;

    let disposition = HeaderValue::from_str(&content_disposition(&file_name)).map_err(|err| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("An error occurred while retrieving the file: {err}"),
        )
    })?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        content,
    )
        .into_response())
}

fn content_disposition(file_name: &str) -> String {
    let escaped = file_name.replace('\\', "\\\\").replace('"', "\\\"");
    format!("attachment; filename=\"{escaped}\"")
}
