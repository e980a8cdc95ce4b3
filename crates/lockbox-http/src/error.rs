use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lockbox_vault::VaultError;
use serde_json::json;
use tracing::{debug, error};

/// Error rendered as `{"error": "<message>"}` with a fixed status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        if status.is_server_error() {
            error!(%status, %message, "request failed");
        } else {
            debug!(%status, %message, "request rejected");
        }
        Self { status, message }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Status mapping for `POST /files`.
    pub fn upload(err: VaultError) -> Self {
        match err {
            VaultError::InvalidInput(message) => Self::bad_request(message),
            err @ VaultError::AlreadyExists { .. } => {
                Self::new(StatusCode::CONFLICT, err.to_string())
            }
            other => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("An error occurred during file upload: {other}"),
            ),
        }
    }

    /// Status mapping for `GET /files`.
    pub fn retrieval(err: VaultError) -> Self {
        match err {
            VaultError::InvalidInput(message) => Self::bad_request(message),
            err @ (VaultError::RecordNotFound { .. } | VaultError::BlobNotFound { .. }) => {
                Self::new(StatusCode::NOT_FOUND, err.to_string())
            }
            err @ VaultError::Authentication => Self::bad_request(err.to_string()),
            other => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("An error occurred while retrieving the file: {other}"),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
