use crate::storage::StorageError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Upload exceeds the size limit")]
    PayloadTooLarge,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Inference failed: {0:#}")]
    Inference(anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Storage(_) | AppError::Inference(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Text shown to the client. Server-side causes stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            AppError::Validation(message) => message.clone(),
            AppError::PayloadTooLarge => "File is too large.".to_string(),
            AppError::Storage(StorageError::Upload { .. }) => {
                "Failed to save uploaded file.".to_string()
            }
            AppError::Storage(StorageError::Result { .. }) => {
                "Failed to save result image.".to_string()
            }
            AppError::Inference(_) => {
                "Detection process failed. Please try another image.".to_string()
            }
            AppError::Internal(_) => "Internal server error.".to_string(),
        }
    }

    /// Metric label for the request outcome.
    pub fn outcome(&self) -> &'static str {
        match self {
            AppError::Validation(_) | AppError::PayloadTooLarge => "rejected",
            AppError::Storage(_) => "storage_error",
            AppError::Inference(_) => "inference_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Upload failed");
        } else {
            tracing::warn!(error = %self, "Upload rejected");
        }

        let body = json!({
            "success": false,
            "error": self.client_message(),
        });
        (status, Json(body)).into_response()
    }
}
