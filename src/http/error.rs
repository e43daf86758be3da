//! HTTP error handling and response types.

use std::any::Any;

use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use super::dto::ErrorBody;
use crate::error::{ErrorKind, IngestionError};

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Invalid request (missing file, malformed multipart body)
    BadRequest(String),
    /// Request body above the configured bound
    PayloadTooLarge(String),
    /// Internal server error
    Internal(String),
    /// Ingestion of an uploaded file failed
    Ingestion {
        filename: String,
        error: IngestionError,
    },
}

impl AppError {
    pub fn ingestion(filename: impl Into<String>, error: IngestionError) -> Self {
        Self::Ingestion {
            filename: filename.into(),
            error,
        }
    }

    /// Status code and `detail` text for this error.
    pub fn status_and_detail(&self) -> (StatusCode, String) {
        match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::Ingestion { filename, error } => match error.kind() {
                ErrorKind::UnsupportedFormat | ErrorKind::DecodeError => {
                    (StatusCode::BAD_REQUEST, format!("{filename}: {error}"))
                }
                ErrorKind::LimitExceeded => (StatusCode::PAYLOAD_TOO_LARGE, format!("{filename}: {error}")),
                ErrorKind::InternalError => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("{filename}: internal error ({}): {error}", error.variant_name()),
                ),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = self.status_and_detail();
        (status, Json(ErrorBody { detail })).into_response()
    }
}

impl From<MultipartRejection> for AppError {
    fn from(err: MultipartRejection) -> Self {
        AppError::BadRequest(err.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(err.body_text())
        } else {
            AppError::BadRequest(err.body_text())
        }
    }
}

/// Response for a handler that panicked; keeps the `{detail}` body shape.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(panic = %message, "request handler panicked");
    AppError::Internal(format!("internal error (Panic): {message}")).into_response()
}
