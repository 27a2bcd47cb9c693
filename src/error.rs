//! Error types for the PDF image server

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("No file Part")]
    NoFilePart,

    #[error("No Selected File")]
    NoSelectedFile,

    #[error("File Size Exceeds {limit_mb} MB Limit")]
    FileTooLarge { limit_mb: u64 },

    /// Carries the rejected filename for logs; the message stays generic
    #[error("Invalid File Type")]
    InvalidFileType(String),

    #[error("Failed to read upload: {0}")]
    Multipart(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Map a multipart read failure, treating an exceeded body limit as
    /// an oversized file
    pub fn from_multipart(err: MultipartError, max_file_size: u64) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::FileTooLarge {
                limit_mb: megabytes(max_file_size),
            }
        } else {
            AppError::Multipart(err.body_text())
        }
    }
}

/// Whole megabytes for user-facing size messages (rounded up)
pub fn megabytes(bytes: u64) -> u64 {
    bytes.div_ceil(1024 * 1024)
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::NoFilePart => (StatusCode::BAD_REQUEST, "no_file_part", self.to_string()),
            AppError::NoSelectedFile => {
                (StatusCode::BAD_REQUEST, "no_selected_file", self.to_string())
            }
            AppError::FileTooLarge { .. } => {
                (StatusCode::BAD_REQUEST, "file_too_large", self.to_string())
            }
            AppError::InvalidFileType(name) => {
                tracing::debug!(file_name = %name, "Rejected upload with invalid file type");
                (StatusCode::BAD_REQUEST, "invalid_file_type", self.to_string())
            }
            AppError::Multipart(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Io(e) => {
                tracing::error!("IO error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "io_error",
                    "IO error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: match &self {
                AppError::Internal(_) | AppError::Io(_) if cfg!(debug_assertions) => {
                    Some(self.to_string())
                }
                _ => None,
            },
        });

        (status, body).into_response()
    }
}
