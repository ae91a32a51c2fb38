//! 중앙화된 에러 처리 모듈.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-wide error type.
///
/// Used by both binaries: the dump tool maps it to an exit code, the
/// collector server to an HTTP response.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bad request error (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// GeoIP database download, extraction or lookup failure
    #[error("GeoIP error: {0}")]
    Geo(String),

    /// Xata answered with a 4xx/5xx status
    #[error("Problem getting data, response with code {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// Redirect without a usable Location or too many hops
    #[error("Redirect error: {0}")]
    Redirect(String),

    /// Response shape that breaks the paging contract
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// HTTP client error
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Output file error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Process exit code for this error.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            _ => 1,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Json(e) => (StatusCode::BAD_REQUEST, format!("JSON error: {e}")),
            Self::HttpClient(e) => {
                tracing::error!("Problem accessing Xata: {e:?}");
                (StatusCode::BAD_GATEWAY, "Problem accessing Xata".to_string())
            }
            Self::Redirect(_) | Self::UpstreamStatus { .. } | Self::Protocol(_) => {
                tracing::error!("Problem accessing Xata: {self}");
                (StatusCode::BAD_GATEWAY, "Problem accessing Xata".to_string())
            }
            Self::Config(_) | Self::Geo(_) | Self::Io(_) => {
                tracing::error!("Internal error: {self}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Helper trait for converting validation errors.
pub trait ValidationErrorExt {
    fn to_config_error(&self) -> AppError;
}

impl ValidationErrorExt for validator::ValidationErrors {
    fn to_config_error(&self) -> AppError {
        // Get the first field error for a clean message
        if let Some((field, errors)) = self.field_errors().iter().next() {
            if let Some(error) = errors.first() {
                let message = error.message.as_ref().map_or_else(
                    || format!("Validation failed on field '{field}' with tag '{}'", error.code),
                    std::string::ToString::to_string,
                );
                return AppError::Config(message);
            }
        }
        AppError::Config(self.to_string())
    }
}
