//! Application error type.
//!
//! Every handler returns `AppResult<T>`; the error side is rendered as the
//! standard response envelope with a status code chosen by the variant.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::response::ApiResponse;

/// Result alias used across the workspace.
pub type AppResult<T> = Result<T, AppError>;

/// Errors surfaced to API clients.
#[derive(Debug, Error)]
pub enum AppError {
    /// A request field failed validation.
    #[error("{0}")]
    Validation(String),

    /// The request body could not be deserialized.
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// An uploaded file exceeds the configured size limit.
    #[error("File size exceeds limit of {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    /// A referenced file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// A file could not be parsed as delimited records.
    #[error("Failed to read delimited file: {0}")]
    FileFormat(String),

    /// The database could not be reached or failed its liveness probe.
    #[error("Failed to connect to ClickHouse: {0}")]
    DatabaseConnection(String),

    /// A statement failed to execute.
    #[error("{0}")]
    DatabaseQuery(String),

    /// Server-side file system failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::InvalidBody(_)
            | AppError::PayloadTooLarge { .. }
            | AppError::FileNotFound(_)
            | AppError::FileFormat(_) => StatusCode::BAD_REQUEST,
            AppError::DatabaseConnection(_)
            | AppError::DatabaseQuery(_)
            | AppError::Io(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Maps an I/O error on a client-supplied path.
    ///
    /// A missing file is the client's fault; anything else is a server-side failure.
    pub fn from_io(path: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => AppError::FileNotFound(path.to_string()),
            _ => AppError::Io(format!("{}: {}", path, err)),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("{} is invalid", field),
                })
            })
            .collect();
        AppError::Validation(messages.join("; "))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "请求处理失败");
        } else {
            tracing::warn!(error = %self, "请求参数错误");
        }
        (status, Json(ApiResponse::err(self.to_string()))).into_response()
    }
}
