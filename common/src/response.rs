//! API response wrapper types.
//!
//! Provides a unified response format for all API endpoints:
//! `{ "success": bool, "message"?: string, "data"?: any, "error"?: string }`.

use serde::Serialize;
use utoipa::ToSchema;

/// Standard API response wrapper.
///
/// A successful response never carries `error`; a failed one always carries a
/// non-empty `error` and never carries `data`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,

    /// Human-readable status message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Response data (present on success).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    /// Error text (present on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response with data.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            error: None,
        }
    }

    /// Creates a successful response with data and a message.
    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self::ok(data).with_message(message)
    }

    /// Sets the message on the response.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    /// Creates an error response.
    ///
    /// An empty error text is replaced so that failed responses always explain
    /// themselves.
    pub fn err(error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.is_empty() {
            error = "unknown error".to_string();
        }
        Self {
            success: false,
            message: None,
            data: None,
            error: Some(error),
        }
    }

    /// Creates a success response carrying only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            error: None,
        }
    }
}
