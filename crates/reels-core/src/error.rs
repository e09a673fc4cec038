//! Error types module
//!
//! All request-path failures are unified under [`AppError`]. Each variant
//! describes its own HTTP presentation through [`ErrorMetadata`], so the API
//! layer never has to match on variants to build a response.
//!
//! The `Database` variant wraps `sqlx::Error` when the `sqlx` feature is on
//! (the default) and a plain message otherwise.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;
use uuid::Uuid;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected client errors (validation, not found)
    Debug,
    /// Recoverable issues worth noticing
    Warn,
    /// Unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Stable machine-readable code (e.g. "video_not_found")
    fn error_code(&self) -> &'static str;

    /// Whether the client may retry the same request
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Unsupported content type: {0}")]
    InvalidContentType(String),

    #[error("File too large: {size} bytes exceeds limit of {max} bytes")]
    FileTooLarge { size: i64, max: u64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Uploaded object not found: {0}")]
    UploadMissing(String),

    #[error("Video not found: {0}")]
    VideoNotFound(Uuid),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Authentication required: {0}")]
    Unauthorized(String),

    #[error("Invalid access token: {0}")]
    InvalidToken(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "internal_error",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            500,
            "storage_unavailable",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Queue(_) => (
            500,
            "queue_unavailable",
            true,
            Some("Call upload completion again once the service recovers"),
            true,
            LogLevel::Error,
        ),
        AppError::InvalidContentType(_) => (
            400,
            "invalid_content_type",
            false,
            Some("Upload one of the supported video formats"),
            false,
            LogLevel::Debug,
        ),
        AppError::FileTooLarge { .. } => (
            400,
            "file_too_large",
            false,
            Some("Reduce the file size below the configured limit"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidInput(_) => (
            400,
            "validation_error",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::UploadMissing(_) => (
            400,
            "upload_missing",
            true,
            Some("Upload the file to the presigned URL before completing"),
            false,
            LogLevel::Debug,
        ),
        AppError::VideoNotFound(_) => (
            404,
            "video_not_found",
            false,
            Some("Verify the video ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::Forbidden(_) => (
            403,
            "forbidden",
            false,
            None,
            false,
            LogLevel::Warn,
        ),
        AppError::Unauthorized(_) => (
            401,
            "auth_required",
            false,
            Some("Send a bearer access token"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidToken(_) => (
            401,
            "invalid_token",
            false,
            Some("Obtain a fresh access token"),
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "internal_error",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::Queue(_) => "Queue",
            AppError::InvalidContentType(_) => "InvalidContentType",
            AppError::FileTooLarge { .. } => "FileTooLarge",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::UploadMissing(_) => "UploadMissing",
            AppError::VideoNotFound(_) => "VideoNotFound",
            AppError::Forbidden(_) => "Forbidden",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::InvalidToken(_) => "InvalidToken",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Internal server error".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::Queue(_) => "Failed to schedule processing".to_string(),
            AppError::InvalidContentType(_) => "Unsupported content type".to_string(),
            AppError::FileTooLarge { .. } => "File too large".to_string(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::UploadMissing(_) => "Uploaded object not found".to_string(),
            AppError::VideoNotFound(_) => "Video not found".to_string(),
            AppError::Forbidden(_) => "No access to this video".to_string(),
            AppError::Unauthorized(_) => "Authentication required".to_string(),
            AppError::InvalidToken(_) => "Invalid access token".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}
