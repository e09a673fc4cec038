//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Anything that
//! converts into [`AppError`] becomes an `HttpAppError` through `?` and renders
//! as `{"error": {"code", "message", "details"?}}`.
//!
//! Production routers add [`hide_error_details`], which drops `details` from
//! every rendered error.

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use reels_core::{AppError, ErrorMetadata, LogLevel};
use reels_storage::StorageError;
use serde::{de::DeserializeOwned, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code for programmatic handling
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Whether repeating the same request may succeed
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Copy of the body attached to every error response, read back by
/// [`hide_error_details`].
#[derive(Debug, Clone)]
struct RenderedError(ErrorResponse);

/// Wrapper type for AppError to implement IntoResponse
/// (orphan rules: `IntoResponse` and `AppError` both live in other crates).
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

/// JSON body deserialization failures are client errors.
impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        let body_text = rejection.body_text();
        let message = if body_text.contains("expected a formatted UUID") {
            "Invalid request body: video_id must be a UUID string".to_string()
        } else {
            format!("Invalid request body: {}", body_text)
        };
        HttpAppError(AppError::InvalidInput(message))
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        HttpAppError(storage_to_app_error(err))
    }
}

pub(crate) fn storage_to_app_error(err: StorageError) -> AppError {
    match err {
        StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
        StorageError::IoError(err) => AppError::Internal(format!("IO error: {}", err)),
        StorageError::ConfigError(msg) => AppError::Internal(msg),
        StorageError::NotFound(msg)
        | StorageError::UploadFailed(msg)
        | StorageError::DownloadFailed(msg)
        | StorageError::BackendError(msg) => AppError::Storage(msg),
    }
}

/// JSON body extractor that answers with [`ErrorResponse`] (400) when the body
/// does not deserialize, instead of axum's plain-text rejection.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

fn error_body(app_error: &AppError) -> ErrorResponse {
    let details = if app_error.is_sensitive() {
        None
    } else {
        Some(app_error.detailed_message())
    };
    ErrorResponse {
        error: ErrorBody {
            code: app_error.error_code().to_string(),
            message: app_error.client_message(),
            details,
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(String::from),
        },
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        let body = error_body(app_error);
        let mut response = (status, Json(body.clone())).into_response();
        response.extensions_mut().insert(RenderedError(body));
        response
    }
}

/// Re-render error responses without `details`. Installed on the router
/// when the configured environment is production.
pub async fn hide_error_details(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let Some(RenderedError(body)) = response.extensions().get::<RenderedError>().cloned() else {
        return response;
    };
    let status = response.status();
    (status, Json(without_details(body))).into_response()
}

fn without_details(mut body: ErrorResponse) -> ErrorResponse {
    body.error.details = None;
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_from_storage_error_backend() {
        let HttpAppError(app_err) =
            StorageError::BackendError("connection reset".to_string()).into();
        match app_err {
            AppError::Storage(msg) => assert_eq!(msg, "connection reset"),
            other => panic!("Expected Storage variant, got {:?}", other),
        }
    }

    #[test]
    fn test_from_storage_error_invalid_key() {
        let HttpAppError(app_err) = StorageError::InvalidKey("bad key".to_string()).into();
        assert!(matches!(app_err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_from_storage_error_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let HttpAppError(app_err) = StorageError::IoError(io_err).into();
        match app_err {
            AppError::Internal(msg) => assert!(msg.contains("IO error")),
            other => panic!("Expected Internal variant, got {:?}", other),
        }
    }

    #[test]
    fn test_error_body_shape() {
        let body = error_body(&AppError::VideoNotFound(Uuid::nil()));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"]["code"], "video_not_found");
        assert_eq!(json["error"]["message"], "Video not found");
        assert!(json["error"]["details"].is_string());
    }

    #[test]
    fn test_sensitive_details_hidden() {
        let body = error_body(&AppError::Internal("db password leaked".to_string()));
        assert_eq!(body.error.code, "internal_error");
        assert!(body.error.details.is_none());
        assert_eq!(body.error.message, "Internal server error");
    }

    #[test]
    fn test_production_hides_all_details() {
        let body = error_body(&AppError::UploadMissing("raw/a/a.mp4".to_string()));
        assert!(body.error.details.is_some());
        let body = without_details(body);
        assert_eq!(body.error.code, "upload_missing");
        assert!(body.error.details.is_none());
    }

    #[test]
    fn test_status_code_from_metadata() {
        let response = HttpAppError(AppError::Forbidden("not yours".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.extensions().get::<RenderedError>().is_some());
    }
}
