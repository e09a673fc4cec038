use crate::error::HttpAppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use reels_core::AppError;
use uuid::Uuid;

/// Authenticated caller, placed in request extensions by
/// [`auth_middleware`](crate::auth::auth_middleware).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or_else(|| {
                HttpAppError(AppError::Unauthorized(
                    "Missing authenticated user".to_string(),
                ))
            })
    }
}
