use crate::auth::models::AuthUser;
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use reels_core::AppError;
use std::sync::Arc;

/// Require a valid bearer access token and attach the caller as [`AuthUser`].
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(&request) {
        Ok(token) => token,
        Err(err) => return HttpAppError(err).into_response(),
    };

    match state.jwt.validate_token(token) {
        Ok(user_id) => {
            request.extensions_mut().insert(AuthUser { user_id });
            next.run(request).await
        }
        Err(err) => HttpAppError(err).into_response(),
    }
}

fn bearer_token(request: &Request) -> Result<&str, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

    let value = header
        .to_str()
        .map_err(|_| AppError::InvalidToken("Authorization header is not ASCII".to_string()))?;

    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(AppError::Unauthorized(
            "Authorization header must use the Bearer scheme".to_string(),
        )),
    }
}
