use crate::auth::AuthUser;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::services::{UploadInitRequest, UploadInitResponse};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use reels_core::models::VideoResponse;
use reels_core::AppError;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct UploadCompleteRequest {
    pub video_id: Uuid,
}

#[utoipa::path(
    post,
    path = "/videos/upload/init",
    tag = "videos",
    request_body = UploadInitRequest,
    responses(
        (status = 200, description = "Upload URL issued", body = UploadInitResponse),
        (status = 400, description = "Unsupported content type, file too large or invalid input", body = ErrorResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(state, request),
    fields(user_id = %user.user_id, operation = "upload_init")
)]
pub async fn upload_init(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<UploadInitRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let response = state.uploads.init_upload(user.user_id, request).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/videos/upload/complete",
    tag = "videos",
    request_body = UploadCompleteRequest,
    responses(
        (status = 200, description = "Processing started, or already started", body = VideoResponse),
        (status = 400, description = "Uploaded object not found", body = ErrorResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse),
        (status = 403, description = "Video belongs to another user", body = ErrorResponse),
        (status = 404, description = "Video not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(state, request),
    fields(user_id = %user.user_id, video_id = %request.video_id, operation = "upload_complete")
)]
pub async fn upload_complete(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<UploadCompleteRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let video = state
        .completion
        .complete_upload(request.video_id, user.user_id)
        .await?;
    Ok(Json(VideoResponse::from(video)))
}

#[utoipa::path(
    get,
    path = "/videos/{id}",
    tag = "videos",
    params(
        ("id" = Uuid, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Video found", body = VideoResponse),
        (status = 400, description = "Malformed video ID", body = ErrorResponse),
        (status = 404, description = "Video not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(video_id = %id, operation = "get_video"))]
pub async fn get_video(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let video_id = Uuid::parse_str(&id).map_err(AppError::from)?;

    let video = state
        .videos
        .get(video_id)
        .await?
        .ok_or(AppError::VideoNotFound(video_id))?;

    Ok(Json(VideoResponse::from(video)))
}
