use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::IntoResponse,
    Json,
};
use reels_core::models::VideoResponse;
use reels_core::AppError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_FEED_LIMIT: i64 = 20;
pub const MAX_FEED_LIMIT: i64 = 50;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct FeedQuery {
    /// Page size, clamped to 1..=50 (default 20)
    pub limit: Option<i64>,
    /// Items to skip, negative values count as 0
    pub offset: Option<i64>,
}

impl FeedQuery {
    fn page(&self) -> (i64, i64) {
        let limit = self
            .limit
            .unwrap_or(DEFAULT_FEED_LIMIT)
            .clamp(1, MAX_FEED_LIMIT);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FeedResponse {
    pub items: Vec<VideoResponse>,
    pub limit: i64,
    pub offset: i64,
    /// Number of ready videos
    pub total: i64,
}

#[utoipa::path(
    get,
    path = "/feed",
    tag = "feed",
    params(FeedQuery),
    responses(
        (status = 200, description = "Ready videos, newest first", body = FeedResponse),
        (status = 400, description = "Malformed query", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, query))]
pub async fn feed(
    State(state): State<Arc<AppState>>,
    query: Result<Query<FeedQuery>, QueryRejection>,
) -> Result<impl IntoResponse, HttpAppError> {
    let Query(query) = query.map_err(|e| AppError::InvalidInput(e.body_text()))?;
    let (limit, offset) = query.page();

    let videos = state.videos.list_feed(limit, offset).await?;
    let total = state.videos.count_feed().await?;

    tracing::debug!(limit, offset, returned = videos.len(), total, "Feed page served");

    Ok(Json(FeedResponse {
        items: videos.into_iter().map(VideoResponse::from).collect(),
        limit,
        offset,
        total,
    }))
}
