//! Upload handshake, first half: validate the request, create the `pending`
//! record, and sign a direct-to-storage upload URL.

use reels_core::models::{
    raw_object_key, Video, VideoStatus, DEFAULT_RAW_EXTENSION, TITLE_MAX_LEN,
};
use reels_core::{AppError, UploadSettings};
use reels_db::VideoRepository;
use reels_storage::Storage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::storage_to_app_error;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UploadInitRequest {
    #[serde(default)]
    #[validate(length(max = TITLE_MAX_LEN, message = "title must be at most 255 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "filename must not be empty"))]
    pub filename: String,
    pub content_type: String,
    #[validate(range(min = 1, message = "size_bytes must be positive"))]
    pub size_bytes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadInitResponse {
    /// Presigned URL the client PUTs the file to.
    pub upload_url: String,
    pub object_key: String,
    pub video_id: Uuid,
}

/// Last path component of a client-supplied filename. Both `/` and `\` count
/// as separators. Empty names and `..` are treated as no name at all.
pub(crate) fn sanitize_filename(filename: &str) -> Option<&str> {
    let base = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or("")
        .trim();
    match base {
        "" | "." | ".." => None,
        name => Some(name),
    }
}

/// Suffix of the base name including the dot, or `.bin`. Dotfiles such as
/// `.mp4` and names ending in a dot have no suffix.
pub(crate) fn raw_extension(filename: &str) -> String {
    sanitize_filename(filename)
        .and_then(|name| {
            let idx = name.rfind('.')?;
            if idx == 0 || idx + 1 == name.len() {
                return None;
            }
            Some(name[idx..].to_string())
        })
        .unwrap_or_else(|| DEFAULT_RAW_EXTENSION.to_string())
}

pub struct UploadSessionManager {
    videos: Arc<dyn VideoRepository>,
    storage: Arc<dyn Storage>,
    settings: UploadSettings,
}

impl UploadSessionManager {
    pub fn new(
        videos: Arc<dyn VideoRepository>,
        storage: Arc<dyn Storage>,
        settings: UploadSettings,
    ) -> Self {
        Self {
            videos,
            storage,
            settings,
        }
    }

    /// Content type, then size limit, then field-level validation.
    fn check(&self, request: &UploadInitRequest) -> Result<String, AppError> {
        let content_type = request.content_type.trim().to_lowercase();
        if !self.settings.is_allowed_content_type(&content_type) {
            return Err(AppError::InvalidContentType(request.content_type.clone()));
        }

        if request.size_bytes > 0 && request.size_bytes as u64 > self.settings.max_upload_size_bytes
        {
            return Err(AppError::FileTooLarge {
                size: request.size_bytes,
                max: self.settings.max_upload_size_bytes,
            });
        }

        request.validate()?;
        Ok(content_type)
    }

    /// Register a new video and return where to upload it.
    ///
    /// The record is written before the URL is signed. If signing fails the
    /// record stays `pending` and is simply never completed.
    #[tracing::instrument(
        skip(self, request),
        fields(
            user_id = %user_id,
            content_type = %request.content_type,
            size_bytes = request.size_bytes
        )
    )]
    pub async fn init_upload(
        &self,
        user_id: Uuid,
        request: UploadInitRequest,
    ) -> Result<UploadInitResponse, AppError> {
        let content_type = self.check(&request)?;

        let video_id = Uuid::new_v4();
        let object_key = raw_object_key(video_id, &raw_extension(&request.filename));
        let video = Video::new_pending(video_id, user_id, request.title, object_key.clone());

        self.videos.create(&video).await?;
        tracing::info!(
            event = "video_status_change",
            video_id = %video_id,
            status = %VideoStatus::Pending,
            key = %object_key,
            "video_status_change"
        );

        let ttl = Duration::from_secs(self.settings.presigned_url_ttl_secs);
        let upload_url = self
            .storage
            .issue_upload_url(&object_key, &content_type, ttl)
            .await
            .map_err(storage_to_app_error)?;

        Ok(UploadInitResponse {
            upload_url,
            object_key,
            video_id,
        })
    }
}
