//! Upload handshake, second half: confirm the object landed, move the record
//! to `processing`, and dispatch exactly one transcode job.

use reels_core::models::{StatusFields, TranscodeJob, Video, VideoStatus};
use reels_core::AppError;
use reels_db::VideoRepository;
use reels_storage::Storage;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::storage_to_app_error;
use crate::services::dispatcher::JobDispatcher;

pub struct CompletionGate {
    videos: Arc<dyn VideoRepository>,
    storage: Arc<dyn Storage>,
    dispatcher: Arc<dyn JobDispatcher>,
}

impl CompletionGate {
    pub fn new(
        videos: Arc<dyn VideoRepository>,
        storage: Arc<dyn Storage>,
        dispatcher: Arc<dyn JobDispatcher>,
    ) -> Self {
        Self {
            videos,
            storage,
            dispatcher,
        }
    }

    /// Idempotent: a video already `processing` or `ready` is returned as-is.
    /// Concurrent callers race on the status compare-and-set, and only the
    /// winner dispatches.
    #[tracing::instrument(skip(self), fields(video_id = %video_id, user_id = %user_id))]
    pub async fn complete_upload(&self, video_id: Uuid, user_id: Uuid) -> Result<Video, AppError> {
        let video = self
            .videos
            .get(video_id)
            .await?
            .ok_or(AppError::VideoNotFound(video_id))?;

        if !video.is_owned_by(user_id) {
            return Err(AppError::Forbidden(format!(
                "Video {} belongs to another user",
                video_id
            )));
        }

        if matches!(video.status, VideoStatus::Processing | VideoStatus::Ready) {
            tracing::debug!(status = %video.status, "Upload already completed");
            return Ok(video);
        }

        let exists = self
            .storage
            .object_exists(&video.raw_object_key)
            .await
            .map_err(storage_to_app_error)?;
        if !exists {
            return Err(AppError::UploadMissing(video.raw_object_key));
        }

        let updated = match self
            .videos
            .compare_and_set_status(
                video_id,
                &[video.status],
                VideoStatus::Processing,
                &StatusFields::processing(),
            )
            .await?
        {
            Some(updated) => updated,
            None => {
                tracing::info!("Lost completion race, returning current record");
                return self
                    .videos
                    .get(video_id)
                    .await?
                    .ok_or(AppError::VideoNotFound(video_id));
            }
        };

        tracing::info!(
            event = "video_status_change",
            video_id = %video_id,
            status = %updated.status,
            "video_status_change"
        );

        self.dispatcher.dispatch(TranscodeJob { video_id }).await?;

        Ok(updated)
    }
}
