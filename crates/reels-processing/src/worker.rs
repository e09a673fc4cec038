//! Transcode worker: raw upload in, 720p rendition + cover out.

use anyhow::{anyhow, Context};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

use reels_core::models::{
    cover_object_key, rendition_object_key, StatusFields, Video, VideoStatus, COVER_CONTENT_TYPE,
    RENDITION_CONTENT_TYPE,
};
use reels_core::TaskError;
use reels_db::VideoRepository;
use reels_storage::{Storage, StorageError};

use crate::transcoder::TranscodeTool;

/// Why a job was dropped without doing any work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Discarded {
    /// The record no longer exists.
    Missing,
    /// Another run already finished it.
    AlreadyReady,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TranscodeOutcome {
    Ready {
        video_id: Uuid,
        processed_object_key: String,
        cover_object_key: String,
        duration_sec: Option<i32>,
    },
    Discarded {
        video_id: Uuid,
        reason: Discarded,
    },
}

fn log_status_change(video_id: Uuid, status: VideoStatus) {
    tracing::info!(
        event = "video_status_change",
        video_id = %video_id,
        status = %status,
        "video_status_change"
    );
}

pub struct TranscodeWorker {
    videos: Arc<dyn VideoRepository>,
    storage: Arc<dyn Storage>,
    tool: Arc<dyn TranscodeTool>,
    deadline: Option<Duration>,
}

impl TranscodeWorker {
    pub fn new(
        videos: Arc<dyn VideoRepository>,
        storage: Arc<dyn Storage>,
        tool: Arc<dyn TranscodeTool>,
    ) -> Self {
        Self {
            videos,
            storage,
            tool,
            deadline: None,
        }
    }

    /// Bound the download/encode/upload phase. A job that runs past the
    /// deadline is recorded as `failed` and returned as a recoverable error,
    /// so it must be shorter than the queue's task timeout.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Run one transcode job to completion.
    ///
    /// Safe to call more than once for the same video: a finished video is
    /// discarded and a failed or interrupted one is redone from the raw object.
    /// On error the record has already been moved to `failed`.
    #[tracing::instrument(skip(self))]
    pub async fn process(&self, video_id: Uuid) -> Result<TranscodeOutcome, TaskError> {
        let video = match self.load(video_id).await? {
            Some(video) => video,
            None => return Ok(Self::discarded(video_id, Discarded::Missing)),
        };
        if video.status == VideoStatus::Ready {
            tracing::info!(video_id = %video_id, "Video already ready, discarding job");
            return Ok(Self::discarded(video_id, Discarded::AlreadyReady));
        }

        let claimed = self
            .videos
            .compare_and_set_status(
                video_id,
                &[
                    VideoStatus::Pending,
                    VideoStatus::Failed,
                    VideoStatus::Processing,
                ],
                VideoStatus::Processing,
                &StatusFields::processing(),
            )
            .await
            .map_err(|e| TaskError::recoverable(anyhow!(e)))?;
        let video = match claimed {
            Some(video) => video,
            // Only a concurrent finish or a delete can beat this CAS.
            None => return self.settle_lost_race(video_id).await,
        };
        log_status_change(video_id, VideoStatus::Processing);

        match self.transcode_within_deadline(&video).await {
            Ok(fields) => self.finish(video_id, fields).await,
            Err(e) => {
                self.record_failure(video_id, &e).await;
                Err(e)
            }
        }
    }

    async fn load(&self, video_id: Uuid) -> Result<Option<Video>, TaskError> {
        let video = self
            .videos
            .get(video_id)
            .await
            .map_err(|e| TaskError::recoverable(anyhow!(e).context("Failed to load video")))?;
        if video.is_none() {
            tracing::warn!(video_id = %video_id, "Video not found, discarding job");
        }
        Ok(video)
    }

    async fn settle_lost_race(&self, video_id: Uuid) -> Result<TranscodeOutcome, TaskError> {
        match self.load(video_id).await? {
            None => Ok(Self::discarded(video_id, Discarded::Missing)),
            Some(video) if video.status == VideoStatus::Ready => {
                Ok(Self::discarded(video_id, Discarded::AlreadyReady))
            }
            Some(video) => Err(TaskError::recoverable(anyhow!(
                "Video {} changed to {} while claiming it",
                video_id,
                video.status
            ))),
        }
    }

    async fn transcode_within_deadline(&self, video: &Video) -> Result<StatusFields, TaskError> {
        let Some(deadline) = self.deadline else {
            return self.transcode(video).await;
        };
        // Dropping the inner future kills any running ffmpeg and removes the
        // scratch directory.
        match tokio::time::timeout(deadline, self.transcode(video)).await {
            Ok(result) => result,
            Err(_) => Err(TaskError::recoverable(anyhow!(
                "Transcode exceeded its {}s deadline",
                deadline.as_secs()
            ))),
        }
    }

    fn discarded(video_id: Uuid, reason: Discarded) -> TranscodeOutcome {
        TranscodeOutcome::Discarded { video_id, reason }
    }

    /// Download, encode, upload. The scratch directory is removed when this
    /// returns, whichever way it returns.
    async fn transcode(&self, video: &Video) -> Result<StatusFields, TaskError> {
        let workdir = TempDir::new()
            .context("Failed to create scratch directory")
            .map_err(TaskError::recoverable)?;
        let input = workdir.path().join(format!("input{}", video.raw_extension()));
        let rendition = workdir.path().join("video_720p.mp4");
        let cover = workdir.path().join("cover.jpg");

        self.storage
            .download(&video.raw_object_key, &input)
            .await
            .map_err(|e| match e {
                StorageError::NotFound(key) => {
                    TaskError::unrecoverable(anyhow!("Uploaded object {} is missing", key))
                }
                other => TaskError::recoverable(
                    anyhow!(other).context("Failed to download uploaded video"),
                ),
            })?;

        self.tool
            .render_720p(&input, &rendition)
            .await
            .context("Failed to render 720p rendition")
            .map_err(TaskError::recoverable)?;
        self.tool
            .extract_cover(&input, &cover)
            .await
            .context("Failed to extract cover frame")
            .map_err(TaskError::recoverable)?;
        let duration_sec = self.tool.read_duration(&input).await;

        let processed_key = rendition_object_key(video.id);
        let cover_key = cover_object_key(video.id);
        self.put(&rendition, &processed_key, RENDITION_CONTENT_TYPE)
            .await?;
        self.put(&cover, &cover_key, COVER_CONTENT_TYPE).await?;

        Ok(StatusFields::ready(processed_key, cover_key, duration_sec))
    }

    async fn put(&self, path: &Path, key: &str, content_type: &str) -> Result<(), TaskError> {
        self.storage
            .upload(path, key, content_type)
            .await
            .with_context(|| format!("Failed to upload {}", key))
            .map_err(TaskError::recoverable)
    }

    async fn finish(
        &self,
        video_id: Uuid,
        fields: StatusFields,
    ) -> Result<TranscodeOutcome, TaskError> {
        let updated = self
            .videos
            .compare_and_set_status(
                video_id,
                &[VideoStatus::Processing],
                VideoStatus::Ready,
                &fields,
            )
            .await
            .map_err(|e| TaskError::recoverable(anyhow!(e)))?;

        let Some(video) = updated else {
            return self.settle_lost_race(video_id).await;
        };
        log_status_change(video_id, VideoStatus::Ready);

        Ok(TranscodeOutcome::Ready {
            video_id,
            processed_object_key: video.processed_object_key.unwrap_or_default(),
            cover_object_key: video.cover_object_key.unwrap_or_default(),
            duration_sec: video.duration_sec,
        })
    }

    async fn record_failure(&self, video_id: Uuid, error: &TaskError) {
        let message = error.to_string();
        match self
            .videos
            .compare_and_set_status(
                video_id,
                &[VideoStatus::Processing],
                VideoStatus::Failed,
                &StatusFields::failed(message.clone()),
            )
            .await
        {
            Ok(Some(_)) => {
                log_status_change(video_id, VideoStatus::Failed);
                tracing::error!(
                    video_id = %video_id,
                    error = %message,
                    recoverable = error.is_recoverable(),
                    "Transcode failed"
                );
            }
            Ok(None) => {
                tracing::warn!(video_id = %video_id, "Video left processing before failure could be recorded");
            }
            Err(e) => {
                tracing::error!(video_id = %video_id, error = %e, "Failed to record transcode failure");
            }
        }
    }
}
