//! Hands freshly completed uploads to the transcode pipeline.

use async_trait::async_trait;
use reels_core::models::TranscodeJob;
use reels_core::AppError;
use reels_worker::TaskQueue;
use uuid::Uuid;

/// Enqueues transcode work. Returns the id of the queued job.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn dispatch(&self, job: TranscodeJob) -> Result<Uuid, AppError>;
}

/// Dispatcher backed by the durable `tasks` table.
#[derive(Clone)]
pub struct TaskQueueDispatcher {
    queue: TaskQueue,
}

impl TaskQueueDispatcher {
    pub fn new(queue: TaskQueue) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl JobDispatcher for TaskQueueDispatcher {
    #[tracing::instrument(skip(self), fields(video_id = %job.video_id))]
    async fn dispatch(&self, job: TranscodeJob) -> Result<Uuid, AppError> {
        let task_id = self
            .queue
            .submit(&job)
            .await
            .map_err(|e| AppError::Queue(format!("{:#}", e)))?;

        tracing::info!(
            video_id = %job.video_id,
            task_id = %task_id,
            "Transcode job dispatched"
        );
        Ok(task_id)
    }
}
