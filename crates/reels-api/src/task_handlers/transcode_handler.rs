use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use reels_core::models::{Task, TaskType, TranscodeJob};
use reels_core::{TaskError, TaskResultExt};
use reels_processing::TranscodeWorker;
use reels_worker::TaskHandlerContext;

/// Routes claimed tasks to the transcode worker.
pub struct TranscodeTaskHandler {
    worker: TranscodeWorker,
}

impl TranscodeTaskHandler {
    pub fn new(worker: TranscodeWorker) -> Self {
        Self { worker }
    }

    async fn transcode(&self, task: &Task) -> Result<serde_json::Value, TaskError> {
        let job: TranscodeJob = task.try_payload_as().unrecoverable()?;

        tracing::Span::current().record("video_id", tracing::field::display(job.video_id));
        tracing::info!(video_id = %job.video_id, "Processing transcode task");

        let outcome = self.worker.process(job.video_id).await?;
        serde_json::to_value(&outcome).unrecoverable()
    }
}

#[async_trait]
impl TaskHandlerContext for TranscodeTaskHandler {
    #[tracing::instrument(
        skip(self, task),
        fields(task_id = %task.id, video_id = tracing::field::Empty)
    )]
    async fn dispatch_task(self: Arc<Self>, task: &Task) -> Result<serde_json::Value> {
        match task.task_type {
            TaskType::TranscodeVideo => Ok(self.transcode(task).await?),
        }
    }
}
