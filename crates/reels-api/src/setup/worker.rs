//! Transcode worker pool wiring

use crate::task_handlers::TranscodeTaskHandler;
use reels_core::Config;
use reels_db::{TaskRepository, VideoRepository};
use reels_processing::{FfmpegTool, TranscodeWorker};
use reels_storage::Storage;
use reels_worker::{TaskHandlerContext, TaskQueue, TaskQueueConfig};
use sqlx::PgPool;
use std::sync::{Arc, Weak};

/// Spawn the worker pool in this process. Returns the queue handle used for
/// submission and the handler the pool dispatches to.
pub fn start_worker_pool(
    config: &Config,
    pool: PgPool,
    videos: Arc<dyn VideoRepository>,
    storage: Arc<dyn Storage>,
) -> (TaskQueue, Arc<TranscodeTaskHandler>) {
    let tool = Arc::new(FfmpegTool::new(config.transcode()));
    let deadline = config.task_queue().job_deadline();
    let worker = TranscodeWorker::new(videos, storage, tool).with_deadline(deadline);
    let handler = Arc::new(TranscodeTaskHandler::new(worker));

    let handler_dyn: Arc<dyn TaskHandlerContext> = handler.clone();
    let context: Weak<dyn TaskHandlerContext> = Arc::downgrade(&handler_dyn);

    let queue_config = TaskQueueConfig::from(config.task_queue());
    tracing::info!(
        queue = %queue_config.queue_name,
        max_workers = queue_config.max_workers,
        max_retries = queue_config.max_retries,
        job_deadline_secs = deadline.as_secs(),
        ffmpeg_path = %config.transcode().ffmpeg_path,
        "Starting transcode worker pool"
    );

    let task_queue = TaskQueue::new(
        Arc::new(TaskRepository::new(pool.clone())),
        queue_config,
        context,
        Some(pool),
    );

    (task_queue, handler)
}
