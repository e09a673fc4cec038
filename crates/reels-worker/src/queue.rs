//! Task queue: worker pool, LISTEN/NOTIFY or polling, retry, and submission.
//!
//! Shutdown: [`TaskQueue::shutdown`] signals the pool to stop claiming; it does
//! not wait for in-flight tasks. A task interrupted by process exit stays
//! `running` until the stale reaper hands it back.

use anyhow::{Context, Result};
use serde_json::json;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::sleep;
use uuid::Uuid;

use reels_core::models::{Task, TaskPayload, TaskStatus, TranscodeJob};
use reels_core::{TaskError, TaskQueueSettings};
use reels_db::{NewTask, TaskStore, NEW_TASK_CHANNEL};

use crate::context::TaskHandlerContext;

/// Maximum delay in seconds before retrying a failed task. Caps exponential backoff
/// so that high retry counts do not produce excessively long delays.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

const STALE_TASK_GRACE_PERIOD_SECS: i64 = 300;
const ORPHAN_SWEEP_BATCH: i64 = 100;

/// Computes backoff in seconds for a given retry count (exponential with cap).
#[inline]
pub(crate) fn compute_retry_backoff_seconds(retry_count: i32) -> u64 {
    2_u64
        .checked_pow(retry_count.max(0) as u32)
        .unwrap_or(u64::MAX)
        .min(MAX_RETRY_BACKOFF_SECS)
}

fn is_unrecoverable(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<TaskError>()
        .map(|te| !te.is_recoverable())
        .unwrap_or(false)
}

#[derive(Clone, Debug)]
pub struct TaskQueueConfig {
    pub queue_name: String,
    pub max_workers: usize,
    pub poll_interval_ms: u64,
    pub default_timeout_seconds: i32,
    pub max_retries: i32,
    /// Interval in seconds between runs of the stale task reaper. Zero disables it.
    pub stale_task_reap_interval_secs: u64,
    /// Grace period in seconds added to task timeout before reaping stale running tasks.
    pub stale_task_grace_period_secs: i64,
    /// A `processing` video untouched for this long with no live task is re-enqueued.
    pub stale_processing_after_secs: i64,
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        TaskQueueConfig::from(&TaskQueueSettings::default())
    }
}

impl From<&TaskQueueSettings> for TaskQueueConfig {
    fn from(settings: &TaskQueueSettings) -> Self {
        Self {
            queue_name: settings.queue_name.clone(),
            max_workers: settings.max_workers,
            poll_interval_ms: settings.poll_interval_ms,
            default_timeout_seconds: settings.default_timeout_seconds,
            max_retries: settings.max_retries,
            stale_task_reap_interval_secs: settings.stale_task_reap_interval_secs,
            stale_task_grace_period_secs: STALE_TASK_GRACE_PERIOD_SECS,
            stale_processing_after_secs: settings.stale_processing_after_secs,
        }
    }
}

#[derive(Clone)]
pub struct TaskQueue {
    store: Arc<dyn TaskStore>,
    config: TaskQueueConfig,
    shutdown_tx: mpsc::Sender<()>,
}

impl TaskQueue {
    /// Create a queue and spawn its worker pool.
    ///
    /// If `pool` is `Some`, the worker uses PostgreSQL LISTEN/NOTIFY to wake immediately
    /// when tasks are created, in addition to polling at `poll_interval_ms`.
    /// If `pool` is `None`, only polling is used.
    pub fn new(
        store: Arc<dyn TaskStore>,
        config: TaskQueueConfig,
        context: Weak<dyn TaskHandlerContext>,
        pool: Option<sqlx::PgPool>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let store_clone = store.clone();
        let config_clone = config.clone();

        tokio::spawn(async move {
            Self::worker_pool(store_clone, config_clone, context, shutdown_rx, pool).await;
        });

        Self {
            store,
            config,
            shutdown_tx,
        }
    }

    /// Creates a TaskQueue that does not spawn a worker.
    ///
    /// Tasks submitted here are written to the store and picked up by whichever
    /// process runs the pool (or by [`TaskQueue::run_next`] in tests).
    pub fn new_no_worker(store: Arc<dyn TaskStore>, config: TaskQueueConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        drop(shutdown_rx);
        Self {
            store,
            config,
            shutdown_tx,
        }
    }

    /// Submit a typed job to the queue.
    #[tracing::instrument(skip(self, payload))]
    pub async fn submit<P: TaskPayload>(&self, payload: &P) -> Result<Uuid> {
        Self::enqueue(self.store.as_ref(), &self.config, payload).await
    }

    async fn enqueue<P: TaskPayload>(
        store: &dyn TaskStore,
        config: &TaskQueueConfig,
        payload: &P,
    ) -> Result<Uuid> {
        let task_type = P::task_type();
        let payload = serde_json::to_value(payload).context("Failed to serialize task payload")?;

        let task = store
            .create_task(NewTask {
                task_type,
                queue: config.queue_name.clone(),
                payload,
                max_retries: config.max_retries,
                timeout_seconds: Some(config.default_timeout_seconds),
            })
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    task_type = %task_type,
                    "Failed to create task in repository"
                );
                anyhow::anyhow!("Failed to create task in repository: {}", e)
            })?;

        tracing::info!(
            task_id = %task.id,
            task_type = %task_type,
            queue = %task.queue,
            "Task submitted to queue"
        );

        Ok(task.id)
    }

    /// Claim one runnable task and process it on the current task.
    ///
    /// Returns the id of the task that ran, or `None` when the queue was empty.
    pub async fn run_next(&self, context: &Weak<dyn TaskHandlerContext>) -> Result<Option<Uuid>> {
        let Some(task) = self.store.claim_next_task(&self.config.queue_name).await? else {
            return Ok(None);
        };
        let task_id = task.id;
        Self::process_task_with_retry(
            task,
            self.store.clone(),
            context.clone(),
            self.config.default_timeout_seconds,
        )
        .await?;
        Ok(Some(task_id))
    }

    async fn worker_pool(
        store: Arc<dyn TaskStore>,
        config: TaskQueueConfig,
        context: Weak<dyn TaskHandlerContext>,
        mut shutdown_rx: mpsc::Receiver<()>,
        pool: Option<sqlx::PgPool>,
    ) {
        let use_listen = pool.is_some();
        tracing::info!(
            queue = %config.queue_name,
            max_workers = config.max_workers,
            poll_interval_ms = config.poll_interval_ms,
            listen_notify = use_listen,
            "Task queue worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_workers));
        let poll_interval = Duration::from_millis(config.poll_interval_ms);

        // Channel to wake the main loop when LISTEN receives a NOTIFY.
        let (notify_tx, mut notify_rx) = mpsc::channel::<()>(16);
        if let Some(pool) = pool {
            let tx = notify_tx.clone();
            tokio::spawn(async move {
                loop {
                    match sqlx::postgres::PgListener::connect_with(&pool).await {
                        Ok(mut listener) => {
                            if let Err(e) = listener.listen(NEW_TASK_CHANNEL).await {
                                tracing::warn!(error = %e, "LISTEN failed, will retry");
                                sleep(Duration::from_secs(5)).await;
                                continue;
                            }
                            while listener.recv().await.is_ok() {
                                let _ = tx.send(()).await;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "PgListener connect failed, will retry");
                            sleep(Duration::from_secs(5)).await;
                        }
                    }
                }
            });
        }

        let (reaper_shutdown_tx, mut reaper_shutdown_rx) = mpsc::channel::<()>(1);
        if config.stale_task_reap_interval_secs > 0 {
            let store_for_reaper = store.clone();
            let reaper_config = config.clone();
            let reap_interval = Duration::from_secs(config.stale_task_reap_interval_secs);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(reap_interval);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            if let Err(e) = store_for_reaper
                                .reap_stale_running_tasks(reaper_config.stale_task_grace_period_secs)
                                .await
                            {
                                tracing::error!(error = %e, "Stale task reaper failed");
                            }
                            if let Err(e) = Self::reap_stale_processing(store_for_reaper.as_ref(), &reaper_config).await {
                                tracing::error!(error = %e, "Stale processing sweep failed");
                            }
                        }
                        _ = reaper_shutdown_rx.recv() => break,
                    }
                }
            });
        }

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Task queue worker pool shutting down");
                    let _ = reaper_shutdown_tx.send(()).await;
                    break;
                }
                _ = notify_rx.recv() => {
                    Self::claim_and_dispatch_one(&store, &config, &semaphore, &context).await;
                }
                _ = sleep(poll_interval) => {
                    Self::claim_and_dispatch_one(&store, &config, &semaphore, &context).await;
                }
            }
        }

        tracing::info!("Task queue worker pool stopped");
    }

    async fn claim_and_dispatch_one(
        store: &Arc<dyn TaskStore>,
        config: &TaskQueueConfig,
        semaphore: &Arc<Semaphore>,
        context: &Weak<dyn TaskHandlerContext>,
    ) {
        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::debug!("No workers available, skipping claim");
                return;
            }
        };

        match store.claim_next_task(&config.queue_name).await {
            Ok(Some(task)) => {
                let store = store.clone();
                let ctx = context.clone();
                let default_timeout = config.default_timeout_seconds;
                tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(e) =
                        Self::process_task_with_retry(task, store, ctx, default_timeout).await
                    {
                        tracing::error!(error = %e, "Failed to record task outcome");
                    }
                });
            }
            Ok(None) => {
                drop(permit);
                tracing::trace!("No tasks available in queue");
            }
            Err(e) => {
                drop(permit);
                tracing::error!(error = %e, "Failed to claim task from queue");
            }
        }
    }

    /// Run a claimed task and record the outcome.
    ///
    /// Returns the status the task was left in. Handler failures are recorded,
    /// not returned; only failures to talk to the store are errors.
    #[tracing::instrument(skip(task, store, context), fields(task.id = %task.id, task.type = %task.task_type))]
    async fn process_task_with_retry(
        task: Task,
        store: Arc<dyn TaskStore>,
        context: Weak<dyn TaskHandlerContext>,
        default_timeout_seconds: i32,
    ) -> Result<TaskStatus> {
        let ctx = context.upgrade().ok_or_else(|| {
            anyhow::anyhow!("TaskHandlerContext was dropped, cannot process task")
        })?;

        let timeout_duration = Duration::from_secs(
            task.timeout_seconds.unwrap_or(default_timeout_seconds).max(1) as u64,
        );

        let result = tokio::time::timeout(timeout_duration, ctx.dispatch_task(&task)).await;

        let error = match result {
            Ok(Ok(task_result)) => {
                store
                    .mark_completed(task.id, task_result)
                    .await
                    .context("Failed to mark task as completed")?;
                tracing::info!(task_id = %task.id, task_type = %task.task_type, "Task completed successfully");
                return Ok(TaskStatus::Completed);
            }
            Ok(Err(e)) => e,
            Err(_) => {
                tracing::error!(
                    task_id = %task.id,
                    timeout_seconds = timeout_duration.as_secs(),
                    "Task execution timed out"
                );
                anyhow::anyhow!("Task execution timed out after {}s", timeout_duration.as_secs())
            }
        };

        let unrecoverable = is_unrecoverable(&error);
        tracing::error!(
            task_id = %task.id,
            error = %format!("{:#}", error),
            retry_count = task.retry_count,
            max_retries = task.max_retries,
            unrecoverable = unrecoverable,
            "Task execution failed"
        );

        if unrecoverable {
            let error_result = json!({
                "error": format!("{:#}", error),
                "retry_count": task.retry_count,
                "unrecoverable": true,
            });
            store
                .mark_failed(task.id, error_result)
                .await
                .context("Failed to mark task as failed")?;
            tracing::error!(task_id = %task.id, "Task failed with unrecoverable error, will not retry");
            return Ok(TaskStatus::Failed);
        }

        if task.can_retry() {
            let backoff_seconds = compute_retry_backoff_seconds(task.retry_count);
            let error_result = json!({
                "error": format!("{:#}", error),
                "retry_count": task.retry_count,
            });
            store
                .schedule_retry(task.id, backoff_seconds, error_result)
                .await
                .context("Failed to schedule task retry")?;
            return Ok(TaskStatus::Pending);
        }

        let error_result = json!({
            "error": format!("{:#}", error),
            "retry_count": task.retry_count,
            "reason": "Task failed after maximum retries",
        });
        store
            .mark_failed(task.id, error_result)
            .await
            .context("Failed to mark task as failed")?;
        tracing::error!(task_id = %task.id, "Task failed after max retries");
        Ok(TaskStatus::Failed)
    }

    /// Re-enqueue a transcode for every video stuck in `processing` with no
    /// pending or running task behind it.
    pub async fn reap_stale_processing(
        store: &dyn TaskStore,
        config: &TaskQueueConfig,
    ) -> Result<usize> {
        let orphans = store
            .find_orphaned_transcodes(config.stale_processing_after_secs, ORPHAN_SWEEP_BATCH)
            .await?;

        for video_id in &orphans {
            let task_id = Self::enqueue(store, config, &TranscodeJob { video_id: *video_id }).await?;
            tracing::warn!(
                video_id = %video_id,
                task_id = %task_id,
                "Re-enqueued transcode for video stuck in processing"
            );
        }

        Ok(orphans.len())
    }

    /// Signals the worker pool to stop claiming new tasks and exit the main loop.
    ///
    /// Returns immediately; already-spawned task handlers keep running until
    /// they complete or time out.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating task queue shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reels_core::models::{Video, VideoStatus};
    use reels_db::{InMemoryTaskStore, InMemoryVideoRepository};
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behaviour {
        Succeed,
        FailRecoverable,
        FailUnrecoverable,
        Hang,
    }

    struct ScriptedContext {
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl ScriptedContext {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TaskHandlerContext for ScriptedContext {
        async fn dispatch_task(self: Arc<Self>, task: &Task) -> Result<serde_json::Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let job: TranscodeJob = task.try_payload_as()?;
            match self.behaviour {
                Behaviour::Succeed => Ok(json!({ "video_id": job.video_id })),
                Behaviour::FailRecoverable => Err(TaskError::recoverable(anyhow::anyhow!("network")).into()),
                Behaviour::FailUnrecoverable => {
                    Err(TaskError::unrecoverable(anyhow::anyhow!("source missing")).into())
                }
                Behaviour::Hang => {
                    sleep(Duration::from_secs(60)).await;
                    Ok(json!({}))
                }
            }
        }
    }

    fn queue_with(store: &InMemoryTaskStore, max_retries: i32) -> TaskQueue {
        let config = TaskQueueConfig {
            max_retries,
            ..TaskQueueConfig::default()
        };
        TaskQueue::new_no_worker(Arc::new(store.clone()), config)
    }

    fn weak(ctx: &Arc<ScriptedContext>) -> Weak<dyn TaskHandlerContext> {
        let ctx: Arc<dyn TaskHandlerContext> = ctx.clone();
        Arc::downgrade(&ctx)
    }

    #[test]
    fn retry_backoff_exponential_then_capped() {
        assert_eq!(compute_retry_backoff_seconds(0), 1);
        assert_eq!(compute_retry_backoff_seconds(1), 2);
        assert_eq!(compute_retry_backoff_seconds(2), 4);
        assert_eq!(compute_retry_backoff_seconds(8), 256);
        assert_eq!(compute_retry_backoff_seconds(9), MAX_RETRY_BACKOFF_SECS);
        assert_eq!(compute_retry_backoff_seconds(80), MAX_RETRY_BACKOFF_SECS);
    }

    #[test]
    fn unrecoverable_task_error_detected() {
        let err: anyhow::Error = TaskError::unrecoverable(anyhow::anyhow!("bad config")).into();
        assert!(is_unrecoverable(&err));
    }

    #[test]
    fn recoverable_and_plain_errors_are_retried() {
        let err: anyhow::Error = TaskError::recoverable(anyhow::anyhow!("network")).into();
        assert!(!is_unrecoverable(&err));
        assert!(!is_unrecoverable(&anyhow::anyhow!("generic error")));
    }

    #[tokio::test]
    async fn submit_writes_typed_payload() {
        let store = InMemoryTaskStore::new();
        let queue = queue_with(&store, 3);
        let video_id = Uuid::new_v4();

        let task_id = queue.submit(&TranscodeJob { video_id }).await.unwrap();

        let task = store.task(task_id).unwrap();
        assert_eq!(task.task_type.to_string(), "transcode_video");
        assert_eq!(task.queue, "default");
        assert_eq!(task.payload, json!({ "video_id": video_id }));
        assert_eq!(task.max_retries, 3);
    }

    #[tokio::test]
    async fn successful_task_is_completed() {
        let store = InMemoryTaskStore::new();
        let queue = queue_with(&store, 3);
        let ctx = ScriptedContext::new(Behaviour::Succeed);
        let task_id = queue.submit(&TranscodeJob { video_id: Uuid::new_v4() }).await.unwrap();

        assert_eq!(queue.run_next(&weak(&ctx)).await.unwrap(), Some(task_id));
        assert_eq!(store.task(task_id).unwrap().status, TaskStatus::Completed);
        assert_eq!(queue.run_next(&weak(&ctx)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn recoverable_failure_retries_until_exhausted() {
        let store = InMemoryTaskStore::new();
        let queue = queue_with(&store, 1);
        let ctx = ScriptedContext::new(Behaviour::FailRecoverable);
        let task_id = queue.submit(&TranscodeJob { video_id: Uuid::new_v4() }).await.unwrap();

        queue.run_next(&weak(&ctx)).await.unwrap();
        let task = store.task(task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry_count, 1);
        assert!(task.scheduled_at > task.created_at);

        // Backoff keeps it out of reach until due.
        assert_eq!(queue.run_next(&weak(&ctx)).await.unwrap(), None);
        store.make_due(task_id);

        queue.run_next(&weak(&ctx)).await.unwrap();
        assert_eq!(store.task(task_id).unwrap().status, TaskStatus::Failed);
        assert_eq!(ctx.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unrecoverable_failure_is_not_retried() {
        let store = InMemoryTaskStore::new();
        let queue = queue_with(&store, 3);
        let ctx = ScriptedContext::new(Behaviour::FailUnrecoverable);
        let task_id = queue.submit(&TranscodeJob { video_id: Uuid::new_v4() }).await.unwrap();

        queue.run_next(&weak(&ctx)).await.unwrap();
        let task = store.task(task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.retry_count, 0);
        assert_eq!(task.result.unwrap()["unrecoverable"], json!(true));
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_task_is_retried() {
        let store = InMemoryTaskStore::new();
        let config = TaskQueueConfig {
            default_timeout_seconds: 5,
            ..TaskQueueConfig::default()
        };
        let queue = TaskQueue::new_no_worker(Arc::new(store.clone()), config);
        let ctx = ScriptedContext::new(Behaviour::Hang);
        let task_id = queue.submit(&TranscodeJob { video_id: Uuid::new_v4() }).await.unwrap();

        queue.run_next(&weak(&ctx)).await.unwrap();
        let task = store.task(task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry_count, 1);
    }

    #[tokio::test]
    async fn dropped_context_is_an_error() {
        let store = InMemoryTaskStore::new();
        let queue = queue_with(&store, 3);
        queue.submit(&TranscodeJob { video_id: Uuid::new_v4() }).await.unwrap();

        let context = weak(&ScriptedContext::new(Behaviour::Succeed));
        assert!(queue.run_next(&context).await.is_err());
    }

    #[tokio::test]
    async fn stale_processing_video_is_requeued_once() {
        let videos = InMemoryVideoRepository::new();
        let store = InMemoryTaskStore::with_videos(videos.clone());
        let config = TaskQueueConfig::default();

        let id = Uuid::new_v4();
        let mut video = Video::new_pending(id, Uuid::new_v4(), None, format!("raw/{}/{}.mp4", id, id));
        video.status = VideoStatus::Processing;
        videos.seed(video);
        videos.backdate(id, chrono::Duration::seconds(config.stale_processing_after_secs + 60));

        assert_eq!(TaskQueue::reap_stale_processing(&store, &config).await.unwrap(), 1);
        assert_eq!(TaskQueue::reap_stale_processing(&store, &config).await.unwrap(), 0);

        let tasks = store.tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].payload, json!({ "video_id": id }));
    }
}
