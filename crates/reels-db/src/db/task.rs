use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use reels_core::models::{Task, TaskType};

/// Postgres channel workers LISTEN on for new tasks.
pub const NEW_TASK_CHANNEL: &str = "reels_new_task";

/// A task about to be enqueued.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub task_type: TaskType,
    pub queue: String,
    pub payload: serde_json::Value,
    pub max_retries: i32,
    pub timeout_seconds: Option<i32>,
}

/// Durable job queue backing the transcode pipeline.
///
/// Tasks survive restarts: a claimed task that is never completed is handed
/// back by [`TaskStore::reap_stale_running_tasks`].
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_task(&self, task: NewTask) -> Result<Task>;

    /// Claim the oldest runnable task on `queue`, marking it running.
    async fn claim_next_task(&self, queue: &str) -> Result<Option<Task>>;

    async fn mark_completed(&self, task_id: Uuid, result: serde_json::Value) -> Result<Task>;

    async fn mark_failed(&self, task_id: Uuid, error: serde_json::Value) -> Result<Task>;

    /// Put the task back to pending, bump its retry count and delay it.
    async fn schedule_retry(
        &self,
        task_id: Uuid,
        backoff_seconds: u64,
        error: serde_json::Value,
    ) -> Result<Task>;

    /// Return running tasks that outlived their timeout plus `grace_period_secs`
    /// to pending (or failed once retries are exhausted). Returns how many
    /// rows were touched.
    async fn reap_stale_running_tasks(&self, grace_period_secs: i64) -> Result<u64>;

    /// Videos stuck in `processing` for longer than `stale_after_secs` with
    /// no live transcode task.
    async fn find_orphaned_transcodes(&self, stale_after_secs: i64, limit: i64)
        -> Result<Vec<Uuid>>;
}

const TASK_COLUMNS: &str = r#"
    id, task_type, queue, status, payload, result, scheduled_at, started_at,
    completed_at, retry_count, max_retries, timeout_seconds, created_at, updated_at
"#;

#[derive(Clone)]
pub struct TaskRepository {
    pool: PgPool,
}

impl TaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for TaskRepository {
    #[tracing::instrument(skip(self, task), fields(task_type = %task.task_type, queue = %task.queue))]
    async fn create_task(&self, task: NewTask) -> Result<Task> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction for task creation")?;

        let sql = format!(
            r#"
            INSERT INTO tasks (task_type, queue, status, payload, scheduled_at, max_retries, timeout_seconds)
            VALUES ($1, $2, 'pending', $3, NOW(), $4, $5)
            RETURNING {}
            "#,
            TASK_COLUMNS
        );

        let created: Task = sqlx::query_as::<Postgres, Task>(&sql)
            .bind(task.task_type.to_string())
            .bind(&task.queue)
            .bind(&task.payload)
            .bind(task.max_retries)
            .bind(task.timeout_seconds)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to insert task into database");
                anyhow::anyhow!("Failed to insert task into database: {}", e)
            })?;

        // Workers fall back to polling if the notification is lost.
        if let Err(e) = sqlx::query("SELECT pg_notify($1, '')")
            .bind(NEW_TASK_CHANNEL)
            .execute(&mut *tx)
            .await
        {
            tracing::warn!(
                error = %e,
                task_id = %created.id,
                "Failed to send pg_notify for new task, workers will discover task via polling"
            );
        }

        tx.commit()
            .await
            .context("Failed to commit transaction for task creation")?;

        tracing::info!(
            task_id = %created.id,
            task_type = %created.task_type,
            queue = %created.queue,
            "Task created"
        );

        Ok(created)
    }

    #[tracing::instrument(skip(self))]
    async fn claim_next_task(&self, queue: &str) -> Result<Option<Task>> {
        let sql = format!(
            r#"
            UPDATE tasks
            SET status = 'running',
                started_at = NOW(),
                updated_at = NOW()
            WHERE id = (
                SELECT id FROM tasks
                WHERE queue = $1
                    AND status = 'pending'
                    AND scheduled_at <= NOW()
                ORDER BY scheduled_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {}
            "#,
            TASK_COLUMNS
        );

        let task: Option<Task> = sqlx::query_as::<Postgres, Task>(&sql)
            .bind(queue)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to claim next task")?;

        if let Some(ref task) = task {
            tracing::debug!(
                task_id = %task.id,
                task_type = %task.task_type,
                retry_count = task.retry_count,
                "Task claimed"
            );
        }

        Ok(task)
    }

    #[tracing::instrument(skip(self, result))]
    async fn mark_completed(&self, task_id: Uuid, result: serde_json::Value) -> Result<Task> {
        let sql = format!(
            r#"
            UPDATE tasks
            SET status = 'completed',
                result = $2,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            TASK_COLUMNS
        );

        let task: Task = sqlx::query_as::<Postgres, Task>(&sql)
            .bind(task_id)
            .bind(result)
            .fetch_one(&self.pool)
            .await
            .context("Failed to mark task as completed")?;

        tracing::info!(task_id = %task_id, task_type = %task.task_type, "Task completed");

        Ok(task)
    }

    #[tracing::instrument(skip(self, error))]
    async fn mark_failed(&self, task_id: Uuid, error: serde_json::Value) -> Result<Task> {
        let sql = format!(
            r#"
            UPDATE tasks
            SET status = 'failed',
                result = $2,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            TASK_COLUMNS
        );

        let task: Task = sqlx::query_as::<Postgres, Task>(&sql)
            .bind(task_id)
            .bind(error)
            .fetch_one(&self.pool)
            .await
            .context("Failed to mark task as failed")?;

        tracing::error!(
            task_id = %task_id,
            task_type = %task.task_type,
            retry_count = task.retry_count,
            "Task failed"
        );

        Ok(task)
    }

    #[tracing::instrument(skip(self, error))]
    async fn schedule_retry(
        &self,
        task_id: Uuid,
        backoff_seconds: u64,
        error: serde_json::Value,
    ) -> Result<Task> {
        let sql = format!(
            r#"
            UPDATE tasks
            SET status = 'pending',
                retry_count = retry_count + 1,
                result = $3,
                started_at = NULL,
                scheduled_at = NOW() + ($2 * interval '1 second'),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            TASK_COLUMNS
        );

        let task: Task = sqlx::query_as::<Postgres, Task>(&sql)
            .bind(task_id)
            .bind(backoff_seconds as f64)
            .bind(error)
            .fetch_one(&self.pool)
            .await
            .context("Failed to schedule task retry")?;

        tracing::info!(
            task_id = %task_id,
            retry_count = task.retry_count,
            max_retries = task.max_retries,
            backoff_seconds = backoff_seconds,
            "Task retry scheduled"
        );

        Ok(task)
    }

    #[tracing::instrument(skip(self))]
    async fn reap_stale_running_tasks(&self, grace_period_secs: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = CASE
                    WHEN retry_count < max_retries THEN 'pending'::task_status
                    ELSE 'failed'::task_status
                END,
                retry_count = retry_count + 1,
                started_at = NULL,
                scheduled_at = NOW(),
                completed_at = CASE
                    WHEN retry_count < max_retries THEN NULL
                    ELSE NOW()
                END,
                result = jsonb_build_object('error', 'Task exceeded its timeout and was reaped'),
                updated_at = NOW()
            WHERE status = 'running'
                AND timeout_seconds IS NOT NULL
                AND started_at < NOW() - ((timeout_seconds + $1) * interval '1 second')
            "#,
        )
        .bind(grace_period_secs as f64)
        .execute(&self.pool)
        .await
        .context("Failed to reap stale running tasks")?;

        let reaped = result.rows_affected();
        if reaped > 0 {
            tracing::warn!(reaped = reaped, "Reaped stale running tasks");
        }

        Ok(reaped)
    }

    #[tracing::instrument(skip(self))]
    async fn find_orphaned_transcodes(
        &self,
        stale_after_secs: i64,
        limit: i64,
    ) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar::<Postgres, Uuid>(
            r#"
            SELECT v.id
            FROM videos v
            WHERE v.status = 'processing'
                AND v.updated_at < NOW() - ($1 * interval '1 second')
                AND NOT EXISTS (
                    SELECT 1 FROM tasks t
                    WHERE t.task_type = $2
                        AND t.status IN ('pending', 'running')
                        AND t.payload->>'video_id' = v.id::text
                )
            ORDER BY v.updated_at ASC
            LIMIT $3
            "#,
        )
        .bind(stale_after_secs as f64)
        .bind(TaskType::TranscodeVideo.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to look up orphaned transcodes")?;

        Ok(ids)
    }
}
