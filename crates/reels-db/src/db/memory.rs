//! In-process implementations of the record store and the task queue.
//!
//! They apply the same rules as the Postgres versions (compare-and-set on
//! status, COALESCE on derived fields, skip-locked style claiming) and are
//! what the API and worker tests run against.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use reels_core::models::{StatusFields, Task, TaskStatus, TaskType, Video, VideoStatus};
use reels_core::AppError;
use uuid::Uuid;

use super::task::{NewTask, TaskStore};
use super::video::{legal_predecessors, VideoRepository};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Default)]
pub struct InMemoryVideoRepository {
    videos: Arc<Mutex<HashMap<Uuid, Video>>>,
}

impl InMemoryVideoRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record as-is, bypassing the transition rules.
    pub fn seed(&self, video: Video) {
        lock(&self.videos).insert(video.id, video);
    }

    pub fn snapshot(&self, id: Uuid) -> Option<Video> {
        lock(&self.videos).get(&id).cloned()
    }

    pub fn all(&self) -> Vec<Video> {
        lock(&self.videos).values().cloned().collect()
    }

    /// Push `updated_at` into the past so staleness sweeps pick the record up.
    pub fn backdate(&self, id: Uuid, by: Duration) {
        if let Some(video) = lock(&self.videos).get_mut(&id) {
            video.updated_at -= by;
        }
    }

    fn processing_older_than(&self, stale_after_secs: i64) -> Vec<Video> {
        let cutoff = Utc::now() - Duration::seconds(stale_after_secs);
        let mut stuck: Vec<Video> = lock(&self.videos)
            .values()
            .filter(|v| v.status == VideoStatus::Processing && v.updated_at < cutoff)
            .cloned()
            .collect();
        stuck.sort_by_key(|v| v.updated_at);
        stuck
    }
}

#[async_trait]
impl VideoRepository for InMemoryVideoRepository {
    async fn create(&self, video: &Video) -> Result<Video, AppError> {
        if video.raw_object_key.is_empty() {
            return Err(AppError::Internal(
                "Refusing to create a video without a raw object key".to_string(),
            ));
        }
        let mut videos = lock(&self.videos);
        if videos.contains_key(&video.id) {
            return Err(AppError::Internal(format!(
                "Video {} already exists",
                video.id
            )));
        }
        videos.insert(video.id, video.clone());
        Ok(video.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Video>, AppError> {
        Ok(self.snapshot(id))
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: &[VideoStatus],
        next: VideoStatus,
        fields: &StatusFields,
    ) -> Result<Option<Video>, AppError> {
        let expected = legal_predecessors(expected, next)?;
        let mut videos = lock(&self.videos);
        let Some(current) = videos.get(&id) else {
            return Ok(None);
        };
        if !expected.contains(&current.status) {
            return Ok(None);
        }
        let updated = current.with_status(next, fields);
        videos.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn list_feed(&self, limit: i64, offset: i64) -> Result<Vec<Video>, AppError> {
        let mut ready: Vec<Video> = lock(&self.videos)
            .values()
            .filter(|v| v.status == VideoStatus::Ready)
            .cloned()
            .collect();
        ready.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(ready
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_feed(&self) -> Result<i64, AppError> {
        Ok(lock(&self.videos)
            .values()
            .filter(|v| v.status == VideoStatus::Ready)
            .count() as i64)
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryTaskStore {
    tasks: Arc<Mutex<Vec<Task>>>,
    videos: Option<InMemoryVideoRepository>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share a video repository so the orphan sweep can see stuck records.
    pub fn with_videos(videos: InMemoryVideoRepository) -> Self {
        Self {
            tasks: Arc::default(),
            videos: Some(videos),
        }
    }

    pub fn tasks(&self) -> Vec<Task> {
        lock(&self.tasks).clone()
    }

    pub fn task(&self, id: Uuid) -> Option<Task> {
        lock(&self.tasks).iter().find(|t| t.id == id).cloned()
    }

    /// Make a scheduled retry runnable right away.
    pub fn make_due(&self, id: Uuid) {
        if let Some(task) = lock(&self.tasks).iter_mut().find(|t| t.id == id) {
            task.scheduled_at = Utc::now();
        }
    }

    /// Rewind `started_at` on a running task.
    pub fn backdate_start(&self, id: Uuid, by: Duration) {
        if let Some(task) = lock(&self.tasks).iter_mut().find(|t| t.id == id) {
            task.started_at = task.started_at.map(|s| s - by);
        }
    }

    fn update<F>(&self, task_id: Uuid, apply: F) -> Result<Task>
    where
        F: FnOnce(&mut Task),
    {
        let mut tasks = lock(&self.tasks);
        let task = tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| anyhow!("Task {} not found", task_id))?;
        apply(task);
        task.updated_at = Utc::now();
        Ok(task.clone())
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create_task(&self, task: NewTask) -> Result<Task> {
        let now = Utc::now();
        let created = Task {
            id: Uuid::new_v4(),
            task_type: task.task_type,
            queue: task.queue,
            status: TaskStatus::Pending,
            payload: task.payload,
            result: None,
            scheduled_at: now,
            started_at: None,
            completed_at: None,
            retry_count: 0,
            max_retries: task.max_retries,
            timeout_seconds: task.timeout_seconds,
            created_at: now,
            updated_at: now,
        };
        lock(&self.tasks).push(created.clone());
        Ok(created)
    }

    async fn claim_next_task(&self, queue: &str) -> Result<Option<Task>> {
        let now = Utc::now();
        let mut tasks = lock(&self.tasks);
        let next = tasks
            .iter_mut()
            .filter(|t| t.queue == queue && t.status == TaskStatus::Pending && t.scheduled_at <= now)
            .min_by_key(|t| t.scheduled_at);
        Ok(next.map(|task| {
            task.status = TaskStatus::Running;
            task.started_at = Some(now);
            task.updated_at = now;
            task.clone()
        }))
    }

    async fn mark_completed(&self, task_id: Uuid, result: serde_json::Value) -> Result<Task> {
        self.update(task_id, |task| {
            task.status = TaskStatus::Completed;
            task.result = Some(result);
            task.completed_at = Some(Utc::now());
        })
    }

    async fn mark_failed(&self, task_id: Uuid, error: serde_json::Value) -> Result<Task> {
        self.update(task_id, |task| {
            task.status = TaskStatus::Failed;
            task.result = Some(error);
            task.completed_at = Some(Utc::now());
        })
    }

    async fn schedule_retry(
        &self,
        task_id: Uuid,
        backoff_seconds: u64,
        error: serde_json::Value,
    ) -> Result<Task> {
        self.update(task_id, |task| {
            task.status = TaskStatus::Pending;
            task.retry_count += 1;
            task.result = Some(error);
            task.started_at = None;
            task.scheduled_at = Utc::now() + Duration::seconds(backoff_seconds as i64);
        })
    }

    async fn reap_stale_running_tasks(&self, grace_period_secs: i64) -> Result<u64> {
        let now = Utc::now();
        let mut reaped = 0;
        for task in lock(&self.tasks).iter_mut() {
            let (Some(started_at), Some(timeout)) = (task.started_at, task.timeout_seconds) else {
                continue;
            };
            if task.status != TaskStatus::Running
                || started_at >= now - Duration::seconds(timeout as i64 + grace_period_secs)
            {
                continue;
            }
            let exhausted = !task.can_retry();
            task.status = if exhausted {
                TaskStatus::Failed
            } else {
                TaskStatus::Pending
            };
            task.retry_count += 1;
            task.started_at = None;
            task.scheduled_at = now;
            task.completed_at = exhausted.then_some(now);
            task.result = Some(serde_json::json!({
                "error": "Task exceeded its timeout and was reaped"
            }));
            task.updated_at = now;
            reaped += 1;
        }
        Ok(reaped)
    }

    async fn find_orphaned_transcodes(
        &self,
        stale_after_secs: i64,
        limit: i64,
    ) -> Result<Vec<Uuid>> {
        let Some(ref videos) = self.videos else {
            return Ok(Vec::new());
        };
        let tasks = self.tasks();
        let live = |video_id: Uuid| {
            tasks.iter().any(|t| {
                t.task_type == TaskType::TranscodeVideo
                    && matches!(t.status, TaskStatus::Pending | TaskStatus::Running)
                    && t.payload.get("video_id").and_then(|v| v.as_str())
                        == Some(video_id.to_string().as_str())
            })
        };
        Ok(videos
            .processing_older_than(stale_after_secs)
            .into_iter()
            .map(|v| v.id)
            .filter(|id| !live(*id))
            .take(limit.max(0) as usize)
            .collect())
    }
}
