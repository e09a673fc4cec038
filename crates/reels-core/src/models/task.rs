use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// Kinds of work the durable queue carries. Stored as text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    TranscodeVideo,
}

impl Display for TaskType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TaskType::TranscodeVideo => write!(f, "transcode_video"),
        }
    }
}

impl FromStr for TaskType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transcode_video" => Ok(TaskType::TranscodeVideo),
            _ => Err(anyhow::anyhow!("Invalid task type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "task_status", rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid task status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub task_type: TaskType,
    pub queue: String,
    pub status: TaskStatus,
    pub payload: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub timeout_seconds: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for Task {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Task {
            id: row.try_get("id")?,
            task_type: row.try_get::<String, _>("task_type")?.parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse task_type: {}", e).into())
            })?,
            queue: row.try_get("queue")?,
            status: row.try_get("status")?,
            payload: row.try_get("payload")?,
            result: row.try_get("result")?,
            scheduled_at: row.try_get("scheduled_at")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            retry_count: row.try_get("retry_count")?,
            max_retries: row.try_get("max_retries")?,
            timeout_seconds: row.try_get("timeout_seconds")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl Task {
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }


    /// Decode the payload into the typed job it was created from.
    pub fn try_payload_as<P: TaskPayload>(&self) -> Result<P, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Typed job carried by a task row. Each payload type maps to exactly one
/// [`TaskType`], so the queue never dispatches on free-form strings.
pub trait TaskPayload: Serialize + for<'de> Deserialize<'de> {
    fn task_type() -> TaskType;
}

/// Transcode a freshly uploaded video. Carries the id and nothing else; the
/// worker reloads everything it needs from the record store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranscodeJob {
    pub video_id: Uuid,
}

impl TaskPayload for TranscodeJob {
    fn task_type() -> TaskType {
        TaskType::TranscodeVideo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task(payload: serde_json::Value) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            task_type: TaskType::TranscodeVideo,
            queue: "default".to_string(),
            status: TaskStatus::Pending,
            payload,
            result: None,
            scheduled_at: now,
            started_at: None,
            completed_at: None,
            retry_count: 0,
            max_retries: 3,
            timeout_seconds: Some(60),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_task_type_literal() {
        assert_eq!(TaskType::TranscodeVideo.to_string(), "transcode_video");
        assert_eq!(
            "transcode_video".parse::<TaskType>().unwrap(),
            TaskType::TranscodeVideo
        );
        assert!("video_transcode".parse::<TaskType>().is_err());
    }

    #[test]
    fn test_transcode_job_payload_shape() {
        let video_id = Uuid::new_v4();
        let value = serde_json::to_value(TranscodeJob { video_id }).unwrap();
        assert_eq!(value, serde_json::json!({ "video_id": video_id }));
        assert_eq!(TranscodeJob::task_type(), TaskType::TranscodeVideo);
    }

    #[test]
    fn test_try_payload_as() {
        let video_id = Uuid::new_v4();
        let task = sample_task(serde_json::json!({ "video_id": video_id }));
        let job: TranscodeJob = task.try_payload_as().unwrap();
        assert_eq!(job.video_id, video_id);

        let broken = sample_task(serde_json::json!({ "video": "nope" }));
        assert!(broken.try_payload_as::<TranscodeJob>().is_err());
    }

    #[test]
    fn test_can_retry() {
        let mut task = sample_task(serde_json::Value::Null);
        assert!(task.can_retry());
        task.retry_count = 3;
        assert!(!task.can_retry());
    }
}
