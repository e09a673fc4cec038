use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Content type of the derived 720p rendition.
pub const RENDITION_CONTENT_TYPE: &str = "video/mp4";
/// Content type of the derived cover still.
pub const COVER_CONTENT_TYPE: &str = "image/jpeg";
/// Extension used when the uploaded filename carries none.
pub const DEFAULT_RAW_EXTENSION: &str = ".bin";
pub const TITLE_MAX_LEN: u64 = 255;

/// Lifecycle of a video from upload to playback.
///
/// ```text
/// pending ──▶ processing ──▶ ready
///                 │  ▲
///                 ▼  │
///               failed
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "video_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Pending,
    Processing,
    Ready,
    Failed,
}

impl VideoStatus {
    /// Whether a single atomic update may move a record from `self` to `next`.
    ///
    /// `processing -> processing` is allowed so a worker can re-affirm the
    /// state (and clear a stale error) when it picks up a redelivered job.
    pub fn can_transition_to(self, next: VideoStatus) -> bool {
        use VideoStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Failed, Processing)
                | (Processing, Processing)
                | (Processing, Ready)
                | (Processing, Failed)
        )
    }

    /// Statuses from which `next` is reachable in one step.
    pub fn predecessors_of(next: VideoStatus) -> Vec<VideoStatus> {
        [
            VideoStatus::Pending,
            VideoStatus::Processing,
            VideoStatus::Ready,
            VideoStatus::Failed,
        ]
        .into_iter()
        .filter(|from| from.can_transition_to(next))
        .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Pending => "pending",
            VideoStatus::Processing => "processing",
            VideoStatus::Ready => "ready",
            VideoStatus::Failed => "failed",
        }
    }
}

impl Display for VideoStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(VideoStatus::Pending),
            "processing" => Ok(VideoStatus::Processing),
            "ready" => Ok(VideoStatus::Ready),
            "failed" => Ok(VideoStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid video status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Video {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: VideoStatus,
    pub title: Option<String>,
    pub raw_object_key: String,
    pub processed_object_key: Option<String>,
    pub cover_object_key: Option<String>,
    pub duration_sec: Option<i32>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    /// A fresh record as the upload session creates it.
    pub fn new_pending(id: Uuid, user_id: Uuid, title: Option<String>, raw_object_key: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            status: VideoStatus::Pending,
            title,
            raw_object_key,
            processed_object_key: None,
            cover_object_key: None,
            duration_sec: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    /// Extension (with leading dot) of the raw object key.
    pub fn raw_extension(&self) -> &str {
        let name = self
            .raw_object_key
            .rsplit('/')
            .next()
            .unwrap_or(&self.raw_object_key);
        match name.rfind('.') {
            Some(idx) if idx > 0 => &name[idx..],
            _ => DEFAULT_RAW_EXTENSION,
        }
    }

    /// Copy of `self` with a status update applied, mirroring what the
    /// record store does in SQL.
    pub fn with_status(&self, status: VideoStatus, fields: &StatusFields) -> Video {
        let mut next = self.clone();
        next.status = status;
        if let Some(ref key) = fields.processed_object_key {
            next.processed_object_key = Some(key.clone());
        }
        if let Some(ref key) = fields.cover_object_key {
            next.cover_object_key = Some(key.clone());
        }
        if let Some(duration) = fields.duration_sec {
            next.duration_sec = Some(duration);
        }
        next.error_message = fields.error_message.clone();
        next.updated_at = Utc::now();
        next
    }
}

/// Fields written together with a status change.
///
/// Derived keys and duration are only written when `Some`, so a failed run
/// leaves whatever a previous run produced. `error_message` is always
/// written: `None` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusFields {
    pub processed_object_key: Option<String>,
    pub cover_object_key: Option<String>,
    pub duration_sec: Option<i32>,
    pub error_message: Option<String>,
}

impl StatusFields {
    pub fn processing() -> Self {
        Self::default()
    }

    pub fn ready(processed_object_key: String, cover_object_key: String, duration_sec: Option<i32>) -> Self {
        Self {
            processed_object_key: Some(processed_object_key),
            cover_object_key: Some(cover_object_key),
            duration_sec,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// `raw/{id}/{id}{ext}`
pub fn raw_object_key(video_id: Uuid, extension: &str) -> String {
    format!("raw/{}/{}{}", video_id, video_id, extension)
}

/// `processed/{id}/video_720p.mp4`
pub fn rendition_object_key(video_id: Uuid) -> String {
    format!("processed/{}/video_720p.mp4", video_id)
}

/// `processed/{id}/cover.jpg`
pub fn cover_object_key(video_id: Uuid) -> String {
    format!("processed/{}/cover.jpg", video_id)
}

/// Public view of a video.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct VideoResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: VideoStatus,
    pub title: Option<String>,
    pub raw_object_key: String,
    pub processed_object_key: Option<String>,
    pub cover_object_key: Option<String>,
    pub duration_sec: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

impl From<Video> for VideoResponse {
    fn from(video: Video) -> Self {
        VideoResponse {
            id: video.id,
            user_id: video.user_id,
            status: video.status,
            title: video.title,
            raw_object_key: video.raw_object_key,
            processed_object_key: video.processed_object_key,
            cover_object_key: video.cover_object_key,
            duration_sec: video.duration_sec,
            created_at: video.created_at,
            updated_at: video.updated_at,
            error_message: video.error_message,
        }
    }
}
