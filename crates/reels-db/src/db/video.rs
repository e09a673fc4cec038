use async_trait::async_trait;
use reels_core::models::{StatusFields, Video, VideoStatus};
use reels_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Durable store for [`Video`] records.
///
/// Every write is a single statement so a concurrent reader never observes a
/// half-applied transition (e.g. `ready` with no rendition key).
#[async_trait]
pub trait VideoRepository: Send + Sync {
    /// Insert a new record. The raw object key is part of the insert and is
    /// never written again.
    async fn create(&self, video: &Video) -> Result<Video, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<Video>, AppError>;

    /// Move `id` to `next` only if its current status is one of `expected`.
    ///
    /// Returns the updated record, or `None` when the record is missing or
    /// its status no longer matches (another writer got there first).
    /// Asking for a transition the state machine forbids is an error.
    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: &[VideoStatus],
        next: VideoStatus,
        fields: &StatusFields,
    ) -> Result<Option<Video>, AppError>;

    /// Ready videos, newest first.
    async fn list_feed(&self, limit: i64, offset: i64) -> Result<Vec<Video>, AppError>;

    async fn count_feed(&self) -> Result<i64, AppError>;

    /// Cheap round trip for health checks.
    async fn ping(&self) -> Result<(), AppError>;
}

/// Keep only the expected statuses that may legally move to `next`.
pub(crate) fn legal_predecessors(
    expected: &[VideoStatus],
    next: VideoStatus,
) -> Result<Vec<VideoStatus>, AppError> {
    let legal: Vec<VideoStatus> = expected
        .iter()
        .copied()
        .filter(|from| from.can_transition_to(next))
        .collect();
    if legal.is_empty() {
        return Err(AppError::Internal(format!(
            "Illegal video status transition {:?} -> {}",
            expected, next
        )));
    }
    Ok(legal)
}

const VIDEO_COLUMNS: &str = r#"
    id, user_id, status, title, raw_object_key, processed_object_key,
    cover_object_key, duration_sec, error_message, created_at, updated_at
"#;

/// Postgres-backed [`VideoRepository`]
#[derive(Clone)]
pub struct PgVideoRepository {
    pool: PgPool,
}

impl PgVideoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VideoRepository for PgVideoRepository {
    #[tracing::instrument(skip(self, video), fields(video_id = %video.id))]
    async fn create(&self, video: &Video) -> Result<Video, AppError> {
        if video.raw_object_key.is_empty() {
            return Err(AppError::Internal(
                "Refusing to create a video without a raw object key".to_string(),
            ));
        }

        let sql = format!(
            r#"
            INSERT INTO videos (id, user_id, status, title, raw_object_key)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            VIDEO_COLUMNS
        );

        let created = sqlx::query_as::<Postgres, Video>(&sql)
            .bind(video.id)
            .bind(video.user_id)
            .bind(video.status)
            .bind(video.title.as_deref())
            .bind(&video.raw_object_key)
            .fetch_one(&self.pool)
            .await?;

        tracing::info!(
            video_id = %created.id,
            user_id = %created.user_id,
            raw_object_key = %created.raw_object_key,
            "Video record created"
        );

        Ok(created)
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, id: Uuid) -> Result<Option<Video>, AppError> {
        let sql = format!("SELECT {} FROM videos WHERE id = $1", VIDEO_COLUMNS);
        let video = sqlx::query_as::<Postgres, Video>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(video)
    }

    #[tracing::instrument(skip(self, fields))]
    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: &[VideoStatus],
        next: VideoStatus,
        fields: &StatusFields,
    ) -> Result<Option<Video>, AppError> {
        let expected = legal_predecessors(expected, next)?;

        // Derived fields are COALESCEd so a failure keeps what an earlier run
        // produced; error_message is always overwritten.
        let sql = format!(
            r#"
            UPDATE videos
            SET status = $3,
                processed_object_key = COALESCE($4, processed_object_key),
                cover_object_key = COALESCE($5, cover_object_key),
                duration_sec = COALESCE($6, duration_sec),
                error_message = $7,
                updated_at = NOW()
            WHERE id = $1 AND status = ANY($2)
            RETURNING {}
            "#,
            VIDEO_COLUMNS
        );

        let updated = sqlx::query_as::<Postgres, Video>(&sql)
            .bind(id)
            .bind(&expected)
            .bind(next)
            .bind(fields.processed_object_key.as_deref())
            .bind(fields.cover_object_key.as_deref())
            .bind(fields.duration_sec)
            .bind(fields.error_message.as_deref())
            .fetch_optional(&self.pool)
            .await?;

        match updated {
            Some(ref video) => tracing::debug!(video_id = %id, status = %video.status, "Video status updated"),
            None => tracing::debug!(video_id = %id, next = %next, "Video status compare-and-set lost"),
        }

        Ok(updated)
    }

    async fn list_feed(&self, limit: i64, offset: i64) -> Result<Vec<Video>, AppError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM videos
            WHERE status = 'ready'
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
            VIDEO_COLUMNS
        );
        let videos = sqlx::query_as::<Postgres, Video>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(videos)
    }

    async fn count_feed(&self) -> Result<i64, AppError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM videos WHERE status = 'ready'")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_predecessors_filters_illegal() {
        let legal = legal_predecessors(
            &[VideoStatus::Pending, VideoStatus::Ready],
            VideoStatus::Processing,
        )
        .unwrap();
        assert_eq!(legal, vec![VideoStatus::Pending]);
    }

    #[test]
    fn test_legal_predecessors_rejects_skip() {
        let result = legal_predecessors(&[VideoStatus::Pending], VideoStatus::Ready);
        assert!(matches!(result, Err(AppError::Internal(_))));
    }
}
