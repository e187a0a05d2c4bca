//! Job model for the staged content pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use std::fmt;
use std::time::Duration;
use typed_builder::TypedBuilder;

use super::error::{unique_violation, JOB_NATURAL_KEY_CONSTRAINT};
use super::{JobPayload, QueueError};
use crate::common::{JobId, SessionId, UserId};

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "pipeline_job_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Fetch,
    Transcribe,
    Summarize,
}

impl JobType {
    /// Stage order the drain cycle walks.
    pub const PIPELINE_ORDER: [JobType; 3] = [JobType::Fetch, JobType::Transcribe, JobType::Summarize];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Fetch => "fetch",
            JobType::Transcribe => "transcribe",
            JobType::Summarize => "summarize",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_error_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transient error - will retry if attempts remain
    #[default]
    Retryable,
    /// Permanent error - will not retry
    NonRetryable,
}

impl ErrorKind {
    pub fn should_retry(&self) -> bool {
        matches!(self, ErrorKind::Retryable)
    }

    pub fn from_retryable(retryable: bool) -> Self {
        if retryable {
            ErrorKind::Retryable
        } else {
            ErrorKind::NonRetryable
        }
    }
}

// ============================================================================
// Job Model
// ============================================================================

#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub user_id: UserId,
    pub session_id: Option<SessionId>,
    pub job_type: JobType,
    #[sqlx(json)]
    pub job_data: JobPayload,
    pub natural_key: String,
    pub status: JobStatus,
    /// Lower runs first.
    pub priority: i32,
    pub retry_count: i32,
    pub max_retries: i32,
    pub error_message: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Completed | JobStatus::Failed)
    }

    /// Applies one failed attempt to the in-memory record.
    ///
    /// A terminal failure pins `retry_count` to at least `max_retries` so a
    /// failed job is never mistaken for one with attempts left.
    pub fn apply_failure(&mut self, message: &str, kind: ErrorKind, now: DateTime<Utc>) {
        let attempts = self.retry_count + 1;
        if kind.should_retry() && attempts < self.max_retries {
            self.retry_count = attempts;
            self.status = JobStatus::Pending;
            self.started_at = None;
        } else {
            self.retry_count = attempts.max(self.max_retries);
            self.status = JobStatus::Failed;
            self.completed_at = Some(now);
        }
        self.error_message = Some(message.to_string());
        self.error_kind = Some(kind);
        self.updated_at = now;
    }
}

/// A job about to be enqueued.
#[derive(Debug, Clone, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct NewJob {
    pub user_id: UserId,
    #[builder(default, setter(strip_option))]
    pub session_id: Option<SessionId>,
    pub payload: JobPayload,
    #[builder(default = 0)]
    pub priority: i32,
    #[builder(default = 3)]
    pub max_retries: i32,
}

impl NewJob {
    pub fn job_type(&self) -> JobType {
        self.payload.job_type()
    }

    pub fn natural_key(&self) -> String {
        self.payload.natural_key(self.session_id)
    }

    /// Materializes the row an insert would create.
    pub fn into_job(self, now: DateTime<Utc>) -> Job {
        let natural_key = self.natural_key();
        Job {
            id: JobId::new(),
            user_id: self.user_id,
            session_id: self.session_id,
            job_type: self.payload.job_type(),
            job_data: self.payload,
            natural_key,
            status: JobStatus::Pending,
            priority: self.priority,
            retry_count: 0,
            max_retries: self.max_retries,
            error_message: None,
            error_kind: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }
}

/// Per-status job counts for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct JobCounts {
    pub total: i64,
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

/// Queue depth for one job type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct QueueStats {
    pub job_type: JobType,
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

// ============================================================================
// Queries
// ============================================================================

const JOB_COLUMNS: &str = "id, user_id, session_id, job_type, job_data, natural_key, status, \
     priority, retry_count, max_retries, error_message, error_kind, \
     created_at, started_at, completed_at, updated_at";

impl Job {
    pub async fn insert(new_job: NewJob, pool: &PgPool) -> Result<Self, QueueError> {
        new_job.payload.validate()?;
        let job_type = new_job.job_type();
        let natural_key = new_job.natural_key();

        let result = sqlx::query_as::<_, Self>(&format!(
            r#"
            INSERT INTO pipeline_jobs (
                id, user_id, session_id, job_type, job_data, natural_key,
                status, priority, retry_count, max_retries
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, 0, $8)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(JobId::new())
        .bind(new_job.user_id)
        .bind(new_job.session_id)
        .bind(job_type)
        .bind(sqlx::types::Json(&new_job.payload))
        .bind(&natural_key)
        .bind(new_job.priority)
        .bind(new_job.max_retries)
        .fetch_one(pool)
        .await;

        match result {
            Ok(job) => Ok(job),
            Err(err) => match unique_violation(&err) {
                Some(constraint) if constraint == JOB_NATURAL_KEY_CONSTRAINT => {
                    Err(QueueError::Duplicate {
                        job_type,
                        natural_key,
                    })
                }
                _ => Err(err.into()),
            },
        }
    }

    pub async fn find_by_id(id: JobId, pool: &PgPool) -> Result<Option<Self>, QueueError> {
        let job = sqlx::query_as::<_, Self>(&format!(
            "SELECT {JOB_COLUMNS} FROM pipeline_jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(job)
    }

    pub async fn find_by_natural_key(
        job_type: JobType,
        natural_key: &str,
        pool: &PgPool,
    ) -> Result<Option<Self>, QueueError> {
        let job = sqlx::query_as::<_, Self>(&format!(
            "SELECT {JOB_COLUMNS} FROM pipeline_jobs WHERE job_type = $1 AND natural_key = $2"
        ))
        .bind(job_type)
        .bind(natural_key)
        .fetch_optional(pool)
        .await?;
        Ok(job)
    }

    /// Pending jobs of one type that still have attempts left, best priority
    /// first and newest first within a priority.
    pub async fn find_pending_batch(
        job_type: JobType,
        limit: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>, QueueError> {
        let jobs = sqlx::query_as::<_, Self>(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM pipeline_jobs
            WHERE job_type = $1
              AND status = 'pending'
              AND retry_count < max_retries
            ORDER BY priority ASC, created_at DESC
            LIMIT $2
            "#
        ))
        .bind(job_type)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(jobs)
    }

    /// Claims a pending job. Returns false when another cycle got there first.
    pub async fn mark_processing(id: JobId, pool: &PgPool) -> Result<bool, QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE pipeline_jobs
            SET status = 'processing',
                started_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn mark_completed(id: JobId, pool: &PgPool) -> Result<(), QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE pipeline_jobs
            SET status = 'completed',
                completed_at = NOW(),
                error_message = NULL,
                error_kind = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(QueueError::JobNotFound(id));
        }
        Ok(())
    }

    /// Records a failed attempt and returns the updated row.
    pub async fn record_failure(
        id: JobId,
        message: &str,
        kind: ErrorKind,
        pool: &PgPool,
    ) -> Result<Self, QueueError> {
        let job = sqlx::query_as::<_, Self>(&format!(
            r#"
            UPDATE pipeline_jobs
            SET retry_count = CASE
                    WHEN $3 AND retry_count + 1 < max_retries THEN retry_count + 1
                    ELSE GREATEST(retry_count + 1, max_retries)
                END,
                status = CASE
                    WHEN $3 AND retry_count + 1 < max_retries THEN 'pending'::job_status
                    ELSE 'failed'::job_status
                END,
                started_at = CASE
                    WHEN $3 AND retry_count + 1 < max_retries THEN NULL
                    ELSE started_at
                END,
                completed_at = CASE
                    WHEN $3 AND retry_count + 1 < max_retries THEN NULL
                    ELSE NOW()
                END,
                error_message = $2,
                error_kind = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(message)
        .bind(kind.should_retry())
        .bind(kind)
        .fetch_optional(pool)
        .await?;
        job.ok_or(QueueError::JobNotFound(id))
    }

    pub async fn count_pending(job_type: JobType, pool: &PgPool) -> Result<i64, QueueError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM pipeline_jobs
            WHERE job_type = $1 AND status = 'pending' AND retry_count < max_retries
            "#,
        )
        .bind(job_type)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    pub async fn counts_for_session(
        session_id: SessionId,
        pool: &PgPool,
    ) -> Result<JobCounts, QueueError> {
        let counts = sqlx::query_as::<_, JobCounts>(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                   COUNT(*) FILTER (WHERE status = 'processing') AS processing,
                   COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                   COUNT(*) FILTER (WHERE status = 'failed') AS failed
            FROM pipeline_jobs
            WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_one(pool)
        .await?;
        Ok(counts)
    }

    pub async fn processing_types_for_session(
        session_id: SessionId,
        pool: &PgPool,
    ) -> Result<Vec<JobType>, QueueError> {
        let types = sqlx::query_scalar::<_, JobType>(
            r#"
            SELECT DISTINCT job_type
            FROM pipeline_jobs
            WHERE session_id = $1 AND status = 'processing'
            "#,
        )
        .bind(session_id)
        .fetch_all(pool)
        .await?;
        Ok(types)
    }

    pub async fn failed_messages_for_session(
        session_id: SessionId,
        pool: &PgPool,
    ) -> Result<Vec<String>, QueueError> {
        let messages = sqlx::query_scalar::<_, String>(
            r#"
            SELECT job_type::text || ': ' || COALESCE(error_message, 'unknown error')
            FROM pipeline_jobs
            WHERE session_id = $1 AND status = 'failed'
            ORDER BY updated_at
            "#,
        )
        .bind(session_id)
        .fetch_all(pool)
        .await?;
        Ok(messages)
    }

    /// Puts a session's terminally failed jobs back in the queue with fresh attempts.
    pub async fn reset_failed_for_session(
        session_id: SessionId,
        conn: &mut PgConnection,
    ) -> Result<u64, QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE pipeline_jobs
            SET status = 'pending',
                retry_count = 0,
                error_message = NULL,
                error_kind = NULL,
                started_at = NULL,
                completed_at = NULL,
                updated_at = NOW()
            WHERE session_id = $1 AND status = 'failed'
            "#,
        )
        .bind(session_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Treats jobs left in `processing` past the lease as a failed attempt.
    pub async fn requeue_stale_processing(
        lease: Duration,
        pool: &PgPool,
    ) -> Result<Vec<Self>, QueueError> {
        let jobs = sqlx::query_as::<_, Self>(&format!(
            r#"
            UPDATE pipeline_jobs
            SET retry_count = CASE
                    WHEN retry_count + 1 < max_retries THEN retry_count + 1
                    ELSE GREATEST(retry_count + 1, max_retries)
                END,
                status = CASE
                    WHEN retry_count + 1 < max_retries THEN 'pending'::job_status
                    ELSE 'failed'::job_status
                END,
                completed_at = CASE WHEN retry_count + 1 < max_retries THEN NULL ELSE NOW() END,
                started_at = NULL,
                error_message = 'processing lease expired',
                error_kind = 'retryable',
                updated_at = NOW()
            WHERE status = 'processing'
              AND started_at < NOW() - ($1 || ' milliseconds')::INTERVAL
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(lease.as_millis().to_string())
        .fetch_all(pool)
        .await?;
        Ok(jobs)
    }

    pub async fn queue_stats(pool: &PgPool) -> Result<Vec<QueueStats>, QueueError> {
        let stats = sqlx::query_as::<_, QueueStats>(
            r#"
            SELECT job_type,
                   COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                   COUNT(*) FILTER (WHERE status = 'processing') AS processing,
                   COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                   COUNT(*) FILTER (WHERE status = 'failed') AS failed
            FROM pipeline_jobs
            GROUP BY job_type
            ORDER BY job_type
            "#,
        )
        .fetch_all(pool)
        .await?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ContentId, Platform};
    use crate::kernel::jobs::TranscribePayload;

    fn job(max_retries: i32) -> Job {
        NewJob::builder()
            .user_id(UserId::new())
            .payload(JobPayload::Transcribe(TranscribePayload {
                content_id: ContentId::new(),
                source_url: "https://example.com/v/1".into(),
                platform: Platform::Tiktok,
            }))
            .max_retries(max_retries)
            .build()
            .into_job(Utc::now())
    }

    #[test]
    fn retryable_failure_returns_to_pending() {
        let mut job = job(3);
        job.status = JobStatus::Processing;
        job.apply_failure("timeout", ErrorKind::Retryable, Utc::now());
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.retry_count, 1);
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn exhausted_retries_fail_terminally() {
        let mut job = job(2);
        job.apply_failure("timeout", ErrorKind::Retryable, Utc::now());
        job.apply_failure("timeout", ErrorKind::Retryable, Utc::now());
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.retry_count, 2);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn permanent_failure_pins_retry_count() {
        let mut job = job(3);
        job.apply_failure("unsupported", ErrorKind::NonRetryable, Utc::now());
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.retry_count >= job.max_retries);
    }

    #[test]
    fn pipeline_order_is_fetch_transcribe_summarize() {
        assert!(JobType::Fetch < JobType::Transcribe);
        assert!(JobType::Transcribe < JobType::Summarize);
        assert_eq!(JobType::PIPELINE_ORDER[0], JobType::Fetch);
    }
}
