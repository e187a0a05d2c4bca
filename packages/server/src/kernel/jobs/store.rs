//! Storage seam for jobs and sessions.
//!
//! The queue manager only talks to this trait, so the same queue semantics
//! run against Postgres in production and an in-memory store in tests.

use async_trait::async_trait;
use std::time::Duration;

use super::{ErrorKind, Job, JobCounts, JobType, NewJob, QueueError, QueueStats, Session};
use crate::common::{JobId, SessionId, UserId};

#[async_trait]
pub trait JobStore: Send + Sync {
    // Jobs

    /// Inserts a pending job. Fails with [`QueueError::Duplicate`] when the
    /// `(job_type, natural_key)` pair already exists.
    async fn insert_job(&self, job: NewJob) -> Result<Job, QueueError>;

    async fn find_job(&self, id: JobId) -> Result<Option<Job>, QueueError>;

    async fn find_job_by_key(
        &self,
        job_type: JobType,
        natural_key: &str,
    ) -> Result<Option<Job>, QueueError>;

    /// Pending jobs with attempts left, ordered by priority ascending then
    /// `created_at` descending.
    async fn pending_batch(&self, job_type: JobType, limit: i64) -> Result<Vec<Job>, QueueError>;

    /// Conditional `pending -> processing`; false if the job was not pending.
    async fn mark_processing(&self, id: JobId) -> Result<bool, QueueError>;

    async fn mark_completed(&self, id: JobId) -> Result<(), QueueError>;

    async fn record_failure(
        &self,
        id: JobId,
        message: &str,
        kind: ErrorKind,
    ) -> Result<Job, QueueError>;

    async fn count_pending(&self, job_type: JobType) -> Result<i64, QueueError>;

    async fn session_job_counts(&self, session_id: SessionId) -> Result<JobCounts, QueueError>;

    async fn processing_types_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<JobType>, QueueError>;

    async fn failed_job_messages(&self, session_id: SessionId) -> Result<Vec<String>, QueueError>;

    /// Resets the session's failed jobs to `pending` with fresh attempts and
    /// reopens the session if it had completed. All or nothing: when another
    /// session of the same user is active, nothing changes and
    /// [`QueueError::ActiveSessionExists`] is returned.
    async fn retry_failed_jobs(&self, session_id: SessionId, user_id: UserId)
        -> Result<u64, QueueError>;

    async fn requeue_stale_processing(&self, lease: Duration) -> Result<Vec<Job>, QueueError>;

    async fn queue_stats(&self) -> Result<Vec<QueueStats>, QueueError>;

    // Sessions

    /// Fails with [`QueueError::ActiveSessionExists`] if the user already has one.
    async fn insert_session(&self, session: Session) -> Result<Session, QueueError>;

    async fn find_session(&self, id: SessionId) -> Result<Option<Session>, QueueError>;

    async fn active_session(&self, user_id: UserId) -> Result<Option<Session>, QueueError>;

    async fn latest_session(&self, user_id: UserId) -> Result<Option<Session>, QueueError>;

    async fn update_session_progress(
        &self,
        id: SessionId,
        total_jobs: i32,
        completed_jobs: i32,
        failed_jobs: i32,
    ) -> Result<(), QueueError>;

    /// Conditional `active -> completed`; true only for the call that made the transition.
    async fn complete_session(&self, id: SessionId, errors: &[String]) -> Result<bool, QueueError>;
}
