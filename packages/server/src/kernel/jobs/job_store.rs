//! Postgres implementation of [`JobStore`].

use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;

use super::{
    ErrorKind, Job, JobCounts, JobStore, JobType, NewJob, QueueError, QueueStats, Session,
};
use crate::common::{JobId, SessionId, UserId};

#[derive(Clone)]
pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    async fn insert_job(&self, job: NewJob) -> Result<Job, QueueError> {
        Job::insert(job, &self.pool).await
    }

    async fn find_job(&self, id: JobId) -> Result<Option<Job>, QueueError> {
        Job::find_by_id(id, &self.pool).await
    }

    async fn find_job_by_key(
        &self,
        job_type: JobType,
        natural_key: &str,
    ) -> Result<Option<Job>, QueueError> {
        Job::find_by_natural_key(job_type, natural_key, &self.pool).await
    }

    async fn pending_batch(&self, job_type: JobType, limit: i64) -> Result<Vec<Job>, QueueError> {
        Job::find_pending_batch(job_type, limit, &self.pool).await
    }

    async fn mark_processing(&self, id: JobId) -> Result<bool, QueueError> {
        Job::mark_processing(id, &self.pool).await
    }

    async fn mark_completed(&self, id: JobId) -> Result<(), QueueError> {
        Job::mark_completed(id, &self.pool).await
    }

    async fn record_failure(
        &self,
        id: JobId,
        message: &str,
        kind: ErrorKind,
    ) -> Result<Job, QueueError> {
        Job::record_failure(id, message, kind, &self.pool).await
    }

    async fn count_pending(&self, job_type: JobType) -> Result<i64, QueueError> {
        Job::count_pending(job_type, &self.pool).await
    }

    async fn session_job_counts(&self, session_id: SessionId) -> Result<JobCounts, QueueError> {
        Job::counts_for_session(session_id, &self.pool).await
    }

    async fn processing_types_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<JobType>, QueueError> {
        Job::processing_types_for_session(session_id, &self.pool).await
    }

    async fn failed_job_messages(&self, session_id: SessionId) -> Result<Vec<String>, QueueError> {
        Job::failed_messages_for_session(session_id, &self.pool).await
    }

    async fn retry_failed_jobs(
        &self,
        session_id: SessionId,
        user_id: UserId,
    ) -> Result<u64, QueueError> {
        // Dropping the transaction on an early return rolls the reset back.
        let mut tx = self.pool.begin().await?;
        let reset = Job::reset_failed_for_session(session_id, &mut *tx).await?;
        if reset > 0 {
            Session::reopen(session_id, user_id, &mut *tx).await?;
        }
        tx.commit().await?;
        Ok(reset)
    }

    async fn requeue_stale_processing(&self, lease: Duration) -> Result<Vec<Job>, QueueError> {
        Job::requeue_stale_processing(lease, &self.pool).await
    }

    async fn queue_stats(&self) -> Result<Vec<QueueStats>, QueueError> {
        Job::queue_stats(&self.pool).await
    }

    async fn insert_session(&self, session: Session) -> Result<Session, QueueError> {
        Session::insert(&session, &self.pool).await
    }

    async fn find_session(&self, id: SessionId) -> Result<Option<Session>, QueueError> {
        Session::find_by_id(id, &self.pool).await
    }

    async fn active_session(&self, user_id: UserId) -> Result<Option<Session>, QueueError> {
        Session::find_active_for_user(user_id, &self.pool).await
    }

    async fn latest_session(&self, user_id: UserId) -> Result<Option<Session>, QueueError> {
        Session::find_latest_for_user(user_id, &self.pool).await
    }

    async fn update_session_progress(
        &self,
        id: SessionId,
        total_jobs: i32,
        completed_jobs: i32,
        failed_jobs: i32,
    ) -> Result<(), QueueError> {
        Session::update_progress(id, total_jobs, completed_jobs, failed_jobs, &self.pool).await
    }

    async fn complete_session(&self, id: SessionId, errors: &[String]) -> Result<bool, QueueError> {
        Session::complete(id, errors, &self.pool).await
    }
}
