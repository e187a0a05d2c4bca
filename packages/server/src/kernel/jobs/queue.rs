//! Queue manager: enqueue/dequeue, status transitions, retry accounting and
//! session lifecycle on top of a [`JobStore`].
//!
//! The manager holds no state of its own beyond the store handle, so one can
//! be built per invocation and dropped afterwards.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{
    ErrorKind, Job, JobCounts, JobPayload, JobStore, JobType, NewJob, QueueError, QueueStats,
    Session,
};
use crate::common::{JobId, SessionId, UserId};

/// Result type for enqueue operations that handles idempotency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    /// Job was enqueued, returns new job ID
    Created(JobId),
    /// A job with the same natural key already exists, returns its ID
    Duplicate(JobId),
}

impl EnqueueResult {
    /// Get the job ID regardless of whether it was created or duplicate
    pub fn job_id(&self) -> JobId {
        match self {
            EnqueueResult::Created(id) | EnqueueResult::Duplicate(id) => *id,
        }
    }

    /// Returns true if this was a newly created job
    pub fn is_created(&self) -> bool {
        matches!(self, EnqueueResult::Created(_))
    }
}

#[derive(Clone)]
pub struct QueueManager {
    store: Arc<dyn JobStore>,
    default_max_retries: i32,
}

impl QueueManager {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            default_max_retries: 3,
        }
    }

    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.default_max_retries = max_retries;
        self
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Opens a session for a user. Only one active session per user may exist.
    pub async fn create_session(
        &self,
        user_id: UserId,
        total_jobs: i32,
    ) -> Result<Session, QueueError> {
        if self.store.active_session(user_id).await?.is_some() {
            return Err(QueueError::ActiveSessionExists(user_id));
        }
        let session = self
            .store
            .insert_session(Session::new(user_id, total_jobs, chrono::Utc::now()))
            .await?;
        info!(session_id = %session.id, user_id = %user_id, total_jobs, "Session created");
        Ok(session)
    }

    pub async fn get_active_session(&self, user_id: UserId) -> Result<Option<Session>, QueueError> {
        self.store.active_session(user_id).await
    }

    pub async fn latest_session(&self, user_id: UserId) -> Result<Option<Session>, QueueError> {
        self.store.latest_session(user_id).await
    }

    pub async fn find_session(&self, session_id: SessionId) -> Result<Option<Session>, QueueError> {
        self.store.find_session(session_id).await
    }

    /// Writes the cached counters. `total_jobs` is raised if needed so that
    /// `completed + failed` never exceeds it.
    pub async fn update_session_progress(
        &self,
        session_id: SessionId,
        total_jobs: i32,
        completed_jobs: i32,
        failed_jobs: i32,
    ) -> Result<(), QueueError> {
        let total_jobs = total_jobs.max(completed_jobs + failed_jobs);
        self.store
            .update_session_progress(session_id, total_jobs, completed_jobs, failed_jobs)
            .await
    }

    /// Completes a session once. Returns true only for the call that did it.
    pub async fn complete_session(
        &self,
        session_id: SessionId,
        errors: &[String],
    ) -> Result<bool, QueueError> {
        let completed = self.store.complete_session(session_id, errors).await?;
        if completed {
            info!(session_id = %session_id, errors = errors.len(), "Session completed");
        }
        Ok(completed)
    }

    /// Gives a session's failed jobs fresh attempts and re-opens it. Fails
    /// without touching any job if a completed session cannot be reopened.
    pub async fn retry_failed(&self, session: &Session) -> Result<u64, QueueError> {
        let reset = self
            .store
            .retry_failed_jobs(session.id, session.user_id)
            .await?;
        info!(session_id = %session.id, reset, "Failed jobs re-queued");
        Ok(reset)
    }

    pub async fn session_job_counts(&self, session_id: SessionId) -> Result<JobCounts, QueueError> {
        self.store.session_job_counts(session_id).await
    }

    pub async fn processing_types(&self, session_id: SessionId) -> Result<Vec<JobType>, QueueError> {
        self.store.processing_types_for_session(session_id).await
    }

    pub async fn failed_job_messages(&self, session_id: SessionId) -> Result<Vec<String>, QueueError> {
        self.store.failed_job_messages(session_id).await
    }

    // ------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------

    /// Enqueues a job. A natural-key collision surfaces as
    /// [`QueueError::Duplicate`]; see [`Self::enqueue_idempotent`].
    pub async fn enqueue(
        &self,
        user_id: UserId,
        session_id: Option<SessionId>,
        payload: JobPayload,
        priority: i32,
    ) -> Result<JobId, QueueError> {
        let job = NewJob {
            user_id,
            session_id,
            payload,
            priority,
            max_retries: self.default_max_retries,
        };
        self.enqueue_job(job).await
    }

    pub async fn enqueue_job(&self, job: NewJob) -> Result<JobId, QueueError> {
        let job = self.store.insert_job(job).await?;
        debug!(
            job_id = %job.id,
            job_type = %job.job_type,
            priority = job.priority,
            "Job enqueued"
        );
        Ok(job.id)
    }

    /// Enqueue that treats a duplicate natural key as success.
    pub async fn enqueue_idempotent(
        &self,
        user_id: UserId,
        session_id: Option<SessionId>,
        payload: JobPayload,
        priority: i32,
    ) -> Result<EnqueueResult, QueueError> {
        let job_type = payload.job_type();
        let natural_key = payload.natural_key(session_id);
        match self.enqueue(user_id, session_id, payload, priority).await {
            Ok(id) => Ok(EnqueueResult::Created(id)),
            Err(QueueError::Duplicate { .. }) => {
                let existing = self
                    .store
                    .find_job_by_key(job_type, &natural_key)
                    .await?
                    .ok_or_else(|| QueueError::Duplicate {
                        job_type,
                        natural_key: natural_key.clone(),
                    })?;
                debug!(
                    job_id = %existing.id,
                    job_type = %job_type,
                    natural_key = %natural_key,
                    "Duplicate enqueue ignored"
                );
                Ok(EnqueueResult::Duplicate(existing.id))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn find_job(&self, job_id: JobId) -> Result<Option<Job>, QueueError> {
        self.store.find_job(job_id).await
    }

    /// Up to `limit` runnable jobs of one type, best priority first, newest
    /// first within a priority.
    pub async fn dequeue_batch(&self, job_type: JobType, limit: i64) -> Result<Vec<Job>, QueueError> {
        self.store.pending_batch(job_type, limit).await
    }

    pub async fn mark_processing(&self, job_id: JobId) -> Result<bool, QueueError> {
        self.store.mark_processing(job_id).await
    }

    pub async fn mark_completed(&self, job_id: JobId) -> Result<(), QueueError> {
        self.store.mark_completed(job_id).await
    }

    /// Counts one failed attempt. Retryable failures with attempts left go
    /// back to `pending`; everything else fails terminally.
    pub async fn mark_failed(
        &self,
        job_id: JobId,
        message: &str,
        retryable: bool,
    ) -> Result<Job, QueueError> {
        let job = self
            .store
            .record_failure(job_id, message, ErrorKind::from_retryable(retryable))
            .await?;
        if job.is_terminal() {
            warn!(
                job_id = %job.id,
                job_type = %job.job_type,
                retry_count = job.retry_count,
                error = %message,
                "Job failed terminally"
            );
        } else {
            debug!(
                job_id = %job.id,
                job_type = %job.job_type,
                retry_count = job.retry_count,
                error = %message,
                "Job will be retried"
            );
        }
        Ok(job)
    }

    pub async fn count_pending(&self, job_type: JobType) -> Result<i64, QueueError> {
        self.store.count_pending(job_type).await
    }

    /// Whether any stage still has runnable jobs.
    pub async fn has_pending_work(&self) -> Result<bool, QueueError> {
        for job_type in JobType::PIPELINE_ORDER {
            if self.store.count_pending(job_type).await? > 0 {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Returns jobs abandoned in `processing` (e.g. by a cycle that was
    /// killed mid-flight) to the queue, charging them one attempt.
    pub async fn recover_stale(&self, lease: Duration) -> Result<Vec<Job>, QueueError> {
        let jobs = self.store.requeue_stale_processing(lease).await?;
        if !jobs.is_empty() {
            warn!(count = jobs.len(), "Recovered jobs with expired processing lease");
        }
        Ok(jobs)
    }

    pub async fn stats(&self) -> Result<Vec<QueueStats>, QueueError> {
        self.store.queue_stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ContentId, Platform};
    use crate::kernel::jobs::testing::InMemoryJobStore;
    use crate::kernel::jobs::{JobStatus, TranscribePayload};

    fn transcribe(content_id: ContentId) -> JobPayload {
        JobPayload::Transcribe(TranscribePayload {
            content_id,
            source_url: format!("https://example.com/{}", content_id),
            platform: Platform::Tiktok,
        })
    }

    fn manager() -> (Arc<InMemoryJobStore>, QueueManager) {
        let store = Arc::new(InMemoryJobStore::new());
        (store.clone(), QueueManager::new(store))
    }

    #[tokio::test]
    async fn dequeue_orders_by_priority_then_newest() {
        let (_, queue) = manager();
        let user = UserId::new();
        let p10 = queue.enqueue(user, None, transcribe(ContentId::new()), 10).await.unwrap();
        let p5 = queue.enqueue(user, None, transcribe(ContentId::new()), 5).await.unwrap();
        let p1_old = queue.enqueue(user, None, transcribe(ContentId::new()), 1).await.unwrap();
        let p1_new = queue.enqueue(user, None, transcribe(ContentId::new()), 1).await.unwrap();

        let batch = queue.dequeue_batch(JobType::Transcribe, 10).await.unwrap();
        let ids: Vec<JobId> = batch.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![p1_new, p1_old, p5, p10]);

        let limited = queue.dequeue_batch(JobType::Transcribe, 2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_enqueue_keeps_one_row() {
        let (store, queue) = manager();
        let user = UserId::new();
        let content_id = ContentId::new();

        let first = queue
            .enqueue_idempotent(user, None, transcribe(content_id), 5)
            .await
            .unwrap();
        let second = queue
            .enqueue_idempotent(user, None, transcribe(content_id), 5)
            .await
            .unwrap();

        assert!(first.is_created());
        assert_eq!(second, EnqueueResult::Duplicate(first.job_id()));
        assert_eq!(store.jobs().len(), 1);

        let raw = queue.enqueue(user, None, transcribe(content_id), 5).await;
        assert!(matches!(raw, Err(ref e) if e.is_duplicate()));
    }

    #[tokio::test]
    async fn retry_accounting_follows_max_retries() {
        let (_, queue) = manager();
        let id = queue
            .enqueue(UserId::new(), None, transcribe(ContentId::new()), 0)
            .await
            .unwrap();

        let mut last_retry_count = 0;
        for attempt in 1..=3 {
            assert!(queue.mark_processing(id).await.unwrap());
            let job = queue.mark_failed(id, "timeout", true).await.unwrap();
            assert!(job.retry_count >= last_retry_count);
            last_retry_count = job.retry_count;
            if attempt < 3 {
                assert_eq!(job.status, JobStatus::Pending);
                assert!(job.retry_count < job.max_retries);
            } else {
                assert_eq!(job.status, JobStatus::Failed);
                assert!(job.retry_count >= job.max_retries);
                assert!(job.completed_at.is_some());
            }
        }

        assert!(queue.dequeue_batch(JobType::Transcribe, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mark_processing_is_claimed_once() {
        let (_, queue) = manager();
        let id = queue
            .enqueue(UserId::new(), None, transcribe(ContentId::new()), 0)
            .await
            .unwrap();
        assert!(queue.mark_processing(id).await.unwrap());
        assert!(!queue.mark_processing(id).await.unwrap());
    }

    #[tokio::test]
    async fn second_active_session_is_rejected() {
        let (_, queue) = manager();
        let user = UserId::new();
        let session = queue.create_session(user, 2).await.unwrap();

        let err = queue.create_session(user, 1).await.unwrap_err();
        assert!(matches!(err, QueueError::ActiveSessionExists(u) if u == user));

        assert!(queue.complete_session(session.id, &[]).await.unwrap());
        assert!(!queue.complete_session(session.id, &[]).await.unwrap());
        assert!(queue.create_session(user, 1).await.is_ok());
    }

    #[tokio::test]
    async fn progress_never_exceeds_total() {
        let (store, queue) = manager();
        let session = queue.create_session(UserId::new(), 1).await.unwrap();
        queue.update_session_progress(session.id, 1, 2, 1).await.unwrap();

        let stored = store.session(session.id).unwrap();
        assert_eq!(stored.total_jobs, 3);
        assert!(stored.resolved_jobs() <= stored.total_jobs);
    }

    #[tokio::test]
    async fn stale_processing_jobs_are_requeued() {
        let (store, queue) = manager();
        let id = queue
            .enqueue(UserId::new(), None, transcribe(ContentId::new()), 0)
            .await
            .unwrap();
        queue.mark_processing(id).await.unwrap();
        store.update_job(id, |job| {
            job.started_at = Some(chrono::Utc::now() - chrono::Duration::minutes(10));
        });

        let recovered = queue.recover_stale(Duration::from_secs(300)).await.unwrap();
        assert_eq!(recovered.len(), 1);

        let job = store.job(id).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.retry_count, 1);
    }
}
