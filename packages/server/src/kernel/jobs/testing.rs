//! In-memory job store for tests.
//!
//! Enforces the same natural-key and one-active-session constraints as the
//! Postgres schema so queue semantics can be exercised without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use super::{
    ErrorKind, Job, JobCounts, JobStatus, JobStore, JobType, NewJob, QueueError, QueueStats,
    Session, SessionStatus,
};
use crate::common::{JobId, SessionId, UserId};

#[derive(Default)]
struct State {
    jobs: HashMap<JobId, (u64, Job)>,
    sessions: HashMap<SessionId, Session>,
    next_seq: u64,
}

#[derive(Default)]
pub struct InMemoryJobStore {
    state: RwLock<State>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All jobs in insertion order.
    pub fn jobs(&self) -> Vec<Job> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let mut jobs: Vec<(u64, Job)> = state.jobs.values().cloned().collect();
        jobs.sort_by_key(|(seq, _)| *seq);
        jobs.into_iter().map(|(_, job)| job).collect()
    }

    pub fn jobs_by_type(&self, job_type: JobType) -> Vec<Job> {
        self.jobs()
            .into_iter()
            .filter(|j| j.job_type == job_type)
            .collect()
    }

    pub fn job(&self, id: JobId) -> Option<Job> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.jobs.get(&id).map(|(_, job)| job.clone())
    }

    pub fn session(&self, id: SessionId) -> Option<Session> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.sessions.get(&id).cloned()
    }

    /// Rewrites a job in place, e.g. to simulate a crashed cycle.
    pub fn update_job(&self, id: JobId, f: impl FnOnce(&mut Job)) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if let Some((_, job)) = state.jobs.get_mut(&id) {
            f(job);
        }
    }

    /// Backdates a session to exercise age-based completion rules.
    pub fn set_session_started_at(&self, id: SessionId, started_at: DateTime<Utc>) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if let Some(session) = state.sessions.get_mut(&id) {
            session.started_at = started_at;
        }
    }

    fn with_job<T>(
        &self,
        id: JobId,
        f: impl FnOnce(&mut Job) -> T,
    ) -> Result<T, QueueError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let (_, job) = state.jobs.get_mut(&id).ok_or(QueueError::JobNotFound(id))?;
        Ok(f(job))
    }

    fn session_jobs(&self, session_id: SessionId) -> Vec<Job> {
        self.jobs()
            .into_iter()
            .filter(|j| j.session_id == Some(session_id))
            .collect()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert_job(&self, new_job: NewJob) -> Result<Job, QueueError> {
        new_job.payload.validate()?;
        let job_type = new_job.job_type();
        let natural_key = new_job.natural_key();

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let duplicate = state
            .jobs
            .values()
            .any(|(_, j)| j.job_type == job_type && j.natural_key == natural_key);
        if duplicate {
            return Err(QueueError::Duplicate {
                job_type,
                natural_key,
            });
        }

        let job = new_job.into_job(Utc::now());
        let seq = state.next_seq;
        state.next_seq += 1;
        state.jobs.insert(job.id, (seq, job.clone()));
        Ok(job)
    }

    async fn find_job(&self, id: JobId) -> Result<Option<Job>, QueueError> {
        Ok(self.job(id))
    }

    async fn find_job_by_key(
        &self,
        job_type: JobType,
        natural_key: &str,
    ) -> Result<Option<Job>, QueueError> {
        Ok(self
            .jobs()
            .into_iter()
            .find(|j| j.job_type == job_type && j.natural_key == natural_key))
    }

    async fn pending_batch(&self, job_type: JobType, limit: i64) -> Result<Vec<Job>, QueueError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let mut pending: Vec<&(u64, Job)> = state
            .jobs
            .values()
            .filter(|(_, j)| {
                j.job_type == job_type
                    && j.status == JobStatus::Pending
                    && j.retry_count < j.max_retries
            })
            .collect();
        // Insertion sequence stands in for created_at ties.
        pending.sort_by(|(a_seq, a), (b_seq, b)| {
            a.priority
                .cmp(&b.priority)
                .then(b.created_at.cmp(&a.created_at))
                .then(b_seq.cmp(a_seq))
        });
        Ok(pending
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|(_, j)| j.clone())
            .collect())
    }

    async fn mark_processing(&self, id: JobId) -> Result<bool, QueueError> {
        self.with_job(id, |job| {
            if job.status != JobStatus::Pending {
                return false;
            }
            let now = Utc::now();
            job.status = JobStatus::Processing;
            job.started_at = Some(now);
            job.updated_at = now;
            true
        })
    }

    async fn mark_completed(&self, id: JobId) -> Result<(), QueueError> {
        self.with_job(id, |job| {
            let now = Utc::now();
            job.status = JobStatus::Completed;
            job.completed_at = Some(now);
            job.error_message = None;
            job.error_kind = None;
            job.updated_at = now;
        })
    }

    async fn record_failure(
        &self,
        id: JobId,
        message: &str,
        kind: ErrorKind,
    ) -> Result<Job, QueueError> {
        self.with_job(id, |job| {
            job.apply_failure(message, kind, Utc::now());
            job.clone()
        })
    }

    async fn count_pending(&self, job_type: JobType) -> Result<i64, QueueError> {
        Ok(self
            .jobs()
            .iter()
            .filter(|j| {
                j.job_type == job_type
                    && j.status == JobStatus::Pending
                    && j.retry_count < j.max_retries
            })
            .count() as i64)
    }

    async fn session_job_counts(&self, session_id: SessionId) -> Result<JobCounts, QueueError> {
        let mut counts = JobCounts::default();
        for job in self.session_jobs(session_id) {
            counts.total += 1;
            match job.status {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }

    async fn processing_types_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<JobType>, QueueError> {
        let mut types: Vec<JobType> = self
            .session_jobs(session_id)
            .into_iter()
            .filter(|j| j.status == JobStatus::Processing)
            .map(|j| j.job_type)
            .collect();
        types.sort();
        types.dedup();
        Ok(types)
    }

    async fn failed_job_messages(&self, session_id: SessionId) -> Result<Vec<String>, QueueError> {
        Ok(self
            .session_jobs(session_id)
            .into_iter()
            .filter(|j| j.status == JobStatus::Failed)
            .map(|j| {
                format!(
                    "{}: {}",
                    j.job_type,
                    j.error_message.as_deref().unwrap_or("unknown error")
                )
            })
            .collect())
    }

    async fn retry_failed_jobs(
        &self,
        session_id: SessionId,
        user_id: UserId,
    ) -> Result<u64, QueueError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let failed = state
            .jobs
            .values()
            .filter(|(_, j)| j.session_id == Some(session_id) && j.status == JobStatus::Failed)
            .count() as u64;
        if failed == 0 {
            return Ok(0);
        }

        let reopen = state
            .sessions
            .get(&session_id)
            .is_some_and(|s| s.status == SessionStatus::Completed);
        if reopen {
            let other_active = state
                .sessions
                .values()
                .any(|s| s.user_id == user_id && s.id != session_id && s.is_active());
            if other_active {
                return Err(QueueError::ActiveSessionExists(user_id));
            }
        }

        let now = Utc::now();
        for (_, job) in state.jobs.values_mut() {
            if job.session_id == Some(session_id) && job.status == JobStatus::Failed {
                job.status = JobStatus::Pending;
                job.retry_count = 0;
                job.error_message = None;
                job.error_kind = None;
                job.started_at = None;
                job.completed_at = None;
                job.updated_at = now;
            }
        }
        if reopen {
            if let Some(session) = state.sessions.get_mut(&session_id) {
                session.status = SessionStatus::Active;
                session.completed_at = None;
                session.error_summary.clear();
                session.updated_at = now;
            }
        }
        Ok(failed)
    }

    async fn requeue_stale_processing(&self, lease: Duration) -> Result<Vec<Job>, QueueError> {
        let cutoff = Utc::now() - chrono::Duration::from_std(lease).unwrap_or_else(|_| chrono::Duration::zero());
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let mut requeued = Vec::new();
        for (_, job) in state.jobs.values_mut() {
            let stale = job.status == JobStatus::Processing
                && job.started_at.is_some_and(|started| started < cutoff);
            if stale {
                job.apply_failure("processing lease expired", ErrorKind::Retryable, Utc::now());
                job.started_at = None;
                requeued.push(job.clone());
            }
        }
        Ok(requeued)
    }

    async fn queue_stats(&self) -> Result<Vec<QueueStats>, QueueError> {
        let jobs = self.jobs();
        let mut stats = Vec::new();
        for job_type in JobType::PIPELINE_ORDER {
            let of_type: Vec<&Job> = jobs.iter().filter(|j| j.job_type == job_type).collect();
            if of_type.is_empty() {
                continue;
            }
            let count = |status: JobStatus| of_type.iter().filter(|j| j.status == status).count() as i64;
            stats.push(QueueStats {
                job_type,
                pending: count(JobStatus::Pending),
                processing: count(JobStatus::Processing),
                completed: count(JobStatus::Completed),
                failed: count(JobStatus::Failed),
            });
        }
        Ok(stats)
    }

    async fn insert_session(&self, session: Session) -> Result<Session, QueueError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let active_exists = state
            .sessions
            .values()
            .any(|s| s.user_id == session.user_id && s.is_active());
        if active_exists {
            return Err(QueueError::ActiveSessionExists(session.user_id));
        }
        state.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_session(&self, id: SessionId) -> Result<Option<Session>, QueueError> {
        Ok(self.session(id))
    }

    async fn active_session(&self, user_id: UserId) -> Result<Option<Session>, QueueError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .sessions
            .values()
            .find(|s| s.user_id == user_id && s.is_active())
            .cloned())
    }

    async fn latest_session(&self, user_id: UserId) -> Result<Option<Session>, QueueError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .max_by_key(|s| (s.started_at, s.id))
            .cloned())
    }

    async fn update_session_progress(
        &self,
        id: SessionId,
        total_jobs: i32,
        completed_jobs: i32,
        failed_jobs: i32,
    ) -> Result<(), QueueError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let session = state
            .sessions
            .get_mut(&id)
            .ok_or(QueueError::SessionNotFound(id))?;
        session.total_jobs = total_jobs;
        session.completed_jobs = completed_jobs;
        session.failed_jobs = failed_jobs;
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn complete_session(&self, id: SessionId, errors: &[String]) -> Result<bool, QueueError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let session = state
            .sessions
            .get_mut(&id)
            .ok_or(QueueError::SessionNotFound(id))?;
        if session.status != SessionStatus::Active {
            return Ok(false);
        }
        let now = Utc::now();
        session.status = SessionStatus::Completed;
        session.error_summary = errors.to_vec();
        session.completed_at = Some(now);
        session.updated_at = now;
        Ok(true)
    }
}
