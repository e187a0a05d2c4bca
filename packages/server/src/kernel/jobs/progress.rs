//! Session progress for polling clients.
//!
//! Counters are recomputed from the jobs that reference a session, and the
//! completion rules are applied every time progress is refreshed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::info;

use super::{JobCounts, JobType, QueueError, QueueManager, Session, SessionStatus};
use crate::common::{SessionId, UserId};

/// Most failure messages kept on a completed session.
const MAX_ERROR_SUMMARY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Fetch,
    Transcribe,
    Summarize,
    Completed,
}

impl From<JobType> for Phase {
    fn from(job_type: JobType) -> Self {
        match job_type {
            JobType::Fetch => Phase::Fetch,
            JobType::Transcribe => Phase::Transcribe,
            JobType::Summarize => Phase::Summarize,
        }
    }
}

/// Why a session was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    AllJobsResolved,
    NoJobs,
    Stale,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionProgress {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub status: SessionStatus,
    pub total_jobs: i32,
    pub completed_jobs: i32,
    pub failed_jobs: i32,
    pub pending_jobs: i64,
    /// Sampled from in-flight jobs; may move between polls.
    pub current_phase: Phase,
    pub percent: u8,
    pub error_summary: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// True only on the refresh that closed the session.
    pub just_completed: bool,
}

/// Decides whether an active session should be closed.
pub fn completion_reason(
    total_jobs: i32,
    counts: &JobCounts,
    age: Duration,
    empty_session_grace: Duration,
    stale_session_after: Duration,
) -> Option<CompletionReason> {
    let resolved = counts.completed + counts.failed;
    if total_jobs == 0 {
        return Some(CompletionReason::NoJobs);
    }
    if resolved >= i64::from(total_jobs) {
        return Some(CompletionReason::AllJobsResolved);
    }
    if counts.total == 0 && age > empty_session_grace {
        return Some(CompletionReason::NoJobs);
    }
    if age > stale_session_after && counts.pending == 0 {
        return Some(CompletionReason::Stale);
    }
    None
}

fn percent(resolved: i32, total: i32) -> u8 {
    if total <= 0 {
        return 100;
    }
    ((i64::from(resolved) * 100) / i64::from(total)).clamp(0, 100) as u8
}

#[derive(Clone)]
pub struct ProgressAggregator {
    queue: QueueManager,
    stale_session_after: Duration,
    empty_session_grace: Duration,
}

impl ProgressAggregator {
    pub fn new(
        queue: QueueManager,
        stale_session_after: Duration,
        empty_session_grace: Duration,
    ) -> Self {
        Self {
            queue,
            stale_session_after,
            empty_session_grace,
        }
    }

    /// Progress of the user's active session, or a snapshot of the most
    /// recent one when none is active.
    pub async fn progress_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<SessionProgress>, QueueError> {
        if let Some(progress) = self.refresh_user(user_id).await? {
            return Ok(Some(progress));
        }
        let latest = self.queue.latest_session(user_id).await?;
        Ok(latest.map(|session| self.snapshot(&session, 0)))
    }

    /// Refreshes the user's active session, if any.
    pub async fn refresh_user(&self, user_id: UserId) -> Result<Option<SessionProgress>, QueueError> {
        match self.queue.get_active_session(user_id).await? {
            Some(session) => Ok(Some(self.refresh_session(session).await?)),
            None => Ok(None),
        }
    }

    /// Recomputes counters from job state and closes the session when a
    /// completion rule holds.
    pub async fn refresh_session(&self, session: Session) -> Result<SessionProgress, QueueError> {
        if !session.is_active() {
            return Ok(self.snapshot(&session, 0));
        }

        let counts = self.queue.session_job_counts(session.id).await?;
        let total_jobs = session.total_jobs.max(counts.total as i32);
        let completed_jobs = counts.completed as i32;
        let failed_jobs = counts.failed as i32;
        self.queue
            .update_session_progress(session.id, total_jobs, completed_jobs, failed_jobs)
            .await?;

        let age = (Utc::now() - session.started_at).to_std().unwrap_or_default();
        let reason = completion_reason(
            total_jobs,
            &counts,
            age,
            self.empty_session_grace,
            self.stale_session_after,
        );

        let mut progress = SessionProgress {
            session_id: session.id,
            user_id: session.user_id,
            status: SessionStatus::Active,
            total_jobs: total_jobs.max(completed_jobs + failed_jobs),
            completed_jobs,
            failed_jobs,
            pending_jobs: counts.pending,
            current_phase: Phase::Completed,
            percent: percent(completed_jobs + failed_jobs, total_jobs),
            error_summary: Vec::new(),
            started_at: session.started_at,
            completed_at: None,
            just_completed: false,
        };

        match reason {
            Some(reason) => {
                let mut errors = self.queue.failed_job_messages(session.id).await?;
                errors.truncate(MAX_ERROR_SUMMARY);
                let just_completed = self.queue.complete_session(session.id, &errors).await?;
                if just_completed {
                    info!(
                        session_id = %session.id,
                        reason = ?reason,
                        completed_jobs,
                        failed_jobs,
                        "Session finished"
                    );
                }
                progress.status = SessionStatus::Completed;
                progress.percent = 100;
                progress.error_summary = errors;
                progress.completed_at = Some(Utc::now());
                progress.just_completed = just_completed;
            }
            None => {
                let processing = self.queue.processing_types(session.id).await?;
                progress.current_phase = processing
                    .into_iter()
                    .min()
                    .map(Phase::from)
                    .unwrap_or(Phase::Completed);
            }
        }

        Ok(progress)
    }

    fn snapshot(&self, session: &Session, pending_jobs: i64) -> SessionProgress {
        let active = session.is_active();
        SessionProgress {
            session_id: session.id,
            user_id: session.user_id,
            status: session.status,
            total_jobs: session.total_jobs,
            completed_jobs: session.completed_jobs,
            failed_jobs: session.failed_jobs,
            pending_jobs,
            current_phase: Phase::Completed,
            percent: if active {
                percent(session.resolved_jobs(), session.total_jobs)
            } else {
                100
            },
            error_summary: session.error_summary.clone(),
            started_at: session.started_at,
            completed_at: session.completed_at,
            just_completed: false,
        }
    }
}
