//! Stage executor: runs one job under a timeout and records the outcome.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::{Job, JobStatus, JobType, QueueError, QueueManager};
use crate::common::JobId;

/// Why a stage body failed.
#[derive(Debug, Clone, Error)]
pub enum StageError {
    /// Network errors, rate limits, provider 5xx. Retried while attempts remain.
    #[error("{0}")]
    Transient(String),
    /// Inputs the provider will never accept. Not retried.
    #[error("{0}")]
    Permanent(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl StageError {
    pub fn transient(msg: impl Into<String>) -> Self {
        StageError::Transient(msg.into())
    }

    pub fn permanent(msg: impl Into<String>) -> Self {
        StageError::Permanent(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, StageError::Permanent(_))
    }
}

impl From<QueueError> for StageError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::InvalidPayload(msg) => StageError::Permanent(msg),
            other => StageError::Transient(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for StageError {
    fn from(err: anyhow::Error) -> Self {
        StageError::Transient(format!("{:#}", err))
    }
}

/// What a successful stage body did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageOutcome {
    /// Items the stage handled (fetched items, transcripts, summaries).
    pub items: usize,
    /// Follow-on jobs created.
    pub enqueued: usize,
    /// Terminal per-item note such as "no transcript produced".
    pub note: Option<String>,
}

impl StageOutcome {
    pub fn new(items: usize, enqueued: usize) -> Self {
        Self {
            items,
            enqueued,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Executes the body of one stage. Implemented by the domain layer.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<StageOutcome, StageError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed(StageOutcome),
    /// Another cycle claimed the job first.
    Skipped,
}

/// A failed attempt, already recorded in the queue.
#[derive(Debug, Clone, Error)]
#[error("{job_type} job {job_id} failed: {error}")]
pub struct JobFailure {
    pub job_id: JobId,
    pub job_type: JobType,
    pub error: StageError,
    /// True when the job went back to `pending`.
    pub will_retry: bool,
}

#[derive(Clone)]
pub struct JobProcessor {
    queue: QueueManager,
    handler: Arc<dyn JobHandler>,
}

impl JobProcessor {
    pub fn new(queue: QueueManager, handler: Arc<dyn JobHandler>) -> Self {
        Self { queue, handler }
    }

    pub fn queue(&self) -> &QueueManager {
        &self.queue
    }

    /// Marks the job processing, races the stage body against `timeout`,
    /// then records completion or a failed attempt.
    ///
    /// A timeout is recorded like any other retryable failure. The failure
    /// is returned to the caller after it has been written to the queue.
    pub async fn run_with_timeout(
        &self,
        job: &Job,
        timeout: Duration,
    ) -> Result<JobOutcome, JobFailure> {
        let claimed = self
            .queue
            .mark_processing(job.id)
            .await
            .map_err(|e| self.failure(job, StageError::from(e), false))?;
        if !claimed {
            debug!(job_id = %job.id, job_type = %job.job_type, "Job already claimed, skipping");
            return Ok(JobOutcome::Skipped);
        }

        let result = match tokio::time::timeout(timeout, self.handler.handle(job)).await {
            Ok(result) => result,
            Err(_) => Err(StageError::Timeout(timeout)),
        };

        match result {
            Ok(outcome) => {
                self.queue
                    .mark_completed(job.id)
                    .await
                    .map_err(|e| self.failure(job, StageError::from(e), false))?;
                debug!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    items = outcome.items,
                    enqueued = outcome.enqueued,
                    "Job completed"
                );
                Ok(JobOutcome::Completed(outcome))
            }
            Err(error) => {
                let will_retry = match self
                    .queue
                    .mark_failed(job.id, &error.to_string(), error.is_retryable())
                    .await
                {
                    Ok(updated) => updated.status == JobStatus::Pending,
                    Err(e) => {
                        warn!(job_id = %job.id, error = %e, "Failed to record job failure");
                        false
                    }
                };
                Err(self.failure(job, error, will_retry))
            }
        }
    }

    fn failure(&self, job: &Job, error: StageError, will_retry: bool) -> JobFailure {
        JobFailure {
            job_id: job.id,
            job_type: job.job_type,
            error,
            will_retry,
        }
    }
}
