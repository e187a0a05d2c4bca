use thiserror::Error;

use super::JobType;
use crate::common::{JobId, SessionId, UserId};

/// Errors raised by the queue layer.
#[derive(Debug, Error)]
pub enum QueueError {
    /// A job with the same natural key already exists. Expected under
    /// concurrent fan-in; callers treat it as success.
    #[error("duplicate {job_type} job for key {natural_key}")]
    Duplicate {
        job_type: JobType,
        natural_key: String,
    },

    #[error("user {0} already has an active session")]
    ActiveSessionExists(UserId),

    #[error("job {0} not found")]
    JobNotFound(JobId),

    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("invalid job payload: {0}")]
    InvalidPayload(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl QueueError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, QueueError::Duplicate { .. })
    }
}

/// Name of the unique index guarding job natural keys.
pub(crate) const JOB_NATURAL_KEY_CONSTRAINT: &str = "pipeline_jobs_natural_key_idx";

/// Name of the partial unique index allowing one active session per user.
pub(crate) const ACTIVE_SESSION_CONSTRAINT: &str = "pipeline_sessions_one_active_idx";

/// Returns the violated constraint name when `err` is a unique violation.
pub(crate) fn unique_violation(err: &sqlx::Error) -> Option<String> {
    let db_err = err.as_database_error()?;
    if db_err.code().as_deref() == Some("23505") {
        Some(db_err.constraint().unwrap_or_default().to_string())
    } else {
        None
    }
}
