use anyhow::Result;

use crate::common::SessionId;
use crate::kernel::jobs::QueueError;
use crate::kernel::ServerDeps;

/// Gives a session's terminally failed jobs fresh attempts. Returns how many
/// jobs were re-queued.
pub async fn retry_failed_jobs(session_id: SessionId, deps: &ServerDeps) -> Result<u64> {
    let session = deps
        .queue
        .find_session(session_id)
        .await?
        .ok_or(QueueError::SessionNotFound(session_id))?;
    let reset = deps.queue.retry_failed(&session).await?;
    Ok(reset)
}
