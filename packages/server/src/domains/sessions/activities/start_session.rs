use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::common::{CreatorId, UserId};
use crate::kernel::jobs::{FetchPayload, JobPayload, QueueError, Session, SessionProgress};
use crate::kernel::ServerDeps;

/// Fetch jobs all run at the same priority.
const FETCH_PRIORITY: i32 = 0;

#[derive(Debug, Clone, Serialize)]
pub struct StartedSession {
    pub session: Session,
    pub jobs_enqueued: usize,
    pub progress: SessionProgress,
}

/// Opens a session for `user_id` and queues one fetch job per creator.
///
/// Without explicit `creator_ids` the user's follow list is used. A session
/// with no creators completes immediately.
pub async fn start_session(
    user_id: UserId,
    creator_ids: Option<Vec<CreatorId>>,
    deps: &ServerDeps,
) -> Result<StartedSession> {
    if deps.queue.get_active_session(user_id).await?.is_some() {
        return Err(QueueError::ActiveSessionExists(user_id).into());
    }

    let creators = match creator_ids {
        Some(ids) if !ids.is_empty() => deps.store.find_creators(&ids).await?,
        _ => deps.store.followed_creators(user_id).await?,
    };

    let session = deps
        .queue
        .create_session(user_id, creators.len() as i32)
        .await?;

    let mut jobs_enqueued = 0;
    for creator in &creators {
        let result = deps
            .queue
            .enqueue_idempotent(
                user_id,
                Some(session.id),
                JobPayload::Fetch(FetchPayload {
                    creator: creator.descriptor(),
                }),
                FETCH_PRIORITY,
            )
            .await?;
        if result.is_created() {
            jobs_enqueued += 1;
        }
    }

    let progress = deps.progress().refresh_session(session.clone()).await?;

    info!(
        session_id = %session.id,
        user_id = %user_id,
        creators = creators.len(),
        jobs_enqueued,
        "Pipeline session started"
    );

    Ok(StartedSession {
        session,
        jobs_enqueued,
        progress,
    })
}
