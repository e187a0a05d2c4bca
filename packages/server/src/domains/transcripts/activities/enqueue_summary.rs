use crate::common::{ContentId, SessionId, UserId};
use crate::kernel::jobs::{ContentMetadata, EnqueueResult, JobPayload, SummarizePayload};
use crate::kernel::ServerDeps;

/// Queues the summarize job for a finished transcript. A second call for
/// the same content is a no-op that returns [`EnqueueResult::Duplicate`].
pub async fn enqueue_summary(
    deps: &ServerDeps,
    user_id: UserId,
    session_id: Option<SessionId>,
    content_id: ContentId,
    transcript_text: &str,
    priority: i32,
) -> anyhow::Result<EnqueueResult> {
    let metadata = deps
        .store
        .find_content(content_id)
        .await?
        .map(|content| content.metadata())
        .unwrap_or_else(ContentMetadata::default);

    let payload = JobPayload::Summarize(SummarizePayload {
        content_id,
        transcript_text: transcript_text.to_string(),
        metadata,
    });

    let result = deps
        .queue
        .enqueue_idempotent(user_id, session_id, payload, priority)
        .await?;
    Ok(result)
}
