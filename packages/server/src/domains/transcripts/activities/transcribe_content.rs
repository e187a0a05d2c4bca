//! Transcribe stage.
//!
//! A synchronous reply completes the transcript and queues the summary. An
//! async handle parks the transcript as `pending_async`; reconciliation
//! picks it up later. Empty text is a terminal outcome for the item, not a
//! job failure.

use tracing::{debug, info};

use super::enqueue_summary;
use crate::domains::transcripts::{Transcript, TranscriptStatus};
use crate::kernel::jobs::{Job, StageError, StageOutcome, TranscribePayload};
use crate::kernel::{ServerDeps, TranscriptionReply};

pub const NO_TRANSCRIPT: &str = "no transcript produced";

pub async fn transcribe_content(
    job: &Job,
    payload: &TranscribePayload,
    deps: &ServerDeps,
) -> Result<StageOutcome, StageError> {
    let content_id = payload.content_id;

    // A retried or duplicated job must not pay for a second transcription.
    if let Some(existing) = deps.store.find_transcript(content_id).await? {
        if let Some(text) = existing.completed_text() {
            let result =
                enqueue_summary(deps, job.user_id, job.session_id, content_id, text, job.priority)
                    .await?;
            debug!(content_id = %content_id, "Transcript already present");
            return Ok(StageOutcome::new(1, usize::from(result.is_created())));
        }
        if existing.status == TranscriptStatus::PendingAsync {
            return Ok(StageOutcome::new(1, 0).with_note("transcript pending with provider"));
        }
    }

    let reply = deps.transcriber.transcribe(&payload.source_url).await?;

    match reply {
        TranscriptionReply::Ready { text, .. } if text.trim().is_empty() => {
            deps.store
                .upsert_transcript(Transcript::failed(
                    content_id,
                    job.user_id,
                    job.session_id,
                    NO_TRANSCRIPT,
                ))
                .await?;
            info!(content_id = %content_id, "No transcript produced");
            Ok(StageOutcome::new(1, 0).with_note(NO_TRANSCRIPT))
        }
        TranscriptionReply::Ready {
            text,
            aux_format,
            language,
        } => {
            let transcript = deps
                .store
                .upsert_transcript(Transcript::completed(
                    content_id,
                    job.user_id,
                    job.session_id,
                    text,
                    aux_format,
                    language,
                ))
                .await?;
            let text = transcript.text.as_deref().unwrap_or_default();
            let result =
                enqueue_summary(deps, job.user_id, job.session_id, content_id, text, job.priority)
                    .await?;
            info!(
                content_id = %content_id,
                chars = text.chars().count(),
                "Transcript completed"
            );
            Ok(StageOutcome::new(1, usize::from(result.is_created())))
        }
        TranscriptionReply::Pending { handle } => {
            deps.store
                .upsert_transcript(Transcript::pending_async(
                    content_id,
                    job.user_id,
                    job.session_id,
                    handle.clone(),
                ))
                .await?;
            info!(content_id = %content_id, handle = %handle, "Transcript deferred by provider");
            Ok(StageOutcome::new(1, 0).with_note("transcript pending with provider"))
        }
    }
}
