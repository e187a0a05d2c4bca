//! Async reconciliation: poll provider-side transcription jobs and re-enter
//! the pipeline when they finish.

use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use super::enqueue_summary;
use super::transcribe_content::NO_TRANSCRIPT;
use crate::domains::transcripts::Transcript;
use crate::kernel::{AsyncTranscriptState, ServerDeps};

/// Priority of summaries queued by reconciliation.
const RECONCILED_SUMMARY_PRIORITY: i32 = 5;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub checked: usize,
    pub completed: usize,
    pub failed: usize,
    pub still_pending: usize,
    pub summaries_enqueued: usize,
    pub errors: Vec<String>,
}

/// Polls up to `reconcile_batch_size` pending transcripts, stopping early
/// once `budget` is spent. Transcripts left unpolled stay pending, and a
/// poll that leaves one pending moves it behind the others.
pub async fn reconcile_async_transcripts(
    deps: &ServerDeps,
    budget: Option<Duration>,
) -> anyhow::Result<ReconcileReport> {
    let started = Instant::now();
    let pending = deps
        .store
        .pending_async_transcripts(deps.config.reconcile_batch_size)
        .await?;
    let mut report = ReconcileReport::default();

    for transcript in pending {
        if budget.is_some_and(|budget| started.elapsed() >= budget) {
            break;
        }
        let Some(handle) = transcript.async_handle.clone() else {
            continue;
        };
        report.checked += 1;

        match deps.transcriber.poll(&handle).await {
            Ok(AsyncTranscriptState::InProgress) => {
                deps.store.mark_transcript_polled(transcript.content_id).await?;
                report.still_pending += 1;
            }
            Ok(AsyncTranscriptState::Completed { text, .. }) if text.trim().is_empty() => {
                mark_failed(deps, &transcript, NO_TRANSCRIPT).await?;
                report.failed += 1;
            }
            Ok(AsyncTranscriptState::Completed {
                text,
                aux_format,
                language,
            }) => {
                let completed = deps
                    .store
                    .upsert_transcript(Transcript::completed(
                        transcript.content_id,
                        transcript.user_id,
                        transcript.session_id,
                        text,
                        aux_format,
                        language,
                    ))
                    .await?;
                report.completed += 1;

                let result = enqueue_summary(
                    deps,
                    completed.user_id,
                    completed.session_id,
                    completed.content_id,
                    completed.text.as_deref().unwrap_or_default(),
                    RECONCILED_SUMMARY_PRIORITY,
                )
                .await?;
                if result.is_created() {
                    report.summaries_enqueued += 1;
                }
            }
            Ok(AsyncTranscriptState::Failed(reason)) => {
                mark_failed(deps, &transcript, &reason).await?;
                report.failed += 1;
            }
            Err(e) => {
                warn!(
                    content_id = %transcript.content_id,
                    handle = %handle,
                    error = %e,
                    "Async transcript poll failed"
                );
                deps.store.mark_transcript_polled(transcript.content_id).await?;
                report.still_pending += 1;
                report.errors.push(format!("{}: {}", transcript.content_id, e));
            }
        }
    }

    info!(
        checked = report.checked,
        completed = report.completed,
        failed = report.failed,
        still_pending = report.still_pending,
        summaries_enqueued = report.summaries_enqueued,
        "Async transcript reconciliation finished"
    );
    Ok(report)
}

async fn mark_failed(deps: &ServerDeps, transcript: &Transcript, reason: &str) -> anyhow::Result<()> {
    deps.store
        .upsert_transcript(Transcript::failed(
            transcript.content_id,
            transcript.user_id,
            transcript.session_id,
            reason,
        ))
        .await?;
    Ok(())
}
