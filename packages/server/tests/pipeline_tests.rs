//! End-to-end drain cycles over the in-memory stores.
//!
//! Each test wires mocks for the three providers, starts a session the way
//! the HTTP surface does, and drives `DrainScheduler::run_cycle` by hand.

mod common;

use std::time::Duration;

use chrono::Utc;
use digest_core::common::UserId;
use digest_core::domains::creators::UserPreferences;
use digest_core::domains::sessions::{retry_failed_jobs, start_session};
use digest_core::domains::transcripts::activities::{enqueue_summary, reconcile_async_transcripts};
use digest_core::domains::transcripts::TranscriptStatus;
use digest_core::kernel::jobs::{
    ErrorKind, JobStatus, JobType, Phase, QueueError, SessionStatus,
};
use digest_core::kernel::test_dependencies::{
    source_item, MockAI, MockContentSource, MockTranscriber,
};
use digest_core::kernel::{AsyncTranscriptState, ProviderError, TestDependencies, TranscriptionReply};
use digest_core::{ExecutionMode, PipelineConfig, StageConfig};

use crate::common::{items, Pipeline};

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn session_drains_through_all_stages_in_one_cycle() {
    let mocks = TestDependencies::new()
        .mock_content_source(MockContentSource::new().with_items("baker", items("bread", 2)));
    let pipeline = Pipeline::new(mocks);
    let user = UserId::new();
    pipeline.follow(user, "baker");

    let started = start_session(user, None, &pipeline.deps).await.unwrap();
    assert_eq!(started.session.total_jobs, 1);
    assert_eq!(started.jobs_enqueued, 1);

    let report = pipeline.scheduler.run_cycle().await.unwrap();

    assert_eq!(report.stages[&JobType::Fetch].succeeded, 1);
    assert_eq!(report.stages[&JobType::Transcribe].succeeded, 2);
    assert_eq!(report.stages[&JobType::Summarize].succeeded, 2);
    assert_eq!(report.failed, 0);
    assert!(!report.needs_more);
    assert!(!report.continuation_scheduled);
    assert_eq!(report.sessions_completed, vec![started.session.id]);

    assert_eq!(pipeline.mocks.store.summaries().len(), 2);
    assert!(pipeline.mocks.store.summaries().iter().all(|s| !s.is_fallback));

    let progress = pipeline
        .deps
        .progress()
        .progress_for_user(user)
        .await
        .unwrap()
        .expect("latest session");
    assert_eq!(progress.status, SessionStatus::Completed);
    assert_eq!(progress.total_jobs, 5);
    assert_eq!(progress.completed_jobs, 5);
    assert_eq!(progress.percent, 100);
    assert_eq!(progress.current_phase, Phase::Completed);
}

#[tokio::test]
async fn zero_creator_session_completes_immediately() {
    let pipeline = Pipeline::new(TestDependencies::new());
    let user = UserId::new();

    let started = start_session(user, None, &pipeline.deps).await.unwrap();

    assert_eq!(started.session.total_jobs, 0);
    assert_eq!(started.jobs_enqueued, 0);
    assert_eq!(started.progress.status, SessionStatus::Completed);
    assert!(started.progress.just_completed);
    assert!(pipeline.deps.queue.get_active_session(user).await.unwrap().is_none());
}

#[tokio::test]
async fn second_active_session_for_user_is_rejected() {
    let mocks = TestDependencies::new()
        .mock_content_source(MockContentSource::new().with_items("baker", items("bread", 1)));
    let pipeline = Pipeline::new(mocks);
    let user = UserId::new();
    pipeline.follow(user, "baker");

    start_session(user, None, &pipeline.deps).await.unwrap();
    let err = start_session(user, None, &pipeline.deps).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<QueueError>(),
        Some(QueueError::ActiveSessionExists(u)) if *u == user
    ));
}

#[tokio::test]
async fn refetching_known_items_does_not_duplicate_content_or_transcripts() {
    let mocks = TestDependencies::new()
        .mock_content_source(MockContentSource::new().with_items("baker", items("bread", 2)));
    let pipeline = Pipeline::new(mocks);
    let user = UserId::new();
    pipeline.follow(user, "baker");

    start_session(user, None, &pipeline.deps).await.unwrap();
    pipeline.scheduler.run_cycle().await.unwrap();

    // A new session fetches the same creator again.
    start_session(user, None, &pipeline.deps).await.unwrap();
    let report = pipeline.scheduler.run_cycle().await.unwrap();

    assert_eq!(report.stages[&JobType::Fetch].succeeded, 1);
    assert!(!report.stages.contains_key(&JobType::Transcribe));
    assert_eq!(pipeline.mocks.store.content().len(), 2);
    assert_eq!(pipeline.mocks.jobs.jobs_by_type(JobType::Fetch).len(), 2);
    assert_eq!(pipeline.mocks.jobs.jobs_by_type(JobType::Transcribe).len(), 2);
    assert_eq!(pipeline.mocks.transcriber.calls().len(), 2);
}

// =============================================================================
// Continuation
// =============================================================================

#[tokio::test]
async fn continuation_is_requested_only_while_work_remains() {
    let mocks = TestDependencies::new()
        .mock_content_source(MockContentSource::new().with_items("baker", items("bread", 12)));
    let pipeline = Pipeline::new(mocks);
    let user = UserId::new();
    pipeline.follow(user, "baker");
    pipeline
        .mocks
        .store
        .set_preferences(UserPreferences::defaults(user, 7, 20));

    start_session(user, None, &pipeline.deps).await.unwrap();

    let first = pipeline.scheduler.run_cycle().await.unwrap();
    assert_eq!(first.stages[&JobType::Transcribe].succeeded, 10);
    assert!(first.needs_more);
    assert!(first.continuation_scheduled);
    assert_eq!(pipeline.continuation.scheduled(), vec![Duration::from_secs(2)]);

    let second = pipeline.scheduler.run_cycle().await.unwrap();
    assert_eq!(second.stages[&JobType::Transcribe].succeeded, 2);
    assert_eq!(second.stages[&JobType::Summarize].succeeded, 2);
    assert!(!second.needs_more);
    assert!(!second.continuation_scheduled);
    assert_eq!(pipeline.continuation.scheduled().len(), 1);
    assert_eq!(pipeline.mocks.store.summaries().len(), 12);
}

#[tokio::test]
async fn idle_queue_does_not_rearm() {
    let pipeline = Pipeline::new(TestDependencies::new());

    let report = pipeline.scheduler.run_cycle().await.unwrap();

    assert_eq!(report.processed, 0);
    assert!(!report.needs_more);
    assert!(pipeline.continuation.scheduled().is_empty());
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn transient_fetch_failures_exhaust_retries_then_close_session() {
    let mocks = TestDependencies::new().mock_content_source(
        MockContentSource::new()
            .with_error("baker", ProviderError::Transient("upstream 503".to_string())),
    );
    let pipeline = Pipeline::new(mocks);
    let user = UserId::new();
    pipeline.follow(user, "baker");
    let started = start_session(user, None, &pipeline.deps).await.unwrap();

    for attempt in 1..=3 {
        let report = pipeline.scheduler.run_cycle().await.unwrap();
        assert_eq!(report.failed, 1, "attempt {}", attempt);
    }

    let job = pipeline.mocks.jobs.jobs_by_type(JobType::Fetch).remove(0);
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.retry_count, job.max_retries);
    assert_eq!(job.error_kind, Some(ErrorKind::Retryable));

    let session = pipeline.mocks.jobs.session(started.session.id).unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.failed_jobs, 1);
    assert_eq!(session.error_summary.len(), 1);
    assert!(session.error_summary[0].starts_with("fetch:"));

    // Nothing left to do: a further cycle is a no-op.
    let idle = pipeline.scheduler.run_cycle().await.unwrap();
    assert_eq!(idle.processed, 0);
}

#[tokio::test]
async fn permanent_failure_is_terminal_on_first_attempt() {
    let mocks = TestDependencies::new().mock_content_source(
        MockContentSource::new()
            .with_error("baker", ProviderError::Permanent("account is private".to_string())),
    );
    let pipeline = Pipeline::new(mocks);
    let user = UserId::new();
    pipeline.follow(user, "baker");
    start_session(user, None, &pipeline.deps).await.unwrap();

    let report = pipeline.scheduler.run_cycle().await.unwrap();

    assert_eq!(report.failed, 1);
    assert!(!report.needs_more);
    let job = pipeline.mocks.jobs.jobs_by_type(JobType::Fetch).remove(0);
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_kind, Some(ErrorKind::NonRetryable));
    assert_eq!(job.retry_count, job.max_retries);
    assert_eq!(pipeline.mocks.content_source.calls().len(), 1);
}

#[tokio::test]
async fn retry_failed_reopens_session_and_finishes_work() {
    let mocks = TestDependencies::new().mock_content_source(
        MockContentSource::new()
            .with_items("baker", items("bread", 1))
            .with_error("baker", ProviderError::Permanent("account is private".to_string())),
    );
    let pipeline = Pipeline::new(mocks);
    let user = UserId::new();
    pipeline.follow(user, "baker");
    let started = start_session(user, None, &pipeline.deps).await.unwrap();
    pipeline.scheduler.run_cycle().await.unwrap();
    assert!(pipeline.deps.queue.get_active_session(user).await.unwrap().is_none());

    pipeline.mocks.content_source.clear_errors();
    let reset = retry_failed_jobs(started.session.id, &pipeline.deps)
        .await
        .unwrap();
    assert_eq!(reset, 1);

    let active = pipeline.deps.queue.get_active_session(user).await.unwrap();
    assert_eq!(active.map(|s| s.id), Some(started.session.id));

    let report = pipeline.scheduler.run_cycle().await.unwrap();
    assert_eq!(report.failed, 0);
    assert_eq!(report.sessions_completed, vec![started.session.id]);
    assert_eq!(pipeline.mocks.store.summaries().len(), 1);
}

#[tokio::test]
async fn retry_failed_leaves_jobs_alone_while_another_session_is_active() {
    let mocks = TestDependencies::new().mock_content_source(
        MockContentSource::new()
            .with_error("baker", ProviderError::Permanent("account is private".to_string())),
    );
    let pipeline = Pipeline::new(mocks);
    let user = UserId::new();
    pipeline.follow(user, "baker");
    let first = start_session(user, None, &pipeline.deps).await.unwrap();
    pipeline.scheduler.run_cycle().await.unwrap();
    let second = start_session(user, None, &pipeline.deps).await.unwrap();

    let err = retry_failed_jobs(first.session.id, &pipeline.deps)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<QueueError>(),
        Some(QueueError::ActiveSessionExists(u)) if *u == user
    ));

    let failed = pipeline
        .mocks
        .jobs
        .jobs_by_type(JobType::Fetch)
        .into_iter()
        .find(|j| j.session_id == Some(first.session.id))
        .unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.retry_count, failed.max_retries);
    assert!(failed.error_message.is_some());

    let first_session = pipeline.mocks.jobs.session(first.session.id).unwrap();
    assert_eq!(first_session.status, SessionStatus::Completed);
    let active = pipeline.deps.queue.get_active_session(user).await.unwrap();
    assert_eq!(active.map(|s| s.id), Some(second.session.id));
}

#[tokio::test(start_paused = true)]
async fn slow_summary_times_out_without_blocking_siblings() {
    let mocks = TestDependencies::new()
        .mock_content_source(MockContentSource::new().with_items(
            "baker",
            vec![
                source_item("fast-0", "quick clip"),
                source_item("slow-0", "quick clip"),
                source_item("fast-1", "quick clip"),
            ],
        ))
        .mock_ai(MockAI::new().with_delay_for("/v/slow-0", Duration::from_secs(120)));
    let pipeline = Pipeline::new(mocks);
    let user = UserId::new();
    pipeline.follow(user, "baker");
    start_session(user, None, &pipeline.deps).await.unwrap();

    let report = pipeline.scheduler.run_cycle().await.unwrap();

    let summarize = &report.stages[&JobType::Summarize];
    assert_eq!(summarize.succeeded, 2);
    assert_eq!(summarize.failed, 1);
    assert_eq!(pipeline.mocks.store.summaries().len(), 2);

    let slow = pipeline
        .mocks
        .jobs
        .jobs_by_type(JobType::Summarize)
        .into_iter()
        .find(|j| j.status != JobStatus::Completed)
        .expect("timed out job");
    assert_eq!(slow.status, JobStatus::Pending);
    assert_eq!(slow.retry_count, 1);
    assert_eq!(slow.error_kind, Some(ErrorKind::Retryable));

    assert!(report.needs_more);
    assert!(report.continuation_scheduled);
}

#[tokio::test]
async fn unparseable_reply_stores_truncated_fallback() {
    let raw = "x".repeat(600);
    let mocks = TestDependencies::new()
        .mock_content_source(MockContentSource::new().with_items("baker", items("bread", 1)))
        .mock_ai(MockAI::new().with_response(raw));
    let pipeline = Pipeline::new(mocks);
    let user = UserId::new();
    pipeline.follow(user, "baker");
    start_session(user, None, &pipeline.deps).await.unwrap();

    let report = pipeline.scheduler.run_cycle().await.unwrap();

    assert_eq!(report.stages[&JobType::Summarize].succeeded, 1);
    let summaries = pipeline.mocks.store.summaries();
    assert_eq!(summaries.len(), 1);
    assert!(summaries[0].is_fallback);
    assert_eq!(summaries[0].summary.chars().count(), 500);
    assert_eq!(summaries[0].sentiment, "neutral");
}

#[tokio::test]
async fn empty_transcript_completes_job_without_summary() {
    let mocks = TestDependencies::new()
        .mock_content_source(MockContentSource::new().with_items("baker", items("bread", 1)))
        .mock_transcriber(MockTranscriber::new().with_text("https://example.com/v/bread-0", "  "));
    let pipeline = Pipeline::new(mocks);
    let user = UserId::new();
    pipeline.follow(user, "baker");
    start_session(user, None, &pipeline.deps).await.unwrap();

    let report = pipeline.scheduler.run_cycle().await.unwrap();

    assert_eq!(report.failed, 0);
    assert!(pipeline.mocks.jobs.jobs_by_type(JobType::Summarize).is_empty());
    let content = pipeline.mocks.store.content().remove(0);
    let transcript = pipeline.mocks.store.transcript(content.id).unwrap();
    assert_eq!(transcript.status, TranscriptStatus::Failed);
}

// =============================================================================
// Recovery and reconciliation
// =============================================================================

#[tokio::test]
async fn job_stuck_in_processing_is_recovered_next_cycle() {
    let mocks = TestDependencies::new()
        .mock_content_source(MockContentSource::new().with_items("baker", items("bread", 1)));
    let pipeline = Pipeline::new(mocks);
    let user = UserId::new();
    pipeline.follow(user, "baker");
    start_session(user, None, &pipeline.deps).await.unwrap();

    let fetch = pipeline.mocks.jobs.jobs_by_type(JobType::Fetch).remove(0);
    pipeline.mocks.jobs.update_job(fetch.id, |job| {
        job.status = JobStatus::Processing;
        job.started_at = Some(Utc::now() - chrono::Duration::minutes(30));
    });

    let report = pipeline.scheduler.run_cycle().await.unwrap();

    assert_eq!(report.recovered, 1);
    assert_eq!(report.stages[&JobType::Fetch].succeeded, 1);
    let fetch = pipeline.mocks.jobs.job(fetch.id).unwrap();
    assert_eq!(fetch.status, JobStatus::Completed);
    assert_eq!(fetch.retry_count, 1);
}

#[tokio::test]
async fn async_transcript_is_reconciled_into_exactly_one_summary() {
    let url = "https://example.com/v/bread-0";
    let mocks = TestDependencies::new()
        .mock_content_source(MockContentSource::new().with_items("baker", items("bread", 1)))
        .mock_transcriber(
            MockTranscriber::new()
                .with_reply(
                    url,
                    TranscriptionReply::Pending {
                        handle: "job-42".to_string(),
                    },
                )
                .with_poll_states(
                    "job-42",
                    vec![
                        AsyncTranscriptState::InProgress,
                        AsyncTranscriptState::Completed {
                            text: "Fold the dough twice before proofing.".to_string(),
                            aux_format: None,
                            language: Some("en".to_string()),
                        },
                    ],
                ),
        );
    let pipeline = Pipeline::new(mocks);
    let user = UserId::new();
    pipeline.follow(user, "baker");
    let started = start_session(user, None, &pipeline.deps).await.unwrap();

    let report = pipeline.scheduler.run_cycle().await.unwrap();
    assert_eq!(report.stages[&JobType::Transcribe].succeeded, 1);
    assert!(pipeline.mocks.jobs.jobs_by_type(JobType::Summarize).is_empty());
    // Every job resolved, so the session closes before the summary exists.
    assert_eq!(report.sessions_completed, vec![started.session.id]);

    let first = reconcile_async_transcripts(&pipeline.deps, None).await.unwrap();
    assert_eq!(first.checked, 1);
    assert_eq!(first.still_pending, 1);
    assert_eq!(first.summaries_enqueued, 0);

    let second = reconcile_async_transcripts(&pipeline.deps, None).await.unwrap();
    assert_eq!(second.completed, 1);
    assert_eq!(second.summaries_enqueued, 1);

    let third = reconcile_async_transcripts(&pipeline.deps, None).await.unwrap();
    assert_eq!(third.checked, 0);

    // A late duplicate enqueue from any other path is absorbed.
    let content = pipeline.mocks.store.content().remove(0);
    let again = enqueue_summary(
        &pipeline.deps,
        user,
        Some(started.session.id),
        content.id,
        "Fold the dough twice before proofing.",
        5,
    )
    .await
    .unwrap();
    assert!(!again.is_created());

    let summarize_jobs = pipeline.mocks.jobs.jobs_by_type(JobType::Summarize);
    assert_eq!(summarize_jobs.len(), 1);
    assert_eq!(summarize_jobs[0].priority, 5);

    pipeline.scheduler.run_cycle().await.unwrap();
    let summary = pipeline.mocks.store.summary(content.id).expect("summary stored");
    assert!(!summary.is_fallback);
    assert_eq!(pipeline.mocks.transcriber.polls(), vec!["job-42", "job-42"]);
}

#[tokio::test]
async fn reconcile_marks_provider_failures() {
    let url = "https://example.com/v/bread-0";
    let mocks = TestDependencies::new()
        .mock_content_source(MockContentSource::new().with_items("baker", items("bread", 1)))
        .mock_transcriber(
            MockTranscriber::new()
                .with_reply(
                    url,
                    TranscriptionReply::Pending {
                        handle: "job-7".to_string(),
                    },
                )
                .with_poll_states(
                    "job-7",
                    vec![AsyncTranscriptState::Failed("media unavailable".to_string())],
                ),
        );
    let pipeline = Pipeline::new(mocks);
    let user = UserId::new();
    pipeline.follow(user, "baker");
    start_session(user, None, &pipeline.deps).await.unwrap();
    pipeline.scheduler.run_cycle().await.unwrap();

    let report = reconcile_async_transcripts(&pipeline.deps, None).await.unwrap();

    assert_eq!(report.failed, 1);
    let content = pipeline.mocks.store.content().remove(0);
    let transcript = pipeline.mocks.store.transcript(content.id).unwrap();
    assert_eq!(transcript.status, TranscriptStatus::Failed);
    assert!(pipeline.mocks.jobs.jobs_by_type(JobType::Summarize).is_empty());
}

#[tokio::test]
async fn reconcile_rotates_through_handles_beyond_the_batch_size() {
    let pending = |handle: &str| TranscriptionReply::Pending {
        handle: handle.to_string(),
    };
    let mocks = TestDependencies::new()
        .mock_content_source(MockContentSource::new().with_items("baker", items("bread", 2)))
        .mock_transcriber(
            MockTranscriber::new()
                .with_reply("https://example.com/v/bread-0", pending("job-a"))
                .with_reply("https://example.com/v/bread-1", pending("job-b"))
                .with_poll_states("job-a", vec![AsyncTranscriptState::InProgress])
                .with_poll_states("job-b", vec![AsyncTranscriptState::InProgress]),
        )
        .with_config(PipelineConfig::builder().reconcile_batch_size(1).build());
    let pipeline = Pipeline::new(mocks);
    let user = UserId::new();
    pipeline.follow(user, "baker");
    start_session(user, None, &pipeline.deps).await.unwrap();
    pipeline.scheduler.run_cycle().await.unwrap();

    for _ in 0..3 {
        let report = reconcile_async_transcripts(&pipeline.deps, None).await.unwrap();
        assert_eq!(report.checked, 1);
        assert_eq!(report.still_pending, 1);
    }

    let polls = pipeline.mocks.transcriber.polls();
    assert_eq!(polls.len(), 3);
    assert!(polls.contains(&"job-a".to_string()));
    assert!(polls.contains(&"job-b".to_string()));
    assert_ne!(polls[0], polls[1]);
    assert_eq!(polls[0], polls[2]);
}

#[tokio::test]
async fn explicit_creator_list_overrides_follows() {
    let mocks = TestDependencies::new().mock_content_source(
        MockContentSource::new()
            .with_items("baker", items("bread", 1))
            .with_items("potter", items("clay", 1)),
    );
    let pipeline = Pipeline::new(mocks);
    let user = UserId::new();
    pipeline.follow(user, "baker");
    let potter = pipeline.follow(UserId::new(), "potter");

    let started = start_session(user, Some(vec![potter.id]), &pipeline.deps)
        .await
        .unwrap();
    pipeline.scheduler.run_cycle().await.unwrap();

    assert_eq!(started.session.total_jobs, 1);
    assert_eq!(pipeline.mocks.content_source.calls(), vec!["potter"]);
}

#[tokio::test]
async fn short_budget_leaves_work_pending() {
    let config = PipelineConfig::builder()
        .cycle_budget(Duration::from_secs(5))
        .safety_margin(Duration::from_secs(5))
        .build();
    let mocks = TestDependencies::new()
        .mock_content_source(MockContentSource::new().with_items("baker", items("bread", 1)))
        .with_config(config);
    let pipeline = Pipeline::new(mocks);
    let user = UserId::new();
    pipeline.follow(user, "baker");
    start_session(user, None, &pipeline.deps).await.unwrap();

    let report = pipeline.scheduler.run_cycle().await.unwrap();

    assert!(report.budget_exhausted);
    assert_eq!(report.processed, 0);
    assert!(report.needs_more);
    // Nothing ran, so nothing re-arms; cron picks the work up.
    assert!(!report.continuation_scheduled);
    assert_eq!(
        pipeline.mocks.jobs.jobs_by_type(JobType::Fetch)[0].status,
        JobStatus::Pending
    );
}

fn stage(job_type: JobType, mode: ExecutionMode, secs: u64) -> StageConfig {
    StageConfig {
        job_type,
        batch_size: 10,
        mode,
        job_timeout: Duration::from_secs(secs),
    }
}

#[tokio::test(start_paused = true)]
async fn job_that_no_longer_fits_the_budget_waits_for_next_cycle() {
    // 8s usable; each summary takes 4s and may take up to 6s, so the second
    // one cannot start in the first cycle.
    let config = PipelineConfig::builder()
        .cycle_budget(Duration::from_secs(10))
        .safety_margin(Duration::from_secs(2))
        .stages(vec![
            stage(JobType::Fetch, ExecutionMode::Sequential, 2),
            stage(JobType::Transcribe, ExecutionMode::Parallel { max_concurrency: 5 }, 2),
            stage(JobType::Summarize, ExecutionMode::Parallel { max_concurrency: 1 }, 6),
        ])
        .build();
    let mocks = TestDependencies::new()
        .mock_content_source(MockContentSource::new().with_items("baker", items("bread", 2)))
        .mock_ai(
            MockAI::new()
                .with_delay_for("/v/bread-0", Duration::from_secs(4))
                .with_delay_for("/v/bread-1", Duration::from_secs(4)),
        )
        .with_config(config);
    let pipeline = Pipeline::new(mocks);
    let user = UserId::new();
    pipeline.follow(user, "baker");
    let started = start_session(user, None, &pipeline.deps).await.unwrap();

    let first = pipeline.scheduler.run_cycle().await.unwrap();

    assert_eq!(first.stages[&JobType::Summarize].succeeded, 1);
    assert_eq!(first.failed, 0);
    assert!(first.errors.is_empty());
    assert!(first.budget_exhausted);
    assert!(first.needs_more);
    assert!(first.continuation_scheduled);

    let waiting = pipeline
        .mocks
        .jobs
        .jobs_by_type(JobType::Summarize)
        .into_iter()
        .find(|j| j.status != JobStatus::Completed)
        .expect("summary left for the next cycle");
    assert_eq!(waiting.status, JobStatus::Pending);
    assert_eq!(waiting.retry_count, 0);
    assert_eq!(waiting.error_message, None);

    let second = pipeline.scheduler.run_cycle().await.unwrap();

    assert_eq!(second.stages[&JobType::Summarize].succeeded, 1);
    assert!(!second.needs_more);
    assert_eq!(second.sessions_completed, vec![started.session.id]);
    assert_eq!(pipeline.mocks.store.summaries().len(), 2);
}
