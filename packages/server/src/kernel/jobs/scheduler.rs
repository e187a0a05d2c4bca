//! Drain cycle: one bounded pass over the pipeline stages.
//!
//! ```text
//! run_cycle
//!     ├─► recover jobs stuck in `processing`
//!     ├─► for stage in fetch → transcribe → summarize
//!     │       ├─► dequeue_batch(stage, batch_size)
//!     │       └─► sequential or bounded-parallel run_with_timeout
//!     ├─► refresh sessions of every user touched
//!     └─► pending work && progress made → continuation.schedule(delay)
//! ```
//!
//! The cycle checks its remaining budget between units of work. A job only
//! starts when its full stage timeout fits before the safety margin; jobs
//! that do not fit stay pending for the next cycle. Running jobs are never
//! cut short by the cycle budget.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{
    Continuation, Job, JobFailure, JobOutcome, JobProcessor, JobType, ProgressAggregator,
    QueueError,
};
use crate::common::{SessionId, UserId};
use crate::config::{ExecutionMode, PipelineConfig, StageConfig};

#[derive(Debug, Clone, Default, Serialize)]
pub struct StageReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DrainReport {
    /// Jobs that ran to a recorded outcome (success or failure).
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Jobs another cycle claimed first.
    pub skipped: usize,
    pub stages: BTreeMap<JobType, StageReport>,
    pub errors: Vec<String>,
    pub recovered: usize,
    pub budget_exhausted: bool,
    /// Pending work remains after this cycle.
    pub needs_more: bool,
    pub continuation_scheduled: bool,
    pub sessions_completed: Vec<SessionId>,
    pub elapsed_ms: u64,
}

impl DrainReport {
    fn record(&mut self, job_type: JobType, result: Result<JobOutcome, JobFailure>) {
        let stage = self.stages.entry(job_type).or_default();
        match result {
            Ok(JobOutcome::Completed(_)) => {
                stage.processed += 1;
                stage.succeeded += 1;
                self.processed += 1;
                self.succeeded += 1;
            }
            Ok(JobOutcome::Skipped) => {
                stage.skipped += 1;
                self.skipped += 1;
            }
            Err(failure) => {
                stage.processed += 1;
                stage.failed += 1;
                self.processed += 1;
                self.failed += 1;
                self.errors.push(failure.to_string());
            }
        }
    }
}

/// Wall-clock budget of one cycle.
#[derive(Debug, Clone, Copy)]
struct Budget {
    deadline: Instant,
    safety_margin: Duration,
}

impl Budget {
    fn new(total: Duration, safety_margin: Duration) -> Self {
        Self {
            deadline: Instant::now() + total,
            safety_margin,
        }
    }

    fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    fn exhausted(&self) -> bool {
        self.remaining() <= self.safety_margin
    }

    /// Whether a job allowed `stage_limit` can finish before the safety margin.
    fn fits(&self, stage_limit: Duration) -> bool {
        self.remaining().saturating_sub(self.safety_margin) >= stage_limit
    }
}

pub struct DrainScheduler {
    processor: JobProcessor,
    progress: ProgressAggregator,
    continuation: Arc<dyn Continuation>,
    config: Arc<PipelineConfig>,
}

impl DrainScheduler {
    pub fn new(
        processor: JobProcessor,
        progress: ProgressAggregator,
        continuation: Arc<dyn Continuation>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        let usable = config.cycle_budget.saturating_sub(config.safety_margin);
        for stage in config.stages.iter().filter(|s| s.job_timeout > usable) {
            warn!(
                job_type = %stage.job_type,
                job_timeout_ms = stage.job_timeout.as_millis() as u64,
                usable_budget_ms = usable.as_millis() as u64,
                "Stage timeout exceeds the cycle budget; its jobs will never start"
            );
        }
        Self {
            processor,
            progress,
            continuation,
            config,
        }
    }

    pub fn progress(&self) -> &ProgressAggregator {
        &self.progress
    }

    /// Runs one drain cycle. Stage failures are collected in the report and
    /// never abort the cycle; only queue reads that the cycle cannot work
    /// without are returned as errors.
    pub async fn run_cycle(&self) -> Result<DrainReport, QueueError> {
        let started = Instant::now();
        let budget = Budget::new(self.config.cycle_budget, self.config.safety_margin);
        let queue = self.processor.queue();
        let mut report = DrainReport::default();
        let mut touched: HashSet<UserId> = HashSet::new();

        match queue.recover_stale(self.config.processing_lease).await {
            Ok(recovered) => {
                report.recovered = recovered.len();
                touched.extend(recovered.iter().map(|j| j.user_id));
            }
            Err(e) => warn!(error = %e, "Stale job recovery failed"),
        }

        for stage in &self.config.stages {
            if budget.exhausted() {
                report.budget_exhausted = true;
                break;
            }

            let batch = queue.dequeue_batch(stage.job_type, stage.batch_size).await?;
            if batch.is_empty() {
                continue;
            }
            touched.extend(batch.iter().map(|j| j.user_id));
            debug!(job_type = %stage.job_type, jobs = batch.len(), "Draining stage");

            let exhausted = match stage.mode {
                ExecutionMode::Sequential => self.run_sequential(stage, batch, &budget, &mut report).await,
                ExecutionMode::Parallel { max_concurrency } => {
                    self.run_parallel(stage, batch, max_concurrency, &budget, &mut report)
                        .await
                }
            };
            if exhausted {
                report.budget_exhausted = true;
                break;
            }
        }

        for user_id in touched {
            match self.progress.refresh_user(user_id).await {
                Ok(Some(progress)) if progress.just_completed => {
                    report.sessions_completed.push(progress.session_id)
                }
                Ok(_) => {}
                Err(e) => warn!(user_id = %user_id, error = %e, "Session refresh failed"),
            }
        }

        report.needs_more = queue.has_pending_work().await?;
        if report.needs_more && report.processed > 0 {
            self.continuation.schedule(self.config.continuation_delay);
            report.continuation_scheduled = true;
        }

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            budget_exhausted = report.budget_exhausted,
            needs_more = report.needs_more,
            continuation = report.continuation_scheduled,
            elapsed_ms = report.elapsed_ms,
            "Drain cycle finished"
        );
        Ok(report)
    }

    /// Returns true if the budget ran out before the batch was done.
    async fn run_sequential(
        &self,
        stage: &StageConfig,
        batch: Vec<Job>,
        budget: &Budget,
        report: &mut DrainReport,
    ) -> bool {
        for job in batch {
            if !budget.fits(stage.job_timeout) {
                return true;
            }
            let result = self
                .processor
                .run_with_timeout(&job, stage.job_timeout)
                .await;
            report.record(job.job_type, result);
        }
        false
    }

    /// Jobs whose turn comes after the budget can no longer fit them are
    /// left pending.
    async fn run_parallel(
        &self,
        stage: &StageConfig,
        batch: Vec<Job>,
        max_concurrency: usize,
        budget: &Budget,
        report: &mut DrainReport,
    ) -> bool {
        let results: Vec<Option<(JobType, Result<JobOutcome, JobFailure>)>> = stream::iter(batch)
            .map(|job| async move {
                if !budget.fits(stage.job_timeout) {
                    return None;
                }
                let result = self
                    .processor
                    .run_with_timeout(&job, stage.job_timeout)
                    .await;
                Some((job.job_type, result))
            })
            .buffer_unordered(max_concurrency.max(1))
            .collect()
            .await;

        let mut exhausted = false;
        for result in results {
            match result {
                Some((job_type, result)) => report.record(job_type, result),
                None => exhausted = true,
            }
        }
        exhausted
    }
}
