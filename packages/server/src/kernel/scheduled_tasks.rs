//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! Cron is the safety net under the continuation chain: if a continuation
//! is lost (process restart, failed self-call) the next tick drains again.
//!
//! ```text
//! Scheduler (every minute)
//!     ├─► DrainScheduler.run_cycle()
//!     └─► reconcile_async_transcripts()
//! ```

use anyhow::Result;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::domains::transcripts::activities::reconcile_async_transcripts;
use crate::kernel::jobs::DrainScheduler;
use crate::kernel::ServerDeps;

/// Every minute, at second 0.
pub const DRAIN_CRON: &str = "0 * * * * *";

/// Every minute, offset from the drain tick.
pub const RECONCILE_CRON: &str = "30 * * * * *";

/// Start all scheduled tasks
pub async fn start_scheduler(
    deps: ServerDeps,
    drain: Arc<DrainScheduler>,
    drain_cron: Option<&str>,
    reconcile_cron: Option<&str>,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let drain_cron = drain_cron.unwrap_or(DRAIN_CRON);
    let drain_job = Job::new_async(drain_cron, move |_uuid, _lock| {
        let drain = drain.clone();
        Box::pin(async move {
            match drain.run_cycle().await {
                Ok(report) if report.processed > 0 || report.recovered > 0 => tracing::info!(
                    processed = report.processed,
                    failed = report.failed,
                    recovered = report.recovered,
                    needs_more = report.needs_more,
                    "Scheduled drain cycle finished"
                ),
                Ok(_) => tracing::debug!("Scheduled drain cycle found no work"),
                Err(e) => tracing::error!("Scheduled drain cycle failed: {}", e),
            }
        })
    })?;
    scheduler.add(drain_job).await?;

    let reconcile_cron = reconcile_cron.unwrap_or(RECONCILE_CRON);
    let reconcile_job = Job::new_async(reconcile_cron, move |_uuid, _lock| {
        let deps = deps.clone();
        Box::pin(async move {
            if let Err(e) = reconcile_async_transcripts(&deps, None).await {
                tracing::error!("Scheduled reconciliation failed: {}", e);
            }
        })
    })?;
    scheduler.add(reconcile_job).await?;

    scheduler.start().await?;

    tracing::info!(
        drain_cron,
        reconcile_cron,
        "Scheduled tasks started (drain cycle, async transcript reconciliation)"
    );
    Ok(scheduler)
}
