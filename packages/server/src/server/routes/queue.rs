use axum::{extract::Extension, Json};

use crate::kernel::jobs::{DrainReport, QueueStats};
use crate::server::app::AppState;
use crate::server::routes::ApiError;

/// Runs one bounded drain cycle and returns its report. Also the target of
/// HTTP continuations and external cron.
pub async fn drain_handler(
    Extension(state): Extension<AppState>,
) -> Result<Json<DrainReport>, ApiError> {
    let report = state.scheduler.run_cycle().await?;
    Ok(Json(report))
}

pub async fn queue_stats_handler(
    Extension(state): Extension<AppState>,
) -> Result<Json<Vec<QueueStats>>, ApiError> {
    Ok(Json(state.deps.queue.stats().await?))
}
