use axum::{extract::Extension, Json};
use std::time::Duration;

use crate::domains::transcripts::activities::{reconcile_async_transcripts, ReconcileReport};
use crate::server::app::AppState;
use crate::server::routes::ApiError;

/// Polls pending async transcripts within one cycle budget.
pub async fn reconcile_handler(
    Extension(state): Extension<AppState>,
) -> Result<Json<ReconcileReport>, ApiError> {
    let config = &state.deps.config;
    let budget: Duration = config.cycle_budget.saturating_sub(config.safety_margin);
    let report = reconcile_async_transcripts(&state.deps, Some(budget)).await?;
    Ok(Json(report))
}
