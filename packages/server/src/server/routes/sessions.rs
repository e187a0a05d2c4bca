use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::common::{CreatorId, SessionId, UserId};
use crate::domains::sessions::{retry_failed_jobs, start_session};
use crate::kernel::jobs::SessionProgress;
use crate::server::app::AppState;
use crate::server::routes::ApiError;

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub user_id: UserId,
    #[serde(default)]
    pub creator_ids: Option<Vec<CreatorId>>,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: SessionId,
    pub total_jobs: i32,
    pub jobs_enqueued: usize,
    pub progress: SessionProgress,
}

/// Opens a session and kicks one drain cycle in the background.
pub async fn start_session_handler(
    Extension(state): Extension<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<StartSessionResponse>), ApiError> {
    let started = start_session(request.user_id, request.creator_ids, &state.deps).await?;

    if started.jobs_enqueued > 0 {
        let scheduler = state.scheduler.clone();
        tokio::spawn(async move {
            if let Err(e) = scheduler.run_cycle().await {
                tracing::error!(error = %e, "Kick-off drain cycle failed");
            }
        });
    }

    Ok((
        StatusCode::CREATED,
        Json(StartSessionResponse {
            session_id: started.session.id,
            total_jobs: started.session.total_jobs,
            jobs_enqueued: started.jobs_enqueued,
            progress: started.progress,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
    pub user_id: UserId,
}

/// Progress of the user's active session, or of the latest one.
pub async fn progress_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<ProgressQuery>,
) -> Result<Json<SessionProgress>, ApiError> {
    state
        .scheduler
        .progress()
        .progress_for_user(query.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::NOT_FOUND,
                format!("user {} has no sessions", query.user_id),
            )
        })
}

#[derive(Debug, Serialize)]
pub struct RetryFailedResponse {
    pub session_id: SessionId,
    pub jobs_reset: u64,
}

pub async fn retry_failed_handler(
    Extension(state): Extension<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<RetryFailedResponse>, ApiError> {
    let jobs_reset = retry_failed_jobs(session_id, &state.deps).await?;
    Ok(Json(RetryFailedResponse {
        session_id,
        jobs_reset,
    }))
}
