//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::kernel::jobs::DrainScheduler;
use crate::kernel::ServerDeps;
use crate::server::routes::{
    drain_handler, health_handler, progress_handler, queue_stats_handler, reconcile_handler,
    retry_failed_handler, start_session_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Absent when the app runs over in-memory stores (tests).
    pub db_pool: Option<PgPool>,
    pub deps: ServerDeps,
    pub scheduler: Arc<DrainScheduler>,
}

impl AppState {
    pub fn new(db_pool: Option<PgPool>, deps: ServerDeps, scheduler: Arc<DrainScheduler>) -> Self {
        Self {
            db_pool,
            deps,
            scheduler,
        }
    }
}

/// Build the Axum application router
pub fn build_app(state: AppState, allowed_origins: &[String]) -> Router {
    let cors = if allowed_origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        CorsLayer::new().allow_origin(origins)
    }
    .allow_methods([Method::GET, Method::POST])
    .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/sessions", post(start_session_handler))
        .route("/api/sessions/progress", get(progress_handler))
        .route("/api/sessions/:id/retry-failed", post(retry_failed_handler))
        .route("/api/queue/drain", post(drain_handler))
        .route("/api/queue/stats", get(queue_stats_handler))
        .route("/api/transcripts/reconcile", post(reconcile_handler))
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
