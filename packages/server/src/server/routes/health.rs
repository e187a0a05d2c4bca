use std::time::Duration;

use axum::{extract::Extension, http::StatusCode, Json};
use serde::Serialize;
use sqlx::PgPool;

use crate::server::app::AppState;

const DB_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    database: ComponentHealth,
    queue: ComponentHealth,
    /// Runnable jobs across all stages, when the queue answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pending_jobs: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    connection_pool: Option<PoolHealth>,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ComponentHealth {
    fn ok() -> Self {
        Self {
            status: "ok",
            error: None,
        }
    }

    fn skipped() -> Self {
        Self {
            status: "skipped",
            error: None,
        }
    }

    fn error(message: String) -> Self {
        Self {
            status: "error",
            error: Some(message),
        }
    }

    fn is_up(&self) -> bool {
        self.status != "error"
    }
}

#[derive(Serialize)]
pub struct PoolHealth {
    size: u32,
    idle_connections: usize,
    max_connections: u32,
}

async fn check_database(pool: &PgPool) -> ComponentHealth {
    match tokio::time::timeout(DB_CHECK_TIMEOUT, sqlx::query("SELECT 1").execute(pool)).await {
        Ok(Ok(_)) => ComponentHealth::ok(),
        Ok(Err(e)) => ComponentHealth::error(format!("Query failed: {}", e)),
        Err(_) => ComponentHealth::error("Query timeout (>5s)".to_string()),
    }
}

/// Health check endpoint
///
/// 200 when the database (if any) and the queue both answer, 503 otherwise.
/// With in-memory stores the database is reported as skipped.
pub async fn health_handler(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let (database, connection_pool) = match state.db_pool.as_ref() {
        Some(pool) => (
            check_database(pool).await,
            Some(PoolHealth {
                size: pool.size(),
                idle_connections: pool.num_idle(),
                max_connections: pool.options().get_max_connections(),
            }),
        ),
        None => (ComponentHealth::skipped(), None),
    };

    let (queue, pending_jobs) = match state.deps.queue.stats().await {
        Ok(stats) => (
            ComponentHealth::ok(),
            Some(stats.iter().map(|s| s.pending).sum()),
        ),
        Err(e) => (ComponentHealth::error(e.to_string()), None),
    };

    let healthy = database.is_up() && queue.is_up();
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "unhealthy" },
            database,
            queue,
            pending_jobs,
            connection_pool,
        }),
    )
}
