// Main entry point for API server

use std::sync::Arc;

use anyhow::{Context, Result};
use digest_core::kernel::jobs::{run_continuations, Continuation, HttpContinuation, TokioContinuation};
use digest_core::kernel::{start_scheduler, ServerDeps};
use digest_core::server::{build_app, AppState};
use digest_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,digest_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting content digest pipeline server");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    let deps = ServerDeps::from_config(&config, pool.clone())
        .context("Failed to build server dependencies")?;

    // Continuations: self-call over HTTP when deployed behind a public URL,
    // otherwise a delayed in-process task.
    let scheduler = match config.public_base_url.as_deref() {
        Some(base_url) => {
            tracing::info!(base_url, "Continuations trigger the drain endpoint over HTTP");
            let continuation: Arc<dyn Continuation> = Arc::new(HttpContinuation::new(base_url));
            Arc::new(deps.drain_scheduler(continuation))
        }
        None => {
            let (continuation, receiver) = TokioContinuation::channel();
            let scheduler = Arc::new(deps.drain_scheduler(Arc::new(continuation)));
            tokio::spawn(run_continuations(scheduler.clone(), receiver));
            scheduler
        }
    };

    // Keep the handle alive for the lifetime of the server
    let _cron = start_scheduler(
        deps.clone(),
        scheduler.clone(),
        config.drain_cron.as_deref(),
        config.reconcile_cron.as_deref(),
    )
    .await
    .context("Failed to start scheduled tasks")?;

    let app = build_app(
        AppState::new(Some(pool), deps, scheduler),
        &config.allowed_origins,
    );

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
