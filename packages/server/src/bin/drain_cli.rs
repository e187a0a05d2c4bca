//! One-shot pipeline commands for externally scheduled deployments.
//!
//! Each command runs once and prints its report as JSON, so an external
//! scheduler (platform cron, CI job) can drive the queue without the
//! long-running server.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use digest_core::common::UserId;
use digest_core::domains::transcripts::activities::reconcile_async_transcripts;
use digest_core::kernel::jobs::NoopContinuation;
use digest_core::kernel::ServerDeps;
use digest_core::Config;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "drain_cli")]
#[command(about = "Run pipeline drain cycles and reconciliation once")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one bounded drain cycle
    Drain,

    /// Poll pending async transcripts once
    Reconcile,

    /// Print the progress of a user's current or latest session
    Progress {
        #[arg(long)]
        user: UserId,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,digest_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    let deps = ServerDeps::from_config(&config, pool)?;

    match cli.command {
        Commands::Drain => {
            // The next invocation comes from the external scheduler.
            let scheduler = deps.drain_scheduler(Arc::new(NoopContinuation));
            let report = scheduler.run_cycle().await?;
            print_json(&report)?;
        }
        Commands::Reconcile => {
            let budget = config
                .pipeline
                .cycle_budget
                .saturating_sub(config.pipeline.safety_margin);
            let report = reconcile_async_transcripts(&deps, Some(budget)).await?;
            print_json(&report)?;
        }
        Commands::Progress { user } => {
            let progress = deps.progress().progress_for_user(user).await?;
            print_json(&progress)?;
        }
    }

    Ok(())
}
