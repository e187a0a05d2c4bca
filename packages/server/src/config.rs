use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;
use typed_builder::TypedBuilder;

use crate::common::utils::split_list;
use crate::kernel::jobs::JobType;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub apify_api_tokens: Vec<String>,
    pub transcript_api_keys: Vec<String>,
    pub transcript_api_url: Option<String>,
    pub openai_api_key: String,
    pub summary_model: String,
    /// When set, continuation cycles are triggered over HTTP against this base URL.
    pub public_base_url: Option<String>,
    pub allowed_origins: Vec<String>,
    pub drain_cron: Option<String>,
    pub reconcile_cron: Option<String>,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let apify_api_tokens = split_list(
            &env::var("APIFY_API_TOKENS").context("APIFY_API_TOKENS must be set")?,
        );
        if apify_api_tokens.is_empty() {
            bail!("APIFY_API_TOKENS must contain at least one token");
        }

        let transcript_api_keys = split_list(
            &env::var("TRANSCRIPT_API_KEYS").context("TRANSCRIPT_API_KEYS must be set")?,
        );
        if transcript_api_keys.is_empty() {
            bail!("TRANSCRIPT_API_KEYS must contain at least one key");
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            apify_api_tokens,
            transcript_api_keys,
            transcript_api_url: env::var("TRANSCRIPT_API_URL").ok(),
            openai_api_key: env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?,
            summary_model: env::var("SUMMARY_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .ok()
                .map(|url| url.trim_end_matches('/').to_string()),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
            drain_cron: env::var("DRAIN_CRON").ok(),
            reconcile_cron: env::var("RECONCILE_CRON").ok(),
            pipeline: PipelineConfig::from_env()?,
        })
    }
}

/// How a stage dispatches the jobs of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One job at a time, checking the cycle budget between jobs.
    Sequential,
    /// Up to `max_concurrency` jobs in flight; failures stay isolated per job.
    Parallel { max_concurrency: usize },
}

/// Per-stage drain settings.
#[derive(Debug, Clone)]
pub struct StageConfig {
    pub job_type: JobType,
    pub batch_size: i64,
    pub mode: ExecutionMode,
    /// Upper bound for a single job of this stage.
    pub job_timeout: Duration,
}

/// Time budget parameters for the summarize stage.
#[derive(Debug, Clone, TypedBuilder)]
pub struct SummaryBudgetConfig {
    #[builder(default = Duration::from_secs(10))]
    pub base: Duration,
    /// Added per started 1 000 transcript characters.
    #[builder(default = Duration::from_secs(1))]
    pub per_thousand_chars: Duration,
    /// Extra allowance for long-form platforms (YouTube).
    #[builder(default = Duration::from_secs(5))]
    pub long_form_bonus: Duration,
    #[builder(default = Duration::from_secs(30))]
    pub ceiling: Duration,
    /// Transcripts are cut to this many characters when their budget would exceed the ceiling.
    #[builder(default = 12_000)]
    pub max_transcript_chars: usize,
    /// Length of the degraded summary taken from an unparseable reply.
    #[builder(default = 500)]
    pub fallback_chars: usize,
}

impl Default for SummaryBudgetConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Tunables for the queue, the drain cycle and the stages.
#[derive(Debug, Clone, TypedBuilder)]
pub struct PipelineConfig {
    /// Wall-clock budget of one drain cycle.
    #[builder(default = Duration::from_secs(50))]
    pub cycle_budget: Duration,
    /// Reserved at the end of the budget; no new work starts inside it.
    #[builder(default = Duration::from_secs(10))]
    pub safety_margin: Duration,
    #[builder(default = default_stages())]
    pub stages: Vec<StageConfig>,
    #[builder(default = Duration::from_secs(2))]
    pub continuation_delay: Duration,
    #[builder(default = Duration::from_secs(30 * 60))]
    pub stale_session_after: Duration,
    /// A session with no jobs at all is only closed once it is this old.
    #[builder(default = Duration::from_secs(60))]
    pub empty_session_grace: Duration,
    /// Jobs stuck in `processing` longer than this are treated as a failed attempt.
    #[builder(default = Duration::from_secs(5 * 60))]
    pub processing_lease: Duration,
    #[builder(default = 3)]
    pub default_max_retries: i32,
    #[builder(default = 7)]
    pub default_recency_days: i32,
    #[builder(default = 10)]
    pub default_max_items: i32,
    #[builder(default)]
    pub summary: SummaryBudgetConfig,
    #[builder(default = 20)]
    pub reconcile_batch_size: i64,
    #[builder(default = Duration::from_secs(25))]
    pub content_source_timeout: Duration,
    #[builder(default = Duration::from_secs(15))]
    pub transcription_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PipelineConfig {
    /// Defaults with optional `DRAIN_BUDGET_SECS` / `DRAIN_SAFETY_MARGIN_SECS` overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(secs) = env_secs("DRAIN_BUDGET_SECS")? {
            config.cycle_budget = secs;
        }
        if let Some(secs) = env_secs("DRAIN_SAFETY_MARGIN_SECS")? {
            config.safety_margin = secs;
        }
        if config.safety_margin >= config.cycle_budget {
            bail!("DRAIN_SAFETY_MARGIN_SECS must be smaller than DRAIN_BUDGET_SECS");
        }
        Ok(config)
    }

    pub fn stage(&self, job_type: JobType) -> Option<&StageConfig> {
        self.stages.iter().find(|s| s.job_type == job_type)
    }
}

fn env_secs(key: &str) -> Result<Option<Duration>> {
    match env::var(key) {
        Ok(raw) => {
            let secs: u64 = raw
                .parse()
                .with_context(|| format!("{} must be a whole number of seconds", key))?;
            Ok(Some(Duration::from_secs(secs)))
        }
        Err(_) => Ok(None),
    }
}

/// Fetch is rate-limit sensitive and runs sequentially; the other stages fan out.
pub fn default_stages() -> Vec<StageConfig> {
    vec![
        StageConfig {
            job_type: JobType::Fetch,
            batch_size: 3,
            mode: ExecutionMode::Sequential,
            job_timeout: Duration::from_secs(30),
        },
        StageConfig {
            job_type: JobType::Transcribe,
            batch_size: 10,
            mode: ExecutionMode::Parallel { max_concurrency: 5 },
            job_timeout: Duration::from_secs(20),
        },
        StageConfig {
            job_type: JobType::Summarize,
            batch_size: 10,
            mode: ExecutionMode::Parallel { max_concurrency: 5 },
            job_timeout: Duration::from_secs(35),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stages_follow_pipeline_order() {
        let config = PipelineConfig::default();
        let order: Vec<JobType> = config.stages.iter().map(|s| s.job_type).collect();
        assert_eq!(order, JobType::PIPELINE_ORDER.to_vec());
        assert_eq!(
            config.stage(JobType::Fetch).map(|s| s.mode),
            Some(ExecutionMode::Sequential)
        );
    }

    #[test]
    fn builder_overrides_single_field() {
        let config = PipelineConfig::builder()
            .cycle_budget(Duration::from_secs(9))
            .safety_margin(Duration::from_secs(2))
            .build();
        assert_eq!(config.cycle_budget, Duration::from_secs(9));
        assert_eq!(config.default_max_retries, 3);
        assert_eq!(config.summary.fallback_chars, 500);
    }
}
