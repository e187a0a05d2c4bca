//! Server dependencies for stage bodies (using traits for testability)
//!
//! This module provides the central dependency container used by all domain
//! activities. Every external provider and both stores sit behind traits so
//! tests can swap them for the doubles in [`super::test_dependencies`].

use anyhow::Result;
use sqlx::PgPool;
use std::sync::Arc;

use crate::config::{Config, PipelineConfig};
use crate::domains::PipelineStages;
use crate::kernel::jobs::{
    Continuation, DrainScheduler, JobProcessor, JobType, PostgresJobStore, ProgressAggregator,
    QueueManager,
};
use crate::kernel::{
    ApifyContentSource, BaseAI, BaseContentSource, BaseTranscriptionService, ContentStore,
    OpenAiSummarizer, PostgresContentStore, TranscriptApiService,
};

/// Server dependencies accessible to activities (using traits for testability)
#[derive(Clone)]
pub struct ServerDeps {
    pub queue: QueueManager,
    pub store: Arc<dyn ContentStore>,
    pub content_source: Arc<dyn BaseContentSource>,
    pub transcriber: Arc<dyn BaseTranscriptionService>,
    pub ai: Arc<dyn BaseAI>,
    pub config: Arc<PipelineConfig>,
}

impl ServerDeps {
    pub fn new(
        queue: QueueManager,
        store: Arc<dyn ContentStore>,
        content_source: Arc<dyn BaseContentSource>,
        transcriber: Arc<dyn BaseTranscriptionService>,
        ai: Arc<dyn BaseAI>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            queue,
            store,
            content_source,
            transcriber,
            ai,
            config,
        }
    }

    /// Production wiring: Postgres stores and the real provider clients.
    pub fn from_config(config: &Config, pool: PgPool) -> Result<Self> {
        let pipeline = Arc::new(config.pipeline.clone());

        let queue = QueueManager::new(Arc::new(PostgresJobStore::new(pool.clone())))
            .with_max_retries(pipeline.default_max_retries);

        // Rotation across tokens must end before the fetch job times out.
        let fetch_timeout = pipeline
            .stage(JobType::Fetch)
            .map_or(pipeline.content_source_timeout, |stage| stage.job_timeout);
        let content_source = ApifyContentSource::new(
            &config.apify_api_tokens,
            pipeline.content_source_timeout,
            fetch_timeout,
        )?;
        let transcriber = TranscriptApiService::new(
            &config.transcript_api_keys,
            config.transcript_api_url.as_deref(),
            pipeline.transcription_timeout,
        )?;
        let ai = OpenAiSummarizer::new(&config.openai_api_key, config.summary_model.clone());

        Ok(Self::new(
            queue,
            Arc::new(PostgresContentStore::new(pool)),
            Arc::new(content_source),
            Arc::new(transcriber),
            Arc::new(ai),
            pipeline,
        ))
    }

    pub fn progress(&self) -> ProgressAggregator {
        ProgressAggregator::new(
            self.queue.clone(),
            self.config.stale_session_after,
            self.config.empty_session_grace,
        )
    }

    /// Runs jobs through the domain stage bodies.
    pub fn processor(&self) -> JobProcessor {
        JobProcessor::new(
            self.queue.clone(),
            Arc::new(PipelineStages::new(self.clone())),
        )
    }

    pub fn drain_scheduler(&self, continuation: Arc<dyn Continuation>) -> DrainScheduler {
        DrainScheduler::new(
            self.processor(),
            self.progress(),
            continuation,
            self.config.clone(),
        )
    }
}
