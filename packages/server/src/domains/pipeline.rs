//! Routes queued jobs to the stage body of their domain.

use async_trait::async_trait;

use crate::domains::content::activities::fetch_creator_content;
use crate::domains::summaries::activities::summarize_content;
use crate::domains::transcripts::activities::transcribe_content;
use crate::kernel::jobs::{Job, JobHandler, JobPayload, StageError, StageOutcome};
use crate::kernel::ServerDeps;

pub struct PipelineStages {
    deps: ServerDeps,
}

impl PipelineStages {
    pub fn new(deps: ServerDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl JobHandler for PipelineStages {
    async fn handle(&self, job: &Job) -> Result<StageOutcome, StageError> {
        match &job.job_data {
            JobPayload::Fetch(payload) => fetch_creator_content(job, payload, &self.deps).await,
            JobPayload::Transcribe(payload) => transcribe_content(job, payload, &self.deps).await,
            JobPayload::Summarize(payload) => summarize_content(job, payload, &self.deps).await,
        }
    }
}
