pub mod content;
pub mod creators;
pub mod pipeline;
pub mod sessions;
pub mod summaries;
pub mod transcripts;

pub use pipeline::PipelineStages;
