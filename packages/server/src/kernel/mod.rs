//! Kernel module - server infrastructure and dependencies.

pub mod ai;
pub mod content_source;
pub mod credentials;
pub mod deps;
pub mod jobs;
pub mod scheduled_tasks;
pub mod store;
pub mod test_dependencies;
pub mod traits;
pub mod transcription;

// Provider implementations
pub use ai::OpenAiSummarizer;
pub use content_source::ApifyContentSource;
pub use credentials::CredentialPool;
pub use transcription::TranscriptApiService;

// Other exports
pub use deps::ServerDeps;
pub use scheduled_tasks::start_scheduler;
pub use store::{ContentStore, PostgresContentStore};
pub use test_dependencies::TestDependencies;
pub use traits::*;
