//! Durable job queue and drain scheduler for the content pipeline.
//!
//! - [`Job`] / [`Session`] - persisted records, the only shared mutable state
//! - [`QueueManager`] - enqueue/dequeue, retry accounting, session lifecycle
//! - [`JobProcessor`] - runs one job under a timeout
//! - [`DrainScheduler`] - one bounded cycle over all stages, re-armed via [`Continuation`]
//! - [`ProgressAggregator`] - session progress and completion for polling clients
//!
//! # Architecture
//!
//! ```text
//! trigger (HTTP, cron, continuation)
//!     │
//!     └─► DrainScheduler.run_cycle()
//!             ├─► QueueManager.dequeue_batch(stage)
//!             ├─► JobProcessor.run_with_timeout(job)
//!             │       └─► JobHandler.handle(job)   (domain stage bodies)
//!             ├─► ProgressAggregator.refresh_user()
//!             └─► Continuation.schedule()
//! ```
//!
//! Stage bodies live in their domains; this module only provides the queue.

pub mod continuation;
mod error;
mod executor;
mod job;
mod job_store;
mod payload;
mod progress;
mod queue;
mod scheduler;
mod session;
mod store;
pub mod testing;

pub use continuation::{
    run_continuations, Continuation, ContinuationReceiver, HttpContinuation, NoopContinuation,
    RecordingContinuation, TokioContinuation,
};
pub use error::QueueError;
pub use executor::{JobFailure, JobHandler, JobOutcome, JobProcessor, StageError, StageOutcome};
pub use job::{ErrorKind, Job, JobCounts, JobStatus, JobType, NewJob, QueueStats};
pub use job_store::PostgresJobStore;
pub use payload::{
    ContentMetadata, CreatorDescriptor, FetchPayload, JobPayload, SummarizePayload,
    TranscribePayload,
};
pub use progress::{completion_reason, CompletionReason, Phase, ProgressAggregator, SessionProgress};
pub use queue::{EnqueueResult, QueueManager};
pub use scheduler::{DrainReport, DrainScheduler, StageReport};
pub use session::{Session, SessionStatus};
pub use store::JobStore;
