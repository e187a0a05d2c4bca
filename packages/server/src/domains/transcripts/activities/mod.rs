pub mod enqueue_summary;
pub mod reconcile_async;
pub mod transcribe_content;

pub use enqueue_summary::enqueue_summary;
pub use reconcile_async::{reconcile_async_transcripts, ReconcileReport};
pub use transcribe_content::{transcribe_content, NO_TRANSCRIPT};
