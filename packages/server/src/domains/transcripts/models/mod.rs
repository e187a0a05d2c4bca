pub mod transcript;

pub use transcript::{Transcript, TranscriptStatus};
