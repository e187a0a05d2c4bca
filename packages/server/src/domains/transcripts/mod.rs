//! Transcripts domain - the transcribe stage and reconciliation of
//! transcripts the provider finishes asynchronously.

pub mod activities;
pub mod models;

pub use models::{Transcript, TranscriptStatus};
