// Content Digest Pipeline - Server Core
//
// This crate provides the durable job queue and drain scheduler that turn a
// user's followed creators into fetched content, transcripts, and AI
// summaries. Stage bodies are organized per-domain in domains/*/activities/.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
