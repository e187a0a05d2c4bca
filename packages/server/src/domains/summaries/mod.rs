//! Summaries domain - the summarize stage and stored AI summaries.

pub mod activities;
pub mod models;

pub use models::Summary;
