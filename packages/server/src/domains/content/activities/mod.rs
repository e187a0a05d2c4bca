pub mod fetch_creator_content;

pub use fetch_creator_content::{fetch_creator_content, filter_recent, transcribe_priority};
