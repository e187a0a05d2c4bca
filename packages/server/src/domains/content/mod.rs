//! Content domain - fetched posts and videos, and the fetch stage that
//! produces them.

pub mod activities;
pub mod models;

pub use models::{Content, ContentInput};
