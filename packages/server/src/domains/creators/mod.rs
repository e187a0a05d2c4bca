//! Creators domain - followed social accounts and per-user fetch preferences.

pub mod models;

pub use models::{Creator, UserPreferences};
