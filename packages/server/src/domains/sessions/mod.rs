//! Sessions domain - starting a batch of pipeline work for a user and
//! retrying what failed. Session storage and progress live in
//! [`crate::kernel::jobs`].

pub mod activities;

pub use activities::{retry_failed_jobs, start_session, StartedSession};
