pub mod retry_failed;
pub mod start_session;

pub use retry_failed::retry_failed_jobs;
pub use start_session::{start_session, StartedSession};
