// HTTP routes
pub mod error;
pub mod health;
pub mod queue;
pub mod sessions;
pub mod transcripts;

pub use error::*;
pub use health::*;
pub use queue::*;
pub use sessions::*;
pub use transcripts::*;
