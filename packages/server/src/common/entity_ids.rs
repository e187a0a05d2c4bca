//! Typed ID definitions for all domain entities.

pub use super::id::Id;

/// Marker type for users (owned by the excluded auth layer).
pub struct User;

/// Marker type for followed creators.
pub struct Creator;

/// Marker type for pipeline sessions.
pub struct PipelineSession;

/// Marker type for queued pipeline jobs.
pub struct PipelineJob;

/// Marker type for fetched content items.
pub struct ContentItem;

pub type UserId = Id<User>;
pub type CreatorId = Id<Creator>;
pub type SessionId = Id<PipelineSession>;
pub type JobId = Id<PipelineJob>;
pub type ContentId = Id<ContentItem>;
