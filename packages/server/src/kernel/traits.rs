// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Stage bodies in the domains call external providers through these traits.
//
// Naming convention: Base* for trait names (e.g., BaseAI, BaseContentSource)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kernel::jobs::{CreatorDescriptor, StageError};

// =============================================================================
// Provider errors
// =============================================================================

/// Failure reported by an external provider, classified for retry.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// Timeouts, network errors, 5xx. Worth retrying.
    #[error("{0}")]
    Transient(String),
    /// Unsupported input, payload too large. Never retried.
    #[error("{0}")]
    Permanent(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, ProviderError::Permanent(_))
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited(_))
    }
}

impl From<ProviderError> for StageError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Permanent(msg) => StageError::Permanent(msg),
            other => StageError::Transient(other.to_string()),
        }
    }
}

// =============================================================================
// Content Source Trait
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentStats {
    pub views: Option<i64>,
    pub likes: Option<i64>,
    pub comments: Option<i64>,
    pub shares: Option<i64>,
}

/// One item returned by a content source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceItem {
    pub external_id: String,
    pub title: Option<String>,
    pub caption: Option<String>,
    pub hashtags: Vec<String>,
    pub media_url: Option<String>,
    /// Public page of the item; what the transcription provider is given.
    pub source_url: String,
    pub stats: ContentStats,
    pub published_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait BaseContentSource: Send + Sync {
    /// Latest items of a creator, newest first, at most `max_items`.
    async fn fetch(
        &self,
        creator: &CreatorDescriptor,
        max_items: usize,
    ) -> Result<Vec<SourceItem>, ProviderError>;
}

// =============================================================================
// Transcription Trait
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptionReply {
    Ready {
        text: String,
        /// Provider-specific extra format (timed segments).
        aux_format: Option<serde_json::Value>,
        language: Option<String>,
    },
    /// The provider is still working; poll with the handle later.
    Pending { handle: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AsyncTranscriptState {
    InProgress,
    Completed {
        text: String,
        aux_format: Option<serde_json::Value>,
        language: Option<String>,
    },
    Failed(String),
}

#[async_trait]
pub trait BaseTranscriptionService: Send + Sync {
    async fn transcribe(&self, source_url: &str) -> Result<TranscriptionReply, ProviderError>;

    async fn poll(&self, handle: &str) -> Result<AsyncTranscriptState, ProviderError>;
}

// =============================================================================
// AI Trait (Infrastructure - Generic LLM capabilities)
// =============================================================================

#[async_trait]
pub trait BaseAI: Send + Sync {
    /// Model name recorded alongside generated artifacts.
    fn model(&self) -> &str;

    /// Complete a prompt expecting a JSON object (returns raw text; the
    /// reply is not guaranteed to parse)
    async fn complete_json(&self, system: &str, user: &str) -> Result<String, ProviderError>;
}
