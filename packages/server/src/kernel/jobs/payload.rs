//! Typed job payloads.
//!
//! The payload of a job is a sum type keyed by job type, so a job can only
//! carry the fields its stage needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{JobType, QueueError};
use crate::common::{ContentId, CreatorId, Platform, SessionId};

/// Which creator a fetch job pulls content for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatorDescriptor {
    pub creator_id: CreatorId,
    pub platform: Platform,
    pub handle: String,
}

/// Content fields the summarizer uses as context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentMetadata {
    pub title: Option<String>,
    pub caption: Option<String>,
    pub platform: Option<Platform>,
    pub creator_handle: Option<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    pub source_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchPayload {
    pub creator: CreatorDescriptor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscribePayload {
    pub content_id: ContentId,
    pub source_url: String,
    pub platform: Platform,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarizePayload {
    pub content_id: ContentId,
    pub transcript_text: String,
    pub metadata: ContentMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobPayload {
    Fetch(FetchPayload),
    Transcribe(TranscribePayload),
    Summarize(SummarizePayload),
}

impl JobPayload {
    pub fn job_type(&self) -> JobType {
        match self {
            JobPayload::Fetch(_) => JobType::Fetch,
            JobPayload::Transcribe(_) => JobType::Transcribe,
            JobPayload::Summarize(_) => JobType::Summarize,
        }
    }

    /// Key the queue enforces uniqueness on, per job type.
    ///
    /// Fetch jobs are scoped to their session so a later session may fetch
    /// the same creator again; downstream jobs are keyed by content.
    pub fn natural_key(&self, session_id: Option<SessionId>) -> String {
        match self {
            JobPayload::Fetch(p) => match session_id {
                Some(session_id) => format!("{}:{}", session_id, p.creator.creator_id),
                None => format!("adhoc:{}", p.creator.creator_id),
            },
            JobPayload::Transcribe(p) => p.content_id.to_string(),
            JobPayload::Summarize(p) => p.content_id.to_string(),
        }
    }

    /// Rejects payloads a stage could never execute.
    pub fn validate(&self) -> Result<(), QueueError> {
        match self {
            JobPayload::Fetch(p) if p.creator.handle.trim().is_empty() => Err(
                QueueError::InvalidPayload("fetch job needs a creator handle".into()),
            ),
            JobPayload::Transcribe(p) if p.source_url.trim().is_empty() => Err(
                QueueError::InvalidPayload("transcribe job needs a source url".into()),
            ),
            JobPayload::Summarize(p) if p.transcript_text.trim().is_empty() => Err(
                QueueError::InvalidPayload("summarize job needs transcript text".into()),
            ),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetch() -> JobPayload {
        JobPayload::Fetch(FetchPayload {
            creator: CreatorDescriptor {
                creator_id: CreatorId::new(),
                platform: Platform::Tiktok,
                handle: "chef".into(),
            },
        })
    }

    #[test]
    fn payload_is_tagged_by_job_type() {
        let json = serde_json::to_value(fetch()).unwrap();
        assert_eq!(json["type"], "fetch");
        assert_eq!(json["creator"]["platform"], "tiktok");
    }

    #[test]
    fn fetch_key_is_scoped_to_session() {
        let payload = fetch();
        let a = payload.natural_key(Some(SessionId::new()));
        let b = payload.natural_key(Some(SessionId::new()));
        assert_ne!(a, b);
    }

    #[test]
    fn downstream_keys_are_content_ids() {
        let content_id = ContentId::new();
        let payload = JobPayload::Transcribe(TranscribePayload {
            content_id,
            source_url: "https://example.com/v/1".into(),
            platform: Platform::Youtube,
        });
        assert_eq!(payload.natural_key(Some(SessionId::new())), content_id.to_string());
        assert_eq!(payload.job_type(), JobType::Transcribe);
    }

    #[test]
    fn empty_transcript_is_rejected() {
        let payload = JobPayload::Summarize(SummarizePayload {
            content_id: ContentId::new(),
            transcript_text: "   ".into(),
            metadata: ContentMetadata::default(),
        });
        assert!(matches!(payload.validate(), Err(QueueError::InvalidPayload(_))));
    }
}
