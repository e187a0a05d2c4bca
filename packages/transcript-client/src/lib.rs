//! Pure video transcription REST API client.
//!
//! Requests a transcript for a public video URL. Short videos are answered
//! synchronously; longer ones return a job id that is polled later.
//!
//! The provider allows one request per second per API key. The client does not
//! throttle; callers serialize requests per key.
//!
//! # Example
//!
//! ```rust,ignore
//! use transcript_client::{TranscriptClient, TranscriptReply};
//!
//! let client = TranscriptClient::new("key".into());
//! match client.transcribe("https://www.tiktok.com/@chef/video/1").await? {
//!     TranscriptReply::Ready(t) => println!("{}", t.text),
//!     TranscriptReply::Pending { job_id } => println!("poll {job_id} later"),
//! }
//! ```

pub mod error;
pub mod types;

pub use error::{Result, TranscriptError};
pub use types::{JobState, Segment, Transcript, TranscriptContent, TranscriptReply};

use types::{RawJobResponse, RawTranscriptResponse};

const BASE_URL: &str = "https://api.supadata.ai/v1";

pub struct TranscriptClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl TranscriptClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Request a transcript with timed segments for `source_url`.
    pub async fn transcribe(&self, source_url: &str) -> Result<TranscriptReply> {
        let url = format!("{}/transcript", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .query(&[("url", source_url), ("text", "false"), ("mode", "auto")])
            .send()
            .await?;

        let resp = check_status(resp).await?;
        let raw: RawTranscriptResponse = resp.json().await?;

        match (raw.content, raw.job_id) {
            (Some(content), _) => Ok(TranscriptReply::Ready(Transcript::from_content(content, raw.lang))),
            (None, Some(job_id)) => {
                tracing::debug!(source_url, job_id = %job_id, "Transcript deferred to background job");
                Ok(TranscriptReply::Pending { job_id })
            }
            (None, None) => Ok(TranscriptReply::Ready(Transcript {
                text: String::new(),
                segments: None,
                lang: raw.lang,
            })),
        }
    }

    /// Check the state of a background transcription job.
    pub async fn job_status(&self, job_id: &str) -> Result<JobState> {
        let url = format!("{}/transcript/{}", self.base_url, job_id);
        let resp = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        let resp = check_status(resp).await?;
        let raw: RawJobResponse = resp.json().await?;
        Ok(job_state(raw))
    }
}

fn job_state(raw: RawJobResponse) -> JobState {
    match raw.status.as_str() {
        "completed" => match raw.content {
            Some(content) => JobState::Completed(Transcript::from_content(content, raw.lang)),
            None => JobState::Completed(Transcript {
                text: String::new(),
                segments: None,
                lang: raw.lang,
            }),
        },
        "failed" => JobState::Failed(
            raw.error
                .map(|e| match e {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .unwrap_or_else(|| "transcription failed".to_string()),
        ),
        _ => JobState::InProgress,
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(TranscriptError::from_status(status.as_u16(), body))
}
