use serde::Deserialize;

/// One timed caption segment (milliseconds).
#[derive(Debug, Clone, PartialEq, Deserialize, serde::Serialize)]
pub struct Segment {
    pub text: String,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub duration: u64,
}

/// Body of a finished transcript: plain text or timed segments.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TranscriptContent {
    Text(String),
    Segments(Vec<Segment>),
}

/// A finished transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub text: String,
    pub segments: Option<Vec<Segment>>,
    pub lang: Option<String>,
}

impl Transcript {
    pub(crate) fn from_content(content: TranscriptContent, lang: Option<String>) -> Self {
        match content {
            TranscriptContent::Text(text) => Self {
                text: text.trim().to_string(),
                segments: None,
                lang,
            },
            TranscriptContent::Segments(segments) => {
                let text = segments
                    .iter()
                    .map(|s| s.text.trim())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                Self {
                    text,
                    segments: Some(segments),
                    lang,
                }
            }
        }
    }
}

/// Reply to a transcript request.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptReply {
    /// The provider answered synchronously.
    Ready(Transcript),
    /// The provider started a background job; poll it with [`crate::TranscriptClient::job_status`].
    Pending { job_id: String },
}

/// State of a background transcription job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    InProgress,
    Completed(Transcript),
    Failed(String),
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTranscriptResponse {
    pub content: Option<TranscriptContent>,
    pub lang: Option<String>,
    #[serde(rename = "jobId")]
    pub job_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawJobResponse {
    pub status: String,
    pub content: Option<TranscriptContent>,
    pub lang: Option<String>,
    pub error: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_are_joined_into_text() {
        let raw = r#"{"content": [{"text": "hello ", "offset": 0, "duration": 900}, {"text": "world", "offset": 900, "duration": 700}], "lang": "en"}"#;
        let parsed: RawTranscriptResponse = serde_json::from_str(raw).unwrap();
        let transcript = Transcript::from_content(parsed.content.unwrap(), parsed.lang);
        assert_eq!(transcript.text, "hello world");
        assert_eq!(transcript.segments.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn job_handle_response_has_no_content() {
        let parsed: RawTranscriptResponse = serde_json::from_str(r#"{"jobId": "job-1"}"#).unwrap();
        assert!(parsed.content.is_none());
        assert_eq!(parsed.job_id.as_deref(), Some("job-1"));
    }
}
