//! Transcript API-backed transcription service.
//!
//! The provider allows one call per second per API key, so every key goes
//! through a [`CredentialPool`] with a one second minimum interval.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use transcript_client::{JobState, Transcript, TranscriptClient, TranscriptError, TranscriptReply};

use super::credentials::CredentialPool;
use super::traits::{AsyncTranscriptState, BaseTranscriptionService, ProviderError, TranscriptionReply};

const PER_KEY_INTERVAL: Duration = Duration::from_secs(1);

pub struct TranscriptApiService {
    pool: CredentialPool<Arc<TranscriptClient>>,
    timeout: Duration,
}

impl TranscriptApiService {
    pub fn new(api_keys: &[String], base_url: Option<&str>, timeout: Duration) -> anyhow::Result<Self> {
        let clients = api_keys
            .iter()
            .map(|key| {
                let client = TranscriptClient::new(key.clone());
                let client = match base_url {
                    Some(url) => client.with_base_url(url),
                    None => client,
                };
                Arc::new(client)
            })
            .collect();
        Ok(Self {
            pool: CredentialPool::new(clients)?.with_min_interval(PER_KEY_INTERVAL),
            timeout,
        })
    }
}

#[async_trait]
impl BaseTranscriptionService for TranscriptApiService {
    async fn transcribe(&self, source_url: &str) -> Result<TranscriptionReply, ProviderError> {
        let timeout = self.timeout;
        self.pool
            .with_rotation(
                |client| async move {
                    match tokio::time::timeout(timeout, client.transcribe(source_url)).await {
                        Ok(Ok(TranscriptReply::Ready(transcript))) => Ok(ready(transcript)),
                        Ok(Ok(TranscriptReply::Pending { job_id })) => {
                            Ok(TranscriptionReply::Pending { handle: job_id })
                        }
                        Ok(Err(e)) => Err(provider_error(e)),
                        Err(_) => Err(timed_out(timeout)),
                    }
                },
                ProviderError::is_rate_limited,
            )
            .await
    }

    async fn poll(&self, handle: &str) -> Result<AsyncTranscriptState, ProviderError> {
        let timeout = self.timeout;
        self.pool
            .with_rotation(
                |client| async move {
                    match tokio::time::timeout(timeout, client.job_status(handle)).await {
                        Ok(Ok(JobState::InProgress)) => Ok(AsyncTranscriptState::InProgress),
                        Ok(Ok(JobState::Completed(transcript))) => {
                            let (text, aux_format, language) = parts(transcript);
                            Ok(AsyncTranscriptState::Completed {
                                text,
                                aux_format,
                                language,
                            })
                        }
                        Ok(Ok(JobState::Failed(reason))) => Ok(AsyncTranscriptState::Failed(reason)),
                        Ok(Err(e)) => Err(provider_error(e)),
                        Err(_) => Err(timed_out(timeout)),
                    }
                },
                ProviderError::is_rate_limited,
            )
            .await
    }
}

fn parts(transcript: Transcript) -> (String, Option<serde_json::Value>, Option<String>) {
    let aux_format = transcript
        .segments
        .and_then(|segments| serde_json::to_value(segments).ok());
    (transcript.text, aux_format, transcript.lang)
}

fn ready(transcript: Transcript) -> TranscriptionReply {
    let (text, aux_format, language) = parts(transcript);
    TranscriptionReply::Ready {
        text,
        aux_format,
        language,
    }
}

fn timed_out(timeout: Duration) -> ProviderError {
    ProviderError::Transient(format!("transcription timed out after {:?}", timeout))
}

fn provider_error(err: TranscriptError) -> ProviderError {
    if err.is_rate_limited() {
        ProviderError::RateLimited(err.to_string())
    } else if err.is_transient() {
        ProviderError::Transient(err.to_string())
    } else {
        ProviderError::Permanent(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transcript_client::Segment;

    #[test]
    fn segments_become_aux_format() {
        let reply = ready(Transcript {
            text: "hello world".into(),
            segments: Some(vec![Segment {
                text: "hello world".into(),
                offset: 0,
                duration: 1200,
            }]),
            lang: Some("en".into()),
        });
        match reply {
            TranscriptionReply::Ready { text, aux_format, language } => {
                assert_eq!(text, "hello world");
                assert_eq!(aux_format.unwrap()[0]["duration"], 1200);
                assert_eq!(language.as_deref(), Some("en"));
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn too_large_is_permanent() {
        let err = provider_error(TranscriptError::TooLarge("3h video".into()));
        assert!(!err.is_transient());
    }
}
