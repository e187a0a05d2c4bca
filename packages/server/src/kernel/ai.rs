// AI implementation using OpenAI
//
// This is the infrastructure implementation of BaseAI.
// Business logic (what to prompt for) lives in domain layers.

use async_trait::async_trait;
use openai_client::{ChatRequest, Message, OpenAIClient, OpenAIError};

use super::traits::{BaseAI, ProviderError};

const MAX_SUMMARY_TOKENS: u32 = 1_200;

/// OpenAI chat completions in JSON mode
#[derive(Clone)]
pub struct OpenAiSummarizer {
    client: OpenAIClient,
    model: String,
}

impl OpenAiSummarizer {
    pub fn new(api_key: &str, model: impl Into<String>) -> Self {
        Self {
            client: OpenAIClient::new(api_key),
            model: model.into(),
        }
    }
}

#[async_trait]
impl BaseAI for OpenAiSummarizer {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete_json(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let request = ChatRequest::new(&self.model)
            .message(Message::system(system))
            .message(Message::user(user))
            .temperature(0.3)
            .max_tokens(MAX_SUMMARY_TOKENS)
            .json_mode();

        self.client
            .chat_completion(request)
            .await
            .map(|response| response.content)
            .map_err(provider_error)
    }
}

fn provider_error(err: OpenAIError) -> ProviderError {
    match err {
        OpenAIError::RateLimited(msg) => ProviderError::RateLimited(msg),
        other if other.is_retryable() => ProviderError::Transient(other.to_string()),
        other => ProviderError::Permanent(other.to_string()),
    }
}
