//! Error types for OpenAI client.

use thiserror::Error;

/// Result type for OpenAI client operations.
pub type Result<T> = std::result::Result<T, OpenAIError>;

/// OpenAI client errors.
#[derive(Debug, Error)]
pub enum OpenAIError {
    /// Configuration error (missing API key, invalid settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Rate limited (HTTP 429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// API error (non-2xx response other than 429)
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Parse error (invalid JSON, unexpected response format)
    #[error("Parse error: {0}")]
    Parse(String),
}

impl OpenAIError {
    /// Whether retrying the same request later could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            OpenAIError::Network(_) | OpenAIError::RateLimited(_) => true,
            OpenAIError::Api { status, .. } => *status >= 500,
            OpenAIError::Config(_) | OpenAIError::Parse(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        let err = OpenAIError::Api {
            status: 503,
            message: "overloaded".into(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn bad_request_is_not_retryable() {
        let err = OpenAIError::Api {
            status: 400,
            message: "context length exceeded".into(),
        };
        assert!(!err.is_retryable());
        assert!(OpenAIError::RateLimited("slow down".into()).is_retryable());
    }
}
