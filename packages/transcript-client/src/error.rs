use thiserror::Error;

pub type Result<T> = std::result::Result<T, TranscriptError>;

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Unsupported source ({status}): {message}")]
    Unsupported { status: u16, message: String },

    #[error("Source too large: {0}")]
    TooLarge(String),

    #[error("Transcript API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl TranscriptError {
    /// Whether a later attempt, possibly with another API key, may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            TranscriptError::Http(_) | TranscriptError::RateLimited(_) => true,
            TranscriptError::Unsupported { .. } | TranscriptError::TooLarge(_) => false,
            TranscriptError::Api { status, .. } => {
                matches!(status, 401 | 402 | 403 | 408) || *status >= 500
            }
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, TranscriptError::RateLimited(_))
    }

    pub(crate) fn from_status(status: u16, message: String) -> Self {
        match status {
            429 => TranscriptError::RateLimited(message),
            413 => TranscriptError::TooLarge(message),
            400 | 404 | 415 | 422 => TranscriptError::Unsupported { status, message },
            _ => TranscriptError::Api { status, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(TranscriptError::from_status(429, String::new()).is_rate_limited());
        assert!(TranscriptError::from_status(503, String::new()).is_transient());
        assert!(!TranscriptError::from_status(413, String::new()).is_transient());
        assert!(!TranscriptError::from_status(404, String::new()).is_transient());
    }
}
