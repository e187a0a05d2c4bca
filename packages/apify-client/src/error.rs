use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApifyError>;

#[derive(Debug, Error)]
pub enum ApifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Apify API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Actor run ended with status {0}")]
    RunFailed(String),
}

impl ApifyError {
    /// Whether the same request may succeed on a later attempt or with a
    /// different token (network errors, throttling, exhausted quota, 5xx).
    pub fn is_transient(&self) -> bool {
        match self {
            ApifyError::Http(_) => true,
            ApifyError::Api { status, .. } => {
                matches!(status, 401 | 402 | 403 | 408 | 429) || *status >= 500
            }
            ApifyError::RunFailed(status) => status == "TIMED-OUT" || status == "ABORTED",
        }
    }
}
