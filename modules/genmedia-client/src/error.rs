use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GenMediaError>;

#[derive(Debug, Error)]
pub enum GenMediaError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Structured response was empty or did not match the schema")]
    EmptyResponse,

    #[error("No image data received")]
    NoImageData,

    #[error("Video operation finished without a video URI")]
    NoVideoData,

    #[error("Video operation failed (code {code}): {message}")]
    Operation { code: i64, message: String },

    #[error("Video operation still running after {elapsed:?}")]
    Timeout { elapsed: Duration },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl GenMediaError {
    /// Transient failures: rate limiting, server errors, transport failures.
    /// Everything else (content errors, 4xx, timeouts) is terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenMediaError::Network(_) => true,
            GenMediaError::Api { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for GenMediaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GenMediaError::Parse(err.to_string())
        } else if err.is_builder() {
            GenMediaError::InvalidConfig(err.to_string())
        } else {
            GenMediaError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GenMediaError {
    fn from(err: serde_json::Error) -> Self {
        GenMediaError::Parse(err.to_string())
    }
}
