//! Text generation error types

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("Text generation not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Text generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("{provider} API error ({status}): {detail}")]
    Status {
        provider: &'static str,
        status: u16,
        detail: String,
    },

    #[error("Malformed completion: {0}")]
    Malformed(String),
}

impl LlmError {
    /// Transport failures, timeouts, rate limits and server errors are worth
    /// another attempt; everything else fails the same way twice.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Timeout(_) | LlmError::Http(_) => true,
            LlmError::Status { status, .. } => *status == 429 || *status >= 500,
            LlmError::NotConfigured(_) | LlmError::Malformed(_) => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Http(e.to_string())
    }
}
