//! Error types for quizloop

use thiserror::Error;

/// Result type alias for quizloop operations
pub type Result<T> = std::result::Result<T, Error>;

/// Classified failure of a single provider invocation.
///
/// Only `RateLimited` justifies switching to the secondary provider; every
/// other failure (auth, network, malformed response) is `Other`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited(_))
    }
}

/// Errors that can occur in quizloop
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Both providers exhausted: {0}")]
    BothProvidersExhausted(ProviderError),

    #[error("Step budget of {max_steps} exceeded")]
    LoopBudgetExceeded { max_steps: usize },

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
