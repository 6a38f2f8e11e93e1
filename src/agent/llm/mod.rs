//! LLM provider abstraction layer.
//!
//! This module provides:
//! - [`ProviderClient`] trait shared by the primary and secondary backends
//! - [`classify_error`] which sorts failure text into [`ProviderError`] classes
//! - Concrete implementations: OpenAI-compatible chat completions, Gemini
//!
//! # Adding a New Provider
//!
//! 1. Create a new file (e.g., `anthropic.rs`)
//! 2. Implement `ProviderClient`, gating each request on its `RateLimiter`
//! 3. Map transport and HTTP failures through `classify_error`
//! 4. Wire it into `AgentLoop::from_config`

mod types;

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::error::ProviderError;

pub use types::*;

pub mod gemini;
pub mod openai;

pub use gemini::GeminiClient;
pub(crate) use gemini::GEMINI_API_URL;
pub use openai::OpenAiClient;

use super::message::Message;

/// Uniform invoke contract over interchangeable model backends.
///
/// Implementations are bound to their tool definitions and rate limiter at
/// construction, so a call only needs the prompt and the conversation.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Ask the model for the next assistant message.
    async fn invoke(
        &self,
        system_prompt: &str,
        conversation: &[Message],
    ) -> std::result::Result<Message, ProviderError>;

    /// Human-readable backend name for logs.
    fn name(&self) -> &str;
}

fn rate_limit_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)rate[ _]?limit|too many requests|\b429\b|quota|limit exceeded|token limit|resource[ _]exhausted",
        )
        .expect("rate limit pattern is valid")
    })
}

/// Classify free-form failure text.
pub fn classify_error(message: impl Into<String>) -> ProviderError {
    let message = message.into();
    if rate_limit_pattern().is_match(&message) {
        ProviderError::RateLimited(message)
    } else {
        ProviderError::Other(message)
    }
}

/// Classify a non-success HTTP response from a provider.
pub fn classify_http_failure(status: reqwest::StatusCode, body: &str) -> ProviderError {
    let message = format!("HTTP {}: {}", status.as_u16(), body);
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        ProviderError::RateLimited(message)
    } else {
        classify_error(message)
    }
}

/// Scripted provider for tests.
#[cfg(test)]
pub struct FakeProvider {
    name: String,
    responses: std::sync::Mutex<std::collections::VecDeque<std::result::Result<Message, ProviderError>>>,
    calls: std::sync::Mutex<Vec<(String, Vec<Message>)>>,
}

#[cfg(test)]
impl FakeProvider {
    pub fn new(
        name: &str,
        responses: Vec<std::result::Result<Message, ProviderError>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            responses: std::sync::Mutex::new(responses.into()),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Prompt and conversation seen by each invocation, in order.
    pub fn calls(&self) -> Vec<(String, Vec<Message>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl ProviderClient for FakeProvider {
    async fn invoke(
        &self,
        system_prompt: &str,
        conversation: &[Message],
    ) -> std::result::Result<Message, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), conversation.to_vec()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Other("No more fake responses".to_string())))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_signals() {
        for text in [
            "Error code: 429 - slow down",
            "Rate limit reached for requests",
            "rate_limit_error",
            "RateLimitError",
            "Too Many Requests",
            "You exceeded your current quota",
            "Daily limit exceeded",
            "token limit reached",
            "RESOURCE_EXHAUSTED",
        ] {
            assert!(classify_error(text).is_rate_limited(), "{text}");
        }
    }

    #[test]
    fn test_other_failures() {
        for text in ["invalid api key", "connection refused", "missing field `choices`", "HTTP 4290x"] {
            assert_eq!(classify_error(text), ProviderError::Other(text.to_string()));
        }
    }

    #[test]
    fn test_http_status_429_is_rate_limited() {
        let err = classify_http_failure(reqwest::StatusCode::TOO_MANY_REQUESTS, "{}");
        assert!(err.is_rate_limited());

        let err = classify_http_failure(reqwest::StatusCode::UNAUTHORIZED, "invalid api key");
        assert_eq!(err, ProviderError::Other("HTTP 401: invalid api key".to_string()));
    }

    #[tokio::test]
    async fn test_fake_provider_replays_script() {
        let provider = FakeProvider::new("fake", vec![Ok(Message::assistant("Hello!"))]);

        let first = provider.invoke("sys", &[]).await.unwrap();
        assert_eq!(first, Message::assistant("Hello!"));
        assert!(provider.invoke("sys", &[]).await.is_err());
        assert_eq!(provider.call_count(), 2);
    }
}
