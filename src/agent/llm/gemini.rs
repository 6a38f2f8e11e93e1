//! Gemini LLM client implementation (API key authentication).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ProviderError;
use crate::tools::ToolDefinition;

use super::super::message::{Content, ContentSegment, Message, Role, ToolCallRequest};
use super::super::rate_limiter::RateLimiter;
use super::{classify_error, classify_http_failure, GeminiResponse, ProviderClient};

pub(crate) const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini API client used as the secondary provider.
///
/// Retries rate-limited calls internally, up to `max_retries` times, before
/// surfacing `RateLimited`.
#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    api_url: String,
    tools: Vec<ToolDefinition>,
    limiter: Arc<RateLimiter>,
    max_retries: u32,
    retry_delay: Duration,
    client: Client,
}

impl GeminiClient {
    /// Create a new Gemini client with API key.
    pub fn new(
        api_key: &str,
        model: &str,
        tools: Vec<ToolDefinition>,
        limiter: Arc<RateLimiter>,
        max_retries: u32,
    ) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            api_url: GEMINI_API_URL.to_string(),
            tools,
            limiter,
            max_retries,
            retry_delay: Duration::from_secs(1),
            client: Client::new(),
        }
    }

    /// Override the API root (used to point at a local server).
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    /// Base delay between internal retries; doubles per attempt.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    fn build_url(&self) -> String {
        format!("{}/{}:generateContent", self.api_url, self.model)
    }

    fn convert_messages(&self, messages: &[Message]) -> Vec<Value> {
        // Gemini answers function calls by name, not by id.
        let call_names: HashMap<&str, &str> = messages
            .iter()
            .flat_map(|m| m.tool_calls.iter())
            .map(|tc| (tc.id.as_str(), tc.name.as_str()))
            .collect();

        let mut contents: Vec<Value> = Vec::with_capacity(messages.len());
        // Index into `contents` of the user turn collecting the current tool batch.
        let mut open_batch: Option<usize> = None;

        for m in messages {
            if m.role != Role::Tool {
                open_batch = None;
            }

            match m.role {
                Role::Tool => {
                    let name = m
                        .tool_call_id
                        .as_deref()
                        .and_then(|id| call_names.get(id).copied())
                        .unwrap_or("unknown");
                    let part = json!({
                        "functionResponse": {
                            "name": name,
                            "response": {"result": m.content.to_text()}
                        }
                    });

                    // One user turn per batch, with one part per answered call.
                    match open_batch.and_then(|i| contents[i]["parts"].as_array_mut()) {
                        Some(parts) => parts.push(part),
                        None => {
                            open_batch = Some(contents.len());
                            contents.push(json!({"role": "user", "parts": [part]}));
                        }
                    }
                }
                Role::Assistant => {
                    let mut parts = Vec::new();
                    let text = m.content.to_text();
                    if !text.is_empty() {
                        parts.push(json!({"text": text}));
                    }
                    parts.extend(m.tool_calls.iter().map(|tc| {
                        json!({
                            "functionCall": {
                                "name": tc.name,
                                "args": tc.arguments
                            }
                        })
                    }));
                    if parts.is_empty() {
                        parts.push(json!({"text": ""}));
                    }
                    contents.push(json!({"role": "model", "parts": parts}));
                }
                Role::User => contents.push(json!({
                    "role": "user",
                    "parts": [{"text": m.content.to_text()}]
                })),
            }
        }

        contents
    }

    fn convert_tools(&self) -> Option<Value> {
        if self.tools.is_empty() {
            return None;
        }

        let function_declarations: Vec<Value> = self
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters
                })
            })
            .collect();

        Some(json!([{
            "functionDeclarations": function_declarations
        }]))
    }

    fn parse_response(&self, response: &GeminiResponse) -> std::result::Result<Message, ProviderError> {
        let candidate = response
            .candidates
            .first()
            .ok_or_else(|| ProviderError::Other("No candidates in response".to_string()))?;

        let mut texts = Vec::new();
        let mut tool_calls = Vec::new();

        for part in candidate.content.iter().flat_map(|c| c.parts.iter()) {
            if let Some(ref text) = part.text {
                texts.push(text.clone());
            }

            if let Some(ref fc) = part.function_call {
                tool_calls.push(ToolCallRequest::new(
                    format!("call_{}", Uuid::new_v4().simple()),
                    fc.name.clone(),
                    fc.args.clone(),
                ));
            }
        }

        if texts.is_empty() && tool_calls.is_empty() {
            // An empty reply routes back to the model like any other ambiguous answer.
            let reason = candidate.finish_reason.as_deref().unwrap_or("unknown");
            warn!("Gemini returned an empty candidate (finish reason: {})", reason);
            return Ok(Message::assistant(""));
        }

        let content = match texts.len() {
            0 => Content::default(),
            1 => Content::Text(texts.remove(0)),
            _ => Content::Segments(texts.into_iter().map(ContentSegment::text).collect()),
        };

        Ok(Message::assistant_with_tools(content, tool_calls))
    }

    async fn invoke_once(&self, request: &Value) -> std::result::Result<Message, ProviderError> {
        self.limiter.acquire().await;

        let response = self
            .client
            .post(self.build_url())
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await
            .map_err(|e| classify_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_http_failure(status, &error_text));
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Other(format!("Malformed Gemini response: {e}")))?;
        self.parse_response(&gemini_response)
    }
}

#[async_trait]
impl ProviderClient for GeminiClient {
    async fn invoke(
        &self,
        system_prompt: &str,
        conversation: &[Message],
    ) -> std::result::Result<Message, ProviderError> {
        let mut request = json!({
            "contents": self.convert_messages(conversation),
            "systemInstruction": {
                "parts": [{"text": system_prompt}]
            },
            "generationConfig": {
                "temperature": 0.7,
                "maxOutputTokens": 8192
            }
        });

        if let Some(tool_config) = self.convert_tools() {
            request["tools"] = tool_config;
        }

        let mut attempt = 0;
        loop {
            match self.invoke_once(&request).await {
                Err(err) if err.is_rate_limited() && attempt < self.max_retries => {
                    let delay = self.retry_delay * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    warn!(
                        "Gemini rate limited, retry {}/{} in {:?}",
                        attempt, self.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                result => {
                    debug!("Gemini call finished after {} retries", attempt);
                    return result;
                }
            }
        }
    }

    fn name(&self) -> &str {
        &self.model
    }
}
