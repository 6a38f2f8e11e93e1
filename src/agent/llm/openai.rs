//! OpenAI-compatible chat-completions client (Aipipe / OpenRouter).

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::ProviderError;
use crate::tools::ToolDefinition;

use super::super::message::{Content, ContentSegment, Message, Role, ToolCallRequest};
use super::super::rate_limiter::RateLimiter;
use super::{classify_error, classify_http_failure, ChatCompletionResponse, ProviderClient};

/// Default Aipipe proxy in front of OpenRouter.
pub const DEFAULT_BASE_URL: &str = "https://aipipe.org/openrouter/v1";

/// Chat-completions client used as the primary provider.
#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    model: String,
    tools: Vec<ToolDefinition>,
    limiter: Arc<RateLimiter>,
    client: Client,
}

impl OpenAiClient {
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        tools: Vec<ToolDefinition>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.to_string(),
            model: model.to_string(),
            tools,
            limiter,
            client: Client::new(),
        }
    }

    fn build_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn convert_content(content: &Content) -> Value {
        match content {
            Content::Text(text) => json!(text),
            Content::Segments(segments) => Value::Array(
                segments
                    .iter()
                    .filter_map(ContentSegment::as_text)
                    .map(|text| json!({"type": "text", "text": text}))
                    .collect(),
            ),
        }
    }

    fn convert_messages(&self, system_prompt: &str, messages: &[Message]) -> Vec<Value> {
        let mut converted = Vec::with_capacity(messages.len() + 1);
        converted.push(json!({"role": "system", "content": system_prompt}));

        for m in messages {
            let value = match m.role {
                Role::User => json!({
                    "role": "user",
                    "content": Self::convert_content(&m.content)
                }),
                Role::Tool => json!({
                    "role": "tool",
                    "tool_call_id": m.tool_call_id.as_deref().unwrap_or_default(),
                    "content": m.content.to_text()
                }),
                Role::Assistant if m.has_tool_calls() => {
                    let calls: Vec<Value> = m
                        .tool_calls
                        .iter()
                        .map(|tc| {
                            json!({
                                "id": tc.id,
                                "type": "function",
                                "function": {
                                    "name": tc.name,
                                    "arguments": tc.arguments.to_string()
                                }
                            })
                        })
                        .collect();
                    let content = if m.content.is_empty() {
                        Value::Null
                    } else {
                        Self::convert_content(&m.content)
                    };
                    json!({
                        "role": "assistant",
                        "content": content,
                        "tool_calls": calls
                    })
                }
                Role::Assistant => json!({
                    "role": "assistant",
                    "content": Self::convert_content(&m.content)
                }),
            };
            converted.push(value);
        }

        converted
    }

    fn convert_tools(&self) -> Option<Value> {
        if self.tools.is_empty() {
            return None;
        }

        let tools: Vec<Value> = self
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters
                    }
                })
            })
            .collect();

        Some(Value::Array(tools))
    }

    fn parse_content(content: Value) -> Content {
        match content {
            Value::Null => Content::default(),
            Value::String(text) => Content::Text(text),
            Value::Array(parts) => {
                match serde_json::from_value::<Vec<ContentSegment>>(Value::Array(parts.clone())) {
                    Ok(segments) => Content::Segments(segments),
                    Err(_) => Content::Text(Value::Array(parts).to_string()),
                }
            }
            other => Content::Text(other.to_string()),
        }
    }

    fn parse_response(
        &self,
        response: ChatCompletionResponse,
    ) -> std::result::Result<Message, ProviderError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Other("No choices in response".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                // Unparseable arguments are passed through as a string so the
                // tool can report the problem back to the model.
                let arguments = if tc.function.arguments.trim().is_empty() {
                    json!({})
                } else {
                    serde_json::from_str(&tc.function.arguments)
                        .unwrap_or(Value::String(tc.function.arguments))
                };
                ToolCallRequest::new(tc.id, tc.function.name, arguments)
            })
            .collect();

        Ok(Message::assistant_with_tools(
            Self::parse_content(choice.message.content),
            tool_calls,
        ))
    }
}

#[async_trait]
impl ProviderClient for OpenAiClient {
    async fn invoke(
        &self,
        system_prompt: &str,
        conversation: &[Message],
    ) -> std::result::Result<Message, ProviderError> {
        let mut request = json!({
            "model": self.model,
            "messages": self.convert_messages(system_prompt, conversation),
        });

        if let Some(tools) = self.convert_tools() {
            request["tools"] = tools;
        }

        self.limiter.acquire().await;
        debug!("Calling {} with {} messages", self.model, conversation.len());

        let response = self
            .client
            .post(self.build_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_http_failure(status, &error_text));
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Other(format!("Malformed chat completion: {e}")))?;
        self.parse_response(body)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
pub(crate) fn fast_limiter() -> Arc<RateLimiter> {
    use super::super::rate_limiter::RateLimiterConfig;

    Arc::new(RateLimiter::new(RateLimiterConfig {
        requests_per_second: 1000.0,
        check_every_secs: 0.001,
        max_bucket_size: 10.0,
    }))
}

/// One token per second, no burst; checks land exactly on refill boundaries.
#[cfg(test)]
pub(crate) fn slow_limiter() -> Arc<RateLimiter> {
    use super::super::rate_limiter::RateLimiterConfig;

    Arc::new(RateLimiter::new(RateLimiterConfig {
        requests_per_second: 1.0,
        check_every_secs: 0.5,
        max_bucket_size: 1.0,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetch_tool() -> ToolDefinition {
        ToolDefinition {
            name: "get_request".to_string(),
            description: "HTTP GET".to_string(),
            parameters: json!({"type": "object", "properties": {"url": {"type": "string"}}}),
        }
    }

    fn client(base_url: &str) -> OpenAiClient {
        OpenAiClient::new("test-key", base_url, "openai/gpt-5-nano", vec![fetch_tool()], fast_limiter())
    }

    #[test]
    fn test_convert_messages_prepends_system_prompt() {
        let client = client("http://unused");
        let messages = vec![
            Message::user("http://quiz.test/q1"),
            Message::assistant_with_tools(
                "",
                vec![ToolCallRequest::new("call_1", "get_request", json!({"url": "http://quiz.test/q1"}))],
            ),
            Message::tool_result("call_1", "page"),
        ];

        let converted = client.convert_messages("be brief", &messages);

        assert_eq!(converted.len(), 4);
        assert_eq!(converted[0], json!({"role": "system", "content": "be brief"}));
        assert_eq!(converted[2]["content"], Value::Null);
        assert_eq!(converted[2]["tool_calls"][0]["function"]["arguments"], json!("{\"url\":\"http://quiz.test/q1\"}"));
        assert_eq!(converted[3]["tool_call_id"], json!("call_1"));
    }

    #[test]
    fn test_parse_segment_content() {
        let content = OpenAiClient::parse_content(json!([{"type": "text", "text": "END"}]));
        assert_eq!(content, Content::Segments(vec![ContentSegment::text("END")]));
    }

    #[tokio::test]
    async fn test_invoke_parses_tool_calls() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "choices": [{
                        "message": {
                            "role": "assistant",
                            "content": null,
                            "tool_calls": [{
                                "id": "call_abc",
                                "type": "function",
                                "function": {"name": "get_request", "arguments": "{\"url\":\"http://quiz.test/q1\"}"}
                            }]
                        }
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let message = client(&server.url())
            .invoke("sys", &[Message::user("http://quiz.test/q1")])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(
            message.tool_calls,
            vec![ToolCallRequest::new("call_abc", "get_request", json!({"url": "http://quiz.test/q1"}))]
        );
    }

    #[tokio::test]
    async fn test_invoke_classifies_429() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let err = client(&server.url()).invoke("sys", &[]).await.unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn test_invoke_auth_failure_is_other() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body("invalid api key")
            .create_async()
            .await;

        let err = client(&server.url()).invoke("sys", &[]).await.unwrap_err();
        assert_eq!(err, ProviderError::Other("HTTP 401: invalid api key".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_waits_for_rate_limiter() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(json!({"choices": [{"message": {"content": "END"}}]}).to_string())
            .expect(1)
            .create_async()
            .await;
        let client = OpenAiClient::new("test-key", &server.url(), "openai/gpt-5-nano", vec![], slow_limiter());

        let start = tokio::time::Instant::now();
        let message = client.invoke("sys", &[Message::user("u")]).await.unwrap();

        assert!(start.elapsed() >= std::time::Duration::from_secs(1), "waited {:?}", start.elapsed());
        assert_eq!(message.content, Content::Text("END".to_string()));
        mock.assert_async().await;
    }
}
