//! Web tools - GET, POST and page fetch

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};
use tracing::info;
use crate::Result;
use crate::error::Error;
use super::{required_str, truncate, Tool};

const DEFAULT_HTML_CHARS: usize = 100_000;

/// Render a JSON value as a plain string (strings lose their quotes).
fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn with_headers(mut request: RequestBuilder, params: &Value) -> RequestBuilder {
    if let Some(headers) = params.get("headers").and_then(|v| v.as_object()) {
        for (name, value) in headers {
            request = request.header(name.as_str(), plain(value));
        }
    }
    request
}

/// Pretty JSON when the body parses, raw text otherwise. Non-2xx responses
/// are reported as text so the model can read the server's complaint.
async fn render_response(response: Response) -> Result<String> {
    let status = response.status();
    let text = response.text().await
        .map_err(|e| Error::Tool(format!("Failed to read response: {}", e)))?;

    if !status.is_success() {
        return Ok(format!("HTTP {}: {}", status.as_u16(), text));
    }

    Ok(match serde_json::from_str::<Value>(&text) {
        Ok(value) => serde_json::to_string_pretty(&value)?,
        Err(_) => text,
    })
}

/// HTTP GET against an API endpoint
pub struct GetRequestTool {
    client: Client,
}

impl GetRequestTool {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GetRequestTool {
    fn name(&self) -> &str { "get_request" }
    fn description(&self) -> &str {
        "Send an HTTP GET request with optional headers and query parameters. Returns JSON if possible, otherwise raw text."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Endpoint URL"
                },
                "headers": {
                    "type": "object",
                    "description": "HTTP headers, e.g. {\"X-API-Key\": \"abc\"}"
                },
                "params": {
                    "type": "object",
                    "description": "Query parameters, e.g. {\"page\": 1}"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let url = required_str(&params, "url")?;
        info!("GET {}", url);

        let query: Vec<(String, String)> = params.get("params")
            .and_then(|v| v.as_object())
            .map(|map| map.iter().map(|(k, v)| (k.clone(), plain(v))).collect())
            .unwrap_or_default();

        let request = with_headers(self.client.get(url), &params).query(&query);
        let response = request.send().await
            .map_err(|e| Error::Tool(format!("Failed to fetch {}: {}", url, e)))?;

        render_response(response).await
    }
}

/// HTTP POST with a JSON payload, used for answer submission
pub struct PostRequestTool {
    client: Client,
}

impl PostRequestTool {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for PostRequestTool {
    fn name(&self) -> &str { "post_request" }
    fn description(&self) -> &str {
        "Send an HTTP POST request with a JSON payload and optional headers. Returns the server response."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Full endpoint URL"
                },
                "payload": {
                    "type": "object",
                    "description": "JSON body to send"
                },
                "headers": {
                    "type": "object",
                    "description": "Extra HTTP headers"
                }
            },
            "required": ["url", "payload"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let url = required_str(&params, "url")?;
        let payload = params.get("payload")
            .ok_or_else(|| Error::Tool("Missing 'payload' parameter".to_string()))?;
        info!("POST {}", url);

        let request = with_headers(self.client.post(url), &params).json(payload);
        let response = request.send().await
            .map_err(|e| Error::Tool(format!("Failed to post to {}: {}", url, e)))?;

        render_response(response).await
    }
}

/// Fetch the HTML of a page
pub struct RenderedHtmlTool {
    client: Client,
}

impl RenderedHtmlTool {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for RenderedHtmlTool {
    fn name(&self) -> &str { "get_rendered_html" }
    fn description(&self) -> &str {
        "Fetch the HTML of a web page, including links and media references"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Page URL"
                },
                "max_chars": {
                    "type": "number",
                    "description": "Maximum characters to return (default 100000)"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let url = required_str(&params, "url")?;
        let max_chars = params.get("max_chars")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_HTML_CHARS);

        let response = self.client.get(url).send().await
            .map_err(|e| Error::Tool(format!("Failed to fetch {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Tool(format!("HTTP error: {}", status)));
        }

        let html = response.text().await
            .map_err(|e| Error::Tool(format!("Failed to read response: {}", e)))?;

        Ok(truncate(html, max_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_get_request_pretty_prints_json() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/data")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .match_header("x-api-key", "abc")
            .with_status(200)
            .with_body(r#"{"answer":4}"#)
            .create_async()
            .await;

        let tool = GetRequestTool::new(Client::new());
        let result = tool.execute(json!({
            "url": format!("{}/data", server.url()),
            "headers": {"X-API-Key": "abc"},
            "params": {"page": 2}
        })).await.unwrap();

        assert_eq!(result, "{\n  \"answer\": 4\n}");
    }

    #[tokio::test]
    async fn test_get_request_reports_http_errors_as_text() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/missing")
            .with_status(404)
            .with_body("not here")
            .create_async()
            .await;

        let tool = GetRequestTool::new(Client::new());
        let result = tool.execute(json!({"url": format!("{}/missing", server.url())})).await.unwrap();

        assert_eq!(result, "HTTP 404: not here");
    }

    #[tokio::test]
    async fn test_post_request_sends_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/submit")
            .match_body(Matcher::Json(json!({"url": "http://quiz.test/q1", "answer": 4})))
            .with_status(200)
            .with_body(r#"{"correct": true, "url": null}"#)
            .create_async()
            .await;

        let tool = PostRequestTool::new(Client::new());
        let result = tool.execute(json!({
            "url": format!("{}/submit", server.url()),
            "payload": {"url": "http://quiz.test/q1", "answer": 4}
        })).await.unwrap();

        mock.assert_async().await;
        assert!(result.contains("\"correct\": true"));
    }

    #[tokio::test]
    async fn test_post_request_requires_payload() {
        let tool = PostRequestTool::new(Client::new());
        assert!(tool.execute(json!({"url": "http://quiz.test"})).await.is_err());
    }

    #[tokio::test]
    async fn test_rendered_html_truncates() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/page")
            .with_status(200)
            .with_body("<html><body>quiz</body></html>")
            .create_async()
            .await;

        let tool = RenderedHtmlTool::new(Client::new());
        let result = tool.execute(json!({"url": format!("{}/page", server.url()), "max_chars": 6})).await.unwrap();

        assert!(result.starts_with("<html>..."));
    }
}
