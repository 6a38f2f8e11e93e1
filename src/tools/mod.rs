//! Tools module - agent capabilities
//!
//! Tools are the external actions the model can request: HTTP requests,
//! file downloads, Python execution and Gemini-backed media analysis.

mod runner;
mod http;
mod download;
mod code;
mod media;

pub use runner::{ToolRunner, ToolDefinition};
pub use http::{GetRequestTool, PostRequestTool, RenderedHtmlTool};
pub use download::DownloadFileTool;
pub use code::{AddDependenciesTool, RunCodeTool};
pub use media::{AnalyzeWithGeminiTool, GeminiMedia, TranscribeAudioTool};

use async_trait::async_trait;
use serde_json::Value;
use crate::Result;
use crate::error::Error;

/// Tool trait - interface for all agent tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name used in function calls
    fn name(&self) -> &str;

    /// Description of what the tool does
    fn description(&self) -> &str;

    /// JSON Schema for parameters
    fn parameters(&self) -> Value;

    /// Execute the tool with given parameters
    async fn execute(&self, params: Value) -> Result<String>;

    /// Convert to tool definition for LLM
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Fetch a required string parameter.
pub(crate) fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Tool(format!("Missing '{}' parameter", key)))
}

/// Truncate on a char boundary, noting the original length.
pub(crate) fn truncate(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...\n\n[Truncated - {} total chars]", &text[..cut], text.chars().count()),
        None => text,
    }
}

/// Dummy tool for testing
#[cfg(test)]
pub struct DummyTool {
    pub name: String,
    pub result: String,
}

#[cfg(test)]
#[async_trait]
impl Tool for DummyTool {
    fn name(&self) -> &str { &self.name }
    fn description(&self) -> &str { "Dummy tool for testing" }
    fn parameters(&self) -> Value { serde_json::json!({"type": "object"}) }

    async fn execute(&self, _params: Value) -> Result<String> {
        Ok(self.result.clone())
    }
}

/// Tool that always fails, for testing
#[cfg(test)]
pub struct FailingTool {
    pub name: String,
}

#[cfg(test)]
#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str { &self.name }
    fn description(&self) -> &str { "Always fails" }
    fn parameters(&self) -> Value { serde_json::json!({"type": "object"}) }

    async fn execute(&self, _params: Value) -> Result<String> {
        Err(Error::Tool("boom".to_string()))
    }
}
