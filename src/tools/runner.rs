//! Tool runner - manages and executes tools

use std::collections::BTreeMap;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::Result;
use crate::config::Config;
use crate::error::Error;
use super::Tool;
use super::http::{GetRequestTool, PostRequestTool, RenderedHtmlTool};
use super::download::DownloadFileTool;
use super::code::{AddDependenciesTool, RunCodeTool};
use super::media::{AnalyzeWithGeminiTool, GeminiMedia, TranscribeAudioTool};

/// Tool definition for LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Tool runner manages registered tools and executes them
pub struct ToolRunner {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRunner {
    /// Create an empty tool runner
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Create a tool runner with the quiz-solving tool set
    pub fn new_with_defaults(config: &Config) -> Result<Self> {
        let timeout = Duration::from_secs(config.tool_timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("quizloop/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let mut runner = Self::new();

        // Web tools
        runner.register(GetRequestTool::new(client.clone()));
        runner.register(PostRequestTool::new(client.clone()));
        runner.register(RenderedHtmlTool::new(client.clone()));
        runner.register(DownloadFileTool::new(client.clone(), config.workspace.clone()));

        // Python tools
        runner.register(RunCodeTool::new(
            config.workspace.clone(),
            config.python_command.clone(),
            timeout,
        ));
        runner.register(AddDependenciesTool::new(
            config.workspace.clone(),
            config.install_command.clone(),
            timeout,
        ));

        // Gemini multimodal tools need a Google key
        if let Some(secondary) = &config.secondary {
            let media = GeminiMedia::new(client, &secondary.api_key, &secondary.model);
            runner.register(TranscribeAudioTool::new(media.clone()));
            runner.register(AnalyzeWithGeminiTool::new(media));
        }

        Ok(runner)
    }

    /// Register a tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    /// Get tool definitions for LLM, sorted by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values()
            .map(|t| t.to_definition())
            .collect()
    }

    /// Execute a tool by name
    pub async fn execute(&self, name: &str, params: Value) -> Result<String> {
        let tool = self.tools.get(name)
            .ok_or_else(|| Error::Tool(format!("Unknown tool: {}", name)))?;

        tool.execute(params).await
    }

    /// Check if a tool exists
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List registered tool names
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ToolRunner {
    fn default() -> Self {
        Self::new()
    }
}
