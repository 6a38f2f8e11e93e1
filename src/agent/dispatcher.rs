//! Tool dispatcher - executes the tool calls of an assistant message

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::tools::ToolRunner;

use super::conversation::Conversation;
use super::message::{Message, ToolCallRequest};

/// Executes pending tool calls and appends one tool message per call.
///
/// Failures never escape: they become `Error: ...` text the model can read.
pub struct ToolDispatcher {
    runner: ToolRunner,
}

impl ToolDispatcher {
    pub fn new(runner: ToolRunner) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &ToolRunner {
        &self.runner
    }

    /// Run every call of the last message and append the results in request
    /// order. Returns the number of messages appended.
    pub async fn dispatch(&self, conversation: &mut Conversation) -> usize {
        let calls = match conversation.last() {
            Some(last) if last.has_tool_calls() => last.tool_calls.clone(),
            _ => return 0,
        };

        let results = self.execute_batch(&calls).await;
        let appended = results.len();
        conversation.extend(results);
        appended
    }

    /// Execute a batch concurrently; output order matches `calls`.
    pub async fn execute_batch(&self, calls: &[ToolCallRequest]) -> Vec<Message> {
        let outputs = join_all(calls.iter().map(|call| self.execute_tool(call))).await;

        calls
            .iter()
            .zip(outputs)
            .map(|(call, output)| Message::tool_result(&call.id, output))
            .collect()
    }

    async fn execute_tool(&self, tool_call: &ToolCallRequest) -> String {
        debug!("Executing tool: {} with args: {}", tool_call.name, tool_call.arguments);

        match self.runner.execute(&tool_call.name, tool_call.arguments.clone()).await {
            Ok(result) => {
                debug!("Tool {} succeeded: {} chars", tool_call.name, result.len());
                result
            }
            Err(e) => {
                let error_msg = format!("Error: {}", e);
                warn!("Tool {} failed: {}", tool_call.name, error_msg);
                error_msg
            }
        }
    }
}
