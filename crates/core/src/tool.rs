//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what the model may invoke before answering. Each one declares
//! a name, a description and a JSON schema; the loop dispatches calls
//! through the `ToolRegistry` without knowing which tools exist.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::ToolError;
use crate::message::ToolCall;
use crate::provider::ToolDefinition;

/// The result of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// The observation text appended to the history
    pub output: String,
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "search_latest_knowledge").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
///
/// Built once at gateway construction and shared read-only between
/// requests. Iteration order is by name so tool schemas are sent to the
/// model in a stable order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get all tool definitions (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call.
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        let output = tool.execute(call.arguments.clone()).await?;
        Ok(ToolResult {
            call_id: call.id.clone(),
            output,
        })
    }

    /// Execute a tool call, failing with `ToolError::Timeout` if it does not
    /// settle within `limit`. The tool future is dropped on timeout.
    pub async fn execute_with_timeout(
        &self,
        call: &ToolCall,
        limit: Duration,
    ) -> Result<ToolResult, ToolError> {
        match tokio::time::timeout(limit, self.execute(call)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(tool = %call.name, timeout_ms = limit.as_millis() as u64, "Tool call timed out");
                Err(ToolError::Timeout {
                    tool_name: call.name.clone(),
                    timeout_ms: limit.as_millis() as u64,
                })
            }
        }
    }
}
