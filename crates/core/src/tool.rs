//! ToolProvider trait: the abstraction over worker capabilities.
//!
//! Tools are what let an actor act in the world: read files, fetch URLs,
//! query services. Every tool declares a capability category; the dispatcher
//! matches tasks to workers by those categories.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// A request to invoke a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the model's tool_call.id)
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// The result of one tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// The call ID this outcome is for
    pub call_id: String,

    /// Whether the invocation succeeded
    pub success: bool,

    /// The output content
    pub output: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// The tool-invocation contract.
///
/// Each tool implements this trait and is registered in a `ToolRegistry`,
/// which makes it visible to the model and routable by capability.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// The unique name of this tool (e.g., "file_read").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// The capability category this tool belongs to (e.g., "filesystem").
    fn capability(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Invoke the tool with the given arguments.
    async fn invoke(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolOutcome, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
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
/// The reasoning loop uses this to:
/// 1. Get tool definitions to send to the model
/// 2. Look up and invoke tools when the model requests them
/// 3. Report the capability categories its tools cover
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn ToolProvider>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn ToolProvider>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn ToolProvider> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get all tool definitions (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// The distinct capability categories covered by registered tools.
    pub fn capabilities(&self) -> BTreeSet<String> {
        self.tools.values().map(|t| t.capability().to_string()).collect()
    }

    /// Invoke a tool call.
    pub async fn invoke(&self, call: &ToolCall) -> std::result::Result<ToolOutcome, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        tool.invoke(call.arguments.clone()).await
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
