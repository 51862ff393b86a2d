//! Tool system for the agents.
//!
//! Worker tools are deterministic mocks with randomized figures; each one
//! reports its progress to the session's thought stream through a scoped
//! entry opened before the work and closed after it. The orchestrator's
//! `emit_thought` tool exposes the scan-based emission API to the model.

mod analysis;
mod research;
mod summary;
mod thought;

pub use analysis::{AnalyzeData, CalculateMetrics};
pub use research::{SearchKnowledgeBase, WebSearch};
pub use summary::{ExtractKeyPoints, FormatReport};
pub use thought::EmitThought;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{FunctionDefinition, ToolDefinition};
use crate::thoughts::{SharedSession, ThoughtStatus, ThoughtToken};

/// What a tool sees of the run that invoked it.
#[derive(Clone)]
pub struct ToolContext {
    pub agent_name: String,
    pub session: SharedSession,
}

impl ToolContext {
    pub fn new(agent_name: impl Into<String>, session: SharedSession) -> Self {
        Self {
            agent_name: agent_name.into(),
            session,
        }
    }

    /// Open a running thought for this agent.
    pub async fn begin(&self, message: &str) -> ThoughtToken {
        self.session.emit_scoped(&self.agent_name, message).await
    }

    /// Close a thought opened with [`begin`](Self::begin).
    pub async fn finish(&self, token: &ThoughtToken, message: &str) {
        self.session
            .complete(token, message, ThoughtStatus::Completed)
            .await;
    }
}

/// Trait for implementing tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does.
    fn description(&self) -> &str;

    /// JSON schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<Value>;
}

/// Registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new registry with all built-in tools.
    pub fn new() -> Self {
        let mut registry = Self::empty();

        // Orchestrator
        registry.register(Arc::new(thought::EmitThought));

        // Research
        registry.register(Arc::new(research::SearchKnowledgeBase));
        registry.register(Arc::new(research::WebSearch));

        // Analysis
        registry.register(Arc::new(analysis::AnalyzeData));
        registry.register(Arc::new(analysis::CalculateMetrics));

        // Summary
        registry.register(Arc::new(summary::FormatReport));
        registry.register(Arc::new(summary::ExtractKeyPoints));

        tracing::debug!("Tool registry ready with {} tools", registry.tools.len());
        registry
    }

    /// Create an empty registry (no built-in tools).
    pub fn empty() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Check if a tool exists by name.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Schemas for the named tools in LLM-compatible format, in the given order.
    ///
    /// Unknown names are skipped.
    pub fn get_tool_schemas(&self, names: &[&str]) -> Vec<ToolDefinition> {
        names
            .iter()
            .filter_map(|name| self.tools.get(*name))
            .map(|t| ToolDefinition {
                tool_type: "function".to_string(),
                function: FunctionDefinition {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    parameters: t.parameters_schema(),
                },
            })
            .collect()
    }

    /// Execute a tool by name.
    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolContext,
    ) -> anyhow::Result<Value> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: {}", name))?;

        tool.execute(args, ctx).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Required argument rendered as a string.
///
/// Models send scalars loosely typed, so numbers and booleans are accepted and
/// stringified.
pub(crate) fn str_arg(args: &Value, key: &str) -> anyhow::Result<String> {
    opt_str_arg(args, key).ok_or_else(|| anyhow::anyhow!("Missing required argument: {}", key))
}

pub(crate) fn opt_str_arg(args: &Value, key: &str) -> Option<String> {
    match args.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Optional non-negative integer argument, accepting numeric strings.
pub(crate) fn opt_usize_arg(args: &Value, key: &str) -> Option<usize> {
    match args.get(key)? {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Round to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
