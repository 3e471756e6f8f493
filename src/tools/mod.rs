//! The tool registry (C3): a per-execution map from tool name to handler and
//! parameter schema.
//!
//! Tools are constructed fresh for each execution and live only for its
//! duration — there is no process-wide tool registry, unlike the descriptor
//! store or embedding registry.

pub mod builtin;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

/// The result of a successful tool invocation. Per the executor's
/// observation-formatting rule, a `Text` value is used verbatim; a `Json`
/// value is JSON-encoded.
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    Text(String),
    Json(Value),
}

impl ToolOutcome {
    /// Render this outcome the way the executor formats a successful
    /// observation.
    pub fn render(&self) -> String {
        match self {
            ToolOutcome::Text(s) => s.clone(),
            ToolOutcome::Json(v) => v.to_string(),
        }
    }
}

/// Handler contract: `(ctx, args) -> (result, err)`. `args` is the
/// JSON-decoded `ACTION_INPUT` body.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, ctx: CancellationToken, args: Map<String, Value>) -> Result<ToolOutcome, String>;
}

/// Declares one named, typed, possibly-required tool parameter.
#[derive(Debug, Clone, Serialize)]
pub struct ToolParamSchema {
    #[serde(rename = "type")]
    pub type_tag: String,
    pub description: String,
    pub required: bool,
}

impl ToolParamSchema {
    pub fn new(type_tag: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self {
            type_tag: type_tag.into(),
            description: description.into(),
            required,
        }
    }
}

/// A registered tool: name, description, parameter schema, and handler.
#[derive(Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: HashMap<String, ToolParamSchema>,
    pub handler: Arc<dyn ToolHandler>,
}

/// Per-execution mapping from tool name to handler.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolSpec>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any existing tool of the same name.
    pub fn register(&mut self, spec: ToolSpec) {
        self.tools.insert(spec.name.clone(), spec);
    }

    /// Remove a tool by name.
    pub fn deregister(&mut self, name: &str) {
        self.tools.remove(name);
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    /// Iterate registered tools.
    pub fn list(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.values()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Render the `{{TOOLS}}` manifest block for the system prompt:
    /// `- <name>: <description>\n  Parameters: <JSON-encoded schema>`, one
    /// entry per registered tool.
    pub fn manifest(&self) -> String {
        if self.tools.is_empty() {
            return "No tools are available for this task.".to_string();
        }

        let mut names: Vec<&ToolSpec> = self.tools.values().collect();
        names.sort_by(|a, b| a.name.cmp(&b.name));

        names
            .iter()
            .map(|spec| {
                let schema = serde_json::to_string(&spec.parameters).unwrap_or_else(|_| "{}".to_string());
                format!("- {}: {}\n  Parameters: {}", spec.name, spec.description, schema)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
