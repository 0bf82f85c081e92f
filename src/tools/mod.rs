//! Capability contracts.
//!
//! A `Tool` is a named, typed callable an agent may invoke. Tools validate
//! their own argument shapes and fail fast with a descriptive error; they
//! also declare whether invocation has effects outside the process, so
//! callers know which capabilities are safe to repeat.

mod email;
mod web;

pub use email::SendEmail;
pub use web::{VisitPage, WebSearch};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// Error from a tool invocation.
///
/// The two variants drive different loop behavior: a `Recoverable` error is
/// recorded in the run history and the agent keeps going; a `Fault`
/// terminates the owning run.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Bad arguments, upstream rejection, empty results. Recorded as a step
    /// outcome; the agent can react to it.
    #[error("{0}")]
    Recoverable(String),
    /// Broken transport or other unrecoverable condition inside the tool.
    #[error("{0}")]
    Fault(String),
}

impl ToolError {
    /// Shorthand for a recoverable error with a formatted reason.
    pub fn recoverable(reason: impl Into<String>) -> Self {
        ToolError::Recoverable(reason.into())
    }

    /// Shorthand for a hard fault.
    pub fn fault(reason: impl Into<String>) -> Self {
        ToolError::Fault(reason.into())
    }
}

/// A capability an agent can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the oracle addresses this tool by.
    fn name(&self) -> &str;

    /// Human-readable description advertised to the oracle.
    fn description(&self) -> &str;

    /// JSON Schema of the accepted arguments.
    fn parameters_schema(&self) -> Value;

    /// Whether invocation has effects outside the process. Pure queries
    /// (search, fetch) return false; dispatch tools return true.
    fn has_side_effects(&self) -> bool {
        false
    }

    /// Invoke the tool with the given arguments.
    async fn execute(&self, args: Value) -> Result<String, ToolError>;
}

/// What an agent advertises to its oracle about one entry in its toolset.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub kind: ToolKind,
}

/// Whether a toolset entry is a raw capability or a delegatable agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Capability,
    Delegate,
}

/// Immutable lookup table of tools, built at agent construction time.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of tools.
    pub fn with_tools(tools: Vec<Arc<dyn Tool>>) -> Self {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    /// Register a tool. Later registrations shadow earlier ones by name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry has no tools.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Specs of every registered tool, sorted by name for a stable order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self
            .tools
            .values()
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
                kind: ToolKind::Capability,
            })
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Invoke a tool by name. An unknown name is a recoverable error so the
    /// agent gets a chance to correct itself.
    pub async fn dispatch(&self, name: &str, args: Value) -> Result<String, ToolError> {
        match self.tools.get(name) {
            Some(tool) => tool.execute(args).await,
            None => Err(ToolError::recoverable(format!("unknown capability: {name}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    #[async_trait]
    impl Tool for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn description(&self) -> &str {
            "Uppercase the input"
        }

        fn parameters_schema(&self) -> Value {
            serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }

        async fn execute(&self, args: Value) -> Result<String, ToolError> {
            let text = args["text"]
                .as_str()
                .ok_or_else(|| ToolError::recoverable("Missing 'text' argument"))?;
            Ok(text.to_uppercase())
        }
    }

    #[tokio::test]
    async fn dispatch_routes_by_name() {
        let registry = ToolRegistry::with_tools(vec![Arc::new(Upper)]);
        let result = registry
            .dispatch("upper", serde_json::json!({"text": "hi"}))
            .await
            .unwrap();
        assert_eq!(result, "HI");
    }

    #[tokio::test]
    async fn unknown_tool_is_recoverable() {
        let registry = ToolRegistry::new();
        let err = registry
            .dispatch("nope", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Recoverable(_)));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn specs_are_capability_kind_and_sorted() {
        let registry = ToolRegistry::with_tools(vec![Arc::new(Upper)]);
        let specs = registry.specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "upper");
        assert_eq!(specs[0].kind, ToolKind::Capability);
    }
}
