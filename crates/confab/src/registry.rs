use std::collections::HashMap;
use std::future::Future;

use anyhow::Result;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use crate::errors::{ToolError, ToolResult};
use crate::models::tool::Tool;

type ToolFn = Box<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// What one tool invocation produced. The correlation id is attached by
/// the caller when the output is threaded back into a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success<S: Into<String>>(content: S) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error<S: Into<String>>(content: S) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

struct RegisteredTool {
    tool: Tool,
    function: ToolFn,
}

/// Name to function resolution plus schema advertisement. Built once at
/// startup, then shared read-only across conversations; `describe_all`
/// and `invoke` take `&self` so a registry behind `Arc` can serve
/// concurrent exchanges.
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Add a tool and the function that backs it. The function receives
    /// the argument object from the model and produces either a string or
    /// a structured value.
    pub fn register<F, Fut>(&mut self, tool: Tool, function: F) -> ToolResult<()>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        if self.index.contains_key(&tool.name) {
            return Err(ToolError::DuplicateTool(tool.name.clone()));
        }
        self.index.insert(tool.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool {
            tool,
            function: Box::new(move |arguments| Box::pin(function(arguments))),
        });
        Ok(())
    }

    /// The advertised tool specs, in registration order. The order is
    /// stable for the life of the registry, so callers may cache it.
    pub fn describe_all(&self) -> Vec<Tool> {
        self.tools.iter().map(|entry| entry.tool.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Look up a tool by name and run it with the given arguments.
    ///
    /// Missing required parameters (per the schema's `required` array)
    /// reject with `InvalidArguments`; unknown extra parameters are
    /// tolerated and passed through to the function. A failure inside the
    /// function itself never becomes an `Err` here: it is captured as an
    /// error-flagged output so the conversation can continue.
    pub async fn invoke(&self, name: &str, arguments: Value) -> ToolResult<ToolOutput> {
        let entry = self
            .index
            .get(name)
            .map(|&position| &self.tools[position])
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        validate_arguments(&entry.tool, &arguments)?;

        debug!(tool = name, "dispatching tool call");
        match (entry.function)(arguments).await {
            Ok(value) => Ok(ToolOutput::success(render_output(value))),
            Err(error) => {
                debug!(tool = name, error = %error, "tool call failed");
                Ok(ToolOutput::error(format!("{error:#}")))
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Check the argument object against the tool's required parameters
fn validate_arguments(tool: &Tool, arguments: &Value) -> ToolResult<()> {
    let required = tool
        .input_schema
        .get("required")
        .and_then(|required| required.as_array());

    if let Some(required) = required {
        for parameter in required.iter().filter_map(|name| name.as_str()) {
            if arguments.get(parameter).is_none() {
                return Err(ToolError::InvalidArguments(format!(
                    "missing required parameter '{}' for tool '{}'",
                    parameter, tool.name
                )));
            }
        }
    }
    Ok(())
}

/// Strings pass through untouched; anything structured becomes canonical
/// JSON text for transmission.
fn render_output(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::json;
    use std::sync::Arc;

    fn echo_tool() -> Tool {
        Tool::new(
            "echo",
            "Echoes back the input",
            json!({
                "type": "object",
                "properties": {
                    "message": {"type": "string", "description": "The text to echo"}
                },
                "required": ["message"]
            }),
        )
    }

    fn echo_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register(echo_tool(), |arguments| async move {
                Ok(arguments.get("message").cloned().unwrap_or(Value::Null))
            })
            .unwrap();
        registry
    }

    #[test]
    fn test_register_duplicate_fails() {
        let mut registry = echo_registry();
        let result = registry.register(echo_tool(), |_| async { Ok(Value::Null) });
        assert!(matches!(result, Err(ToolError::DuplicateTool(name)) if name == "echo"));
    }

    #[test]
    fn test_describe_all_keeps_registration_order() {
        let mut registry = ToolRegistry::new();
        for name in ["first", "second", "third"] {
            registry
                .register(
                    Tool::new(name, "A test tool", json!({"type": "object"})),
                    |_| async { Ok(Value::Null) },
                )
                .unwrap();
        }

        let names: Vec<String> = registry
            .describe_all()
            .into_iter()
            .map(|tool| tool.name)
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        // A second read sees the same order
        let again: Vec<String> = registry
            .describe_all()
            .into_iter()
            .map(|tool| tool.name)
            .collect();
        assert_eq!(names, again);
    }

    #[tokio::test]
    async fn test_invoke_unknown_tool() {
        let registry = echo_registry();
        let result = registry.invoke("nonexistent", json!({})).await;
        assert!(matches!(result, Err(ToolError::UnknownTool(name)) if name == "nonexistent"));
    }

    #[tokio::test]
    async fn test_invoke_missing_required_argument() {
        let registry = echo_registry();
        let result = registry.invoke("echo", json!({})).await;
        match result {
            Err(ToolError::InvalidArguments(message)) => {
                assert!(message.contains("message"));
            }
            other => panic!("expected InvalidArguments, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invoke_tolerates_extra_arguments() {
        let registry = echo_registry();
        let output = registry
            .invoke("echo", json!({"message": "hi", "verbose": true}))
            .await
            .unwrap();
        assert!(!output.is_error);
        assert_eq!(output.content, "hi");
    }

    #[tokio::test]
    async fn test_invoke_passes_string_output_verbatim() {
        let registry = echo_registry();
        let output = registry.invoke("echo", json!({"message": "hi"})).await.unwrap();
        assert_eq!(output.content, "hi");
    }

    #[tokio::test]
    async fn test_invoke_serializes_structured_output() {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                Tool::new("stats", "Returns word stats", json!({"type": "object"})),
                |_| async { Ok(json!({"count": 3})) },
            )
            .unwrap();

        let output = registry.invoke("stats", json!({})).await.unwrap();
        assert!(!output.is_error);
        assert_eq!(output.content, r#"{"count":3}"#);
    }

    #[tokio::test]
    async fn test_failing_tool_becomes_error_output() {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                Tool::new("explode", "Always fails", json!({"type": "object"})),
                |_| async { Err(anyhow!("boom")) },
            )
            .unwrap();

        let output = registry.invoke("explode", json!({})).await.unwrap();
        assert!(output.is_error);
        assert!(output.content.contains("boom"));
    }

    #[tokio::test]
    async fn test_concurrent_invocations_share_registry() {
        let registry = Arc::new(echo_registry());

        let mut handles = Vec::new();
        for text in ["one", "two", "three"] {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry.invoke("echo", json!({"message": text})).await
            }));
        }

        let mut contents = Vec::new();
        for handle in handles {
            contents.push(handle.await.unwrap().unwrap().content);
        }
        assert_eq!(contents, vec!["one", "two", "three"]);
    }
}
