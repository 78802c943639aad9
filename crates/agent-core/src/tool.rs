//! Tool System
//!
//! Tool model shared by local (in-process) tools and provider-hosted tools,
//! plus the registry of local tools.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::error::{AgentError, Result};

/// Tool call request from the model or the intent router
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier
    pub name: String,

    /// Arguments as key-value pairs
    #[serde(default)]
    pub arguments: HashMap<String, serde_json::Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: HashMap<String, serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Call without arguments
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, HashMap::new())
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.arguments.insert(key.into(), value);
        self
    }
}

/// Result from tool execution, folded into the next prompt
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    /// Text shown to the model
    pub observation: String,

    /// Structured extras (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl ToolResult {
    pub fn new(observation: impl Into<String>) -> Self {
        Self {
            observation: observation.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }
}

/// Tool description advertised to the model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to the model)
    #[serde(default)]
    pub description: String,

    /// Parameter schema. Local tools use JSON Schema; providers may send a
    /// flat name → description map.
    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl ToolDescriptor {
    /// Names listed under the schema's `required` array
    pub fn required_parameters(&self) -> Vec<&str> {
        self.parameters
            .get("required")
            .and_then(|r| r.as_array())
            .map(|names| names.iter().filter_map(|n| n.as_str()).collect())
            .unwrap_or_default()
    }
}

/// Tool trait - implement to add new local capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Describe the tool for the model
    fn descriptor(&self) -> ToolDescriptor;

    /// Execute the tool with given arguments
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult>;

    /// Validate arguments before execution (optional)
    fn validate(&self, call: &ToolCall) -> Result<()> {
        let descriptor = self.descriptor();

        for name in descriptor.required_parameters() {
            if !call.arguments.contains_key(name) {
                return Err(AgentError::ToolValidation(format!(
                    "Missing required parameter: {name}"
                )));
            }
        }

        Ok(())
    }
}

/// Registry for local tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Register a shared tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.descriptor().name;
        self.tools.insert(name, tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Execute a tool call
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        tool.validate(call)?;
        tool.execute(call).await
    }

    /// Descriptors of all local tools, sorted by name
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<_> = self.tools.values().map(|t| t.descriptor()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Render the prompt section describing the given tools
    pub fn prompt_section(descriptors: &[ToolDescriptor]) -> String {
        let mut prompt = String::from("## Available Tools\n\n");

        for descriptor in descriptors {
            let _ = writeln!(prompt, "### {}", descriptor.name);
            let _ = writeln!(prompt, "{}", descriptor.description);

            if let Some(properties) = descriptor
                .parameters
                .get("properties")
                .and_then(|p| p.as_object())
            {
                let required = descriptor.required_parameters();
                prompt.push_str("**Parameters:**\n");
                for (name, schema) in properties {
                    let kind = schema.get("type").and_then(|t| t.as_str()).unwrap_or("any");
                    let about = schema
                        .get("description")
                        .and_then(|d| d.as_str())
                        .unwrap_or_default();
                    let marker = if required.contains(&name.as_str()) {
                        " (required)"
                    } else {
                        ""
                    };
                    let _ = writeln!(prompt, "- `{name}` ({kind}){marker}: {about}");
                }
            } else if let Some(flat) = descriptor
                .parameters
                .as_object()
                .filter(|m| !m.is_empty() && !m.contains_key("type"))
            {
                // provider-style name → description map
                prompt.push_str("**Parameters:**\n");
                for (name, about) in flat {
                    let _ = writeln!(prompt, "- `{name}`: {}", about.as_str().unwrap_or_default());
                }
            }
            prompt.push('\n');
        }

        prompt
    }
}

// ============================================================================
// Built-in Tools
// ============================================================================

/// Weather tool - canned current conditions for a city
pub struct WeatherTool;

#[async_trait]
impl Tool for WeatherTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "get_current_weather".into(),
            description: "Get the current weather for a city".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "City name, e.g. 'Taipei'"
                    }
                },
                "required": ["location"]
            }),
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let location = call
            .arguments
            .get("location")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AgentError::ToolValidation("missing location argument".into()))?;

        Ok(ToolResult::new(format!(
            "The weather in {location} is currently 25°C and sunny."
        ))
        .with_metadata("location", serde_json::json!(location)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn weather_tool_reports_location() {
        let mut registry = ToolRegistry::new();
        registry.register(WeatherTool);

        let call = ToolCall::named("get_current_weather")
            .with_argument("location", serde_json::json!("Taipei"));
        let result = registry.execute(&call).await.unwrap();

        assert_eq!(
            result.observation,
            "The weather in Taipei is currently 25°C and sunny."
        );
        assert_eq!(
            result.metadata.unwrap().get("location"),
            Some(&serde_json::json!("Taipei"))
        );
    }

    #[tokio::test]
    async fn missing_required_argument_fails_validation() {
        let mut registry = ToolRegistry::new();
        registry.register(WeatherTool);

        let err = registry
            .execute(&ToolCall::named("get_current_weather"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ToolValidation(_)));
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let registry = ToolRegistry::new();
        let err = registry.execute(&ToolCall::named("nope")).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolNotFound(name) if name == "nope"));
    }

    #[test]
    fn prompt_section_lists_parameters() {
        let section = ToolRegistry::prompt_section(&[WeatherTool.descriptor()]);
        assert!(section.contains("### get_current_weather"));
        assert!(section.contains("- `location` (string) (required)"));
    }

    #[test]
    fn prompt_section_handles_flat_provider_parameters() {
        let descriptor = ToolDescriptor {
            name: "lookup_order".into(),
            description: "Find an order".into(),
            parameters: serde_json::json!({"order_id": "The order number"}),
        };
        let section = ToolRegistry::prompt_section(&[descriptor]);
        assert!(section.contains("- `order_id`: The order number"));
    }
}
