//! Capability Registry
//!
//! Metadata about externally hosted tool providers (MCP servers), discovered
//! once at startup. The registry is built before serving begins and is only
//! read afterwards, so it is shared as a plain `Arc<CapabilityRegistry>`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::tool::ToolDescriptor;

/// Capabilities advertised by a provider
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub server_id: String,

    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
}

/// An externally hosted tool provider
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    /// Empty when the capability document omits it; discovery fills it in
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub capabilities: ServerCapabilities,

    /// Remote-call endpoint; falls back to the invoker's default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Classification instructions deciding whether a query belongs here
    #[serde(
        default,
        rename = "isRelatedPrompt",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_related_prompt: Option<String>,

    /// Instructions for how the model should use this provider's output
    #[serde(
        default,
        rename = "processPrompt",
        skip_serializing_if = "Option::is_none"
    )]
    pub process_prompt: Option<String>,
}

impl Provider {
    /// Relevance trigger, if the provider takes part in intent routing
    pub fn trigger(&self) -> Option<&str> {
        self.is_related_prompt
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.capabilities.tools
    }

    /// Resolve an action name against the advertised tool list
    pub fn find_tool(&self, action: &str) -> Option<&ToolDescriptor> {
        let action = action.trim();
        self.tools()
            .iter()
            .find(|t| t.name == action)
            .or_else(|| {
                self.tools()
                    .iter()
                    .find(|t| t.name.eq_ignore_ascii_case(action))
            })
    }

    pub fn advertises(&self, tool_name: &str) -> bool {
        self.tools().iter().any(|t| t.name == tool_name)
    }
}

/// Provider id → provider, kept in registration order
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    providers: Vec<Arc<Provider>>,
    index: HashMap<String, usize>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from providers in registration order.
    ///
    /// A later provider with an already registered id is dropped.
    pub fn from_providers(providers: impl IntoIterator<Item = Provider>) -> Self {
        let mut registry = Self::new();
        for provider in providers {
            registry.register(provider);
        }
        registry
    }

    /// Add a provider. Returns `false` if the id was already taken.
    pub fn register(&mut self, provider: Provider) -> bool {
        if self.index.contains_key(&provider.id) {
            tracing::warn!(provider = %provider.id, "Duplicate provider id ignored");
            return false;
        }
        self.index.insert(provider.id.clone(), self.providers.len());
        self.providers.push(Arc::new(provider));
        true
    }

    pub fn get(&self, id: &str) -> Option<Arc<Provider>> {
        self.index.get(id).map(|&i| self.providers[i].clone())
    }

    /// Providers in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Provider>> {
        self.providers.iter()
    }

    /// Providers that carry a relevance trigger, in registration order
    pub fn routable(&self) -> impl Iterator<Item = &Arc<Provider>> {
        self.providers.iter().filter(|p| p.trigger().is_some())
    }

    /// First provider (in registration order) advertising `tool_name`
    pub fn provider_for_tool(&self, tool_name: &str) -> Option<Arc<Provider>> {
        self.providers
            .iter()
            .find(|p| p.advertises(tool_name))
            .cloned()
    }

    /// All provider-hosted tool descriptors
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.providers
            .iter()
            .flat_map(|p| p.tools().iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(id: &str, trigger: Option<&str>, tools: &[&str]) -> Provider {
        Provider {
            id: id.into(),
            name: format!("{id} server"),
            capabilities: ServerCapabilities {
                version: "1.0".into(),
                server_id: id.into(),
                tools: tools
                    .iter()
                    .map(|t| ToolDescriptor {
                        name: (*t).into(),
                        description: String::new(),
                        parameters: serde_json::Value::Null,
                    })
                    .collect(),
            },
            endpoint: None,
            is_related_prompt: trigger.map(Into::into),
            process_prompt: None,
        }
    }

    #[test]
    fn discovery_payload_deserializes() {
        let raw = r#"{
            "id": "weather",
            "name": "Weather service",
            "capabilities": {
                "version": "1.0",
                "server_id": "weather-01",
                "tools": [{"name": "get_forecast", "description": "Forecast", "parameters": {"city": "City name"}}]
            },
            "endpoint": "http://mcp.local/weather/",
            "isRelatedPrompt": "Is this about weather?",
            "processPrompt": "Summarize briefly"
        }"#;
        let provider: Provider = serde_json::from_str(raw).unwrap();

        assert_eq!(provider.trigger(), Some("Is this about weather?"));
        assert_eq!(provider.tools().len(), 1);
        assert_eq!(provider.endpoint.as_deref(), Some("http://mcp.local/weather/"));
        assert_eq!(provider.process_prompt.as_deref(), Some("Summarize briefly"));
    }

    #[test]
    fn blank_trigger_is_not_routable() {
        let registry = CapabilityRegistry::from_providers([
            provider("a", Some("   "), &["x"]),
            provider("b", Some("about b"), &["y"]),
            provider("c", None, &["z"]),
        ]);
        let ids: Vec<_> = registry.routable().map(|p| p.id.clone()).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn keeps_registration_order_and_first_id_wins() {
        let registry = CapabilityRegistry::from_providers([
            provider("first", None, &["shared"]),
            provider("second", None, &["shared"]),
            provider("first", None, &["other"]),
        ]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.provider_for_tool("shared").unwrap().id, "first");
        assert!(registry.provider_for_tool("other").is_none());
    }

    #[test]
    fn find_tool_falls_back_to_case_insensitive() {
        let p = provider("a", None, &["get_forecast"]);
        assert!(p.find_tool("get_forecast").is_some());
        assert!(p.find_tool(" GET_FORECAST ").is_some());
        assert!(p.find_tool("forecast").is_none());
    }
}
