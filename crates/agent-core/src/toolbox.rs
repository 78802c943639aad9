//! Tool dispatch across local tools and provider-hosted tools.

use async_trait::async_trait;
use std::sync::Arc;

use crate::capability::{CapabilityRegistry, Provider};
use crate::error::{AgentError, Result};
use crate::tool::{ToolCall, ToolDescriptor, ToolRegistry, ToolResult};

/// Performs one remote tool call against a provider
#[async_trait]
pub trait RemoteToolClient: Send + Sync {
    async fn call_tool(&self, provider: &Provider, call: &ToolCall) -> Result<ToolResult>;
}

/// Every tool the agent can reach
pub struct Toolbox {
    local: ToolRegistry,
    providers: Arc<CapabilityRegistry>,
    remote: Option<Arc<dyn RemoteToolClient>>,
}

impl Toolbox {
    /// Local tools only
    pub fn local(local: ToolRegistry) -> Self {
        Self {
            local,
            providers: Arc::new(CapabilityRegistry::new()),
            remote: None,
        }
    }

    pub fn new(
        local: ToolRegistry,
        providers: Arc<CapabilityRegistry>,
        remote: Arc<dyn RemoteToolClient>,
    ) -> Self {
        Self {
            local,
            providers,
            remote: Some(remote),
        }
    }

    pub fn providers(&self) -> &Arc<CapabilityRegistry> {
        &self.providers
    }

    /// Local descriptors followed by provider descriptors
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut descriptors = self.local.descriptors();
        if self.remote.is_some() {
            descriptors.extend(self.providers.descriptors());
        }
        descriptors
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors().is_empty()
    }

    /// Run a call: local tool first, then the first provider advertising it
    pub async fn invoke(&self, call: &ToolCall) -> Result<ToolResult> {
        if self.local.contains(&call.name) {
            tracing::debug!(tool = %call.name, "Executing local tool");
            return self.local.execute(call).await;
        }

        match self.providers.provider_for_tool(&call.name) {
            Some(provider) => self.invoke_on(&provider, call).await,
            None => Err(AgentError::ToolNotFound(call.name.clone())),
        }
    }

    /// Run a call on a specific provider
    pub async fn invoke_on(&self, provider: &Provider, call: &ToolCall) -> Result<ToolResult> {
        let remote = self
            .remote
            .as_ref()
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        tracing::debug!(provider = %provider.id, tool = %call.name, "Calling provider tool");
        remote.call_tool(provider, call).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::ServerCapabilities;
    use crate::testing::RecordingRemoteClient;
    use crate::tool::WeatherTool;

    fn registry_with(tool: &str) -> Arc<CapabilityRegistry> {
        Arc::new(CapabilityRegistry::from_providers([Provider {
            id: "remote".into(),
            name: "Remote".into(),
            capabilities: ServerCapabilities {
                tools: vec![ToolDescriptor {
                    name: tool.into(),
                    description: "remote tool".into(),
                    parameters: serde_json::Value::Null,
                }],
                ..Default::default()
            },
            endpoint: None,
            is_related_prompt: None,
            process_prompt: None,
        }]))
    }

    fn local_weather() -> ToolRegistry {
        let mut local = ToolRegistry::new();
        local.register(WeatherTool);
        local
    }

    #[tokio::test]
    async fn local_tools_shadow_remote_ones() {
        let remote = Arc::new(RecordingRemoteClient::new());
        let toolbox = Toolbox::new(
            local_weather(),
            registry_with("get_current_weather"),
            remote.clone(),
        );

        let call = ToolCall::named("get_current_weather")
            .with_argument("location", serde_json::json!("Taipei"));
        let result = toolbox.invoke(&call).await.unwrap();

        assert!(result.observation.contains("Taipei"));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_local_tool_goes_to_advertising_provider() {
        let remote = Arc::new(RecordingRemoteClient::new().with_reply(Ok("3 open orders".into())));
        let toolbox = Toolbox::new(local_weather(), registry_with("list_orders"), remote.clone());

        let result = toolbox.invoke(&ToolCall::named("list_orders")).await.unwrap();

        assert_eq!(result.observation, "3 open orders");
        assert_eq!(remote.calls()[0].0, "remote");
    }

    #[tokio::test]
    async fn unadvertised_tool_is_not_found() {
        let toolbox = Toolbox::new(
            local_weather(),
            registry_with("list_orders"),
            Arc::new(RecordingRemoteClient::new()),
        );
        let err = toolbox.invoke(&ToolCall::named("launch")).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolNotFound(_)));
    }

    #[test]
    fn descriptors_list_local_then_remote() {
        let toolbox = Toolbox::new(
            local_weather(),
            registry_with("list_orders"),
            Arc::new(RecordingRemoteClient::new()),
        );
        let names: Vec<_> = toolbox.descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["get_current_weather", "list_orders"]);
    }
}
