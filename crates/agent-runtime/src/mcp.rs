//! MCP Tool Invocation
//!
//! Calls provider-hosted tools with a JSON-RPC `tools/call` request and turns
//! the reply into an observation string.
//!
//! ```text
//! → {"jsonrpc":"2.0","method":"tools/call","id":"…","params":{"name":"…","arguments":{…}}}
//! ← {"jsonrpc":"2.0","id":"…","result":{"content":[{"type":"text","text":"…"}],"isError":false}}
//! ```

use std::collections::HashMap;
use std::time::Duration;

use agent_core::{
    capability::Provider,
    error::{AgentError, Result},
    tool::{ToolCall, ToolResult},
    toolbox::RemoteToolClient,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Observation used when a tool succeeds without returning content
pub const EMPTY_RESULT_OBSERVATION: &str = "Operation completed";

/// MCP invoker configuration
#[derive(Clone, Debug)]
pub struct McpConfig {
    /// Default provider server, used when a provider has no endpoint of its own
    pub server_url: Option<String>,

    /// Path prefix under `server_url`
    pub server_path: String,

    /// `jsonrpc` field of outgoing requests
    pub jsonrpc_version: String,

    /// Budget for one tool call
    pub timeout: Duration,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            server_path: "/".into(),
            jsonrpc_version: "2.0".into(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl McpConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let server_url = std::env::var("MCP_SERVER_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());
        let server_path = std::env::var("MCP_SERVER_PATH").unwrap_or(defaults.server_path);
        let jsonrpc_version = std::env::var("JSONRPC_VERSION")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.jsonrpc_version);
        let timeout = std::env::var("MCP_CALL_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map_or(defaults.timeout, Duration::from_secs);

        Self {
            server_url,
            server_path,
            jsonrpc_version,
            timeout,
        }
    }

    /// `{server_url}{server_path}request`, if a default server is configured
    pub fn default_endpoint(&self) -> Option<String> {
        self.server_url
            .as_ref()
            .map(|url| format!("{url}{}request", self.server_path))
    }
}

/// JSON-RPC `tools/call` request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallToolRequest {
    pub jsonrpc: String,
    pub method: String,
    pub id: String,
    pub params: CallToolParams,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,

    #[serde(default)]
    pub arguments: HashMap<String, serde_json::Value>,
}

impl CallToolRequest {
    pub fn new(jsonrpc: impl Into<String>, call: &ToolCall) -> Self {
        Self {
            jsonrpc: jsonrpc.into(),
            method: "tools/call".into(),
            id: uuid::Uuid::new_v4().to_string(),
            params: CallToolParams {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            },
        }
    }
}

/// JSON-RPC reply to `tools/call`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CallToolResponse {
    #[serde(default)]
    pub jsonrpc: String,

    #[serde(default)]
    pub id: serde_json::Value,

    #[serde(default)]
    pub result: Option<CallToolResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcError {
    #[serde(default)]
    pub code: i64,

    #[serde(default)]
    pub message: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ResultContent>,

    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResultContent {
    #[serde(default, rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub text: String,
}

impl CallToolResponse {
    /// Observation text, or the error the tool reported
    pub fn into_observation(self) -> Result<String> {
        if let Some(error) = self.error {
            return Err(AgentError::ToolExecution(format!(
                "{} (code {})",
                error.message, error.code
            )));
        }

        let result = self.result.unwrap_or_default();
        let first = result.content.into_iter().next().map(|c| c.text);

        if result.is_error {
            return Err(AgentError::ToolExecution(
                first.unwrap_or_else(|| "tool reported an error".into()),
            ));
        }
        Ok(first.unwrap_or_else(|| EMPTY_RESULT_OBSERVATION.into()))
    }
}

/// JSON-RPC client for provider-hosted tools
pub struct McpClient {
    http: reqwest::Client,
    config: McpConfig,
}

impl McpClient {
    pub fn new(config: McpConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AgentError::Config(format!("HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(McpConfig::from_env())
    }

    pub fn config(&self) -> &McpConfig {
        &self.config
    }

    /// Where calls for `provider` are sent
    pub fn endpoint_for(&self, provider: &Provider) -> Result<String> {
        provider
            .endpoint
            .clone()
            .filter(|e| !e.trim().is_empty())
            .or_else(|| self.config.default_endpoint())
            .ok_or_else(|| {
                AgentError::InvocationFailed(format!("no endpoint for provider '{}'", provider.id))
            })
    }

    /// Send one `tools/call` to `endpoint`
    pub async fn call(&self, endpoint: &str, call: &ToolCall) -> Result<String> {
        let request = CallToolRequest::new(&self.config.jsonrpc_version, call);

        let response = self
            .http
            .post(endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::InvocationFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AgentError::InvocationFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(AgentError::ProviderError {
                status: status.as_u16(),
                body,
            });
        }

        let reply: CallToolResponse = serde_json::from_str(&body)
            .map_err(|e| AgentError::InvocationFailed(format!("unreadable reply: {e}")))?;
        reply.into_observation()
    }
}

#[async_trait]
impl RemoteToolClient for McpClient {
    async fn call_tool(&self, provider: &Provider, call: &ToolCall) -> Result<ToolResult> {
        let endpoint = self.endpoint_for(provider)?;
        tracing::info!(provider = %provider.id, tool = %call.name, %endpoint, "Calling MCP tool");

        let observation = self.call(&endpoint, call).await?;
        Ok(ToolResult::new(observation)
            .with_metadata("provider", serde_json::Value::String(provider.id.clone())))
    }
}
