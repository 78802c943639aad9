//! Ollama Text Generator
//!
//! Implementation of `TextGenerator` for local Ollama inference. Generation
//! goes straight to `/api/generate` over reqwest so tool calls and
//! malformed lines can be handled per line; health and model listing use
//! the `ollama-rs` client.

use agent_core::{
    error::{AgentError, Result},
    generation::{GenerationStream, ModelInfo, TextGenerator},
    tool::ToolDescriptor,
};
use async_trait::async_trait;
use ollama_rs::Ollama;
use serde::{Deserialize, Serialize};

use crate::ndjson;

/// Ollama generator configuration
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama host URL
    pub host: String,

    /// Ollama port
    pub port: u16,

    /// Model used for every request
    pub model: String,

    /// System directive sent with streaming requests
    pub system_prompt: Option<String>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".into(),
            port: 11434,
            model: "llama3.2".into(),
            system_prompt: None,
        }
    }
}

impl OllamaConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let host = std::env::var("OLLAMA_HOST").unwrap_or(defaults.host);
        let port = std::env::var("OLLAMA_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);
        let model = std::env::var("OLLAMA_MODEL").unwrap_or(defaults.model);
        let system_prompt = std::env::var("OLLAMA_SYSTEM_PROMPT")
            .ok()
            .filter(|s| !s.trim().is_empty());

        Self {
            host,
            port,
            model,
            system_prompt,
        }
    }

    /// `host:port` without a trailing slash
    pub fn base_url(&self) -> String {
        format!("{}:{}", self.host.trim_end_matches('/'), self.port)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<FunctionTool<'a>>,
}

/// Tool in Ollama's function-calling format
#[derive(Serialize)]
struct FunctionTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolDescriptor,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Ollama text generator
pub struct OllamaGenerator {
    http: reqwest::Client,
    client: Ollama,
    config: OllamaConfig,
}

impl OllamaGenerator {
    /// Create a generator with custom host/port and the default model
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::from_config(OllamaConfig {
            host: host.into(),
            port,
            ..Default::default()
        })
    }

    /// Create from configuration
    pub fn from_config(config: OllamaConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            client: Ollama::new(&config.host, config.port),
            config,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Self {
        Self::from_config(OllamaConfig::from_env())
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.config.base_url())
    }

    async fn post(&self, request: &GenerateRequest<'_>) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(self.generate_url())
            .json(request)
            .send()
            .await
            .map_err(|e| AgentError::BackendUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::BackendUnavailable(format!(
                "Ollama returned {status}: {body}"
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        tools: &[ToolDescriptor],
    ) -> Result<GenerationStream> {
        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: true,
            system: self.config.system_prompt.as_deref(),
            tools: tools
                .iter()
                .map(|function| FunctionTool {
                    kind: "function",
                    function,
                })
                .collect(),
        };

        tracing::debug!(model = %self.config.model, tools = tools.len(), "Starting generation stream");
        let response = self.post(&request).await?;
        Ok(ndjson::decode_stream(response.bytes_stream()))
    }

    async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String> {
        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            system,
            tools: Vec::new(),
        };

        let response = self.post(&request).await?;
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AgentError::MalformedChunk(e.to_string()))?;
        Ok(body.response)
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.list_local_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Ollama health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let models = self
            .client
            .list_local_models()
            .await
            .map_err(|e| AgentError::BackendUnavailable(e.to_string()))?;

        Ok(models
            .into_iter()
            .map(|m| ModelInfo {
                name: m.name,
                size_bytes: m.size,
                modified_at: Some(m.modified_at),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{serve, unreachable_url};
    use agent_core::generation::GenerationChunk;
    use axum::{routing::post, Json, Router};
    use futures::StreamExt;
    use std::sync::{Arc, Mutex};

    fn generator_at(url: &str) -> OllamaGenerator {
        let (host, port) = url.rsplit_once(':').unwrap();
        OllamaGenerator::from_config(OllamaConfig {
            host: host.into(),
            port: port.parse().unwrap(),
            model: "test-model".into(),
            system_prompt: Some("be brief".into()),
        })
    }

    #[test]
    fn test_config_defaults() {
        let config = OllamaConfig::default();
        assert_eq!(config.host, "http://localhost");
        assert_eq!(config.port, 11434);
        assert_eq!(config.base_url(), "http://localhost:11434");
    }

    #[tokio::test]
    async fn streams_text_then_tool_call() {
        let seen = Arc::new(Mutex::new(None));
        let captured = seen.clone();
        let app = Router::new().route(
            "/api/generate",
            post(move |Json(body): Json<serde_json::Value>| {
                let captured = captured.clone();
                async move {
                    *captured.lock().unwrap() = Some(body);
                    concat!(
                        "{\"response\":\"Checking\"}\n",
                        "{\"response\":\"\",\"tool_calls\":[{\"function\":{\"name\":\"get_current_weather\",\"arguments\":{\"location\":\"Taipei\"}}}]}\n",
                        "{\"response\":\"\",\"done\":true}\n",
                    )
                }
            }),
        );
        let generator = generator_at(&serve(app).await);

        let tools = [ToolDescriptor {
            name: "get_current_weather".into(),
            description: "weather".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let chunks: Vec<_> = generator
            .generate_stream("weather in Taipei?", &tools)
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;

        assert_eq!(chunks[0], GenerationChunk::text("Checking"));
        assert!(matches!(&chunks[1], GenerationChunk::ToolCall(call) if call.name == "get_current_weather"));
        assert_eq!(chunks.len(), 2);

        let body = seen.lock().unwrap().take().unwrap();
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["stream"], true);
        assert_eq!(body["system"], "be brief");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "get_current_weather");
    }

    #[tokio::test]
    async fn single_shot_generation_reads_response_field() {
        let app = Router::new().route(
            "/api/generate",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["stream"], false);
                assert!(body.get("tools").is_none());
                Json(serde_json::json!({"response": "{\"is_related\": false}", "done": true}))
            }),
        );
        let generator = generator_at(&serve(app).await);

        let answer = generator.generate("classify", Some("system")).await.unwrap();
        assert_eq!(answer, "{\"is_related\": false}");
    }

    #[tokio::test]
    async fn error_status_is_backend_unavailable() {
        let app = Router::new().route(
            "/api/generate",
            post(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "model not loaded") }),
        );
        let generator = generator_at(&serve(app).await);

        let err = generator.generate_stream("hi", &[]).await.err().unwrap();
        assert!(matches!(err, AgentError::BackendUnavailable(msg) if msg.contains("model not loaded")));
    }

    #[tokio::test]
    async fn unreachable_backend_is_backend_unavailable() {
        let generator = generator_at(&unreachable_url().await);
        let err = generator.generate("hi", None).await.unwrap_err();
        assert!(matches!(err, AgentError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_unhealthy() {
        let generator = generator_at(&unreachable_url().await);
        assert!(!generator.health_check().await.unwrap());
    }
}
