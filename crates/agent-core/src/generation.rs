//! Text-Generation Strategy
//!
//! Common interface for text-generation backends. The agent works only
//! through [`TextGenerator`], so a local Ollama daemon, a hosted API or a
//! scripted test double are interchangeable.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::generation::{GenerationChunk, TextGenerator};
//!
//! let mut stream = generator.generate_stream(&prompt, &tools).await?;
//! while let Some(chunk) = stream.next().await {
//!     match chunk? {
//!         GenerationChunk::Text(text) => print!("{text}"),
//!         GenerationChunk::ToolCall(call) => break,
//!     }
//! }
//! ```

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::Result;
use crate::tool::{ToolCall, ToolDescriptor};

/// One unit of a generation stream.
///
/// A backend line may carry both text and a tool call; adapters split such a
/// line into a `Text` chunk followed by a `ToolCall` chunk.
#[derive(Clone, Debug, PartialEq)]
pub enum GenerationChunk {
    /// Incremental text fragment
    Text(String),

    /// The model asks for a tool; nothing after it is read
    ToolCall(ToolCall),
}

impl GenerationChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// Lazy, finite, non-restartable sequence of chunks
pub type GenerationStream = Pin<Box<dyn Stream<Item = Result<GenerationChunk>> + Send>>;

/// Information about a model known to the backend
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,

    #[serde(default)]
    pub size_bytes: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
}

impl ModelInfo {
    /// Size in gigabytes, two decimals
    pub fn size_gb(&self) -> String {
        #[allow(clippy::cast_precision_loss)]
        let gb = self.size_bytes as f64 / 1_073_741_824.0;
        format!("{gb:.2} GB")
    }
}

/// Strategy trait for text-generation backends
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Backend name for logs and health output
    fn name(&self) -> &str;

    /// Start a streaming generation.
    ///
    /// Fails with `BackendUnavailable` before any chunk is produced when the
    /// backend cannot be reached or rejects the request.
    async fn generate_stream(
        &self,
        prompt: &str,
        tools: &[ToolDescriptor],
    ) -> Result<GenerationStream>;

    /// Single-shot generation returning the whole answer
    async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// List available models
    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_size_in_gb() {
        let model = ModelInfo {
            name: "llama3.2:latest".into(),
            size_bytes: 2_019_393_189,
            modified_at: None,
        };
        assert_eq!(model.size_gb(), "1.88 GB");
    }
}
