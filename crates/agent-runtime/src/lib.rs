//! # agent-runtime
//!
//! Network adapters behind the agent-core seams.
//!
//! ## Adapters
//!
//! - **Ollama** (default feature): streaming text generation over NDJSON
//! - **MCP**: JSON-RPC `tools/call` against provider-hosted tools
//! - **Discovery**: concurrent capability fetch that builds the provider registry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::{discover, DiscoveryConfig, McpClient, OllamaGenerator};
//!
//! let providers = Arc::new(discover(&DiscoveryConfig::from_env()).await);
//! let toolbox = Toolbox::new(local_tools, providers, Arc::new(McpClient::from_env()?));
//! let agent = AgentBuilder::new()
//!     .generator(Arc::new(OllamaGenerator::from_env()))
//!     .toolbox(Arc::new(toolbox))
//!     .build()?;
//! ```

pub mod discovery;
pub mod mcp;
pub mod ndjson;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(test)]
mod test_support;

pub use discovery::{discover, DiscoveryConfig};
pub use mcp::{McpClient, McpConfig};

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaGenerator};

// Re-export core types for convenience
pub use agent_core::{Agent, AgentBuilder, AgentError, Result, TextGenerator, Toolbox};
