//! # agent-core
//!
//! Streaming agent that can call tools mid-answer, with provider-agnostic
//! text generation and MCP-style tool providers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                             Agent                                │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐  │
//! │  │ IntentRouter │──▶│   Reasoning  │──▶│   TextGenerator      │  │
//! │  │ (providers)  │   │     Loop     │   │   (Strategy)         │  │
//! │  └──────────────┘   └──────┬───────┘   └──────────────────────┘  │
//! │                            │                                     │
//! │                  ┌─────────▼─────────┐   ┌────────────────────┐  │
//! │                  │      Toolbox      │──▶│ RemoteToolClient   │  │
//! │                  │ (local registry)  │   │ (MCP providers)    │  │
//! │                  └───────────────────┘   └────────────────────┘  │
//! └────────────────────────────┬─────────────────────────────────────┘
//!                              │ AgentEvent (ordered, bounded channel)
//!                              ▼
//!                          subscriber
//! ```
//!
//! The `TextGenerator` trait lets the agent run against Ollama or any other
//! backend; `RemoteToolClient` lets it call tools on remote providers.

pub mod capability;
pub mod error;
pub mod event;
pub mod generation;
pub mod reasoning;
pub mod router;
pub mod tool;
pub mod toolbox;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use capability::{CapabilityRegistry, Provider, ServerCapabilities};
pub use error::{AgentError, Result};
pub use event::{AgentEvent, EndStatus, EventSink};
pub use generation::{GenerationChunk, GenerationStream, ModelInfo, TextGenerator};
pub use reasoning::{Agent, AgentBuilder, AgentConfig};
pub use router::{IntentRouter, RouteOutcome, RouterConfig};
pub use tool::{Tool, ToolCall, ToolDescriptor, ToolRegistry, ToolResult, WeatherTool};
pub use toolbox::{RemoteToolClient, Toolbox};
