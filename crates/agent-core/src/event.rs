//! Agent Events
//!
//! The ordered event sequence an agent run produces for its subscriber, and
//! the sink that enforces its shape: one `start`, any number of `message` /
//! `tool_call`, then exactly one `end` or `error`.

use serde::Serialize;
use std::future::Future;
use thiserror::Error;
use tokio::sync::mpsc;

/// Events emitted by the agent during a run
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Start,
    Message { text: String },
    ToolCall { name: String, status: ToolCallStatus },
    Error { message: String },
    End { status: EndStatus },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Executing,
}

/// Why a successful run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndStatus {
    /// The model produced a final answer
    Complete,
    /// The iteration budget ran out
    IterationLimit,
}

impl AgentEvent {
    /// SSE event name for this event
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Message { .. } => "message",
            Self::ToolCall { .. } => "tool_call",
            Self::Error { .. } => "error",
            Self::End { .. } => "end",
        }
    }

    /// JSON payload carried with the event
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::Start => serde_json::json!({"status": "thinking"}),
            Self::Message { text } => serde_json::Value::String(text.clone()),
            Self::ToolCall { name, status } => {
                serde_json::json!({"tool_name": name, "status": status})
            }
            Self::Error { message } => serde_json::json!({"message": message}),
            Self::End { status } => serde_json::json!({"status": status}),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End { .. } | Self::Error { .. })
    }
}

/// The subscriber went away
#[derive(Debug, Error)]
#[error("subscriber disconnected")]
pub struct Disconnected;

/// Producer half of an agent run's event channel.
///
/// Terminal events consume the sink, so a run can emit at most one of them
/// and the channel closes when the sink is dropped on any exit path.
#[derive(Debug)]
pub struct EventSink {
    tx: mpsc::Sender<AgentEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<AgentEvent>) -> Self {
        Self { tx }
    }

    /// Bounded channel with its sink
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AgentEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    pub async fn start(&self) -> Result<(), Disconnected> {
        self.send(AgentEvent::Start).await
    }

    pub async fn message(&self, text: impl Into<String>) -> Result<(), Disconnected> {
        self.send(AgentEvent::Message { text: text.into() }).await
    }

    pub async fn tool_call(&self, name: impl Into<String>) -> Result<(), Disconnected> {
        self.send(AgentEvent::ToolCall {
            name: name.into(),
            status: ToolCallStatus::Executing,
        })
        .await
    }

    /// Emit the success terminal and close
    pub async fn end(self, status: EndStatus) {
        let _ = self.send(AgentEvent::End { status }).await;
    }

    /// Emit the failure terminal and close
    pub async fn fail(self, message: impl Into<String>) {
        let _ = self
            .send(AgentEvent::Error {
                message: message.into(),
            })
            .await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Drive `fut` unless the subscriber disconnects first
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Disconnected> {
        tokio::select! {
            biased;
            () = self.tx.closed() => Err(Disconnected),
            out = fut => Ok(out),
        }
    }

    async fn send(&self, event: AgentEvent) -> Result<(), Disconnected> {
        self.tx.send(event).await.map_err(|_| Disconnected)
    }
}
