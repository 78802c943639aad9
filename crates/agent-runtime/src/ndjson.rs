//! NDJSON Stream Decoding
//!
//! Ollama streams `/api/generate` as newline-delimited JSON. Network chunks
//! do not respect line (or UTF-8) boundaries, so bytes are buffered until a
//! full line is available and only then decoded.

use std::collections::{HashMap, VecDeque};
use std::fmt::Display;

use agent_core::error::{AgentError, Result};
use agent_core::generation::{GenerationChunk, GenerationStream};
use agent_core::tool::ToolCall;
use futures::{Stream, StreamExt};
use serde::Deserialize;

/// Reassembles lines from arbitrarily split byte chunks
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and return every line completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(Self::decode(&line[..line.len() - 1]));
        }
        lines
    }

    /// Flush a trailing line that was not newline-terminated
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.pending);
        Some(Self::decode(&line))
    }

    fn decode(line: &[u8]) -> String {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        String::from_utf8_lossy(line).into_owned()
    }
}

/// One line of a generate stream
#[derive(Debug, Default, Deserialize)]
struct GenerateLine {
    #[serde(default)]
    response: String,

    #[serde(default)]
    done: bool,

    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,

    /// Either an object or a JSON-encoded string, depending on the model
    #[serde(default)]
    arguments: serde_json::Value,
}

impl WireFunction {
    fn into_tool_call(self) -> Result<ToolCall> {
        let arguments = match self.arguments {
            serde_json::Value::Null => HashMap::new(),
            serde_json::Value::Object(map) => map.into_iter().collect(),
            serde_json::Value::String(raw) if raw.trim().is_empty() => HashMap::new(),
            serde_json::Value::String(raw) => serde_json::from_str(&raw).map_err(|e| {
                AgentError::MalformedChunk(format!("arguments of '{}': {e}", self.name))
            })?,
            other => {
                return Err(AgentError::MalformedChunk(format!(
                    "arguments of '{}' must be an object, got {other}",
                    self.name
                )))
            }
        };
        Ok(ToolCall::new(self.name, arguments))
    }
}

/// Chunks carried by one decoded line
#[derive(Debug, Default, PartialEq)]
pub struct DecodedLine {
    pub chunks: Vec<GenerationChunk>,
    pub done: bool,
}

/// Decode one NDJSON line.
///
/// A line with both text and tool calls yields the text first. Empty text
/// fragments are dropped, as are tool calls whose arguments cannot be read.
pub fn decode_line(line: &str) -> Result<DecodedLine> {
    let parsed: GenerateLine =
        serde_json::from_str(line).map_err(|e| AgentError::MalformedChunk(e.to_string()))?;

    let mut chunks = Vec::new();
    if !parsed.response.is_empty() {
        chunks.push(GenerationChunk::Text(parsed.response));
    }
    for call in parsed.tool_calls.unwrap_or_default() {
        match call.function.into_tool_call() {
            Ok(call) => chunks.push(GenerationChunk::ToolCall(call)),
            Err(e) => tracing::debug!(error = %e, "Skipping undecodable tool call"),
        }
    }

    Ok(DecodedLine {
        chunks,
        done: parsed.done,
    })
}

struct DecodeState<S> {
    bytes: std::pin::Pin<Box<S>>,
    lines: LineBuffer,
    ready: VecDeque<GenerationChunk>,
    finished: bool,
}

impl<S> DecodeState<S> {
    fn absorb(&mut self, line: &str) {
        if self.finished || line.trim().is_empty() {
            return;
        }
        match decode_line(line) {
            Ok(decoded) => {
                self.ready.extend(decoded.chunks);
                self.finished = decoded.done;
            }
            Err(e) => tracing::debug!(error = %e, "Skipping malformed stream line"),
        }
    }
}

/// Turn a raw NDJSON byte stream into a generation stream.
///
/// The stream ends after the first line with `done: true`, or when the body
/// ends. Malformed lines are skipped; a transport error ends the stream with
/// a `BackendUnavailable` item.
pub fn decode_stream<S, B, E>(bytes: S) -> GenerationStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DecodeState {
        bytes: Box::pin(bytes),
        lines: LineBuffer::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    let stream = futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(chunk) = state.ready.pop_front() {
                return Some((Ok(chunk), state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(bytes)) => {
                    for line in state.lines.push(bytes.as_ref()) {
                        state.absorb(&line);
                    }
                }
                Some(Err(e)) => {
                    state.finished = true;
                    let err = AgentError::BackendUnavailable(format!("stream interrupted: {e}"));
                    return Some((Err(err), state));
                }
                None => {
                    if let Some(line) = state.lines.finish() {
                        state.absorb(&line);
                    }
                    state.finished = true;
                }
            }
        }
    });

    Box::pin(stream)
}
