//! Test doubles for the generation backend and remote tool providers.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::capability::Provider;
use crate::error::{AgentError, Result};
use crate::generation::{GenerationChunk, GenerationStream, TextGenerator};
use crate::tool::{ToolCall, ToolDescriptor, ToolResult};
use crate::toolbox::RemoteToolClient;

type StreamScript = Result<Vec<Result<GenerationChunk>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Generator that replays scripted turns.
///
/// Each `generate_stream` call pops the next scripted stream; once the script
/// runs out, the optional fallback turn repeats forever, otherwise an empty
/// stream is returned.
#[derive(Default)]
pub struct ScriptedGenerator {
    streams: Mutex<VecDeque<StreamScript>>,
    fallback: Option<Vec<GenerationChunk>>,
    completions: Mutex<VecDeque<Result<String>>>,
    completion_delay: Option<Duration>,
    stream_prompts: Mutex<Vec<String>>,
    completion_prompts: Mutex<Vec<String>>,
    stream_calls: AtomicUsize,
    completion_calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a turn made of the given chunks
    pub fn with_turn(self, chunks: Vec<GenerationChunk>) -> Self {
        lock(&self.streams).push_back(Ok(chunks.into_iter().map(Ok).collect()));
        self
    }

    /// Queue a turn whose stream fails after the given chunks
    pub fn with_broken_turn(self, chunks: Vec<GenerationChunk>, error: AgentError) -> Self {
        let mut items: Vec<_> = chunks.into_iter().map(Ok).collect();
        items.push(Err(error));
        lock(&self.streams).push_back(Ok(items));
        self
    }

    /// Queue a turn that fails before producing a stream
    pub fn with_unavailable_turn(self, reason: impl Into<String>) -> Self {
        lock(&self.streams).push_back(Err(AgentError::BackendUnavailable(reason.into())));
        self
    }

    /// Turn replayed once the script is exhausted
    pub fn with_fallback_turn(mut self, chunks: Vec<GenerationChunk>) -> Self {
        self.fallback = Some(chunks);
        self
    }

    /// Queue a single-shot answer
    pub fn with_completion(self, answer: Result<String>) -> Self {
        lock(&self.completions).push_back(answer);
        self
    }

    /// Delay every single-shot answer
    pub fn with_completion_delay(mut self, delay: Duration) -> Self {
        self.completion_delay = Some(delay);
        self
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn completion_calls(&self) -> usize {
        self.completion_calls.load(Ordering::SeqCst)
    }

    /// Prompts passed to `generate_stream`, in call order
    pub fn stream_prompts(&self) -> Vec<String> {
        lock(&self.stream_prompts).clone()
    }

    /// Prompts passed to `generate`, in call order
    pub fn completion_prompts(&self) -> Vec<String> {
        lock(&self.completion_prompts).clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        _tools: &[ToolDescriptor],
    ) -> Result<GenerationStream> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.stream_prompts).push(prompt.to_string());

        let next = lock(&self.streams).pop_front();
        let items = match next {
            Some(script) => script?,
            None => self
                .fallback
                .clone()
                .unwrap_or_default()
                .into_iter()
                .map(Ok)
                .collect(),
        };

        Ok(Box::pin(futures::stream::iter(items)))
    }

    async fn generate(&self, prompt: &str, _system: Option<&str>) -> Result<String> {
        self.completion_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.completion_prompts).push(prompt.to_string());

        if let Some(delay) = self.completion_delay {
            tokio::time::sleep(delay).await;
        }

        lock(&self.completions)
            .pop_front()
            .unwrap_or_else(|| Err(AgentError::BackendUnavailable("no scripted answer".into())))
    }
}

/// Remote tool client that records calls and replies from a fixed table
#[derive(Default)]
pub struct RecordingRemoteClient {
    replies: Mutex<VecDeque<Result<String>>>,
    calls: Mutex<Vec<(String, ToolCall)>>,
}

impl RecordingRemoteClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next remote call
    pub fn with_reply(self, reply: Result<String>) -> Self {
        lock(&self.replies).push_back(reply);
        self
    }

    /// `(provider id, call)` pairs in call order
    pub fn calls(&self) -> Vec<(String, ToolCall)> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl RemoteToolClient for RecordingRemoteClient {
    async fn call_tool(&self, provider: &Provider, call: &ToolCall) -> Result<ToolResult> {
        lock(&self.calls).push((provider.id.clone(), call.clone()));
        let reply = lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| Ok("ok".into()));
        reply.map(ToolResult::new)
    }
}
