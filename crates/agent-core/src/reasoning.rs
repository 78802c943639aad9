//! Reasoning Loop
//!
//! Bounded reason → act → observe cycle. Each iteration streams one
//! generation; a tool-call chunk interrupts it, the tool runs, and its
//! observation is appended to the prompt for the next iteration. Text with no
//! tool call ends the run.

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{AgentError, Result};
use crate::event::{AgentEvent, Disconnected, EndStatus, EventSink};
use crate::generation::{GenerationChunk, GenerationStream, TextGenerator};
use crate::router::{IntentRouter, RouteOutcome};
use crate::tool::{ToolCall, ToolRegistry, ToolResult};
use crate::toolbox::Toolbox;

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Fixed directive placed before the user query
    pub system_prompt: String,

    /// Maximum generation rounds per run
    pub max_iterations: usize,

    /// Whether to append tool descriptions to the directive
    pub inject_tool_descriptions: bool,

    /// Capacity of the event channel handed to subscribers
    pub channel_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_iterations: 5,
            inject_tool_descriptions: true,
            channel_capacity: 32,
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.
Use a tool when the question needs live data, then answer from its observation.
If you can answer directly without tools, do so. Be concise and accurate.";

/// How one generation round ended
enum Iteration {
    /// Final text, no tool call
    Answered,
    /// The model asked for a tool
    ToolRequested(ToolCall),
    /// The stream ended with neither text nor a tool call
    Silent,
}

/// The main Agent struct
pub struct Agent {
    generator: Arc<dyn TextGenerator>,
    tools: Arc<Toolbox>,
    router: Option<Arc<IntentRouter>>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        tools: Arc<Toolbox>,
        router: Option<Arc<IntentRouter>>,
        config: AgentConfig,
    ) -> Self {
        Self {
            generator,
            tools,
            router,
            config,
        }
    }

    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &Toolbox {
        &self.tools
    }

    /// Directive plus the user query
    fn build_initial_prompt(&self, query: &str) -> String {
        let mut prompt = self.config.system_prompt.clone();

        if self.config.inject_tool_descriptions {
            let descriptors = self.tools.descriptors();
            if !descriptors.is_empty() {
                prompt.push_str("\n\n");
                prompt.push_str(&ToolRegistry::prompt_section(&descriptors));
            }
        }

        prompt.push_str("\n\nUser Query: ");
        prompt.push_str(query);
        prompt
    }

    /// Start a run on its own task and hand back the event receiver
    pub fn run_stream(self: &Arc<Self>, query: impl Into<String>) -> mpsc::Receiver<AgentEvent> {
        let (sink, rx) = EventSink::channel(self.config.channel_capacity);
        let agent = Arc::clone(self);
        let query = query.into();

        tokio::spawn(async move { agent.process(&query, sink).await });
        rx
    }

    /// Run and collect the final answer.
    ///
    /// Text streamed before a tool call is reasoning and is discarded. A
    /// failed run returns the error that ended it.
    pub async fn ask(self: &Arc<Self>, query: impl Into<String>) -> Result<String> {
        let query = query.into();
        let (sink, mut rx) = EventSink::channel(self.config.channel_capacity);

        let run = async move {
            let outcome = self.drive(&query, &sink).await;
            drop(sink);
            outcome
        };
        let answer = async {
            let mut answer = String::new();
            while let Some(event) = rx.recv().await {
                match event {
                    AgentEvent::Message { text } => answer.push_str(&text),
                    AgentEvent::ToolCall { .. } => answer.clear(),
                    _ => {}
                }
            }
            answer
        };

        match tokio::join!(run, answer) {
            (Ok(Ok(_)), answer) => Ok(answer),
            (Ok(Err(e)), _) => {
                tracing::error!(error = %e, "Agent run failed");
                Err(e)
            }
            (Err(Disconnected), _) => Err(AgentError::Other("agent run was cancelled".into())),
        }
    }

    /// Run the agent for one query, writing events into `sink`.
    ///
    /// Returns once a terminal event was emitted or the subscriber left.
    pub async fn process(&self, query: &str, sink: EventSink) {
        match self.drive(query, &sink).await {
            Ok(Ok(status)) => sink.end(status).await,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Agent run failed");
                sink.fail(e.to_string()).await;
            }
            Err(Disconnected) => {
                tracing::debug!("Subscriber disconnected, stopping agent run");
            }
        }
    }

    async fn drive(
        &self,
        query: &str,
        sink: &EventSink,
    ) -> std::result::Result<Result<EndStatus>, Disconnected> {
        sink.start().await?;

        let mut prompt = self.build_initial_prompt(query);

        if let Some(router) = self.router.as_ref().filter(|r| r.has_routable_providers()) {
            if let RouteOutcome::Matched {
                provider,
                tool,
                parameters,
            } = sink.guard(router.route(query)).await?
            {
                let call = ToolCall::new(tool.name, parameters);
                sink.tool_call(&call.name).await?;
                let result = sink.guard(self.tools.invoke_on(&provider, &call)).await?;
                prompt.push_str(&observation(&call, result));
                if let Some(process) = provider.process_prompt.as_deref() {
                    prompt.push_str(process);
                    prompt.push_str("\n\n");
                }
            }
        }

        let tools = self.tools.descriptors();

        for iteration in 1..=self.config.max_iterations {
            tracing::debug!(iteration, "Requesting generation");

            let stream = match sink
                .guard(self.generator.generate_stream(&prompt, &tools))
                .await?
            {
                Ok(stream) => stream,
                Err(e) => return Ok(Err(e)),
            };

            let call = match self.consume(stream, sink).await? {
                Ok(Iteration::Answered) => return Ok(Ok(EndStatus::Complete)),
                Ok(Iteration::Silent) => continue,
                Ok(Iteration::ToolRequested(call)) => call,
                Err(e) => return Ok(Err(e)),
            };

            tracing::debug!(tool = %call.name, iteration, "Executing tool");
            sink.tool_call(&call.name).await?;
            let result = sink.guard(self.tools.invoke(&call)).await?;
            prompt.push_str(&observation(&call, result));
        }

        tracing::warn!(
            max_iterations = self.config.max_iterations,
            "Iteration budget exhausted"
        );
        Ok(Ok(EndStatus::IterationLimit))
    }

    /// Forward one generation stream, stopping at the first tool call
    async fn consume(
        &self,
        mut stream: GenerationStream,
        sink: &EventSink,
    ) -> std::result::Result<Result<Iteration>, Disconnected> {
        let mut text = String::new();

        while let Some(chunk) = sink.guard(stream.next()).await? {
            match chunk {
                Ok(GenerationChunk::Text(fragment)) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    text.push_str(&fragment);
                    sink.message(fragment).await?;
                }
                Ok(GenerationChunk::ToolCall(call)) => {
                    return Ok(Ok(Iteration::ToolRequested(call)));
                }
                Err(e) => return Ok(Err(e)),
            }
        }

        if text.is_empty() {
            Ok(Ok(Iteration::Silent))
        } else {
            Ok(Ok(Iteration::Answered))
        }
    }
}

/// Prompt block reporting a tool outcome to the model
fn observation(call: &ToolCall, result: Result<ToolResult>) -> String {
    let text = match result {
        Ok(result) => result.observation,
        Err(e) => {
            tracing::warn!(tool = %call.name, error = %e, "Tool failed, reporting to model");
            format!("Tool execution failed: {e}")
        }
    };
    format!("\n\nObservation for tool {}: {}\n\n", call.name, text)
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    generator: Option<Arc<dyn TextGenerator>>,
    tools: Option<Arc<Toolbox>>,
    router: Option<Arc<IntentRouter>>,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            generator: None,
            tools: None,
            router: None,
            config: AgentConfig::default(),
        }
    }

    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn toolbox(mut self, tools: Arc<Toolbox>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn router(mut self, router: Arc<IntentRouter>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    pub fn inject_tool_descriptions(mut self, inject: bool) -> Self {
        self.config.inject_tool_descriptions = inject;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let generator = self
            .generator
            .ok_or_else(|| AgentError::Config("Text generator is required".into()))?;
        if self.config.max_iterations == 0 {
            return Err(AgentError::Config("max_iterations must be at least 1".into()));
        }
        let tools = self
            .tools
            .unwrap_or_else(|| Arc::new(Toolbox::local(ToolRegistry::new())));

        Ok(Agent::new(generator, tools, self.router, self.config))
    }
}
