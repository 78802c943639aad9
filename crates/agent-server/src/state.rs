//! Application State

use std::collections::HashMap;
use std::sync::Arc;

use agent_core::{
    Agent, AgentBuilder, CapabilityRegistry, IntentRouter, RemoteToolClient, Result,
    RouterConfig, TextGenerator, ToolRegistry, Toolbox, WeatherTool,
};

use crate::config::ServerConfig;

/// Name of the agent registered at startup
pub const CHAT_AGENT: &str = "chat";

/// Shared application state, built once before serving
#[derive(Clone)]
pub struct AppState {
    /// Text-generation backend (Ollama, etc.)
    pub generator: Arc<dyn TextGenerator>,

    /// Providers discovered at startup
    pub providers: Arc<CapabilityRegistry>,

    /// Named agents; read-only after startup
    pub agents: Arc<HashMap<String, Arc<Agent>>>,
}

impl AppState {
    /// Wire the chat agent from its collaborators
    pub fn build(
        config: &ServerConfig,
        generator: Arc<dyn TextGenerator>,
        providers: Arc<CapabilityRegistry>,
        remote: Arc<dyn RemoteToolClient>,
    ) -> Result<Self> {
        let mut local = ToolRegistry::new();
        local.register(WeatherTool);

        let toolbox = Arc::new(Toolbox::new(local, providers.clone(), remote));

        let mut builder = AgentBuilder::new()
            .generator(generator.clone())
            .toolbox(toolbox)
            .max_iterations(config.max_iterations)
            .channel_capacity(config.channel_capacity);

        if let Some(prompt) = &config.system_prompt {
            builder = builder.system_prompt(prompt.clone());
        }

        if config.intent_routing && providers.routable().next().is_some() {
            let router = IntentRouter::new(
                generator.clone(),
                providers.clone(),
                RouterConfig {
                    timeout: config.intent_timeout,
                    ..Default::default()
                },
            );
            builder = builder.router(Arc::new(router));
        }

        let mut agents = HashMap::new();
        agents.insert(CHAT_AGENT.to_string(), Arc::new(builder.build()?));

        Ok(Self {
            generator,
            providers,
            agents: Arc::new(agents),
        })
    }

    pub fn agent(&self, name: &str) -> Option<Arc<Agent>> {
        self.agents.get(name).cloned()
    }
}
