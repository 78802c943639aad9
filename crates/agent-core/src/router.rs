//! Intent Routing
//!
//! Asks the text-generation backend, provider by provider, whether a query
//! belongs to that provider and which of its tools to call. Matching is
//! first-match in registration order; there is no scoring across providers.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::capability::{CapabilityRegistry, Provider};
use crate::error::{AgentError, Result};
use crate::generation::TextGenerator;
use crate::tool::ToolDescriptor;

const DEFAULT_CLASSIFIER_PROMPT: &str = "You are an intent classifier. Reply with one JSON object \
of the form {\"is_related\": bool, \"action\": string, \"parameters\": object} and nothing else.";

/// Router configuration
#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// System directive sent with every classification request
    pub system_prompt: String,

    /// Budget for a single classification call
    pub timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_CLASSIFIER_PROMPT.into(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Outcome of routing one query
#[derive(Clone, Debug)]
pub enum RouteOutcome {
    Matched {
        provider: Arc<Provider>,
        tool: ToolDescriptor,
        parameters: HashMap<String, serde_json::Value>,
    },
    NoMatch,
}

impl RouteOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, RouteOutcome::Matched { .. })
    }
}

/// Classification answer
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Intent {
    #[serde(default)]
    pub is_related: bool,

    #[serde(default)]
    pub action: String,

    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl Intent {
    /// Parameters as a map; anything but an object yields an empty map
    pub fn parameter_map(&self) -> HashMap<String, serde_json::Value> {
        self.parameters
            .as_object()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }
}

/// Routes free-form queries to registered providers
pub struct IntentRouter {
    generator: Arc<dyn TextGenerator>,
    registry: Arc<CapabilityRegistry>,
    config: RouterConfig,
}

impl IntentRouter {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        registry: Arc<CapabilityRegistry>,
        config: RouterConfig,
    ) -> Self {
        Self {
            generator,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Whether any provider takes part in routing
    pub fn has_routable_providers(&self) -> bool {
        self.registry.routable().next().is_some()
    }

    /// Route a query to the first provider that claims it
    pub async fn route(&self, query: &str) -> RouteOutcome {
        for provider in self.registry.routable() {
            let intent = match self.classify(provider, query).await {
                Ok(intent) => intent,
                Err(e) => {
                    tracing::debug!(provider = %provider.id, error = %e, "Intent classification skipped provider");
                    continue;
                }
            };

            if !intent.is_related || intent.action.trim().is_empty() {
                continue;
            }

            let Some(tool) = provider.find_tool(&intent.action) else {
                tracing::debug!(
                    provider = %provider.id,
                    action = %intent.action,
                    "Action not advertised by provider"
                );
                continue;
            };

            tracing::info!(provider = %provider.id, tool = %tool.name, "Query routed to provider");
            return RouteOutcome::Matched {
                provider: provider.clone(),
                tool: tool.clone(),
                parameters: intent.parameter_map(),
            };
        }

        RouteOutcome::NoMatch
    }

    /// Ask the backend whether `query` belongs to `provider`
    async fn classify(&self, provider: &Provider, query: &str) -> Result<Intent> {
        let trigger = provider.trigger().unwrap_or_default();
        let prompt = format!("{trigger}\n\nUser input: `{query}`");

        let answer = tokio::time::timeout(
            self.config.timeout,
            self.generator
                .generate(&prompt, Some(&self.config.system_prompt)),
        )
        .await
        .map_err(|_| {
            AgentError::BackendUnavailable(format!(
                "classification timed out after {:?}",
                self.config.timeout
            ))
        })??;

        parse_intent(&answer)
    }
}

/// Extract the intent object from a raw model answer.
///
/// Drops everything up to the last `</think>`, removes code fences and keeps
/// the span between the first `{` and the last `}`.
pub fn parse_intent(answer: &str) -> Result<Intent> {
    let json = extract_json(answer);
    serde_json::from_str(json).map_err(|e| AgentError::IntentParse(e.to_string()))
}

/// Isolate the JSON object inside a model answer
pub fn extract_json(answer: &str) -> &str {
    let answer = match answer.rfind("</think>") {
        Some(end) => &answer[end + "</think>".len()..],
        None => answer,
    };
    let answer = answer.trim();

    match (answer.find('{'), answer.rfind('}')) {
        (Some(start), Some(end)) if end > start => &answer[start..=end],
        _ => strip_fences(answer),
    }
}

fn strip_fences(text: &str) -> &str {
    text.trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::ServerCapabilities;
    use crate::testing::ScriptedGenerator;

    fn provider(id: &str, trigger: &str, tools: &[&str]) -> Provider {
        Provider {
            id: id.into(),
            name: id.into(),
            capabilities: ServerCapabilities {
                tools: tools
                    .iter()
                    .map(|t| ToolDescriptor {
                        name: (*t).into(),
                        description: String::new(),
                        parameters: serde_json::Value::Null,
                    })
                    .collect(),
                ..Default::default()
            },
            endpoint: None,
            is_related_prompt: Some(trigger.into()),
            process_prompt: None,
        }
    }

    fn router(generator: ScriptedGenerator, providers: Vec<Provider>) -> IntentRouter {
        IntentRouter::new(
            Arc::new(generator),
            Arc::new(CapabilityRegistry::from_providers(providers)),
            RouterConfig::default(),
        )
    }

    #[test]
    fn parses_answer_wrapped_in_think_and_fences() {
        let answer = "<think>the user wants weather {maybe}</think>\n```json\n{\"is_related\": true, \"action\": \"get_forecast\", \"parameters\": {\"city\": \"Taipei\"}}\n```";
        let intent = parse_intent(answer).unwrap();
        assert!(intent.is_related);
        assert_eq!(intent.action, "get_forecast");
        assert_eq!(
            intent.parameter_map().get("city"),
            Some(&serde_json::json!("Taipei"))
        );
    }

    #[test]
    fn non_object_parameters_become_empty() {
        let intent = parse_intent(r#"{"is_related": true, "action": "x", "parameters": null}"#).unwrap();
        assert!(intent.parameter_map().is_empty());
    }

    #[test]
    fn garbage_is_a_parse_failure() {
        let err = parse_intent("I cannot help with that.").unwrap_err();
        assert!(matches!(err, AgentError::IntentParse(_)));
    }

    #[tokio::test]
    async fn no_providers_means_no_match() {
        let router = router(ScriptedGenerator::new(), Vec::new());
        assert!(!router.route("What's the weather in Taipei?").await.is_match());
    }

    #[tokio::test]
    async fn unrelated_query_is_no_match() {
        let generator = ScriptedGenerator::new()
            .with_completion(Ok(r#"{"is_related": false, "action": "", "parameters": {}}"#.into()));
        let router = router(generator, vec![provider("weather", "Weather?", &["get_forecast"])]);

        assert!(!router.route("Tell me a joke").await.is_match());
    }

    #[tokio::test]
    async fn related_query_resolves_advertised_tool() {
        let generator = ScriptedGenerator::new().with_completion(Ok(
            r#"{"is_related": true, "action": "get_forecast", "parameters": {"city": "Taipei"}}"#.into(),
        ));
        let router = router(generator, vec![provider("weather", "Weather?", &["get_forecast"])]);

        match router.route("What's the weather in Taipei?").await {
            RouteOutcome::Matched {
                provider,
                tool,
                parameters,
            } => {
                assert_eq!(provider.id, "weather");
                assert_eq!(tool.name, "get_forecast");
                assert_eq!(parameters.get("city"), Some(&serde_json::json!("Taipei")));
            }
            RouteOutcome::NoMatch => panic!("expected a match"),
        }
    }

    #[tokio::test]
    async fn unadvertised_action_is_skipped() {
        let generator = ScriptedGenerator::new().with_completion(Ok(
            r#"{"is_related": true, "action": "delete_everything", "parameters": {}}"#.into(),
        ));
        let router = router(generator, vec![provider("weather", "Weather?", &["get_forecast"])]);

        assert!(!router.route("weather").await.is_match());
    }

    #[tokio::test]
    async fn parse_failure_moves_on_to_next_provider() {
        let generator = ScriptedGenerator::new()
            .with_completion(Ok("not json at all".into()))
            .with_completion(Ok(
                r#"{"is_related": true, "action": "track", "parameters": {}}"#.into(),
            ));
        let router = router(
            generator,
            vec![
                provider("weather", "Weather?", &["get_forecast"]),
                provider("orders", "Orders?", &["track"]),
            ],
        );

        match router.route("Where is my parcel?").await {
            RouteOutcome::Matched { provider, .. } => assert_eq!(provider.id, "orders"),
            RouteOutcome::NoMatch => panic!("expected the second provider"),
        }
    }

    #[tokio::test]
    async fn first_matching_provider_wins() {
        let related = r#"{"is_related": true, "action": "lookup", "parameters": {}}"#;
        let generator = ScriptedGenerator::new()
            .with_completion(Ok(related.into()))
            .with_completion(Ok(related.into()));
        let generator = Arc::new(generator);
        let router = IntentRouter::new(
            generator.clone(),
            Arc::new(CapabilityRegistry::from_providers([
                provider("a", "A?", &["lookup"]),
                provider("b", "B?", &["lookup"]),
            ])),
            RouterConfig::default(),
        );

        match router.route("lookup something").await {
            RouteOutcome::Matched { provider, .. } => assert_eq!(provider.id, "a"),
            RouteOutcome::NoMatch => panic!("expected a match"),
        }
        assert_eq!(generator.completion_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_classification_counts_as_no_match() {
        let generator = ScriptedGenerator::new()
            .with_completion_delay(Duration::from_secs(3600))
            .with_completion(Ok(
                r#"{"is_related": true, "action": "get_forecast", "parameters": {}}"#.into(),
            ));
        let router = IntentRouter::new(
            Arc::new(generator),
            Arc::new(CapabilityRegistry::from_providers([provider(
                "weather",
                "Weather?",
                &["get_forecast"],
            )])),
            RouterConfig {
                timeout: Duration::from_secs(5),
                ..Default::default()
            },
        );

        assert!(!router.route("weather").await.is_match());
    }

    #[tokio::test]
    async fn backend_failure_counts_as_no_match() {
        let generator = ScriptedGenerator::new()
            .with_completion(Err(AgentError::BackendUnavailable("refused".into())));
        let router = router(generator, vec![provider("weather", "Weather?", &["get_forecast"])]);

        assert!(!router.route("weather").await.is_match());
    }

    #[tokio::test]
    async fn classification_prompt_carries_trigger_and_query() {
        let generator = Arc::new(ScriptedGenerator::new().with_completion(Ok("{}".into())));
        let router = IntentRouter::new(
            generator.clone(),
            Arc::new(CapabilityRegistry::from_providers([provider(
                "weather",
                "Is this about the weather?",
                &["get_forecast"],
            )])),
            RouterConfig::default(),
        );

        router.route("Rain tomorrow?").await;
        let prompts = generator.completion_prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with("Is this about the weather?"));
        assert!(prompts[0].contains("`Rain tomorrow?`"));
    }
}
