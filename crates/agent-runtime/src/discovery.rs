//! Provider Discovery
//!
//! Fetches each configured provider's capability document concurrently at
//! startup and builds the registry from whatever answered. A provider that
//! cannot be reached or decoded is logged and left out.

use std::time::Duration;

use agent_core::{
    capability::{CapabilityRegistry, Provider},
    error::{AgentError, Result},
};

/// Discovery configuration
#[derive(Clone, Debug)]
pub struct DiscoveryConfig {
    /// Base URL; each service's document lives at `{base_url}{service}`
    pub base_url: Option<String>,

    /// Service names in registration order
    pub services: Vec<String>,

    /// Budget for one capability fetch
    pub timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            services: Vec::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl DiscoveryConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let base_url = std::env::var("MCP_DISCOVERY_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());
        let services = std::env::var("MCP_SERVICE_NAMES")
            .map(|names| parse_service_names(&names))
            .unwrap_or_default();
        let timeout = std::env::var("MCP_DISCOVERY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map_or(defaults.timeout, Duration::from_secs);

        Self {
            base_url,
            services,
            timeout,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.base_url.is_some() && !self.services.is_empty()
    }

    fn url_for(&self, base: &str, service: &str) -> String {
        if base.ends_with('/') {
            format!("{base}{service}")
        } else {
            format!("{base}/{service}")
        }
    }
}

/// Split a comma-separated list, dropping blanks
pub fn parse_service_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Discover every configured provider.
///
/// Fetches run concurrently; the registry keeps the configured service
/// order regardless of which fetch finishes first.
pub async fn discover(config: &DiscoveryConfig) -> CapabilityRegistry {
    let Some(base) = config.base_url.as_deref() else {
        if !config.services.is_empty() {
            tracing::warn!("MCP_SERVICE_NAMES set without MCP_DISCOVERY_URL; skipping discovery");
        }
        return CapabilityRegistry::new();
    };

    let http = match reqwest::Client::builder().timeout(config.timeout).build() {
        Ok(http) => http,
        Err(e) => {
            tracing::error!(error = %e, "Could not build discovery client");
            return CapabilityRegistry::new();
        }
    };

    let fetches = config.services.iter().map(|service| {
        let url = config.url_for(base, service);
        let http = &http;
        async move { (service, fetch_provider(http, &url, service).await) }
    });

    let mut registry = CapabilityRegistry::new();
    for (service, outcome) in futures::future::join_all(fetches).await {
        match outcome {
            Ok(provider) => {
                tracing::info!(
                    service = %service,
                    provider = %provider.id,
                    tools = provider.tools().len(),
                    "Provider registered"
                );
                registry.register(provider);
            }
            Err(e) => tracing::warn!(service = %service, error = %e, "Provider discovery failed"),
        }
    }
    registry
}

/// Fetch and decode one capability document
pub async fn fetch_provider(http: &reqwest::Client, url: &str, service: &str) -> Result<Provider> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| AgentError::InvocationFailed(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AgentError::ProviderError {
            status: status.as_u16(),
            body,
        });
    }

    let mut provider: Provider = response
        .json()
        .await
        .map_err(|e| AgentError::InvocationFailed(format!("unreadable capabilities: {e}")))?;

    if provider.id.trim().is_empty() {
        provider.id = service.to_string();
    }
    if provider.name.trim().is_empty() {
        provider.name.clone_from(&provider.id);
    }
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::{extract::Path, http::StatusCode, response::IntoResponse, routing::get, Json, Router};

    async fn capabilities(Path(service): Path<String>) -> axum::response::Response {
        match service.as_str() {
            "weather" => {
                // Answer late so completion order differs from config order
                tokio::time::sleep(Duration::from_millis(50)).await;
                Json(serde_json::json!({
                    "id": "weather",
                    "name": "Weather",
                    "isRelatedPrompt": "Is this about the weather?",
                    "processPrompt": "Summarize the forecast.",
                    "capabilities": {
                        "version": "1.0",
                        "server_id": "weather-1",
                        "tools": [{"name": "get_forecast", "description": "Forecast", "parameters": {"city": "City name"}}]
                    }
                }))
                .into_response()
            }
            "orders" => Json(serde_json::json!({
                "capabilities": {"tools": [{"name": "track"}]}
            }))
            .into_response(),
            "broken" => "not json".into_response(),
            _ => StatusCode::NOT_FOUND.into_response(),
        }
    }

    fn config_for(base: String, services: &str) -> DiscoveryConfig {
        DiscoveryConfig {
            base_url: Some(format!("{base}/capabilities/")),
            services: parse_service_names(services),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn service_names_are_trimmed() {
        assert_eq!(parse_service_names(" weather, ,orders ,"), vec!["weather", "orders"]);
    }

    #[tokio::test]
    async fn keeps_configured_order_and_skips_failures() {
        let app = Router::new().route("/capabilities/{service}", get(capabilities));
        let base = serve(app).await;

        let registry = discover(&config_for(base, "weather,missing,broken,orders")).await;
        let ids: Vec<_> = registry.iter().map(|p| p.id.clone()).collect();

        assert_eq!(ids, vec!["weather", "orders"]);
        let weather = registry.get("weather").unwrap();
        assert_eq!(weather.trigger(), Some("Is this about the weather?"));
        assert_eq!(weather.capabilities.server_id, "weather-1");
        assert!(weather.advertises("get_forecast"));
    }

    #[tokio::test]
    async fn missing_id_falls_back_to_service_name() {
        let app = Router::new().route("/capabilities/{service}", get(capabilities));
        let base = serve(app).await;

        let registry = discover(&config_for(base, "orders")).await;
        let orders = registry.get("orders").unwrap();
        assert_eq!(orders.name, "orders");
        assert!(orders.trigger().is_none());
    }

    #[tokio::test]
    async fn no_base_url_means_empty_registry() {
        let registry = discover(&DiscoveryConfig {
            services: vec!["weather".into()],
            ..Default::default()
        })
        .await;
        assert!(registry.is_empty());
    }
}
