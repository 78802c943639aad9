//! Agent HTTP Server
//!
//! Axum-based server streaming agent runs over Server-Sent Events, with a
//! non-streaming chat endpoint and static file hosting for the web client.
//!
//! Provider discovery finishes before the listener is bound, so every
//! request sees the complete capability registry.

mod config;
mod handlers;
mod state;

use std::path::Path;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::TextGenerator;
use agent_runtime::{discover, DiscoveryConfig, McpClient, OllamaGenerator};

use crate::config::ServerConfig;
use crate::handlers::{
    chat_handler, events_handler, health_check, list_models, list_providers,
};
use crate::state::AppState;

/// Routes plus static fallback
pub fn build_router(state: AppState, document_root: impl AsRef<Path>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/models", get(list_models))
        .route("/api/providers", get(list_providers))

        // Agent API
        .route("/events", get(events_handler))
        .route("/api/chat", post(chat_handler))

        // Static files (web client)
        .fallback_service(ServeDir::new(document_root))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::from_filename("envfile").ok();
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();

    // Initialize text generator
    let generator = Arc::new(OllamaGenerator::from_env());
    tracing::info!(
        url = %generator.config().base_url(),
        model = %generator.config().model,
        "Using Ollama"
    );

    match generator.health_check().await {
        Ok(true) => {
            tracing::info!("✓ Connected to Ollama");
            if let Ok(models) = generator.list_models().await {
                for model in models {
                    tracing::info!("  Model: {} ({})", model.name, model.size_gb());
                }
            }
        }
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ Ollama not available - agent runs will fail");
            tracing::warn!("  Make sure Ollama is running: ollama serve");
        }
    }

    // Discover providers before serving
    let discovery = DiscoveryConfig::from_env();
    if discovery.is_enabled() {
        tracing::info!(services = discovery.services.len(), "Discovering providers");
    }
    let providers = Arc::new(discover(&discovery).await);
    tracing::info!("Registered {} providers", providers.len());
    for provider in providers.iter() {
        tracing::info!("  • {} ({} tools)", provider.id, provider.tools().len());
    }

    let remote = Arc::new(McpClient::from_env()?);
    let state = AppState::build(&config, generator, providers, remote)?;

    let app = build_router(state, &config.document_root);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 agent server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health          - Health check");
    tracing::info!("  GET  /api/models      - List available models");
    tracing::info!("  GET  /api/providers   - List discovered providers");
    tracing::info!("  GET  /events?query=   - Agent run as SSE");
    tracing::info!("  POST /api/chat        - Send message");
    tracing::info!("  GET  /*               - Static files from {}", config.document_root.display());
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
