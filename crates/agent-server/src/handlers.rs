//! HTTP/SSE Handlers

use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;

use agent_core::{AgentError, AgentEvent, EventSink, ModelInfo};

use crate::state::{AppState, CHAT_AGENT};

const EMPTY_QUERY: &str = "Query cannot be empty";
const AGENT_NOT_FOUND: &str = "Agent not found";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub backend: String,
    pub backend_connected: bool,
    pub providers: usize,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub agent: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct ProviderSummary {
    pub id: String,
    pub name: String,
    pub routable: bool,
    pub tools: Vec<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let backend_connected = state.generator.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        backend: state.generator.name().to_string(),
        backend_connected,
        providers: state.providers.len(),
    })
}

/// Models known to the text-generation backend
pub async fn list_models(State(state): State<AppState>) -> Result<Json<Vec<ModelInfo>>, ApiError> {
    state.generator.list_models().await.map(Json).map_err(|e| {
        tracing::error!(error = %e, "Model listing failed");
        api_error(StatusCode::BAD_GATEWAY, e.user_message(), "BACKEND_UNAVAILABLE")
    })
}

/// Providers discovered at startup
pub async fn list_providers(State(state): State<AppState>) -> Json<Vec<ProviderSummary>> {
    Json(
        state
            .providers
            .iter()
            .map(|p| ProviderSummary {
                id: p.id.clone(),
                name: p.name.clone(),
                routable: p.trigger().is_some(),
                tools: p.tools().iter().map(|t| t.name.clone()).collect(),
            })
            .collect(),
    )
}

/// Agent run as a Server-Sent Events stream
pub async fn events_handler(
    State(state): State<AppState>,
    Query(params): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let agent_name = params.agent.as_deref().unwrap_or(CHAT_AGENT);
    let query = params.query.trim();

    let rx = if query.is_empty() {
        rejection(EMPTY_QUERY).await
    } else if let Some(agent) = state.agent(agent_name) {
        tracing::info!(
            agent = %agent_name,
            user_id = params.user_id.as_deref().unwrap_or("anonymous"),
            "Starting agent stream"
        );
        agent.run_stream(query)
    } else {
        tracing::warn!(agent = %agent_name, "Unknown agent requested");
        rejection(AGENT_NOT_FOUND).await
    };

    let stream = ReceiverStream::new(rx).map(|event| Ok(to_sse(&event)));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// One-event stream carrying a request error
async fn rejection(message: &str) -> tokio::sync::mpsc::Receiver<AgentEvent> {
    let (sink, rx) = EventSink::channel(1);
    sink.fail(message).await;
    rx
}

fn to_sse(event: &AgentEvent) -> Event {
    Event::default()
        .event(event.event_type())
        .data(event.payload().to_string())
}

/// Main chat endpoint (non-streaming)
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = payload.message.trim();
    if message.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, EMPTY_QUERY, "EMPTY_QUERY"));
    }

    let agent_name = payload.agent.as_deref().unwrap_or(CHAT_AGENT);
    let agent = state
        .agent(agent_name)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, AGENT_NOT_FOUND, "AGENT_NOT_FOUND"))?;

    let answer = agent.ask(message).await.map_err(|e| {
        tracing::error!(agent = %agent_name, error = %e, "Agent error");
        let status = if matches!(e, AgentError::BackendUnavailable(_)) {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        api_error(status, e.user_message(), "AGENT_ERROR")
    })?;

    Ok(Json(ChatResponse { message: answer }))
}
