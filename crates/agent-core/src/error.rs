//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Text-generation backend unreachable or answered with a non-success status
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Tool not registered locally and not advertised by any provider
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool arguments did not satisfy the tool's schema
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Transport failure while calling a tool provider
    #[error("Tool invocation failed: {0}")]
    InvocationFailed(String),

    /// Tool provider answered with a non-success status
    #[error("Provider error (status {status}): {body}")]
    ProviderError { status: u16, body: String },

    /// Tool ran but reported an error
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Classification answer could not be read as an intent object
    #[error("Intent parse failure: {0}")]
    IntentParse(String),

    /// A streamed backend line could not be decoded
    #[error("Malformed stream chunk: {0}")]
    MalformedChunk(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Whether the agent loop absorbs this error instead of aborting.
    ///
    /// Tool-level failures become observations for the model, intent parse
    /// failures become a non-match and malformed chunks are skipped.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AgentError::ToolNotFound(_)
                | AgentError::ToolValidation(_)
                | AgentError::InvocationFailed(_)
                | AgentError::ProviderError { .. }
                | AgentError::ToolExecution(_)
                | AgentError::IntentParse(_)
                | AgentError::MalformedChunk(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::BackendUnavailable(_) => {
                "The AI service is currently unavailable. Please try again.".into()
            }
            AgentError::ToolNotFound(name) => format!("The tool '{name}' is not available."),
            AgentError::ToolValidation(msg) => format!("Invalid tool input: {msg}"),
            AgentError::InvocationFailed(_) | AgentError::ProviderError { .. } => {
                "The tool provider could not be reached.".into()
            }
            AgentError::ToolExecution(msg) => format!("Tool error: {msg}"),
            AgentError::Config(msg) => format!("Service misconfigured: {msg}"),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_failures_are_recoverable() {
        assert!(AgentError::ToolNotFound("x".into()).is_recoverable());
        assert!(AgentError::InvocationFailed("refused".into()).is_recoverable());
        assert!(
            AgentError::ProviderError {
                status: 500,
                body: "boom".into()
            }
            .is_recoverable()
        );
        assert!(AgentError::ToolExecution("bad input".into()).is_recoverable());
        assert!(!AgentError::BackendUnavailable("down".into()).is_recoverable());
    }

    #[test]
    fn provider_error_display_carries_body() {
        let err = AgentError::ProviderError {
            status: 503,
            body: "maintenance".into(),
        };
        assert_eq!(err.to_string(), "Provider error (status 503): maintenance");
    }
}
