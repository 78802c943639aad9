//! Server Configuration

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Server settings read once at startup
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// Static files served for every unmatched path
    pub document_root: PathBuf,

    /// Directive for the chat agent; the built-in one when unset
    pub system_prompt: Option<String>,

    pub max_iterations: usize,
    pub channel_capacity: usize,

    /// Route queries to discovered providers before generation
    pub intent_routing: bool,
    pub intent_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".into(),
            document_root: PathBuf::from("www/html"),
            system_prompt: None,
            max_iterations: 5,
            channel_capacity: 32,
            intent_routing: true,
            intent_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparseable values keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            document_root: lookup("DOCUMENT_ROOT")
                .map_or(defaults.document_root, PathBuf::from),
            system_prompt: lookup("AGENT_SYSTEM_PROMPT").filter(|s| !s.trim().is_empty()),
            max_iterations: parsed(&lookup, "AGENT_MAX_ITERATIONS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_iterations),
            channel_capacity: parsed(&lookup, "AGENT_CHANNEL_CAPACITY")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.channel_capacity),
            intent_routing: lookup("INTENT_ROUTING")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.intent_routing),
            intent_timeout: parsed(&lookup, "INTENT_TIMEOUT_SECS")
                .map_or(defaults.intent_timeout, Duration::from_secs),
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "yes" | "on" => Some(true),
        "0" | "no" | "off" => Some(false),
        other => bool::from_str(other).ok(),
    }
}
