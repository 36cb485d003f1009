//! Server configuration types.
//!
//! Deserialized from `config.toml` and overridden by `PARLEY_*` environment
//! variables (the loader lives in `parley-infra`). Every field has a
//! default: a missing or malformed file never prevents startup, it only
//! degrades functionality (no pipeline credentials means the gateway serves
//! the fixed fallback answer).

use secrecy::SecretString;
use serde::Deserialize;

/// Top-level server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listening address.
    pub host: String,
    /// Listening port.
    pub port: u16,
    /// SQLite database URL. `None` resolves to the default data directory.
    pub database_url: Option<String>,
    /// Rolling expiry window for session history, refreshed on every write.
    pub retention_secs: u64,
    /// Delay before an exchange's status escalates from typing to processing.
    pub escalation_ms: u64,
    /// CORS allow-list for HTTP and WebSocket origins. Empty means any origin.
    pub allowed_origins: Vec<String>,
    /// Answer pipeline backend. `None` runs degraded (fallback answers only).
    pub pipeline: Option<PipelineConfig>,
    /// Reconnect policy served to clients.
    pub reconnect: ReconnectPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3001,
            database_url: None,
            retention_secs: 86_400,
            escalation_ms: 3_000,
            allowed_origins: Vec::new(),
            pipeline: None,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Answer pipeline backend credentials and endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// API key for the backend. Wrapped so it never appears in Debug output.
    pub api_key: SecretString,
    /// OpenAI-compatible base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
}

impl PipelineConfig {
    /// Config with just a key, endpoint and model left at their defaults.
    pub fn with_key(api_key: SecretString) -> Self {
        Self {
            api_key,
            base_url: default_base_url(),
            model: default_model(),
        }
    }
}

fn default_base_url() -> String {
    // Google Gemini's OpenAI-compatible beta endpoint.
    "https://generativelanguage.googleapis.com/v1beta/openai".into()
}

fn default_model() -> String {
    "gemini-2.5-flash".into()
}

/// Client reconnection policy.
///
/// The WebSocket client reconnects with exponential backoff; the policy is
/// explicit configuration rather than socket-library defaults so it is
/// testable and reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

impl ReconnectPolicy {
    /// Backoff delay before the given attempt (0-based), capped at
    /// `max_delay_ms`.
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let exp = attempt.min(32);
        self.base_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_ms)
    }
}
