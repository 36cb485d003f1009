//! Configuration loader.
//!
//! Resolution order, lowest to highest precedence:
//!
//! 1. [`ServerConfig::default()`]
//! 2. `config.toml` (at `PARLEY_CONFIG_PATH`, else `{data_dir}/config.toml`)
//! 3. `PARLEY_*` environment variables
//!
//! Missing or malformed sources never prevent startup: a parse failure
//! logs a warning and falls through to the next source, and missing
//! pipeline credentials leave `pipeline = None`, which runs the gateway
//! in degraded mode (fixed fallback answers).

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use parley_types::config::{PipelineConfig, ServerConfig};

/// Resolve the data directory (`PARLEY_DATA_DIR`, else `~/.parley`).
pub fn resolve_data_dir() -> PathBuf {
    match std::env::var("PARLEY_DATA_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".parley")
        }
    }
}

/// Load configuration from file and environment.
pub async fn load_config() -> ServerConfig {
    let config_path = match std::env::var("PARLEY_CONFIG_PATH") {
        Ok(path) => PathBuf::from(path),
        Err(_) => resolve_data_dir().join("config.toml"),
    };
    let config = load_config_file(&config_path).await;
    apply_env(config, |name| std::env::var(name).ok())
}

/// Load `config.toml`, falling back to defaults when missing or malformed.
async fn load_config_file(config_path: &Path) -> ServerConfig {
    let content = match tokio::fs::read_to_string(config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                "No config.toml found at {}, using defaults",
                config_path.display()
            );
            return ServerConfig::default();
        }
        Err(err) => {
            tracing::warn!(
                "Failed to read {}: {err}, using defaults",
                config_path.display()
            );
            return ServerConfig::default();
        }
    };

    match toml::from_str::<ServerConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ServerConfig::default()
        }
    }
}

/// Apply `PARLEY_*` overrides on top of a base config.
///
/// Takes the lookup as a closure so tests can inject variables without
/// mutating the process environment.
fn apply_env(
    mut config: ServerConfig,
    env: impl Fn(&str) -> Option<String>,
) -> ServerConfig {
    if let Some(host) = env("PARLEY_HOST") {
        config.host = host;
    }
    if let Some(port) = env("PARLEY_PORT") {
        match port.parse() {
            Ok(port) => config.port = port,
            Err(_) => tracing::warn!(value = %port, "ignoring invalid PARLEY_PORT"),
        }
    }
    if let Some(url) = env("PARLEY_DATABASE_URL") {
        config.database_url = Some(url);
    }
    if let Some(secs) = env("PARLEY_RETENTION_SECS") {
        match secs.parse() {
            Ok(secs) => config.retention_secs = secs,
            Err(_) => tracing::warn!(value = %secs, "ignoring invalid PARLEY_RETENTION_SECS"),
        }
    }
    if let Some(ms) = env("PARLEY_ESCALATION_MS") {
        match ms.parse() {
            Ok(ms) => config.escalation_ms = ms,
            Err(_) => tracing::warn!(value = %ms, "ignoring invalid PARLEY_ESCALATION_MS"),
        }
    }
    if let Some(origins) = env("PARLEY_ALLOWED_ORIGINS") {
        config.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }

    if let Some(api_key) = env("PARLEY_GEMINI_API_KEY") {
        let api_key = SecretString::from(api_key);
        match config.pipeline.as_mut() {
            Some(pipeline) => pipeline.api_key = api_key,
            None => config.pipeline = Some(PipelineConfig::with_key(api_key)),
        }
    }
    if let Some(base_url) = env("PARLEY_PIPELINE_BASE_URL") {
        if let Some(pipeline) = config.pipeline.as_mut() {
            pipeline.base_url = base_url;
        } else {
            tracing::warn!("PARLEY_PIPELINE_BASE_URL set without an API key, ignoring");
        }
    }
    if let Some(model) = env("PARLEY_PIPELINE_MODEL") {
        if let Some(pipeline) = config.pipeline.as_mut() {
            pipeline.model = model;
        } else {
            tracing::warn!("PARLEY_PIPELINE_MODEL set without an API key, ignoring");
        }
    }

    config
}

/// Names of recognized-but-unset options that degrade functionality.
///
/// Printed as a startup warning so a half-configured deployment is
/// diagnosable; the process still runs.
pub fn missing_options(config: &ServerConfig) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if config.pipeline.is_none() {
        missing.push("PARLEY_GEMINI_API_KEY");
    }
    if config.database_url.is_none() {
        // Not fatal: the store falls back to the default data directory.
        missing.push("PARLEY_DATABASE_URL");
    }
    missing
}
