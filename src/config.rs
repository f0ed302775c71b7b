//! Configuration management for repodoc
//!
//! This module handles loading, parsing, and validating configuration
//! from a YAML file with environment-variable overrides for secrets.
//! Every numeric limit the service enforces (TTL, session ceiling, rate
//! limits, content caps, timeouts) lives here rather than in business logic.

use crate::error::{RepodocError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable holding the system default API key
pub const API_KEY_ENV: &str = "REPODOC_API_KEY";

/// Main configuration structure for repodoc
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Remote LLM service settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Resource limits and timeouts
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address for the HTTP server
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Origin allow-list, reported via /health (enforcement is delegated
    /// to the fronting proxy in this deployment shape)
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_listen() -> String {
    "0.0.0.0:8000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            allowed_origins: Vec::new(),
        }
    }
}

/// Remote LLM service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Chat-completions endpoint of the generation service
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Model identifier sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// System default API key; overridden by `REPODOC_API_KEY` when set.
    /// Never logged.
    #[serde(default)]
    pub api_key: String,

    /// Courtesy delay applied before every generation call (seconds)
    #[serde(default = "default_request_delay")]
    pub request_delay_secs: u64,

    /// Shorter delay applied before the single system-key fallback call
    #[serde(default = "default_fallback_delay")]
    pub fallback_delay_secs: u64,

    /// Per-request HTTP timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// HTTP timeout for credential validation calls (seconds)
    #[serde(default = "default_validate_timeout")]
    pub validate_timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_request_delay() -> u64 {
    15
}

fn default_fallback_delay() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    120
}

fn default_validate_timeout() -> u64 {
    10
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_model(),
            api_key: String::new(),
            request_delay_secs: default_request_delay(),
            fallback_delay_secs: default_fallback_delay(),
            request_timeout_secs: default_request_timeout(),
            validate_timeout_secs: default_validate_timeout(),
        }
    }
}

/// Resource limits and timeouts
///
/// Defaults mirror a conservative single-node deployment: 80 live
/// sessions, 2 hour TTL, 1 MiB of retained content per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum number of live sessions before LRU eviction
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Session (and conversation) time-to-live in hours
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: u64,

    /// Interval between background reaper sweeps (minutes)
    #[serde(default = "default_cleanup_interval_minutes")]
    pub cleanup_interval_minutes: u64,

    /// Cap on stored session content (bytes); excess is tail-truncated
    #[serde(default = "default_max_content_bytes")]
    pub max_content_bytes: usize,

    /// Maximum total ingested repository size (bytes)
    #[serde(default = "default_max_repo_bytes")]
    pub max_repo_bytes: usize,

    /// Content retained per session after a successful documentation run
    #[serde(default = "default_retained_content_bytes")]
    pub retained_content_bytes: usize,

    /// Prompt-side content limit (chars); longer content is middle-truncated
    #[serde(default = "default_prompt_content_limit")]
    pub prompt_content_limit: usize,

    /// Message ceiling per conversation before it is rejected as exhausted
    #[serde(default = "default_max_messages_per_conversation")]
    pub max_messages_per_conversation: u64,

    /// Recent messages retained alongside the system message
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Maximum chat query length in characters
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,

    /// Per-client requests admitted per window
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests: u32,

    /// Sliding-window size for rate limiting (seconds)
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,

    /// Global requests admitted per window
    #[serde(default = "default_global_rate_limit")]
    pub global_rate_limit: u32,

    /// Wall-clock budget for a chat turn (seconds)
    #[serde(default = "default_chat_timeout_secs")]
    pub chat_timeout_secs: u64,

    /// Wall-clock budget for repository ingestion (seconds)
    #[serde(default = "default_ingestion_timeout_secs")]
    pub ingestion_timeout_secs: u64,

    /// Wall-clock budget for a full documentation run (seconds)
    #[serde(default = "default_docs_timeout_secs")]
    pub docs_timeout_secs: u64,

    /// Wall-clock budget for a diagram-only run (seconds)
    #[serde(default = "default_diagrams_timeout_secs")]
    pub diagrams_timeout_secs: u64,

    /// Memory high-water mark for reaper warnings (bytes)
    #[serde(default = "default_memory_warn_bytes")]
    pub memory_warn_bytes: usize,
}

fn default_max_sessions() -> usize {
    80
}

fn default_session_ttl_hours() -> u64 {
    2
}

fn default_cleanup_interval_minutes() -> u64 {
    10
}

fn default_max_content_bytes() -> usize {
    1024 * 1024
}

fn default_max_repo_bytes() -> usize {
    100 * 1024 * 1024
}

fn default_retained_content_bytes() -> usize {
    50_000
}

fn default_prompt_content_limit() -> usize {
    750_000
}

fn default_max_messages_per_conversation() -> u64 {
    50
}

fn default_history_window() -> usize {
    14
}

fn default_max_query_chars() -> usize {
    2000
}

fn default_rate_limit_requests() -> u32 {
    30
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

fn default_global_rate_limit() -> u32 {
    100
}

fn default_chat_timeout_secs() -> u64 {
    45
}

fn default_ingestion_timeout_secs() -> u64 {
    300
}

fn default_docs_timeout_secs() -> u64 {
    600
}

fn default_diagrams_timeout_secs() -> u64 {
    600
}

fn default_memory_warn_bytes() -> usize {
    200 * 1024 * 1024
}

impl Default for LimitsConfig {
    fn default() -> Self {
        // Route through serde so the default_* helpers stay authoritative
        serde_yaml::from_str("{}").expect("empty limits config deserializes")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file, falling back to defaults when
    /// the file does not exist, then apply environment overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config: Config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(RepodocError::Io)?;
            serde_yaml::from_str(&raw).map_err(RepodocError::Yaml)?
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Config::default()
        };

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                config.llm.api_key = key.trim().to_string();
            }
        }

        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `RepodocError::Config` when a required value is missing or
    /// a limit is nonsensical (zero ceiling, zero TTL, inverted caps).
    pub fn validate(&self) -> Result<()> {
        if self.llm.api_key.trim().is_empty() {
            return Err(RepodocError::Config(format!(
                "Missing system API key: set llm.api_key or the {} environment variable",
                API_KEY_ENV
            ))
            .into());
        }
        if self.limits.max_sessions == 0 {
            return Err(RepodocError::Config("max_sessions must be positive".to_string()).into());
        }
        if self.limits.session_ttl_hours == 0 {
            return Err(
                RepodocError::Config("session_ttl_hours must be positive".to_string()).into(),
            );
        }
        if self.limits.rate_limit_requests == 0 || self.limits.global_rate_limit == 0 {
            return Err(
                RepodocError::Config("rate limit ceilings must be positive".to_string()).into(),
            );
        }
        if self.limits.retained_content_bytes > self.limits.max_content_bytes {
            return Err(RepodocError::Config(
                "retained_content_bytes must not exceed max_content_bytes".to_string(),
            )
            .into());
        }
        if self.server.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(RepodocError::Config(format!(
                "Invalid listen address: {}",
                self.server.listen
            ))
            .into());
        }
        Ok(())
    }

    /// Session TTL as a duration
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.limits.session_ttl_hours * 3600)
    }

    /// Reaper sweep interval as a duration
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.limits.cleanup_interval_minutes * 60)
    }

    /// Rate-limit window as a duration
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.limits.rate_limit_window_secs)
    }
}
