//! Error types for repodoc
//!
//! This module defines all error types used throughout the service,
//! using `thiserror` for ergonomic error handling. The HTTP layer maps
//! each variant to a status code in `server.rs`.

use thiserror::Error;

/// Main error type for repodoc operations
///
/// This enum encompasses all failure kinds the service distinguishes:
/// input validation, capacity rejections, upstream absence, timeouts,
/// and unknown/expired sessions.
#[derive(Error, Debug)]
pub enum RepodocError {
    /// Malformed or disallowed input, rejected before any state mutation
    #[error("{0}")]
    BadRequest(String),

    /// Unknown or expired session token
    #[error("{0}")]
    NotFound(String),

    /// Wall-clock budget exceeded on an in-flight operation
    #[error("{0}")]
    Timeout(String),

    /// Ingested repository exceeds the configured size cap
    #[error("{0}")]
    RepoTooLarge(String),

    /// Per-client sliding-window ceiling exceeded
    #[error("Rate limit exceeded. Maximum {limit} requests per {window_secs} seconds.")]
    RateLimited {
        /// The configured per-client ceiling that was exceeded
        limit: u32,
        /// Window size in seconds, usable as a wait hint
        window_secs: u64,
    },

    /// Global sliding-window ceiling exceeded
    #[error("Service temporarily unavailable due to high load. Please try again later.")]
    Overloaded,

    /// Conversation hit its per-session message ceiling
    #[error("Maximum messages per session reached. Please start a new session.")]
    ConversationExhausted {
        /// The configured message ceiling
        limit: u64,
    },

    /// Remote generation service unavailable (after any fallback attempt)
    #[error("AI service temporarily unavailable")]
    Upstream,

    /// Repository ingestion failure
    #[error("Error ingesting repository: {0}")]
    Ingestion(String),

    /// Documentation pipeline failure (hard stage or zero chapters)
    #[error("{0}")]
    Pipeline(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for repodoc operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
