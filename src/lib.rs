//! Repodoc - AI-powered repository documentation and chat service
//!
//! This library provides the core functionality for the repodoc service:
//! repository ingestion, session management, the multi-stage documentation
//! pipeline, mermaid diagram generation, and repository chat.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `server`: HTTP routes, middleware, and error mapping
//! - `store`: Session and conversation storage with TTL and LRU eviction
//! - `limiter`: Sliding-window rate limiting
//! - `gateway`: LLM gateway over the chat-completions wire contract
//! - `pipeline`: Documentation stages, chapter parsing, diagrams, markdown cleanup
//! - `ingest`: Repository cloning and content extraction
//! - `chat`: Repository chat turns
//! - `reaper`: Background maintenance loop
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//!
//! # Example
//!
//! ```no_run
//! use repodoc::config::Config;
//! use repodoc::server::{build_router, AppState};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml")?;
//!     config.validate()?;
//!
//!     let state = AppState::from_config(config)?;
//!     let _router = build_router(state);
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod config;
pub mod error;
pub mod gateway;
pub mod ingest;
pub mod limiter;
pub mod pipeline;
pub mod reaper;
pub mod server;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use error::{RepodocError, Result};
pub use gateway::{ChatMessage, LlmGateway, TextGenerator};
pub use pipeline::{DocBundle, DocPipeline, PipelineError};
pub use server::{build_router, AppState};
pub use store::SessionStore;
