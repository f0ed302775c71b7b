//! LLM gateway
//!
//! Single point of contact to the remote generation service. The gateway
//! enforces a fixed courtesy delay before every generation call, prefers a
//! caller-supplied credential with exactly one system-key fallback, and
//! normalizes every failure shape (network error, non-success status,
//! malformed payload, empty text) to `None` so the pipeline layer decides
//! how to react. Credentials are never logged.

use crate::config::LlmConfig;
use crate::error::{RepodocError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A role-tagged chat message in the remote service's wire format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// Message role: "system", "user", or "assistant"
    pub role: String,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Creates a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Creates an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Seam between the pipeline layer and the remote generation service
///
/// `None` is the uniform absence signal: the call produced no usable text,
/// whatever the underlying reason.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates text from a single prompt
    async fn generate(&self, prompt: &str, credential: Option<&str>) -> Option<String>;

    /// Generates the next assistant turn for a conversation
    async fn chat(&self, messages: &[ChatMessage], credential: Option<&str>) -> Option<String>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: String,
}

/// Gateway to the remote chat-completions service
pub struct LlmGateway {
    client: Client,
    api_base: String,
    model: String,
    system_key: String,
    request_delay: Duration,
    fallback_delay: Duration,
    validate_timeout: Duration,
}

impl LlmGateway {
    /// Creates a gateway from LLM configuration
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client initialization fails.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("repodoc/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RepodocError::Config(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized LLM gateway: model={}, request_delay={}s",
            config.model,
            config.request_delay_secs
        );

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            model: config.model.clone(),
            system_key: config.api_key.clone(),
            request_delay: Duration::from_secs(config.request_delay_secs),
            fallback_delay: Duration::from_secs(config.fallback_delay_secs),
            validate_timeout: Duration::from_secs(config.validate_timeout_secs),
        })
    }

    /// Checks whether a credential is accepted by the remote service
    ///
    /// Issues one minimal request and reports success without mutating any
    /// state. Skips the courtesy delay: validation is interactive.
    pub async fn validate(&self, credential: &str) -> bool {
        let credential = credential.trim();
        if credential.is_empty() {
            return false;
        }

        let messages = [ChatMessage::user("test")];
        let body = CompletionRequest {
            model: &self.model,
            messages: &messages,
            max_tokens: Some(5),
        };

        match self
            .client
            .post(&self.api_base)
            .bearer_auth(credential)
            .timeout(self.validate_timeout)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!("Credential validation request failed: {}", e);
                false
            }
        }
    }

    /// One remote attempt with a specific key; any failure becomes `None`
    async fn attempt(&self, messages: &[ChatMessage], key: &str) -> Option<String> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
            max_tokens: None,
        };

        let response = match self
            .client
            .post(&self.api_base)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Generation request failed: {}", e);
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Generation service returned status {}", status);
            return None;
        }

        let parsed: CompletionResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("Malformed generation response: {}", e);
                return None;
            }
        };

        let text = parsed.choices.into_iter().next()?.message.content;
        if text.trim().is_empty() {
            tracing::warn!("Empty text payload from generation service");
            return None;
        }

        tracing::debug!("Received generation response ({} chars)", text.len());
        Some(text)
    }

    /// Delay, attempt with the preferred key, and fall back once to the
    /// system key when a caller-supplied credential failed
    async fn request(&self, messages: &[ChatMessage], credential: Option<&str>) -> Option<String> {
        tokio::time::sleep(self.request_delay).await;

        let key = credential.unwrap_or(&self.system_key);
        if let Some(text) = self.attempt(messages, key).await {
            return Some(text);
        }

        if credential.is_some() {
            tracing::info!("Caller credential failed, retrying once with system key");
            tokio::time::sleep(self.fallback_delay).await;
            return self.attempt(messages, &self.system_key).await;
        }

        None
    }
}

#[async_trait]
impl TextGenerator for LlmGateway {
    async fn generate(&self, prompt: &str, credential: Option<&str>) -> Option<String> {
        tracing::debug!("Sending prompt ({} chars)", prompt.len());
        let messages = [ChatMessage::user(prompt)];
        self.request(&messages, credential).await
    }

    async fn chat(&self, messages: &[ChatMessage], credential: Option<&str>) -> Option<String> {
        tracing::debug!("Sending conversation ({} messages)", messages.len());
        self.request(messages, credential).await
    }
}
