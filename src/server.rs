//! HTTP server
//!
//! Thin axum layer over the store, limiter, gateway, ingester, and
//! pipeline. Handlers validate input, copy what they need out of the
//! store, and delegate; every externally triggered operation runs under
//! a wall-clock timeout. Error bodies use a `detail` field and status
//! codes follow the error taxonomy in `error.rs`.

use crate::chat::{self, ChatLimits};
use crate::config::Config;
use crate::error::RepodocError;
use crate::gateway::{LlmGateway, TextGenerator};
use crate::ingest::{default_excludes, GitIngester, RepoIngester};
use crate::limiter::{Admission, RateLimiter};
use crate::pipeline::{DocPipeline, PipelineInputs};
use crate::store::SessionStore;
use axum::extract::{ConnectInfo, Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Duration as ChronoDuration;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Shared application state threaded through every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<SessionStore>,
    pub limiter: Arc<RateLimiter>,
    pub generator: Arc<dyn TextGenerator>,
    pub gateway: Arc<LlmGateway>,
    pub ingester: Arc<dyn RepoIngester>,
}

impl AppState {
    /// Builds production state: a real gateway and a git-backed ingester
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn from_config(config: Config) -> crate::error::Result<Self> {
        let gateway = Arc::new(LlmGateway::new(&config.llm)?);
        let store = Arc::new(SessionStore::new(
            config.session_ttl(),
            config.limits.max_content_bytes,
            config.limits.history_window,
        ));
        let limiter = Arc::new(RateLimiter::new(
            config.limits.rate_limit_requests,
            config.limits.global_rate_limit,
            config.rate_limit_window(),
        ));
        Ok(Self {
            config: Arc::new(config),
            store,
            limiter,
            generator: gateway.clone(),
            gateway,
            ingester: Arc::new(GitIngester),
        })
    }

    fn pipeline(&self) -> DocPipeline {
        DocPipeline::new(
            self.generator.clone(),
            self.config.limits.prompt_content_limit,
        )
    }
}

/// Error wrapper that renders as `{"detail": ...}` with a mapped status
pub struct ApiError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(error: E) -> Self {
        Self(error.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<RepodocError>() {
            Some(RepodocError::BadRequest(_)) => StatusCode::BAD_REQUEST,
            Some(RepodocError::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(RepodocError::Timeout(_)) => StatusCode::REQUEST_TIMEOUT,
            Some(RepodocError::RepoTooLarge(_)) => StatusCode::PAYLOAD_TOO_LARGE,
            Some(RepodocError::RateLimited { .. })
            | Some(RepodocError::Overloaded)
            | Some(RepodocError::ConversationExhausted { .. }) => StatusCode::TOO_MANY_REQUESTS,
            Some(RepodocError::Upstream) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let detail = self.0.to_string();
        if status.is_server_error() {
            tracing::error!("Request failed ({}): {}", status, detail);
        } else {
            tracing::warn!("Request rejected ({}): {}", status, detail);
        }
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct IngestRequest {
    repo_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionRequest {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    session_id: String,
    query: String,
}

#[derive(Debug, Deserialize)]
struct ValidateKeyRequest {
    api_key: String,
}

/// Builds the router with the rate-limiting middleware attached
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/validate-key", post(validate_key))
        .route("/ingest", post(ingest))
        .route("/generate-docs", post(generate_docs))
        .route("/generate-diagrams", post(generate_diagrams))
        .route("/chat", post(chat_endpoint))
        .route("/session/:session_id", get(session_info))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .with_state(state)
}

/// Sliding-window admission check; health routes bypass it
async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path();
    if path == "/" || path == "/health" {
        return next.run(request).await;
    }

    let client = client_key(&request);
    match state.limiter.admit(&client) {
        Admission::Allowed => next.run(request).await,
        Admission::Overloaded => {
            tracing::warn!("Global rate limit exceeded");
            ApiError::from(RepodocError::Overloaded).into_response()
        }
        Admission::LimitedPerClient { limit, window_secs } => {
            tracing::warn!("Rate limit exceeded for client: {}", client);
            ApiError::from(RepodocError::RateLimited { limit, window_secs }).into_response()
        }
    }
}

/// Client key for rate limiting: first X-Forwarded-For hop, else the
/// peer address
fn client_key(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Repodoc API is running",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "healthy",
    }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let usage = state.store.memory_usage();
    let limits = &state.config.limits;

    let total_mb = mb(usage.total_bytes());
    let warn_mb = mb(limits.memory_warn_bytes);
    let memory_health = if total_mb > warn_mb * 1.5 {
        "critical"
    } else if total_mb > warn_mb {
        "warning"
    } else {
        "healthy"
    };

    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "memory": {
            "total_sessions": usage.sessions,
            "total_conversations": usage.conversations,
            "content_size_mb": mb(usage.content_bytes),
            "message_size_mb": mb(usage.message_bytes),
            "total_size_mb": total_mb,
            "health": memory_health,
        },
        "limits": {
            "max_sessions": limits.max_sessions,
            "session_ttl_hours": limits.session_ttl_hours,
            "max_content_size_mb": mb(limits.max_content_bytes),
            "rate_limit_per_client": format!(
                "{}/{}s",
                limits.rate_limit_requests, limits.rate_limit_window_secs
            ),
            "global_rate_limit": format!("{}/min", limits.global_rate_limit),
        },
        "api_key_status": if state.config.llm.api_key.trim().is_empty() {
            "missing"
        } else {
            "configured"
        },
        "active_rate_limits": state.limiter.active_clients(),
        "allowed_origins": state.config.server.allowed_origins,
    }))
}

async fn validate_key(
    State(state): State<AppState>,
    Json(body): Json<ValidateKeyRequest>,
) -> Result<Json<Value>, ApiError> {
    if body.api_key.trim().is_empty() {
        return Err(RepodocError::BadRequest("API key is required".to_string()).into());
    }

    let valid = state.gateway.validate(&body.api_key).await;
    let message = if valid {
        "API key is valid"
    } else {
        "Invalid API key"
    };
    Ok(Json(json!({ "valid": valid, "message": message })))
}

async fn ingest(
    State(state): State<AppState>,
    Json(body): Json<IngestRequest>,
) -> Result<Json<Value>, ApiError> {
    let repo_url = body.repo_url.trim();
    if repo_url.is_empty() {
        return Err(RepodocError::BadRequest("Repository URL is required".to_string()).into());
    }
    if !is_github_repo(repo_url) {
        return Err(
            RepodocError::BadRequest("Only GitHub repositories are supported".to_string()).into(),
        );
    }

    // Reclaim space before taking on a new session.
    state.store.sweep_expired();
    if state.store.session_count() >= state.config.limits.max_sessions {
        state
            .store
            .enforce_capacity(state.config.limits.max_sessions.saturating_sub(1));
    }

    let user_key = body
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string);
    tracing::info!(
        "Ingesting repository: {} | User Key: {}",
        repo_url,
        if user_key.is_some() { "Yes" } else { "No" }
    );

    let timeout = Duration::from_secs(state.config.limits.ingestion_timeout_secs);
    let ingested =
        match tokio::time::timeout(timeout, state.ingester.ingest(repo_url, &default_excludes()))
            .await
        {
            Ok(result) => result?,
            Err(_) => {
                tracing::error!("Ingestion timeout for {}", repo_url);
                return Err(RepodocError::Timeout(
                    "Repository ingestion timed out. The repository might be too large or complex."
                        .to_string(),
                )
                .into());
            }
        };

    let total_size = ingested.summary.len() + ingested.tree.len() + ingested.content.len();
    if total_size > state.config.limits.max_repo_bytes {
        return Err(RepodocError::RepoTooLarge(format!(
            "Repository too large ({:.1}MB). Maximum size is {:.0}MB.",
            mb(total_size),
            mb(state.config.limits.max_repo_bytes)
        ))
        .into());
    }

    let has_user_key = user_key.is_some();
    let token = state.store.create(
        repo_url,
        ingested.summary.clone(),
        ingested.tree,
        ingested.content,
        user_key,
    );
    let session = state
        .store
        .get(&token)
        .ok_or_else(|| RepodocError::NotFound("Session not found or expired".to_string()))?;
    tracing::info!(
        "Repository ingested successfully: {} | Size: {:.1}KB",
        token,
        session.content_size as f64 / 1024.0
    );

    let ttl = ChronoDuration::seconds(state.config.limits.session_ttl_hours as i64 * 3600);
    Ok(Json(json!({
        "session_id": token,
        "message": "Repository ingested successfully",
        "repo_url": repo_url,
        "summary": preview(&ingested.summary, 500),
        "has_user_key": has_user_key,
        "metadata": {
            "content_size_kb": (session.content_size as f64 / 1024.0 * 10.0).round() / 10.0,
            "total_size_kb": (total_size as f64 / 1024.0 * 10.0).round() / 10.0,
            "expires_at": (session.created_at + ttl).to_rfc3339(),
        },
    })))
}

async fn generate_docs(
    State(state): State<AppState>,
    Json(body): Json<SessionRequest>,
) -> Result<Json<Value>, ApiError> {
    let session = state.store.get(&body.session_id).ok_or_else(|| {
        RepodocError::NotFound(
            "Session not found or expired. Please ingest repository again.".to_string(),
        )
    })?;
    state.store.touch(&body.session_id);

    tracing::info!(
        "Starting documentation generation for session: {} | User Key: {}",
        body.session_id,
        if session.user_api_key.is_some() { "Yes" } else { "No" }
    );

    let pipeline = state.pipeline();
    let inputs = PipelineInputs {
        repo_url: &session.repo_url,
        ingest_summary: &session.summary,
        tree: &session.tree,
        content: &session.content,
        credential: session.user_api_key.as_deref(),
    };

    let timeout = Duration::from_secs(state.config.limits.docs_timeout_secs);
    let bundle = match tokio::time::timeout(timeout, pipeline.generate(&inputs)).await {
        Ok(Ok(bundle)) => bundle,
        Ok(Err(e)) => return Err(RepodocError::Pipeline(e.to_string()).into()),
        Err(_) => {
            tracing::error!(
                "Documentation generation timeout for session: {}",
                body.session_id
            );
            return Err(RepodocError::Timeout(
                "Documentation generation timed out. The repository might be too complex."
                    .to_string(),
            )
            .into());
        }
    };

    // Chat only needs a reduced slice of the content from here on.
    state
        .store
        .shrink_content(&body.session_id, state.config.limits.retained_content_bytes);

    let mut chapters = serde_json::Map::new();
    for chapter in &bundle.chapters {
        chapters.insert(
            format!("chapter_{}", chapter.number),
            serde_json::to_value(chapter)?,
        );
    }

    Ok(Json(json!({
        "success": true,
        "session_id": body.session_id,
        "repo_url": session.repo_url,
        "introduction": bundle.introduction,
        "chapters": chapters,
        "mermaid_diagrams": bundle.diagrams,
        "metadata": {
            "total_chapters": bundle.chapters.len(),
            "total_diagrams": bundle.diagrams.len(),
            "comprehensive_summary": preview(&bundle.summary, 300),
            "abstractions_preview": preview(&bundle.abstractions, 200),
        },
    })))
}

async fn generate_diagrams(
    State(state): State<AppState>,
    Json(body): Json<SessionRequest>,
) -> Result<Json<Value>, ApiError> {
    let session = state.store.get(&body.session_id).ok_or_else(|| {
        RepodocError::NotFound(
            "Session not found or expired. Please ingest repository again.".to_string(),
        )
    })?;
    state.store.touch(&body.session_id);

    tracing::info!(
        "Starting diagram generation for session: {}",
        body.session_id
    );

    let pipeline = state.pipeline();
    let inputs = PipelineInputs {
        repo_url: &session.repo_url,
        ingest_summary: &session.summary,
        tree: &session.tree,
        content: &session.content,
        credential: session.user_api_key.as_deref(),
    };

    let timeout = Duration::from_secs(state.config.limits.diagrams_timeout_secs);
    let diagrams = match tokio::time::timeout(timeout, pipeline.generate_diagram_bundle(&inputs))
        .await
    {
        Ok(diagrams) => diagrams,
        Err(_) => {
            tracing::error!("Diagram generation timeout for session: {}", body.session_id);
            return Err(RepodocError::Timeout(
                "Mermaid diagram generation timed out. The repository might be too complex."
                    .to_string(),
            )
            .into());
        }
    };

    Ok(Json(json!({
        "success": true,
        "session_id": body.session_id,
        "diagrams": diagrams,
        "total_diagrams": diagrams.len(),
    })))
}

async fn chat_endpoint(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<Value>, ApiError> {
    let limits = ChatLimits {
        max_query_chars: state.config.limits.max_query_chars,
        max_messages: state.config.limits.max_messages_per_conversation,
        timeout: Duration::from_secs(state.config.limits.chat_timeout_secs),
    };
    let answer = chat::chat_turn(
        &state.store,
        state.generator.as_ref(),
        limits,
        &body.session_id,
        &body.query,
    )
    .await?;
    Ok(Json(json!({ "answer": answer })))
}

async fn session_info(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let session = state
        .store
        .get(&session_id)
        .ok_or_else(|| RepodocError::NotFound("Session not found or expired".to_string()))?;
    state.store.touch(&session_id);

    let ttl = ChronoDuration::seconds(state.config.limits.session_ttl_hours as i64 * 3600);
    Ok(Json(json!({
        "session_id": session_id,
        "repo_url": session.repo_url,
        "status": "active",
        "created_at": session.created_at.to_rfc3339(),
        "expires_at": (session.created_at + ttl).to_rfc3339(),
        "content_size_kb": (session.content_size as f64 / 1024.0 * 10.0).round() / 10.0,
        "request_count": session.request_count,
        "has_user_key": session.user_api_key.is_some(),
        "summary_preview": preview(&session.summary, 300),
    })))
}

/// Accepts http(s) locators whose host is exactly `github.com`
fn is_github_repo(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https") && url.host_str() == Some("github.com")
        }
        Err(_) => false,
    }
}

fn mb(bytes: usize) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}

/// First `max` characters with an ellipsis when truncated
fn preview(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_short_string_untouched() {
        assert_eq!(preview("hello", 10), "hello");
    }

    #[test]
    fn test_preview_truncates_with_ellipsis() {
        assert_eq!(preview("hello world", 5), "hello...");
    }

    #[test]
    fn test_mb_rounds_to_two_places() {
        assert_eq!(mb(1024 * 1024), 1.0);
        assert_eq!(mb(1536 * 1024), 1.5);
    }

    #[test]
    fn test_client_key_prefers_forwarded_header() {
        let request = Request::builder()
            .uri("/ingest")
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(client_key(&request), "203.0.113.9");
    }

    #[test]
    fn test_client_key_falls_back_to_unknown() {
        let request = Request::builder()
            .uri("/ingest")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(client_key(&request), "unknown");
    }

    #[test]
    fn test_is_github_repo_accepts_github_locators() {
        assert!(is_github_repo("https://github.com/acme/widget"));
        assert!(is_github_repo("http://github.com/acme/widget"));
    }

    #[test]
    fn test_is_github_repo_rejects_other_hosts_and_schemes() {
        assert!(!is_github_repo("https://gitlab.com/acme/widget"));
        assert!(!is_github_repo("https://github.com.evil.example/acme/widget"));
        assert!(!is_github_repo("https://www.github.com/acme/widget"));
        assert!(!is_github_repo("git@github.com:acme/widget.git"));
        assert!(!is_github_repo("not a url"));
        assert!(!is_github_repo("ftp://github.com/acme/widget"));
    }

    #[test]
    fn test_error_status_mapping() {
        fn status_of(error: RepodocError) -> StatusCode {
            ApiError::from(error).into_response().status()
        }

        assert_eq!(status_of(RepodocError::BadRequest("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(RepodocError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(RepodocError::Timeout("x".into())), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            status_of(RepodocError::RepoTooLarge("x".into())),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            status_of(RepodocError::RateLimited { limit: 30, window_secs: 60 }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(status_of(RepodocError::Overloaded), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            status_of(RepodocError::ConversationExhausted { limit: 50 }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(status_of(RepodocError::Upstream), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_of(RepodocError::Pipeline("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
