//! Repository chat
//!
//! One chat turn: validate the query, resolve the session, lazily create
//! the conversation seeded with the repository context, enforce the
//! per-conversation message budget, and ask the generator for the next
//! assistant turn. An upstream timeout degrades to a fixed fallback
//! answer (still appended to the transcript); an outright generation
//! failure surfaces as an upstream error.

use crate::error::{RepodocError, Result};
use crate::gateway::{ChatMessage, TextGenerator};
use crate::pipeline::prompts;
use crate::store::SessionStore;
use std::time::Duration;

/// Answer returned when the generation service times out mid-chat
pub const FALLBACK_ANSWER: &str = "I'm sorry, but I'm having trouble processing your request right now. Please try asking a more specific question.";

/// Limits applied to a chat turn
#[derive(Debug, Clone, Copy)]
pub struct ChatLimits {
    pub max_query_chars: usize,
    pub max_messages: u64,
    pub timeout: Duration,
}

/// Runs one chat turn and returns the assistant answer
///
/// # Errors
///
/// `BadRequest` on an empty or oversized query, `NotFound` when the
/// session is unknown or expired, `ConversationExhausted` past the
/// message budget, `Upstream` when the generation service fails outright.
pub async fn chat_turn(
    store: &SessionStore,
    generator: &dyn TextGenerator,
    limits: ChatLimits,
    token: &str,
    query: &str,
) -> Result<String> {
    if query.trim().is_empty() {
        return Err(RepodocError::BadRequest("Query cannot be empty".to_string()).into());
    }
    if query.chars().count() > limits.max_query_chars {
        return Err(RepodocError::BadRequest(format!(
            "Query too long. Maximum {} characters.",
            limits.max_query_chars
        ))
        .into());
    }

    let session = store
        .get(token)
        .ok_or_else(|| RepodocError::NotFound("Session not found or expired".to_string()))?;
    store.touch(token);

    let created = store.ensure_conversation(
        token,
        vec![ChatMessage::user(prompts::chat_context_message(
            &session.summary,
            &session.tree,
            &session.content,
        ))],
    );
    if created {
        tracing::info!("Created new conversation for session: {}", token);
    }

    if let Some(count) = store.conversation_message_count(token) {
        if count > limits.max_messages {
            return Err(RepodocError::ConversationExhausted {
                limit: limits.max_messages,
            }
            .into());
        }
    }

    store.append_message(token, ChatMessage::user(query));
    let messages = store
        .conversation_messages(token)
        .ok_or_else(|| RepodocError::NotFound("Session not found or expired".to_string()))?;

    let credential = session.user_api_key.as_deref();
    match tokio::time::timeout(limits.timeout, generator.chat(&messages, credential)).await {
        Ok(Some(answer)) => {
            store.append_message(token, ChatMessage::assistant(answer.clone()));
            Ok(answer)
        }
        Ok(None) => Err(RepodocError::Upstream.into()),
        Err(_) => {
            tracing::warn!("Chat generation timed out for session: {}", token);
            store.append_message(token, ChatMessage::assistant(FALLBACK_ANSWER));
            Ok(FALLBACK_ANSWER.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedGenerator {
        reply: Option<String>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl CannedGenerator {
        fn replying(text: &str) -> Self {
            Self {
                reply: Some(text.to_string()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                reply: None,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn slow(text: &str, delay: Duration) -> Self {
            Self {
                reply: Some(text.to_string()),
                delay,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn generate(&self, _prompt: &str, _credential: Option<&str>) -> Option<String> {
            self.chat(&[], None).await
        }

        async fn chat(&self, _messages: &[ChatMessage], _credential: Option<&str>) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.reply.clone()
        }
    }

    fn store() -> SessionStore {
        SessionStore::new(Duration::from_secs(3600), 1024 * 1024, 14)
    }

    fn limits() -> ChatLimits {
        ChatLimits {
            max_query_chars: 2000,
            max_messages: 50,
            timeout: Duration::from_secs(5),
        }
    }

    fn ingest(store: &SessionStore) -> String {
        store.create("https://github.com/acme/demo", "sum", "tree", "content", None)
    }

    #[tokio::test]
    async fn test_chat_turn_returns_answer_and_records_history() {
        let store = store();
        let token = ingest(&store);
        let generator = CannedGenerator::replying("It parses YAML.");

        let answer = chat_turn(&store, &generator, limits(), &token, "What does it do?")
            .await
            .unwrap();
        assert_eq!(answer, "It parses YAML.");

        let messages = store.conversation_messages(&token).unwrap();
        // Context seed + user query + assistant answer
        assert_eq!(messages.len(), 3);
        assert!(messages[0].content.contains("REPOSITORY SUMMARY:\nsum"));
        assert_eq!(messages[1].content, "What does it do?");
        assert_eq!(messages[2].role, "assistant");
    }

    #[tokio::test]
    async fn test_chat_turn_rejects_empty_query() {
        let store = store();
        let token = ingest(&store);
        let generator = CannedGenerator::replying("x");

        let err = chat_turn(&store, &generator, limits(), &token, "   ")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RepodocError>(),
            Some(RepodocError::BadRequest(_))
        ));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_chat_turn_rejects_oversized_query() {
        let store = store();
        let token = ingest(&store);
        let generator = CannedGenerator::replying("x");

        let long = "q".repeat(2001);
        let err = chat_turn(&store, &generator, limits(), &token, &long)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RepodocError>(),
            Some(RepodocError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_chat_turn_unknown_session() {
        let store = store();
        let generator = CannedGenerator::replying("x");

        let err = chat_turn(&store, &generator, limits(), "missing", "hi")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RepodocError>(),
            Some(RepodocError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_chat_turn_exhausted_conversation() {
        let store = store();
        let token = ingest(&store);
        let generator = CannedGenerator::replying("x");
        let limits = ChatLimits {
            max_messages: 2,
            ..self::limits()
        };

        assert!(chat_turn(&store, &generator, limits, &token, "one").await.is_ok());
        assert!(chat_turn(&store, &generator, limits, &token, "two").await.is_ok());
        assert!(chat_turn(&store, &generator, limits, &token, "three").await.is_ok());

        let err = chat_turn(&store, &generator, limits, &token, "four")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RepodocError>(),
            Some(RepodocError::ConversationExhausted { limit: 2 })
        ));
    }

    #[tokio::test]
    async fn test_chat_turn_upstream_failure() {
        let store = store();
        let token = ingest(&store);
        let generator = CannedGenerator::failing();

        let err = chat_turn(&store, &generator, limits(), &token, "hi")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RepodocError>(),
            Some(RepodocError::Upstream)
        ));
    }

    #[tokio::test]
    async fn test_chat_turn_timeout_degrades_to_fallback() {
        let store = store();
        let token = ingest(&store);
        let generator = CannedGenerator::slow("late", Duration::from_secs(60));
        let limits = ChatLimits {
            timeout: Duration::from_millis(20),
            ..self::limits()
        };

        let answer = chat_turn(&store, &generator, limits, &token, "hi")
            .await
            .unwrap();
        assert_eq!(answer, FALLBACK_ANSWER);

        let messages = store.conversation_messages(&token).unwrap();
        assert_eq!(messages.last().unwrap().content, FALLBACK_ANSWER);
        assert_eq!(messages.last().unwrap().role, "assistant");
    }
}
