//! Session and conversation storage
//!
//! The session store exclusively owns every live ingested-repository
//! session and its lazily created chat conversation. All mutation funnels
//! through this type so the lifecycle invariants (TTL expiry, LRU
//! eviction, access bookkeeping, content caps, history windowing) are
//! enforced in one place. Expiry is lazy + periodic: `get` reclaims an
//! expired session immediately, and the background reaper performs full
//! sweeps; deleting an already-deleted token is a no-op.

use crate::gateway::ChatMessage;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

/// One ingested repository and its derived text payloads
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque unique token identifying this session
    pub token: String,
    /// Source repository URL
    pub repo_url: String,
    /// Ingestion summary text
    pub summary: String,
    /// Ingestion tree listing
    pub tree: String,
    /// Concatenated repository content, capped at creation time
    pub content: String,
    /// Caller-supplied credential, if any; never logged
    pub user_api_key: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last access timestamp, drives LRU eviction
    pub last_accessed: DateTime<Utc>,
    /// Content size before the creation-time cap was applied
    pub content_size: usize,
    /// Number of reads that used this session
    pub request_count: u64,
}

/// Chat transcript bound to a session, created lazily on first chat turn
#[derive(Debug, Clone)]
struct Conversation {
    messages: Vec<ChatMessage>,
    created_at: DateTime<Utc>,
    last_accessed: DateTime<Utc>,
    message_count: u64,
}

/// Counts reported by a reaper sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Sessions removed because their TTL elapsed
    pub expired_sessions: usize,
    /// Conversations removed (cascaded or independently expired)
    pub expired_conversations: usize,
}

/// Aggregate memory footprint of the store
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryUsage {
    /// Live session count
    pub sessions: usize,
    /// Live conversation count
    pub conversations: usize,
    /// Bytes held by session payloads (content + summary + tree)
    pub content_bytes: usize,
    /// Bytes held by conversation messages
    pub message_bytes: usize,
}

impl MemoryUsage {
    /// Total payload bytes across sessions and conversations
    pub fn total_bytes(&self) -> usize {
        self.content_bytes + self.message_bytes
    }
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<String, Session>,
    conversations: HashMap<String, Conversation>,
}

/// Thread-safe owner of all sessions and conversations
pub struct SessionStore {
    inner: Mutex<Inner>,
    ttl: ChronoDuration,
    max_content_bytes: usize,
    history_window: usize,
}

impl SessionStore {
    /// Creates a store with the given TTL, content cap, and chat history
    /// window (recent messages retained alongside the system message)
    pub fn new(ttl: Duration, max_content_bytes: usize, history_window: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ttl: ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::hours(2)),
            max_content_bytes,
            history_window,
        }
    }

    /// Creates a session, capping `content`, and returns its fresh token
    pub fn create(
        &self,
        repo_url: impl Into<String>,
        summary: impl Into<String>,
        tree: impl Into<String>,
        content: impl Into<String>,
        user_api_key: Option<String>,
    ) -> String {
        let token = Uuid::new_v4().to_string();
        let mut content = content.into();
        let content_size = content.len();
        truncate_at_boundary(&mut content, self.max_content_bytes);

        let now = Utc::now();
        let session = Session {
            token: token.clone(),
            repo_url: repo_url.into(),
            summary: summary.into(),
            tree: tree.into(),
            content,
            user_api_key,
            created_at: now,
            last_accessed: now,
            content_size,
            request_count: 0,
        };

        self.inner
            .lock()
            .unwrap()
            .sessions
            .insert(token.clone(), session);
        token
    }

    /// Returns a snapshot of the session, lazily reclaiming it if expired
    ///
    /// An expired session is deleted as a side effect (cascading to its
    /// conversation) and `None` is returned. A live session is returned
    /// without mutation; callers that "use" the session must also `touch`.
    pub fn get(&self, token: &str) -> Option<Session> {
        let mut inner = self.inner.lock().unwrap();
        let expired = match inner.sessions.get(token) {
            Some(session) => self.is_expired(session.created_at),
            None => return None,
        };
        if expired {
            inner.sessions.remove(token);
            inner.conversations.remove(token);
            tracing::info!("Lazily reclaimed expired session: {}", token);
            return None;
        }
        inner.sessions.get(token).cloned()
    }

    /// Updates `last_accessed` and increments the access counter
    ///
    /// Monotonic: the counter never decreases and the payload is untouched.
    /// Returns false if the token is unknown.
    pub fn touch(&self, token: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.sessions.get_mut(token) {
            Some(session) => {
                session.last_accessed = Utc::now();
                session.request_count += 1;
                true
            }
            None => false,
        }
    }

    /// Deletes a session and its conversation; no-op on unknown tokens
    pub fn delete(&self, token: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.sessions.remove(token);
        inner.conversations.remove(token);
    }

    /// Removes every session and conversation whose TTL has elapsed
    ///
    /// Conversations expire independently of their session, so a
    /// conversation can be reaped while its session survives.
    pub fn sweep_expired(&self) -> SweepReport {
        let mut inner = self.inner.lock().unwrap();
        let before_conversations = inner.conversations.len();

        let expired_tokens: Vec<String> = inner
            .sessions
            .iter()
            .filter(|(_, s)| self.is_expired(s.created_at))
            .map(|(t, _)| t.clone())
            .collect();
        for token in &expired_tokens {
            inner.sessions.remove(token);
            inner.conversations.remove(token);
            tracing::info!("Cleaned up expired session: {}", token);
        }

        // Conversations also expire on their own TTL, independently of
        // whether their session is still live
        let ttl = self.ttl;
        inner
            .conversations
            .retain(|_, c| Utc::now().signed_duration_since(c.created_at) <= ttl);

        SweepReport {
            expired_sessions: expired_tokens.len(),
            expired_conversations: before_conversations - inner.conversations.len(),
        }
    }

    /// Evicts least-recently-accessed sessions until at most `max` remain
    ///
    /// This is eviction, not expiry: sessions removed here may still be
    /// within their TTL. Returns the number evicted.
    pub fn enforce_capacity(&self, max: usize) -> usize {
        let mut inner = self.inner.lock().unwrap();
        if inner.sessions.len() <= max {
            return 0;
        }

        let mut by_access: Vec<(String, DateTime<Utc>)> = inner
            .sessions
            .iter()
            .map(|(t, s)| (t.clone(), s.last_accessed))
            .collect();
        by_access.sort_by_key(|(_, accessed)| *accessed);

        let to_remove = inner.sessions.len() - max;
        for (token, _) in by_access.into_iter().take(to_remove) {
            inner.sessions.remove(&token);
            inner.conversations.remove(&token);
            tracing::warn!("Evicted session due to capacity limit: {}", token);
        }
        to_remove
    }

    /// Shrinks a session's content to its first `keep_bytes` bytes
    ///
    /// Called after a successful documentation run: future chat turns only
    /// need a reduced slice of the repository content.
    pub fn shrink_content(&self, token: &str, keep_bytes: usize) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(session) = inner.sessions.get_mut(token) {
            let before = session.content.len();
            truncate_at_boundary(&mut session.content, keep_bytes);
            session.content.shrink_to_fit();
            tracing::info!(
                "Reduced session content from {}B to {}B: {}",
                before,
                session.content.len(),
                token
            );
        }
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.inner.lock().unwrap().sessions.len()
    }

    /// Aggregate memory statistics for observability
    pub fn memory_usage(&self) -> MemoryUsage {
        let inner = self.inner.lock().unwrap();
        let content_bytes = inner
            .sessions
            .values()
            .map(|s| s.content.len() + s.summary.len() + s.tree.len())
            .sum();
        let message_bytes = inner
            .conversations
            .values()
            .flat_map(|c| c.messages.iter())
            .map(|m| m.role.len() + m.content.len())
            .sum();
        MemoryUsage {
            sessions: inner.sessions.len(),
            conversations: inner.conversations.len(),
            content_bytes,
            message_bytes,
        }
    }

    /// Creates the conversation for `token` if absent, seeding it with the
    /// given messages; touches it otherwise. Returns true when created.
    pub fn ensure_conversation(&self, token: &str, seed: Vec<ChatMessage>) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.conversations.get_mut(token) {
            Some(conversation) => {
                conversation.last_accessed = Utc::now();
                conversation.message_count += 1;
                false
            }
            None => {
                let now = Utc::now();
                inner.conversations.insert(
                    token.to_string(),
                    Conversation {
                        messages: seed,
                        created_at: now,
                        last_accessed: now,
                        message_count: 0,
                    },
                );
                true
            }
        }
    }

    /// Message counter of the conversation, if it exists
    pub fn conversation_message_count(&self, token: &str) -> Option<u64> {
        self.inner
            .lock()
            .unwrap()
            .conversations
            .get(token)
            .map(|c| c.message_count)
    }

    /// Appends a message, then window-caps the retained history to the
    /// oldest (system) message plus the most recent `history_window`
    pub fn append_message(&self, token: &str, message: ChatMessage) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(conversation) = inner.conversations.get_mut(token) {
            conversation.messages.push(message);
            let cap = self.history_window + 1;
            if conversation.messages.len() > cap {
                let tail_start = conversation.messages.len() - self.history_window;
                let mut windowed = vec![conversation.messages[0].clone()];
                windowed.extend_from_slice(&conversation.messages[tail_start..]);
                conversation.messages = windowed;
            }
        }
    }

    /// Snapshot of the conversation's retained messages
    pub fn conversation_messages(&self, token: &str) -> Option<Vec<ChatMessage>> {
        self.inner
            .lock()
            .unwrap()
            .conversations
            .get(token)
            .map(|c| c.messages.clone())
    }

    fn is_expired(&self, created_at: DateTime<Utc>) -> bool {
        Utc::now().signed_duration_since(created_at) > self.ttl
    }

    /// Shifts a session's (and its conversation's) timestamps into the
    /// past, simulating age without sleeping
    #[cfg(test)]
    pub fn backdate(&self, token: &str, by: Duration) {
        let delta = ChronoDuration::from_std(by).unwrap();
        let mut inner = self.inner.lock().unwrap();
        if let Some(session) = inner.sessions.get_mut(token) {
            session.created_at -= delta;
            session.last_accessed -= delta;
        }
        if let Some(conversation) = inner.conversations.get_mut(token) {
            conversation.created_at -= delta;
            conversation.last_accessed -= delta;
        }
    }

    /// Shifts only the conversation's timestamps into the past, leaving
    /// the session untouched
    #[cfg(test)]
    pub fn backdate_conversation(&self, token: &str, by: Duration) {
        let delta = ChronoDuration::from_std(by).unwrap();
        let mut inner = self.inner.lock().unwrap();
        if let Some(conversation) = inner.conversations.get_mut(token) {
            conversation.created_at -= delta;
            conversation.last_accessed -= delta;
        }
    }
}

/// Truncates a string to at most `max` bytes without splitting a char
fn truncate_at_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut cut = max;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}
