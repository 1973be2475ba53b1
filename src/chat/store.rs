//! Conversation history storage

use std::time::Duration;

use mini_moka::sync::Cache;

use super::Message;

/// Default idle time before a user's history is evicted
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Default number of users whose history is kept at once
pub const DEFAULT_MAX_SESSIONS: u64 = 10_000;

/// Per-user conversation history storage
///
/// Implementations are not required to make `append` and `replace` atomic
/// with respect to each other; callers serialize writes per user.
pub trait SessionStore: Send + Sync {
    /// Current history for a user (empty if none)
    fn get(&self, user_id: &str) -> Vec<Message>;

    /// Append a message, creating the history if absent
    fn append(&self, user_id: &str, message: Message);

    /// Replace a user's history wholesale
    fn replace(&self, user_id: &str, messages: Vec<Message>);
}

/// In-memory session store with idle expiry and a cap on tracked users
#[derive(Clone)]
pub struct MemorySessionStore {
    sessions: Cache<String, Vec<Message>>,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL, DEFAULT_MAX_SESSIONS)
    }
}

impl MemorySessionStore {
    /// Create a store that forgets a user after `ttl` without activity and
    /// holds at most `max_sessions` users
    #[must_use]
    pub fn new(ttl: Duration, max_sessions: u64) -> Self {
        Self {
            sessions: Cache::builder()
                .max_capacity(max_sessions)
                .time_to_idle(ttl)
                .build(),
        }
    }

    /// Drop a user's history
    pub fn clear(&self, user_id: &str) {
        self.sessions.invalidate(&user_id.to_string());
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, user_id: &str) -> Vec<Message> {
        self.sessions.get(&user_id.to_string()).unwrap_or_default()
    }

    fn append(&self, user_id: &str, message: Message) {
        let key = user_id.to_string();
        let mut history = self.sessions.get(&key).unwrap_or_default();
        history.push(message);
        self.sessions.insert(key, history);
    }

    fn replace(&self, user_id: &str, messages: Vec<Message>) {
        self.sessions.insert(user_id.to_string(), messages);
    }
}
