//! Session Management
//!
//! Per-session continuation reference and conversation history.
//!
//! The store performs no locking across a whole turn: two concurrent
//! `send` calls on the same session race on its read-modify-write.
//! Callers that share a session must serialize access to it themselves.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Session key used when the caller does not supply one
pub const DEFAULT_SESSION: &str = "default";

/// Opaque, caller-supplied session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self(DEFAULT_SESSION.into())
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conversation state for one session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier
    pub id: SessionId,

    /// Continuation reference of the last committed turn
    pub continuation: Option<String>,

    /// Ordered user/assistant history
    pub history: Vec<Message>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            continuation: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Message count
    pub fn message_count(&self) -> usize {
        self.history.len()
    }
}

/// Session storage used by the conversation engine
pub trait SessionStore: Send + Sync {
    /// Fetch a session, creating an empty one if absent
    fn get_or_create(&self, id: &SessionId) -> Session;

    /// Fetch a session without creating it
    fn get(&self, id: &SessionId) -> Option<Session>;

    /// Append a user entry
    fn append_user(&self, id: &SessionId, text: &str);

    /// Append an assistant entry
    fn append_assistant(&self, id: &SessionId, text: &str);

    /// Record the continuation reference of the latest turn
    fn set_continuation(&self, id: &SessionId, continuation: &str);

    /// Remove the session entirely
    fn reset(&self, id: &SessionId);

    /// Ordered history; empty for unknown sessions
    fn history(&self, id: &SessionId) -> Vec<Message>;
}

/// In-memory session store. Sessions live until reset; there is no eviction.
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn update(&self, id: &SessionId, f: impl FnOnce(&mut Session)) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let session = sessions
            .entry(id.clone())
            .or_insert_with(|| Session::new(id.clone()));
        f(session);
        session.touch();
    }
}

impl SessionStore for MemorySessionStore {
    fn get_or_create(&self, id: &SessionId) -> Session {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions
            .entry(id.clone())
            .or_insert_with(|| {
                tracing::debug!(session = %id, "Creating session");
                Session::new(id.clone())
            })
            .clone()
    }

    fn get(&self, id: &SessionId) -> Option<Session> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.get(id).cloned()
    }

    fn append_user(&self, id: &SessionId, text: &str) {
        self.update(id, |s| s.history.push(Message::user(text)));
    }

    fn append_assistant(&self, id: &SessionId, text: &str) {
        self.update(id, |s| s.history.push(Message::assistant(text)));
    }

    fn set_continuation(&self, id: &SessionId, continuation: &str) {
        self.update(id, |s| s.continuation = Some(continuation.to_owned()));
    }

    fn reset(&self, id: &SessionId) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if sessions.remove(id).is_some() {
            tracing::debug!(session = %id, "Session reset");
        }
    }

    fn history(&self, id: &SessionId) -> Vec<Message> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions
            .get(id)
            .map(|s| s.history.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    #[test]
    fn test_unknown_session_is_empty() {
        let store = MemorySessionStore::new();
        let id = SessionId::new("nobody");

        assert!(store.history(&id).is_empty());
        assert!(store.get(&id).is_none());

        let session = store.get_or_create(&id);
        assert!(session.continuation.is_none());
        assert_eq!(session.message_count(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_default_session_id() {
        assert_eq!(SessionId::default().as_str(), "default");
    }

    #[test]
    fn test_append_keeps_order() {
        let store = MemorySessionStore::new();
        let id = SessionId::default();

        store.append_user(&id, "Hi");
        store.append_assistant(&id, "Hello!");
        store.append_user(&id, "Weather?");

        let history = store.history(&id);
        let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(history[2].content, "Weather?");
    }

    #[test]
    fn test_reset_then_create_is_fresh() {
        let store = MemorySessionStore::new();
        let id = SessionId::new("u1");

        store.append_user(&id, "Hi");
        store.set_continuation(&id, "resp_1");
        assert_eq!(store.get_or_create(&id).continuation.as_deref(), Some("resp_1"));

        store.reset(&id);
        let session = store.get_or_create(&id);
        assert!(session.continuation.is_none());
        assert!(session.history.is_empty());
    }

    #[test]
    fn test_reset_unknown_is_noop() {
        let store = MemorySessionStore::new();
        store.reset(&SessionId::new("ghost"));
        assert!(store.is_empty());
    }
}
