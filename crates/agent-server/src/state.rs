//! Application State

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use agent_core::{ConversationEngine, SessionId};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Conversation engine (model service, tools, sessions)
    pub engine: Arc<ConversationEngine>,

    /// Serializes requests touching the same session
    pub locks: Arc<SessionLocks>,
}

impl AppState {
    pub fn new(engine: ConversationEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            locks: Arc::new(SessionLocks::default()),
        }
    }
}

/// One async mutex per session id.
///
/// The engine does not guard a session across a turn, so the server holds
/// this lock for the whole `send` or `reset`. Entries live only while a
/// request holds or waits on them.
#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<SessionId, Arc<AsyncMutex<()>>>>,
}

impl SessionLocks {
    pub async fn acquire(&self, id: &SessionId) -> SessionGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(id.clone()).or_default().clone()
        };
        SessionGuard {
            guard: Some(lock.lock_owned().await),
            id: id.clone(),
            locks: self,
        }
    }

    /// Number of sessions with a live lock entry
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, id: &SessionId) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // The map's own reference is the last one: nobody holds or awaits it.
        if locks.get(id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(id);
        }
    }
}

/// Exclusive hold on one session; drops the map entry when the last user leaves
pub struct SessionGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    id: SessionId,
    locks: &'a SessionLocks,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_session_is_serialized() {
        let locks = SessionLocks::default();
        let id = SessionId::new("u1");

        let guard = locks.acquire(&id).await;
        let blocked = tokio::time::timeout(Duration::from_millis(20), locks.acquire(&id)).await;
        assert!(blocked.is_err());

        let other = tokio::time::timeout(Duration::from_millis(20), locks.acquire(&SessionId::new("u2"))).await;
        assert!(other.is_ok());

        drop(guard);
        assert!(tokio::time::timeout(Duration::from_millis(20), locks.acquire(&id)).await.is_ok());
    }

    #[tokio::test]
    async fn test_idle_entries_are_released() {
        let locks = SessionLocks::default();
        for n in 0..50 {
            let _guard = locks.acquire(&SessionId::new(format!("user-{n}"))).await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_entry_kept_while_waiter_queued() {
        let locks = Arc::new(SessionLocks::default());
        let id = SessionId::new("u1");

        let guard = locks.acquire(&id).await;
        let waiter = {
            let locks = locks.clone();
            let id = id.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&id).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(guard);
        assert_eq!(locks.len(), 1);

        waiter.await.unwrap();
        assert!(locks.is_empty());
    }
}
