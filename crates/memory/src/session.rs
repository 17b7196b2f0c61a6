//! Session store: one conversation log per caller-supplied session key.
//!
//! Each log sits behind its own `tokio::sync::Mutex` so requests on
//! different sessions never contend, and a request holds its session's
//! lock only while reading the window or appending the finished pair.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::conversation::ConversationLog;

/// Session key used when the caller does not supply one.
pub const DEFAULT_SESSION: &str = "default";

/// Shared handle to one session's log.
pub type SessionHandle = Arc<Mutex<ConversationLog>>;

struct SessionEntry {
    log: SessionHandle,
    last_active: DateTime<Utc>,
}

/// All live sessions, bounded by `max_sessions` with LRU eviction.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    max_sessions: usize,
    max_log_turns: usize,
}

impl SessionStore {
    pub fn new(max_sessions: usize, max_log_turns: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
            max_log_turns,
        }
    }

    /// Get the log for `session_id`, creating it (and evicting the least
    /// recently used session when full) if needed.
    pub async fn get_or_create(&self, session_id: &str) -> SessionHandle {
        let mut sessions = self.sessions.write().await;
        let now = Utc::now();

        if let Some(entry) = sessions.get_mut(session_id) {
            entry.last_active = now;
            return entry.log.clone();
        }

        if sessions.len() >= self.max_sessions {
            if let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, e)| e.last_active)
                .map(|(k, _)| k.clone())
            {
                debug!(session = %oldest, "Evicting least recently used session");
                sessions.remove(&oldest);
            }
        }

        let log = Arc::new(Mutex::new(ConversationLog::new(self.max_log_turns)));
        sessions.insert(
            session_id.to_string(),
            SessionEntry {
                log: log.clone(),
                last_active: now,
            },
        );
        log
    }

    /// Look up an existing session without creating one.
    pub async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|e| e.log.clone())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recallchat_core::message::Turn;

    #[tokio::test]
    async fn same_key_returns_same_log() {
        let store = SessionStore::new(10, 100);
        let a = store.get_or_create("alice").await;
        a.lock()
            .await
            .append_exchange(Turn::user("hi"), Turn::assistant("hello"));

        let again = store.get_or_create("alice").await;
        assert_eq!(again.lock().await.len(), 2);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = SessionStore::new(10, 100);
        store
            .get_or_create("alice")
            .await
            .lock()
            .await
            .append(Turn::user("secret"));

        let bob = store.get_or_create("bob").await;
        assert!(bob.lock().await.is_empty());
    }

    #[tokio::test]
    async fn least_recently_used_session_is_evicted() {
        let store = SessionStore::new(2, 100);
        store.get_or_create("a").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.get_or_create("b").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.get_or_create("a").await; // refresh a
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.get_or_create("c").await;

        assert_eq!(store.len().await, 2);
        assert!(store.get("a").await.is_some());
        assert!(store.get("b").await.is_none());
        assert!(store.get("c").await.is_some());
    }

    #[tokio::test]
    async fn logs_use_configured_cap() {
        let store = SessionStore::new(1, 2);
        let log = store.get_or_create(DEFAULT_SESSION).await;
        let mut log = log.lock().await;
        log.append_exchange(Turn::user("q0"), Turn::assistant("a0"));
        log.append_exchange(Turn::user("q1"), Turn::assistant("a1"));
        assert_eq!(log.len(), 2);
    }
}
