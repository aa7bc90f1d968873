//! services/api/src/adapters/memory_store.rs
//!
//! An in-process implementation of the `SessionStore` port. Browser sessions only
//! live as long as the process; nothing is written to disk.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use restoration_core::domain::BrowserSession;
use restoration_core::ports::{PortResult, SessionStore};
use std::collections::HashMap;
use tokio::sync::RwLock;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, BrowserSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

//=========================================================================================
// `SessionStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> PortResult<Option<BrowserSession>> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn save(&self, session: BrowserSession) -> PortResult<()> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session);
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> PortResult<()> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }

    async fn purge_idle(&self, cutoff: DateTime<Utc>) -> PortResult<usize> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.last_accessed_at >= cutoff);
        Ok(before - sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let store = InMemorySessionStore::new();
        let mut session = BrowserSession::new("abc");
        session.advanced_mode = true;
        store.save(session).await.unwrap();

        let loaded = store.load("abc").await.unwrap().unwrap();
        assert!(loaded.advanced_mode);
        assert!(store.load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_session() {
        let store = InMemorySessionStore::new();
        store.save(BrowserSession::new("abc")).await.unwrap();
        store.delete("abc").await.unwrap();

        assert!(store.load("abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_idle_keeps_recent_sessions() {
        let store = InMemorySessionStore::new();
        let mut stale = BrowserSession::new("stale");
        stale.last_accessed_at = Utc::now() - Duration::hours(5);
        store.save(stale).await.unwrap();
        store.save(BrowserSession::new("fresh")).await.unwrap();

        let removed = store.purge_idle(Utc::now() - Duration::hours(1)).await.unwrap();

        assert_eq!(removed, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.load("fresh").await.unwrap().is_some());
    }
}
