//! In-process session store

use super::{SessionRecord, SessionStore};
use crate::domain::{Result, SessionId};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Session store kept in memory, lost when the process exits
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, expired ones included
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn write(&self, record: &SessionRecord) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn read(&self, id: &SessionId) -> Result<Option<SessionRecord>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(id)
            .filter(|record| !record.is_expired())
            .cloned())
    }

    async fn delete(&self, id: &SessionId) -> Result<bool> {
        Ok(self.sessions.write().await.remove(id).is_some())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, record| !record.is_expired_at(now));
        Ok(before - sessions.len())
    }
}
