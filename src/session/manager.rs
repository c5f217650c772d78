//! Session manager
//!
//! This module provides the SessionManager that stamps expiry times and
//! turns absent sessions into errors on top of a [`SessionStore`].

use super::{SessionRecord, SessionStore};
use crate::anonymization::config::DetectionMode;
use crate::anonymization::grouping::EntitySnapshot;
use crate::domain::{PseudonymError, Result, SessionId};
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Session manager
///
/// Every write pushes the expiry `ttl` into the future, so a session
/// expires `ttl` after its last change.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
}

impl SessionManager {
    /// Create a new SessionManager with a storage backend
    ///
    /// # Arguments
    ///
    /// * `store` - Session storage implementation
    /// * `ttl_minutes` - Session lifetime after the last write
    pub fn new(store: Arc<dyn SessionStore>, ttl_minutes: u64) -> Self {
        Self {
            store,
            ttl: Duration::minutes(ttl_minutes as i64),
        }
    }

    /// Store a freshly analyzed document under a new session id
    pub async fn create(
        &self,
        snapshot: EntitySnapshot,
        mode: DetectionMode,
        source: Option<String>,
    ) -> Result<SessionRecord> {
        let now = Utc::now();
        let record = SessionRecord {
            id: SessionId::generate(),
            source,
            mode,
            snapshot,
            created_at: now,
            updated_at: now,
            expires_at: now + self.ttl,
        };

        self.store.write(&record).await?;
        tracing::info!(
            session_id = %record.id,
            entities = record.snapshot.entities.len(),
            expires_at = %record.expires_at,
            "Session created"
        );
        Ok(record)
    }

    /// Load a live session
    ///
    /// # Errors
    ///
    /// Returns [`PseudonymError::NotFound`] when the session is absent or expired.
    pub async fn load(&self, id: &SessionId) -> Result<SessionRecord> {
        self.store
            .read(id)
            .await?
            .ok_or_else(|| PseudonymError::NotFound(format!("session {id} (absent or expired)")))
    }

    /// Replace the snapshot of an existing session
    pub async fn update(&self, id: &SessionId, snapshot: EntitySnapshot) -> Result<SessionRecord> {
        let mut record = self.load(id).await?;
        let now = Utc::now();
        record.snapshot = snapshot;
        record.updated_at = now;
        record.expires_at = now + self.ttl;

        self.store.write(&record).await?;
        tracing::debug!(session_id = %id, "Session updated");
        Ok(record)
    }

    /// Remove a session once its document has been rewritten
    pub async fn complete(&self, id: &SessionId) -> Result<()> {
        if self.store.delete(id).await? {
            tracing::info!(session_id = %id, "Session closed");
        }
        Ok(())
    }

    pub async fn purge_expired(&self) -> Result<usize> {
        self.store.purge_expired().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::InMemorySessionStore;

    fn snapshot(document: &str) -> EntitySnapshot {
        EntitySnapshot {
            document: document.to_string(),
            entities: Vec::new(),
            groups: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_create_load_complete() {
        let manager = SessionManager::new(Arc::new(InMemorySessionStore::new()), 30);

        let record = manager
            .create(snapshot("Bonjour"), DetectionMode::Standard, Some("a.txt".into()))
            .await
            .unwrap();
        assert!(record.expires_at > record.created_at);

        let loaded = manager.load(&record.id).await.unwrap();
        assert_eq!(loaded.snapshot.document, "Bonjour");

        manager.complete(&record.id).await.unwrap();
        assert!(matches!(
            manager.load(&record.id).await,
            Err(PseudonymError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_replaces_snapshot() {
        let manager = SessionManager::new(Arc::new(InMemorySessionStore::new()), 30);
        let record = manager
            .create(snapshot("v1"), DetectionMode::Patterns, None)
            .await
            .unwrap();

        let updated = manager.update(&record.id, snapshot("v2")).await.unwrap();
        assert!(updated.updated_at >= record.updated_at);
        assert_eq!(manager.load(&record.id).await.unwrap().snapshot.document, "v2");
    }

    #[tokio::test]
    async fn test_zero_ttl_expires_immediately() {
        let manager = SessionManager::new(Arc::new(InMemorySessionStore::new()), 0);
        let record = manager
            .create(snapshot("x"), DetectionMode::Patterns, None)
            .await
            .unwrap();

        assert!(manager.load(&record.id).await.is_err());
        assert_eq!(manager.purge_expired().await.unwrap(), 1);
    }
}
