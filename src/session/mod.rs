//! Analysis sessions
//!
//! A session keeps the reviewer-editable state of one document between the
//! analysis and the rewrite. Sessions expire; an expired session reads as
//! absent and is removed by [`SessionStore::purge_expired`].

pub mod file;
pub mod manager;
pub mod memory;

pub use file::FileSessionStore;
pub use manager::SessionManager;
pub use memory::InMemorySessionStore;

use crate::anonymization::config::DetectionMode;
use crate::anonymization::grouping::EntitySnapshot;
use crate::domain::{Result, SessionId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored state of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,

    /// Name of the analyzed input, for display only
    pub source: Option<String>,

    pub mode: DetectionMode,

    pub snapshot: EntitySnapshot,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Storage backend for sessions
///
/// Writes replace the stored record wholesale; the last write wins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create or replace a session
    async fn write(&self, record: &SessionRecord) -> Result<()>;

    /// Load a session; `None` when absent or expired
    async fn read(&self, id: &SessionId) -> Result<Option<SessionRecord>>;

    /// Remove a session; returns whether it existed
    async fn delete(&self, id: &SessionId) -> Result<bool>;

    /// Remove every expired session; returns how many were removed
    async fn purge_expired(&self) -> Result<usize>;
}
