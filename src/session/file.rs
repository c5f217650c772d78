//! Session store backed by one JSON file per session

use super::{SessionRecord, SessionStore};
use crate::domain::{PseudonymError, Result, SessionId};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Stores each session as `<directory>/<session id>.json`.
///
/// Records are written to a temporary file and renamed into place, so a
/// reader never sees a partially written session.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    directory: PathBuf,
}

impl FileSessionStore {
    /// Create the store, creating `directory` if needed
    pub async fn new(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory).await.map_err(|e| {
            PseudonymError::Session(format!(
                "Failed to create session directory {}: {e}",
                directory.display()
            ))
        })?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, id: &SessionId) -> PathBuf {
        self.directory.join(format!("{}.json", id.as_str()))
    }

    async fn load(&self, path: &Path) -> Result<Option<SessionRecord>> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record = serde_json::from_str(&content).map_err(|e| {
            PseudonymError::Session(format!("Corrupt session file {}: {e}", path.display()))
        })?;
        Ok(Some(record))
    }

    async fn remove(path: &Path) -> Result<bool> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn write(&self, record: &SessionRecord) -> Result<()> {
        let path = self.path_for(&record.id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(record)?;

        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &path).await?;

        tracing::debug!(session_id = %record.id, "Session written");
        Ok(())
    }

    async fn read(&self, id: &SessionId) -> Result<Option<SessionRecord>> {
        let record = self.load(&self.path_for(id)).await?;
        Ok(record.filter(|record| !record.is_expired()))
    }

    async fn delete(&self, id: &SessionId) -> Result<bool> {
        let removed = Self::remove(&self.path_for(id)).await?;
        if removed {
            tracing::debug!(session_id = %id, "Session deleted");
        }
        Ok(removed)
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut purged = 0;
        let mut entries = fs::read_dir(&self.directory).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.load(&path).await {
                Ok(Some(record)) if record.is_expired_at(now) => {
                    if Self::remove(&path).await? {
                        purged += 1;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable session file");
                }
            }
        }

        if purged > 0 {
            tracing::info!(purged, "Expired sessions purged");
        }
        Ok(purged)
    }
}
