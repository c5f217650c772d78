//! CLI command implementations
//!
//! This module contains all CLI command implementations and the helpers
//! they share.

pub mod analyze;
pub mod anonymize;
pub mod init;
pub mod run;
pub mod validate;

use crate::config::{SessionBackend, SessionConfig};
use crate::session::{FileSessionStore, InMemorySessionStore, SessionManager, SessionStore};
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;

/// Read a UTF-8 input document
pub(crate) fn read_input(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input document {}", path.display()))
}

/// Write an output file, creating its parent directory
pub(crate) fn write_output(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write output file {}", path.display()))
}

/// Build the session manager for the configured backend
pub(crate) async fn session_manager(config: &SessionConfig) -> anyhow::Result<SessionManager> {
    let store: Arc<dyn SessionStore> = match config.backend {
        SessionBackend::File => Arc::new(
            FileSessionStore::new(&config.directory)
                .await
                .context("Failed to open session store")?,
        ),
        SessionBackend::Memory => {
            tracing::warn!("In-memory sessions do not outlive this process");
            Arc::new(InMemorySessionStore::new())
        }
    };

    let manager = SessionManager::new(store, config.ttl_minutes);
    let purged = manager
        .purge_expired()
        .await
        .context("Failed to purge expired sessions")?;
    if purged > 0 {
        tracing::debug!(purged, "Purged expired sessions");
    }
    Ok(manager)
}
