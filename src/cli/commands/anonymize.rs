//! Anonymize command implementation
//!
//! Loads a review session, applies the reviewer's selections, rewrites the
//! document and closes the session.

use super::{session_manager, write_output};
use crate::anonymization::models::Selection;
use crate::anonymization::AnonymizationEngine;
use crate::config::PseudonymConfig;
use crate::document::PlainTextDocument;
use crate::domain::{PseudonymError, SessionId};
use crate::log_session_event;
use anyhow::Context;
use clap::Args;
use std::path::{Path, PathBuf};

/// Arguments for the anonymize command
#[derive(Args, Debug)]
pub struct AnonymizeArgs {
    /// Session id printed by `analyze`
    #[arg(short, long)]
    pub session: String,

    /// JSON array of `{entity_id, selected, replacement?}` decisions
    #[arg(long)]
    pub selections: Option<PathBuf>,

    /// Where to write the rewritten document
    #[arg(short, long)]
    pub output: PathBuf,
}

fn read_selections(path: &Path) -> anyhow::Result<Vec<Selection>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read selections {}", path.display()))?;
    let selections = serde_json::from_str(&content)
        .map_err(PseudonymError::from)
        .with_context(|| format!("Invalid selections file {}", path.display()))?;
    Ok(selections)
}

impl AnonymizeArgs {
    /// Execute the anonymize command
    pub async fn execute(&self, config: &PseudonymConfig) -> anyhow::Result<i32> {
        let session_id = SessionId::new(self.session.as_str())
            .map_err(PseudonymError::Validation)
            .context("Invalid --session value")?;
        tracing::info!(session_id = %session_id, "Rewriting session document");

        let engine = AnonymizationEngine::new(config.anonymization.clone())?;
        let sessions = session_manager(&config.session).await?;
        let record = sessions.load(&session_id).await?;
        let mut manager = engine.restore(record.snapshot);

        if let Some(ref path) = self.selections {
            let selections = read_selections(path)?;
            let applied = manager.apply_selections(&selections)?;
            tracing::info!(applied, "Reviewer selections applied");
        }

        for issue in manager.validate_integrity() {
            tracing::warn!(issue = %issue, "Entity state inconsistency");
        }

        let mut document = PlainTextDocument::parse(manager.document());
        let rewrite = engine
            .rewrite_document(session_id.as_str(), &manager, &mut document)
            .context("Rewrite failed, no output written")?;

        write_output(&self.output, &document.to_text())?;
        sessions.complete(&session_id).await?;
        log_session_event!(&session_id, "completed");

        println!("✅ Document written: {}", self.output.display());
        println!(
            "   Blocks changed: {}/{}",
            rewrite.blocks_changed(),
            rewrite.blocks_total
        );
        println!("   Replacements:   {}", rewrite.total_replacements());
        for (token, count) in rewrite.counts_by_token() {
            println!("     {token:<28} {count:>5}");
        }

        Ok(crate::cli::EXIT_SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymization::config::DetectionMode;
    use crate::config::SessionBackend;
    use crate::session::{FileSessionStore, SessionManager};
    use std::sync::Arc;
    use tempfile::tempdir;

    const TEXT: &str = "Mail: marie.curie@example.fr\n\nCopie: pierre.curie@example.fr\n";

    async fn prepared(dir: &Path) -> (PseudonymConfig, SessionId, AnonymizationEngine) {
        let mut config = PseudonymConfig::default();
        config.anonymization.audit.enabled = false;
        config.anonymization.mode = DetectionMode::Patterns;
        config.session.backend = SessionBackend::File;
        config.session.directory = dir.join("sessions");

        let engine = AnonymizationEngine::new(config.anonymization.clone()).unwrap();
        let analysis = engine.analyze(TEXT, None).await.unwrap();
        let store = FileSessionStore::new(&config.session.directory).await.unwrap();
        let record = SessionManager::new(Arc::new(store), 30)
            .create(analysis.manager.snapshot(), analysis.mode, None)
            .await
            .unwrap();

        (config, record.id, engine)
    }

    #[tokio::test]
    async fn test_anonymize_applies_selections_and_closes_session() {
        let dir = tempdir().unwrap();
        let (config, session_id, engine) = prepared(dir.path()).await;

        let snapshot = SessionManager::new(
            Arc::new(FileSessionStore::new(&config.session.directory).await.unwrap()),
            30,
        )
        .load(&session_id)
        .await
        .unwrap()
        .snapshot;
        let manager = engine.restore(snapshot);
        let pierre = manager
            .entities()
            .iter()
            .find(|e| e.text.starts_with("pierre"))
            .unwrap();

        let selections = vec![Selection {
            entity_id: pierre.id.clone(),
            selected: false,
            replacement: None,
        }];
        let selections_path = dir.path().join("selections.json");
        std::fs::write(&selections_path, serde_json::to_string(&selections).unwrap()).unwrap();

        let args = AnonymizeArgs {
            session: session_id.to_string(),
            selections: Some(selections_path),
            output: dir.path().join("anonymized.txt"),
        };
        assert_eq!(args.execute(&config).await.unwrap(), 0);

        let output = std::fs::read_to_string(dir.path().join("anonymized.txt")).unwrap();
        assert!(!output.contains("marie.curie@example.fr"));
        assert!(output.contains("pierre.curie@example.fr"));
        assert!(output.ends_with('\n'));

        let err = args.execute(&config).await.unwrap_err();
        assert!(err
            .chain()
            .any(|cause| matches!(
                cause.downcast_ref::<PseudonymError>(),
                Some(PseudonymError::NotFound(_))
            )));
    }

    #[tokio::test]
    async fn test_unknown_selection_leaves_session_open() {
        let dir = tempdir().unwrap();
        let (config, session_id, _) = prepared(dir.path()).await;

        let selections_path = dir.path().join("selections.json");
        std::fs::write(
            &selections_path,
            r#"[{"entity_id": "ent_000000000000", "selected": false}]"#,
        )
        .unwrap();

        let args = AnonymizeArgs {
            session: session_id.to_string(),
            selections: Some(selections_path),
            output: dir.path().join("anonymized.txt"),
        };
        assert!(args.execute(&config).await.is_err());
        assert!(!dir.path().join("anonymized.txt").exists());
        assert!(dir
            .path()
            .join(format!("sessions/{session_id}.json"))
            .exists());
    }

    #[tokio::test]
    async fn test_invalid_session_id() {
        let args = AnonymizeArgs {
            session: "../etc/passwd".to_string(),
            selections: None,
            output: PathBuf::from("out.txt"),
        };
        assert!(args.execute(&PseudonymConfig::default()).await.is_err());
    }
}
