//! Analyze command implementation
//!
//! Detects entities in a document, stores them in a review session and
//! prints the analysis report.

use super::{read_input, session_manager, write_output};
use crate::anonymization::config::DetectionMode;
use crate::anonymization::models::{CanonicalEntity, EntityGroup, TokenGroup};
use crate::anonymization::{AnalysisReport, AnonymizationEngine};
use crate::config::PseudonymConfig;
use crate::log_session_event;
use anyhow::Context;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

/// Arguments for the analyze command
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Document to analyze (UTF-8 text)
    pub input: PathBuf,

    /// Detection mode (patterns, standard, deep); defaults to the configured mode
    #[arg(short, long)]
    pub mode: Option<DetectionMode>,

    /// Write the detected entities and token groups to this JSON file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the report as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Entities file written by `--output`, the input of a reviewer's selections
#[derive(Debug, Serialize)]
struct EntitiesExport<'a> {
    session_id: String,
    entities: &'a [CanonicalEntity],
    groups: &'a [EntityGroup],
    token_groups: &'a [TokenGroup],
}

impl AnalyzeArgs {
    /// Execute the analyze command
    pub async fn execute(&self, config: &PseudonymConfig) -> anyhow::Result<i32> {
        tracing::info!(input = %self.input.display(), "Analyzing document");

        let text = read_input(&self.input)?;
        let engine = AnonymizationEngine::new(config.anonymization.clone())?;
        let analysis = engine.analyze(&text, self.mode).await?;

        let sessions = session_manager(&config.session).await?;
        let record = sessions
            .create(
                analysis.manager.snapshot(),
                analysis.mode,
                Some(self.input.display().to_string()),
            )
            .await
            .context("Failed to store session")?;
        log_session_event!(&record.id, "created");

        if let Some(ref output) = self.output {
            let export = EntitiesExport {
                session_id: record.id.to_string(),
                entities: analysis.manager.entities(),
                groups: analysis.manager.groups(),
                token_groups: analysis.manager.token_groups(),
            };
            let json =
                serde_json::to_string_pretty(&export).context("Failed to serialize entities")?;
            write_output(output, &json)?;
            tracing::info!(output = %output.display(), "Entities written");
        }

        let report = AnalysisReport::from_analysis(&analysis).with_session(record.id.to_string());
        if self.json {
            println!("{}", report.format_json()?);
        } else {
            print!("{}", report.format_console());
            println!("Session: {}", record.id);
            println!("Expires: {}", record.expires_at.to_rfc3339());
        }

        Ok(crate::cli::EXIT_SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionBackend;
    use crate::session::{FileSessionStore, SessionStore};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_analyze_stores_session_and_entities() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("lettre.txt");
        std::fs::write(&input, "Écrire à marie.curie@example.fr avant lundi.").unwrap();

        let mut config = PseudonymConfig::default();
        config.anonymization.audit.enabled = false;
        config.session.backend = SessionBackend::File;
        config.session.directory = dir.path().join("sessions");

        let args = AnalyzeArgs {
            input,
            mode: Some(DetectionMode::Patterns),
            output: Some(dir.path().join("out/entities.json")),
            json: true,
        };
        assert_eq!(args.execute(&config).await.unwrap(), 0);

        let exported: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("out/entities.json")).unwrap(),
        )
        .unwrap();
        let session_id = exported["session_id"].as_str().unwrap();
        assert_eq!(exported["entities"][0]["type"], "EMAIL");

        let store = FileSessionStore::new(dir.path().join("sessions")).await.unwrap();
        let record = store
            .read(&session_id.parse().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.mode, DetectionMode::Patterns);
        assert_eq!(record.snapshot.entities.len(), 1);
    }

    #[tokio::test]
    async fn test_analyze_missing_input() {
        let args = AnalyzeArgs {
            input: PathBuf::from("/nonexistent/input.txt"),
            mode: None,
            output: None,
            json: false,
        };
        assert!(args.execute(&PseudonymConfig::default()).await.is_err());
    }
}
