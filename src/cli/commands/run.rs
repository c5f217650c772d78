//! Run command implementation
//!
//! Analyzes a document and rewrites it immediately with every detected
//! entity, without a review session.

use super::{read_input, write_output};
use crate::anonymization::config::DetectionMode;
use crate::anonymization::AnonymizationEngine;
use crate::config::PseudonymConfig;
use crate::document::PlainTextDocument;
use crate::domain::SessionId;
use anyhow::Context;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Document to pseudonymize (UTF-8 text)
    pub input: PathBuf,

    /// Where to write the rewritten document
    #[arg(short, long)]
    pub output: PathBuf,

    /// Detection mode (patterns, standard, deep); defaults to the configured mode
    #[arg(short, long)]
    pub mode: Option<DetectionMode>,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(&self, config: &PseudonymConfig) -> anyhow::Result<i32> {
        tracing::info!(input = %self.input.display(), "Running one-shot pseudonymization");

        let text = read_input(&self.input)?;
        let engine = AnonymizationEngine::new(config.anonymization.clone())?;
        let analysis = engine.analyze(&text, self.mode).await?;

        for diagnostic in &analysis.diagnostics {
            println!(
                "⚠️  Detector '{}' failed: {}",
                diagnostic.detector, diagnostic.message
            );
        }

        // Audit lines still need an id to correlate the blocks of one run
        let run_id = SessionId::generate();
        let mut document = PlainTextDocument::parse(&text);
        let rewrite = engine
            .rewrite_document(run_id.as_str(), &analysis.manager, &mut document)
            .context("Rewrite failed, no output written")?;

        write_output(&self.output, &document.to_text())?;

        println!("✅ Document written: {}", self.output.display());
        println!("   Entities:       {}", analysis.manager.entities().len());
        println!("   Replacements:   {}", rewrite.total_replacements());

        Ok(crate::cli::EXIT_SUCCESS)
    }
}
