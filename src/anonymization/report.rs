//! Analysis reporting
//!
//! This module provides formatted reports for an analysis, showing detection
//! statistics, entity samples and detector warnings. Entity texts are
//! truncated in samples so a report never reproduces long PII values.

use crate::anonymization::engine::Analysis;
use crate::anonymization::models::{DetectionSource, EntityType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum number of entity samples kept in a report
const MAX_SAMPLES: usize = 20;

/// Characters of original text kept in a sample
const SAMPLE_TEXT_CHARS: usize = 3;

/// Report summarizing one analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Session holding the analysis, when stored
    pub session_id: Option<String>,

    pub mode: String,

    /// Detectors that ran, in execution order
    pub detectors: Vec<String>,

    /// Raw candidates before aggregation
    pub total_candidates: usize,

    pub total_entities: usize,

    /// Sum of occurrences over all entities
    pub total_occurrences: usize,

    pub entities_by_type: BTreeMap<EntityType, usize>,

    pub entities_by_source: BTreeMap<DetectionSource, usize>,

    /// Tokens shared by more than one entity
    pub shared_tokens: usize,

    /// Sample entities (original text truncated)
    pub samples: Vec<EntitySample>,

    /// Detector failures and validation warnings
    pub warnings: Vec<String>,

    pub processing_time_ms: u64,
}

/// One entity as shown in a report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySample {
    pub entity_id: String,
    pub entity_type: EntityType,
    /// First characters of the original, followed by `...`
    pub original: String,
    pub replacement: String,
    pub occurrences: usize,
    pub confidence: f32,
    pub source: DetectionSource,
}

impl AnalysisReport {
    /// Build the report of an analysis
    pub fn from_analysis(analysis: &Analysis) -> Self {
        let manager = &analysis.manager;
        let stats = manager.statistics();

        let mut warnings: Vec<String> = analysis
            .diagnostics
            .iter()
            .map(|d| format!("Detector '{}' failed: {}", d.detector, d.message))
            .collect();
        if stats.invalid_entities > 0 {
            warnings.push(format!(
                "{} entities failed checksum validation",
                stats.invalid_entities
            ));
        }

        let samples = manager
            .entities()
            .iter()
            .take(MAX_SAMPLES)
            .map(|entity| EntitySample {
                entity_id: entity.id.to_string(),
                entity_type: entity.entity_type,
                original: truncate(&entity.text),
                replacement: entity.replacement.clone(),
                occurrences: entity.occurrences,
                confidence: entity.confidence,
                source: entity.source,
            })
            .collect();

        Self {
            session_id: None,
            mode: analysis.mode.to_string(),
            detectors: analysis.detectors.clone(),
            total_candidates: analysis.candidates,
            total_entities: stats.total_entities,
            total_occurrences: stats.total_occurrences,
            entities_by_type: stats.by_type,
            entities_by_source: stats.by_source,
            shared_tokens: stats.shared_tokens,
            samples,
            warnings,
            processing_time_ms: analysis.processing_time_ms,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Format report for console output
    pub fn format_console(&self) -> String {
        let mut output = String::new();

        output.push('\n');
        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output.push_str("                  PSEUDONYMIZATION ANALYSIS                    \n");
        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output.push('\n');

        output.push_str("📊 SUMMARY\n");
        output.push_str("───────────────────────────────────────────────────────────────\n");
        if let Some(ref session_id) = self.session_id {
            output.push_str(&format!("  Session:              {session_id}\n"));
        }
        output.push_str(&format!("  Detection Mode:       {}\n", self.mode));
        output.push_str(&format!(
            "  Detectors:            {}\n",
            self.detectors.join(", ")
        ));
        output.push_str(&format!(
            "  Candidates:           {}\n",
            self.total_candidates
        ));
        output.push_str(&format!("  Entities:             {}\n", self.total_entities));
        output.push_str(&format!(
            "  Occurrences:          {}\n",
            self.total_occurrences
        ));
        output.push_str(&format!("  Shared Tokens:        {}\n", self.shared_tokens));
        output.push_str(&format!(
            "  Processing Time:      {} ms\n",
            self.processing_time_ms
        ));
        output.push('\n');

        if !self.entities_by_type.is_empty() {
            output.push_str("🔍 ENTITIES BY TYPE\n");
            output.push_str("───────────────────────────────────────────────────────────────\n");

            let mut types: Vec<_> = self.entities_by_type.iter().collect();
            types.sort_by(|a, b| b.1.cmp(a.1));

            for (entity_type, count) in types {
                output.push_str(&format!("  {:30} {:>5}\n", entity_type.label(), count));
            }
            output.push('\n');
        }

        if !self.samples.is_empty() {
            output.push_str("📝 ENTITIES\n");
            output.push_str("───────────────────────────────────────────────────────────────\n");

            for sample in &self.samples {
                output.push_str(&format!(
                    "  {:<18} {:<24} {:>3}x  {:>5.2}  {}\n",
                    sample.entity_type.label(),
                    sample.replacement,
                    sample.occurrences,
                    sample.confidence,
                    sample.original
                ));
            }
            output.push('\n');
        }

        if !self.warnings.is_empty() {
            output.push_str("⚠️  WARNINGS\n");
            output.push_str("───────────────────────────────────────────────────────────────\n");
            for warning in &self.warnings {
                output.push_str(&format!("  • {warning}\n"));
            }
            output.push('\n');
        }

        output.push_str("═══════════════════════════════════════════════════════════════\n");
        output.push('\n');

        output
    }

    /// Format report as JSON
    pub fn format_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write report to file
    pub fn write_to_file(&self, path: &std::path::Path) -> std::io::Result<()> {
        let json = self.format_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

/// Keep the first characters of a value
fn truncate(text: &str) -> String {
    if text.chars().count() <= SAMPLE_TEXT_CHARS {
        return "*".repeat(text.chars().count());
    }
    let head: String = text.chars().take(SAMPLE_TEXT_CHARS).collect();
    format!("{head}...")
}
