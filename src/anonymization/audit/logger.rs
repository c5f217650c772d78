//! Audit logger for rewrite operations

use crate::anonymization::config::AuditConfig;
use crate::anonymization::grouping::EntityManager;
use crate::anonymization::replacement::RewriteResult;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Audit log entry
#[derive(Debug, Serialize)]
struct AuditLogEntry {
    timestamp: String,
    session_id: String,
    total_rules: usize,
    active_rules: usize,
    replacements: usize,
    processing_time_ms: u64,
    rules: Vec<AuditRule>,
}

/// Audit line for one rule (with hashed original text)
#[derive(Debug, Serialize)]
struct AuditRule {
    entity_id: String,
    entity_type: String,
    /// SHA-256 hash of the original text (never log plaintext PII)
    original_hash: String,
    replacement: String,
    applied: usize,
    is_grouped: bool,
}

/// Audit logger for rewrite operations
pub struct AuditLogger {
    log_path: PathBuf,
    json_format: bool,
    enabled: bool,
}

impl AuditLogger {
    /// Create a new audit logger
    pub fn new(config: &AuditConfig) -> Result<Self> {
        if config.enabled {
            // Ensure parent directory exists
            if let Some(parent) = config.log_path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create audit log directory: {}", parent.display())
                })?;
            }
        }

        Ok(Self {
            log_path: config.log_path.clone(),
            json_format: config.json_format,
            enabled: config.enabled,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Log one rewrite of a document
    pub fn log_rewrite(
        &self,
        session_id: &str,
        manager: &EntityManager,
        result: &RewriteResult,
        processing_time_ms: u64,
    ) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let report = &result.report;
        let entry = AuditLogEntry {
            timestamp: Utc::now().to_rfc3339(),
            session_id: session_id.to_string(),
            total_rules: report.total_rules,
            active_rules: report.active_rules,
            replacements: report.total_replacements(),
            processing_time_ms,
            rules: report
                .rules
                .iter()
                .map(|rule| AuditRule {
                    entity_id: rule.entity_id.to_string(),
                    entity_type: manager
                        .entity(&rule.entity_id)
                        .map(|entity| entity.entity_type.to_string())
                        .unwrap_or_default(),
                    original_hash: hash_value(&rule.original),
                    replacement: rule.replacement.clone(),
                    applied: rule.occurrences,
                    is_grouped: rule.is_grouped,
                })
                .collect(),
        };

        self.write_entry(&entry)
    }

    /// Write an audit entry to the log file
    fn write_entry(&self, entry: &AuditLogEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("Failed to open audit log: {}", self.log_path.display()))?;

        if self.json_format {
            let json_line =
                serde_json::to_string(entry).context("Failed to serialize audit entry")?;
            writeln!(file, "{json_line}").context("Failed to write audit entry")?;
        } else {
            writeln!(
                file,
                "[{}] Session: {} | Rules: {}/{} | Replacements: {} | Time: {}ms",
                entry.timestamp,
                entry.session_id,
                entry.active_rules,
                entry.total_rules,
                entry.replacements,
                entry.processing_time_ms
            )
            .context("Failed to write audit entry")?;
        }

        Ok(())
    }
}

/// Hash a sensitive value using SHA-256
fn hash_value(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let result = hasher.finalize();
    format!("{result:x}")
}
