//! Main anonymization engine
//!
//! This module provides the [`AnonymizationEngine`] that orchestrates
//! detection, aggregation, grouping, rewriting and audit logging for one
//! document at a time.
//!
//! # Architecture
//!
//! The engine coordinates four components:
//! - **Detector chain**: pattern registry, statistical recognizer and the
//!   optional external service, filtered by [`DetectionMode`]
//! - **Aggregator**: merges candidates into canonical entities with default tokens
//! - **Entity manager**: the reviewer-editable state returned to the caller
//! - **Audit logger**: records rewrites with hashed originals
//!
//! # Examples
//!
//! ```no_run
//! use pseudonym::anonymization::{AnonymizationEngine, config::AnonymizationConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let engine = AnonymizationEngine::new(AnonymizationConfig::default())?;
//!
//! let analysis = engine
//!     .analyze("Contact Jean Dupont, jean.dupont@example.fr", None)
//!     .await?;
//! println!("Detected {} entities", analysis.manager.entities().len());
//!
//! let result = engine.rewrite("session-1", &analysis.manager)?;
//! println!("{}", result.text);
//! # Ok(())
//! # }
//! ```

use crate::anonymization::{
    aggregator::CandidateAggregator,
    audit::AuditLogger,
    config::{AnonymizationConfig, DetectionMode},
    detector::{
        external::ExternalServiceDetector, patterns::PatternRegistry, regex::RegexDetector,
        statistical::HeuristicRecognizer, DetectionDiagnostic, DetectorChain,
    },
    grouping::{EntityManager, EntitySnapshot},
    names::NameCanonicalizer,
    replacement::RewriteResult,
    tokens::TokenGenerator,
};
use crate::document::{plan_blocks, write_back, BlockDocument, DocumentRewrite};
use anyhow::{Context, Result};
use std::time::Instant;

/// Result of analyzing one document
#[derive(Debug)]
pub struct Analysis {
    /// Reviewer-editable entities, groups and tokens
    pub manager: EntityManager,
    pub mode: DetectionMode,
    /// Detectors that ran in `mode`, in execution order
    pub detectors: Vec<String>,
    /// Raw candidates before aggregation
    pub candidates: usize,
    /// Detectors that failed; the analysis continued without them
    pub diagnostics: Vec<DetectionDiagnostic>,
    /// Explicit groups created by name matching
    pub auto_grouped: usize,
    pub processing_time_ms: u64,
}

/// Main anonymization engine
///
/// Holds the detector chain and the token and name settings shared by
/// every document. Per-document state lives in the [`EntityManager`]
/// returned by [`analyze`](Self::analyze), so one engine serves any
/// number of concurrent sessions.
///
/// # Examples
///
/// ```no_run
/// use pseudonym::anonymization::{AnonymizationEngine, config::AnonymizationConfig};
/// use pseudonym::anonymization::config::DetectionMode;
///
/// # fn example() -> anyhow::Result<()> {
/// let mut config = AnonymizationConfig::default();
/// config.mode = DetectionMode::Patterns;
/// config.names.auto_group = true;
///
/// let engine = AnonymizationEngine::new(config)?;
/// # Ok(())
/// # }
/// ```
pub struct AnonymizationEngine {
    config: AnonymizationConfig,
    chain: DetectorChain,
    aggregator: CandidateAggregator,
    tokens: TokenGenerator,
    names: NameCanonicalizer,
    audit_logger: Option<AuditLogger>,
}

impl AnonymizationEngine {
    /// Create a new anonymization engine
    ///
    /// Builds the detector chain in its fixed order: pattern registry
    /// (built-in or `pattern_library`), statistical recognizer when
    /// enabled, external service when enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - Pattern library file cannot be loaded
    /// - The external service client cannot be built
    /// - Audit logger initialization fails
    pub fn new(config: AnonymizationConfig) -> Result<Self> {
        config
            .validate()
            .context("Invalid anonymization configuration")?;

        let regex = if let Some(ref pattern_path) = config.pattern_library {
            let registry = PatternRegistry::from_file(pattern_path)?;
            RegexDetector::with_registry(registry)
        } else {
            RegexDetector::new()?
        };
        let mut chain = DetectorChain::new().with(Box::new(regex));

        if config.statistical.enabled {
            chain = chain.with(Box::new(HeuristicRecognizer::new(&config.statistical)));
        }

        if config.external.enabled {
            let external = ExternalServiceDetector::new(config.external.clone())
                .context("Failed to create external detection client")?;
            chain = chain.with(Box::new(external));
        }

        Self::with_detectors(config, chain)
    }

    /// Create an engine around an already assembled detector chain
    pub fn with_detectors(config: AnonymizationConfig, chain: DetectorChain) -> Result<Self> {
        let audit_logger = if config.audit.enabled {
            Some(AuditLogger::new(&config.audit)?)
        } else {
            None
        };

        let tokens = TokenGenerator::new(&config.tokens);
        let names = NameCanonicalizer::new(&config.names);

        tracing::debug!(
            detectors = chain.len(),
            mode = %config.mode,
            audit = audit_logger.is_some(),
            "Anonymization engine ready"
        );

        Ok(Self {
            aggregator: CandidateAggregator::new(tokens.clone()),
            config,
            chain,
            tokens,
            names,
            audit_logger,
        })
    }

    pub fn config(&self) -> &AnonymizationConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenGenerator {
        &self.tokens
    }

    pub fn names(&self) -> &NameCanonicalizer {
        &self.names
    }

    /// Analyze a document
    ///
    /// Runs every detector enabled by `mode` (the configured mode when
    /// `None`), aggregates the candidates and, when name auto-grouping is
    /// enabled, merges person mentions whose canonical names match.
    ///
    /// Detector failures never fail the analysis; they are returned as
    /// [`Analysis::diagnostics`].
    pub async fn analyze(&self, text: &str, mode: Option<DetectionMode>) -> Result<Analysis> {
        let start = Instant::now();
        let mode = mode.unwrap_or(self.config.mode);

        let detectors = self
            .chain
            .active_names(mode)
            .into_iter()
            .map(str::to_string)
            .collect();
        let outcome = self.chain.run(text, mode).await;
        let candidates = outcome.candidates.len();

        let entities = self
            .aggregator
            .aggregate(text, &outcome.candidates)
            .context("Failed to aggregate candidates")?;

        let mut manager = EntityManager::new(text, entities, self.tokens.clone());
        let auto_grouped = if self.config.names.auto_group {
            manager
                .auto_group_similar_names(&self.names)
                .context("Failed to group similar names")?
        } else {
            0
        };

        let processing_time_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            mode = %mode,
            candidates,
            entities = manager.entities().len(),
            auto_grouped,
            failed_detectors = outcome.diagnostics.len(),
            duration_ms = processing_time_ms,
            "Analysis completed"
        );

        Ok(Analysis {
            manager,
            mode,
            detectors,
            candidates,
            diagnostics: outcome.diagnostics,
            auto_grouped,
            processing_time_ms,
        })
    }

    /// Rebuild the manager of a stored session
    pub fn restore(&self, snapshot: EntitySnapshot) -> EntityManager {
        EntityManager::from_snapshot(snapshot, self.tokens.clone())
    }

    /// Rewrite the manager's document with its selected entities
    ///
    /// # Errors
    ///
    /// Returns an error if the replacement plan fails its integrity check
    /// (the error downcasts to a
    /// [`PseudonymError`](crate::domain::PseudonymError)) or if audit
    /// logging fails. No text is produced in either case.
    pub fn rewrite(&self, session_id: &str, manager: &EntityManager) -> Result<RewriteResult> {
        let start = Instant::now();

        let result = manager.rewrite().map_err(|e| {
            tracing::error!(session_id, error = %e, "Rewrite rejected");
            e
        })?;

        let processing_time_ms = start.elapsed().as_millis() as u64;
        if let Some(ref logger) = self.audit_logger {
            logger.log_rewrite(session_id, manager, &result, processing_time_ms)?;
        }

        tracing::info!(
            session_id,
            active_rules = result.report.active_rules,
            replacements = result.replacements.len(),
            duration_ms = processing_time_ms,
            "Rewrite completed"
        );

        Ok(result)
    }

    /// Rewrite a block-structured document with the manager's selected entities
    ///
    /// Each block gets its own replacement pass. Nothing is written back
    /// unless every block succeeds and the audit log accepted every entry.
    pub fn rewrite_document(
        &self,
        session_id: &str,
        manager: &EntityManager,
        document: &mut dyn BlockDocument,
    ) -> Result<DocumentRewrite> {
        let start = Instant::now();
        let rewrite = plan_blocks(manager, document)?;

        if let Some(ref logger) = self.audit_logger {
            let processing_time_ms = start.elapsed().as_millis() as u64;
            for (_, result) in &rewrite.blocks {
                logger.log_rewrite(session_id, manager, result, processing_time_ms)?;
            }
        }

        write_back(document, &rewrite)?;

        tracing::info!(
            session_id,
            blocks = rewrite.blocks_total,
            changed = rewrite.blocks_changed(),
            replacements = rewrite.total_replacements(),
            "Document rewrite completed"
        );

        Ok(rewrite)
    }
}
