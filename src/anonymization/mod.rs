//! Anonymization module for Pseudonym
//!
//! This module provides detection, grouping and stable-token replacement of
//! personal data in free text.
//!
//! # Architecture
//!
//! The pipeline consists of:
//! - **Detection**: pattern registry, statistical recognizer, external service
//! - **Aggregation**: one canonical entity per normalized text, with a default token
//! - **Grouping**: explicit entity groups and token groups, reviewer-editable
//! - **Replacement**: conflict-free rewriting with a per-rule report
//! - **Audit**: structured logging with hashed originals
//!
//! # Usage
//!
//! ```rust,ignore
//! use pseudonym::anonymization::{AnonymizationEngine, config::AnonymizationConfig};
//!
//! let engine = AnonymizationEngine::new(AnonymizationConfig::default())?;
//! let analysis = engine.analyze(text, None).await?;
//! let rewritten = engine.rewrite("session", &analysis.manager)?;
//! ```

pub mod aggregator;
pub mod audit;
pub mod config;
pub mod detector;
pub mod engine;
pub mod grouping;
pub mod models;
pub mod names;
pub mod replacement;
pub mod report;
pub mod scan;
pub mod tokens;

// Re-export main types
pub use config::{AnonymizationConfig, DetectionMode};
pub use engine::{Analysis, AnonymizationEngine};
pub use grouping::{EntityManager, EntitySnapshot};
pub use models::{CanonicalEntity, EntityCandidate, EntityGroup, EntityType, TokenGroup};
pub use replacement::{ReplacementEngine, ReplacementRule, RewriteResult};
pub use report::AnalysisReport;
