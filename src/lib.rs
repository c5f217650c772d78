// Pseudonym - Personal Data Pseudonymization for Legal Documents
// Copyright (c) 2025 Pseudonym Contributors
// Licensed under the MIT License

//! # Pseudonym - personal data pseudonymization
//!
//! Pseudonym finds personal data in French legal documents, lets a reviewer
//! group and correct what was found, and rewrites the document with stable
//! replacement tokens.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Detecting** candidates with a pattern registry, a statistical
//!   recognizer and an optional external language-model service
//! - **Aggregating** candidates into canonical entities with default tokens
//! - **Grouping** entity mentions that should share a token
//! - **Rewriting** documents with conflict-free, non-cascading replacements
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`anonymization`] - Detection, aggregation, grouping and replacement
//! - [`document`] - Block documents rewritten one block at a time
//! - [`session`] - Review sessions between analysis and rewrite
//! - [`domain`] - Identifiers and error types
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pseudonym::anonymization::AnonymizationEngine;
//! use pseudonym::config::PseudonymConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PseudonymConfig::from_file("pseudonym.toml")?;
//!     let engine = AnonymizationEngine::new(config.anonymization)?;
//!
//!     let text = "Maître Jean Dupont, 12 rue de la Paix, 75002 Paris";
//!     let analysis = engine.analyze(text, None).await?;
//!     let result = engine.rewrite("example", &analysis.manager)?;
//!
//!     println!("{}", result.text);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Library operations return [`domain::Result`]. A rewrite whose plan fails
//! its integrity check returns [`domain::PseudonymError::RewriteIntegrity`]
//! and leaves the document untouched.

pub mod anonymization;
pub mod cli;
pub mod config;
pub mod document;
pub mod domain;
pub mod logging;
pub mod session;
