//! Configuration management for Pseudonym.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! Pseudonym uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `PSEUDONYM_*` environment overrides
//! - Default values for every setting
//! - Validation of every section
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level
//! - [`AnonymizationConfig`](crate::anonymization::AnonymizationConfig) - Detection, tokens, names, audit
//! - [`SessionConfig`] - Session backend and lifetime
//! - [`LoggingConfig`] - Log files and rotation
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [anonymization]
//! mode = "standard"
//!
//! [anonymization.external]
//! enabled = true
//! base_url = "${PSEUDONYM_OLLAMA_URL}"
//!
//! [session]
//! backend = "file"
//! ttl_minutes = 30
//! ```

pub mod loader;
pub mod schema;

// Re-export commonly used types
pub use loader::{load_config, load_or_default};
pub use schema::{ApplicationConfig, LoggingConfig, PseudonymConfig, SessionBackend, SessionConfig};
