//! Configuration schema types
//!
//! This module defines the configuration structure for Pseudonym. Every
//! section has defaults, so an empty file is a valid configuration.

use crate::anonymization::config::AnonymizationConfig;
use crate::domain::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main Pseudonym configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PseudonymConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Detection, tokens, names and audit
    #[serde(default)]
    pub anonymization: AnonymizationConfig,

    /// Session storage between analysis and rewrite
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PseudonymConfig {
    /// Load, substitute, override and validate a configuration file
    ///
    /// See [`load_config`](crate::config::load_config).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        super::loader::load_config(path)
    }

    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.application.validate()?;
        self.anonymization
            .validate()
            .map_err(|e| format!("anonymization: {e:#}"))?;
        self.session.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl ApplicationConfig {
    fn validate(&self) -> std::result::Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

/// Where sessions are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    /// JSON files, shared between CLI invocations
    #[default]
    File,
    /// Process memory only
    Memory,
}

/// Session storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub backend: SessionBackend,

    /// Directory of the file backend
    #[serde(default = "default_session_directory")]
    pub directory: PathBuf,

    /// Lifetime of a session after its last change
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackend::default(),
            directory: default_session_directory(),
            ttl_minutes: default_ttl_minutes(),
        }
    }
}

impl SessionConfig {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.ttl_minutes == 0 {
            return Err("session.ttl_minutes must be > 0".to_string());
        }
        if self.backend == SessionBackend::File && self.directory.as_os_str().is_empty() {
            return Err("session.directory cannot be empty with the file backend".to_string());
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default)]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy (daily, hourly, never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,

    /// Emit console logs as JSON instead of human-readable lines
    #[serde(default)]
    pub json_console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
            json_console: false,
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> std::result::Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path cannot be empty when local logging is enabled".to_string());
        }

        Ok(())
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_session_directory() -> PathBuf {
    PathBuf::from(".pseudonym/sessions")
}

fn default_ttl_minutes() -> u64 {
    30
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PseudonymConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session.backend, SessionBackend::File);
        assert_eq!(config.session.ttl_minutes, 30);
        assert!(!config.logging.local_enabled);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: PseudonymConfig = toml::from_str("").unwrap();
        assert_eq!(config.application.log_level, "info");
        assert_eq!(config.anonymization.tokens.hash_length, 6);
    }

    #[test]
    fn test_application_config_validation() {
        let mut config = ApplicationConfig::default();
        assert!(config.validate().is_ok());

        config.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_session_config_validation() {
        let mut config = SessionConfig::default();
        config.ttl_minutes = 0;
        assert!(config.validate().is_err());

        config.ttl_minutes = 10;
        config.directory = PathBuf::new();
        assert!(config.validate().is_err());

        config.backend = SessionBackend::Memory;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_logging_config_validation() {
        let mut config = LoggingConfig::default();
        config.local_rotation = "weekly".to_string();
        assert!(config.validate().is_err());

        config.local_rotation = "hourly".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_anonymization_errors_are_prefixed() {
        let mut config = PseudonymConfig::default();
        config.anonymization.tokens.hash_length = 2;
        let err = config.validate().unwrap_err();
        assert!(err.starts_with("anonymization:"));
        assert!(err.contains("hash_length"));
    }
}
