//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Pseudonym configuration file.

use crate::cli::{EXIT_CONFIG, EXIT_SUCCESS};
use crate::config::load_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // Loading substitutes, overrides and validates in one step
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration is invalid");
                println!("   Error: {e}");
                println!();
                return Ok(EXIT_CONFIG);
            }
        };

        let anonymization = &config.anonymization;
        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Detection Mode: {}", anonymization.mode);
        println!(
            "  Pattern Library: {}",
            anonymization
                .pattern_library
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "built-in".to_string())
        );
        println!(
            "  Statistical Detector: {}",
            enabled(anonymization.statistical.enabled)
        );
        if anonymization.external.enabled {
            println!(
                "  External Service: {} ({})",
                anonymization.external.base_url, anonymization.external.model
            );
        } else {
            println!("  External Service: disabled");
        }
        println!("  Name Auto-Grouping: {}", enabled(anonymization.names.auto_group));
        println!(
            "  Audit Log: {}",
            if anonymization.audit.enabled {
                anonymization.audit.log_path.display().to_string()
            } else {
                "disabled".to_string()
            }
        );
        println!(
            "  Sessions: {:?} ({} min)",
            config.session.backend, config.session.ttl_minutes
        );
        println!();

        Ok(EXIT_SUCCESS)
    }
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_validate_reports_config_errors() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[session\nttl_minutes = 10\n").unwrap();

        let code = ValidateArgs {}
            .execute(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, EXIT_CONFIG);
    }

    #[tokio::test]
    async fn test_validate_missing_file() {
        let code = ValidateArgs {}
            .execute("/nonexistent/pseudonym.toml")
            .await
            .unwrap();
        assert_eq!(code, EXIT_CONFIG);
    }
}
