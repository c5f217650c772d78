//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use crate::cli::{EXIT_CONFIG, EXIT_FAILURE, EXIT_SUCCESS};
use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "pseudonym.toml")]
    pub output: String,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing Pseudonym configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(EXIT_CONFIG);
        }

        match fs::write(&self.output, Self::generate_config()) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Start Ollama if you enable the external detector");
                println!("  3. Validate configuration: pseudonym validate-config");
                println!("  4. Analyze a document: pseudonym analyze <input>");
                println!();
                Ok(EXIT_SUCCESS)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(EXIT_FAILURE)
            }
        }
    }

    fn generate_config() -> String {
        r#"# Pseudonym Configuration File
#
# Values may reference environment variables as ${VAR}. Any key can also be
# overridden with a PSEUDONYM_* variable, e.g. PSEUDONYM_LOG_LEVEL=debug.

# ============================================================================
# Application Settings
# ============================================================================
[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# ============================================================================
# Detection
# ============================================================================
[anonymization]
# Detection mode: patterns | standard | deep
# - patterns: regular expressions only
# - standard: patterns and the statistical recognizer
# - deep: every detector, including the external service
mode = "standard"

# Optional: custom pattern library (TOML); built-in patterns otherwise
# pattern_library = "./patterns/custom.toml"

[anonymization.statistical]
enabled = true
min_confidence = 0.5
chunk_size = 5000

[anonymization.external]
# Ollama-compatible service, used in deep mode only
enabled = false
base_url = "http://localhost:11434"
model = "llama3.1:8b"
timeout_seconds = 120
availability_timeout_seconds = 5
chunk_size = 2000
chunk_overlap = 200
temperature = 0.1

[anonymization.tokens]
# Hex digits of the text hash in default tokens such as [PERSON_1a2b3c]
hash_length = 6

# Per-type templates; {id} is replaced by the hash
# [anonymization.tokens.templates]
# PERSON = "[NOM_{id}]"

[anonymization.names]
# Minimum similarity for two person names to match
score_cutoff = 0.85
# Group matching person mentions after each analysis
auto_group = false

[anonymization.audit]
enabled = true
log_path = "./audit/anonymization.log"
json_format = true

# ============================================================================
# Sessions
# ============================================================================
[session]
# file | memory (memory sessions end with the process)
backend = "file"
directory = ".pseudonym/sessions"
# Minutes a session stays valid after its last change
ttl_minutes = 30

# ============================================================================
# Logging
# ============================================================================
[logging]
# JSON console output instead of human-readable lines
json_console = false

# Local file logging
local_enabled = false
local_path = "./logs"
# Rotation: daily | hourly | never
local_rotation = "daily"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PseudonymConfig;
    use tempfile::tempdir;

    #[test]
    fn test_generated_config_parses_and_validates() {
        let config: PseudonymConfig = toml::from_str(&InitArgs::generate_config()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.session.ttl_minutes, 30);
        assert!(!config.anonymization.external.enabled);
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pseudonym.toml");
        fs::write(&path, "# existing").unwrap();

        let args = InitArgs {
            output: path.display().to_string(),
            force: false,
        };
        assert_eq!(args.execute().await.unwrap(), EXIT_CONFIG);
        assert_eq!(fs::read_to_string(&path).unwrap(), "# existing");

        let forced = InitArgs {
            output: path.display().to_string(),
            force: true,
        };
        assert_eq!(forced.execute().await.unwrap(), EXIT_SUCCESS);
        assert!(fs::read_to_string(&path).unwrap().contains("[anonymization]"));
    }

    #[tokio::test]
    async fn test_init_write_failure() {
        let args = InitArgs {
            output: "/nonexistent/dir/pseudonym.toml".to_string(),
            force: false,
        };
        assert_eq!(args.execute().await.unwrap(), EXIT_FAILURE);
    }
}
