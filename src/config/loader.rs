//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{PseudonymConfig, SessionBackend};
use crate::domain::errors::PseudonymError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static regex"))
}

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into PseudonymConfig
/// 4. Applies environment variable overrides (PSEUDONYM_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`PseudonymError::Configuration`] if any step fails.
///
/// # Examples
///
/// ```no_run
/// use pseudonym::config::loader::load_config;
///
/// let config = load_config("pseudonym.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<PseudonymConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(PseudonymError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        PseudonymError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: PseudonymConfig = toml::from_str(&contents)?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        PseudonymError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    tracing::debug!(path = %path.display(), "Configuration loaded");
    Ok(config)
}

/// Load `path` when it exists, otherwise start from defaults.
///
/// Environment overrides and validation apply in both cases.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<PseudonymConfig> {
    let path = path.as_ref();
    if path.exists() {
        return load_config(path);
    }

    tracing::debug!(path = %path.display(), "No configuration file, using defaults");
    let mut config = PseudonymConfig::default();
    apply_env_overrides(&mut config)?;
    config.validate().map_err(|e| {
        PseudonymError::Configuration(format!("Configuration validation failed: {e}"))
    })?;
    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let mut result = String::new();
    let mut missing_vars = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in placeholder().captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    processed_line = processed_line.replace(&cap[0], &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(PseudonymError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using the PSEUDONYM_* prefix
///
/// Variables follow the pattern PSEUDONYM_<SECTION>_<KEY>, for example
/// PSEUDONYM_SESSION_TTL_MINUTES. Anonymization keys are handled by
/// [`AnonymizationConfig::apply_env_overrides`](crate::anonymization::AnonymizationConfig::apply_env_overrides).
fn apply_env_overrides(config: &mut PseudonymConfig) -> Result<()> {
    if let Ok(val) = std::env::var("PSEUDONYM_LOG_LEVEL") {
        config.application.log_level = val;
    }

    config
        .anonymization
        .apply_env_overrides()
        .map_err(|e| PseudonymError::Configuration(format!("{e:#}")))?;

    if let Ok(val) = std::env::var("PSEUDONYM_SESSION_BACKEND") {
        config.session.backend = match val.to_lowercase().as_str() {
            "file" => SessionBackend::File,
            "memory" => SessionBackend::Memory,
            other => {
                return Err(PseudonymError::Configuration(format!(
                    "Invalid PSEUDONYM_SESSION_BACKEND '{other}', expected file or memory"
                )))
            }
        };
    }
    if let Ok(val) = std::env::var("PSEUDONYM_SESSION_DIRECTORY") {
        config.session.directory = PathBuf::from(val);
    }
    if let Ok(val) = std::env::var("PSEUDONYM_SESSION_TTL_MINUTES") {
        config.session.ttl_minutes = val.parse().map_err(|_| {
            PseudonymError::Configuration(format!("Invalid PSEUDONYM_SESSION_TTL_MINUTES '{val}'"))
        })?;
    }

    if let Ok(val) = std::env::var("PSEUDONYM_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("PSEUDONYM_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Ok(val) = std::env::var("PSEUDONYM_LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Environment variables are process-wide
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn write_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_substitute_env_vars() {
        let _lock = ENV_MUTEX.lock().unwrap();
        std::env::set_var("PSEUDONYM_TEST_URL", "http://ollama:11434");
        let input = "base_url = \"${PSEUDONYM_TEST_URL}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "base_url = \"http://ollama:11434\"\n");
        std::env::remove_var("PSEUDONYM_TEST_URL");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        let _lock = ENV_MUTEX.lock().unwrap();
        std::env::remove_var("PSEUDONYM_MISSING_VAR");
        let input = "model = \"${PSEUDONYM_MISSING_VAR}\"";
        let err = substitute_env_vars(input).unwrap_err();
        assert!(err.to_string().contains("PSEUDONYM_MISSING_VAR"));
    }

    #[test]
    fn test_substitute_skips_comments() {
        let input = "# model = \"${PSEUDONYM_UNSET_IN_COMMENT}\"";
        assert!(substitute_env_vars(input).is_ok());
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent.toml");
        assert!(matches!(result, Err(PseudonymError::Configuration(_))));
    }

    #[test]
    fn test_load_config_valid() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let temp_file = write_config(
            r#"
[application]
log_level = "debug"

[anonymization]
mode = "deep"

[anonymization.names]
auto_group = true

[session]
backend = "memory"
ttl_minutes = 5
"#,
        );

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.application.log_level, "debug");
        assert_eq!(
            config.anonymization.mode,
            crate::anonymization::DetectionMode::Deep
        );
        assert!(config.anonymization.names.auto_group);
        assert_eq!(config.session.backend, SessionBackend::Memory);
        assert_eq!(config.session.ttl_minutes, 5);
    }

    #[test]
    fn test_env_override_wins_over_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let temp_file = write_config("[session]\nttl_minutes = 5\n");

        std::env::set_var("PSEUDONYM_SESSION_TTL_MINUTES", "90");
        let config = load_config(temp_file.path());
        std::env::remove_var("PSEUDONYM_SESSION_TTL_MINUTES");

        assert_eq!(config.unwrap().session.ttl_minutes, 90);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let temp_file = write_config("[application]\nlog_level = \"loud\"\n");
        let err = load_config(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("validation failed"));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let config = load_or_default("/nonexistent/pseudonym.toml").unwrap();
        assert_eq!(config.session.ttl_minutes, 30);
    }
}
