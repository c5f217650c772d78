//! Anonymization configuration

use crate::anonymization::models::{DetectionSource, EntityType};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Which detector tiers run during an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    /// Pattern registry only
    Patterns,
    /// Patterns and the statistical recognizer
    #[default]
    Standard,
    /// Every tier, with juridical context rules and the external service
    #[serde(alias = "approfondi")]
    Deep,
}

impl DetectionMode {
    /// Whether detectors of `source` run in this mode
    pub fn includes(&self, source: DetectionSource) -> bool {
        match source {
            DetectionSource::Pattern => true,
            DetectionSource::Statistical => !matches!(self, Self::Patterns),
            DetectionSource::ExternalService => matches!(self, Self::Deep),
            DetectionSource::Manual => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patterns => "patterns",
            Self::Standard => "standard",
            Self::Deep => "deep",
        }
    }
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "patterns" => Ok(Self::Patterns),
            "standard" => Ok(Self::Standard),
            "deep" | "approfondi" => Ok(Self::Deep),
            other => Err(format!(
                "Invalid detection mode '{other}', expected patterns, standard or deep"
            )),
        }
    }
}

/// Anonymization pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnonymizationConfig {
    /// Default detection mode
    #[serde(default)]
    pub mode: DetectionMode,

    /// Path to a pattern library TOML file replacing the built-in one
    pub pattern_library: Option<PathBuf>,

    #[serde(default)]
    pub statistical: StatisticalConfig,

    #[serde(default)]
    pub external: ExternalServiceConfig,

    #[serde(default)]
    pub tokens: TokenConfig,

    #[serde(default)]
    pub names: NameConfig,

    /// Audit logging configuration
    #[serde(default)]
    pub audit: AuditConfig,
}

impl AnonymizationConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(ref path) = self.pattern_library {
            if !path.exists() {
                anyhow::bail!("Pattern library file not found: {}", path.display());
            }
            if path.extension().and_then(|s| s.to_str()) != Some("toml") {
                anyhow::bail!("Pattern library must be a TOML file: {}", path.display());
            }
        }

        self.statistical
            .validate()
            .context("Invalid statistical detector configuration")?;
        self.external
            .validate()
            .context("Invalid external service configuration")?;
        self.tokens.validate().context("Invalid token configuration")?;
        self.names
            .validate()
            .context("Invalid name matching configuration")?;
        self.audit.validate().context("Invalid audit configuration")?;

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("PSEUDONYM_DETECTION_MODE") {
            self.mode = val
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .context("Invalid PSEUDONYM_DETECTION_MODE value")?;
        }

        if let Ok(val) = std::env::var("PSEUDONYM_PATTERN_LIBRARY") {
            self.pattern_library = Some(PathBuf::from(val));
        }

        self.external.apply_env_overrides()?;
        self.audit.apply_env_overrides()?;

        Ok(())
    }
}

/// Local statistical recognizer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Candidates below this confidence are not emitted
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    /// Maximum chunk size in characters
    #[serde(default = "default_statistical_chunk_size")]
    pub chunk_size: usize,
}

fn default_true() -> bool {
    true
}

fn default_min_confidence() -> f32 {
    0.5
}

fn default_statistical_chunk_size() -> usize {
    5000
}

impl Default for StatisticalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_confidence: default_min_confidence(),
            chunk_size: default_statistical_chunk_size(),
        }
    }
}

impl StatisticalConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            anyhow::bail!("min_confidence must be between 0 and 1");
        }
        if self.chunk_size < 100 {
            anyhow::bail!("chunk_size must be at least 100 characters");
        }
        Ok(())
    }
}

/// External language-model service settings (Ollama-compatible API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalServiceConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_external_url")]
    pub base_url: String,

    #[serde(default = "default_external_model")]
    pub model: String,

    /// Per-request timeout
    #[serde(default = "default_external_timeout")]
    pub timeout_seconds: u64,

    /// Timeout of the availability probe
    #[serde(default = "default_availability_timeout")]
    pub availability_timeout_seconds: u64,

    #[serde(default = "default_external_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_external_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_external_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_external_timeout() -> u64 {
    60
}

fn default_availability_timeout() -> u64 {
    5
}

fn default_external_chunk_size() -> usize {
    4000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_temperature() -> f32 {
    0.1
}

impl Default for ExternalServiceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_external_url(),
            model: default_external_model(),
            timeout_seconds: default_external_timeout(),
            availability_timeout_seconds: default_availability_timeout(),
            chunk_size: default_external_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            temperature: default_temperature(),
        }
    }
}

impl ExternalServiceConfig {
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.base_url)
            .with_context(|| format!("Invalid base_url: {}", self.base_url))?;
        if self.model.trim().is_empty() {
            anyhow::bail!("model cannot be empty");
        }
        if self.timeout_seconds == 0 || self.availability_timeout_seconds == 0 {
            anyhow::bail!("timeouts must be greater than 0");
        }
        if self.chunk_overlap >= self.chunk_size {
            anyhow::bail!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            anyhow::bail!("temperature must be between 0 and 2");
        }
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("PSEUDONYM_EXTERNAL_ENABLED") {
            self.enabled = val
                .parse()
                .context("Invalid PSEUDONYM_EXTERNAL_ENABLED value")?;
        }

        if let Ok(val) = std::env::var("PSEUDONYM_EXTERNAL_URL") {
            self.base_url = val;
        }

        if let Ok(val) = std::env::var("PSEUDONYM_EXTERNAL_MODEL") {
            self.model = val;
        }

        if let Ok(val) = std::env::var("PSEUDONYM_EXTERNAL_TIMEOUT_SECONDS") {
            self.timeout_seconds = val
                .parse()
                .context("Invalid PSEUDONYM_EXTERNAL_TIMEOUT_SECONDS value")?;
        }

        Ok(())
    }
}

/// Default replacement token settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Number of hex digits of the text hash used in tokens
    #[serde(default = "default_hash_length")]
    pub hash_length: usize,

    /// Per-type template overrides; `{id}` is replaced by the hash
    #[serde(default)]
    pub templates: BTreeMap<EntityType, String>,
}

fn default_hash_length() -> usize {
    6
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            hash_length: default_hash_length(),
            templates: BTreeMap::new(),
        }
    }
}

impl TokenConfig {
    pub fn validate(&self) -> Result<()> {
        if !(4..=16).contains(&self.hash_length) {
            anyhow::bail!("hash_length must be between 4 and 16");
        }
        for (entity_type, template) in &self.templates {
            if template.trim().is_empty() {
                anyhow::bail!("Template for {entity_type} cannot be empty");
            }
        }
        Ok(())
    }
}

/// Name canonicalization and fuzzy matching settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameConfig {
    /// Civil titles stripped from the head of a name
    #[serde(default = "default_titles")]
    pub titles: Vec<String>,

    /// Tokens kept attached to the last name
    #[serde(default = "default_particles")]
    pub particles: Vec<String>,

    /// Minimum similarity for two names to match
    #[serde(default = "default_score_cutoff")]
    pub score_cutoff: f64,

    #[serde(default = "default_edit_weight")]
    pub edit_weight: f64,

    #[serde(default = "default_token_weight")]
    pub token_weight: f64,

    #[serde(default = "default_phonetic_weight")]
    pub phonetic_weight: f64,

    /// Group person mentions whose names match after analysis
    #[serde(default)]
    pub auto_group: bool,
}

fn default_titles() -> Vec<String> {
    [
        "m", "mr", "mme", "mlle", "dr", "me", "maitre", "maître", "monsieur", "madame",
        "mademoiselle", "docteur", "professeur", "pr",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_particles() -> Vec<String> {
    [
        "de", "du", "des", "d'", "la", "le", "van", "von", "der", "den", "di", "da", "del",
        "della", "dos", "das",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_score_cutoff() -> f64 {
    0.85
}

fn default_edit_weight() -> f64 {
    0.5
}

fn default_token_weight() -> f64 {
    0.3
}

fn default_phonetic_weight() -> f64 {
    0.2
}

impl Default for NameConfig {
    fn default() -> Self {
        Self {
            titles: default_titles(),
            particles: default_particles(),
            score_cutoff: default_score_cutoff(),
            edit_weight: default_edit_weight(),
            token_weight: default_token_weight(),
            phonetic_weight: default_phonetic_weight(),
            auto_group: false,
        }
    }
}

impl NameConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.score_cutoff) || self.score_cutoff == 0.0 {
            anyhow::bail!("score_cutoff must be in (0, 1]");
        }
        let weights = [self.edit_weight, self.token_weight, self.phonetic_weight];
        if weights.iter().any(|w| *w < 0.0) {
            anyhow::bail!("similarity weights cannot be negative");
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            anyhow::bail!("at least one similarity weight must be positive");
        }
        Ok(())
    }
}

/// Audit logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Enable audit logging
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Audit log file path
    #[serde(default = "default_audit_log_path")]
    pub log_path: PathBuf,

    /// Use JSON format for audit logs
    #[serde(default = "default_true")]
    pub json_format: bool,
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("./audit/anonymization.log")
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_path: default_audit_log_path(),
            json_format: true,
        }
    }
}

impl AuditConfig {
    /// Validate audit configuration
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.log_path.as_os_str().is_empty() {
            anyhow::bail!("log_path cannot be empty when audit logging is enabled");
        }
        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("PSEUDONYM_AUDIT_ENABLED") {
            self.enabled = val.parse().context("Invalid PSEUDONYM_AUDIT_ENABLED value")?;
        }

        if let Ok(val) = std::env::var("PSEUDONYM_AUDIT_LOG_PATH") {
            self.log_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("PSEUDONYM_AUDIT_JSON_FORMAT") {
            self.json_format = val
                .parse()
                .context("Invalid PSEUDONYM_AUDIT_JSON_FORMAT value")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnonymizationConfig::default();
        assert_eq!(config.mode, DetectionMode::Standard);
        assert!(config.statistical.enabled);
        assert!(!config.external.enabled);
        assert_eq!(config.external.chunk_overlap, 200);
        assert_eq!(config.tokens.hash_length, 6);
        assert_eq!(config.names.score_cutoff, 0.85);
        assert!(config.audit.enabled);
        assert!(config.audit.json_format);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mode_tiers() {
        assert!(DetectionMode::Patterns.includes(DetectionSource::Pattern));
        assert!(!DetectionMode::Patterns.includes(DetectionSource::Statistical));
        assert!(DetectionMode::Standard.includes(DetectionSource::Statistical));
        assert!(!DetectionMode::Standard.includes(DetectionSource::ExternalService));
        assert!(DetectionMode::Deep.includes(DetectionSource::ExternalService));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("approfondi".parse::<DetectionMode>().unwrap(), DetectionMode::Deep);
        assert_eq!("PATTERNS".parse::<DetectionMode>().unwrap(), DetectionMode::Patterns);
        assert!("fast".parse::<DetectionMode>().is_err());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let mut config = AnonymizationConfig::default();
        config.external.chunk_overlap = config.external.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let mut config = AnonymizationConfig::default();
        config.external.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_weights_are_rejected() {
        let mut config = AnonymizationConfig::default();
        config.names.edit_weight = 0.0;
        config.names.token_weight = 0.0;
        config.names.phonetic_weight = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_template_overrides_from_toml() {
        let toml_str = r#"
            mode = "deep"

            [tokens]
            hash_length = 8

            [tokens.templates]
            PERSON = "PARTIE_{id}"
            ORGANISATION = "SOCIETE_{id}"
        "#;
        let config: AnonymizationConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.mode, DetectionMode::Deep);
        assert_eq!(config.tokens.hash_length, 8);
        assert_eq!(
            config.tokens.templates.get(&EntityType::Person).map(String::as_str),
            Some("PARTIE_{id}")
        );
        assert!(config.tokens.templates.contains_key(&EntityType::Organization));
    }
}
