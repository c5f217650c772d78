//! Pattern library for entity detection

use crate::anonymization::models::EntityType;
use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Pattern definition from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct PatternDefinition {
    /// Regex patterns for this entry
    pub patterns: Vec<String>,
    /// Confidence score (0.0 - 1.0) for types without a validator
    pub confidence: f32,
    /// Entity type label
    pub category: String,
    /// Capture group holding the entity text
    #[serde(default)]
    pub group: usize,
}

/// Compiled pattern with metadata
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    /// Library entry the pattern came from
    pub name: String,
    pub regex: Regex,
    pub entity_type: EntityType,
    pub confidence: f32,
    pub group: usize,
}

/// Pattern library container
///
/// Entries are kept sorted by name so detection order is reproducible.
#[derive(Debug, Deserialize)]
struct PatternLibrary {
    patterns: BTreeMap<String, PatternDefinition>,
}

/// Pattern registry for entity detection
#[derive(Debug)]
pub struct PatternRegistry {
    patterns: Vec<CompiledPattern>,
    patterns_by_type: HashMap<EntityType, Vec<CompiledPattern>>,
}

impl PatternRegistry {
    /// Create a new pattern registry from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!(
                "Failed to read pattern library: {}",
                path.as_ref().display()
            )
        })?;

        Self::from_toml(&content)
    }

    /// Create a pattern registry from TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        let library: PatternLibrary =
            toml::from_str(content).context("Failed to parse pattern library TOML")?;

        let mut patterns = Vec::new();
        let mut patterns_by_type: HashMap<EntityType, Vec<CompiledPattern>> = HashMap::new();

        for (name, def) in library.patterns {
            let entity_type: EntityType = def.category.parse().with_context(|| {
                format!("Invalid category in pattern '{}': {}", name, def.category)
            })?;

            if !(0.0..=1.0).contains(&def.confidence) {
                anyhow::bail!("Confidence of pattern '{name}' must be between 0 and 1");
            }

            for pattern_str in &def.patterns {
                let regex = Regex::new(pattern_str)
                    .with_context(|| format!("Invalid regex in pattern '{name}': {pattern_str}"))?;

                if def.group >= regex.captures_len() {
                    anyhow::bail!(
                        "Pattern '{name}' selects group {} but only has {} groups",
                        def.group,
                        regex.captures_len() - 1
                    );
                }

                let compiled = CompiledPattern {
                    name: name.clone(),
                    regex,
                    entity_type,
                    confidence: def.confidence,
                    group: def.group,
                };

                patterns.push(compiled.clone());
                patterns_by_type
                    .entry(entity_type)
                    .or_default()
                    .push(compiled);
            }
        }

        Ok(Self {
            patterns,
            patterns_by_type,
        })
    }

    /// Create a default pattern registry with built-in patterns
    pub fn default_patterns() -> Result<Self> {
        let default_toml = include_str!("../../../../patterns/default_patterns.toml");
        Self::from_toml(default_toml)
    }

    /// Get all patterns
    pub fn all_patterns(&self) -> &[CompiledPattern] {
        &self.patterns
    }

    /// Get patterns for a specific entity type
    pub fn patterns_for_type(&self, entity_type: EntityType) -> Option<&[CompiledPattern]> {
        self.patterns_by_type
            .get(&entity_type)
            .map(|v| v.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(entity_type: EntityType, text: &str) -> Vec<String> {
        let registry = PatternRegistry::default_patterns().unwrap();
        registry
            .patterns_for_type(entity_type)
            .unwrap()
            .iter()
            .flat_map(|p| {
                p.regex
                    .captures_iter(text)
                    .filter_map(|c| c.get(p.group).map(|m| m.as_str().to_string()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn test_load_default_patterns() {
        let registry = PatternRegistry::default_patterns().unwrap();
        assert!(!registry.all_patterns().is_empty());
        for entity_type in EntityType::ALL {
            if entity_type != EntityType::Other {
                assert!(registry.patterns_for_type(entity_type).is_some());
            }
        }
    }

    #[test]
    fn test_email_pattern() {
        let found = matches(EntityType::Email, "Écrire à jean.dupont@cabinet-avocats.fr svp");
        assert_eq!(found, vec!["jean.dupont@cabinet-avocats.fr"]);
    }

    #[test]
    fn test_phone_pattern() {
        let found = matches(EntityType::Phone, "Tél : 01 23 45 67 89 ou +33 6 12 34 56 78");
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_titled_person_captures_name_only() {
        let found = matches(EntityType::Person, "Contact Jean Dupont and M. Jean Dupont");
        assert_eq!(found, vec!["Jean Dupont"]);

        let found = matches(EntityType::Person, "représenté par Maître Élodie Lefèvre, avocat");
        assert_eq!(found, vec!["Élodie Lefèvre"]);
    }

    #[test]
    fn test_siret_pattern_captures_number() {
        let found = matches(EntityType::RegistrationNumber, "SIRET : 732 829 320 00074.");
        assert!(found.contains(&"732 829 320 00074".to_string()));
    }

    #[test]
    fn test_street_without_number() {
        let found = matches(EntityType::Address, "domicilié rue de la Paix à Paris");
        assert!(found.contains(&"rue de la Paix".to_string()));
    }

    #[test]
    fn test_invalid_category_is_rejected() {
        let toml_str = r#"
            [patterns.bad]
            category = "FAX"
            confidence = 0.9
            patterns = ['\d+']
        "#;
        assert!(PatternRegistry::from_toml(toml_str).is_err());
    }

    #[test]
    fn test_missing_capture_group_is_rejected() {
        let toml_str = r#"
            [patterns.bad]
            category = "OTHER"
            confidence = 0.9
            group = 2
            patterns = ['ref-(\d+)']
        "#;
        let err = PatternRegistry::from_toml(toml_str).unwrap_err();
        assert!(err.to_string().contains("selects group 2"));
    }
}
