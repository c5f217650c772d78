//! Default replacement tokens
//!
//! A default token is a per-type template salted with a short hash of the
//! lowercased entity text: the same text always gets the same token, and
//! two texts of one type get distinguishable tokens.

use crate::anonymization::config::TokenConfig;
use crate::anonymization::models::EntityType;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

const ID_PLACEHOLDER: &str = "{id}";

fn builtin_template(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Person => "PERSONNE_{id}",
        EntityType::Address => "ADRESSE_{id}",
        EntityType::Phone => "TEL_{id}",
        EntityType::Email => "email_{id}@anonyme.fr",
        EntityType::SocialSecurity => "NIR_{id}",
        EntityType::Organization => "ORGANISATION_{id}",
        EntityType::RegistrationNumber => "SIRET_{id}",
        EntityType::Other => "REFERENCE_{id}",
    }
}

/// Type → template registry producing stable default tokens
#[derive(Debug, Clone)]
pub struct TokenGenerator {
    templates: BTreeMap<EntityType, String>,
    hash_length: usize,
}

impl TokenGenerator {
    /// Create a generator from configuration overrides
    pub fn new(config: &TokenConfig) -> Self {
        let templates = EntityType::ALL
            .iter()
            .map(|entity_type| {
                let template = config
                    .templates
                    .get(entity_type)
                    .cloned()
                    .unwrap_or_else(|| builtin_template(*entity_type).to_string());
                (*entity_type, template)
            })
            .collect();

        Self {
            templates,
            hash_length: config.hash_length.clamp(4, 16),
        }
    }

    /// Default replacement for `text` of the given type
    pub fn default_for(&self, entity_type: EntityType, text: &str) -> String {
        let hash = self.short_hash(text);
        let template = self
            .templates
            .get(&entity_type)
            .map(String::as_str)
            .unwrap_or_else(|| builtin_template(entity_type));

        if template.contains(ID_PLACEHOLDER) {
            template.replace(ID_PLACEHOLDER, &hash)
        } else {
            format!("{template}_{hash}")
        }
    }

    /// Whether `token` is what `default_for` would produce for this entity
    pub fn is_default(&self, entity_type: EntityType, text: &str, token: &str) -> bool {
        self.default_for(entity_type, text) == token
    }

    fn short_hash(&self, text: &str) -> String {
        let digest = Sha256::digest(text.trim().to_lowercase().as_bytes());
        let hex = format!("{digest:X}");
        hex[..self.hash_length].to_string()
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new(&TokenConfig::default())
    }
}
