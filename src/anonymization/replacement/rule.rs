//! Replacement rules

use crate::anonymization::models::{CanonicalEntity, Span};
use crate::anonymization::scan::fold;
use crate::domain::{EntityId, GroupId, PseudonymError, Result};
use serde::Serialize;

/// One `original → replacement` substitution derived from a selected entity
///
/// Identity is the entity id: two rules with the same text but different
/// ids are distinct rules.
#[derive(Debug, Clone, Serialize)]
pub struct ReplacementRule {
    pub entity_id: EntityId,
    /// Trimmed original text, matched case-insensitively
    pub original: String,
    /// Inserted verbatim, casing included
    pub replacement: String,
    /// Character count of `original`
    pub priority: usize,
    pub is_grouped: bool,
    pub group_id: Option<GroupId>,
    /// Occurrences located in the current document
    #[serde(skip)]
    pub occurrence_spans: Vec<Span>,
}

impl ReplacementRule {
    /// Create an ungrouped rule
    pub fn new(
        entity_id: EntityId,
        original: impl AsRef<str>,
        replacement: impl Into<String>,
    ) -> Result<Self> {
        let original = original.as_ref().trim().to_string();
        if original.is_empty() {
            return Err(PseudonymError::Validation(format!(
                "Replacement rule for {entity_id} has an empty original text"
            )));
        }

        Ok(Self {
            entity_id,
            priority: original.chars().count(),
            original,
            replacement: replacement.into(),
            is_grouped: false,
            group_id: None,
            occurrence_spans: Vec::new(),
        })
    }

    /// Mark the rule as sharing its token with other entities
    pub fn grouped(mut self, group_id: Option<GroupId>) -> Self {
        self.is_grouped = true;
        self.group_id = group_id;
        self
    }

    /// Rule for a canonical entity, carrying its grouping flags
    pub fn from_entity(entity: &CanonicalEntity) -> Result<Self> {
        let rule = Self::new(entity.id.clone(), &entity.text, entity.replacement.clone())?;
        Ok(if entity.is_grouped {
            rule.grouped(entity.group_id.clone())
        } else {
            rule
        })
    }

    /// Whether either original is a case-insensitive substring of the other
    pub fn conflicts_with(&self, other: &ReplacementRule) -> bool {
        let mine = fold(&self.original);
        let theirs = fold(&other.original);
        mine.contains(&theirs) || theirs.contains(&mine)
    }
}

impl PartialEq for ReplacementRule {
    fn eq(&self, other: &Self) -> bool {
        self.entity_id == other.entity_id
    }
}

impl Eq for ReplacementRule {}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: &str) -> EntityId {
        EntityId::new(value).unwrap()
    }

    #[test]
    fn test_priority_is_char_count_of_trimmed_text() {
        let rule = ReplacementRule::new(id("a"), "  Éloïse ", "PERSONNE_A").unwrap();
        assert_eq!(rule.original, "Éloïse");
        assert_eq!(rule.priority, 6);
    }

    #[test]
    fn test_blank_original_is_rejected() {
        assert!(ReplacementRule::new(id("a"), "   ", "X").is_err());
    }

    #[test]
    fn test_identity_is_entity_id() {
        let a = ReplacementRule::new(id("a"), "Paris", "X").unwrap();
        let b = ReplacementRule::new(id("b"), "Paris", "X").unwrap();
        let a2 = ReplacementRule::new(id("a"), "Lyon", "Y").unwrap();
        assert_ne!(a, b);
        assert_eq!(a, a2);
    }

    #[test]
    fn test_containment_conflict_is_case_insensitive() {
        let short = ReplacementRule::new(id("a"), "paris", "X").unwrap();
        let long = ReplacementRule::new(id("b"), "PARIS Saint-Germain", "Y").unwrap();
        let other = ReplacementRule::new(id("c"), "rue de la Paix", "Z").unwrap();
        assert!(short.conflicts_with(&long));
        assert!(long.conflicts_with(&short));
        assert!(!short.conflicts_with(&other));
    }
}
