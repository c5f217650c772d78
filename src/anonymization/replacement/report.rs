//! Replacement reporting

use crate::anonymization::models::Span;
use crate::domain::{EntityId, GroupId};
use serde::Serialize;
use std::collections::BTreeMap;

/// Why a rule was removed during conflict resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// The other rule's original text is longer
    ShorterText,
    /// Same length, the other rule is grouped
    Ungrouped,
    /// Same length and grouping flag; the later rule in input order loses
    InputOrder,
}

/// A rule dropped because it conflicted with another one
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemovedRule {
    pub entity_id: EntityId,
    pub original: String,
    pub superseded_by: EntityId,
    pub reason: RemovalReason,
}

/// Audit line for one rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleReport {
    pub entity_id: EntityId,
    pub original: String,
    pub replacement: String,
    /// Replacements actually applied
    pub occurrences: usize,
    pub priority: usize,
    pub is_grouped: bool,
    pub group_id: Option<GroupId>,
}

/// Summary of one rewrite
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplacementReport {
    pub total_rules: usize,
    /// Rules that replaced at least one occurrence
    pub active_rules: usize,
    pub grouped_rules: usize,
    /// Every input rule, in input order
    pub rules: Vec<RuleReport>,
    pub removed: Vec<RemovedRule>,
}

impl ReplacementReport {
    /// Applied replacements per original text
    pub fn applied_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for rule in &self.rules {
            *counts.entry(rule.original.clone()).or_insert(0) += rule.occurrences;
        }
        counts
    }

    pub fn total_replacements(&self) -> usize {
        self.rules.iter().map(|rule| rule.occurrences).sum()
    }

    /// Report entry for `entity_id`; removed rules report zero occurrences
    pub fn rule(&self, entity_id: &EntityId) -> Option<&RuleReport> {
        self.rules.iter().find(|rule| &rule.entity_id == entity_id)
    }
}

/// One substitution that made it into the output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedReplacement {
    pub entity_id: EntityId,
    /// Span in the input text
    pub span: Span,
    /// Input text at `span`, original casing
    pub matched: String,
    pub replacement: String,
}

/// Output of [`super::ReplacementEngine::apply`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewriteResult {
    pub text: String,
    /// Accepted substitutions, ordered by start position
    pub replacements: Vec<AppliedReplacement>,
    pub report: ReplacementReport,
}
