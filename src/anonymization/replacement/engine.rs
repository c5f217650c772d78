//! Per-document replacement engine
//!
//! An engine is built for one document and consumed by [`ReplacementEngine::apply`].
//! The rewrite runs in fixed steps: locate every rule, drop rules whose
//! originals contain one another, locate the survivors again, flatten to one
//! record per occurrence, claim positions by descending priority, then
//! splice the accepted replacements in from the end of the text.

use super::report::{
    AppliedReplacement, RemovalReason, RemovedRule, ReplacementReport, RewriteResult, RuleReport,
};
use super::rule::ReplacementRule;
use crate::anonymization::models::{CanonicalEntity, Span};
use crate::anonymization::scan::{fold, LiteralScanner};
use crate::domain::{PseudonymError, Result};
use std::collections::HashSet;

/// One `(rule, occurrence)` pair competing for its positions
#[derive(Debug, Clone, Copy)]
struct PlannedReplacement {
    rule: usize,
    span: Span,
    priority: usize,
}

/// Rewrites one text with a set of replacement rules
#[derive(Debug, Default)]
pub struct ReplacementEngine {
    rules: Vec<ReplacementRule>,
}

impl ReplacementEngine {
    /// Create an empty engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine holding one rule per selected entity, in entity order
    pub fn from_entities<'a>(entities: impl IntoIterator<Item = &'a CanonicalEntity>) -> Result<Self> {
        let mut engine = Self::new();
        for entity in entities.into_iter().filter(|entity| entity.selected) {
            engine.add_rule(ReplacementRule::from_entity(entity)?)?;
        }
        Ok(engine)
    }

    /// Add a rule; a second rule for the same entity is rejected
    pub fn add_rule(&mut self, rule: ReplacementRule) -> Result<()> {
        if self.rules.contains(&rule) {
            return Err(PseudonymError::Validation(format!(
                "Duplicate replacement rule for entity {}",
                rule.entity_id
            )));
        }
        self.rules.push(rule);
        Ok(())
    }

    pub fn rules(&self) -> &[ReplacementRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Index pairs `(i, j)`, `i < j`, of rules whose originals contain one another
    pub fn detect_conflicts(&self) -> Vec<(usize, usize)> {
        let folded: Vec<String> = self.rules.iter().map(|rule| fold(&rule.original)).collect();
        let mut conflicts = Vec::new();

        for i in 0..folded.len() {
            for j in (i + 1)..folded.len() {
                if folded[i].contains(&folded[j]) || folded[j].contains(&folded[i]) {
                    conflicts.push((i, j));
                }
            }
        }

        conflicts
    }

    /// Loser of every conflicting pair; each loser is reported once
    fn resolve_conflicts(&self) -> Vec<(usize, RemovedRule)> {
        let mut removed: Vec<(usize, RemovedRule)> = Vec::new();
        let mut seen: HashSet<usize> = HashSet::new();

        for (i, j) in self.detect_conflicts() {
            let (a, b) = (&self.rules[i], &self.rules[j]);
            let (winner, loser, reason) = if a.priority != b.priority {
                if a.priority > b.priority {
                    (i, j, RemovalReason::ShorterText)
                } else {
                    (j, i, RemovalReason::ShorterText)
                }
            } else if a.is_grouped != b.is_grouped {
                if a.is_grouped {
                    (i, j, RemovalReason::Ungrouped)
                } else {
                    (j, i, RemovalReason::Ungrouped)
                }
            } else {
                (i, j, RemovalReason::InputOrder)
            };

            if seen.insert(loser) {
                tracing::debug!(
                    removed = %self.rules[loser].entity_id,
                    kept = %self.rules[winner].entity_id,
                    reason = ?reason,
                    "Conflicting replacement rule removed"
                );
                removed.push((
                    loser,
                    RemovedRule {
                        entity_id: self.rules[loser].entity_id.clone(),
                        original: self.rules[loser].original.clone(),
                        superseded_by: self.rules[winner].entity_id.clone(),
                        reason,
                    },
                ));
            }
        }

        removed
    }

    /// Rewrite `text`; fails without partial output if the plan is unsound
    pub fn apply(mut self, text: &str) -> Result<RewriteResult> {
        locate(&mut self.rules, text)?;

        let removed = self.resolve_conflicts();
        let removed_indices: HashSet<usize> = removed.iter().map(|(index, _)| *index).collect();
        let survivors: Vec<usize> = (0..self.rules.len())
            .filter(|index| !removed_indices.contains(index))
            .collect();

        for (index, rule) in self.rules.iter_mut().enumerate() {
            if removed_indices.contains(&index) {
                rule.occurrence_spans.clear();
            }
        }
        let mut surviving: Vec<ReplacementRule> =
            survivors.iter().map(|&index| self.rules[index].clone()).collect();
        locate(&mut surviving, text)?;
        for (rule, &index) in surviving.into_iter().zip(&survivors) {
            self.rules[index].occurrence_spans = rule.occurrence_spans;
        }

        let mut planned: Vec<PlannedReplacement> = survivors
            .iter()
            .flat_map(|&index| {
                let rule = &self.rules[index];
                rule.occurrence_spans.iter().map(move |&span| PlannedReplacement {
                    rule: index,
                    span,
                    priority: rule.priority,
                })
            })
            .collect();
        // Stable: equal priorities keep rule order, then document order.
        planned.sort_by(|a, b| b.priority.cmp(&a.priority));

        let accepted = claim_positions(&planned, text.len())?;
        verify_plan(&accepted, &self.rules, text)?;

        let mut applied = vec![0usize; self.rules.len()];
        let mut output = text.to_string();
        for planned in accepted.iter().rev() {
            let rule = &self.rules[planned.rule];
            output.replace_range(planned.span.start..planned.span.end, &rule.replacement);
            applied[planned.rule] += 1;
        }

        let replacements = accepted
            .iter()
            .map(|planned| AppliedReplacement {
                entity_id: self.rules[planned.rule].entity_id.clone(),
                span: planned.span,
                matched: text[planned.span.start..planned.span.end].to_string(),
                replacement: self.rules[planned.rule].replacement.clone(),
            })
            .collect();

        let report = ReplacementReport {
            total_rules: self.rules.len(),
            active_rules: applied.iter().filter(|count| **count > 0).count(),
            grouped_rules: self.rules.iter().filter(|rule| rule.is_grouped).count(),
            rules: self
                .rules
                .iter()
                .zip(&applied)
                .map(|(rule, &occurrences)| RuleReport {
                    entity_id: rule.entity_id.clone(),
                    original: rule.original.clone(),
                    replacement: rule.replacement.clone(),
                    occurrences,
                    priority: rule.priority,
                    is_grouped: rule.is_grouped,
                    group_id: rule.group_id.clone(),
                })
                .collect(),
            removed: removed.into_iter().map(|(_, removed)| removed).collect(),
        };

        tracing::debug!(
            total_rules = report.total_rules,
            active_rules = report.active_rules,
            removed_rules = report.removed.len(),
            replacements = report.total_replacements(),
            "Replacement plan applied"
        );

        Ok(RewriteResult {
            text: output,
            replacements,
            report,
        })
    }
}

/// Fill each rule's `occurrence_spans` with one multi-literal scan
fn locate(rules: &mut [ReplacementRule], text: &str) -> Result<()> {
    if rules.is_empty() {
        return Ok(());
    }
    let scanner = LiteralScanner::new(rules.iter().map(|rule| rule.original.as_str()))?;
    for (rule, spans) in rules.iter_mut().zip(scanner.find_all(text)) {
        rule.occurrence_spans = spans;
    }
    Ok(())
}

/// Accept planned replacements in order, skipping any touching a claimed byte.
///
/// Returns the accepted set sorted by start position.
fn claim_positions(planned: &[PlannedReplacement], text_len: usize) -> Result<Vec<PlannedReplacement>> {
    let mut claimed = vec![false; text_len];
    let mut accepted = Vec::new();

    for candidate in planned {
        let Some(positions) = claimed.get_mut(candidate.span.start..candidate.span.end) else {
            return Err(PseudonymError::RewriteIntegrity(format!(
                "Span {} exceeds text length {text_len}",
                candidate.span
            )));
        };
        if positions.iter().any(|taken| *taken) {
            continue;
        }
        positions.iter_mut().for_each(|taken| *taken = true);
        accepted.push(*candidate);
    }

    accepted.sort_by_key(|planned| planned.span.start);
    Ok(accepted)
}

/// Final checks on the sorted accepted set before any text is produced
fn verify_plan(accepted: &[PlannedReplacement], rules: &[ReplacementRule], text: &str) -> Result<()> {
    for pair in accepted.windows(2) {
        if pair[0].span.overlaps(&pair[1].span) {
            return Err(PseudonymError::RewriteIntegrity(format!(
                "Accepted replacements overlap at {} and {}",
                pair[0].span, pair[1].span
            )));
        }
    }

    for planned in accepted {
        let span = planned.span;
        let Some(matched) = span.slice(text) else {
            return Err(PseudonymError::RewriteIntegrity(format!(
                "Span {span} is out of bounds or splits a character"
            )));
        };
        if fold(matched) != fold(&rules[planned.rule].original) {
            return Err(PseudonymError::RewriteIntegrity(format!(
                "Span {span} does not match rule {}",
                rules[planned.rule].entity_id
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntityId;

    fn rule(id: &str, original: &str, replacement: &str) -> ReplacementRule {
        ReplacementRule::new(EntityId::new(id).unwrap(), original, replacement).unwrap()
    }

    fn engine(rules: Vec<ReplacementRule>) -> ReplacementEngine {
        let mut engine = ReplacementEngine::new();
        for rule in rules {
            engine.add_rule(rule).unwrap();
        }
        engine
    }

    #[test]
    fn test_replaces_every_case_insensitive_occurrence() {
        let result = engine(vec![rule("a", "Jean Dupont", "PERSONNE_A")])
            .apply("Contact Jean Dupont and M. jean dupont")
            .unwrap();

        assert_eq!(result.text, "Contact PERSONNE_A and M. PERSONNE_A");
        assert_eq!(result.report.rules[0].occurrences, 2);
        assert_eq!(result.report.active_rules, 1);
    }

    #[test]
    fn test_address_replacement_leaves_unrelated_words_and_city_alone() {
        let result = engine(vec![
            rule("address", "12 rue de la Paix", "ADRESSE_1"),
            rule("city", "Paris", "VILLE_1"),
        ])
        .apply("Domicilié 12 rue de la Paix à Paris. Paris est la capitale; la Paix règne.")
        .unwrap();

        assert_eq!(
            result.text,
            "Domicilié ADRESSE_1 à VILLE_1. VILLE_1 est la capitale; la Paix règne."
        );
        assert!(result.report.removed.is_empty());
        assert_eq!(result.report.rules[0].occurrences, 1);
        assert_eq!(result.report.rules[1].occurrences, 2);
    }

    #[test]
    fn test_duplicate_entity_rule_is_rejected() {
        let mut engine = ReplacementEngine::new();
        engine.add_rule(rule("a", "Paris", "X")).unwrap();
        assert!(engine.add_rule(rule("a", "Lyon", "Y")).is_err());
    }

    #[test]
    fn test_longer_rule_wins_and_shorter_is_removed() {
        let result = engine(vec![
            rule("city", "Paris", "VILLE_1"),
            rule("club", "Paris Saint-Germain", "ORGANISATION_1"),
        ])
        .apply("Le Paris Saint-Germain joue à Paris.")
        .unwrap();

        assert_eq!(result.text, "Le ORGANISATION_1 joue à Paris.");
        assert_eq!(result.report.removed.len(), 1);
        assert_eq!(result.report.removed[0].original, "Paris");
        assert_eq!(result.report.removed[0].reason, RemovalReason::ShorterText);
        assert_eq!(result.report.rules[0].occurrences, 0);
    }

    #[test]
    fn test_grouped_rule_wins_equal_length_tie() {
        let grouped = rule("b", "DUPONT", "PERSONNE_G").grouped(None);
        let result = engine(vec![rule("a", "Dupont", "PERSONNE_A"), grouped])
            .apply("M. Dupont")
            .unwrap();

        assert_eq!(result.text, "M. PERSONNE_G");
        assert_eq!(result.report.removed[0].reason, RemovalReason::Ungrouped);
    }

    #[test]
    fn test_full_tie_removes_later_rule() {
        let result = engine(vec![rule("a", "Dupont", "FIRST"), rule("b", "dupont", "SECOND")])
            .apply("Dupont")
            .unwrap();

        assert_eq!(result.text, "FIRST");
        assert_eq!(result.report.removed[0].entity_id.as_str(), "b");
        assert_eq!(result.report.removed[0].reason, RemovalReason::InputOrder);
    }

    #[test]
    fn test_positional_overlap_between_survivors_is_claimed_once() {
        // No containment, but "Jean Marc" and "Marc Dupont" overlap in "Jean Marc Dupont".
        let result = engine(vec![rule("a", "Jean Marc", "P1"), rule("b", "Marc Dupont", "P2")])
            .apply("Jean Marc Dupont et Marc Dupont")
            .unwrap();

        assert_eq!(result.text, "Jean P2 et P2");
        for pair in result.replacements.windows(2) {
            assert!(!pair[0].span.overlaps(&pair[1].span));
        }
    }

    #[test]
    fn test_replacement_casing_is_preserved() {
        let result = engine(vec![rule("a", "PARIS", "Ville_x")])
            .apply("paris, Paris, PARIS")
            .unwrap();
        assert_eq!(result.text, "Ville_x, Ville_x, Ville_x");
    }

    #[test]
    fn test_multibyte_text_is_spliced_on_boundaries() {
        let result = engine(vec![rule("a", "Élodie Lefèvre", "PERSONNE_E")])
            .apply("Maître ÉLODIE LEFÈVRE, née à Orléans")
            .unwrap();
        assert_eq!(result.text, "Maître PERSONNE_E, née à Orléans");
        assert_eq!(result.replacements[0].matched, "ÉLODIE LEFÈVRE");
    }

    #[test]
    fn test_empty_engine_returns_text_unchanged() {
        let result = ReplacementEngine::new().apply("Rien à remplacer").unwrap();
        assert_eq!(result.text, "Rien à remplacer");
        assert_eq!(result.report.total_rules, 0);
    }

    #[test]
    fn test_out_of_bounds_plan_is_an_integrity_failure() {
        let planned = [PlannedReplacement {
            rule: 0,
            span: Span::new(2, 40).unwrap(),
            priority: 5,
        }];
        let err = claim_positions(&planned, 10).unwrap_err();
        assert!(err.is_integrity_failure());
    }

    #[test]
    fn test_mismatched_span_is_an_integrity_failure() {
        let rules = vec![rule("a", "Paris", "X")];
        let planned = [PlannedReplacement {
            rule: 0,
            span: Span::new(0, 5).unwrap(),
            priority: 5,
        }];
        let err = verify_plan(&planned, &rules, "Lyon et Paris").unwrap_err();
        assert!(err.is_integrity_failure());
    }
}
