//! Candidate aggregation
//!
//! Collapses the output of every detector into one canonical entity per
//! distinct normalized text. Deduplication is global by text, not by span:
//! occurrences and the representative span are recomputed over the whole
//! document, so the result does not depend on which chunk a detector saw.

use crate::anonymization::detector::validators;
use crate::anonymization::models::{normalize_key, CanonicalEntity, EntityCandidate};
use crate::anonymization::scan::LiteralScanner;
use crate::anonymization::tokens::TokenGenerator;
use crate::domain::{EntityId, Result};
use std::collections::HashMap;

/// Winner selection weight of a candidate within its text group
///
/// `2 × source priority + confidence + chars / 100`
pub fn score(candidate: &EntityCandidate) -> f32 {
    2.0 * f32::from(candidate.source().priority())
        + candidate.confidence()
        + candidate.text().trim().chars().count() as f32 / 100.0
}

/// Builds canonical entities from raw candidates
#[derive(Debug, Clone, Default)]
pub struct CandidateAggregator {
    tokens: TokenGenerator,
}

impl CandidateAggregator {
    pub fn new(tokens: TokenGenerator) -> Self {
        Self { tokens }
    }

    /// Deduplicate `candidates` against `document`
    ///
    /// Entities come out in first-seen order of their text. Running this
    /// twice on the same input yields the same entities, ids included.
    pub fn aggregate(
        &self,
        document: &str,
        candidates: &[EntityCandidate],
    ) -> Result<Vec<CanonicalEntity>> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut winners: Vec<(String, &EntityCandidate, usize)> = Vec::new();

        for candidate in candidates {
            let key = normalize_key(candidate.text());
            if key.is_empty() {
                continue;
            }
            match index.get(&key) {
                Some(&slot) => {
                    let (_, current, merged) = &mut winners[slot];
                    *merged += 1;
                    // Strictly greater: on a tie the first-seen candidate stays.
                    if score(candidate) > score(current) {
                        *current = candidate;
                    }
                }
                None => {
                    index.insert(key.clone(), winners.len());
                    winners.push((key, candidate, 1));
                }
            }
        }

        if winners.is_empty() {
            return Ok(Vec::new());
        }

        let scanner = LiteralScanner::new(winners.iter().map(|(_, c, _)| c.text().trim()))?;
        let occurrences = scanner.find_all(document);

        let mut entities = Vec::with_capacity(winners.len());
        for ((key, winner, merged), spans) in winners.into_iter().zip(occurrences) {
            let text = winner.text().trim();
            let span = spans.first().copied().unwrap_or_else(|| winner.span());
            let validation = validators::validate(winner.entity_type(), text);

            let mut entity = CanonicalEntity::new(
                EntityId::from_key(&key),
                text,
                winner.entity_type(),
                span,
                winner.source(),
            )?;
            entity.occurrences = spans.len();
            entity.confidence = winner.confidence();
            entity.valid = validation.valid;
            entity.subtype = validation.subtype.map(str::to_string);
            entity.replacement = self.tokens.default_for(winner.entity_type(), text);

            tracing::trace!(
                entity_id = %entity.id,
                entity_type = %entity.entity_type,
                source = %entity.source,
                merged,
                occurrences = entity.occurrences,
                "Canonical entity built"
            );
            entities.push(entity);
        }

        tracing::debug!(
            candidates = candidates.len(),
            entities = entities.len(),
            "Candidates aggregated"
        );
        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymization::models::{DetectionSource, EntityType, Span};

    fn candidate(
        document: &str,
        text: &str,
        entity_type: EntityType,
        confidence: f32,
        source: DetectionSource,
    ) -> EntityCandidate {
        let start = document.find(text).unwrap_or(0);
        EntityCandidate::new(
            text,
            Span::new(start, start + text.len()).unwrap(),
            entity_type,
            confidence,
            source,
        )
        .unwrap()
    }

    #[test]
    fn test_pattern_source_beats_higher_confidence_statistical() {
        let document = "Maître Jean Dupont plaide.";
        let candidates = vec![
            candidate(document, "Jean Dupont", EntityType::Organization, 0.99, DetectionSource::Statistical),
            candidate(document, "jean dupont", EntityType::Person, 0.5, DetectionSource::Pattern),
        ];
        let entities = CandidateAggregator::default().aggregate(document, &candidates).unwrap();

        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].entity_type, EntityType::Person);
        assert_eq!(entities[0].source, DetectionSource::Pattern);
    }

    #[test]
    fn test_tie_keeps_first_seen() {
        let document = "Jean Dupont";
        let candidates = vec![
            candidate(document, "Jean Dupont", EntityType::Person, 0.7, DetectionSource::Statistical),
            candidate(document, "Jean Dupont", EntityType::Organization, 0.7, DetectionSource::Statistical),
        ];
        let entities = CandidateAggregator::default().aggregate(document, &candidates).unwrap();
        assert_eq!(entities[0].entity_type, EntityType::Person);
    }

    #[test]
    fn test_occurrences_are_recomputed_over_document() {
        let document = "Contact Jean Dupont and M. JEAN DUPONT";
        let candidates = vec![candidate(
            document,
            "Jean Dupont",
            EntityType::Person,
            0.8,
            DetectionSource::Statistical,
        )];
        let entities = CandidateAggregator::default().aggregate(document, &candidates).unwrap();

        assert_eq!(entities[0].occurrences, 2);
        assert_eq!(entities[0].span.slice(document), Some("Jean Dupont"));
        assert!(entities[0].replacement.starts_with("PERSONNE_"));
    }

    #[test]
    fn test_registration_validity_is_recomputed() {
        let document = "SIRET 73282932000047";
        let candidates = vec![candidate(
            document,
            "73282932000047",
            EntityType::RegistrationNumber,
            0.98,
            DetectionSource::Pattern,
        )];
        let entities = CandidateAggregator::default().aggregate(document, &candidates).unwrap();
        assert!(!entities[0].valid);
        assert_eq!(entities[0].subtype.as_deref(), Some("SIRET"));
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let document = "Maître Jean Dupont, ACME SAS, Paris. Jean Dupont signe.";
        let candidates = vec![
            candidate(document, "Jean Dupont", EntityType::Person, 0.85, DetectionSource::Statistical),
            candidate(document, "ACME SAS", EntityType::Organization, 0.8, DetectionSource::Pattern),
            candidate(document, "Paris", EntityType::Address, 0.55, DetectionSource::Statistical),
            candidate(document, "JEAN DUPONT", EntityType::Person, 0.85, DetectionSource::ExternalService),
        ];
        let aggregator = CandidateAggregator::default();
        let first = aggregator.aggregate(document, &candidates).unwrap();
        let second = aggregator.aggregate(document, &candidates).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_unlocated_text_keeps_detector_span() {
        let document = "Rien ici";
        let fallback = EntityCandidate::new(
            "Inconnu",
            Span::new(0, 4).unwrap(),
            EntityType::Person,
            0.5,
            DetectionSource::ExternalService,
        )
        .unwrap();
        let entities = CandidateAggregator::default().aggregate(document, &[fallback]).unwrap();
        assert_eq!(entities[0].occurrences, 0);
        assert_eq!(entities[0].span, Span::new(0, 4).unwrap());
    }
}
