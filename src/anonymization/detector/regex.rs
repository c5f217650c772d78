//! Regex-based entity detector

use super::patterns::PatternRegistry;
use super::validators;
use super::{context_window, CandidateDetector};
use crate::anonymization::config::DetectionMode;
use crate::anonymization::models::{DetectionSource, EntityCandidate, Span};
use crate::domain::DetectionError;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Pattern registry detector with structural validation
pub struct RegexDetector {
    pattern_registry: Arc<PatternRegistry>,
}

impl RegexDetector {
    /// Create a new regex detector with default patterns
    pub fn new() -> Result<Self> {
        let registry = PatternRegistry::default_patterns()?;
        Ok(Self::with_registry(registry))
    }

    /// Create a new regex detector with custom pattern registry
    pub fn with_registry(registry: PatternRegistry) -> Self {
        Self {
            pattern_registry: Arc::new(registry),
        }
    }

    /// Run every pattern over `text`
    ///
    /// Matches failing their validator are kept with the lower confidence.
    pub fn detect_in_text(&self, text: &str) -> Vec<EntityCandidate> {
        let mut candidates = Vec::new();

        for pattern in self.pattern_registry.all_patterns() {
            for capture in pattern.regex.captures_iter(text) {
                let Some(matched) = capture.get(pattern.group) else {
                    continue;
                };
                let matched_text = matched.as_str().trim_end();
                if matched_text.trim().is_empty() {
                    continue;
                }
                let Ok(span) = Span::new(matched.start(), matched.start() + matched_text.len())
                else {
                    continue;
                };

                let validation = validators::validate(pattern.entity_type, matched_text);
                let confidence = validation.confidence(pattern.entity_type, pattern.confidence);
                if !validation.valid {
                    tracing::debug!(
                        pattern = %pattern.name,
                        entity_type = %pattern.entity_type,
                        "Match failed structural validation, kept with lower confidence"
                    );
                }

                if let Ok(candidate) = EntityCandidate::new(
                    matched_text,
                    span,
                    pattern.entity_type,
                    confidence,
                    DetectionSource::Pattern,
                ) {
                    candidates.push(candidate.with_context(context_window(text, span)));
                }
            }
        }

        candidates
    }
}

#[async_trait]
impl CandidateDetector for RegexDetector {
    fn name(&self) -> &str {
        "patterns"
    }

    fn source(&self) -> DetectionSource {
        DetectionSource::Pattern
    }

    async fn detect(
        &self,
        text: &str,
        _mode: DetectionMode,
    ) -> Result<Vec<EntityCandidate>, DetectionError> {
        Ok(self.detect_in_text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymization::models::EntityType;

    #[test]
    fn test_detect_email() {
        let detector = RegexDetector::new().unwrap();
        let candidates = detector.detect_in_text("Contact: jean.dupont@exemple.fr");

        let email = candidates
            .iter()
            .find(|c| c.entity_type() == EntityType::Email)
            .unwrap();
        assert_eq!(email.text(), "jean.dupont@exemple.fr");
        assert_eq!(email.confidence(), 0.95);
        assert!(email.context().starts_with("Contact:"));
    }

    #[test]
    fn test_registration_number_confidence_follows_checksum() {
        let detector = RegexDetector::new().unwrap();
        let valid = detector.detect_in_text("SIRET 73282932000074");
        let invalid = detector.detect_in_text("SIRET 73282932000047");

        let find = |candidates: &[EntityCandidate]| {
            candidates
                .iter()
                .find(|c| c.entity_type() == EntityType::RegistrationNumber)
                .map(|c| c.confidence())
        };
        assert_eq!(find(&valid), Some(0.98));
        assert_eq!(find(&invalid), Some(0.6));
    }

    #[test]
    fn test_spans_point_into_text() {
        let detector = RegexDetector::new().unwrap();
        let text = "Maître Élodie Lefèvre, 12 rue de la Paix 75002 Paris, tél. 01 23 45 67 89";
        let candidates = detector.detect_in_text(text);
        assert!(!candidates.is_empty());
        for candidate in &candidates {
            assert_eq!(candidate.span().slice(text), Some(candidate.text()));
        }
    }

    #[tokio::test]
    async fn test_trait_detect_never_fails() {
        let detector = RegexDetector::new().unwrap();
        let result = detector.detect("", DetectionMode::Standard).await.unwrap();
        assert!(result.is_empty());
    }
}
