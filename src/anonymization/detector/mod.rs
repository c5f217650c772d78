//! Entity detection module
//!
//! Every detection strategy implements [`CandidateDetector`]. The
//! [`DetectorChain`] runs them one after the other in a fixed order and
//! turns failures into diagnostics, so an analysis never fails because a
//! detector did.

pub mod chunking;
pub mod external;
pub mod patterns;
pub mod regex;
pub mod statistical;
pub mod validators;

use crate::anonymization::config::DetectionMode;
use crate::anonymization::models::{DetectionSource, EntityCandidate, Span};
use crate::domain::DetectionError;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Instant;

/// Characters of context kept on each side of a match
pub const CONTEXT_RADIUS: usize = 50;

/// Trait for entity detection implementations
#[async_trait]
pub trait CandidateDetector: Send + Sync {
    /// Short identifier used in logs and diagnostics
    fn name(&self) -> &str;

    /// Detector tier, used for mode filtering and aggregation priority
    fn source(&self) -> DetectionSource;

    /// Detect candidates in `text`; spans are relative to `text`
    async fn detect(
        &self,
        text: &str,
        mode: DetectionMode,
    ) -> Result<Vec<EntityCandidate>, DetectionError>;
}

/// Non-fatal record of a detector that could not complete
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionDiagnostic {
    pub detector: String,
    pub source: DetectionSource,
    pub message: String,
}

/// Output of one pass over all detectors
#[derive(Debug, Default)]
pub struct DetectionOutcome {
    /// Candidates in detector order, then in each detector's emission order
    pub candidates: Vec<EntityCandidate>,
    pub diagnostics: Vec<DetectionDiagnostic>,
}

/// Detectors in their fixed execution order
#[derive(Default)]
pub struct DetectorChain {
    detectors: Vec<Box<dyn CandidateDetector>>,
}

impl DetectorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a detector; detectors run in insertion order
    pub fn with(mut self, detector: Box<dyn CandidateDetector>) -> Self {
        self.detectors.push(detector);
        self
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Names of the detectors that run in `mode`
    pub fn active_names(&self, mode: DetectionMode) -> Vec<&str> {
        self.detectors
            .iter()
            .filter(|d| mode.includes(d.source()))
            .map(|d| d.name())
            .collect()
    }

    /// Run every detector enabled by `mode`, sequentially
    pub async fn run(&self, text: &str, mode: DetectionMode) -> DetectionOutcome {
        let mut outcome = DetectionOutcome::default();

        for detector in self.detectors.iter().filter(|d| mode.includes(d.source())) {
            let started = Instant::now();
            match detector.detect(text, mode).await {
                Ok(candidates) => {
                    tracing::debug!(
                        detector = detector.name(),
                        candidates = candidates.len(),
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Detector completed"
                    );
                    outcome.candidates.extend(candidates);
                }
                Err(e) => {
                    tracing::warn!(
                        detector = detector.name(),
                        error = %e,
                        "Detector failed, continuing without its candidates"
                    );
                    outcome.diagnostics.push(DetectionDiagnostic {
                        detector: detector.name().to_string(),
                        source: detector.source(),
                        message: e.to_string(),
                    });
                }
            }
        }

        outcome
    }
}

/// Up to [`CONTEXT_RADIUS`] characters around `span`, trimmed
pub fn context_window(text: &str, span: Span) -> String {
    let before: usize = text[..span.start.min(text.len())]
        .chars()
        .rev()
        .take(CONTEXT_RADIUS)
        .map(char::len_utf8)
        .sum();
    let after: usize = text[span.end.min(text.len())..]
        .chars()
        .take(CONTEXT_RADIUS)
        .map(char::len_utf8)
        .sum();

    let start = span.start.min(text.len()) - before;
    let end = span.end.min(text.len()) + after;
    text[start..end].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymization::models::EntityType;

    struct FixedDetector {
        source: DetectionSource,
        word: &'static str,
    }

    #[async_trait]
    impl CandidateDetector for FixedDetector {
        fn name(&self) -> &str {
            self.word
        }

        fn source(&self) -> DetectionSource {
            self.source
        }

        async fn detect(
            &self,
            text: &str,
            _mode: DetectionMode,
        ) -> Result<Vec<EntityCandidate>, DetectionError> {
            let start = text
                .find(self.word)
                .ok_or_else(|| DetectionError::Internal("word not found".into()))?;
            let span = Span::new(start, start + self.word.len()).unwrap();
            Ok(vec![EntityCandidate::new(
                self.word,
                span,
                EntityType::Person,
                0.7,
                self.source,
            )
            .unwrap()])
        }
    }

    fn chain() -> DetectorChain {
        DetectorChain::new()
            .with(Box::new(FixedDetector {
                source: DetectionSource::Pattern,
                word: "Alice",
            }))
            .with(Box::new(FixedDetector {
                source: DetectionSource::Statistical,
                word: "Bob",
            }))
            .with(Box::new(FixedDetector {
                source: DetectionSource::ExternalService,
                word: "Carol",
            }))
    }

    #[tokio::test]
    async fn test_failures_become_diagnostics() {
        let outcome = chain().run("Alice et Bob", DetectionMode::Deep).await;

        let texts: Vec<&str> = outcome.candidates.iter().map(|c| c.text()).collect();
        assert_eq!(texts, vec!["Alice", "Bob"]);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].detector, "Carol");
        assert_eq!(outcome.diagnostics[0].source, DetectionSource::ExternalService);
    }

    #[tokio::test]
    async fn test_mode_filters_detectors() {
        let outcome = chain().run("Alice Bob Carol", DetectionMode::Patterns).await;
        assert_eq!(outcome.candidates.len(), 1);
        assert!(outcome.diagnostics.is_empty());

        assert_eq!(chain().active_names(DetectionMode::Standard), vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_context_window_respects_char_boundaries() {
        let text = format!("{}Jean Dupont{}", "é".repeat(60), "à".repeat(60));
        let start = "é".repeat(60).len();
        let span = Span::new(start, start + "Jean Dupont".len()).unwrap();
        let context = context_window(&text, span);
        assert_eq!(context.chars().count(), 50 + 11 + 50);
        assert!(context.contains("Jean Dupont"));
    }
}
