//! Case-insensitive multi-literal scanning
//!
//! One Aho-Corasick automaton is built over every literal, and the document
//! is scanned once. Case folding is done on a copy of the text that keeps a
//! map back to the original byte offsets, so reported spans always point
//! into the caller's text on character boundaries.

use crate::anonymization::models::Span;
use crate::domain::{PseudonymError, Result};
use aho_corasick::{AhoCorasick, MatchKind};

/// Lowercased copy of a text with a map back to original offsets
struct FoldedText {
    folded: String,
    /// For each folded byte index (plus the end), the original offset if a
    /// source character starts there.
    boundaries: Vec<Option<usize>>,
}

impl FoldedText {
    fn new(text: &str) -> Self {
        let mut folded = String::with_capacity(text.len());
        let mut boundaries = Vec::with_capacity(text.len() + 1);

        for (offset, ch) in text.char_indices() {
            boundaries.push(Some(offset));
            folded.extend(ch.to_lowercase());
            boundaries.resize(folded.len(), None);
        }
        boundaries.push(Some(text.len()));

        Self { folded, boundaries }
    }

    /// Map a folded match back to the original text.
    ///
    /// Matches starting or ending inside a multi-character expansion
    /// (e.g. `İ` folding to two chars) have no original counterpart.
    fn original_span(&self, start: usize, end: usize) -> Option<Span> {
        let start = (*self.boundaries.get(start)?)?;
        let end = (*self.boundaries.get(end)?)?;
        Span::new(start, end).ok()
    }
}

/// Per-character lowercase, the folding every literal comparison uses
pub fn fold(literal: &str) -> String {
    literal.chars().flat_map(char::to_lowercase).collect()
}

/// Finds every case-insensitive occurrence of a fixed set of literals
pub struct LiteralScanner {
    automaton: AhoCorasick,
    literal_count: usize,
}

impl LiteralScanner {
    /// Build a scanner over `literals`; blank literals are rejected
    pub fn new<I, S>(literals: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let folded: Vec<String> = literals
            .into_iter()
            .map(|literal| fold(literal.as_ref()))
            .collect();

        if let Some(index) = folded.iter().position(|literal| literal.is_empty()) {
            return Err(PseudonymError::Validation(format!(
                "Cannot scan for an empty literal (index {index})"
            )));
        }

        let automaton = AhoCorasick::builder()
            .match_kind(MatchKind::Standard)
            .build(&folded)
            .map_err(|e| PseudonymError::Other(format!("Failed to build literal scanner: {e}")))?;

        Ok(Self {
            automaton,
            literal_count: folded.len(),
        })
    }

    /// Occurrences of each literal, indexed like the input literals.
    ///
    /// Occurrences of one literal never overlap each other (leftmost first,
    /// scanning resumes after each hit); occurrences of different literals
    /// may overlap.
    pub fn find_all(&self, text: &str) -> Vec<Vec<Span>> {
        let mut found: Vec<Vec<Span>> = vec![Vec::new(); self.literal_count];
        if self.literal_count == 0 || text.is_empty() {
            return found;
        }

        let folded = FoldedText::new(text);
        let mut resume_at = vec![0usize; self.literal_count];

        for hit in self.automaton.find_overlapping_iter(&folded.folded) {
            let Some(span) = folded.original_span(hit.start(), hit.end()) else {
                continue;
            };
            let index = hit.pattern().as_usize();
            if span.start < resume_at[index] {
                continue;
            }
            resume_at[index] = span.end;
            found[index].push(span);
        }

        found
    }

    pub fn literal_count(&self) -> usize {
        self.literal_count
    }
}

/// Occurrences of a single literal
pub fn find_literal(text: &str, literal: &str) -> Vec<Span> {
    match LiteralScanner::new([literal]) {
        Ok(scanner) => scanner.find_all(text).pop().unwrap_or_default(),
        Err(_) => Vec::new(),
    }
}
