//! Block-structured documents
//!
//! A document is rewritten block by block. Every block gets its own
//! replacement pass, and nothing is written back until all blocks have
//! been rewritten successfully.

use crate::anonymization::grouping::EntityManager;
use crate::anonymization::replacement::RewriteResult;
use crate::domain::{PseudonymError, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

fn blank_lines() -> &'static Regex {
    static BLANK_LINES: OnceLock<Regex> = OnceLock::new();
    BLANK_LINES.get_or_init(|| Regex::new(r"\r?\n[ \t]*(?:\r?\n[ \t]*)+").expect("static regex"))
}

/// One editable unit of text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub id: usize,
    pub text: String,
}

/// A document exposing its text as independently editable blocks
pub trait BlockDocument {
    /// Blocks in reading order
    fn blocks(&self) -> Vec<TextBlock>;

    /// Replace the text of block `id`
    fn replace_block_text(&mut self, id: usize, text: &str) -> Result<()>;
}

/// Plain text split into paragraphs on blank lines.
///
/// Separators are kept verbatim so that [`PlainTextDocument::to_text`]
/// reproduces the input exactly when no block was changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlainTextDocument {
    blocks: Vec<String>,
    /// `separators[i]` follows `blocks[i]`; one fewer than blocks
    separators: Vec<String>,
    leading: String,
    trailing: String,
}

impl PlainTextDocument {
    pub fn parse(text: &str) -> Self {
        let mut document = Self::default();
        let mut cursor = 0;

        for separator in blank_lines().find_iter(text) {
            let block = &text[cursor..separator.start()];
            if block.trim().is_empty() && document.blocks.is_empty() {
                document.leading.push_str(&text[cursor..separator.end()]);
            } else {
                document.blocks.push(block.to_string());
                document.separators.push(separator.as_str().to_string());
            }
            cursor = separator.end();
        }

        let tail = &text[cursor..];
        if tail.trim().is_empty() {
            // A trailing separator belongs to the end of the document
            if let Some(separator) = document.separators.pop() {
                document.trailing = separator;
            }
            document.trailing.push_str(tail);
        } else {
            document.blocks.push(tail.to_string());
        }

        document
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Reassemble the document
    pub fn to_text(&self) -> String {
        let mut text = self.leading.clone();
        for (i, block) in self.blocks.iter().enumerate() {
            text.push_str(block);
            if let Some(separator) = self.separators.get(i) {
                text.push_str(separator);
            }
        }
        text.push_str(&self.trailing);
        text
    }
}

impl BlockDocument for PlainTextDocument {
    fn blocks(&self) -> Vec<TextBlock> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(id, text)| TextBlock {
                id,
                text: text.clone(),
            })
            .collect()
    }

    fn replace_block_text(&mut self, id: usize, text: &str) -> Result<()> {
        let block = self
            .blocks
            .get_mut(id)
            .ok_or_else(|| PseudonymError::NotFound(format!("block {id}")))?;
        *block = text.to_string();
        Ok(())
    }
}

/// Outcome of rewriting every block of a document
#[derive(Debug, Default)]
pub struct DocumentRewrite {
    /// Per-block results, for blocks whose text changed
    pub blocks: Vec<(usize, RewriteResult)>,
    pub blocks_total: usize,
}

impl DocumentRewrite {
    pub fn blocks_changed(&self) -> usize {
        self.blocks.len()
    }

    pub fn total_replacements(&self) -> usize {
        self.blocks
            .iter()
            .map(|(_, result)| result.replacements.len())
            .sum()
    }

    /// Applied replacement counts per token, summed over blocks
    pub fn counts_by_token(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for (_, result) in &self.blocks {
            for applied in &result.replacements {
                *counts.entry(applied.replacement.clone()).or_insert(0) += 1;
            }
        }
        counts
    }
}

/// Rewrite every block of `document` with the manager's selected rules.
///
/// All blocks are rewritten first. If any block fails, the error is
/// returned and the document is left untouched.
pub fn rewrite_blocks(
    manager: &EntityManager,
    document: &mut dyn BlockDocument,
) -> Result<DocumentRewrite> {
    let rewrite = plan_blocks(manager, document)?;
    write_back(document, &rewrite)?;
    Ok(rewrite)
}

/// Rewrite every block in memory without touching `document`
pub fn plan_blocks(manager: &EntityManager, document: &dyn BlockDocument) -> Result<DocumentRewrite> {
    let blocks = document.blocks();
    let mut rewrite = DocumentRewrite {
        blocks: Vec::new(),
        blocks_total: blocks.len(),
    };

    for block in &blocks {
        let result = manager.rewrite_text(&block.text).map_err(|e| {
            tracing::error!(block = block.id, error = %e, "Block rewrite failed");
            e
        })?;
        if result.text != block.text {
            rewrite.blocks.push((block.id, result));
        }
    }

    Ok(rewrite)
}

/// Store the changed blocks of a planned rewrite into `document`
pub fn write_back(document: &mut dyn BlockDocument, rewrite: &DocumentRewrite) -> Result<()> {
    for (id, result) in &rewrite.blocks {
        document.replace_block_text(*id, &result.text)?;
    }

    tracing::debug!(
        blocks = rewrite.blocks_total,
        changed = rewrite.blocks_changed(),
        "Document rewritten"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymization::models::{CanonicalEntity, DetectionSource, EntityType, Span};
    use crate::anonymization::tokens::TokenGenerator;
    use crate::domain::EntityId;

    const TEXT: &str = "Contact Jean Dupont.\n\n  \nSecond block for Jean Dupont.\n\nNothing here.\n";

    fn manager() -> EntityManager {
        let mut entity = CanonicalEntity::new(
            EntityId::from_key("jean dupont"),
            "Jean Dupont",
            EntityType::Person,
            Span::new(8, 19).unwrap(),
            DetectionSource::Pattern,
        )
        .unwrap();
        entity.replacement = "PERSONNE_A".to_string();
        EntityManager::new(TEXT, vec![entity], TokenGenerator::default())
    }

    /// Refuses every write
    struct RejectingDocument(PlainTextDocument);

    impl BlockDocument for RejectingDocument {
        fn blocks(&self) -> Vec<TextBlock> {
            self.0.blocks()
        }

        fn replace_block_text(&mut self, id: usize, _text: &str) -> Result<()> {
            Err(PseudonymError::Validation(format!("block {id} is read-only")))
        }
    }

    #[test]
    fn test_parse_preserves_separators() {
        let document = PlainTextDocument::parse(TEXT);
        assert_eq!(document.len(), 3);
        assert_eq!(document.to_text(), TEXT);

        let blocks = document.blocks();
        assert_eq!(blocks[0].text, "Contact Jean Dupont.");
        assert_eq!(blocks[2].text, "Nothing here.\n");
    }

    #[test]
    fn test_parse_leading_and_trailing_blank_lines() {
        let text = "\n\nOnly block\n\n\n";
        let document = PlainTextDocument::parse(text);
        assert_eq!(document.len(), 1);
        assert_eq!(document.blocks()[0].text, "Only block");
        assert_eq!(document.to_text(), text);

        assert!(PlainTextDocument::parse("").is_empty());
    }

    #[test]
    fn test_rewrite_blocks_changes_only_matching_blocks() {
        let manager = manager();
        let mut document = PlainTextDocument::parse(TEXT);

        let rewrite = rewrite_blocks(&manager, &mut document).unwrap();
        assert_eq!(rewrite.blocks_total, 3);
        assert_eq!(rewrite.blocks_changed(), 2);
        assert_eq!(rewrite.total_replacements(), 2);
        assert_eq!(rewrite.counts_by_token().get("PERSONNE_A"), Some(&2));
        assert_eq!(
            document.to_text(),
            "Contact PERSONNE_A.\n\n  \nSecond block for PERSONNE_A.\n\nNothing here.\n"
        );
    }

    #[test]
    fn test_replace_unknown_block() {
        let mut document = PlainTextDocument::parse("one");
        assert!(matches!(
            document.replace_block_text(4, "x"),
            Err(PseudonymError::NotFound(_))
        ));
    }

    #[test]
    fn test_write_failure_is_reported() {
        let manager = manager();
        let mut document = RejectingDocument(PlainTextDocument::parse(TEXT));
        assert!(rewrite_blocks(&manager, &mut document).is_err());
        assert_eq!(document.0.to_text(), TEXT);
    }
}
