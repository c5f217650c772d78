//! Text chunking for size-limited detectors
//!
//! Chunks are slices of the original document: paragraphs first, sentences
//! when a paragraph is too long, and a hard split as the last resort. Each
//! chunk after the first starts `overlap` characters before the end of the
//! previous one so an entity straddling a boundary is seen whole at least once.

use regex::Regex;
use std::ops::Range;

/// A slice of the document handed to a detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub index: usize,
    /// Byte offset of `text` in the document
    pub offset: usize,
    pub text: &'a str,
}

/// Splits text into overlapping chunks of bounded size
#[derive(Debug, Clone)]
pub struct TextChunker {
    max_chars: usize,
    overlap: usize,
    paragraph_break: Regex,
    sentence_end: Regex,
}

impl TextChunker {
    /// `overlap` is clamped below `max_chars`; chunks never exceed `max_chars`
    pub fn new(max_chars: usize, overlap: usize) -> Self {
        let max_chars = max_chars.max(2);
        Self {
            max_chars,
            overlap: overlap.min(max_chars / 2),
            paragraph_break: Regex::new(r"\n[ \t\r]*\n\s*").expect("static regex"),
            sentence_end: Regex::new(r"[.!?…]+\s+").expect("static regex"),
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Split `text` into chunks covering the whole document
    pub fn split<'a>(&self, text: &'a str) -> Vec<Chunk<'a>> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        if text.chars().count() <= self.max_chars {
            return vec![Chunk {
                index: 0,
                offset: 0,
                text,
            }];
        }

        let budget = self.max_chars - self.overlap;
        let segments = self.segments(text, budget);

        let mut ranges: Vec<Range<usize>> = Vec::new();
        let mut current: Option<(Range<usize>, usize)> = None;

        for (segment, chars) in segments {
            current = match current {
                Some((range, count)) if count + chars <= budget => {
                    Some((range.start..segment.end, count + chars))
                }
                Some((range, _)) => {
                    ranges.push(range);
                    Some((segment, chars))
                }
                None => Some((segment, chars)),
            };
        }
        if let Some((range, _)) = current {
            ranges.push(range);
        }

        ranges
            .into_iter()
            .enumerate()
            .map(|(index, range)| {
                let start = if index == 0 {
                    range.start
                } else {
                    back_off(text, range.start, self.overlap)
                };
                Chunk {
                    index,
                    offset: start,
                    text: &text[start..range.end],
                }
            })
            .filter(|chunk| !chunk.text.trim().is_empty())
            .collect()
    }

    /// Partition `text` into segments of at most `budget` characters
    fn segments(&self, text: &str, budget: usize) -> Vec<(Range<usize>, usize)> {
        let mut segments = Vec::new();

        for paragraph in partition(&self.paragraph_break, text, 0..text.len()) {
            let chars = text[paragraph.clone()].chars().count();
            if chars <= budget {
                segments.push((paragraph, chars));
                continue;
            }

            for sentence in partition(&self.sentence_end, text, paragraph) {
                let chars = text[sentence.clone()].chars().count();
                if chars <= budget {
                    segments.push((sentence, chars));
                } else {
                    segments.extend(hard_split(text, sentence, budget));
                }
            }
        }

        segments
    }
}

/// Split `range` after each separator match; the pieces cover `range` exactly
fn partition(separator: &Regex, text: &str, range: Range<usize>) -> Vec<Range<usize>> {
    let slice = &text[range.clone()];
    let mut pieces = Vec::new();
    let mut start = range.start;

    for found in separator.find_iter(slice) {
        let end = range.start + found.end();
        if end > start {
            pieces.push(start..end);
            start = end;
        }
    }
    if start < range.end {
        pieces.push(start..range.end);
    }

    pieces
}

fn hard_split(text: &str, range: Range<usize>, budget: usize) -> Vec<(Range<usize>, usize)> {
    let mut pieces = Vec::new();
    let mut start = range.start;
    let mut count = 0;

    for (offset, _) in text[range.clone()].char_indices() {
        let position = range.start + offset;
        if count == budget {
            pieces.push((start..position, count));
            start = position;
            count = 0;
        }
        count += 1;
    }
    if start < range.end {
        pieces.push((start..range.end, count));
    }

    pieces
}

/// Byte position `chars` characters before `position`
fn back_off(text: &str, position: usize, chars: usize) -> usize {
    let moved: usize = text[..position]
        .chars()
        .rev()
        .take(chars)
        .map(char::len_utf8)
        .sum();
    position - moved
}
