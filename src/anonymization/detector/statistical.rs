//! Heuristic named-entity recognizer
//!
//! A local, model-free recognizer for French legal prose. It scores runs of
//! capitalized words using surrounding evidence:
//!
//! - civil titles before a run ("M.", "Maître", "Mme") make it a person
//! - legal forms and institution words ("SARL", "Société") make it an organization
//! - a locative preposition before a short run ("à Lyon") makes it a place
//! - runs with an all-caps surname ("Jean DUPONT") are likely persons
//!
//! In deep mode, single capitalized words near juridical vocabulary are also
//! reported with a low confidence. Text is processed chunk by chunk; chunks
//! are slices of the document so offsets map back exactly.

use super::chunking::TextChunker;
use super::{context_window, CandidateDetector};
use crate::anonymization::config::{DetectionMode, StatisticalConfig};
use crate::anonymization::models::{DetectionSource, EntityCandidate, EntityType, Span};
use crate::domain::DetectionError;
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;

const PERSON_TITLES: &[&str] = &[
    "m", "mr", "mme", "mlle", "me", "maître", "maitre", "monsieur", "madame", "mademoiselle",
    "dr", "docteur", "pr", "professeur",
];

const ORG_SUFFIXES: &[&str] = &[
    "SA", "SAS", "SASU", "SARL", "EURL", "SCI", "SNC", "SCP", "SELARL", "GIE",
];

const ORG_PREFIXES: &[&str] = &[
    "société", "cabinet", "banque", "association", "groupe", "mutuelle", "caisse", "fondation",
    "compagnie", "syndicat",
];

const LOCATIVE_PREPOSITIONS: &[&str] = &["à", "au", "aux", "vers", "depuis"];

const NAME_PARTICLES: &[&str] = &["de", "du", "des", "la", "le", "van", "von", "der", "di", "da"];

/// Capitalized words that start sentences or headings but are not names
const COMMON_WORDS: &[&str] = &[
    "le", "la", "les", "un", "une", "des", "ce", "cette", "ces", "il", "elle", "ils", "elles",
    "nous", "vous", "on", "en", "par", "pour", "sur", "dans", "avec", "sans", "vu", "attendu",
    "considérant", "article", "articles", "ainsi", "enfin", "alors", "mais", "donc",
    "or", "ni", "car", "si", "dit", "jugement", "arrêt", "tribunal", "cour", "code", "loi",
    "décret", "chambre", "section", "monsieur", "madame", "mademoiselle", "maître", "conseil",
    "république", "française", "siret", "siren", "rcs", "tva", "ape", "naf", "tél", "tel",
    "fax", "email", "courriel", "objet", "référence", "dossier", "affaire", "demandeur",
    "défendeur", "défenderesse", "demanderesse", "partie", "parties", "fait",
    "janvier", "février", "mars", "avril", "mai", "juin", "juillet", "août", "septembre",
    "octobre", "novembre", "décembre", "lundi", "mardi", "mercredi", "jeudi", "vendredi",
    "samedi", "dimanche",
];

const JURIDICAL_KEYWORDS: &[&str] = &[
    "maître", "avocat", "tribunal", "cour", "jugement", "arrêt", "demandeur", "défendeur",
    "parties", "signataire", "requérant", "intimé", "appelant",
];

/// Window (in characters) searched for juridical keywords in deep mode
const KEYWORD_WINDOW: usize = 60;

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    start: usize,
    end: usize,
    text: &'a str,
}

impl Token<'_> {
    fn lower(&self) -> String {
        self.text.to_lowercase()
    }

    fn is_capitalized(&self) -> bool {
        let mut chars = self.text.chars();
        match chars.next() {
            Some(first) if first.is_uppercase() => true,
            // d'Artagnan, l'Hermite
            Some(first) if first.is_lowercase() => {
                matches!(chars.next(), Some('\'') | Some('’'))
                    && chars.next().is_some_and(char::is_uppercase)
            }
            _ => false,
        }
    }

    fn is_all_caps(&self) -> bool {
        self.text.chars().filter(|c| c.is_alphabetic()).count() >= 2
            && self
                .text
                .chars()
                .filter(|c| c.is_alphabetic())
                .all(char::is_uppercase)
    }

    fn is_particle(&self) -> bool {
        NAME_PARTICLES.contains(&self.text)
    }

    fn is_common_word(&self) -> bool {
        COMMON_WORDS.contains(&self.lower().as_str())
    }
}

/// Model-free recognizer for persons, organizations and places
pub struct HeuristicRecognizer {
    chunker: TextChunker,
    min_confidence: f32,
    word: Regex,
}

impl HeuristicRecognizer {
    pub fn new(config: &StatisticalConfig) -> Self {
        Self {
            chunker: TextChunker::new(config.chunk_size, 0),
            min_confidence: config.min_confidence,
            word: Regex::new(r"\p{L}[\p{L}\p{M}'’-]*").expect("static regex"),
        }
    }

    /// Recognize entities in `text`
    pub fn recognize(&self, text: &str, mode: DetectionMode) -> Vec<EntityCandidate> {
        let mut seen: HashSet<(Span, EntityType)> = HashSet::new();
        let mut candidates = Vec::new();

        for chunk in self.chunker.split(text) {
            for (local, entity_type, confidence) in self.recognize_chunk(chunk.text, mode) {
                if confidence < self.min_confidence {
                    continue;
                }
                let span = local.offset(chunk.offset);
                if !seen.insert((span, entity_type)) {
                    continue;
                }
                let Some(entity_text) = span.slice(text) else {
                    continue;
                };
                if let Ok(candidate) = EntityCandidate::new(
                    entity_text,
                    span,
                    entity_type,
                    confidence,
                    DetectionSource::Statistical,
                ) {
                    candidates.push(candidate.with_context(context_window(text, span)));
                }
            }
        }

        candidates
    }

    fn recognize_chunk(&self, text: &str, mode: DetectionMode) -> Vec<(Span, EntityType, f32)> {
        let tokens: Vec<Token> = self
            .word
            .find_iter(text)
            .map(|m| Token {
                start: m.start(),
                end: m.end(),
                text: m.as_str(),
            })
            .collect();

        let mut found = Vec::new();
        let mut index = 0;

        while index < tokens.len() {
            if !tokens[index].is_capitalized() {
                index += 1;
                continue;
            }

            let run_end = extend_run(text, &tokens, index);
            let previous = index.checked_sub(1).map(|i| &tokens[i]);
            if let Some(hit) = classify(text, &tokens[index..run_end], previous, mode) {
                found.push(hit);
            }
            index = run_end;
        }

        found
    }
}

/// End index (exclusive) of the capitalized run starting at `start`
fn extend_run(text: &str, tokens: &[Token], start: usize) -> usize {
    let mut end = start + 1;
    while end < tokens.len() {
        let gap = &text[tokens[end - 1].end..tokens[end].start];
        if gap.is_empty() || !gap.chars().all(|c| c == ' ' || c == '\t') {
            break;
        }
        let token = &tokens[end];
        if token.is_capitalized() {
            end += 1;
        } else if token.is_particle()
            && tokens.get(end + 1).is_some_and(|next| {
                next.is_capitalized()
                    && text[token.end..next.start].chars().all(|c| c == ' ' || c == '\t')
            })
        {
            end += 2;
        } else {
            break;
        }
    }
    end
}

fn is_title(token: &Token) -> bool {
    PERSON_TITLES.contains(&token.lower().as_str())
}

fn starts_sentence(text: &str, position: usize) -> bool {
    match text[..position].trim_end_matches([' ', '\t']).chars().last() {
        None => true,
        Some(c) => matches!(c, '.' | '!' | '?' | '\n' | '\r' | '«' | '"' | '(' | '-' | '–'),
    }
}

fn classify(
    text: &str,
    run: &[Token],
    previous: Option<&Token>,
    mode: DetectionMode,
) -> Option<(Span, EntityType, f32)> {
    let mut run = run;
    let mut titled = previous.is_some_and(|p| {
        is_title(p) && {
            let gap = &text[p.end..run[0].start];
            gap.trim_start_matches('.').chars().all(char::is_whitespace)
        }
    });

    // "Monsieur Jean Dupont": the title is part of the run
    while let Some(first) = run.first() {
        if is_title(first) && run.len() > 1 {
            titled = true;
            run = &run[1..];
        } else {
            break;
        }
    }

    // Organization prefixes are evidence, not noise
    let org_prefixed = run
        .first()
        .is_some_and(|t| ORG_PREFIXES.contains(&t.lower().as_str()))
        && run.len() > 1;

    if !org_prefixed {
        while run.first().is_some_and(Token::is_common_word) {
            run = &run[1..];
        }
    }
    while run.last().is_some_and(|t| t.is_particle() || t.is_common_word()) && run.len() > 1 {
        run = &run[..run.len() - 1];
    }
    let first = run.first()?;
    let last = run.last()?;
    if first.is_common_word() && !org_prefixed {
        return None;
    }

    let span = Span::new(first.start, last.end).ok()?;
    let sentence_start = starts_sentence(text, first.start) && !titled;

    if ORG_SUFFIXES.contains(&last.text) && run.len() > 1 {
        return Some((span, EntityType::Organization, 0.8));
    }
    if org_prefixed {
        return Some((span, EntityType::Organization, 0.7));
    }

    if titled {
        let confidence = if run.len() > 1 { 0.85 } else { 0.8 };
        return Some((span, EntityType::Person, confidence));
    }

    let locative = previous.is_some_and(|p| LOCATIVE_PREPOSITIONS.contains(&p.lower().as_str()));
    if locative && run.len() <= 2 && !sentence_start {
        return Some((span, EntityType::Address, 0.55));
    }

    if run.len() >= 2 {
        let confidence = if run.iter().any(Token::is_all_caps) {
            0.75
        } else {
            0.65
        };
        return Some((span, EntityType::Person, confidence));
    }

    if mode == DetectionMode::Deep && !sentence_start && near_juridical_keyword(text, span) {
        return Some((span, EntityType::Person, 0.6));
    }

    None
}

fn near_juridical_keyword(text: &str, span: Span) -> bool {
    let before: String = text[..span.start]
        .chars()
        .rev()
        .take(KEYWORD_WINDOW)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    let after: String = text[span.end..].chars().take(KEYWORD_WINDOW).collect();
    let window = format!("{before} {after}").to_lowercase();
    JURIDICAL_KEYWORDS.iter().any(|keyword| window.contains(keyword))
}

#[async_trait]
impl CandidateDetector for HeuristicRecognizer {
    fn name(&self) -> &str {
        "heuristic_ner"
    }

    fn source(&self) -> DetectionSource {
        DetectionSource::Statistical
    }

    async fn detect(
        &self,
        text: &str,
        mode: DetectionMode,
    ) -> Result<Vec<EntityCandidate>, DetectionError> {
        Ok(self.recognize(text, mode))
    }
}
