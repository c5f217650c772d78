//! Person name canonicalization and fuzzy matching

use crate::anonymization::config::NameConfig;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Structured view of a person name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizedName {
    /// Title-free, accent-free, lowercase tokens joined by single spaces
    pub canonical: String,
    pub first_names: Vec<String>,
    pub last_name: String,
    /// Particles attached to the last name, in order
    pub particles: Vec<String>,
}

impl NormalizedName {
    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }
}

/// Best candidate for a name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NameMatch {
    pub candidate: String,
    pub canonical: String,
    pub score: f64,
}

/// Lowercase and strip combining marks
pub fn strip_diacritics(text: &str) -> String {
    text.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Canonicalizes person names and scores their similarity
#[derive(Debug, Clone)]
pub struct NameCanonicalizer {
    /// Accent-free titles, longest first
    titles: Vec<String>,
    particles: HashSet<String>,
    weights: [f64; 3],
    score_cutoff: f64,
    /// canonical name → variants seen for it
    registry: BTreeMap<String, BTreeSet<String>>,
}

impl NameCanonicalizer {
    pub fn new(config: &NameConfig) -> Self {
        let mut titles: Vec<String> = config
            .titles
            .iter()
            .map(|title| strip_diacritics(title.trim().trim_end_matches('.')))
            .filter(|title| !title.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        titles.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));

        let particles = config
            .particles
            .iter()
            .map(|particle| strip_diacritics(particle.trim()))
            .collect();

        let raw = [config.edit_weight, config.token_weight, config.phonetic_weight]
            .map(|weight| weight.max(0.0));
        let total: f64 = raw.iter().sum();
        let weights = if total > 0.0 {
            raw.map(|weight| weight / total)
        } else {
            [0.5, 0.3, 0.2]
        };

        Self {
            titles,
            particles,
            weights,
            score_cutoff: config.score_cutoff,
            registry: BTreeMap::new(),
        }
    }

    pub fn score_cutoff(&self) -> f64 {
        self.score_cutoff
    }

    /// Remove leading civil titles, with or without their trailing dot
    fn strip_titles<'a>(&self, mut name: &'a str) -> &'a str {
        loop {
            let folded = strip_diacritics(name);
            let stripped = self.titles.iter().find_map(|title| {
                let rest = folded.strip_prefix(title.as_str())?;
                let rest = rest.strip_prefix('.').unwrap_or(rest);
                if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
                    return None;
                }
                // `title` and `rest` index the folded form; count words instead.
                let title_words = title.split_whitespace().count();
                Some(title_words)
            });

            let Some(words) = stripped else {
                return name;
            };
            let remainder = skip_words(name, words);
            if remainder.len() == name.len() || remainder.trim().is_empty() {
                return remainder.trim();
            }
            name = remainder;
        }
    }

    /// Canonical form, first names, particles and last name of `name`
    pub fn normalize(&self, name: &str) -> NormalizedName {
        let working = strip_diacritics(self.strip_titles(name.trim()));
        let tokens: Vec<String> = working
            .split(|c: char| c.is_whitespace() || c == ',')
            .map(|token| token.trim_matches('.'))
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect();

        if tokens.is_empty() {
            return NormalizedName::default();
        }

        // Walk back from the end: the last non-particle token plus the
        // particles right before it form the last name.
        let mut remaining = tokens.clone();
        let mut last_parts: Vec<String> = Vec::new();
        while let Some(token) = remaining.pop() {
            let is_particle = self.particles.contains(&token);
            last_parts.insert(0, token);
            if is_particle {
                continue;
            }
            while remaining
                .last()
                .is_some_and(|previous| self.particles.contains(previous))
            {
                if let Some(particle) = remaining.pop() {
                    last_parts.insert(0, particle);
                }
            }
            break;
        }

        let last_name = last_parts.last().cloned().unwrap_or_default();
        let particles = last_parts[..last_parts.len().saturating_sub(1)]
            .iter()
            .filter(|token| self.particles.contains(*token))
            .cloned()
            .collect();

        NormalizedName {
            canonical: tokens.join(" "),
            first_names: remaining,
            last_name,
            particles,
        }
    }

    /// Weighted similarity in `[0, 1]` of two names' canonical forms
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        let a = self.normalize(a);
        let b = self.normalize(b);
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        if a.canonical == b.canonical {
            return 1.0;
        }

        let edit = strsim::normalized_levenshtein(&a.canonical, &b.canonical);
        let tokens = jaccard(&a.canonical, &b.canonical);
        let phonetic = strsim::normalized_levenshtein(
            &phonetic_skeleton(&a.canonical),
            &phonetic_skeleton(&b.canonical),
        );

        self.weights[0] * edit + self.weights[1] * tokens + self.weights[2] * phonetic
    }

    /// Best candidate scoring at least the cutoff
    ///
    /// Without explicit candidates the registered canonical names are used.
    pub fn find_match<'a, I>(&self, name: &str, candidates: Option<I>) -> Option<NameMatch>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let pool: Vec<&str> = match candidates {
            Some(candidates) => candidates.into_iter().collect(),
            None => self.registry.keys().map(String::as_str).collect(),
        };

        let mut best: Option<(f64, &str)> = None;
        for candidate in pool {
            let score = self.similarity(name, candidate);
            if best.map_or(true, |(best_score, _)| score > best_score) {
                best = Some((score, candidate));
            }
        }

        best.filter(|(score, _)| *score >= self.score_cutoff)
            .map(|(score, candidate)| NameMatch {
                candidate: candidate.to_string(),
                canonical: self.normalize(candidate).canonical,
                score,
            })
    }

    /// Record `variant` as a spelling of `canonical`
    pub fn register_variant(&mut self, canonical: &str, variant: &str) {
        let key = self.normalize(canonical).canonical;
        if key.is_empty() {
            return;
        }
        self.registry
            .entry(key)
            .or_default()
            .insert(variant.trim().to_string());
    }

    /// Variants registered under the canonical form of `name`
    pub fn variants(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.registry.get(&self.normalize(name).canonical)
    }
}

impl Default for NameCanonicalizer {
    fn default() -> Self {
        Self::new(&NameConfig::default())
    }
}

/// `text` without its first `count` whitespace-separated words
fn skip_words(text: &str, count: usize) -> &str {
    let mut rest = text.trim_start();
    for _ in 0..count {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest = rest[end..].trim_start();
    }
    rest
}

fn jaccard(a: &str, b: &str) -> f64 {
    let a: HashSet<&str> = a.split_whitespace().collect();
    let b: HashSet<&str> = b.split_whitespace().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

/// Consonant skeleton after folding common French digraphs
fn phonetic_skeleton(canonical: &str) -> String {
    let mut folded = canonical.replace(' ', "");
    for (digraph, replacement) in [
        ("ph", "f"),
        ("ch", "s"),
        ("qu", "k"),
        ("ck", "k"),
        ("gn", "n"),
        ("th", "t"),
        ("sc", "s"),
    ] {
        folded = folded.replace(digraph, replacement);
    }

    let mut skeleton = String::with_capacity(folded.len());
    for c in folded.chars() {
        let c = match c {
            'c' | 'q' => 'k',
            'z' => 's',
            'w' => 'v',
            c => c,
        };
        if !c.is_ascii_alphabetic() || "aeiouyh".contains(c) {
            continue;
        }
        if !skeleton.ends_with(c) {
            skeleton.push(c);
        }
    }

    // Silent final d/t: Dupond and Dupont sound alike.
    if skeleton.ends_with('d') {
        skeleton.pop();
        skeleton.push('t');
    }
    skeleton
}
