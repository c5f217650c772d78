//! External language-model detector
//!
//! Talks to an Ollama-compatible `/api/generate` endpoint. The document is
//! sent chunk by chunk; the service only returns entity texts, so every text
//! is re-located in the full document by literal search. A text that cannot
//! be found is still reported, at position 0 with a lower confidence.

use super::chunking::TextChunker;
use super::{context_window, CandidateDetector};
use crate::anonymization::config::{DetectionMode, ExternalServiceConfig};
use crate::anonymization::models::{
    normalize_key, DetectionSource, EntityCandidate, EntityType, Span,
};
use crate::anonymization::scan::find_literal;
use crate::domain::DetectionError;
use async_trait::async_trait;
use regex::RegexBuilder;
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Confidence of a text found verbatim in the document
pub const LOCATED_CONFIDENCE: f32 = 0.85;

/// Confidence of a text only found after whitespace normalization
pub const NORMALIZED_CONFIDENCE: f32 = 0.75;

/// Confidence of a text that could not be located at all
pub const FALLBACK_CONFIDENCE: f32 = 0.5;

/// Shorter texts are almost always extraction noise
const MIN_TEXT_CHARS: usize = 3;

const PROMPT_TEMPLATE: &str = "Tu es un assistant d'anonymisation de documents juridiques français.
Extrais du texte ci-dessous les noms de personnes physiques et les noms d'organisations.
Ignore les juridictions, les articles de loi et les dates.
Réponds uniquement avec un objet JSON de la forme :
{\"persons\": [{\"text\": \"...\"}], \"organizations\": [{\"text\": \"...\"}]}

Texte :
";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Entity lists returned by the model
#[derive(Debug, Default, Deserialize)]
struct ExtractedEntities {
    #[serde(default, alias = "personnes")]
    persons: Vec<ExtractedItem>,
    #[serde(default, alias = "organisations")]
    organizations: Vec<ExtractedItem>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExtractedItem {
    Text(String),
    Object {
        #[serde(alias = "texte")]
        text: String,
    },
}

impl ExtractedItem {
    fn text(&self) -> &str {
        match self {
            Self::Text(text) | Self::Object { text } => text.trim(),
        }
    }
}

impl ExtractedEntities {
    fn into_typed(self) -> impl Iterator<Item = (String, EntityType)> {
        let persons = self
            .persons
            .into_iter()
            .map(|item| (item.text().to_string(), EntityType::Person));
        let organizations = self
            .organizations
            .into_iter()
            .map(|item| (item.text().to_string(), EntityType::Organization));
        persons.chain(organizations)
    }
}

/// Detector backed by a remote language model
pub struct ExternalServiceDetector {
    client: Client,
    config: ExternalServiceConfig,
    chunker: TextChunker,
}

impl ExternalServiceDetector {
    /// Create a new detector; no request is made until `detect`
    pub fn new(config: ExternalServiceConfig) -> Result<Self, DetectionError> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.availability_timeout_seconds))
            .build()
            .map_err(|e| DetectionError::Internal(format!("Failed to build HTTP client: {e}")))?;
        let chunker = TextChunker::new(config.chunk_size, config.chunk_overlap);

        Ok(Self {
            client,
            config,
            chunker,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Probe the service with a short timeout
    pub async fn is_available(&self) -> bool {
        let probe = self
            .client
            .get(self.endpoint("/api/tags"))
            .timeout(Duration::from_secs(self.config.availability_timeout_seconds))
            .send()
            .await;

        match probe {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "External detection service probe failed");
                false
            }
        }
    }

    async fn query_chunk(&self, chunk: &str) -> Result<ExtractedEntities, DetectionError> {
        let request = GenerateRequest {
            model: &self.config.model,
            prompt: format!("{PROMPT_TEMPLATE}{chunk}"),
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
            },
        };

        let timeout = Duration::from_secs(self.config.timeout_seconds);
        let send = self
            .client
            .post(self.endpoint("/api/generate"))
            .json(&request)
            .send();

        let response = tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| DetectionError::Timeout(self.config.timeout_seconds))?
            .map_err(|e| {
                if e.is_timeout() {
                    DetectionError::Timeout(self.config.timeout_seconds)
                } else {
                    DetectionError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(DetectionError::ServerError { status, message });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| DetectionError::InvalidResponse(e.to_string()))?;

        parse_entities(&body.response)
    }

    /// Query every chunk and re-locate the results in `document`
    pub async fn extract(&self, document: &str) -> Result<Vec<EntityCandidate>, DetectionError> {
        if document.trim().is_empty() {
            return Ok(Vec::new());
        }
        if !self.is_available().await {
            return Err(DetectionError::Unavailable(self.config.base_url.clone()));
        }

        let chunks = self.chunker.split(document);
        let mut seen: HashSet<String> = HashSet::new();
        let mut candidates = Vec::new();
        let mut failures = 0;
        let mut last_error = None;

        for chunk in &chunks {
            let extracted = match self.query_chunk(chunk.text).await {
                Ok(extracted) => extracted,
                Err(e) => {
                    tracing::warn!(
                        chunk = chunk.index,
                        error = %e,
                        "External detection failed for chunk"
                    );
                    failures += 1;
                    last_error = Some(e);
                    continue;
                }
            };

            for (text, entity_type) in extracted.into_typed() {
                if text.chars().count() < MIN_TEXT_CHARS || !seen.insert(normalize_key(&text)) {
                    continue;
                }
                let (span, confidence) = relocate(document, &text);
                if confidence == FALLBACK_CONFIDENCE {
                    tracing::debug!(
                        entity_type = %entity_type,
                        "Entity returned by external service not found in document"
                    );
                }
                if let Ok(candidate) = EntityCandidate::new(
                    text,
                    span,
                    entity_type,
                    confidence,
                    DetectionSource::ExternalService,
                ) {
                    candidates.push(candidate.with_context(context_window(document, span)));
                }
            }
        }

        match last_error {
            Some(e) if failures == chunks.len() => Err(e),
            _ => Ok(candidates),
        }
    }
}

#[async_trait]
impl CandidateDetector for ExternalServiceDetector {
    fn name(&self) -> &str {
        "external_llm"
    }

    fn source(&self) -> DetectionSource {
        DetectionSource::ExternalService
    }

    async fn detect(
        &self,
        text: &str,
        _mode: DetectionMode,
    ) -> Result<Vec<EntityCandidate>, DetectionError> {
        self.extract(text).await
    }
}

/// Parse the model's answer, tolerating markdown fences and chatter
fn parse_entities(raw: &str) -> Result<ExtractedEntities, DetectionError> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => {
            return Err(DetectionError::InvalidResponse(
                "No JSON object in model answer".to_string(),
            ))
        }
    };

    serde_json::from_str(json).map_err(|e| DetectionError::InvalidResponse(e.to_string()))
}

/// Locate `text` in `document`: verbatim, then whitespace-insensitive, then 0
fn relocate(document: &str, text: &str) -> (Span, f32) {
    if let Some(span) = find_literal(document, text).first() {
        return (*span, LOCATED_CONFIDENCE);
    }

    let words: Vec<String> = text.split_whitespace().map(regex::escape).collect();
    if words.len() > 1 {
        let pattern = words.join(r"\s+");
        if let Ok(re) = RegexBuilder::new(&pattern).case_insensitive(true).build() {
            if let Some(found) = re.find(document) {
                if let Ok(span) = Span::new(found.start(), found.end()) {
                    return (span, NORMALIZED_CONFIDENCE);
                }
            }
        }
    }

    (fallback_span(document, text), FALLBACK_CONFIDENCE)
}

/// `[0, len)` clamped to the document and snapped to a char boundary
fn fallback_span(document: &str, text: &str) -> Span {
    let mut end = text.len().min(document.len()).max(1);
    while end < document.len() && !document.is_char_boundary(end) {
        end += 1;
    }
    Span { start: 0, end }
}
