//! Entity data models
//!
//! Candidates are immutable detector output. Canonical entities are the
//! deduplicated, reviewer-editable records built from them.

use crate::domain::{EntityId, GroupId, PseudonymError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Entity type enumeration for legal documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    /// Natural persons
    #[serde(alias = "PERSONNE")]
    Person,
    /// Postal addresses and places
    #[serde(alias = "ADRESSE")]
    Address,
    /// Telephone numbers
    #[serde(alias = "TELEPHONE")]
    Phone,
    /// Email addresses
    Email,
    /// French social security number (NIR)
    #[serde(alias = "SECURITE_SOCIALE")]
    SocialSecurity,
    /// Companies, firms, administrations
    #[serde(alias = "ORGANISATION")]
    Organization,
    /// SIRET, SIREN, VAT and APE codes
    #[serde(alias = "SIRET_SIREN")]
    RegistrationNumber,
    /// Case references and other identifiers
    #[serde(alias = "AUTRE")]
    Other,
}

impl EntityType {
    /// Every entity type, in display order
    pub const ALL: [EntityType; 8] = [
        Self::Person,
        Self::Address,
        Self::Phone,
        Self::Email,
        Self::SocialSecurity,
        Self::Organization,
        Self::RegistrationNumber,
        Self::Other,
    ];

    /// Get the wire label for the type
    pub fn label(&self) -> &'static str {
        match self {
            Self::Person => "PERSON",
            Self::Address => "ADDRESS",
            Self::Phone => "PHONE",
            Self::Email => "EMAIL",
            Self::SocialSecurity => "SOCIAL_SECURITY",
            Self::Organization => "ORGANIZATION",
            Self::RegistrationNumber => "REGISTRATION_NUMBER",
            Self::Other => "OTHER",
        }
    }

    /// Whether the type has a structural validator
    pub fn is_validated(&self) -> bool {
        matches!(
            self,
            Self::Phone | Self::SocialSecurity | Self::RegistrationNumber
        )
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EntityType {
    type Err = PseudonymError;

    /// Accepts wire labels and the French labels used by legal teams
    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_uppercase().replace([' ', '-'], "_");
        let entity_type = match upper.as_str() {
            "PERSON" | "PERSONNE" | "PER" => Self::Person,
            "ADDRESS" | "ADRESSE" | "LOCATION" | "LOC" => Self::Address,
            "PHONE" | "TELEPHONE" | "TÉLÉPHONE" => Self::Phone,
            "EMAIL" | "E_MAIL" => Self::Email,
            "SOCIAL_SECURITY" | "SECURITE_SOCIALE" | "SÉCURITÉ_SOCIALE" | "NIR" => {
                Self::SocialSecurity
            }
            "ORGANIZATION" | "ORGANISATION" | "ORG" => Self::Organization,
            "REGISTRATION_NUMBER" | "SIRET_SIREN" | "SIRET" | "SIREN" => {
                Self::RegistrationNumber
            }
            "OTHER" | "AUTRE" | "REFERENCE" => Self::Other,
            _ => {
                return Err(PseudonymError::Validation(format!(
                    "Unknown entity type: {s}"
                )))
            }
        };
        Ok(entity_type)
    }
}

/// Dedup key for entity texts: case-folded, internal whitespace collapsed
pub fn normalize_key(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Which detector tier produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    /// Regex registry with structural validators
    Pattern,
    /// Local statistical recognizer
    Statistical,
    /// Remote language model service
    ExternalService,
    /// Added by a reviewer
    Manual,
}

impl DetectionSource {
    /// Rank used when candidates from several sources share one text.
    ///
    /// pattern > external service > statistical; manual additions outrank all.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Manual => 4,
            Self::Pattern => 3,
            Self::ExternalService => 2,
            Self::Statistical => 1,
        }
    }

    /// Get human-readable label for the source
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pattern => "pattern",
            Self::Statistical => "statistical",
            Self::ExternalService => "external_service",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for DetectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Half-open byte interval `[start, end)` into one text buffer
///
/// Offsets always fall on UTF-8 character boundaries of the buffer they
/// were computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawSpan")]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Deserialize)]
struct RawSpan {
    start: usize,
    end: usize,
}

impl TryFrom<RawSpan> for Span {
    type Error = PseudonymError;

    fn try_from(raw: RawSpan) -> Result<Self> {
        Span::new(raw.start, raw.end)
    }
}

impl Span {
    /// Create a span, rejecting empty or inverted intervals
    pub fn new(start: usize, end: usize) -> Result<Self> {
        if start >= end {
            return Err(PseudonymError::Validation(format!(
                "Invalid span [{start}, {end}): start must be lower than end"
            )));
        }
        Ok(Self { start, end })
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Spans are never empty; kept for clippy's `len_without_is_empty`
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether the two spans share at least one byte
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Shift the span by a chunk offset
    pub fn offset(&self, by: usize) -> Span {
        Span {
            start: self.start + by,
            end: self.end + by,
        }
    }

    /// Slice of `text` covered by the span, if it is in bounds
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.start..self.end)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// A detection proposed by one detector
///
/// Immutable once emitted. The span is relative to the exact text the
/// detector was given.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityCandidate {
    text: String,
    span: Span,
    entity_type: EntityType,
    confidence: f32,
    source: DetectionSource,
    context: String,
}

impl EntityCandidate {
    /// Create a candidate, rejecting blank text
    pub fn new(
        text: impl Into<String>,
        span: Span,
        entity_type: EntityType,
        confidence: f32,
        source: DetectionSource,
    ) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(PseudonymError::Validation(
                "Candidate text cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            text,
            span,
            entity_type,
            confidence: confidence.clamp(0.0, 1.0),
            source,
            context: String::new(),
        })
    }

    /// Attach the surrounding text snippet
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn source(&self) -> DetectionSource {
        self.source
    }

    pub fn context(&self) -> &str {
        &self.context
    }
}

/// Deduplicated, document-wide representative of one sensitive text
///
/// Serialized as a flat record (`id, text, type, subtype, start, end, ...`);
/// deserialization goes through [`EntityRecord`] so records missing text,
/// type or span are rejected up front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EntityRecord", into = "EntityRecord")]
pub struct CanonicalEntity {
    pub id: EntityId,
    pub text: String,
    pub entity_type: EntityType,
    pub subtype: Option<String>,
    /// Representative span (first occurrence in the document)
    pub span: Span,
    /// Case-insensitive occurrences across the whole document
    pub occurrences: usize,
    pub confidence: f32,
    pub source: DetectionSource,
    pub selected: bool,
    pub replacement: String,
    pub valid: bool,
    pub group_id: Option<GroupId>,
    pub is_grouped: bool,
    pub group_variants: Vec<String>,
}

impl CanonicalEntity {
    /// Create an entity with neutral defaults for the mutable fields
    pub fn new(
        id: EntityId,
        text: impl Into<String>,
        entity_type: EntityType,
        span: Span,
        source: DetectionSource,
    ) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(PseudonymError::Validation(format!(
                "Entity {id} has an empty text"
            )));
        }
        Ok(Self {
            id,
            text,
            entity_type,
            subtype: None,
            span,
            occurrences: 0,
            confidence: 1.0,
            source,
            selected: true,
            replacement: String::new(),
            valid: true,
            group_id: None,
            is_grouped: false,
            group_variants: Vec::new(),
        })
    }

    /// Detach the entity from any explicit group
    pub fn clear_group(&mut self) {
        self.group_id = None;
        self.is_grouped = false;
        self.group_variants.clear();
    }
}

/// Wire record for [`CanonicalEntity`]
///
/// Required fields are optional here so the validation error names the
/// missing field instead of a generic serde message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: Option<EntityId>,
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub entity_type: Option<EntityType>,
    #[serde(default)]
    pub subtype: Option<String>,
    pub start: Option<usize>,
    pub end: Option<usize>,
    #[serde(default)]
    pub occurrences: usize,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default = "default_selected")]
    pub selected: bool,
    #[serde(default)]
    pub replacement: String,
    #[serde(default = "default_valid")]
    pub valid: bool,
    #[serde(default = "default_source")]
    pub source: DetectionSource,
    #[serde(default)]
    pub group_id: Option<GroupId>,
    #[serde(default)]
    pub is_grouped: bool,
    #[serde(default)]
    pub group_variants: Vec<String>,
}

fn default_confidence() -> f32 {
    1.0
}

fn default_selected() -> bool {
    true
}

fn default_valid() -> bool {
    true
}

fn default_source() -> DetectionSource {
    DetectionSource::Manual
}

impl TryFrom<EntityRecord> for CanonicalEntity {
    type Error = PseudonymError;

    fn try_from(record: EntityRecord) -> Result<Self> {
        let missing = |field: &str| PseudonymError::Validation(format!("Entity record is missing '{field}'"));

        let text = record.text.ok_or_else(|| missing("text"))?;
        let entity_type = record.entity_type.ok_or_else(|| missing("type"))?;
        let start = record.start.ok_or_else(|| missing("start"))?;
        let end = record.end.ok_or_else(|| missing("end"))?;
        let span = Span::new(start, end)?;
        let id = match record.id {
            Some(id) => id,
            None => EntityId::from_key(&normalize_key(&text)),
        };

        let mut entity = CanonicalEntity::new(id, text, entity_type, span, record.source)?;
        entity.subtype = record.subtype;
        entity.occurrences = record.occurrences;
        entity.confidence = record.confidence.clamp(0.0, 1.0);
        entity.selected = record.selected;
        entity.replacement = record.replacement;
        entity.valid = record.valid;
        entity.group_id = record.group_id;
        entity.is_grouped = record.is_grouped;
        entity.group_variants = record.group_variants;
        Ok(entity)
    }
}

impl From<CanonicalEntity> for EntityRecord {
    fn from(entity: CanonicalEntity) -> Self {
        Self {
            id: Some(entity.id),
            text: Some(entity.text),
            entity_type: Some(entity.entity_type),
            subtype: entity.subtype,
            start: Some(entity.span.start),
            end: Some(entity.span.end),
            occurrences: entity.occurrences,
            confidence: entity.confidence,
            selected: entity.selected,
            replacement: entity.replacement,
            valid: entity.valid,
            source: entity.source,
            group_id: entity.group_id,
            is_grouped: entity.is_grouped,
            group_variants: entity.group_variants,
        }
    }
}

/// Reviewer decision for one entity before the final rewrite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub entity_id: EntityId,
    pub selected: bool,
    /// Overrides the entity's replacement token when present
    #[serde(default)]
    pub replacement: Option<String>,
}
