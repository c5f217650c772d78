//! Data models for detection, aggregation and grouping

pub mod entity;
pub mod group;

pub use entity::{
    normalize_key, CanonicalEntity, DetectionSource, EntityCandidate, EntityRecord, EntityType,
    Selection, Span,
};
pub use group::{EntityGroup, TokenGroup, TokenVariant};
