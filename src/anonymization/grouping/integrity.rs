//! Consistency checks and statistics for entity state

use super::manager::EntityManager;
use crate::anonymization::models::{DetectionSource, EntityType};
use crate::domain::{EntityId, GroupId};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// Confidence at or above which an entity counts as high confidence
pub const HIGH_CONFIDENCE: f32 = 0.8;

/// Confidence at or above which an entity counts as medium confidence
pub const MEDIUM_CONFIDENCE: f32 = 0.5;

/// One inconsistency between entities and explicit groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityIssue {
    DuplicateEntity { entity_id: EntityId },
    DuplicateGroup { group_id: GroupId },
    /// A group lists an entity that does not exist
    OrphanMember { group_id: GroupId, entity_id: EntityId },
    /// An entity is listed by more than one group
    SharedMember { entity_id: EntityId, groups: Vec<GroupId> },
    /// The entity's group reference and the group's member list disagree
    MembershipMismatch { entity_id: EntityId, group_id: GroupId },
    /// A member does not use its group's replacement
    ReplacementMismatch { entity_id: EntityId, group_id: GroupId },
    /// The representative span does not fit in the document
    SpanOutOfBounds { entity_id: EntityId },
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateEntity { entity_id } => write!(f, "Duplicate entity {entity_id}"),
            Self::DuplicateGroup { group_id } => write!(f, "Duplicate group {group_id}"),
            Self::OrphanMember { group_id, entity_id } => {
                write!(f, "Group {group_id} references missing entity {entity_id}")
            }
            Self::SharedMember { entity_id, groups } => {
                write!(f, "Entity {entity_id} belongs to {} groups", groups.len())
            }
            Self::MembershipMismatch { entity_id, group_id } => {
                write!(f, "Entity {entity_id} and group {group_id} disagree on membership")
            }
            Self::ReplacementMismatch { entity_id, group_id } => {
                write!(f, "Entity {entity_id} does not use the replacement of group {group_id}")
            }
            Self::SpanOutOfBounds { entity_id } => {
                write!(f, "Entity {entity_id} has a span outside the document")
            }
        }
    }
}

/// Confidence distribution of the entities
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfidenceStats {
    pub min: f32,
    pub max: f32,
    pub average: f32,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// Summary counts over one document's entities
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityStatistics {
    pub total_entities: usize,
    pub selected_entities: usize,
    pub total_occurrences: usize,
    pub by_type: BTreeMap<EntityType, usize>,
    pub by_source: BTreeMap<DetectionSource, usize>,
    pub invalid_entities: usize,
    pub total_groups: usize,
    pub grouped_entities: usize,
    /// Tokens used by more than one entity
    pub shared_tokens: usize,
    pub confidence: Option<ConfidenceStats>,
}

impl EntityManager {
    /// Every inconsistency found; empty when the state is sound
    pub fn validate_integrity(&self) -> Vec<IntegrityIssue> {
        let mut issues = Vec::new();

        let mut entity_ids: HashSet<&EntityId> = HashSet::new();
        for entity in &self.entities {
            if !entity_ids.insert(&entity.id) {
                issues.push(IntegrityIssue::DuplicateEntity {
                    entity_id: entity.id.clone(),
                });
            }
            if entity.span.slice(&self.document).is_none() {
                issues.push(IntegrityIssue::SpanOutOfBounds {
                    entity_id: entity.id.clone(),
                });
            }
        }

        let mut group_ids: HashSet<&GroupId> = HashSet::new();
        let mut owners: BTreeMap<&EntityId, Vec<GroupId>> = BTreeMap::new();
        for group in &self.groups {
            if !group_ids.insert(&group.id) {
                issues.push(IntegrityIssue::DuplicateGroup {
                    group_id: group.id.clone(),
                });
            }
            for member in group.member_ids() {
                owners.entry(member).or_default().push(group.id.clone());
                match self.entity(member) {
                    None => issues.push(IntegrityIssue::OrphanMember {
                        group_id: group.id.clone(),
                        entity_id: member.clone(),
                    }),
                    Some(entity) => {
                        if entity.group_id.as_ref() != Some(&group.id) {
                            issues.push(IntegrityIssue::MembershipMismatch {
                                entity_id: member.clone(),
                                group_id: group.id.clone(),
                            });
                        } else if entity.replacement != group.replacement {
                            issues.push(IntegrityIssue::ReplacementMismatch {
                                entity_id: member.clone(),
                                group_id: group.id.clone(),
                            });
                        }
                    }
                }
            }
        }

        for (entity_id, groups) in owners {
            if groups.len() > 1 {
                issues.push(IntegrityIssue::SharedMember {
                    entity_id: entity_id.clone(),
                    groups,
                });
            }
        }

        for entity in &self.entities {
            if let Some(group_id) = &entity.group_id {
                let listed = self
                    .group(group_id)
                    .is_some_and(|group| group.contains(&entity.id));
                if !listed {
                    issues.push(IntegrityIssue::MembershipMismatch {
                        entity_id: entity.id.clone(),
                        group_id: group_id.clone(),
                    });
                }
            }
        }

        issues
    }

    /// Reconcile groups with the live entities; returns references fixed
    ///
    /// Drops members that no longer exist or that a previous group already
    /// claimed, removes emptied groups, and detaches entities pointing at a
    /// group that does not list them.
    pub fn cleanup_orphaned_references(&mut self) -> usize {
        let existing: HashSet<EntityId> = self.entities.iter().map(|e| e.id.clone()).collect();
        let mut claimed: HashSet<EntityId> = HashSet::new();
        let mut cleaned = 0;

        for group in &mut self.groups {
            cleaned += group.retain_members(|id| existing.contains(id) && !claimed.contains(id));
            claimed.extend(group.member_ids().iter().cloned());
        }

        let before = self.groups.len();
        self.groups.retain(|group| !group.is_empty());
        cleaned += before - self.groups.len();

        let membership: HashMap<EntityId, GroupId> = self
            .groups
            .iter()
            .flat_map(|group| {
                group
                    .member_ids()
                    .iter()
                    .map(move |id| (id.clone(), group.id.clone()))
            })
            .collect();

        for entity in &mut self.entities {
            match membership.get(&entity.id) {
                Some(group_id) if entity.group_id.as_ref() != Some(group_id) => {
                    entity.group_id = Some(group_id.clone());
                    entity.is_grouped = true;
                    cleaned += 1;
                }
                Some(_) => {}
                None if entity.group_id.is_some() || entity.is_grouped => {
                    entity.clear_group();
                    cleaned += 1;
                }
                None => {}
            }
        }

        let group_ids: Vec<GroupId> = self.groups.iter().map(|group| group.id.clone()).collect();
        for group_id in &group_ids {
            self.refresh_group_variants(group_id);
        }

        if cleaned > 0 {
            tracing::info!(cleaned, "Orphaned group references cleaned");
            self.invalidate();
        }
        cleaned
    }

    pub fn statistics(&self) -> EntityStatistics {
        let mut stats = EntityStatistics {
            total_entities: self.entities.len(),
            total_groups: self.groups.len(),
            shared_tokens: self
                .token_groups()
                .iter()
                .filter(|group| group.is_shared())
                .count(),
            ..EntityStatistics::default()
        };

        for entity in &self.entities {
            *stats.by_type.entry(entity.entity_type).or_insert(0) += 1;
            *stats.by_source.entry(entity.source).or_insert(0) += 1;
            stats.total_occurrences += entity.occurrences;
            stats.selected_entities += usize::from(entity.selected);
            stats.invalid_entities += usize::from(!entity.valid);
            stats.grouped_entities += usize::from(entity.is_grouped);
        }

        if !self.entities.is_empty() {
            let values: Vec<f32> = self.entities.iter().map(|e| e.confidence).collect();
            stats.confidence = Some(ConfidenceStats {
                min: values.iter().copied().fold(f32::INFINITY, f32::min),
                max: values.iter().copied().fold(f32::NEG_INFINITY, f32::max),
                average: values.iter().sum::<f32>() / values.len() as f32,
                high: values.iter().filter(|c| **c >= HIGH_CONFIDENCE).count(),
                medium: values
                    .iter()
                    .filter(|c| (MEDIUM_CONFIDENCE..HIGH_CONFIDENCE).contains(*c))
                    .count(),
                low: values.iter().filter(|c| **c < MEDIUM_CONFIDENCE).count(),
            });
        }

        stats
    }
}
