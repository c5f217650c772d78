//! Grouping data models

use super::entity::{EntityType, Span};
use crate::domain::{EntityId, GroupId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Explicit group binding several entities to one replacement token
///
/// An entity belongs to at most one group at a time; the entity manager
/// enforces this when members are added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityGroup {
    pub id: GroupId,
    pub name: String,
    member_ids: Vec<EntityId>,
    pub replacement: String,
    pub entity_type: EntityType,
    pub created_at: DateTime<Utc>,
}

impl EntityGroup {
    /// Create an empty group
    pub fn new(name: impl Into<String>, replacement: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            id: GroupId::generate(),
            name: name.into(),
            member_ids: Vec::new(),
            replacement: replacement.into(),
            entity_type,
            created_at: Utc::now(),
        }
    }

    pub fn member_ids(&self) -> &[EntityId] {
        &self.member_ids
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.member_ids.contains(id)
    }

    /// Add a member; returns false if it was already present
    pub fn add_member(&mut self, id: EntityId) -> bool {
        if self.contains(&id) {
            return false;
        }
        self.member_ids.push(id);
        true
    }

    /// Remove a member; returns false if it was not present
    pub fn remove_member(&mut self, id: &EntityId) -> bool {
        let before = self.member_ids.len();
        self.member_ids.retain(|member| member != id);
        before != self.member_ids.len()
    }

    /// Keep only the members accepted by `keep`; returns how many were dropped
    pub fn retain_members(&mut self, keep: impl Fn(&EntityId) -> bool) -> usize {
        let before = self.member_ids.len();
        self.member_ids.retain(|member| keep(member));
        before - self.member_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.member_ids.is_empty()
    }
}

/// One distinct source text inside a token group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenVariant {
    pub entity_id: EntityId,
    pub text: String,
    pub occurrences: usize,
    /// Where this variant occurs in the document
    pub spans: Vec<Span>,
}

/// Entities that currently share one replacement string
///
/// Derived on demand from the live entity collection, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenGroup {
    pub token: String,
    pub entity_type: EntityType,
    pub variants: Vec<TokenVariant>,
    pub total_occurrences: usize,
}

impl TokenGroup {
    pub fn entity_ids(&self) -> impl Iterator<Item = &EntityId> {
        self.variants.iter().map(|variant| &variant.entity_id)
    }

    /// Whether more than one entity shares the token
    pub fn is_shared(&self) -> bool {
        self.variants.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_members_are_unique() {
        let mut group = EntityGroup::new("Dupont", "PERSONNE_A", EntityType::Person);
        let id = EntityId::new("ent_1").unwrap();
        assert!(group.add_member(id.clone()));
        assert!(!group.add_member(id.clone()));
        assert_eq!(group.member_ids().len(), 1);
        assert!(group.remove_member(&id));
        assert!(!group.remove_member(&id));
        assert!(group.is_empty());
    }

    #[test]
    fn test_retain_members_reports_dropped_count() {
        let mut group = EntityGroup::new("g", "X", EntityType::Person);
        for id in ["a", "b", "c"] {
            group.add_member(EntityId::new(id).unwrap());
        }
        let dropped = group.retain_members(|id| id.as_str() != "b");
        assert_eq!(dropped, 1);
        assert_eq!(group.member_ids().len(), 2);
    }
}
