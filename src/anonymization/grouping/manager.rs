//! Per-document entity state
//!
//! The manager owns one document's canonical entities and explicit groups.
//! It is created by an analysis, edited by the reviewer, and consumed by the
//! rewrite. Every mutation that can change a replacement string drops the
//! cached token groups.

use crate::anonymization::detector::validators;
use crate::anonymization::models::{
    normalize_key, CanonicalEntity, DetectionSource, EntityGroup, EntityType, Selection, TokenGroup,
};
use crate::anonymization::replacement::{ReplacementEngine, ReplacementRule, RewriteResult};
use crate::anonymization::scan::find_literal;
use crate::anonymization::tokens::TokenGenerator;
use crate::domain::{EntityId, GroupId, PseudonymError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Serializable state of one document, as kept by the session store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub document: String,
    pub entities: Vec<CanonicalEntity>,
    #[serde(default)]
    pub groups: Vec<EntityGroup>,
}

/// Caller-owned entity and group state for one document
#[derive(Debug)]
pub struct EntityManager {
    pub(super) document: String,
    pub(super) entities: Vec<CanonicalEntity>,
    pub(super) groups: Vec<EntityGroup>,
    pub(super) tokens: TokenGenerator,
    pub(super) token_cache: OnceLock<Vec<TokenGroup>>,
}

impl EntityManager {
    pub fn new(document: impl Into<String>, entities: Vec<CanonicalEntity>, tokens: TokenGenerator) -> Self {
        Self {
            document: document.into(),
            entities,
            groups: Vec::new(),
            tokens,
            token_cache: OnceLock::new(),
        }
    }

    /// Restore a stored snapshot, dropping dangling group references
    pub fn from_snapshot(snapshot: EntitySnapshot, tokens: TokenGenerator) -> Self {
        let mut manager = Self {
            document: snapshot.document,
            entities: snapshot.entities,
            groups: snapshot.groups,
            tokens,
            token_cache: OnceLock::new(),
        };
        let cleaned = manager.cleanup_orphaned_references();
        if cleaned > 0 {
            tracing::warn!(cleaned, "Snapshot contained orphaned group references");
        }
        manager
    }

    pub fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            document: self.document.clone(),
            entities: self.entities.clone(),
            groups: self.groups.clone(),
        }
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn entities(&self) -> &[CanonicalEntity] {
        &self.entities
    }

    pub fn entity(&self, id: &EntityId) -> Option<&CanonicalEntity> {
        self.entities.iter().find(|entity| &entity.id == id)
    }

    pub fn groups(&self) -> &[EntityGroup] {
        &self.groups
    }

    pub fn group(&self, id: &GroupId) -> Option<&EntityGroup> {
        self.groups.iter().find(|group| &group.id == id)
    }

    pub fn tokens(&self) -> &TokenGenerator {
        &self.tokens
    }

    pub(super) fn invalidate(&mut self) {
        self.token_cache = OnceLock::new();
    }

    pub(super) fn index_of(&self, id: &EntityId) -> Result<usize> {
        self.entities
            .iter()
            .position(|entity| &entity.id == id)
            .ok_or_else(|| PseudonymError::NotFound(format!("Entity {id}")))
    }

    pub(super) fn group_index(&self, id: &GroupId) -> Result<usize> {
        self.groups
            .iter()
            .position(|group| &group.id == id)
            .ok_or_else(|| PseudonymError::NotFound(format!("Group {id}")))
    }

    pub(super) fn default_replacement(&self, index: usize) -> String {
        let entity = &self.entities[index];
        self.tokens.default_for(entity.entity_type, &entity.text)
    }

    fn ensure_unique_text(&self, text: &str, except: Option<&EntityId>) -> Result<()> {
        let key = normalize_key(text);
        let duplicate = self
            .entities
            .iter()
            .any(|entity| Some(&entity.id) != except && normalize_key(&entity.text) == key);
        if duplicate {
            return Err(PseudonymError::Validation(format!(
                "An entity with text '{}' already exists",
                text.trim()
            )));
        }
        Ok(())
    }

    /// Add a reviewer-supplied entity
    ///
    /// The text must occur in the document and must not duplicate an
    /// existing entity's normalized text.
    pub fn add_entity(&mut self, text: &str, entity_type: EntityType) -> Result<EntityId> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PseudonymError::Validation("Entity text cannot be empty".to_string()));
        }
        self.ensure_unique_text(text, None)?;

        let spans = find_literal(&self.document, text);
        let Some(first) = spans.first().copied() else {
            return Err(PseudonymError::Validation(format!(
                "'{text}' does not occur in the document"
            )));
        };

        let key = normalize_key(text);
        let mut id = EntityId::from_key(&key);
        let mut salt = 1;
        while self.entity(&id).is_some() {
            id = EntityId::from_key(&format!("{key}#{salt}"));
            salt += 1;
        }

        let validation = validators::validate(entity_type, text);
        let mut entity = CanonicalEntity::new(id.clone(), text, entity_type, first, DetectionSource::Manual)?;
        entity.occurrences = spans.len();
        entity.valid = validation.valid;
        entity.subtype = validation.subtype.map(str::to_string);
        entity.replacement = self.tokens.default_for(entity_type, text);

        tracing::info!(entity_id = %id, entity_type = %entity_type, "Manual entity added");
        self.entities.push(entity);
        self.invalidate();
        Ok(id)
    }

    /// Correct an entity's text; its occurrences and span are recomputed
    ///
    /// A default replacement follows the new text, a custom one is kept.
    pub fn update_text(&mut self, id: &EntityId, text: &str) -> Result<()> {
        let index = self.index_of(id)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(PseudonymError::Validation("Entity text cannot be empty".to_string()));
        }
        self.ensure_unique_text(text, Some(id))?;

        let spans = find_literal(&self.document, text);
        let Some(first) = spans.first().copied() else {
            return Err(PseudonymError::Validation(format!(
                "'{text}' does not occur in the document"
            )));
        };

        let entity = &self.entities[index];
        let follows_default =
            !entity.is_grouped && self.tokens.is_default(entity.entity_type, &entity.text, &entity.replacement);
        let validation = validators::validate(entity.entity_type, text);

        let entity = &mut self.entities[index];
        entity.text = text.to_string();
        entity.span = first;
        entity.occurrences = spans.len();
        entity.valid = validation.valid;
        entity.subtype = validation.subtype.map(str::to_string);
        if follows_default {
            entity.replacement = self.tokens.default_for(entity.entity_type, text);
        }

        if let Some(group_id) = self.entities[index].group_id.clone() {
            self.refresh_group_variants(&group_id);
        }
        self.invalidate();
        Ok(())
    }

    /// Give one entity its own replacement; a grouped entity leaves its group
    pub fn set_replacement(&mut self, id: &EntityId, replacement: &str) -> Result<()> {
        let index = self.index_of(id)?;
        let replacement = replacement.trim();
        if replacement.is_empty() {
            return Err(PseudonymError::Validation("Replacement cannot be empty".to_string()));
        }
        if self.entities[index].replacement == replacement {
            return Ok(());
        }

        self.detach(index);
        self.entities[index].replacement = replacement.to_string();
        self.invalidate();
        Ok(())
    }

    pub fn set_selected(&mut self, id: &EntityId, selected: bool) -> Result<()> {
        let index = self.index_of(id)?;
        self.entities[index].selected = selected;
        Ok(())
    }

    /// Apply reviewer decisions; nothing changes if any id is unknown
    pub fn apply_selections(&mut self, selections: &[Selection]) -> Result<usize> {
        for selection in selections {
            self.index_of(&selection.entity_id)?;
            if selection.replacement.as_deref().is_some_and(|r| r.trim().is_empty()) {
                return Err(PseudonymError::Validation(format!(
                    "Empty replacement for entity {}",
                    selection.entity_id
                )));
            }
        }

        for selection in selections {
            self.set_selected(&selection.entity_id, selection.selected)?;
            if let Some(replacement) = &selection.replacement {
                self.set_replacement(&selection.entity_id, replacement)?;
            }
        }

        tracing::debug!(selections = selections.len(), "Reviewer selections applied");
        Ok(selections.len())
    }

    /// Remove an entity and every group reference to it
    pub fn delete_entity(&mut self, id: &EntityId) -> Result<CanonicalEntity> {
        let index = self.index_of(id)?;
        self.detach(index);
        let removed = self.entities.remove(index);
        self.cleanup_orphaned_references();
        self.invalidate();
        tracing::info!(entity_id = %id, "Entity deleted");
        Ok(removed)
    }

    /// Bind `member_ids` to one shared replacement
    ///
    /// Without an explicit replacement the first member's default token is
    /// used. Members leave any group they were in.
    pub fn create_group(
        &mut self,
        name: &str,
        member_ids: &[EntityId],
        replacement: Option<&str>,
    ) -> Result<GroupId> {
        let Some(first) = member_ids.first() else {
            return Err(PseudonymError::Validation("A group needs at least one member".to_string()));
        };
        for id in member_ids {
            self.index_of(id)?;
        }

        let first_index = self.index_of(first)?;
        let replacement = match replacement.map(str::trim) {
            Some("") => {
                return Err(PseudonymError::Validation("Replacement cannot be empty".to_string()))
            }
            Some(replacement) => replacement.to_string(),
            None => self.default_replacement(first_index),
        };

        let group = EntityGroup::new(name.trim(), replacement, self.entities[first_index].entity_type);
        let group_id = group.id.clone();
        self.groups.push(group);

        for id in member_ids {
            self.attach(id, &group_id)?;
        }

        tracing::info!(group_id = %group_id, members = member_ids.len(), "Entity group created");
        self.invalidate();
        Ok(group_id)
    }

    /// Move an entity into a group; returns false if it was already a member
    pub fn add_to_group(&mut self, group_id: &GroupId, entity_id: &EntityId) -> Result<bool> {
        let group_index = self.group_index(group_id)?;
        self.index_of(entity_id)?;
        if self.groups[group_index].contains(entity_id) {
            return Ok(false);
        }
        self.attach(entity_id, group_id)?;
        self.invalidate();
        Ok(true)
    }

    /// Take one member out of a group; it gets its type's default token back
    pub fn remove_from_group(&mut self, group_id: &GroupId, entity_id: &EntityId) -> Result<()> {
        let group_index = self.group_index(group_id)?;
        if !self.groups[group_index].contains(entity_id) {
            return Err(PseudonymError::NotFound(format!(
                "Entity {entity_id} in group {group_id}"
            )));
        }

        let index = self.index_of(entity_id)?;
        self.detach(index);
        self.entities[index].replacement = self.default_replacement(index);
        self.invalidate();
        Ok(())
    }

    /// Dissolve a group
    ///
    /// Every member gets its type's default token, not whatever custom
    /// replacement it had before joining.
    pub fn ungroup(&mut self, group_id: &GroupId) -> Result<Vec<EntityId>> {
        let group_index = self.group_index(group_id)?;
        let group = self.groups.remove(group_index);

        for id in group.member_ids() {
            if let Ok(index) = self.index_of(id) {
                self.entities[index].clear_group();
                self.entities[index].replacement = self.default_replacement(index);
            }
        }

        tracing::info!(group_id = %group_id, members = group.member_ids().len(), "Entity group dissolved");
        self.invalidate();
        Ok(group.member_ids().to_vec())
    }

    /// Join `entity_id` to `group_id`, leaving any previous group first
    pub(super) fn attach(&mut self, entity_id: &EntityId, group_id: &GroupId) -> Result<()> {
        let index = self.index_of(entity_id)?;
        if self.entities[index].group_id.as_ref() != Some(group_id) {
            self.detach(index);
        }

        let group_index = self.group_index(group_id)?;
        self.groups[group_index].add_member(entity_id.clone());
        let replacement = self.groups[group_index].replacement.clone();

        let entity = &mut self.entities[index];
        entity.group_id = Some(group_id.clone());
        entity.is_grouped = true;
        entity.replacement = replacement;

        self.refresh_group_variants(group_id);
        Ok(())
    }

    /// Leave the current group, if any; an emptied group is deleted
    ///
    /// The entity keeps its current replacement.
    pub(super) fn detach(&mut self, index: usize) {
        let Some(group_id) = self.entities[index].group_id.clone() else {
            self.entities[index].clear_group();
            return;
        };
        let entity_id = self.entities[index].id.clone();
        self.entities[index].clear_group();

        if let Ok(group_index) = self.group_index(&group_id) {
            self.groups[group_index].remove_member(&entity_id);
            if self.groups[group_index].is_empty() {
                self.groups.remove(group_index);
                tracing::debug!(group_id = %group_id, "Empty entity group removed");
            } else {
                self.refresh_group_variants(&group_id);
            }
        }
    }

    /// Copy the member texts of a group onto every member
    pub(super) fn refresh_group_variants(&mut self, group_id: &GroupId) {
        let Ok(group_index) = self.group_index(group_id) else {
            return;
        };
        let members: HashSet<&EntityId> = self.groups[group_index].member_ids().iter().collect();
        let variants: Vec<String> = self
            .entities
            .iter()
            .filter(|entity| members.contains(&entity.id))
            .map(|entity| entity.text.clone())
            .collect();

        let members: HashSet<EntityId> = members.into_iter().cloned().collect();
        for entity in self.entities.iter_mut().filter(|e| members.contains(&e.id)) {
            entity.group_variants = variants.clone();
        }
    }

    /// One rule per selected entity
    ///
    /// Entities count as grouped when they belong to an explicit group or
    /// share their token with another selected entity.
    pub fn rules(&self) -> Result<Vec<ReplacementRule>> {
        let mut token_use: HashMap<&str, usize> = HashMap::new();
        for entity in self.entities.iter().filter(|entity| entity.selected) {
            *token_use.entry(entity.replacement.as_str()).or_insert(0) += 1;
        }

        self.entities
            .iter()
            .filter(|entity| entity.selected)
            .map(|entity| {
                let rule = ReplacementRule::from_entity(entity)?;
                let shared = token_use.get(entity.replacement.as_str()).copied().unwrap_or(0) > 1;
                Ok(if shared && !rule.is_grouped {
                    rule.grouped(None)
                } else {
                    rule
                })
            })
            .collect()
    }

    /// Rewrite the document with a fresh engine
    pub fn rewrite(&self) -> Result<RewriteResult> {
        self.rewrite_text(&self.document)
    }

    /// Rewrite any text (e.g. one document block) with this document's rules
    pub fn rewrite_text(&self, text: &str) -> Result<RewriteResult> {
        let mut engine = ReplacementEngine::new();
        for rule in self.rules()? {
            engine.add_rule(rule)?;
        }
        engine.apply(text)
    }
}
