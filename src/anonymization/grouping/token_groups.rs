//! Token-derived groups
//!
//! A token group is every entity whose replacement is currently the same
//! string. Editing a token group rewrites the replacements of its entities
//! and of any explicit group holding that token, so both views stay in step.

use super::manager::EntityManager;
use crate::anonymization::models::{EntityType, TokenGroup, TokenVariant};
use crate::anonymization::names::NameCanonicalizer;
use crate::anonymization::scan::LiteralScanner;
use crate::domain::{EntityId, PseudonymError, Result};
use std::collections::HashMap;

impl EntityManager {
    /// Token groups in first-seen token order, cached until the next edit
    pub fn token_groups(&self) -> &[TokenGroup] {
        self.token_cache.get_or_init(|| self.build_token_groups())
    }

    pub fn token_group(&self, token: &str) -> Option<&TokenGroup> {
        self.token_groups().iter().find(|group| group.token == token)
    }

    fn build_token_groups(&self) -> Vec<TokenGroup> {
        let occurrences = LiteralScanner::new(self.entities.iter().map(|e| e.text.as_str()))
            .map(|scanner| scanner.find_all(&self.document))
            .unwrap_or_else(|_| vec![Vec::new(); self.entities.len()]);

        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<TokenGroup> = Vec::new();

        for (entity, spans) in self.entities.iter().zip(occurrences) {
            if entity.replacement.is_empty() {
                continue;
            }
            let slot = *index.entry(entity.replacement.as_str()).or_insert_with(|| {
                groups.push(TokenGroup {
                    token: entity.replacement.clone(),
                    entity_type: entity.entity_type,
                    variants: Vec::new(),
                    total_occurrences: 0,
                });
                groups.len() - 1
            });

            let group = &mut groups[slot];
            group.total_occurrences += spans.len();
            group.variants.push(TokenVariant {
                entity_id: entity.id.clone(),
                text: entity.text.clone(),
                occurrences: spans.len(),
                spans,
            });
        }

        groups
    }

    fn require_token(&self, token: &str) -> Result<()> {
        if self.token_group(token).is_none() {
            return Err(PseudonymError::NotFound(format!("Token {token}")));
        }
        Ok(())
    }

    fn checked_token(token: &str) -> Result<&str> {
        let token = token.trim();
        if token.is_empty() {
            return Err(PseudonymError::Validation("Token cannot be empty".to_string()));
        }
        Ok(token)
    }

    /// Replace `token` everywhere with `new_token`; returns entities changed
    ///
    /// Renaming onto a token already in use is rejected; that is a merge.
    pub fn rename_token(&mut self, token: &str, new_token: &str) -> Result<usize> {
        let new_token = Self::checked_token(new_token)?;
        self.require_token(token)?;
        if new_token == token {
            return Ok(0);
        }
        if self.token_group(new_token).is_some() {
            return Err(PseudonymError::Validation(format!(
                "Token {new_token} is already in use, merge the tokens instead"
            )));
        }

        let changed = self.retarget(token, new_token);
        tracing::info!(changed, "Token renamed");
        Ok(changed)
    }

    /// Move all entities of `source` onto `target`; returns entities moved
    ///
    /// If an explicit group holds either token, every entity on the merged
    /// token ends up in that group, the one holding `target` first. Other
    /// groups on the two tokens are folded into it.
    pub fn merge_tokens(&mut self, source: &str, target: &str) -> Result<usize> {
        self.require_token(source)?;
        self.require_token(target)?;
        if source == target {
            return Err(PseudonymError::Validation(
                "Cannot merge a token into itself".to_string(),
            ));
        }

        let owner = self
            .groups
            .iter()
            .find(|group| group.replacement == target)
            .or_else(|| self.groups.iter().find(|group| group.replacement == source))
            .map(|group| group.id.clone());

        let moved = self.retarget(source, target);

        if let Some(owner) = owner {
            let joining: Vec<EntityId> = self
                .entities
                .iter()
                .filter(|entity| entity.replacement == target && entity.group_id.as_ref() != Some(&owner))
                .map(|entity| entity.id.clone())
                .collect();
            for id in &joining {
                self.attach(id, &owner)?;
            }
            self.invalidate();
        }

        tracing::info!(moved, "Tokens merged");
        Ok(moved)
    }

    /// Give one variant of `token` its own token
    ///
    /// The new token defaults to the entity's type default. The entity
    /// leaves any explicit group, which keeps the old token.
    pub fn split_variant(
        &mut self,
        token: &str,
        entity_id: &EntityId,
        new_token: Option<&str>,
    ) -> Result<String> {
        let index = self.index_of(entity_id)?;
        if self.entities[index].replacement != token {
            return Err(PseudonymError::Validation(format!(
                "Entity {entity_id} does not use token {token}"
            )));
        }

        let new_token = match new_token {
            Some(new_token) => Self::checked_token(new_token)?.to_string(),
            None => self.default_replacement(index),
        };
        if new_token == token || self.token_group(&new_token).is_some() {
            return Err(PseudonymError::Validation(format!(
                "Token {new_token} is already in use"
            )));
        }

        self.detach(index);
        self.entities[index].replacement = new_token.clone();
        self.invalidate();
        tracing::info!(entity_id = %entity_id, "Variant split to a new token");
        Ok(new_token)
    }

    /// Move one entity onto an existing token
    ///
    /// If an explicit group holds `to_token`, the entity joins that group.
    pub fn reassign_variant(&mut self, entity_id: &EntityId, to_token: &str) -> Result<()> {
        let index = self.index_of(entity_id)?;
        self.require_token(to_token)?;
        if self.entities[index].replacement == to_token {
            return Ok(());
        }

        let owner = self
            .groups
            .iter()
            .find(|group| group.replacement == to_token)
            .map(|group| group.id.clone());

        match owner {
            Some(group_id) => self.attach(entity_id, &group_id)?,
            None => {
                self.detach(index);
                self.entities[index].replacement = to_token.to_string();
            }
        }
        self.invalidate();
        Ok(())
    }

    /// Delete every entity using `token`; returns their ids
    pub fn delete_token_group(&mut self, token: &str) -> Result<Vec<EntityId>> {
        self.require_token(token)?;
        let doomed: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|entity| entity.replacement == token)
            .map(|entity| entity.id.clone())
            .collect();

        for id in &doomed {
            self.delete_entity(id)?;
        }
        tracing::info!(deleted = doomed.len(), "Token group deleted");
        Ok(doomed)
    }

    /// Group ungrouped person entities whose names match
    ///
    /// Each cluster of two or more entities becomes an explicit group using
    /// the first member's token. Returns the number of groups created.
    pub fn auto_group_similar_names(&mut self, names: &NameCanonicalizer) -> Result<usize> {
        let persons: Vec<(EntityId, String)> = self
            .entities
            .iter()
            .filter(|entity| entity.entity_type == EntityType::Person && !entity.is_grouped)
            .map(|entity| (entity.id.clone(), entity.text.clone()))
            .collect();

        let mut clusters: Vec<(String, Vec<EntityId>)> = Vec::new();
        for (id, text) in persons {
            let found = names.find_match(
                &text,
                Some(clusters.iter().map(|(representative, _)| representative.as_str())),
            );
            match found.and_then(|found| {
                clusters
                    .iter()
                    .position(|(representative, _)| representative == &found.candidate)
            }) {
                Some(position) => clusters[position].1.push(id),
                None => clusters.push((text, vec![id])),
            }
        }

        let mut created = 0;
        for (representative, members) in clusters.into_iter().filter(|(_, m)| m.len() > 1) {
            let name = names.normalize(&representative).canonical;
            let token = self
                .entity(&members[0])
                .map(|entity| entity.replacement.clone())
                .unwrap_or_default();
            let token = (!token.is_empty()).then_some(token);
            self.create_group(&name, &members, token.as_deref())?;
            created += 1;
        }

        if created > 0 {
            tracing::info!(groups = created, "Similar person names grouped");
        }
        Ok(created)
    }

    /// Point every entity and explicit group using `from` at `to`
    fn retarget(&mut self, from: &str, to: &str) -> usize {
        let mut changed = 0;
        for entity in self.entities.iter_mut().filter(|e| e.replacement == from) {
            entity.replacement = to.to_string();
            changed += 1;
        }
        for group in self.groups.iter_mut().filter(|g| g.replacement == from) {
            group.replacement = to.to_string();
        }
        self.invalidate();
        changed
    }
}
