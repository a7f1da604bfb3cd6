// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Backend collaborators: the search interface and an in-memory store.

use std::convert::Infallible;

use crate::component::{Component, EntityType};
use crate::predicate::Predicate;

/// How much of each entity the backend should return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetrievalMode {
    /// Every matching entity.
    #[default]
    Full,
    /// At most this many entities (`<limit><nresults>`).
    Limit(usize),
}

/// A backend index able to search stored entities.
pub trait SearchBackend {
    /// Entity handed back by a search.
    type Entity;
    /// Search failure.
    type Error;

    /// Returns the entities matching `predicate`; `None` matches all.
    ///
    /// `entity_hint` narrows the search to one entity type when the predicate
    /// pins one.
    ///
    /// # Errors
    ///
    /// Backend specific.
    fn search(
        &self,
        predicate: Option<&Predicate>,
        entity_hint: Option<EntityType>,
        mode: RetrievalMode,
    ) -> Result<Vec<Self::Entity>, Self::Error>;
}

/// A search result that may be post-filtered.
pub trait Candidate {
    /// The materialized calendar component, or `None` if the node is not a
    /// calendar component.
    fn component(&self) -> Option<&Component>;

    /// Entity type of the materialized component.
    fn entity_type(&self) -> Option<EntityType> {
        self.component()
            .and_then(Component::entity)
            .map(|(entity, _)| entity)
    }
}

impl Candidate for Component {
    fn component(&self) -> Option<&Component> {
        Some(self)
    }
}

impl Candidate for Option<Component> {
    fn component(&self) -> Option<&Component> {
        self.as_ref()
    }
}

/// An in-memory backend evaluating predicates with [`Predicate::evaluate`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entities: Vec<Component>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an entity, either bare (`VEVENT`) or wrapped in `VCALENDAR`.
    pub fn insert(&mut self, component: Component) {
        self.entities.push(component);
    }

    /// Number of stored entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl FromIterator<Component> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = Component>>(iter: I) -> Self {
        Self {
            entities: iter.into_iter().collect(),
        }
    }
}

impl SearchBackend for MemoryStore {
    type Entity = Component;
    type Error = Infallible;

    fn search(
        &self,
        predicate: Option<&Predicate>,
        entity_hint: Option<EntityType>,
        mode: RetrievalMode,
    ) -> Result<Vec<Component>, Infallible> {
        let limit = match mode {
            RetrievalMode::Full => usize::MAX,
            RetrievalMode::Limit(n) => n,
        };

        let found: Vec<Component> = self
            .entities
            .iter()
            .filter(|stored| {
                let Some((entity, comp)) = stored.entity() else {
                    return false;
                };
                entity_hint.is_none_or(|hint| hint == entity)
                    && predicate.is_none_or(|p| p.evaluate(comp))
            })
            .take(limit)
            .cloned()
            .collect();

        tracing::trace!(hits = found.len(), total = self.entities.len(), "memory search");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        [
            Component::new("VEVENT").with("SUMMARY", "Standup"),
            Component::new("VCALENDAR")
                .with_component(Component::new("VTODO").with("SUMMARY", "Write report")),
            Component::new("VTIMEZONE"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn memory_store_search_all() {
        let found = store()
            .search(None, None, RetrievalMode::Full)
            .unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn memory_store_search_by_hint_and_limit() {
        let store = store();
        let todos = store
            .search(None, Some(EntityType::Todo), RetrievalMode::Full)
            .unwrap();
        assert_eq!(todos.len(), 1);
        assert_eq!(Candidate::entity_type(&todos[0]), Some(EntityType::Todo));

        let limited = store.search(None, None, RetrievalMode::Limit(1)).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn memory_store_search_evaluates_predicate() {
        let p = Predicate::EntityType(EntityType::Event);
        let found = store()
            .search(Some(&p), None, RetrievalMode::Full)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "VEVENT");
    }

    #[test]
    fn candidate_without_component() {
        let node: Option<Component> = None;
        assert_eq!(node.entity_type(), None);
    }
}
