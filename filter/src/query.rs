// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};

use crate::component::EntityType;
use crate::filter::PropFilter;
use crate::predicate::Predicate;

/// A compiled query: the predicate pushed to the backend plus the
/// prop-filters left for the post-filter phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    /// Pushed predicate; `None` returns every entity.
    pub predicate: Option<Predicate>,
    /// Whether candidates must be post-filtered.
    pub post_filter: bool,
    /// Residual filters for `VEVENT` candidates.
    pub event_filters: Vec<PropFilter>,
    /// Residual filters for `VTODO` candidates.
    pub todo_filters: Vec<PropFilter>,
    /// Residual filters for `VJOURNAL` candidates.
    pub journal_filters: Vec<PropFilter>,
    /// Residual filters for `VFREEBUSY` candidates.
    pub freebusy_filters: Vec<PropFilter>,
    /// Residual filters for `VALARM` sub-components, by parent entity type.
    pub alarm_filters: BTreeMap<EntityType, Vec<PropFilter>>,
}

impl EventQuery {
    /// Residual filters on the entity's own properties.
    ///
    /// Always empty for [`EntityType::Alarm`]; alarm residuals belong to their
    /// parent, see [`EventQuery::alarm_filters_for`].
    #[must_use]
    pub fn filters_for(&self, entity: EntityType) -> &[PropFilter] {
        match entity {
            EntityType::Event => &self.event_filters,
            EntityType::Todo => &self.todo_filters,
            EntityType::Journal => &self.journal_filters,
            EntityType::FreeBusy => &self.freebusy_filters,
            EntityType::Alarm => &[],
        }
    }

    /// Residual filters on the `VALARM`s of `parent` entities.
    #[must_use]
    pub fn alarm_filters_for(&self, parent: EntityType) -> &[PropFilter] {
        self.alarm_filters.get(&parent).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn defer(&mut self, entity: EntityType, filters: Vec<PropFilter>) {
        if filters.is_empty() {
            return;
        }
        self.post_filter = true;
        match entity {
            EntityType::Event => self.event_filters.extend(filters),
            EntityType::Todo => self.todo_filters.extend(filters),
            EntityType::Journal => self.journal_filters.extend(filters),
            EntityType::FreeBusy => self.freebusy_filters.extend(filters),
            EntityType::Alarm => self.defer_alarm(entity, filters),
        }
    }

    pub(crate) fn defer_alarm(&mut self, parent: EntityType, filters: Vec<PropFilter>) {
        if filters.is_empty() {
            return;
        }
        self.post_filter = true;
        self.alarm_filters.entry(parent).or_default().extend(filters);
    }
}

/// What the backend index can evaluate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchCapabilities {
    /// The index keeps original case, so case-sensitive text matches can be
    /// pushed.
    pub case_sensitive_text: bool,
}

/// Per-request compile options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Property names the caller may not filter on, upper-cased.
    pub forbidden: BTreeSet<String>,
    /// Backend index capabilities.
    pub capabilities: SearchCapabilities,
}

impl CompileOptions {
    /// Forbids filtering on `property`.
    #[must_use]
    pub fn forbid(mut self, property: &str) -> Self {
        self.forbidden.insert(property.to_ascii_uppercase());
        self
    }

    /// Sets the backend capabilities.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: SearchCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub(crate) fn is_forbidden(&self, property: &str) -> bool {
        self.forbidden.contains(&property.to_ascii_uppercase())
    }
}
