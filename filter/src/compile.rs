// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Compiles a comp-filter tree into a backend predicate.
//!
//! The walk is depth-first and pre-order. Depth 0 is `VCALENDAR`, depth 1 an
//! entity type, depth 2 a sub-component indexed as a property of its parent
//! (`VALARM`). Prop-filters the index cannot evaluate are moved to the
//! post-filter lists of the [`EventQuery`].

use crate::component::EntityType;
use crate::error::FilterError;
use crate::filter::{CompFilter, PropFilter, PropTest};
use crate::predicate::Predicate;
use crate::property::PropertyIndex;
use crate::query::{CompileOptions, EventQuery};

const ELEMENT: &str = "comp-filter";

impl CompFilter {
    /// Compiles this filter, found at `depth`, into a predicate.
    ///
    /// `depth` is 0 for the `VCALENDAR` root and 1 for an entity filter;
    /// sub-component filters are compiled through their entity. Returns
    /// `Ok(None)` for a bare `VCALENDAR` filter, which matches every entity.
    /// Non-pushable prop-filters are appended to `query` and set
    /// `query.post_filter`.
    ///
    /// # Errors
    ///
    /// Any error aborts the whole compile:
    /// - [`FilterError::BadFilter`] for structural violations,
    /// - [`FilterError::UnknownProperty`] for names missing from the registry,
    /// - [`FilterError::Forbidden`] for properties in `options.forbidden`.
    pub fn compile(
        &self,
        query: &mut EventQuery,
        depth: usize,
        options: &CompileOptions,
    ) -> Result<Option<Predicate>, FilterError> {
        match depth {
            0 => self.compile_root(query, options),
            1 => self.compile_entity(query, options).map(Some),
            _ => Err(FilterError::bad(
                ELEMENT,
                format!("{} must be compiled through its entity", self.component_name),
            )),
        }
    }

    fn compile_root(
        &self,
        query: &mut EventQuery,
        options: &CompileOptions,
    ) -> Result<Option<Predicate>, FilterError> {
        if !self.component_name.eq_ignore_ascii_case("VCALENDAR") {
            return Err(FilterError::bad(
                ELEMENT,
                format!("expected VCALENDAR, found {}", self.component_name),
            ));
        }
        if self.is_not_defined || self.time_range.is_some() {
            return Err(FilterError::bad(
                ELEMENT,
                "VCALENDAR cannot carry is-not-defined or time-range",
            ));
        }
        if !self.prop_filters.is_empty() {
            return Err(FilterError::bad(
                "prop-filter",
                "property filters are not allowed on VCALENDAR",
            ));
        }

        let mut children = Vec::with_capacity(self.comp_filters.len());
        for child in &self.comp_filters {
            children.push(child.compile_entity(query, options)?);
        }
        Ok(Predicate::any(children))
    }

    fn compile_entity(
        &self,
        query: &mut EventQuery,
        options: &CompileOptions,
    ) -> Result<Predicate, FilterError> {
        let entity = self.entity()?;
        let leaf = Predicate::EntityType(entity);
        if self.is_not_defined {
            return Ok(leaf.negate());
        }
        if self.matches_all() {
            return Ok(leaf);
        }

        let mut parts = vec![leaf];
        if let Some(range) = &self.time_range {
            parts.push(Predicate::TimeRange {
                property: None,
                range: range.clone(),
            });
        }

        let (pushed, deferred) = self.compile_props(options)?;
        query.defer(entity, deferred);
        parts.extend(pushed);

        let mut alarms = Vec::with_capacity(self.comp_filters.len());
        for child in &self.comp_filters {
            alarms.push(child.compile_subcomponent(query, entity, options)?);
        }
        parts.extend(Predicate::any(alarms));

        Ok(Predicate::all(parts).unwrap_or(Predicate::EntityType(entity)))
    }

    /// Sub-components are indexed with their parent, so prop-filters pushed
    /// here are wrapped in [`Predicate::Alarm`] and residuals are kept per
    /// parent entity type.
    fn compile_subcomponent(
        &self,
        query: &mut EventQuery,
        parent: EntityType,
        options: &CompileOptions,
    ) -> Result<Predicate, FilterError> {
        let leaf = self.subcomponent_leaf(options)?;
        if !self.comp_filters.is_empty() {
            return Err(FilterError::bad(ELEMENT, "filter too deep"));
        }
        if self.is_not_defined {
            return Ok(leaf.negate());
        }

        let (pushed, deferred) = self.compile_props(options)?;
        query.defer_alarm(parent, deferred);
        Ok(match pushed {
            Some(pushed) => Predicate::And(vec![leaf, Predicate::Alarm(Box::new(pushed))]),
            None => leaf,
        })
    }

    fn entity(&self) -> Result<EntityType, FilterError> {
        match EntityType::from_component_name(&self.component_name) {
            Some(entity) if entity != EntityType::Alarm => Ok(entity),
            _ => Err(FilterError::bad(
                ELEMENT,
                format!("unsupported component {}", self.component_name),
            )),
        }
    }

    fn subcomponent_leaf(&self, options: &CompileOptions) -> Result<Predicate, FilterError> {
        let property = PropertyIndex::lookup(&self.component_name)?;
        if options.is_forbidden(&self.component_name) {
            return Err(FilterError::Forbidden(self.component_name.clone()));
        }
        Ok(match &self.time_range {
            Some(range) => Predicate::TimeRange {
                property: Some(property),
                range: range.clone(),
            },
            None => Predicate::Presence {
                property,
                present: true,
            },
        })
    }

    fn compile_props(
        &self,
        options: &CompileOptions,
    ) -> Result<(Option<Predicate>, Vec<PropFilter>), FilterError> {
        let mut pushed = Vec::new();
        let mut deferred = Vec::new();
        for pf in &self.prop_filters {
            if options.is_forbidden(&pf.property_name) {
                return Err(FilterError::Forbidden(pf.property_name.clone()));
            }

            if let Some(predicate) = pf.pushable(options)? {
                tracing::debug!(property = %pf.property_name, "pushing prop-filter to backend");
                pushed.push(predicate);
            } else {
                tracing::debug!(
                    property = %pf.property_name,
                    component = %self.component_name,
                    "deferring prop-filter to post-filter"
                );
                deferred.push(pf.clone());
            }
        }
        Ok((Predicate::any(pushed), deferred))
    }
}

impl PropFilter {
    /// The predicate for this filter if the backend index can evaluate it.
    ///
    /// Extension (`X-`) properties are never pushable.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::UnknownProperty`] for a non-extension name
    /// missing from the registry.
    pub fn pushable(&self, options: &CompileOptions) -> Result<Option<Predicate>, FilterError> {
        if PropertyIndex::is_extension(&self.property_name) {
            return Ok(None);
        }
        let property = PropertyIndex::lookup(&self.property_name)?;
        if !self.param_filters.is_empty() {
            return Ok(None);
        }

        let predicate = match &self.test {
            PropTest::Defined => Predicate::Presence {
                property,
                present: true,
            },
            PropTest::IsNotDefined => Predicate::Presence {
                property,
                present: true,
            }
            .negate(),
            PropTest::TimeRange(range) if property.is_date_valued() => Predicate::TimeRange {
                property: Some(property),
                range: range.clone(),
            },
            PropTest::TextMatch(matcher)
                if property.is_text_valued()
                    && (matcher.is_caseless() || options.capabilities.case_sensitive_text) =>
            {
                Predicate::TextMatch {
                    property,
                    matcher: matcher.clone(),
                }
            }
            PropTest::TimeRange(_) | PropTest::TextMatch(_) => return Ok(None),
        };
        Ok(Some(predicate))
    }
}
