// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! The comp-filter / prop-filter / param-filter tree.
//!
//! Nodes own their children and carry no parent link; every walk is top-down
//! and passes the depth along.

use crate::component::{Component, Property};
use crate::text_match::TextMatch;
use crate::timerange::TimeRange;

fn generated_name() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// What a `<param-filter>` tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamTest {
    /// `<is-not-defined/>`.
    IsNotDefined,
    /// `<text-match>`.
    TextMatch(TextMatch),
}

/// A `<param-filter>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamFilter {
    /// Node name, unique within a filter set.
    pub name: String,
    /// Parameter tested.
    pub param_name: String,
    /// Test to apply.
    pub test: ParamTest,
}

impl ParamFilter {
    /// Creates a param-filter with a generated node name.
    pub fn new(param_name: impl Into<String>, test: ParamTest) -> Self {
        Self {
            name: generated_name(),
            param_name: param_name.into(),
            test,
        }
    }

    /// Evaluates the filter against a property.
    #[must_use]
    pub fn matches(&self, property: &Property) -> bool {
        match (property.param(&self.param_name), &self.test) {
            (None, ParamTest::IsNotDefined) => true,
            (None, ParamTest::TextMatch(_)) | (Some(_), ParamTest::IsNotDefined) => false,
            (Some(value), ParamTest::TextMatch(m)) => m.matches(Some(value)),
        }
    }
}

/// What a `<prop-filter>` tests, besides its param-filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropTest {
    /// No test element: the property must exist.
    Defined,
    /// `<is-not-defined/>`.
    IsNotDefined,
    /// `<time-range>` on a date-valued property.
    TimeRange(TimeRange),
    /// `<text-match>` on the raw value.
    TextMatch(TextMatch),
}

/// A `<prop-filter>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropFilter {
    /// Node name, unique within a filter set.
    pub name: String,
    /// Property tested.
    pub property_name: String,
    /// Test to apply.
    pub test: PropTest,
    /// Parameter tests; any one matching suffices.
    pub param_filters: Vec<ParamFilter>,
}

impl PropFilter {
    /// Creates a prop-filter with a generated node name and no param-filters.
    pub fn new(property_name: impl Into<String>, test: PropTest) -> Self {
        Self {
            name: generated_name(),
            property_name: property_name.into(),
            test,
            param_filters: Vec::new(),
        }
    }

    /// Adds a param-filter.
    #[must_use]
    pub fn with_param_filter(mut self, param_filter: ParamFilter) -> Self {
        self.param_filters.push(param_filter);
        self
    }

    /// Whether the filter is `<is-not-defined/>`.
    #[must_use]
    pub const fn is_not_defined(&self) -> bool {
        matches!(self.test, PropTest::IsNotDefined)
    }

    /// Evaluates the filter against a materialized component.
    ///
    /// Only the first property with the name is tested. Sibling
    /// param-filters combine with OR. Values that cannot be evaluated, such
    /// as unparseable dates, never match.
    #[must_use]
    pub fn matches(&self, component: &Component) -> bool {
        let Some(property) = component.property(&self.property_name) else {
            return self.is_not_defined();
        };

        let value_ok = match &self.test {
            PropTest::IsNotDefined => return false,
            PropTest::TextMatch(m) => m.matches(Some(&property.value)),
            PropTest::TimeRange(range) => range.property_matches(property),
            PropTest::Defined => true,
        };

        value_ok
            && (self.param_filters.is_empty()
                || self.param_filters.iter().any(|pf| pf.matches(property)))
    }
}

/// A `<comp-filter>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompFilter {
    /// Node name, unique within a filter set.
    pub name: String,
    /// Component tested, e.g. `VEVENT`.
    pub component_name: String,
    /// `<is-not-defined/>`; excludes a time-range and children.
    pub is_not_defined: bool,
    /// `<time-range>` on the component.
    pub time_range: Option<TimeRange>,
    /// Nested comp-filters.
    pub comp_filters: Vec<CompFilter>,
    /// Property filters.
    pub prop_filters: Vec<PropFilter>,
}

impl CompFilter {
    /// Creates a comp-filter matching any component named `component_name`.
    pub fn new(component_name: impl Into<String>) -> Self {
        Self {
            name: generated_name(),
            component_name: component_name.into(),
            is_not_defined: false,
            time_range: None,
            comp_filters: Vec::new(),
            prop_filters: Vec::new(),
        }
    }

    /// Creates a comp-filter matching components that do not exist.
    pub fn not_defined(component_name: impl Into<String>) -> Self {
        Self {
            is_not_defined: true,
            ..Self::new(component_name)
        }
    }

    /// Sets the time-range.
    #[must_use]
    pub fn with_time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    /// Adds a nested comp-filter.
    #[must_use]
    pub fn with_comp_filter(mut self, filter: CompFilter) -> Self {
        self.comp_filters.push(filter);
        self
    }

    /// Adds a prop-filter.
    #[must_use]
    pub fn with_prop_filter(mut self, filter: PropFilter) -> Self {
        self.prop_filters.push(filter);
        self
    }

    /// Whether the filter tests only existence.
    #[must_use]
    pub fn matches_all(&self) -> bool {
        self.time_range.is_none() && self.comp_filters.is_empty() && self.prop_filters.is_empty()
    }
}
