// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Materialized calendar components, as handed over by a backend after search.
//!
//! Only name lookups are needed to evaluate filters, so the model keeps
//! property values as raw strings.

/// Calendar entity types a backend indexes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::EnumString, strum::Display,
)]
#[strum(ascii_case_insensitive)]
pub enum EntityType {
    /// `VEVENT`.
    #[strum(serialize = "VEVENT")]
    Event,
    /// `VTODO`.
    #[strum(serialize = "VTODO")]
    Todo,
    /// `VJOURNAL`.
    #[strum(serialize = "VJOURNAL")]
    Journal,
    /// `VFREEBUSY`.
    #[strum(serialize = "VFREEBUSY")]
    FreeBusy,
    /// `VALARM`.
    #[strum(serialize = "VALARM")]
    Alarm,
}

impl EntityType {
    /// Maps a component name to an entity type, ignoring case.
    #[must_use]
    pub fn from_component_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }
}

/// A property parameter (`;NAME=value`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// Parameter value, unquoted.
    pub value: String,
}

/// A property with its parameters and raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Property name.
    pub name: String,
    /// Parameters in document order.
    pub params: Vec<Parameter>,
    /// Raw value.
    pub value: String,
}

impl Property {
    /// Creates a property without parameters.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            value: value.into(),
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push(Parameter {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Value of the first parameter named `name`, ignoring case.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.value.as_str())
    }
}

/// A calendar component with its properties and sub-components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Component name, e.g. `VEVENT`.
    pub name: String,
    /// Properties in document order.
    pub properties: Vec<Property>,
    /// Nested components, e.g. `VALARM` inside `VEVENT`.
    pub components: Vec<Component>,
}

impl Component {
    /// Creates an empty component.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            components: Vec::new(),
        }
    }

    /// Appends a property.
    #[must_use]
    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Appends a property without parameters.
    #[must_use]
    pub fn with(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_property(Property::new(name, value))
    }

    /// Appends a sub-component.
    #[must_use]
    pub fn with_component(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    /// First property named `name`, ignoring case.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Sub-components named `name`, ignoring case.
    pub fn components_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Component> {
        self.components
            .iter()
            .filter(move |c| c.name.eq_ignore_ascii_case(name))
    }

    /// Entity type of this component.
    #[must_use]
    pub fn entity_type(&self) -> Option<EntityType> {
        EntityType::from_component_name(&self.name)
    }

    /// The entity this component carries.
    ///
    /// A `VCALENDAR` wrapper resolves to its first typed child.
    #[must_use]
    pub fn entity(&self) -> Option<(EntityType, &Component)> {
        if self.name.eq_ignore_ascii_case("VCALENDAR") {
            self.components
                .iter()
                .find_map(|c| c.entity_type().map(|t| (t, c)))
        } else {
            self.entity_type().map(|t| (t, self))
        }
    }
}
