// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Backend search predicates produced by the filter compiler.

use std::fmt;

use crate::component::{Component, EntityType, Property};
use crate::property::PropertyIndex;
use crate::text_match::TextMatch;
use crate::timerange::TimeRange;

/// A search predicate a backend index can evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Predicate {
    /// The stored entity has this type.
    EntityType(EntityType),

    /// The property is (or is not) set.
    Presence {
        /// Property tested.
        property: PropertyIndex,
        /// Expected presence.
        present: bool,
    },

    /// A date value lies in the range.
    TimeRange {
        /// Property tested; `None` tests the entity's own start and end.
        property: Option<PropertyIndex>,
        /// Range to test against.
        range: TimeRange,
    },

    /// A text value contains a substring.
    TextMatch {
        /// Property tested.
        property: PropertyIndex,
        /// Matcher to apply.
        matcher: TextMatch,
    },

    /// All children hold.
    And(Vec<Predicate>),

    /// At least one child holds.
    Or(Vec<Predicate>),

    /// The child does not hold.
    Not(Box<Predicate>),

    /// Some `VALARM` of the entity satisfies the child.
    Alarm(Box<Predicate>),
}

impl Predicate {
    /// Conjunction of `preds`, flattening nested conjunctions.
    ///
    /// Returns `None` for an empty list and the sole element for a singleton.
    #[must_use]
    pub fn all(preds: impl IntoIterator<Item = Predicate>) -> Option<Predicate> {
        let mut flat = Vec::new();
        for p in preds {
            match p {
                Predicate::And(children) => flat.extend(children),
                p => flat.push(p),
            }
        }
        collapse(flat, Predicate::And)
    }

    /// Disjunction of `preds`, flattening nested disjunctions.
    ///
    /// Returns `None` for an empty list and the sole element for a singleton.
    #[must_use]
    pub fn any(preds: impl IntoIterator<Item = Predicate>) -> Option<Predicate> {
        let mut flat = Vec::new();
        for p in preds {
            match p {
                Predicate::Or(children) => flat.extend(children),
                p => flat.push(p),
            }
        }
        collapse(flat, Predicate::Or)
    }

    /// Negation, removing a double negation.
    #[must_use]
    pub fn negate(self) -> Predicate {
        match self {
            Predicate::Not(inner) => *inner,
            p => Predicate::Not(Box::new(p)),
        }
    }

    /// The entity type every match must have, if the predicate pins one.
    #[must_use]
    pub fn entity_hint(&self) -> Option<EntityType> {
        match self {
            Predicate::EntityType(t) => Some(*t),
            Predicate::And(children) => children.iter().find_map(Predicate::entity_hint),
            _ => None,
        }
    }

    /// Evaluates the predicate against a materialized entity.
    ///
    /// Property leaves see only the entity's own properties; alarm properties
    /// are reached through [`Predicate::Alarm`].
    #[must_use]
    pub fn evaluate(&self, entity: &Component) -> bool {
        match self {
            Predicate::EntityType(t) => entity.entity_type() == Some(*t),
            Predicate::Presence { property, present } => {
                let found = match property {
                    PropertyIndex::Valarm => entity.components_named("VALARM").next().is_some(),
                    p => own(entity, &p.to_string()).next().is_some(),
                };
                found == *present
            }
            Predicate::TimeRange {
                property: None,
                range,
            } => range.component_overlaps(entity),
            Predicate::TimeRange {
                property: Some(PropertyIndex::Valarm),
                range,
            } => entity
                .components_named("VALARM")
                .any(|alarm| range.alarm_overlaps(alarm, Some(entity))),
            Predicate::TimeRange {
                property: Some(p),
                range,
            } => own(entity, &p.to_string()).any(|prop| range.property_matches(prop)),
            Predicate::TextMatch { property, matcher } => own(entity, &property.to_string())
                .any(|prop| matcher.matches(Some(&prop.value))),
            Predicate::And(children) => children.iter().all(|c| c.evaluate(entity)),
            Predicate::Or(children) => children.iter().any(|c| c.evaluate(entity)),
            Predicate::Not(inner) => !inner.evaluate(entity),
            Predicate::Alarm(inner) => entity
                .components_named("VALARM")
                .any(|alarm| inner.evaluate(alarm)),
        }
    }

    const fn is_compound(&self) -> bool {
        matches!(self, Predicate::And(_) | Predicate::Or(_))
    }
}

fn collapse(mut flat: Vec<Predicate>, wrap: fn(Vec<Predicate>) -> Predicate) -> Option<Predicate> {
    match flat.len() {
        0 => None,
        1 => flat.pop(),
        _ => Some(wrap(flat)),
    }
}

fn own<'a>(comp: &'a Component, name: &'a str) -> impl Iterator<Item = &'a Property> + 'a {
    comp.properties
        .iter()
        .filter(move |p| p.name.eq_ignore_ascii_case(name))
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::EntityType(t) => write!(f, "EntityType={t}"),
            Predicate::Presence { property, present } => {
                if *present {
                    write!(f, "{property} IS DEFINED")
                } else {
                    write!(f, "{property} IS NOT DEFINED")
                }
            }
            Predicate::TimeRange { property, range } => match property {
                Some(p) => write!(f, "{p} IN {range}"),
                None => write!(f, "Entity IN {range}"),
            },
            Predicate::TextMatch { property, matcher } => write!(f, "{property}{matcher}"),
            Predicate::And(children) => join(f, children, " AND "),
            Predicate::Or(children) => join(f, children, " OR "),
            Predicate::Not(inner) if inner.is_compound() => write!(f, "NOT ({inner})"),
            Predicate::Not(inner) => write!(f, "NOT {inner}"),
            Predicate::Alarm(inner) if inner.is_compound() => write!(f, "VALARM WHERE ({inner})"),
            Predicate::Alarm(inner) => write!(f, "VALARM WHERE {inner}"),
        }
    }
}

fn join(f: &mut fmt::Formatter<'_>, children: &[Predicate], sep: &str) -> fmt::Result {
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        if child.is_compound() {
            write!(f, "({child})")?;
        } else {
            write!(f, "{child}")?;
        }
    }
    Ok(())
}
