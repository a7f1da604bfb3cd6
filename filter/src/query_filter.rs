// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Entry point: parse a `<filter>`, compile it, run it, post-filter results.

use crate::backend::{Candidate, RetrievalMode, SearchBackend};
use crate::component::Component;
use crate::error::FilterError;
use crate::filter::{CompFilter, ParamFilter, ParamTest, PropFilter, PropTest};
use crate::query::{CompileOptions, EventQuery};
use crate::text_match::{Collation, TextMatch};
use crate::timerange::TimeRange;
use crate::xml::Element;

/// A parsed `CalDAV` filter ready to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFilter {
    filter: CompFilter,
    tzid: Option<String>,
    limit: Option<usize>,
}

impl QueryFilter {
    /// Wraps an already built top-level comp-filter.
    #[must_use]
    pub fn new(filter: CompFilter) -> Self {
        Self {
            filter,
            tzid: None,
            limit: None,
        }
    }

    /// Parses a `<filter>` element or a whole `<calendar-query>` body.
    ///
    /// From a `<calendar-query>` the `<timezone>` TZID and the
    /// `<limit><nresults>` value are kept as well.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Xml`] for malformed XML and a bad filter naming
    /// the offending element for grammar violations.
    pub fn parse(xml: &str) -> Result<Self, FilterError> {
        let root = Element::parse(xml)?;
        match root.name.as_str() {
            "filter" => Ok(Self {
                filter: parse_filter(&root, None)?,
                tzid: None,
                limit: None,
            }),
            "calendar-query" => {
                let tzid = root.child("timezone").and_then(|tz| tzid_of(&tz.text));
                let limit = root.child("limit").map(parse_limit).transpose()?;
                let filter = root
                    .child("filter")
                    .ok_or_else(|| FilterError::bad("calendar-query", "missing <filter>"))?;
                Ok(Self {
                    filter: parse_filter(filter, tzid.as_deref())?,
                    tzid,
                    limit,
                })
            }
            other => Err(FilterError::bad(
                other,
                "expected <filter> or <calendar-query>",
            )),
        }
    }

    /// The top-level comp-filter.
    #[must_use]
    pub const fn filter(&self) -> &CompFilter {
        &self.filter
    }

    /// Time zone floating values are resolved in.
    #[must_use]
    pub fn tzid(&self) -> Option<&str> {
        self.tzid.as_deref()
    }

    /// Result limit requested by the client.
    #[must_use]
    pub const fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Retrieval mode matching the requested limit.
    #[must_use]
    pub fn retrieval_mode(&self) -> RetrievalMode {
        self.limit.map_or(RetrievalMode::Full, RetrievalMode::Limit)
    }

    /// Compiles with default options.
    ///
    /// # Errors
    ///
    /// See [`CompFilter::compile`].
    pub fn query(&self) -> Result<EventQuery, FilterError> {
        self.query_with(&CompileOptions::default())
    }

    /// Compiles with explicit options.
    ///
    /// # Errors
    ///
    /// See [`CompFilter::compile`].
    pub fn query_with(&self, options: &CompileOptions) -> Result<EventQuery, FilterError> {
        let mut query = EventQuery::default();
        let predicate = self.filter.compile(&mut query, 0, options)?;
        query.predicate = predicate;
        tracing::debug!(
            predicate = ?query.predicate.as_ref().map(ToString::to_string),
            post_filter = query.post_filter,
            "compiled filter"
        );
        Ok(query)
    }

    /// Runs the pushed predicate against the backend.
    ///
    /// This is the only phase touching the backend.
    ///
    /// # Errors
    ///
    /// Propagates the backend error.
    pub fn execute<B: SearchBackend>(
        &self,
        backend: &B,
        query: &EventQuery,
        mode: RetrievalMode,
    ) -> Result<Vec<B::Entity>, B::Error> {
        let hint = query.predicate.as_ref().and_then(|p| p.entity_hint());
        backend.search(query.predicate.as_ref(), hint, mode)
    }

    /// Drops candidates failing the residual prop-filters.
    ///
    /// A candidate survives when its entity type's residual list is
    /// non-empty and one of its filters matches, and, when alarm filters were
    /// compiled under its entity type, one of its `VALARM`s matches one of
    /// them. Candidates without a
    /// materialized component are dropped. Without residual filters the input
    /// is returned as is.
    pub fn post_filter<C: Candidate>(&self, query: &EventQuery, candidates: Vec<C>) -> Vec<C> {
        if !query.post_filter {
            return candidates;
        }
        if !self.filter.component_name.eq_ignore_ascii_case("VCALENDAR") {
            return Vec::new();
        }

        let before = candidates.len();
        let kept: Vec<C> = candidates
            .into_iter()
            .filter(|c| c.component().is_some_and(|comp| survives(query, comp)))
            .collect();
        tracing::debug!(before, after = kept.len(), "post-filtered candidates");
        kept
    }
}

fn survives(query: &EventQuery, component: &Component) -> bool {
    let Some((entity, comp)) = component.entity() else {
        return false;
    };

    let filters = query.filters_for(entity);
    let alarms = query.alarm_filters_for(entity);
    if filters.is_empty() && alarms.is_empty() {
        return false;
    }

    let entity_ok = filters.is_empty() || filters.iter().any(|f| f.matches(comp));
    let alarm_ok = alarms.is_empty()
        || comp
            .components_named("VALARM")
            .any(|alarm| alarms.iter().any(|f| f.matches(alarm)));
    entity_ok && alarm_ok
}

fn parse_filter(element: &Element, tzid: Option<&str>) -> Result<CompFilter, FilterError> {
    let mut comps = element.children.iter().filter(|c| c.name == "comp-filter");
    let (Some(root), None) = (comps.next(), comps.next()) else {
        return Err(FilterError::bad(
            "filter",
            "exactly one <comp-filter> is required",
        ));
    };
    if let Some(other) = element.children.iter().find(|c| c.name != "comp-filter") {
        return Err(FilterError::bad(&other.name, "unexpected element in <filter>"));
    }
    parse_comp_filter(root, tzid)
}

fn parse_comp_filter(element: &Element, tzid: Option<&str>) -> Result<CompFilter, FilterError> {
    let name = required_name(element)?;
    let mut filter = CompFilter::new(name);

    for child in &element.children {
        match child.name.as_str() {
            "is-not-defined" => filter.is_not_defined = true,
            "time-range" => {
                if filter.time_range.is_some() {
                    return Err(FilterError::bad("time-range", "duplicate time-range"));
                }
                filter.time_range = Some(parse_time_range(child, tzid)?);
            }
            "prop-filter" => filter.prop_filters.push(parse_prop_filter(child, tzid)?),
            "comp-filter" => filter.comp_filters.push(parse_comp_filter(child, tzid)?),
            other => return Err(FilterError::bad(other, "unexpected element in <comp-filter>")),
        }
    }

    if filter.is_not_defined && element.children.len() > 1 {
        return Err(FilterError::bad(
            "comp-filter",
            "is-not-defined cannot be combined with other tests",
        ));
    }
    Ok(filter)
}

fn parse_prop_filter(element: &Element, tzid: Option<&str>) -> Result<PropFilter, FilterError> {
    let name = required_name(element)?;
    let mut test = PropTest::Defined;
    let mut param_filters = Vec::new();

    for child in &element.children {
        let next = match child.name.as_str() {
            "param-filter" => {
                param_filters.push(parse_param_filter(child)?);
                continue;
            }
            "is-not-defined" => PropTest::IsNotDefined,
            "time-range" => PropTest::TimeRange(parse_time_range(child, tzid)?),
            "text-match" => PropTest::TextMatch(parse_text_match(child)?),
            other => return Err(FilterError::bad(other, "unexpected element in <prop-filter>")),
        };
        if test != PropTest::Defined {
            return Err(FilterError::bad(
                "prop-filter",
                "at most one of is-not-defined, time-range, text-match",
            ));
        }
        test = next;
    }

    if test == PropTest::IsNotDefined && !param_filters.is_empty() {
        return Err(FilterError::bad(
            "prop-filter",
            "is-not-defined cannot be combined with param-filter",
        ));
    }

    let mut filter = PropFilter::new(name, test);
    filter.param_filters = param_filters;
    Ok(filter)
}

fn parse_param_filter(element: &Element) -> Result<ParamFilter, FilterError> {
    let name = required_name(element)?;
    let [child] = element.children.as_slice() else {
        return Err(FilterError::bad(
            "param-filter",
            "exactly one of is-not-defined or text-match is required",
        ));
    };
    let test = match child.name.as_str() {
        "is-not-defined" => ParamTest::IsNotDefined,
        "text-match" => ParamTest::TextMatch(parse_text_match(child)?),
        other => return Err(FilterError::bad(other, "unexpected element in <param-filter>")),
    };
    Ok(ParamFilter::new(name, test))
}

fn parse_text_match(element: &Element) -> Result<TextMatch, FilterError> {
    if let Some(child) = element.children.first() {
        return Err(FilterError::bad(&child.name, "unexpected element in <text-match>"));
    }

    let mut matcher = TextMatch::new(element.text.clone());
    if let Some(collation) = element.attr("collation") {
        matcher = matcher.with_collation(Collation::parse(collation)?);
    }
    if let Some(negate) = element.attr("negate-condition") {
        matcher = matcher.with_negated(yes_no("negate-condition", negate)?);
    }
    if let Some(caseless) = element.attr("caseless") {
        matcher = matcher.with_caseless(yes_no("caseless", caseless)?);
    }
    Ok(matcher)
}

fn parse_time_range(element: &Element, tzid: Option<&str>) -> Result<TimeRange, FilterError> {
    TimeRange::parse(
        element.attr("start"),
        element.attr("end"),
        tzid.map(str::to_string),
    )
}

fn parse_limit(element: &Element) -> Result<usize, FilterError> {
    let nresults = element
        .child("nresults")
        .ok_or_else(|| FilterError::bad("limit", "missing <nresults>"))?;
    nresults
        .text
        .parse()
        .map_err(|_| FilterError::bad("nresults", format!("invalid count '{}'", nresults.text)))
}

fn required_name(element: &Element) -> Result<&str, FilterError> {
    element
        .attr("name")
        .filter(|n| !n.is_empty())
        .ok_or_else(|| FilterError::bad(&element.name, "missing name attribute"))
}

fn yes_no(attr: &str, value: &str) -> Result<bool, FilterError> {
    match value {
        "yes" => Ok(true),
        "no" => Ok(false),
        _ => Err(FilterError::bad(
            "text-match",
            format!("{attr} must be yes or no, found '{value}'"),
        )),
    }
}

/// Extracts the TZID of the first `VTIMEZONE` in a `<timezone>` body.
fn tzid_of(calendar: &str) -> Option<String> {
    calendar.lines().find_map(|line| {
        let (name, value) = line.trim().split_once(':')?;
        let name = name.split(';').next()?;
        name.eq_ignore_ascii_case("TZID")
            .then(|| value.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::component::EntityType;

    fn bad_element(xml: &str) -> String {
        match QueryFilter::parse(xml) {
            Err(FilterError::BadFilter { element, .. }) => element,
            other => panic!("expected bad filter, got {other:?}"),
        }
    }

    #[test]
    fn parse_requires_one_root_comp_filter() {
        assert_eq!(bad_element("<filter/>"), "filter");
        assert_eq!(
            bad_element(
                r#"<filter><comp-filter name="VCALENDAR"/><comp-filter name="VCALENDAR"/></filter>"#
            ),
            "filter"
        );
    }

    #[test]
    fn parse_names_offending_elements() {
        assert_eq!(
            bad_element(r#"<filter><comp-filter name="VCALENDAR"><foo/></comp-filter></filter>"#),
            "foo"
        );
        assert_eq!(
            bad_element(r#"<filter><comp-filter><comp-filter name="VEVENT"/></comp-filter></filter>"#),
            "comp-filter"
        );
        assert_eq!(
            bad_element(
                r#"<filter><comp-filter name="VCALENDAR"><comp-filter name="VEVENT">
                     <time-range start="yesterday"/>
                   </comp-filter></comp-filter></filter>"#
            ),
            "time-range"
        );
    }

    #[test]
    fn parse_rejects_is_not_defined_with_children() {
        let xml = r#"<filter><comp-filter name="VCALENDAR"><comp-filter name="VEVENT">
                       <is-not-defined/><prop-filter name="SUMMARY"/>
                     </comp-filter></comp-filter></filter>"#;
        assert_eq!(bad_element(xml), "comp-filter");
    }

    #[test]
    fn parse_rejects_two_prop_tests() {
        let xml = r#"<filter><comp-filter name="VCALENDAR"><comp-filter name="VEVENT">
                       <prop-filter name="SUMMARY"><is-not-defined/><text-match>x</text-match></prop-filter>
                     </comp-filter></comp-filter></filter>"#;
        assert_eq!(bad_element(xml), "prop-filter");
    }

    #[test]
    fn parse_rejects_empty_param_filter() {
        let xml = r#"<filter><comp-filter name="VCALENDAR"><comp-filter name="VEVENT">
                       <prop-filter name="ATTENDEE"><param-filter name="PARTSTAT"/></prop-filter>
                     </comp-filter></comp-filter></filter>"#;
        assert_eq!(bad_element(xml), "param-filter");
    }

    #[test]
    fn parse_text_match_attributes() {
        let xml = r#"<C:filter xmlns:C="urn:ietf:params:xml:ns:caldav">
            <C:comp-filter name="VCALENDAR"><C:comp-filter name="VEVENT">
              <C:prop-filter name="SUMMARY">
                <C:text-match collation="i;octet" negate-condition="yes">Lunch</C:text-match>
              </C:prop-filter>
            </C:comp-filter></C:comp-filter>
          </C:filter>"#;
        let parsed = QueryFilter::parse(xml).unwrap();
        let pf = &parsed.filter().comp_filters[0].prop_filters[0];
        let PropTest::TextMatch(m) = &pf.test else {
            panic!("expected text-match, got {:?}", pf.test);
        };
        assert_eq!(m.value, "Lunch");
        assert!(m.negated);
        assert!(!m.is_caseless());
    }

    #[test]
    fn parse_rejects_unsupported_collation() {
        let xml = r#"<filter><comp-filter name="VCALENDAR"><comp-filter name="VEVENT">
                       <prop-filter name="SUMMARY"><text-match collation="i;basic">x</text-match></prop-filter>
                     </comp-filter></comp-filter></filter>"#;
        assert_eq!(bad_element(xml), "text-match");
    }

    #[test]
    fn parse_calendar_query_body() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?>
            <C:calendar-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
              <D:prop><D:getetag/></D:prop>
              <C:filter>
                <C:comp-filter name="VCALENDAR">
                  <C:comp-filter name="VEVENT">
                    <C:time-range start="20240101T000000Z" end="20240102T000000Z"/>
                  </C:comp-filter>
                </C:comp-filter>
              </C:filter>
              <C:timezone>BEGIN:VCALENDAR
BEGIN:VTIMEZONE
TZID:Europe/Paris
END:VTIMEZONE
END:VCALENDAR</C:timezone>
              <C:limit><C:nresults>10</C:nresults></C:limit>
            </C:calendar-query>"#;
        let parsed = QueryFilter::parse(xml).unwrap();
        assert_eq!(parsed.tzid(), Some("Europe/Paris"));
        assert_eq!(parsed.limit(), Some(10));
        assert_eq!(parsed.retrieval_mode(), RetrievalMode::Limit(10));

        let range = parsed.filter().comp_filters[0].time_range.as_ref().unwrap();
        assert_eq!(range.tzid(), Some("Europe/Paris"));
    }

    #[test]
    fn parse_rejects_other_roots() {
        assert_eq!(bad_element("<multistatus/>"), "multistatus");
    }

    #[test]
    fn post_filter_requires_vcalendar_root() {
        let filter = QueryFilter::new(CompFilter::new("VEVENT"));
        let query = EventQuery {
            post_filter: true,
            event_filters: vec![PropFilter::new("SUMMARY", PropTest::Defined)],
            ..EventQuery::default()
        };
        let candidates = vec![Component::new("VEVENT").with("SUMMARY", "x")];
        assert!(filter.post_filter(&query, candidates).is_empty());
    }

    #[test]
    fn post_filter_matches_alarms() {
        let filter = QueryFilter::new(CompFilter::new("VCALENDAR"));
        let query = EventQuery {
            post_filter: true,
            alarm_filters: BTreeMap::from([(
                EntityType::Event,
                vec![PropFilter::new(
                    "ACTION",
                    PropTest::TextMatch(TextMatch::new("EMAIL").with_caseless(false)),
                )],
            )]),
            ..EventQuery::default()
        };
        let email = Component::new("VEVENT")
            .with("UID", "1")
            .with_component(Component::new("VALARM").with("ACTION", "EMAIL"));
        let display = Component::new("VEVENT")
            .with("UID", "2")
            .with_component(Component::new("VALARM").with("ACTION", "DISPLAY"));

        let kept = filter.post_filter(&query, vec![email, display]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].property("UID").map(|p| p.value.as_str()), Some("1"));
    }

    #[test]
    fn post_filter_applies_alarm_filters_to_their_parent_type_only() {
        let filter = QueryFilter::new(CompFilter::new("VCALENDAR"));
        let query = EventQuery {
            post_filter: true,
            todo_filters: vec![PropFilter::new("X-PRIO", PropTest::Defined)],
            alarm_filters: BTreeMap::from([(
                EntityType::Event,
                vec![PropFilter::new("X-KIND", PropTest::Defined)],
            )]),
            ..EventQuery::default()
        };
        let todo = Component::new("VTODO").with("UID", "t").with("X-PRIO", "1");
        let event = Component::new("VEVENT").with("UID", "e");

        let kept = filter.post_filter(&query, vec![todo, event]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].property("UID").map(|p| p.value.as_str()), Some("t"));
    }

    #[test]
    fn post_filter_drops_types_without_filters() {
        let filter = QueryFilter::new(CompFilter::new("VCALENDAR"));
        let query = EventQuery {
            post_filter: true,
            event_filters: vec![PropFilter::new("SUMMARY", PropTest::Defined)],
            ..EventQuery::default()
        };
        let kept = filter.post_filter(
            &query,
            vec![
                Some(Component::new("VTODO").with("SUMMARY", "x")),
                None,
                Some(Component::new("VEVENT").with("SUMMARY", "y")),
            ],
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(Candidate::entity_type(&kept[0]), Some(EntityType::Event));
    }

    #[test]
    fn tzid_of_timezone_body() {
        assert_eq!(
            tzid_of("BEGIN:VTIMEZONE\r\nTZID;X-LIC=1:America/New_York\r\nEND:VTIMEZONE"),
            Some("America/New_York".to_string())
        );
        assert_eq!(tzid_of("BEGIN:VTIMEZONE\nEND:VTIMEZONE"), None);
    }
}
