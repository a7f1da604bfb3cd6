// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Filter parsing, compilation and post-filtering tests.

use calsys_filter::{
    Component, EntityType, MemoryStore, ParamFilter, ParamTest, Predicate, PropFilter, PropTest,
    Property, QueryFilter, RetrievalMode, TextMatch,
};

fn wrap(inner: &str) -> String {
    format!(
        r#"<C:filter xmlns:C="urn:ietf:params:xml:ns:caldav">
             <C:comp-filter name="VCALENDAR">{inner}</C:comp-filter>
           </C:filter>"#
    )
}

const SUMMARY_MEETING: &str = r#"
    <C:comp-filter name="VEVENT">
      <C:prop-filter name="SUMMARY"><C:text-match>Meeting</C:text-match></C:prop-filter>
    </C:comp-filter>"#;

const SUMMARY_MEETING_WITH_PARAM: &str = r#"
    <C:comp-filter name="VEVENT">
      <C:prop-filter name="SUMMARY">
        <C:text-match>Meeting</C:text-match>
        <C:param-filter name="X-FOO"><C:text-match>bar</C:text-match></C:param-filter>
      </C:prop-filter>
    </C:comp-filter>"#;

fn store() -> MemoryStore {
    store_entities().into_iter().collect()
}

fn store_entities() -> Vec<Component> {
    vec![
        Component::new("VEVENT")
            .with("UID", "weekly")
            .with("SUMMARY", "Weekly meeting")
            .with("DTSTART", "20240115T090000Z")
            .with("DTEND", "20240115T100000Z"),
        Component::new("VEVENT")
            .with("UID", "tagged")
            .with_property(Property::new("SUMMARY", "Meeting with vendor").with_param("X-FOO", "bar"))
            .with("DTSTART", "20240116T090000Z")
            .with("DTEND", "20240116T100000Z"),
        Component::new("VEVENT")
            .with("UID", "lunch")
            .with("SUMMARY", "Lunch")
            .with("DTSTART", "20240115T120000Z")
            .with("DTEND", "20240115T130000Z"),
        Component::new("VCALENDAR").with_component(
            Component::new("VTODO")
                .with("UID", "report")
                .with("SUMMARY", "Meeting notes")
                .with("DUE", "20240120T170000Z"),
        ),
    ]
}

fn uids(found: &[Component]) -> Vec<String> {
    let mut uids: Vec<String> = found
        .iter()
        .filter_map(Component::entity)
        .filter_map(|(_, c)| c.property("UID").map(|p| p.value.clone()))
        .collect();
    uids.sort();
    uids
}

#[test]
fn query_pushable_text_match() {
    let filter = QueryFilter::parse(&wrap(SUMMARY_MEETING)).expect("valid filter");
    let query = filter.query().expect("compiles");

    assert_eq!(
        query.predicate.as_ref().map(ToString::to_string).as_deref(),
        Some(r#"EntityType=VEVENT AND SUMMARY~"Meeting""#)
    );
    assert!(!query.post_filter);
    assert!(query.event_filters.is_empty());
}

#[test]
fn query_param_filter_forces_post_filter() {
    let filter = QueryFilter::parse(&wrap(SUMMARY_MEETING_WITH_PARAM)).expect("valid filter");
    let query = filter.query().expect("compiles");

    assert!(query.post_filter);
    assert_eq!(query.event_filters.len(), 1);
    assert_eq!(query.event_filters[0].property_name, "SUMMARY");
    assert_eq!(query.predicate, Some(Predicate::EntityType(EntityType::Event)));
}

#[test]
fn query_empty_filter_matches_everything() {
    let filter = QueryFilter::parse(&wrap("")).expect("valid filter");
    let query = filter.query().expect("compiles");

    assert_eq!(query.predicate, None);
    assert!(!query.post_filter);

    let found = filter
        .execute(&store(), &query, RetrievalMode::Full)
        .expect("in-memory search");
    assert_eq!(found.len(), 4);
}

#[test]
fn query_is_not_defined_entity() {
    let filter = QueryFilter::parse(&wrap(
        r#"<C:comp-filter name="VEVENT"><C:is-not-defined/></C:comp-filter>"#,
    ))
    .expect("valid filter");
    let query = filter.query().expect("compiles");

    assert_eq!(
        query.predicate.as_ref().map(ToString::to_string).as_deref(),
        Some("NOT EntityType=VEVENT")
    );

    let found = filter
        .execute(&store(), &query, RetrievalMode::Full)
        .expect("in-memory search");
    assert_eq!(uids(&found), ["report"]);
}

#[test]
fn query_compile_is_deterministic() {
    let filter = QueryFilter::parse(&wrap(SUMMARY_MEETING_WITH_PARAM)).expect("valid filter");
    let first = filter.query().expect("compiles");
    let second = filter.query().expect("compiles");
    assert_eq!(first, second);
}

#[test]
fn query_execute_then_post_filter() {
    let filter = QueryFilter::parse(&wrap(SUMMARY_MEETING_WITH_PARAM)).expect("valid filter");
    let query = filter.query().expect("compiles");

    let candidates = filter
        .execute(&store(), &query, RetrievalMode::Full)
        .expect("in-memory search");
    assert_eq!(uids(&candidates), ["lunch", "tagged", "weekly"]);

    let kept = filter.post_filter(&query, candidates);
    assert_eq!(uids(&kept), ["tagged"]);
}

#[test]
fn query_post_filter_is_idempotent() {
    let filter = QueryFilter::parse(&wrap(SUMMARY_MEETING_WITH_PARAM)).expect("valid filter");
    let query = filter.query().expect("compiles");
    let candidates = filter
        .execute(&store(), &query, RetrievalMode::Full)
        .expect("in-memory search");

    let once = filter.post_filter(&query, candidates);
    let twice = filter.post_filter(&query, once.clone());
    assert_eq!(once, twice);
}

#[test]
fn query_post_filter_passes_through_without_residuals() {
    let filter = QueryFilter::parse(&wrap(SUMMARY_MEETING)).expect("valid filter");
    let query = filter.query().expect("compiles");

    let unrelated = vec![Component::new("VTIMEZONE"), Component::new("VTODO")];
    let kept = filter.post_filter(&query, unrelated.clone());
    assert_eq!(kept, unrelated);
}

#[test]
fn query_time_range_search() {
    let filter = QueryFilter::parse(&wrap(
        r#"<C:comp-filter name="VEVENT">
             <C:time-range start="20240115T000000Z" end="20240116T000000Z"/>
           </C:comp-filter>"#,
    ))
    .expect("valid filter");
    let query = filter.query().expect("compiles");
    assert!(!query.post_filter);

    let found = filter
        .execute(&store(), &query, RetrievalMode::Full)
        .expect("in-memory search");
    assert_eq!(uids(&found), ["lunch", "weekly"]);
}

#[test]
fn query_unknown_property_is_bad_filter() {
    let filter = QueryFilter::parse(&wrap(
        r#"<C:comp-filter name="VEVENT"><C:prop-filter name="COLOUR"/></C:comp-filter>"#,
    ))
    .expect("valid filter");
    let err = filter.query().expect_err("unknown property");
    assert!(err.is_bad_filter());
    assert_eq!(err.status_code(), 400);
}

#[test]
fn text_match_caseless_round_trip() {
    for value in ["Meeting", "MEETING", "meeting", "Réunion", "ünïcödé"] {
        let matcher = TextMatch::new(value);
        assert!(matcher.matches(Some(&value.to_uppercase())), "{value}");
        assert!(matcher.matches(Some(&value.to_lowercase())), "{value}");
    }
}

#[test]
fn param_filters_combine_with_or() {
    // Either PARTSTAT value is enough; an AND would reject every attendee.
    let filter = PropFilter::new("ATTENDEE", PropTest::Defined)
        .with_param_filter(ParamFilter::new(
            "PARTSTAT",
            ParamTest::TextMatch(TextMatch::new("ACCEPTED")),
        ))
        .with_param_filter(ParamFilter::new(
            "PARTSTAT",
            ParamTest::TextMatch(TextMatch::new("TENTATIVE")),
        ));

    let tentative = Component::new("VEVENT").with_property(
        Property::new("ATTENDEE", "mailto:a@example.com").with_param("PARTSTAT", "TENTATIVE"),
    );
    let declined = Component::new("VEVENT").with_property(
        Property::new("ATTENDEE", "mailto:b@example.com").with_param("PARTSTAT", "DECLINED"),
    );

    assert!(filter.matches(&tentative));
    assert!(!filter.matches(&declined));
}

fn event_with_alarm() -> Component {
    Component::new("VEVENT")
        .with("UID", "lunch-alarm")
        .with("SUMMARY", "Lunch")
        .with_component(
            Component::new("VALARM")
                .with("ACTION", "DISPLAY")
                .with("DESCRIPTION", "Reminder")
                .with("SUMMARY", "Meeting reminder"),
        )
}

/// Same answer from the index and from the post-filter.
fn assert_phases_agree(prop_filter: &str, expected: bool) {
    let event = event_with_alarm();
    let filter = QueryFilter::parse(&wrap(&format!(
        r#"<C:comp-filter name="VEVENT">{prop_filter}</C:comp-filter>"#
    )))
    .expect("valid filter");

    let query = filter.query().expect("compiles");
    let store: MemoryStore = [event.clone()].into_iter().collect();
    let hits = filter
        .execute(&store, &query, RetrievalMode::Full)
        .expect("in-memory search");
    assert_eq!(hits.len() == 1, expected, "pushed: {prop_filter}");

    let residual = &filter.filter().comp_filters[0].prop_filters[0];
    assert_eq!(residual.matches(&event), expected, "post-filtered: {prop_filter}");
}

#[test]
fn query_entity_prop_filters_ignore_alarm_properties() {
    assert_phases_agree(
        r#"<C:prop-filter name="DESCRIPTION"><C:is-not-defined/></C:prop-filter>"#,
        true,
    );
    assert_phases_agree(
        r#"<C:prop-filter name="SUMMARY"><C:text-match>Meeting</C:text-match></C:prop-filter>"#,
        false,
    );
    assert_phases_agree(r#"<C:prop-filter name="ACTION"/>"#, false);
}

#[test]
fn query_alarm_prop_filter_is_pushed_into_alarm_scope() {
    let filter = QueryFilter::parse(&wrap(
        r#"<C:comp-filter name="VEVENT">
             <C:comp-filter name="VALARM">
               <C:prop-filter name="SUMMARY"><C:text-match>meeting</C:text-match></C:prop-filter>
             </C:comp-filter>
           </C:comp-filter>"#,
    ))
    .expect("valid filter");
    let query = filter.query().expect("compiles");
    assert!(!query.post_filter);

    let store: MemoryStore = [event_with_alarm()].into_iter().chain(store_entities()).collect();
    let found = filter
        .execute(&store, &query, RetrievalMode::Full)
        .expect("in-memory search");
    assert_eq!(uids(&found), ["lunch-alarm"]);
}

#[test]
fn query_residuals_across_entity_types() {
    let filter = QueryFilter::parse(&wrap(
        r#"<C:comp-filter name="VEVENT">
             <C:comp-filter name="VALARM"><C:prop-filter name="X-KIND"/></C:comp-filter>
           </C:comp-filter>
           <C:comp-filter name="VTODO"><C:prop-filter name="X-PRIO"/></C:comp-filter>"#,
    ))
    .expect("valid filter");
    let query = filter.query().expect("compiles");
    assert_eq!(
        query.predicate.as_ref().map(ToString::to_string).as_deref(),
        Some("(EntityType=VEVENT AND VALARM IS DEFINED) OR EntityType=VTODO")
    );

    let store: MemoryStore = [
        Component::new("VTODO").with("UID", "prio").with("X-PRIO", "1"),
        Component::new("VTODO").with("UID", "plain"),
        Component::new("VEVENT")
            .with("UID", "kind")
            .with_component(Component::new("VALARM").with("X-KIND", "email")),
        Component::new("VEVENT")
            .with("UID", "other-alarm")
            .with_component(Component::new("VALARM").with("ACTION", "DISPLAY")),
    ]
    .into_iter()
    .collect();

    let candidates = filter
        .execute(&store, &query, RetrievalMode::Full)
        .expect("in-memory search");
    assert_eq!(uids(&candidates), ["kind", "other-alarm", "plain", "prio"]);

    let kept = filter.post_filter(&query, candidates);
    assert_eq!(uids(&kept), ["kind", "prio"]);
}
