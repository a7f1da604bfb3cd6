// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! `<time-range>` bounds and the RFC 4791 §9.9 overlap rules.
//!
//! Component overlap follows the per-component tables of RFC 4791 §9.9:
//! VEVENT, VTODO, VJOURNAL, VFREEBUSY and VALARM each decide from the set of
//! date properties they carry.

use std::fmt;

use jiff::tz::TimeZone;
use jiff::{Span, Timestamp, Zoned, civil};

use crate::component::{Component, EntityType, Property};
use crate::error::FilterError;

const UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const FLOATING_FORMAT: &str = "%Y%m%dT%H%M%S";
const DATE_FORMAT: &str = "%Y%m%d";

/// A half-open time range; a missing side is unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimeRange {
    start: Option<Timestamp>,
    end: Option<Timestamp>,
    tzid: Option<String>,
}

impl TimeRange {
    /// Creates a time range.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidRange`] if both bounds are missing or
    /// `start >= end`.
    pub fn new(
        start: Option<Timestamp>,
        end: Option<Timestamp>,
        tzid: Option<String>,
    ) -> Result<Self, FilterError> {
        match (start, end) {
            (None, None) => Err(FilterError::InvalidRange(
                "at least one of start or end is required".to_string(),
            )),
            (Some(s), Some(e)) if s >= e => Err(FilterError::InvalidRange(format!(
                "start {} is not before end {}",
                format_utc(s),
                format_utc(e)
            ))),
            _ => Ok(Self { start, end, tzid }),
        }
    }

    /// Parses `start`/`end` attribute values in `YYYYMMDDTHHMMSSZ` form.
    ///
    /// # Errors
    ///
    /// Returns a bad filter naming `time-range` for unparseable values, and
    /// [`FilterError::InvalidRange`] for unusable bounds.
    pub fn parse(
        start: Option<&str>,
        end: Option<&str>,
        tzid: Option<String>,
    ) -> Result<Self, FilterError> {
        let start = start.map(parse_utc).transpose()?;
        let end = end.map(parse_utc).transpose()?;
        Self::new(start, end, tzid)
    }

    /// Inclusive lower bound.
    #[must_use]
    pub const fn start(&self) -> Option<Timestamp> {
        self.start
    }

    /// Exclusive upper bound.
    #[must_use]
    pub const fn end(&self) -> Option<Timestamp> {
        self.end
    }

    /// Time zone floating values are resolved in.
    #[must_use]
    pub fn tzid(&self) -> Option<&str> {
        self.tzid.as_deref()
    }

    /// Returns a copy resolving floating values in `tzid`.
    #[must_use]
    pub fn with_tzid(mut self, tzid: Option<String>) -> Self {
        self.tzid = tzid;
        self
    }

    /// `start <= t < end`.
    #[must_use]
    pub fn contains_instant(&self, t: Timestamp) -> bool {
        self.start.is_none_or(|s| s <= t) && self.end.is_none_or(|e| t < e)
    }

    /// `start < e && end > s`.
    #[must_use]
    pub fn overlaps(&self, s: Timestamp, e: Timestamp) -> bool {
        self.start.is_none_or(|start| start < e) && self.end.is_none_or(|end| end > s)
    }

    /// Resolves a date or date-time property value to an instant.
    ///
    /// Floating values use the property's `TZID` parameter, then the range
    /// time zone, then UTC.
    #[must_use]
    pub fn resolve(&self, prop: &Property) -> Option<Timestamp> {
        self.resolve_zoned(prop).map(|v| v.at.timestamp())
    }

    /// Whether a date-valued property falls inside the range.
    #[must_use]
    pub fn property_matches(&self, prop: &Property) -> bool {
        self.resolve(prop).is_some_and(|t| self.contains_instant(t))
    }

    /// Whether a component overlaps the range per RFC 4791 §9.9.
    ///
    /// Relative alarm triggers need their parent, see [`Self::alarm_overlaps`].
    #[must_use]
    pub fn component_overlaps(&self, comp: &Component) -> bool {
        match comp.entity_type() {
            Some(EntityType::Event) => self.event_overlaps(comp),
            Some(EntityType::Todo) => self.todo_overlaps(comp),
            Some(EntityType::Journal) => self.journal_overlaps(comp),
            Some(EntityType::FreeBusy) => self.freebusy_overlaps(comp),
            Some(EntityType::Alarm) => self.alarm_overlaps(comp, None),
            None => false,
        }
    }

    /// Whether any trigger of `alarm` falls inside the range.
    ///
    /// A relative TRIGGER is anchored on the parent's DTSTART, or its end when
    /// `RELATED=END`; REPEAT and DURATION add further triggers, spaced by the
    /// DURATION as measured from the first trigger.
    #[must_use]
    pub fn alarm_overlaps(&self, alarm: &Component, parent: Option<&Component>) -> bool {
        let Some(trigger) = alarm.property("TRIGGER") else {
            return false;
        };

        let first = if let Some(at) = self.resolve_zoned(trigger) {
            at.at
        } else {
            let Some(offset) = parse_span(&trigger.value) else {
                return false;
            };
            let Some(parent) = parent else {
                return false;
            };
            let anchor = if trigger
                .param("RELATED")
                .is_some_and(|r| r.eq_ignore_ascii_case("END"))
            {
                self.entity_end(parent)
            } else {
                self.date_of(parent, "DTSTART").map(|v| v.at)
            };
            let Some(anchor) = anchor else {
                return false;
            };
            anchor.saturating_add(offset)
        };

        let repeat = alarm
            .property("REPEAT")
            .and_then(|p| p.value.trim().parse::<u32>().ok())
            .unwrap_or(0);
        let interval = alarm.property("DURATION").and_then(|p| parse_span(&p.value));
        let Some(interval) = interval.filter(|_| repeat > 0) else {
            return self.contains_instant(first.timestamp());
        };

        // Triggers are first + k * step for k in 0..=repeat; only the first one
        // at or after the range start can fall inside the range.
        let first_ns = first.timestamp().as_nanosecond();
        let step = first.saturating_add(interval).timestamp().as_nanosecond() - first_ns;
        if step <= 0 {
            return self.contains_instant(first.timestamp());
        }
        let lag = self.start.map_or(0, |s| s.as_nanosecond() - first_ns);
        let k = if lag <= 0 { 0 } else { (lag + step - 1) / step };
        if k > i128::from(repeat) {
            return false;
        }
        Timestamp::from_nanosecond(first_ns + k * step).is_ok_and(|at| self.contains_instant(at))
    }

    // VEVENT
    // DTEND:           start < DTEND AND end > DTSTART
    // DURATION > 0:    start < DTSTART+DURATION AND end > DTSTART
    // DURATION = 0:    start <= DTSTART AND end > DTSTART
    // DATE-TIME only:  start <= DTSTART AND end > DTSTART
    // DATE only:       start < DTSTART+P1D AND end > DTSTART
    fn event_overlaps(&self, comp: &Component) -> bool {
        let Some(dtstart) = self.date_of(comp, "DTSTART") else {
            return false;
        };
        let start = dtstart.at.timestamp();

        if let Some(dtend) = self.date_of(comp, "DTEND") {
            return self.overlaps(start, dtend.at.timestamp());
        }

        if let Some(duration) = comp.property("DURATION").and_then(|p| parse_span(&p.value)) {
            let end = dtstart.at.saturating_add(duration).timestamp();
            return if end > start {
                self.overlaps(start, end)
            } else {
                self.instant_overlaps(start)
            };
        }

        if dtstart.is_date {
            let end = dtstart.at.saturating_add(Span::new().days(1)).timestamp();
            self.overlaps(start, end)
        } else {
            self.instant_overlaps(start)
        }
    }

    fn todo_overlaps(&self, comp: &Component) -> bool {
        let start = self.range_start();
        let end = self.range_end();
        let dtstart = self.date_of(comp, "DTSTART").map(|v| v.at);
        let duration = comp.property("DURATION").and_then(|p| parse_span(&p.value));
        let due = self.date_of(comp, "DUE").map(|v| v.at);
        let completed = self.date_of(comp, "COMPLETED").map(|v| v.at);
        let created = self.date_of(comp, "CREATED").map(|v| v.at);

        match (dtstart, duration, due, completed, created) {
            // DTSTART + DURATION: (start <= DTSTART+DURATION) AND
            //   ((end > DTSTART) OR (end >= DTSTART+DURATION))
            (Some(dtstart), Some(duration), _, _, _) => {
                let stop = dtstart.saturating_add(duration).timestamp();
                let dtstart = dtstart.timestamp();
                start <= stop && (end > dtstart || end >= stop)
            }
            // DTSTART + DUE: ((start < DUE) OR (start <= DTSTART)) AND
            //   ((end > DTSTART) OR (end >= DUE))
            (Some(dtstart), None, Some(due), _, _) => {
                let (dtstart, due) = (dtstart.timestamp(), due.timestamp());
                (start < due || start <= dtstart) && (end > dtstart || end >= due)
            }
            // DTSTART only: (start <= DTSTART) AND (end > DTSTART)
            (Some(dtstart), None, None, _, _) => {
                let dtstart = dtstart.timestamp();
                start <= dtstart && end > dtstart
            }
            // DUE only: (start < DUE) AND (end >= DUE)
            (None, _, Some(due), _, _) => {
                let due = due.timestamp();
                start < due && end >= due
            }
            // COMPLETED + CREATED
            (None, _, None, Some(completed), Some(created)) => {
                let (completed, created) = (completed.timestamp(), created.timestamp());
                (start <= created || start <= completed) && (end >= created || end >= completed)
            }
            // COMPLETED only: (start <= COMPLETED) AND (end >= COMPLETED)
            (None, _, None, Some(completed), None) => {
                let completed = completed.timestamp();
                start <= completed && end >= completed
            }
            // CREATED only: (end > CREATED)
            (None, _, None, None, Some(created)) => end > created.timestamp(),
            // Nothing to anchor on: always overlaps
            (None, _, None, None, None) => true,
        }
    }

    fn journal_overlaps(&self, comp: &Component) -> bool {
        let Some(dtstart) = self.date_of(comp, "DTSTART") else {
            return false;
        };
        let start = dtstart.at.timestamp();
        if dtstart.is_date {
            let end = dtstart.at.saturating_add(Span::new().days(1)).timestamp();
            self.overlaps(start, end)
        } else {
            self.instant_overlaps(start)
        }
    }

    fn freebusy_overlaps(&self, comp: &Component) -> bool {
        if let (Some(dtstart), Some(dtend)) =
            (self.date_of(comp, "DTSTART"), self.date_of(comp, "DTEND"))
        {
            let (s, e) = (dtstart.at.timestamp(), dtend.at.timestamp());
            return self.range_start() <= e && self.range_end() > s;
        }

        comp.properties
            .iter()
            .filter(|p| p.name.eq_ignore_ascii_case("FREEBUSY"))
            .flat_map(|p| p.value.split(','))
            .filter_map(parse_period)
            .any(|(s, e)| self.overlaps(s, e))
    }

    fn instant_overlaps(&self, t: Timestamp) -> bool {
        self.range_start() <= t && self.range_end() > t
    }

    fn range_start(&self) -> Timestamp {
        self.start.unwrap_or(Timestamp::MIN)
    }

    fn range_end(&self) -> Timestamp {
        self.end.unwrap_or(Timestamp::MAX)
    }

    fn entity_end(&self, comp: &Component) -> Option<Zoned> {
        let end_prop = if comp.entity_type() == Some(EntityType::Todo) {
            "DUE"
        } else {
            "DTEND"
        };
        if let Some(end) = self.date_of(comp, end_prop) {
            return Some(end.at);
        }
        let start = self.date_of(comp, "DTSTART")?;
        let duration = comp.property("DURATION").and_then(|p| parse_span(&p.value))?;
        Some(start.at.saturating_add(duration))
    }

    fn date_of(&self, comp: &Component, name: &str) -> Option<DateValue> {
        comp.property(name).and_then(|p| self.resolve_zoned(p))
    }

    fn resolve_zoned(&self, prop: &Property) -> Option<DateValue> {
        let value = prop.value.trim();
        if value.ends_with('Z') || value.ends_with('z') {
            let dt = civil::DateTime::strptime(UTC_FORMAT, value.to_ascii_uppercase()).ok()?;
            return Some(DateValue {
                at: dt.to_zoned(TimeZone::UTC).ok()?,
                is_date: false,
            });
        }

        let tz = match prop.param("TZID").or(self.tzid.as_deref()) {
            Some(tzid) => TimeZone::get(tzid).ok()?,
            None => TimeZone::UTC,
        };
        let is_date = value.len() == 8
            || prop
                .param("VALUE")
                .is_some_and(|v| v.eq_ignore_ascii_case("DATE"));
        let dt = if is_date {
            civil::Date::strptime(DATE_FORMAT, value).ok()?.at(0, 0, 0, 0)
        } else {
            civil::DateTime::strptime(FLOATING_FORMAT, value).ok()?
        };
        Some(DateValue {
            at: dt.to_zoned(tz).ok()?,
            is_date,
        })
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.start {
            Some(s) => write!(f, "[{}", format_utc(s))?,
            None => write!(f, "(-inf")?,
        }
        match self.end {
            Some(e) => write!(f, ", {})", format_utc(e)),
            None => write!(f, ", +inf)"),
        }
    }
}

struct DateValue {
    at: Zoned,
    is_date: bool,
}

/// Formats an instant as `YYYYMMDDTHHMMSSZ`.
#[must_use]
pub fn format_utc(t: Timestamp) -> String {
    t.strftime(UTC_FORMAT).to_string()
}

/// Parses `YYYYMMDDTHHMMSSZ`.
///
/// # Errors
///
/// Returns a bad filter naming `time-range` if the value is malformed.
pub fn parse_utc(value: &str) -> Result<Timestamp, FilterError> {
    civil::DateTime::strptime(UTC_FORMAT, value)
        .and_then(|dt| dt.to_zoned(TimeZone::UTC))
        .map(|z| z.timestamp())
        .map_err(|e| FilterError::bad("time-range", format!("invalid time value '{value}': {e}")))
}

/// Parses an ISO 8601 duration such as `PT1H` or `-P1D`.
fn parse_span(value: &str) -> Option<Span> {
    value.trim().parse::<Span>().ok()
}

/// Parses a UTC PERIOD value, `start/end` or `start/duration`.
fn parse_period(value: &str) -> Option<(Timestamp, Timestamp)> {
    let (start, rest) = value.trim().split_once('/')?;
    let start = parse_utc(start).ok()?;
    let end = match parse_utc(rest) {
        Ok(end) => end,
        Err(_) => start
            .to_zoned(TimeZone::UTC)
            .saturating_add(parse_span(rest)?)
            .timestamp(),
    };
    Some((start, end))
}
