// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Periods, typed free-busy periods and their canonical merged form.

use std::collections::BTreeMap;
use std::fmt;

use jiff::tz::TimeZone;
use jiff::{Timestamp, civil};

use crate::error::FreeBusyError;

const UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// `FBTYPE` of a free-busy period.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING-KEBAB-CASE", ascii_case_insensitive)]
pub enum FreeBusyType {
    /// `BUSY`.
    Busy,
    /// `BUSY-UNAVAILABLE`.
    BusyUnavailable,
    /// `BUSY-TENTATIVE`.
    BusyTentative,
    /// `FREE`.
    Free,
}

/// A non-empty half-open UTC interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    start: Timestamp,
    end: Timestamp,
}

impl Period {
    /// Creates a period.
    ///
    /// # Errors
    ///
    /// Returns [`FreeBusyError::InvalidRange`] unless `start < end`.
    pub fn new(start: Timestamp, end: Timestamp) -> Result<Self, FreeBusyError> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(FreeBusyError::InvalidRange(format!(
                "{} is not before {}",
                format_utc(start),
                format_utc(end)
            )))
        }
    }

    /// Inclusive start.
    #[must_use]
    pub const fn start(&self) -> Timestamp {
        self.start
    }

    /// Exclusive end.
    #[must_use]
    pub const fn end(&self) -> Timestamp {
        self.end
    }

    /// Whether the two periods share an instant.
    #[must_use]
    pub fn overlaps(&self, other: &Period) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// The part of this period inside `[start, end)`, if any.
    #[must_use]
    pub fn clip(&self, start: Timestamp, end: Timestamp) -> Option<Period> {
        let s = self.start.max(start);
        let e = self.end.min(end);
        (s < e).then_some(Period { start: s, end: e })
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", format_utc(self.start), format_utc(self.end))
    }
}

/// A period with its free-busy type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FreeBusyPeriod {
    /// The interval.
    pub period: Period,
    /// Its type.
    pub fb_type: FreeBusyType,
}

impl FreeBusyPeriod {
    /// Creates a typed period.
    ///
    /// # Errors
    ///
    /// Returns [`FreeBusyError::InvalidRange`] unless `start < end`.
    pub fn new(
        start: Timestamp,
        end: Timestamp,
        fb_type: FreeBusyType,
    ) -> Result<Self, FreeBusyError> {
        Ok(Self {
            period: Period::new(start, end)?,
            fb_type,
        })
    }
}

/// Ordered, non-overlapping periods of one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeBusyComponent {
    fb_type: FreeBusyType,
    periods: Vec<Period>,
}

impl FreeBusyComponent {
    /// Canonicalizes `periods`: sorted, with overlapping and adjacent periods
    /// merged.
    pub fn from_periods(fb_type: FreeBusyType, periods: impl IntoIterator<Item = Period>) -> Self {
        let mut periods: Vec<Period> = periods.into_iter().collect();
        periods.sort_unstable();

        let mut merged: Vec<Period> = Vec::with_capacity(periods.len());
        for p in periods {
            match merged.last_mut() {
                Some(last) if p.start <= last.end => last.end = last.end.max(p.end),
                _ => merged.push(p),
            }
        }
        Self {
            fb_type,
            periods: merged,
        }
    }

    /// The free-busy type.
    #[must_use]
    pub const fn fb_type(&self) -> FreeBusyType {
        self.fb_type
    }

    /// The periods, ordered by start.
    #[must_use]
    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    /// Whether there are no periods.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Renders the `FREEBUSY` content line.
    #[must_use]
    pub fn to_freebusy_line(&self) -> String {
        let values: Vec<String> = self.periods.iter().map(ToString::to_string).collect();
        format!("FREEBUSY;FBTYPE={}:{}", self.fb_type, values.join(","))
    }
}

/// Free-busy information for a requested range, one component per type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeBusy {
    range: Period,
    components: BTreeMap<FreeBusyType, FreeBusyComponent>,
}

impl FreeBusy {
    /// Groups typed periods by type, clipped to `range`.
    pub fn from_typed(range: Period, periods: impl IntoIterator<Item = FreeBusyPeriod>) -> Self {
        let mut grouped: BTreeMap<FreeBusyType, Vec<Period>> = BTreeMap::new();
        for p in periods {
            if let Some(clipped) = p.period.clip(range.start, range.end) {
                grouped.entry(p.fb_type).or_default().push(clipped);
            }
        }
        let components = grouped
            .into_iter()
            .map(|(t, ps)| (t, FreeBusyComponent::from_periods(t, ps)))
            .collect();
        Self { range, components }
    }

    /// The requested range.
    #[must_use]
    pub const fn range(&self) -> Period {
        self.range
    }

    /// Component of one type, if any period has it.
    #[must_use]
    pub fn component(&self, fb_type: FreeBusyType) -> Option<&FreeBusyComponent> {
        self.components.get(&fb_type)
    }

    /// Busy periods of every busy type, merged.
    #[must_use]
    pub fn busy(&self) -> FreeBusyComponent {
        FreeBusyComponent::from_periods(
            FreeBusyType::Busy,
            self.components
                .values()
                .filter(|c| c.fb_type != FreeBusyType::Free)
                .flat_map(|c| c.periods.iter().copied()),
        )
    }

    /// Renders `FREEBUSY` content lines, busiest type first.
    #[must_use]
    pub fn to_freebusy_lines(&self) -> Vec<String> {
        self.components
            .values()
            .filter(|c| !c.is_empty())
            .map(FreeBusyComponent::to_freebusy_line)
            .collect()
    }
}

/// Formats an instant as `YYYYMMDDTHHMMSSZ`.
#[must_use]
pub fn format_utc(t: Timestamp) -> String {
    t.strftime(UTC_FORMAT).to_string()
}

/// Parses an instant from a backend document.
///
/// Accepts iCalendar UTC (`20240115T090000Z`), RFC 3339 and bare dates
/// (midnight UTC).
///
/// # Errors
///
/// Returns [`FreeBusyError::Unavailable`] for anything else.
pub fn parse_instant(value: &str) -> Result<Timestamp, FreeBusyError> {
    let value = value.trim();
    if let Ok(dt) = civil::DateTime::strptime(UTC_FORMAT, value) {
        return dt
            .to_zoned(TimeZone::UTC)
            .map(|z| z.timestamp())
            .map_err(|e| FreeBusyError::Unavailable(e.to_string()));
    }
    if let Ok(t) = value.parse::<Timestamp>() {
        return Ok(t);
    }
    if let Ok(date) = value.parse::<civil::Date>() {
        return date
            .to_zoned(TimeZone::UTC)
            .map(|z| z.timestamp())
            .map_err(|e| FreeBusyError::Unavailable(e.to_string()));
    }
    Err(FreeBusyError::Unavailable(format!("invalid time value '{value}'")))
}
