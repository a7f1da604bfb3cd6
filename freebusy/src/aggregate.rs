// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Turns backend free-busy shapes into canonical busy periods.

use std::collections::BTreeMap;

use jiff::Timestamp;

use crate::error::FreeBusyError;
use crate::period::{FreeBusy, FreeBusyComponent, FreeBusyPeriod, FreeBusyType, Period, format_utc};

/// Free-busy data as a backend reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFreeBusy {
    /// Free periods; everything else in the range is busy (Domino).
    Free(Vec<Period>),
    /// Typed busy periods (Exchange bitmask, Google feed).
    Busy(Vec<FreeBusyPeriod>),
}

/// Computes the busy periods of `[start, end)` from its free periods.
///
/// Free periods are clipped to the range. The emitted busy periods and the
/// clipped free periods tile the range exactly.
///
/// # Errors
///
/// - [`FreeBusyError::InvalidRange`] if `start >= end`,
/// - [`FreeBusyError::MalformedPeriods`] if two free periods overlap.
pub fn busy_from_free(
    free: &[Period],
    start: Timestamp,
    end: Timestamp,
) -> Result<FreeBusyComponent, FreeBusyError> {
    let range = Period::new(start, end)?;

    let mut sorted: BTreeMap<Timestamp, Period> = BTreeMap::new();
    for p in free {
        if let Some(dup) = sorted.insert(p.start(), *p) {
            return Err(overlap(&dup, p));
        }
    }

    let mut busy = Vec::new();
    let mut cursor = range.start();
    let mut previous: Option<Period> = None;
    for p in sorted.into_values() {
        if let Some(prev) = previous
            && prev.overlaps(&p)
        {
            return Err(overlap(&prev, &p));
        }
        previous = Some(p);

        let Some(p) = p.clip(range.start(), range.end()) else {
            continue;
        };
        if cursor < p.start() {
            busy.push(Period::new(cursor, p.start())?);
        }
        cursor = cursor.max(p.end());
    }
    if cursor < range.end() {
        busy.push(Period::new(cursor, range.end())?);
    }

    tracing::trace!(free = free.len(), busy = busy.len(), "inverted free periods");
    Ok(FreeBusyComponent::from_periods(FreeBusyType::Busy, busy))
}

/// Aggregates either backend shape into free-busy for `[start, end)`.
///
/// # Errors
///
/// See [`busy_from_free`]; typed periods only fail on an invalid range.
pub fn aggregate(
    raw: RawFreeBusy,
    start: Timestamp,
    end: Timestamp,
) -> Result<FreeBusy, FreeBusyError> {
    let range = Period::new(start, end)?;
    match raw {
        RawFreeBusy::Free(free) => {
            let busy = busy_from_free(&free, start, end)?;
            let typed = busy.periods().iter().map(|p| FreeBusyPeriod {
                period: *p,
                fb_type: FreeBusyType::Busy,
            });
            Ok(FreeBusy::from_typed(range, typed))
        }
        RawFreeBusy::Busy(periods) => Ok(FreeBusy::from_typed(range, periods)),
    }
}

fn overlap(a: &Period, b: &Period) -> FreeBusyError {
    FreeBusyError::MalformedPeriods(format!(
        "free periods {a} and {b} overlap (starting {})",
        format_utc(b.start())
    ))
}
