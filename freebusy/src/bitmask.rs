// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Exchange `MergedFreeBusy` bitmasks.
//!
//! Each digit covers one cell of `cell_minutes` starting at the request
//! start: `0` free, `1` tentative, `2` busy, `3` out of office, `4` working
//! elsewhere, `5` no data.

use jiff::{SignedDuration, Timestamp};
use quick_xml::events::Event;

use crate::error::FreeBusyError;
use crate::period::{FreeBusyPeriod, FreeBusyType, Period};

fn cell_type(digit: char) -> Result<Option<FreeBusyType>, FreeBusyError> {
    Ok(match digit {
        '0' | '5' => None,
        '1' | '4' => Some(FreeBusyType::BusyTentative),
        '2' => Some(FreeBusyType::Busy),
        '3' => Some(FreeBusyType::BusyUnavailable),
        other => {
            return Err(FreeBusyError::Unavailable(format!(
                "invalid free-busy digit '{other}'"
            )));
        }
    })
}

/// Decodes a bitmask into typed busy periods, merging runs of one type.
///
/// Free and no-data cells produce nothing.
///
/// # Errors
///
/// - [`FreeBusyError::Config`] if `cell_minutes` is zero,
/// - [`FreeBusyError::Unavailable`] for characters outside `0`-`5`.
pub fn decode(
    mask: &str,
    start: Timestamp,
    cell_minutes: u32,
) -> Result<Vec<FreeBusyPeriod>, FreeBusyError> {
    if cell_minutes == 0 {
        return Err(FreeBusyError::Config("cell_minutes must be positive".to_string()));
    }
    let cell = SignedDuration::from_mins(i64::from(cell_minutes));

    let mut periods = Vec::new();
    let mut run: Option<(FreeBusyType, Timestamp)> = None;
    let mut at = start;

    for digit in mask.trim().chars() {
        let fb_type = cell_type(digit)?;
        let next = at
            .checked_add(cell)
            .map_err(|e| FreeBusyError::Unavailable(e.to_string()))?;

        match (run, fb_type) {
            (Some((current, _)), Some(t)) if current == t => {}
            (Some((current, from)), t) => {
                periods.push(FreeBusyPeriod {
                    period: Period::new(from, at)?,
                    fb_type: current,
                });
                run = t.map(|t| (t, at));
            }
            (None, t) => run = t.map(|t| (t, at)),
        }
        at = next;
    }
    if let Some((current, from)) = run {
        periods.push(FreeBusyPeriod {
            period: Period::new(from, at)?,
            fb_type: current,
        });
    }
    Ok(periods)
}

/// Decodes an Exchange free-busy response, reading the first `<fbdata>`.
///
/// # Errors
///
/// Returns [`FreeBusyError::Unavailable`] for malformed XML, an unexpected
/// root element or a missing `<fbdata>`; see also [`decode`].
pub fn decode_response(
    xml: &str,
    start: Timestamp,
    cell_minutes: u32,
) -> Result<Vec<FreeBusyPeriod>, FreeBusyError> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut seen_root = false;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) if !seen_root => {
                seen_root = true;
                if e.name().local_name().into_inner() != b"response" {
                    return Err(FreeBusyError::Unavailable(
                        "unexpected root element in Exchange response".to_string(),
                    ));
                }
            }
            Event::Start(ref e) if e.name().local_name().into_inner() == b"fbdata" => {
                if let Event::Text(text) = reader.read_event_into(&mut buf)? {
                    return decode(&text.decode().map_err(quick_xml::Error::from)?, start, cell_minutes);
                }
                return Ok(Vec::new());
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Err(FreeBusyError::Unavailable(
        "no <fbdata> in Exchange response".to_string(),
    ))
}
