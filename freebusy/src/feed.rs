// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Google Calendar Atom feeds.
//!
//! Every `<entry>` contributes its `<gd:when>` intervals unless it is
//! cancelled or transparent.

use quick_xml::events::{BytesStart, Event};

use crate::error::FreeBusyError;
use crate::period::{FreeBusyPeriod, FreeBusyType, Period, parse_instant};

#[derive(Debug, Default)]
struct Entry {
    whens: Vec<Period>,
    cancelled: bool,
    tentative: bool,
    transparent: bool,
}

impl Entry {
    fn into_periods(self) -> impl Iterator<Item = FreeBusyPeriod> {
        let fb_type = if self.tentative {
            FreeBusyType::BusyTentative
        } else {
            FreeBusyType::Busy
        };
        let keep = !self.cancelled && !self.transparent;
        self.whens
            .into_iter()
            .filter(move |_| keep)
            .map(move |period| FreeBusyPeriod { period, fb_type })
    }
}

/// Decodes a feed into typed busy periods.
///
/// # Errors
///
/// Returns [`FreeBusyError::Unavailable`] for malformed XML, a root other than
/// `<feed>`, or unparseable times.
pub fn decode(xml: &str) -> Result<Vec<FreeBusyPeriod>, FreeBusyError> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut periods = Vec::new();
    let mut entry: Option<Entry> = None;
    let mut seen_root = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) if !seen_root => {
                seen_root = true;
                if e.name().local_name().into_inner() != b"feed" {
                    return Err(FreeBusyError::Unavailable(
                        "unexpected root element in calendar feed".to_string(),
                    ));
                }
            }
            Event::Start(ref e) if e.name().local_name().into_inner() == b"entry" => {
                entry = Some(Entry::default());
            }
            Event::End(ref e) if e.name().local_name().into_inner() == b"entry" => {
                if let Some(done) = entry.take() {
                    periods.extend(done.into_periods());
                }
            }
            Event::Start(ref e) | Event::Empty(ref e) => {
                if let Some(current) = entry.as_mut() {
                    apply(current, e)?;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(FreeBusyError::Unavailable("empty calendar feed".to_string()));
    }
    tracing::trace!(periods = periods.len(), "decoded calendar feed");
    Ok(periods)
}

fn apply(entry: &mut Entry, e: &BytesStart<'_>) -> Result<(), FreeBusyError> {
    match e.name().local_name().into_inner() {
        b"when" => {
            let (Some(start), Some(end)) = (attr(e, "startTime")?, attr(e, "endTime")?) else {
                return Err(FreeBusyError::Unavailable(
                    "gd:when without startTime or endTime".to_string(),
                ));
            };
            let start = parse_instant(&start)?;
            let end = parse_instant(&end)?;
            match Period::new(start, end) {
                Ok(p) => entry.whens.push(p),
                Err(_) => tracing::warn!(%start, %end, "skipping empty gd:when"),
            }
        }
        b"eventStatus" => {
            let value = attr(e, "value")?.unwrap_or_default();
            entry.cancelled = value.ends_with("event.canceled");
            entry.tentative = value.ends_with("event.tentative");
        }
        b"transparency" => {
            let value = attr(e, "value")?.unwrap_or_default();
            entry.transparent = value.ends_with("event.transparent");
        }
        _ => {}
    }
    Ok(())
}

fn attr(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, FreeBusyError> {
    let Some(attr) = e.try_get_attribute(name)? else {
        return Ok(None);
    };
    let value = std::str::from_utf8(&attr.value)
        .map_err(|e| FreeBusyError::Unavailable(format!("UTF-8 error: {e}")))?;
    Ok(Some(value.to_string()))
}
