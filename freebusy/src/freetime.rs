// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Domino free-time documents: the free periods of a principal.
//!
//! ```xml
//! <freetime>
//!   <period start="20240115T090000Z" end="20240115T100000Z"/>
//! </freetime>
//! ```

use quick_xml::events::Event;

use crate::error::FreeBusyError;
use crate::period::{Period, parse_instant};

/// Decodes the free periods of a free-time document.
///
/// # Errors
///
/// - [`FreeBusyError::Unavailable`] for malformed XML, a root other than
///   `<freetime>`, or unparseable times,
/// - [`FreeBusyError::MalformedPeriods`] for an inverted period.
pub fn decode(xml: &str) -> Result<Vec<Period>, FreeBusyError> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut periods = Vec::new();
    let mut seen_root = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) if !seen_root => {
                seen_root = true;
                if e.name().local_name().into_inner() != b"freetime" {
                    return Err(FreeBusyError::Unavailable(
                        "unexpected root element in free-time document".to_string(),
                    ));
                }
            }
            Event::Start(ref e) | Event::Empty(ref e)
                if e.name().local_name().into_inner() == b"period" =>
            {
                let start = required(e.try_get_attribute("start")?, "start")?;
                let end = required(e.try_get_attribute("end")?, "end")?;
                let (start, end) = (parse_instant(&start)?, parse_instant(&end)?);
                let period = Period::new(start, end)
                    .map_err(|e| FreeBusyError::MalformedPeriods(e.to_string()))?;
                periods.push(period);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(FreeBusyError::Unavailable(
            "empty free-time document".to_string(),
        ));
    }
    Ok(periods)
}

fn required(
    attr: Option<quick_xml::events::attributes::Attribute<'_>>,
    name: &str,
) -> Result<String, FreeBusyError> {
    let attr = attr.ok_or_else(|| {
        FreeBusyError::Unavailable(format!("<period> without {name} attribute"))
    })?;
    std::str::from_utf8(&attr.value)
        .map(str::to_string)
        .map_err(|e| FreeBusyError::Unavailable(format!("UTF-8 error: {e}")))
}
