// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Free-busy aggregation for calendar backends.
//!
//! Backends report free-busy in one of two shapes: the free periods of a
//! principal (Domino) or typed busy periods (Exchange bitmasks, Google
//! feeds). Both are normalized into a [`FreeBusy`] of merged, clipped,
//! per-type periods.
//!
//! ```
//! use calsys_freebusy::{RawFreeBusy, aggregate, freetime, parse_instant};
//!
//! let free = freetime::decode(
//!     r#"<freetime>
//!          <period start="20240101T090000Z" end="20240101T100000Z"/>
//!          <period start="20240101T140000Z" end="20240101T150000Z"/>
//!        </freetime>"#,
//! )?;
//! let start = parse_instant("20240101T080000Z")?;
//! let end = parse_instant("20240101T160000Z")?;
//! let fb = aggregate(RawFreeBusy::Free(free), start, end)?;
//! assert_eq!(
//!     fb.to_freebusy_lines(),
//!     ["FREEBUSY;FBTYPE=BUSY:20240101T080000Z/20240101T090000Z,\
//!       20240101T100000Z/20240101T140000Z,20240101T150000Z/20240101T160000Z"]
//! );
//! # Ok::<(), calsys_freebusy::FreeBusyError>(())
//! ```

#![warn(
    trivial_casts,
    trivial_numeric_casts,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    clippy::dbg_macro,
    clippy::indexing_slicing,
    clippy::pedantic
)]
#![allow(clippy::module_name_repetitions)]

mod aggregate;
pub mod bitmask;
mod config;
mod error;
pub mod feed;
pub mod freetime;
mod http;
mod period;

pub use crate::aggregate::{RawFreeBusy, aggregate, busy_from_free};
pub use crate::config::{AuthMethod, PrincipalKind, ServerConfig, ServerKind, SysConfig};
pub use crate::error::FreeBusyError;
pub use crate::http::{ClientCache, HttpSource};
pub use crate::period::{
    FreeBusy, FreeBusyComponent, FreeBusyPeriod, FreeBusyType, Period, format_utc, parse_instant,
};
