// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! `CalDAV` filter engine (RFC 4791 §9.7).
//!
//! A `<filter>` is parsed into a comp-filter tree and compiled into a
//! [`Predicate`] the backend index can evaluate. Tests the index cannot
//! evaluate are kept on the [`EventQuery`] and applied to the materialized
//! candidates afterwards.
//!
//! ```
//! use calsys_filter::QueryFilter;
//!
//! let filter = QueryFilter::parse(
//!     r#"<filter><comp-filter name="VCALENDAR"><comp-filter name="VEVENT">
//!          <prop-filter name="SUMMARY"><text-match>Meeting</text-match></prop-filter>
//!        </comp-filter></comp-filter></filter>"#,
//! )?;
//! let query = filter.query()?;
//! assert_eq!(
//!     query.predicate.map(|p| p.to_string()).as_deref(),
//!     Some(r#"EntityType=VEVENT AND SUMMARY~"Meeting""#)
//! );
//! assert!(!query.post_filter);
//! # Ok::<(), calsys_filter::FilterError>(())
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

mod backend;
mod compile;
mod component;
mod error;
mod filter;
mod predicate;
mod property;
mod query;
mod query_filter;
mod text_match;
mod timerange;
mod xml;

pub use crate::backend::{Candidate, MemoryStore, RetrievalMode, SearchBackend};
pub use crate::component::{Component, EntityType, Parameter, Property};
pub use crate::error::FilterError;
pub use crate::filter::{CompFilter, ParamFilter, ParamTest, PropFilter, PropTest};
pub use crate::predicate::Predicate;
pub use crate::property::PropertyIndex;
pub use crate::query::{CompileOptions, EventQuery, SearchCapabilities};
pub use crate::query_filter::QueryFilter;
pub use crate::text_match::{Collation, TextMatch};
pub use crate::timerange::{TimeRange, format_utc, parse_utc};
