// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! `<text-match>` evaluation with RFC 4790 collations.

use std::fmt;

use crate::error::FilterError;

/// Collations a server must support for `<text-match>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumString, strum::Display)]
pub enum Collation {
    /// Byte-wise, case-sensitive.
    #[strum(serialize = "i;octet")]
    Octet,
    /// ASCII case folding.
    #[strum(serialize = "i;ascii-casemap")]
    AsciiCasemap,
    /// Unicode case folding.
    #[strum(serialize = "i;unicode-casemap")]
    UnicodeCasemap,
}

impl Collation {
    /// Parses a collation identifier.
    ///
    /// # Errors
    ///
    /// Unknown collations are a bad filter (`CALDAV:supported-collation`).
    pub fn parse(name: &str) -> Result<Self, FilterError> {
        name.parse()
            .map_err(|_| FilterError::bad("text-match", format!("unsupported collation {name}")))
    }
}

/// A substring matcher from `<text-match>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextMatch {
    /// Explicit case sensitivity; `None` defers to the collation.
    pub caseless: Option<bool>,
    /// Inverts the result when the value is present.
    pub negated: bool,
    /// Text to look for.
    pub value: String,
    /// Collation requested by the client.
    pub collation: Option<Collation>,
}

impl TextMatch {
    /// A caseless, non-negated matcher for `value`.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            caseless: None,
            negated: false,
            value: value.into(),
            collation: None,
        }
    }

    /// Sets explicit case sensitivity.
    #[must_use]
    pub fn with_caseless(mut self, caseless: bool) -> Self {
        self.caseless = Some(caseless);
        self
    }

    /// Sets the negate flag.
    #[must_use]
    pub fn with_negated(mut self, negated: bool) -> Self {
        self.negated = negated;
        self
    }

    /// Sets the collation.
    #[must_use]
    pub fn with_collation(mut self, collation: Collation) -> Self {
        self.collation = Some(collation);
        self
    }

    /// Whether the comparison ignores case.
    ///
    /// An explicit `caseless` flag wins; otherwise only `i;octet` is
    /// case-sensitive.
    #[must_use]
    pub fn is_caseless(&self) -> bool {
        self.caseless
            .unwrap_or(!matches!(self.collation, Some(Collation::Octet)))
    }

    /// Matches a property or parameter value; an absent value never matches.
    #[must_use]
    pub fn matches(&self, candidate: Option<&str>) -> bool {
        let Some(candidate) = candidate else {
            return false;
        };

        let found = if self.is_caseless() {
            fold(candidate).contains(&fold(&self.value))
        } else {
            candidate.contains(&self.value)
        };
        found != self.negated
    }
}

fn fold(s: &str) -> String {
    s.to_uppercase()
}

impl fmt::Display for TextMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = if self.negated { "!~" } else { "~" };
        write!(f, "{op}{:?}", self.value)?;
        if !self.is_caseless() {
            write!(f, " (case-sensitive)")?;
        }
        Ok(())
    }
}
