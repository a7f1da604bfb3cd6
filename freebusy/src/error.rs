// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

/// Free-busy errors.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FreeBusyError {
    /// The backend source is unreachable, answered with a non-OK status, or
    /// returned a body that cannot be parsed.
    #[error("Free-busy source unavailable: {0}")]
    Unavailable(String),

    /// The backend returned overlapping or inverted periods.
    #[error("Malformed free-busy periods: {0}")]
    MalformedPeriods(String),

    /// The requested range is empty or inverted.
    #[error("Invalid free-busy range: {0}")]
    InvalidRange(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FreeBusyError {
    /// HTTP status the protocol layer should answer with.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Unavailable(_) => 503,
            Self::MalformedPeriods(_) => 502,
            Self::InvalidRange(_) | Self::Config(_) => 400,
        }
    }
}

impl From<reqwest::Error> for FreeBusyError {
    fn from(e: reqwest::Error) -> Self {
        Self::Unavailable(e.to_string())
    }
}

impl From<quick_xml::Error> for FreeBusyError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Unavailable(format!("XML error: {e}"))
    }
}

impl From<quick_xml::events::attributes::AttrError> for FreeBusyError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Self::Unavailable(format!("XML error: {e}"))
    }
}

impl From<toml::de::Error> for FreeBusyError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}
