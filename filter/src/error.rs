// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

/// Errors raised while parsing or compiling a `CalDAV` filter.
///
/// Every variant aborts the whole query: a compile never returns a partial
/// predicate.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    /// Malformed or semantically invalid filter (`CALDAV:valid-filter`).
    #[error("Invalid filter at <{element}>: {reason}")]
    BadFilter {
        /// The offending XML element.
        element: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Property or parameter name missing from the known registry.
    #[error("Unknown property '{0}'")]
    UnknownProperty(String),

    /// The filter is valid but queries a property the caller may not query.
    #[error("Filtering on property '{0}' is not allowed")]
    Forbidden(String),

    /// A time-range without a usable start or end.
    #[error("Invalid time range: {0}")]
    InvalidRange(String),

    /// The request body is not well-formed XML.
    #[error("XML error: {0}")]
    Xml(String),
}

impl FilterError {
    pub(crate) fn bad(element: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadFilter {
            element: element.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is a kind of bad filter.
    ///
    /// An unknown property is reported as a bad filter to the protocol layer.
    #[must_use]
    pub const fn is_bad_filter(&self) -> bool {
        matches!(
            self,
            Self::BadFilter { .. } | Self::UnknownProperty(_) | Self::InvalidRange(_) | Self::Xml(_)
        )
    }

    /// HTTP status the protocol layer should answer with.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Forbidden(_) => 403,
            _ => 400,
        }
    }
}

impl From<quick_xml::Error> for FilterError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Xml(e.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for FilterError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Self::Xml(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_codes() {
        assert_eq!(FilterError::bad("comp-filter", "too deep").status_code(), 400);
        assert_eq!(FilterError::UnknownProperty("FOO".into()).status_code(), 400);
        assert_eq!(FilterError::Forbidden("ATTENDEE".into()).status_code(), 403);
    }

    #[test]
    fn error_unknown_property_is_bad_filter() {
        assert!(FilterError::UnknownProperty("FOO".into()).is_bad_filter());
        assert!(!FilterError::Forbidden("ATTENDEE".into()).is_bad_filter());
    }

    #[test]
    fn error_display_names_element() {
        let e = FilterError::bad("prop-filter", "missing name attribute");
        assert_eq!(
            e.to_string(),
            "Invalid filter at <prop-filter>: missing name attribute"
        );
    }
}
