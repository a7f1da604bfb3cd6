// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Registry of the properties a backend index knows about.

use crate::error::FilterError;

/// Known iCalendar properties, plus `VALARM` which backends index as a
/// property of its parent entity.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::EnumString,
    strum::Display,
)]
#[strum(ascii_case_insensitive, serialize_all = "SCREAMING-KEBAB-CASE")]
#[expect(missing_docs)]
pub enum PropertyIndex {
    Action,
    Attach,
    Attendee,
    Categories,
    Class,
    Comment,
    Completed,
    Contact,
    Created,
    Description,
    Dtend,
    Dtstamp,
    Dtstart,
    Due,
    Duration,
    Exdate,
    Exrule,
    Freebusy,
    Geo,
    LastModified,
    Location,
    Organizer,
    PercentComplete,
    Priority,
    Rdate,
    RecurrenceId,
    RelatedTo,
    Repeat,
    RequestStatus,
    Resources,
    Rrule,
    Sequence,
    Status,
    Summary,
    Transp,
    Trigger,
    Tzid,
    Uid,
    Url,
    Valarm,
}

impl PropertyIndex {
    /// Resolves a property name against the registry.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::UnknownProperty`] if the name is not registered.
    pub fn lookup(name: &str) -> Result<Self, FilterError> {
        name.parse()
            .map_err(|_| FilterError::UnknownProperty(name.to_string()))
    }

    /// Whether `name` is an extension (`X-`) property.
    #[must_use]
    pub fn is_extension(name: &str) -> bool {
        name.get(..2)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("X-"))
    }

    /// Whether the indexed value is a date or date-time.
    #[must_use]
    pub const fn is_date_valued(self) -> bool {
        matches!(
            self,
            Self::Completed
                | Self::Created
                | Self::Dtend
                | Self::Dtstamp
                | Self::Dtstart
                | Self::Due
                | Self::Exdate
                | Self::LastModified
                | Self::Rdate
                | Self::RecurrenceId
                | Self::Trigger
        )
    }

    /// Whether the indexed value supports text matching.
    #[must_use]
    pub const fn is_text_valued(self) -> bool {
        matches!(
            self,
            Self::Attendee
                | Self::Categories
                | Self::Class
                | Self::Comment
                | Self::Contact
                | Self::Description
                | Self::Location
                | Self::Organizer
                | Self::RelatedTo
                | Self::Resources
                | Self::Status
                | Self::Summary
                | Self::Transp
                | Self::Uid
                | Self::Url
                | Self::Action
        )
    }
}
