//! Value groups for indexed property values.

use serde::{Deserialize, Serialize};

/// Logical category of an indexed value.
///
/// The declaration order is the global cross-type sort order of index
/// keys: arrays sort before scalars, and within each half the groups
/// follow the order below. Keys of different groups never compare by
/// value, only by this rank.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum ValueGroup {
    // Wildcard used for open-ended bounds
    Unknown = 0,

    // Array groups
    GeometryArray = 1,
    ZonedDateTimeArray = 2,
    LocalDateTimeArray = 3,
    DateArray = 4,
    ZonedTimeArray = 5,
    LocalTimeArray = 6,
    DurationArray = 7,
    TextArray = 8,
    BooleanArray = 9,
    NumberArray = 10,

    // Scalar groups
    Geometry = 11,
    ZonedDateTime = 12,
    LocalDateTime = 13,
    Date = 14,
    ZonedTime = 15,
    LocalTime = 16,
    Duration = 17,
    Text = 18,
    Boolean = 19,
    Number = 20,

    // Absence of a value
    NoValue = 21,
}

impl ValueGroup {
    /// Returns true if this group holds arrays.
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            ValueGroup::GeometryArray
                | ValueGroup::ZonedDateTimeArray
                | ValueGroup::LocalDateTimeArray
                | ValueGroup::DateArray
                | ValueGroup::ZonedTimeArray
                | ValueGroup::LocalTimeArray
                | ValueGroup::DurationArray
                | ValueGroup::TextArray
                | ValueGroup::BooleanArray
                | ValueGroup::NumberArray
        )
    }

    /// Returns true if this group holds temporal values or arrays of them.
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            ValueGroup::ZonedDateTime
                | ValueGroup::LocalDateTime
                | ValueGroup::Date
                | ValueGroup::ZonedTime
                | ValueGroup::LocalTime
                | ValueGroup::Duration
                | ValueGroup::ZonedDateTimeArray
                | ValueGroup::LocalDateTimeArray
                | ValueGroup::DateArray
                | ValueGroup::ZonedTimeArray
                | ValueGroup::LocalTimeArray
                | ValueGroup::DurationArray
        )
    }

    /// Returns true if a concrete index type exists for this group.
    ///
    /// `Unknown` and `NoValue` are query wildcards, not storable values.
    pub fn is_concrete(&self) -> bool {
        !matches!(self, ValueGroup::Unknown | ValueGroup::NoValue)
    }
}

impl std::fmt::Display for ValueGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueGroup::Unknown => "UNKNOWN",
            ValueGroup::GeometryArray => "GEOMETRY_ARRAY",
            ValueGroup::ZonedDateTimeArray => "ZONED_DATE_TIME_ARRAY",
            ValueGroup::LocalDateTimeArray => "LOCAL_DATE_TIME_ARRAY",
            ValueGroup::DateArray => "DATE_ARRAY",
            ValueGroup::ZonedTimeArray => "ZONED_TIME_ARRAY",
            ValueGroup::LocalTimeArray => "LOCAL_TIME_ARRAY",
            ValueGroup::DurationArray => "DURATION_ARRAY",
            ValueGroup::TextArray => "TEXT_ARRAY",
            ValueGroup::BooleanArray => "BOOLEAN_ARRAY",
            ValueGroup::NumberArray => "NUMBER_ARRAY",
            ValueGroup::Geometry => "GEOMETRY",
            ValueGroup::ZonedDateTime => "ZONED_DATE_TIME",
            ValueGroup::LocalDateTime => "LOCAL_DATE_TIME",
            ValueGroup::Date => "DATE",
            ValueGroup::ZonedTime => "ZONED_TIME",
            ValueGroup::LocalTime => "LOCAL_TIME",
            ValueGroup::Duration => "DURATION",
            ValueGroup::Text => "TEXT",
            ValueGroup::Boolean => "BOOLEAN",
            ValueGroup::Number => "NUMBER",
            ValueGroup::NoValue => "NO_VALUE",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrays_sort_before_scalars() {
        assert!(ValueGroup::NumberArray < ValueGroup::Geometry);
        assert!(ValueGroup::GeometryArray < ValueGroup::ZonedDateTimeArray);
        assert!(ValueGroup::Text < ValueGroup::Boolean);
        assert!(ValueGroup::Boolean < ValueGroup::Number);
    }

    #[test]
    fn test_wildcards_bound_all_groups() {
        assert!(ValueGroup::Unknown < ValueGroup::GeometryArray);
        assert!(ValueGroup::Number < ValueGroup::NoValue);
        assert!(!ValueGroup::Unknown.is_concrete());
        assert!(!ValueGroup::NoValue.is_concrete());
        assert!(ValueGroup::Text.is_concrete());
    }

    #[test]
    fn test_is_array() {
        assert!(ValueGroup::TextArray.is_array());
        assert!(ValueGroup::GeometryArray.is_array());
        assert!(!ValueGroup::Text.is_array());
        assert!(!ValueGroup::Unknown.is_array());
    }

    #[test]
    fn test_is_temporal() {
        assert!(ValueGroup::Date.is_temporal());
        assert!(ValueGroup::DurationArray.is_temporal());
        assert!(!ValueGroup::Number.is_temporal());
        assert!(!ValueGroup::Text.is_temporal());
    }

    #[test]
    fn test_display() {
        assert_eq!(ValueGroup::Number.to_string(), "NUMBER");
        assert_eq!(ValueGroup::ZonedDateTimeArray.to_string(), "ZONED_DATE_TIME_ARRAY");
        assert_eq!(ValueGroup::NoValue.to_string(), "NO_VALUE");
    }

    #[test]
    fn test_repr_values_are_stable() {
        assert_eq!(ValueGroup::Unknown as u8, 0);
        assert_eq!(ValueGroup::NumberArray as u8, 10);
        assert_eq!(ValueGroup::Number as u8, 20);
        assert_eq!(ValueGroup::NoValue as u8, 21);
    }
}
