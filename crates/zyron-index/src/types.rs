//! Type registry and per-element value codecs.
//!
//! Every indexable value maps to exactly one [`Type`]. The type id is the
//! first byte of every encoded key slot and is persisted, so ids are never
//! renumbered or reused. Scalar types and their array counterparts share
//! one [`ElementKind`], which owns the element-level encoding:
//!
//! ```text
//! scalar slot:  [type_id: 1][element]
//! array slot:   [type_id: 1][length: 4][element]*length
//! number array: [type_id: 1][number_kind: 1][length: 4][raw bits]*length
//! ```

use crate::number::{NumberKind, RawNumber};
use crate::temporal;
use crate::value::{DurationValue, Value, ZonedTime};
use bytes::{Buf, BufMut};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use std::cmp::Ordering;
use zyron_common::ValueGroup;

/// Size of the type id prefix of every slot.
pub const TYPE_ID_SIZE: usize = 1;
/// Size of the array length prefix.
pub const SIZE_ARRAY_LENGTH: usize = 4;
/// Size of the text length prefix.
pub const SIZE_STRING_LENGTH: usize = 2;
/// Size of the number kind tag.
pub const SIZE_NUMBER_KIND: usize = 1;

pub const SIZE_BOOLEAN: usize = 1;
pub const SIZE_DATE: usize = 8;
pub const SIZE_LOCAL_TIME: usize = 8;
pub const SIZE_LOCAL_DATE_TIME: usize = 8 + 4;
pub const SIZE_ZONED_TIME: usize = 8 + 4;
pub const SIZE_ZONED_DATE_TIME: usize = 8 + 4 + 4;
pub const SIZE_DURATION: usize = 8 + 4 + 8 + 8;

/// Encoded boolean true. Any byte other than TRUE or FALSE is corrupt.
pub const TRUE: u8 = 1;
/// Encoded boolean false.
pub const FALSE: u8 = 0;

/// Concrete index types. Discriminants are the persisted type ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Type {
    // Scalars
    ZonedDateTime = 0,
    LocalDateTime = 1,
    Date = 2,
    ZonedTime = 3,
    LocalTime = 4,
    Duration = 5,
    Text = 6,
    Boolean = 7,
    Number = 8,

    // Arrays
    ZonedDateTimeArray = 9,
    LocalDateTimeArray = 10,
    DateArray = 11,
    ZonedTimeArray = 12,
    LocalTimeArray = 13,
    DurationArray = 14,
    TextArray = 15,
    BooleanArray = 16,
    NumberArray = 17,

    // Placeholders, no encoding yet
    Geometry = 18,
    GeometryArray = 19,
}

impl Type {
    /// Number of registered types.
    pub const COUNT: usize = 20;

    /// All types indexed by type id.
    pub const ALL: [Type; Type::COUNT] = [
        Type::ZonedDateTime,
        Type::LocalDateTime,
        Type::Date,
        Type::ZonedTime,
        Type::LocalTime,
        Type::Duration,
        Type::Text,
        Type::Boolean,
        Type::Number,
        Type::ZonedDateTimeArray,
        Type::LocalDateTimeArray,
        Type::DateArray,
        Type::ZonedTimeArray,
        Type::LocalTimeArray,
        Type::DurationArray,
        Type::TextArray,
        Type::BooleanArray,
        Type::NumberArray,
        Type::Geometry,
        Type::GeometryArray,
    ];

    /// Lowest storable type, used for open-ended lower bounds.
    ///
    /// GeometryArray ranks lower but cannot be encoded, and bounds built
    /// from this type may end up in persisted separator keys.
    pub const LOWEST: Type = Type::ZonedDateTimeArray;

    /// Highest type, used for open-ended upper bounds.
    pub const HIGHEST: Type = Type::Number;

    /// Returns the persisted type id.
    pub fn type_id(self) -> u8 {
        self as u8
    }

    /// Looks up a type by persisted id. Unknown ids return None.
    pub fn from_type_id(id: u8) -> Option<Type> {
        Self::ALL.get(id as usize).copied()
    }

    /// Returns the value group this type stores.
    pub fn value_group(self) -> ValueGroup {
        match self {
            Type::ZonedDateTime => ValueGroup::ZonedDateTime,
            Type::LocalDateTime => ValueGroup::LocalDateTime,
            Type::Date => ValueGroup::Date,
            Type::ZonedTime => ValueGroup::ZonedTime,
            Type::LocalTime => ValueGroup::LocalTime,
            Type::Duration => ValueGroup::Duration,
            Type::Text => ValueGroup::Text,
            Type::Boolean => ValueGroup::Boolean,
            Type::Number => ValueGroup::Number,
            Type::ZonedDateTimeArray => ValueGroup::ZonedDateTimeArray,
            Type::LocalDateTimeArray => ValueGroup::LocalDateTimeArray,
            Type::DateArray => ValueGroup::DateArray,
            Type::ZonedTimeArray => ValueGroup::ZonedTimeArray,
            Type::LocalTimeArray => ValueGroup::LocalTimeArray,
            Type::DurationArray => ValueGroup::DurationArray,
            Type::TextArray => ValueGroup::TextArray,
            Type::BooleanArray => ValueGroup::BooleanArray,
            Type::NumberArray => ValueGroup::NumberArray,
            Type::Geometry => ValueGroup::Geometry,
            Type::GeometryArray => ValueGroup::GeometryArray,
        }
    }

    /// Returns the type storing the given group, if any.
    pub fn by_group(group: ValueGroup) -> Option<Type> {
        Self::ALL.iter().copied().find(|t| t.value_group() == group)
    }

    /// Type used for a lower bound over `group`. Wildcard groups map to [`Type::LOWEST`].
    pub fn lowest_by_value_group(group: ValueGroup) -> Type {
        Self::by_group(group).unwrap_or(Type::LOWEST)
    }

    /// Type used for an upper bound over `group`. Wildcard groups map to [`Type::HIGHEST`].
    pub fn highest_by_value_group(group: ValueGroup) -> Type {
        Self::by_group(group).unwrap_or(Type::HIGHEST)
    }

    /// Cross-type order, by value group rank.
    pub fn compare_order(self, other: Type) -> Ordering {
        self.value_group().cmp(&other.value_group())
    }

    /// Returns the element kind shared by this type and its array counterpart.
    pub fn element_kind(self) -> ElementKind {
        match self {
            Type::ZonedDateTime | Type::ZonedDateTimeArray => ElementKind::ZonedDateTime,
            Type::LocalDateTime | Type::LocalDateTimeArray => ElementKind::LocalDateTime,
            Type::Date | Type::DateArray => ElementKind::Date,
            Type::ZonedTime | Type::ZonedTimeArray => ElementKind::ZonedTime,
            Type::LocalTime | Type::LocalTimeArray => ElementKind::LocalTime,
            Type::Duration | Type::DurationArray => ElementKind::Duration,
            Type::Text | Type::TextArray => ElementKind::Text,
            Type::Boolean | Type::BooleanArray => ElementKind::Boolean,
            Type::Number | Type::NumberArray => ElementKind::Number,
            Type::Geometry | Type::GeometryArray => ElementKind::Geometry,
        }
    }

    /// Returns true for array types.
    pub fn is_array(self) -> bool {
        self.type_id() >= Type::ZonedDateTimeArray.type_id() && self != Type::Geometry
    }

    /// Returns true for types that are registered but cannot be encoded.
    pub fn is_placeholder(self) -> bool {
        matches!(self, Type::Geometry | Type::GeometryArray)
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value_group())
    }
}

/// Element encoding shared by a scalar type and its array type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    ZonedDateTime,
    LocalDateTime,
    Date,
    ZonedTime,
    LocalTime,
    Duration,
    Text,
    Boolean,
    Number,
    Geometry,
}

impl ElementKind {
    /// Encoded width of one element, or None when it depends on content.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            ElementKind::ZonedDateTime => Some(SIZE_ZONED_DATE_TIME),
            ElementKind::LocalDateTime => Some(SIZE_LOCAL_DATE_TIME),
            ElementKind::Date => Some(SIZE_DATE),
            ElementKind::ZonedTime => Some(SIZE_ZONED_TIME),
            ElementKind::LocalTime => Some(SIZE_LOCAL_TIME),
            ElementKind::Duration => Some(SIZE_DURATION),
            ElementKind::Boolean => Some(SIZE_BOOLEAN),
            ElementKind::Text | ElementKind::Number | ElementKind::Geometry => None,
        }
    }

    pub fn scalar_type(self) -> Type {
        match self {
            ElementKind::ZonedDateTime => Type::ZonedDateTime,
            ElementKind::LocalDateTime => Type::LocalDateTime,
            ElementKind::Date => Type::Date,
            ElementKind::ZonedTime => Type::ZonedTime,
            ElementKind::LocalTime => Type::LocalTime,
            ElementKind::Duration => Type::Duration,
            ElementKind::Text => Type::Text,
            ElementKind::Boolean => Type::Boolean,
            ElementKind::Number => Type::Number,
            ElementKind::Geometry => Type::Geometry,
        }
    }

    pub fn array_type(self) -> Type {
        match self {
            ElementKind::ZonedDateTime => Type::ZonedDateTimeArray,
            ElementKind::LocalDateTime => Type::LocalDateTimeArray,
            ElementKind::Date => Type::DateArray,
            ElementKind::ZonedTime => Type::ZonedTimeArray,
            ElementKind::LocalTime => Type::LocalTimeArray,
            ElementKind::Duration => Type::DurationArray,
            ElementKind::Text => Type::TextArray,
            ElementKind::Boolean => Type::BooleanArray,
            ElementKind::Number => Type::NumberArray,
            ElementKind::Geometry => Type::GeometryArray,
        }
    }
}

/// Decoded scalar payload of a slot or of one array element.
///
/// Text carries no payload here; its bytes live in the owning slot so the
/// buffers can be reused across decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Element {
    #[default]
    Empty,
    Boolean(bool),
    Number(RawNumber),
    Date {
        epoch_day: i64,
    },
    LocalTime {
        nanos_of_day: i64,
    },
    LocalDateTime {
        epoch_second: i64,
        nanos: i32,
    },
    ZonedTime {
        nanos_of_day_utc: i64,
        offset_seconds: i32,
    },
    ZonedDateTime {
        epoch_second_utc: i64,
        nanos: i32,
        offset_seconds: i32,
    },
    Duration {
        total_avg_seconds: i64,
        nanos: i32,
        months: i64,
        days: i64,
    },
    Text,
}

/// Consumes `n` bytes from a read budget.
pub(crate) fn take(budget: &mut usize, n: usize) -> Option<()> {
    if *budget < n {
        return None;
    }
    *budget -= n;
    Some(())
}

impl Element {
    pub(crate) fn date(d: &NaiveDate) -> Element {
        Element::Date {
            epoch_day: temporal::epoch_day(*d),
        }
    }

    pub(crate) fn local_time(t: &NaiveTime) -> Element {
        Element::LocalTime {
            nanos_of_day: temporal::nanos_of_day(*t),
        }
    }

    pub(crate) fn local_date_time(dt: &NaiveDateTime) -> Element {
        let (epoch_second, nanos) = temporal::epoch_second_and_nanos(*dt);
        Element::LocalDateTime {
            epoch_second,
            nanos,
        }
    }

    pub(crate) fn zoned_time(t: &ZonedTime) -> Element {
        let (nanos_of_day_utc, offset_seconds) = temporal::zoned_time_parts(t);
        Element::ZonedTime {
            nanos_of_day_utc,
            offset_seconds,
        }
    }

    pub(crate) fn zoned_date_time(dt: &DateTime<FixedOffset>) -> Element {
        let (epoch_second_utc, nanos, offset_seconds) = temporal::zoned_date_time_parts(dt);
        Element::ZonedDateTime {
            epoch_second_utc,
            nanos,
            offset_seconds,
        }
    }

    pub(crate) fn duration(d: &DurationValue) -> Element {
        let (total_avg_seconds, nanos, months, days) = temporal::duration_parts(d);
        Element::Duration {
            total_avg_seconds,
            nanos,
            months,
            days,
        }
    }

    /// Encodes a non-text scalar value.
    pub(crate) fn from_scalar(value: &Value) -> Option<(ElementKind, Element)> {
        let encoded = match value {
            Value::Boolean(b) => (ElementKind::Boolean, Element::Boolean(*b)),
            Value::Byte(_)
            | Value::Short(_)
            | Value::Int(_)
            | Value::Long(_)
            | Value::Float(_)
            | Value::Double(_) => {
                (ElementKind::Number, Element::Number(RawNumber::from_value(value)?))
            }
            Value::Date(d) => (ElementKind::Date, Element::date(d)),
            Value::LocalTime(t) => (ElementKind::LocalTime, Element::local_time(t)),
            Value::LocalDateTime(dt) => (ElementKind::LocalDateTime, Element::local_date_time(dt)),
            Value::ZonedTime(t) => (ElementKind::ZonedTime, Element::zoned_time(t)),
            Value::ZonedDateTime(dt) => (ElementKind::ZonedDateTime, Element::zoned_date_time(dt)),
            Value::Duration(d) => (ElementKind::Duration, Element::duration(d)),
            _ => return None,
        };
        Some(encoded)
    }

    /// Minimum sentinel of a kind. Paired with a LOW inclusion it sorts
    /// before every real value of that kind.
    pub(crate) fn lowest(kind: ElementKind) -> Element {
        match kind {
            ElementKind::Boolean => Element::Boolean(false),
            ElementKind::Number => Element::Number(RawNumber::from_f64(f64::NEG_INFINITY)),
            ElementKind::Date => Element::Date { epoch_day: i64::MIN },
            ElementKind::LocalTime => Element::LocalTime {
                nanos_of_day: i64::MIN,
            },
            ElementKind::LocalDateTime => Element::LocalDateTime {
                epoch_second: i64::MIN,
                nanos: i32::MIN,
            },
            ElementKind::ZonedTime => Element::ZonedTime {
                nanos_of_day_utc: i64::MIN,
                offset_seconds: i32::MIN,
            },
            ElementKind::ZonedDateTime => Element::ZonedDateTime {
                epoch_second_utc: i64::MIN,
                nanos: i32::MIN,
                offset_seconds: i32::MIN,
            },
            ElementKind::Duration => Element::Duration {
                total_avg_seconds: i64::MIN,
                nanos: i32::MIN,
                months: i64::MIN,
                days: i64::MIN,
            },
            ElementKind::Text => Element::Text,
            ElementKind::Geometry => Element::Empty,
        }
    }

    /// Maximum sentinel of a kind. NaN is the greatest number.
    pub(crate) fn highest(kind: ElementKind) -> Element {
        match kind {
            ElementKind::Boolean => Element::Boolean(true),
            ElementKind::Number => Element::Number(RawNumber::from_f64(f64::NAN)),
            ElementKind::Date => Element::Date { epoch_day: i64::MAX },
            ElementKind::LocalTime => Element::LocalTime {
                nanos_of_day: i64::MAX,
            },
            ElementKind::LocalDateTime => Element::LocalDateTime {
                epoch_second: i64::MAX,
                nanos: i32::MAX,
            },
            ElementKind::ZonedTime => Element::ZonedTime {
                nanos_of_day_utc: i64::MAX,
                offset_seconds: i32::MAX,
            },
            ElementKind::ZonedDateTime => Element::ZonedDateTime {
                epoch_second_utc: i64::MAX,
                nanos: i32::MAX,
                offset_seconds: i32::MAX,
            },
            ElementKind::Duration => Element::Duration {
                total_avg_seconds: i64::MAX,
                nanos: i32::MAX,
                months: i64::MAX,
                days: i64::MAX,
            },
            ElementKind::Text => Element::Text,
            ElementKind::Geometry => Element::Empty,
        }
    }

    /// Encoded width of this element, excluding any number kind tag.
    pub(crate) fn encoded_width(&self) -> usize {
        match self {
            Element::Empty | Element::Text => 0,
            Element::Boolean(_) => SIZE_BOOLEAN,
            Element::Number(n) => n.kind.width(),
            Element::Date { .. } => SIZE_DATE,
            Element::LocalTime { .. } => SIZE_LOCAL_TIME,
            Element::LocalDateTime { .. } => SIZE_LOCAL_DATE_TIME,
            Element::ZonedTime { .. } => SIZE_ZONED_TIME,
            Element::ZonedDateTime { .. } => SIZE_ZONED_DATE_TIME,
            Element::Duration { .. } => SIZE_DURATION,
        }
    }

    /// Writes the element payload. Number kind tags are written by the caller.
    pub(crate) fn put<B: BufMut>(&self, buf: &mut B) {
        match *self {
            Element::Empty | Element::Text => {}
            Element::Boolean(v) => buf.put_u8(if v { TRUE } else { FALSE }),
            Element::Number(n) => n.put_bits(buf),
            Element::Date { epoch_day } => buf.put_i64_le(epoch_day),
            Element::LocalTime { nanos_of_day } => buf.put_i64_le(nanos_of_day),
            Element::LocalDateTime {
                epoch_second,
                nanos,
            } => {
                buf.put_i64_le(epoch_second);
                buf.put_i32_le(nanos);
            }
            Element::ZonedTime {
                nanos_of_day_utc,
                offset_seconds,
            } => {
                buf.put_i64_le(nanos_of_day_utc);
                buf.put_i32_le(offset_seconds);
            }
            Element::ZonedDateTime {
                epoch_second_utc,
                nanos,
                offset_seconds,
            } => {
                buf.put_i64_le(epoch_second_utc);
                buf.put_i32_le(nanos);
                buf.put_i32_le(temporal::encode_offset(offset_seconds));
            }
            Element::Duration {
                total_avg_seconds,
                nanos,
                months,
                days,
            } => {
                buf.put_i64_le(total_avg_seconds);
                buf.put_i32_le(nanos);
                buf.put_i64_le(months);
                buf.put_i64_le(days);
            }
        }
    }

    /// Reads one fixed-width element, consuming from `budget`.
    ///
    /// Returns None if the budget is too small or the bytes are not a valid
    /// element. Text and geometry are not fixed-width and always fail here.
    pub(crate) fn read<B: Buf>(
        kind: ElementKind,
        number_kind: NumberKind,
        buf: &mut B,
        budget: &mut usize,
    ) -> Option<Element> {
        let width = match kind {
            ElementKind::Number => number_kind.width(),
            _ => kind.fixed_width()?,
        };
        take(budget, width)?;
        let element = match kind {
            ElementKind::Boolean => match buf.get_u8() {
                TRUE => Element::Boolean(true),
                FALSE => Element::Boolean(false),
                _ => return None,
            },
            ElementKind::Number => Element::Number(RawNumber::get_bits(buf, number_kind)),
            ElementKind::Date => Element::Date {
                epoch_day: buf.get_i64_le(),
            },
            ElementKind::LocalTime => Element::LocalTime {
                nanos_of_day: buf.get_i64_le(),
            },
            ElementKind::LocalDateTime => Element::LocalDateTime {
                epoch_second: buf.get_i64_le(),
                nanos: buf.get_i32_le(),
            },
            ElementKind::ZonedTime => Element::ZonedTime {
                nanos_of_day_utc: buf.get_i64_le(),
                offset_seconds: buf.get_i32_le(),
            },
            ElementKind::ZonedDateTime => {
                let epoch_second_utc = buf.get_i64_le();
                let nanos = buf.get_i32_le();
                let offset_seconds = temporal::decode_offset(buf.get_i32_le())?;
                Element::ZonedDateTime {
                    epoch_second_utc,
                    nanos,
                    offset_seconds,
                }
            }
            ElementKind::Duration => Element::Duration {
                total_avg_seconds: buf.get_i64_le(),
                nanos: buf.get_i32_le(),
                months: buf.get_i64_le(),
                days: buf.get_i64_le(),
            },
            ElementKind::Text | ElementKind::Geometry => return None,
        };
        Some(element)
    }

    /// Compares two elements of the same kind.
    pub(crate) fn compare(&self, other: &Element) -> Ordering {
        match (self, other) {
            (Element::Boolean(a), Element::Boolean(b)) => a.cmp(b),
            (Element::Number(a), Element::Number(b)) => a.compare_exact(*b),
            (Element::Date { epoch_day: a }, Element::Date { epoch_day: b }) => a.cmp(b),
            (Element::LocalTime { nanos_of_day: a }, Element::LocalTime { nanos_of_day: b }) => {
                a.cmp(b)
            }
            (
                Element::LocalDateTime {
                    epoch_second: a,
                    nanos: an,
                },
                Element::LocalDateTime {
                    epoch_second: b,
                    nanos: bn,
                },
            ) => (a, an).cmp(&(b, bn)),
            (
                Element::ZonedTime {
                    nanos_of_day_utc: a,
                    offset_seconds: ao,
                },
                Element::ZonedTime {
                    nanos_of_day_utc: b,
                    offset_seconds: bo,
                },
            ) => (a, ao).cmp(&(b, bo)),
            (
                Element::ZonedDateTime {
                    epoch_second_utc: a,
                    nanos: an,
                    offset_seconds: ao,
                },
                Element::ZonedDateTime {
                    epoch_second_utc: b,
                    nanos: bn,
                    offset_seconds: bo,
                },
            ) => (a, an, ao).cmp(&(b, bn, bo)),
            (
                Element::Duration {
                    total_avg_seconds: a,
                    nanos: an,
                    months: am,
                    days: ad,
                },
                Element::Duration {
                    total_avg_seconds: b,
                    nanos: bn,
                    months: bm,
                    days: bd,
                },
            ) => (a, an, am, ad).cmp(&(b, bn, bm, bd)),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Element::Empty => 0,
            Element::Boolean(_) => 1,
            Element::Number(_) => 2,
            Element::Date { .. } => 3,
            Element::LocalTime { .. } => 4,
            Element::LocalDateTime { .. } => 5,
            Element::ZonedTime { .. } => 6,
            Element::ZonedDateTime { .. } => 7,
            Element::Duration { .. } => 8,
            Element::Text => 9,
        }
    }

    /// Materializes a non-text element. None if the stored integers are
    /// outside the range of the value type.
    pub(crate) fn to_value(&self) -> Option<Value> {
        let value = match *self {
            Element::Boolean(b) => Value::Boolean(b),
            Element::Number(n) => n.to_value(),
            Element::Date { epoch_day } => Value::Date(temporal::date_from_epoch_day(epoch_day)?),
            Element::LocalTime { nanos_of_day } => {
                Value::LocalTime(temporal::time_from_nanos_of_day(nanos_of_day)?)
            }
            Element::LocalDateTime {
                epoch_second,
                nanos,
            } => Value::LocalDateTime(temporal::date_time_from_epoch_second(epoch_second, nanos)?),
            Element::ZonedTime {
                nanos_of_day_utc,
                offset_seconds,
            } => Value::ZonedTime(temporal::zoned_time_from_parts(
                nanos_of_day_utc,
                offset_seconds,
            )?),
            Element::ZonedDateTime {
                epoch_second_utc,
                nanos,
                offset_seconds,
            } => Value::ZonedDateTime(temporal::zoned_date_time_from_parts(
                epoch_second_utc,
                nanos,
                offset_seconds,
            )?),
            Element::Duration {
                total_avg_seconds,
                nanos,
                months,
                days,
            } => Value::Duration(temporal::duration_from_parts(
                total_avg_seconds,
                nanos,
                months,
                days,
            )),
            Element::Empty | Element::Text => return None,
        };
        Some(value)
    }
}
