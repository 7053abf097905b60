//! First-class property values that index keys encode and materialize.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use zyron_common::ValueGroup;

/// Time of day with a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ZonedTime {
    pub time: NaiveTime,
    pub offset: FixedOffset,
}

impl ZonedTime {
    pub fn new(time: NaiveTime, offset: FixedOffset) -> Self {
        Self { time, offset }
    }
}

/// Calendar-aware duration.
///
/// Months and days are kept apart from seconds since their length in
/// seconds depends on the calendar. `nanos` is always in `0..1_000_000_000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DurationValue {
    pub months: i64,
    pub days: i64,
    pub seconds: i64,
    pub nanos: i32,
}

impl DurationValue {
    const NANOS_PER_SECOND: i64 = 1_000_000_000;

    /// Creates a duration, carrying out-of-range nanos into seconds.
    pub fn new(months: i64, days: i64, seconds: i64, nanos: i64) -> Self {
        let seconds = seconds.wrapping_add(nanos.div_euclid(Self::NANOS_PER_SECOND));
        let nanos = nanos.rem_euclid(Self::NANOS_PER_SECOND) as i32;
        Self {
            months,
            days,
            seconds,
            nanos,
        }
    }
}

/// Spatial point. Points are accepted as values but cannot be indexed yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointValue {
    pub srid: i32,
    pub x: f64,
    pub y: f64,
}

/// A property value as seen by index clients.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Text(String),
    Date(NaiveDate),
    LocalTime(NaiveTime),
    LocalDateTime(NaiveDateTime),
    ZonedTime(ZonedTime),
    ZonedDateTime(DateTime<FixedOffset>),
    Duration(DurationValue),
    Point(PointValue),

    BooleanArray(Vec<bool>),
    ByteArray(Vec<i8>),
    ShortArray(Vec<i16>),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
    FloatArray(Vec<f32>),
    DoubleArray(Vec<f64>),
    TextArray(Vec<String>),
    DateArray(Vec<NaiveDate>),
    LocalTimeArray(Vec<NaiveTime>),
    LocalDateTimeArray(Vec<NaiveDateTime>),
    ZonedTimeArray(Vec<ZonedTime>),
    ZonedDateTimeArray(Vec<DateTime<FixedOffset>>),
    DurationArray(Vec<DurationValue>),
    PointArray(Vec<PointValue>),
}

impl Value {
    /// Returns the logical group of this value.
    pub fn value_group(&self) -> ValueGroup {
        match self {
            Value::Boolean(_) => ValueGroup::Boolean,
            Value::Byte(_)
            | Value::Short(_)
            | Value::Int(_)
            | Value::Long(_)
            | Value::Float(_)
            | Value::Double(_) => ValueGroup::Number,
            Value::Text(_) => ValueGroup::Text,
            Value::Date(_) => ValueGroup::Date,
            Value::LocalTime(_) => ValueGroup::LocalTime,
            Value::LocalDateTime(_) => ValueGroup::LocalDateTime,
            Value::ZonedTime(_) => ValueGroup::ZonedTime,
            Value::ZonedDateTime(_) => ValueGroup::ZonedDateTime,
            Value::Duration(_) => ValueGroup::Duration,
            Value::Point(_) => ValueGroup::Geometry,
            Value::BooleanArray(_) => ValueGroup::BooleanArray,
            Value::ByteArray(_)
            | Value::ShortArray(_)
            | Value::IntArray(_)
            | Value::LongArray(_)
            | Value::FloatArray(_)
            | Value::DoubleArray(_) => ValueGroup::NumberArray,
            Value::TextArray(_) => ValueGroup::TextArray,
            Value::DateArray(_) => ValueGroup::DateArray,
            Value::LocalTimeArray(_) => ValueGroup::LocalTimeArray,
            Value::LocalDateTimeArray(_) => ValueGroup::LocalDateTimeArray,
            Value::ZonedTimeArray(_) => ValueGroup::ZonedTimeArray,
            Value::ZonedDateTimeArray(_) => ValueGroup::ZonedDateTimeArray,
            Value::DurationArray(_) => ValueGroup::DurationArray,
            Value::PointArray(_) => ValueGroup::GeometryArray,
        }
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "BOOLEAN",
            Value::Byte(_) => "BYTE",
            Value::Short(_) => "SHORT",
            Value::Int(_) => "INT",
            Value::Long(_) => "LONG",
            Value::Float(_) => "FLOAT",
            Value::Double(_) => "DOUBLE",
            Value::Text(_) => "TEXT",
            Value::Date(_) => "DATE",
            Value::LocalTime(_) => "LOCAL_TIME",
            Value::LocalDateTime(_) => "LOCAL_DATE_TIME",
            Value::ZonedTime(_) => "ZONED_TIME",
            Value::ZonedDateTime(_) => "ZONED_DATE_TIME",
            Value::Duration(_) => "DURATION",
            Value::Point(_) => "POINT",
            Value::BooleanArray(_) => "BOOLEAN[]",
            Value::ByteArray(_) => "BYTE[]",
            Value::ShortArray(_) => "SHORT[]",
            Value::IntArray(_) => "INT[]",
            Value::LongArray(_) => "LONG[]",
            Value::FloatArray(_) => "FLOAT[]",
            Value::DoubleArray(_) => "DOUBLE[]",
            Value::TextArray(_) => "TEXT[]",
            Value::DateArray(_) => "DATE[]",
            Value::LocalTimeArray(_) => "LOCAL_TIME[]",
            Value::LocalDateTimeArray(_) => "LOCAL_DATE_TIME[]",
            Value::ZonedTimeArray(_) => "ZONED_TIME[]",
            Value::ZonedDateTimeArray(_) => "ZONED_DATE_TIME[]",
            Value::DurationArray(_) => "DURATION[]",
            Value::PointArray(_) => "POINT[]",
        }
    }

    /// Returns the text content if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "\"{}\"", v),
            Value::Date(v) => write!(f, "{}", v),
            Value::LocalTime(v) => write!(f, "{}", v),
            Value::LocalDateTime(v) => write!(f, "{}", v),
            Value::ZonedTime(v) => write!(f, "{}{}", v.time, v.offset),
            Value::ZonedDateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Duration(v) => write!(
                f,
                "P{}M{}DT{}.{:09}S",
                v.months, v.days, v.seconds, v.nanos
            ),
            Value::Point(v) => write!(f, "point({}, {}, srid={})", v.x, v.y, v.srid),
            Value::BooleanArray(v) => write_list(f, v),
            Value::ByteArray(v) => write_list(f, v),
            Value::ShortArray(v) => write_list(f, v),
            Value::IntArray(v) => write_list(f, v),
            Value::LongArray(v) => write_list(f, v),
            Value::FloatArray(v) => write_list(f, v),
            Value::DoubleArray(v) => write_list(f, v),
            Value::TextArray(v) => write_list(f, v),
            Value::DateArray(v) => write_list(f, v),
            Value::LocalTimeArray(v) => write_list(f, v),
            Value::LocalDateTimeArray(v) => write_list(f, v),
            Value::ZonedTimeArray(v) => {
                let items: Vec<String> =
                    v.iter().map(|t| format!("{}{}", t.time, t.offset)).collect();
                write_list(f, &items)
            }
            Value::ZonedDateTimeArray(v) => {
                let items: Vec<String> = v.iter().map(|t| t.to_rfc3339()).collect();
                write_list(f, &items)
            }
            Value::DurationArray(v) => write!(f, "{:?}", v),
            Value::PointArray(v) => write!(f, "{:?}", v),
        }
    }
}

fn write_list<T: std::fmt::Display>(
    f: &mut std::fmt::Formatter<'_>,
    items: &[T],
) -> std::fmt::Result {
    write!(f, "[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    write!(f, "]")
}
