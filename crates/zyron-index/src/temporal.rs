//! Raw encodings of temporal values.
//!
//! Every temporal value maps to a tuple of integers whose lexicographic
//! order is the chronological order of the value. Conversions back to
//! chrono types return None when the stored integers are out of range.

use crate::value::{DurationValue, ZonedTime};
use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike,
};

pub const NANOS_PER_SECOND: i64 = 1_000_000_000;
pub const SECONDS_PER_DAY: i64 = 86_400;
pub const NANOS_PER_DAY: i64 = SECONDS_PER_DAY * NANOS_PER_SECOND;

/// Average month length in seconds (365.2425 days / 12).
pub const AVG_MONTH_SECONDS: i64 = 2_629_746;
/// Day length in seconds used for duration ordering.
pub const AVG_DAY_SECONDS: i64 = SECONDS_PER_DAY;

/// Flag marking an encoded zone as a named zone id rather than an offset.
pub const ZONE_ID_FLAG: i32 = 0x0100_0000;
/// Low bits of an encoded zone.
pub const ZONE_ID_MASK: i32 = 0x00FF_FFFF;

/// Days between 0001-01-01 (day 1 of the common era) and 1970-01-01.
const DAYS_FROM_CE_TO_EPOCH: i64 = 719_163;

pub fn epoch_day(date: NaiveDate) -> i64 {
    date.num_days_from_ce() as i64 - DAYS_FROM_CE_TO_EPOCH
}

pub fn date_from_epoch_day(epoch_day: i64) -> Option<NaiveDate> {
    let days_from_ce = i32::try_from(epoch_day.checked_add(DAYS_FROM_CE_TO_EPOCH)?).ok()?;
    NaiveDate::from_num_days_from_ce_opt(days_from_ce)
}

pub fn nanos_of_day(time: NaiveTime) -> i64 {
    time.num_seconds_from_midnight() as i64 * NANOS_PER_SECOND + time.nanosecond() as i64
}

pub fn time_from_nanos_of_day(nanos: i64) -> Option<NaiveTime> {
    if !(0..NANOS_PER_DAY).contains(&nanos) {
        return None;
    }
    NaiveTime::from_num_seconds_from_midnight_opt(
        (nanos / NANOS_PER_SECOND) as u32,
        (nanos % NANOS_PER_SECOND) as u32,
    )
}

/// Returns `(epoch_second, nanos)` of a local date-time.
pub fn epoch_second_and_nanos(dt: NaiveDateTime) -> (i64, i32) {
    let seconds =
        epoch_day(dt.date()) * SECONDS_PER_DAY + dt.time().num_seconds_from_midnight() as i64;
    (seconds, dt.time().nanosecond() as i32)
}

pub fn date_time_from_epoch_second(epoch_second: i64, nanos: i32) -> Option<NaiveDateTime> {
    let date = date_from_epoch_day(epoch_second.div_euclid(SECONDS_PER_DAY))?;
    let second_of_day = epoch_second.rem_euclid(SECONDS_PER_DAY) as u32;
    let time =
        NaiveTime::from_num_seconds_from_midnight_opt(second_of_day, u32::try_from(nanos).ok()?)?;
    Some(NaiveDateTime::new(date, time))
}

/// Returns `(epoch_second_utc, nanos, offset_seconds)`.
pub fn zoned_date_time_parts(dt: &DateTime<FixedOffset>) -> (i64, i32, i32) {
    let (seconds, nanos) = epoch_second_and_nanos(dt.naive_utc());
    (seconds, nanos, dt.offset().local_minus_utc())
}

pub fn zoned_date_time_from_parts(
    epoch_second_utc: i64,
    nanos: i32,
    offset_seconds: i32,
) -> Option<DateTime<FixedOffset>> {
    let utc = date_time_from_epoch_second(epoch_second_utc, nanos)?;
    let offset = FixedOffset::east_opt(offset_seconds)?;
    Some(offset.from_utc_datetime(&utc))
}

/// Returns `(nanos_of_day_utc, offset_seconds)`.
///
/// The UTC nanos may fall outside one day, which keeps the order of
/// times with different offsets intact.
pub fn zoned_time_parts(time: &ZonedTime) -> (i64, i32) {
    let offset = time.offset.local_minus_utc();
    (nanos_of_day(time.time) - offset as i64 * NANOS_PER_SECOND, offset)
}

pub fn zoned_time_from_parts(nanos_of_day_utc: i64, offset_seconds: i32) -> Option<ZonedTime> {
    let offset = FixedOffset::east_opt(offset_seconds)?;
    let local = nanos_of_day_utc.checked_add(offset_seconds as i64 * NANOS_PER_SECOND)?;
    Some(ZonedTime::new(time_from_nanos_of_day(local)?, offset))
}

/// Encodes a UTC offset into the persisted zone field.
pub fn encode_offset(offset_seconds: i32) -> i32 {
    offset_seconds & ZONE_ID_MASK
}

/// Decodes a persisted zone field. Named zone ids are not supported and
/// decode to None.
pub fn decode_offset(encoded: i32) -> Option<i32> {
    if encoded & ZONE_ID_FLAG != 0 {
        return None;
    }
    // Sign-extend the 24-bit offset.
    Some((encoded << 8) >> 8)
}

/// Returns `(total_avg_seconds, nanos, months, days)` of a duration.
pub fn duration_parts(d: &DurationValue) -> (i64, i32, i64, i64) {
    let total = d
        .months
        .wrapping_mul(AVG_MONTH_SECONDS)
        .wrapping_add(d.days.wrapping_mul(AVG_DAY_SECONDS))
        .wrapping_add(d.seconds);
    (total, d.nanos, d.months, d.days)
}

pub fn duration_from_parts(
    total_avg_seconds: i64,
    nanos: i32,
    months: i64,
    days: i64,
) -> DurationValue {
    let seconds = total_avg_seconds
        .wrapping_sub(months.wrapping_mul(AVG_MONTH_SECONDS))
        .wrapping_sub(days.wrapping_mul(AVG_DAY_SECONDS));
    DurationValue {
        months,
        days,
        seconds,
        nanos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_day() {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(epoch_day(epoch), 0);
        let before = NaiveDate::from_ymd_opt(1969, 12, 31).unwrap();
        assert_eq!(epoch_day(before), -1);
        assert_eq!(date_from_epoch_day(-1), Some(before));
        assert_eq!(date_from_epoch_day(i64::MAX), None);
    }

    #[test]
    fn test_local_date_time_before_epoch() {
        let dt = NaiveDate::from_ymd_opt(1969, 12, 31)
            .unwrap()
            .and_hms_nano_opt(23, 59, 59, 500)
            .unwrap();
        let (seconds, nanos) = epoch_second_and_nanos(dt);
        assert_eq!(seconds, -1);
        assert_eq!(nanos, 500);
        assert_eq!(date_time_from_epoch_second(seconds, nanos), Some(dt));
    }

    #[test]
    fn test_time_range_checked() {
        assert!(time_from_nanos_of_day(-1).is_none());
        assert!(time_from_nanos_of_day(NANOS_PER_DAY).is_none());
        let t = NaiveTime::from_hms_opt(12, 30, 0).unwrap();
        assert_eq!(time_from_nanos_of_day(nanos_of_day(t)), Some(t));
    }

    #[test]
    fn test_zoned_time_orders_by_utc() {
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let utc = FixedOffset::east_opt(0).unwrap();
        let a = ZonedTime::new(NaiveTime::from_hms_opt(1, 0, 0).unwrap(), plus_two);
        let b = ZonedTime::new(NaiveTime::from_hms_opt(0, 0, 0).unwrap(), utc);
        let (a_utc, _) = zoned_time_parts(&a);
        let (b_utc, _) = zoned_time_parts(&b);
        // 01:00+02:00 is 23:00 UTC the previous day.
        assert!(a_utc < b_utc);
        assert_eq!(zoned_time_from_parts(a_utc, 7200), Some(a));
    }

    #[test]
    fn test_offset_encoding() {
        for offset in [-18 * 3600, -3600, 0, 1800, 18 * 3600] {
            assert_eq!(decode_offset(encode_offset(offset)), Some(offset));
        }
        assert_eq!(decode_offset(ZONE_ID_FLAG | 42), None);
    }

    #[test]
    fn test_duration_parts() {
        let d = DurationValue::new(1, 2, 3, 4);
        let (total, nanos, months, days) = duration_parts(&d);
        assert_eq!(total, AVG_MONTH_SECONDS + 2 * AVG_DAY_SECONDS + 3);
        assert_eq!(duration_from_parts(total, nanos, months, days), d);
    }
}
