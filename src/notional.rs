//! Notional time: UTC maintained as a signed offset from the monotonic clock.
//!
//! The event loop runs on monotonic microseconds; UTC is derived only when
//! needed, for logging and for window arithmetic. Every GPS time lock
//! resynchronizes the offset, so time shifts stay local to this module and
//! to the pending-timer re-projection in the timer wheel.
//!
//! GPS time-only locks can carry a zeroed date (`0000-00-00 HH:MM:SS`);
//! those map onto microseconds into the day, which is all the window math
//! ever consumes.

use chrono::{DateTime, Datelike, NaiveDate, Timelike};

pub const US_PER_SEC: u64 = 1_000_000;
pub const US_PER_MIN: u64 = 60 * US_PER_SEC;
pub const US_PER_HOUR: u64 = 60 * US_PER_MIN;
pub const US_PER_DAY: u64 = 24 * US_PER_HOUR;

/// Broken-down UTC instant. `year == 0` marks the time-only form, in which
/// case `month` and `day` are zero as well.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimeParts {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// Microseconds into the second, 0..1_000_000.
    pub us: u32,
}

fn ascii_num(bytes: &[u8]) -> Option<u32> {
    let mut value: u32 = 0;
    for &b in bytes {
        if !b.is_ascii_digit() {
            return None;
        }
        value = value * 10 + u32::from(b - b'0');
    }
    Some(value)
}

/// Parse `"YYYY-MM-DD HH:MM:SS[.frac]"` with up to six fractional digits.
/// The zero-date form (`0000-00-00`) is accepted for time-only locks.
pub fn parse_date_time(s: &str) -> Option<TimeParts> {
    let b = s.as_bytes();
    if b.len() < 19 {
        return None;
    }
    if b[4] != b'-' || b[7] != b'-' || b[10] != b' ' || b[13] != b':' || b[16] != b':' {
        return None;
    }

    let year = ascii_num(&b[0..4])? as u16;
    let month = ascii_num(&b[5..7])? as u8;
    let day = ascii_num(&b[8..10])? as u8;
    let hour = ascii_num(&b[11..13])? as u8;
    let minute = ascii_num(&b[14..16])? as u8;
    let second = ascii_num(&b[17..19])? as u8;

    let mut us: u32 = 0;
    if b.len() > 19 {
        if b[19] != b'.' {
            return None;
        }
        let frac = &b[20..];
        if frac.is_empty() || frac.len() > 6 {
            return None;
        }
        us = ascii_num(frac)?;
        for _ in frac.len()..6 {
            us *= 10;
        }
    }

    if hour >= 24 || minute >= 60 || second >= 60 {
        return None;
    }
    if year == 0 {
        if month != 0 || day != 0 {
            return None;
        }
    } else if month == 0 || month > 12 || day == 0 || day > 31 {
        return None;
    }

    Some(TimeParts {
        year,
        month,
        day,
        hour,
        minute,
        second,
        us,
    })
}

/// Microseconds since the Unix epoch for dated parts, or microseconds into
/// the day for the time-only form. Pre-1970 or invalid calendar dates map
/// to `None`.
pub fn parts_to_us(p: &TimeParts) -> Option<u64> {
    let tod = u64::from(p.hour) * US_PER_HOUR
        + u64::from(p.minute) * US_PER_MIN
        + u64::from(p.second) * US_PER_SEC
        + u64::from(p.us);

    if p.year == 0 {
        return Some(tod);
    }

    let date = NaiveDate::from_ymd_opt(i32::from(p.year), u32::from(p.month), u32::from(p.day))?;
    let dt = date.and_hms_micro_opt(
        u32::from(p.hour),
        u32::from(p.minute),
        u32::from(p.second),
        p.us,
    )?;
    u64::try_from(dt.and_utc().timestamp_micros()).ok()
}

/// Inverse of [`parts_to_us`] for the dated form.
pub fn us_to_parts(us: u64) -> TimeParts {
    let dt = DateTime::from_timestamp_micros(us as i64).unwrap_or_default();
    TimeParts {
        year: dt.year() as u16,
        month: dt.month() as u8,
        day: dt.day() as u8,
        hour: dt.hour() as u8,
        minute: dt.minute() as u8,
        second: dt.second() as u8,
        us: dt.timestamp_subsec_micros(),
    }
}

/// `"YYYY-MM-DD HH:MM:SS.uuuuuu"`.
pub fn format_date_time(p: &TimeParts) -> String {
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06}",
        p.year, p.month, p.day, p.hour, p.minute, p.second, p.us
    )
}

/// UTC as a signed microsecond offset from the monotonic clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct NotionalTime {
    offset_us: i64,
}

impl NotionalTime {
    pub const fn new() -> Self {
        Self { offset_us: 0 }
    }

    /// Resynchronize so that `utc_at(system_at_capture_us) == utc_us`.
    /// Returns old offset minus new offset for drift measurement.
    pub fn set_from_gps(&mut self, utc_us: u64, system_at_capture_us: u64) -> i64 {
        let new_offset = utc_us as i64 - system_at_capture_us as i64;
        let drift = self.offset_us - new_offset;
        self.offset_us = new_offset;
        drift
    }

    pub fn offset_us(&self) -> i64 {
        self.offset_us
    }

    pub fn utc_at(&self, system_us: u64) -> u64 {
        let utc = system_us as i64 + self.offset_us;
        utc.max(0) as u64
    }

    pub fn parts_at(&self, system_us: u64) -> TimeParts {
        us_to_parts(self.utc_at(system_us))
    }

    pub fn datetime_at(&self, system_us: u64) -> String {
        format_date_time(&self.parts_at(system_us))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_date_time() {
        let p = parse_date_time("2025-01-01 12:10:00.500").unwrap();
        assert_eq!(
            p,
            TimeParts {
                year: 2025,
                month: 1,
                day: 1,
                hour: 12,
                minute: 10,
                second: 0,
                us: 500_000,
            }
        );
    }

    #[test]
    fn parses_six_digit_fraction_and_no_fraction() {
        assert_eq!(
            parse_date_time("2025-06-30 23:59:59.000001").unwrap().us,
            1
        );
        assert_eq!(parse_date_time("2025-06-30 23:59:59").unwrap().us, 0);
    }

    #[test]
    fn parses_time_only_zero_date() {
        let p = parse_date_time("0000-00-00 23:10:28.000").unwrap();
        assert_eq!(p.year, 0);
        assert_eq!(p.hour, 23);
        assert_eq!(p.minute, 10);
        assert_eq!(p.second, 28);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_date_time("").is_none());
        assert!(parse_date_time("2025-01-01").is_none());
        assert!(parse_date_time("2025/01/01 12:10:00").is_none());
        assert!(parse_date_time("2025-01-01 24:00:00").is_none());
        assert!(parse_date_time("2025-01-01 12:60:00").is_none());
        assert!(parse_date_time("2025-01-01 12:00:60").is_none());
        assert!(parse_date_time("2025-00-01 12:00:00").is_none());
        assert!(parse_date_time("0000-01-00 12:00:00").is_none());
        assert!(parse_date_time("2025-01-01 12:00:00.1234567").is_none());
    }

    #[test]
    fn round_trips_through_epoch_micros() {
        let p = parse_date_time("2025-01-01 12:10:00.500").unwrap();
        let us = parts_to_us(&p).unwrap();
        assert_eq!(us_to_parts(us), p);
        assert_eq!(format_date_time(&us_to_parts(us)), "2025-01-01 12:10:00.500000");
    }

    #[test]
    fn time_only_maps_to_day_fraction() {
        let p = parse_date_time("0000-00-00 01:02:03.000004").unwrap();
        assert_eq!(
            parts_to_us(&p).unwrap(),
            US_PER_HOUR + 2 * US_PER_MIN + 3 * US_PER_SEC + 4
        );
    }

    #[test]
    fn rejects_invalid_calendar_dates() {
        let p = parse_date_time("2025-02-30 00:00:00").unwrap();
        assert!(parts_to_us(&p).is_none());
        let p = parse_date_time("1960-01-01 00:00:00").unwrap();
        assert!(parts_to_us(&p).is_none());
    }

    #[test]
    fn sync_reports_old_minus_new_offset() {
        let mut nt = NotionalTime::new();
        let first = nt.set_from_gps(1_000_000, 400);
        assert_eq!(first, -(1_000_000 - 400));
        assert_eq!(nt.utc_at(400), 1_000_000);
        assert_eq!(nt.utc_at(500), 1_000_100);

        // system clock gained 10us on UTC between syncs
        let drift = nt.set_from_gps(2_000_000, 1_000_410);
        assert_eq!(drift, 10);
    }

    #[test]
    fn utc_before_epoch_clamps_to_zero() {
        let mut nt = NotionalTime::new();
        nt.set_from_gps(0, 1_000);
        assert_eq!(nt.utc_at(0), 0);
    }

    #[test]
    fn parts_at_follows_offset() {
        let mut nt = NotionalTime::new();
        let p = parse_date_time("2025-01-01 12:09:50.000").unwrap();
        nt.set_from_gps(parts_to_us(&p).unwrap(), 7_000_000);
        let parts = nt.parts_at(7_000_000 + 10 * US_PER_SEC);
        assert_eq!(parts.minute, 10);
        assert_eq!(parts.second, 0);
        assert_eq!(parts.us, 0);
    }
}
