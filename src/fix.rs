//! GPS fix readings as delivered by the GPS driver.
//!
//! `FixTime` carries time-only guarantees: the driver only emits one when
//! the millisecond field is exactly zero and the same second was observed
//! on two consecutive PPS-aligned sentences. `Fix3DPlus` adds position and
//! implies time validity.

use heapless::String as GridString;

use crate::notional::{self, TimeParts};

/// Time-only GPS reading. Either `year != 0` (full datetime) or all date
/// fields are zero (time-only lock).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FixTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millisecond: u16,
    /// Canonical `"YYYY-MM-DD HH:MM:SS.mmm"` form of the fields above.
    pub date_time: String,
}

impl FixTime {
    /// Build from a canonical datetime string.
    pub fn from_date_time(date_time: &str) -> Option<Self> {
        let p = notional::parse_date_time(date_time)?;
        Some(Self {
            year: p.year,
            month: p.month,
            day: p.day,
            hour: p.hour,
            minute: p.minute,
            second: p.second,
            millisecond: (p.us / 1_000) as u16,
            date_time: date_time.to_string(),
        })
    }

    pub fn has_full_date(&self) -> bool {
        self.year != 0
    }

    fn parts(&self) -> TimeParts {
        TimeParts {
            year: self.year,
            month: self.month,
            day: self.day,
            hour: self.hour,
            minute: self.minute,
            second: self.second,
            us: u32::from(self.millisecond) * 1_000,
        }
    }

    /// Microseconds since the Unix epoch for dated fixes, microseconds into
    /// the day for time-only fixes.
    pub fn utc_us(&self) -> u64 {
        notional::parts_to_us(&self.parts()).unwrap_or(0)
    }
}

/// Format fix fields into the canonical `"YYYY-MM-DD HH:MM:SS.mmm"` string.
pub fn make_date_time(
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
    millisecond: u16,
) -> String {
    format!(
        "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{millisecond:03}"
    )
}

/// Position + time GPS reading.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fix3DPlus {
    pub time: FixTime,
    pub lat_deg_millionths: i32,
    pub lng_deg_millionths: i32,
    pub altitude_m: i32,
    pub maidenhead_grid: GridString<6>,
    pub speed_knots: f32,
    pub course_degrees: f32,
    /// Monotonic timestamp captured at the PPS edge associated with this fix.
    pub time_at_pps_us: u64,
}

impl Fix3DPlus {
    /// Build a position-less fix from a canonical datetime string. Used by
    /// simulation and tests; a real driver fills every field.
    pub fn from_date_time(date_time: &str) -> Option<Self> {
        Some(Self {
            time: FixTime::from_date_time(date_time)?,
            ..Self::default()
        })
    }

    /// First four characters of the grid, the type-1 message subset.
    pub fn grid4(&self) -> &str {
        let grid = self.maidenhead_grid.as_str();
        &grid[..grid.len().min(4)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notional::US_PER_SEC;

    #[test]
    fn from_date_time_fills_fields() {
        let f = FixTime::from_date_time("2025-01-01 12:10:00.500").unwrap();
        assert_eq!(f.year, 2025);
        assert_eq!(f.minute, 10);
        assert_eq!(f.millisecond, 500);
        assert!(f.has_full_date());
    }

    #[test]
    fn utc_us_dated_vs_time_only() {
        let dated = FixTime::from_date_time("2025-01-01 00:00:01.000").unwrap();
        let time_only = FixTime::from_date_time("0000-00-00 00:00:01.000").unwrap();
        assert!(!time_only.has_full_date());
        assert_eq!(time_only.utc_us(), US_PER_SEC);
        assert!(dated.utc_us() > time_only.utc_us());
        assert_eq!(dated.utc_us() % US_PER_SEC, 0);
    }

    #[test]
    fn canonical_format_round_trips() {
        let s = make_date_time(2025, 1, 2, 19, 42, 2, 25);
        assert_eq!(s, "2025-01-02 19:42:02.025");
        let f = FixTime::from_date_time(&s).unwrap();
        assert_eq!(f.millisecond, 25);
        assert_eq!(f.date_time, s);
    }

    #[test]
    fn grid4_truncates() {
        let mut fix = Fix3DPlus::from_date_time("2025-01-01 12:00:00.000").unwrap();
        fix.maidenhead_grid = GridString::try_from("FN20ab").unwrap();
        assert_eq!(fix.grid4(), "FN20");
    }
}
