//! Next-transmission-window start time.
//!
//! Transmission windows start at `_<M>:01.000` where `<M>` is the
//! configured start minute (even, 0/2/4/6/8), repeating every 10 UTC
//! minutes. The `:01` accounts for the protocol's one-second guard after
//! the even-minute boundary.

use crate::notional::{US_PER_MIN, US_PER_SEC};

/// Windows repeat every 10 UTC minutes.
pub const WINDOW_PERIOD_US: u64 = 10 * US_PER_MIN;

/// Monotonic instant of the next window start, given a GPS-derived
/// minute/second/microsecond reading taken at `now_us`.
///
/// Models a min/sec/us clock and subtracts the GPS time from the window
/// time; a negative difference wraps into the next 10-minute cycle. When
/// the reading is exactly `_<M>:00.000` the window is one second out, not
/// zero.
pub fn time_at_window_start_us(
    window_start_min: u8,
    gps_min: u8,
    gps_sec: u8,
    gps_us: u32,
    now_us: u64,
) -> u64 {
    let min_diff = i64::from(window_start_min) - i64::from(gps_min % 10);
    let sec_diff = 1 - i64::from(gps_sec);
    let us_diff = -i64::from(gps_us);

    let mut total_diff_us = min_diff * US_PER_MIN as i64 + sec_diff * US_PER_SEC as i64 + us_diff;
    if total_diff_us < 0 {
        total_diff_us += WINDOW_PERIOD_US as i64;
    }

    now_us + total_diff_us as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset_ms(window: u8, gps_min: u8, gps_sec: u8, gps_ms: u32) -> u64 {
        time_at_window_start_us(window, gps_min, gps_sec, gps_ms * 1_000, 0) / 1_000
    }

    #[test]
    fn window_ahead_in_same_cycle() {
        // window 4:01.000, gps _2:30.400
        assert_eq!(offset_ms(4, 22, 30, 400), 90_600);
    }

    #[test]
    fn window_one_second_out() {
        // window 4:01.000, gps _4:00.400
        assert_eq!(offset_ms(4, 4, 0, 400), 600);
    }

    #[test]
    fn window_behind_wraps_to_next_cycle() {
        // window 4:01.000, gps _5:30.400
        assert_eq!(offset_ms(4, 5, 30, 400), 510_600);
    }

    #[test]
    fn wraparound_boundary_cases() {
        assert_eq!(offset_ms(4, 4, 0, 999), 1);
        assert_eq!(offset_ms(4, 4, 1, 0), 0);
        assert_eq!(offset_ms(4, 4, 1, 1), 599_999);
    }

    #[test]
    fn exact_even_minute_yields_one_second() {
        for window in [0u8, 2, 4, 6, 8] {
            assert_eq!(
                time_at_window_start_us(window, window, 0, 0, 0),
                1_000_000
            );
        }
    }

    #[test]
    fn offset_is_added_to_now() {
        let base = time_at_window_start_us(0, 12, 34, 567_890, 0);
        assert_eq!(
            time_at_window_start_us(0, 12, 34, 567_890, 41),
            base + 41
        );
    }

    fn reference_us(window: u8, gps_min: u8, gps_sec: u8, gps_ms: u32) -> u64 {
        let mut expected_ms: i64 = i64::from(window) * 60_000 + 1_000
            - i64::from(gps_min % 10) * 60_000
            - i64::from(gps_sec) * 1_000
            - i64::from(gps_ms);
        if expected_ms < 0 {
            expected_ms += 600_000;
        }
        (expected_ms * 1_000) as u64
    }

    #[test]
    fn full_minute_second_sweep_matches_reference_formula() {
        for window in [0u8, 2, 4, 6, 8] {
            for gps_min in 0..60u8 {
                for gps_sec in 0..60u8 {
                    for gps_ms in [0u32, 1, 499, 500, 998, 999] {
                        let actual =
                            time_at_window_start_us(window, gps_min, gps_sec, gps_ms * 1_000, 0);
                        assert_eq!(
                            actual,
                            reference_us(window, gps_min, gps_sec, gps_ms),
                            "window={window} gps={gps_min}:{gps_sec}.{gps_ms:03}"
                        );
                        assert!(actual < WINDOW_PERIOD_US);
                    }
                }
            }
        }
    }

    #[test]
    fn dense_millisecond_sweep_around_the_boundary() {
        for window in [0u8, 2, 4, 6, 8] {
            for gps_sec in [0u8, 1, 2, 59] {
                for gps_ms in 0..1_000u32 {
                    let actual =
                        time_at_window_start_us(window, window, gps_sec, gps_ms * 1_000, 0);
                    assert_eq!(actual, reference_us(window, window, gps_sec, gps_ms));
                }
            }
        }
    }
}
