//! # Time Formatters
//!
//! Pure, stateless conversions from a timestamp into the display strings of the
//! dashboard. Every function is deterministic given `(now, configuration)`; the
//! timezone is carried by the `DateTime` itself, so tests pin `FixedOffset`
//! instants and production uses the configured `chrono_tz` zone.
//!
//! ## Wake Window
//! The wake window is `[start_hour:00, end_hour:00)` on the calendar day of `now`,
//! in local time. Day progress, the elapsed/remaining durations and the chime all
//! key off it.
//!
//! ## Age
//! Age is (now - birth) in days divided by 365.25. This ignores the real leap-year
//! structure of the calendar; it is a display approximation only.

use crate::config::WakeWindow;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike};

/// Milliseconds in one day
pub const DAY_MS: i64 = 1000 * 60 * 60 * 24;

/// Average year length used by the age approximation
const DAYS_PER_YEAR: f64 = 365.25;

/// Clamp a fraction into `[0, 1]`.
pub fn clamp01(value: f64) -> f64 {
    if value <= 0.0 {
        0.0
    } else if value >= 1.0 {
        1.0
    } else {
        value
    }
}

/// Zero-pad to two digits.
pub fn pad2(value: u32) -> String {
    format!("{:02}", value)
}

/// Format a duration in milliseconds as `HH:MM:SS`.
///
/// Negative input clamps to zero; partial seconds are floored.
///
/// # Example
/// ```
/// use live_tracker_lib::time::hms;
///
/// assert_eq!(hms(3_723_999), "01:02:03");
/// assert_eq!(hms(-500), "00:00:00");
/// ```
pub fn hms(ms: i64) -> String {
    let total_seconds = ms.div_euclid(1000).max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Local `h:mm AM` rendering of an instant.
pub fn fmt_local_hm<Tz: TimeZone>(when: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    when.format("%-I:%M %p").to_string()
}

/// Resolve a naive local date-time in `tz`.
///
/// Ambiguous times (DST fall-back) take the earlier instant. Times inside a DST
/// gap move forward by the gap, the way a browser `Date` does.
pub fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return dt;
    }
    tz.from_local_datetime(&(naive + Duration::hours(1)))
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}

/// Local midnight of `date` plus `hour` hours; `hour == 24` is the next midnight.
fn local_hour<Tz: TimeZone>(tz: &Tz, date: NaiveDate, hour: u32) -> DateTime<Tz> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    resolve_local(tz, midnight + Duration::hours(i64::from(hour)))
}

/// Start and end instants of the wake window on `now`'s calendar day.
pub fn wake_bounds<Tz: TimeZone>(
    now: &DateTime<Tz>,
    window: WakeWindow,
) -> (DateTime<Tz>, DateTime<Tz>) {
    let tz = now.timezone();
    let date = now.date_naive();
    (
        local_hour(&tz, date, window.start_hour),
        local_hour(&tz, date, window.end_hour),
    )
}

/// Fraction of today's wake window elapsed.
///
/// 0 at or before the window start, 1 at or after its end.
pub fn day_progress<Tz: TimeZone>(now: &DateTime<Tz>, window: WakeWindow) -> f64 {
    let (start, end) = wake_bounds(now, window);
    if *now <= start {
        return 0.0;
    }
    if *now >= end {
        return 1.0;
    }
    let elapsed = (now.clone() - start.clone()).num_milliseconds() as f64;
    let total = (end - start).num_milliseconds() as f64;
    clamp01(elapsed / total)
}

/// Fraction of the current calendar year elapsed.
pub fn year_progress<Tz: TimeZone>(now: &DateTime<Tz>) -> f64 {
    let (start, end) = year_bounds(now);
    let elapsed = (now.clone() - start.clone()).num_milliseconds() as f64;
    let total = (end - start).num_milliseconds() as f64;
    clamp01(elapsed / total)
}

fn year_bounds<Tz: TimeZone>(now: &DateTime<Tz>) -> (DateTime<Tz>, DateTime<Tz>) {
    let tz = now.timezone();
    let year = now.year();
    let jan1 = |y: i32| {
        NaiveDate::from_ymd_opt(y, 1, 1)
            .map(|d| local_hour(&tz, d, 0))
            .unwrap_or_else(|| now.clone())
    };
    (jan1(year), jan1(year + 1))
}

/// True iff the local hour of `now` is inside the wake window.
pub fn within_wake_window<Tz: TimeZone>(now: &DateTime<Tz>, window: WakeWindow) -> bool {
    let hour = now.hour();
    hour >= window.start_hour && hour < window.end_hour
}

/// Elapsed and remaining parts of today's wake window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayDurations {
    pub elapsed: String,
    pub remaining: String,
}

/// Format elapsed/remaining wake time as `HH:MM:SS` pairs.
pub fn day_durations<Tz: TimeZone>(now: &DateTime<Tz>, window: WakeWindow) -> DayDurations {
    let (start, end) = wake_bounds(now, window);
    let total = (end - start.clone()).num_milliseconds().max(0);
    let elapsed = (now.clone() - start).num_milliseconds().clamp(0, total);
    let remaining = (total - elapsed).max(0);
    DayDurations {
        elapsed: hms(elapsed),
        remaining: hms(remaining),
    }
}

/// Approximate age.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Age {
    /// Fractional years since birth
    pub years_fraction: f64,
    /// Whole years
    pub years: i64,
    /// Whole days past the last whole year
    pub days: i64,
}

impl Age {
    /// Six-decimal fractional years, e.g. `32.112345`.
    pub fn value(&self) -> String {
        format!("{:.6}", self.years_fraction)
    }

    /// Whole years and days, e.g. `32y 41d`.
    pub fn summary(&self) -> String {
        format!("{}y {}d", self.years, self.days)
    }
}

/// Compute the age approximation between `birth` and `now`.
pub fn age<Tz: TimeZone>(now: &DateTime<Tz>, birth: &DateTime<Tz>) -> Age {
    let diff_ms = (now.clone() - birth.clone()).num_milliseconds() as f64;
    let years_fraction = diff_ms / (DAY_MS as f64 * DAYS_PER_YEAR);
    let years = years_fraction.floor();
    let days = ((years_fraction - years) * DAYS_PER_YEAR).floor();
    Age {
        years_fraction,
        years: years as i64,
        days: days as i64,
    }
}

/// Local wall-clock time `HH:MM:SS` and upper-cased zone abbreviation.
pub fn clock<Tz: TimeZone>(now: &DateTime<Tz>) -> (String, String)
where
    Tz::Offset: std::fmt::Display,
{
    let value = format!(
        "{}:{}:{}",
        pad2(now.hour()),
        pad2(now.minute()),
        pad2(now.second())
    );
    let zone = now.format("%Z").to_string().to_uppercase();
    (value, zone)
}

/// Whole days (rounded up) until the next January 1st.
pub fn days_left_in_year<Tz: TimeZone>(now: &DateTime<Tz>) -> i64 {
    let (_, next_year) = year_bounds(now);
    let ms = (next_year - now.clone()).num_milliseconds();
    // ceil for non-negative ms
    (ms + DAY_MS - 1).div_euclid(DAY_MS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn denver() -> FixedOffset {
        FixedOffset::west_opt(7 * 3600).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<FixedOffset> {
        denver().with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_hms_formats_and_clamps() {
        assert_eq!(hms(0), "00:00:00");
        assert_eq!(hms(999), "00:00:00");
        assert_eq!(hms(1000), "00:00:01");
        assert_eq!(hms(59 * 60 * 1000 + 59_999), "00:59:59");
        assert_eq!(hms(15 * 3600 * 1000), "15:00:00");
        assert_eq!(hms(-500), "00:00:00");
    }

    #[test]
    fn test_hms_shape_and_monotonic() {
        let mut previous = String::new();
        for ms in (0..(24 * 3600 * 1000)).step_by(7_777) {
            let out = hms(ms);
            let parts: Vec<&str> = out.split(':').collect();
            assert_eq!(parts.len(), 3, "{out}");
            assert!(parts.iter().all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_digit())));
            // zero-padded fixed width, so lexical order is numeric order
            assert!(out >= previous, "{out} < {previous}");
            previous = out;
        }
    }

    #[test]
    fn test_day_progress_boundaries() {
        let window = WakeWindow::default();
        assert_eq!(day_progress(&at(2025, 6, 1, 7, 0, 0), window), 0.0);
        assert_eq!(day_progress(&at(2025, 6, 1, 3, 0, 0), window), 0.0);
        assert_eq!(day_progress(&at(2025, 6, 1, 22, 0, 0), window), 1.0);
        assert_eq!(day_progress(&at(2025, 6, 1, 23, 59, 59), window), 1.0);
        let mid = day_progress(&at(2025, 6, 1, 14, 30, 0), window);
        assert!((mid - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_day_progress_in_unit_range() {
        let window = WakeWindow::default();
        let start = at(2025, 1, 1, 0, 0, 0);
        for step in 0..(48 * 4) {
            let now = start + Duration::minutes(step * 15);
            let p = day_progress(&now, window);
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_year_progress() {
        assert_eq!(year_progress(&at(2025, 1, 1, 0, 0, 0)), 0.0);
        let mut previous = -1.0;
        for day in 0..365 {
            let now = at(2025, 1, 1, 12, 0, 0) + Duration::days(day);
            let p = year_progress(&now);
            assert!((0.0..=1.0).contains(&p));
            assert!(p > previous);
            previous = p;
        }
        // 2024 is a leap year: July 2nd midnight is exactly halfway
        let half = year_progress(&at(2024, 7, 2, 0, 0, 0));
        assert!((half - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_within_wake_window() {
        let window = WakeWindow::default();
        assert!(!within_wake_window(&at(2025, 6, 1, 6, 59, 59), window));
        assert!(within_wake_window(&at(2025, 6, 1, 7, 0, 0), window));
        assert!(within_wake_window(&at(2025, 6, 1, 21, 59, 59), window));
        assert!(!within_wake_window(&at(2025, 6, 1, 22, 0, 0), window));
    }

    #[test]
    fn test_day_durations() {
        let window = WakeWindow::default();
        let d = day_durations(&at(2025, 6, 1, 8, 30, 15), window);
        assert_eq!(d.elapsed, "01:30:15");
        assert_eq!(d.remaining, "13:29:45");

        let before = day_durations(&at(2025, 6, 1, 5, 0, 0), window);
        assert_eq!(before.elapsed, "00:00:00");
        assert_eq!(before.remaining, "15:00:00");

        let after = day_durations(&at(2025, 6, 1, 23, 0, 0), window);
        assert_eq!(after.elapsed, "15:00:00");
        assert_eq!(after.remaining, "00:00:00");
    }

    #[test]
    fn test_age_approximation() {
        let birth = at(1993, 9, 8, 0, 0, 0);
        let now = birth.clone() + Duration::milliseconds((DAY_MS as f64 * 365.25 * 10.0) as i64);
        let a = age(&now, &birth);
        assert_eq!(a.years, 10);
        assert_eq!(a.days, 0);
        assert_eq!(a.summary(), "10y 0d");

        let later = now + Duration::days(40) + Duration::hours(1);
        let b = age(&later, &birth);
        assert_eq!(b.years, 10);
        assert_eq!(b.days, 40);
        assert!(b.value().starts_with("10.10"));
    }

    #[test]
    fn test_clock_and_zone() {
        let (value, zone) = clock(&at(2025, 6, 1, 9, 5, 7));
        assert_eq!(value, "09:05:07");
        assert_eq!(zone, "-07:00");

        let mst = chrono_tz::America::Denver
            .with_ymd_and_hms(2025, 1, 15, 12, 0, 0)
            .unwrap();
        assert_eq!(clock(&mst).1, "MST");
    }

    #[test]
    fn test_days_left_in_year() {
        assert_eq!(days_left_in_year(&at(2025, 12, 31, 0, 0, 0)), 1);
        assert_eq!(days_left_in_year(&at(2025, 12, 31, 12, 0, 0)), 1);
        assert_eq!(days_left_in_year(&at(2025, 1, 1, 0, 0, 0)), 365);
    }

    #[test]
    fn test_fmt_local_hm() {
        assert_eq!(fmt_local_hm(&at(2025, 6, 1, 6, 5, 0)), "6:05 AM");
        assert_eq!(fmt_local_hm(&at(2025, 6, 1, 19, 42, 0)), "7:42 PM");
    }

    #[test]
    fn test_resolve_local_dst_gap_moves_forward() {
        let tz = chrono_tz::America::Denver;
        // 2025-03-09 02:30 does not exist in Denver
        let naive = NaiveDate::from_ymd_opt(2025, 3, 9)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let resolved = resolve_local(&tz, naive);
        assert_eq!(resolved.hour(), 3);
        assert_eq!(resolved.minute(), 30);
    }
}
