//! Time windows, named range presets and the timestamp shape the query
//! service expects.
//!
//! All values are naive local date-times. The query service interprets
//! them in its own local zone, so no offset is ever attached here.

use crate::error::{AppError, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `YYYY-MM-DD HH:mm:ss.SSS`, the only shape accepted for `timeBegin`/`timeEnd`.
pub const QUERY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Offset-less local date-time shapes accepted from pickers, API callers and
/// the query service's responses.
pub(crate) const LOCAL_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// A half-open `[start, end)` query window with `end > start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl Window {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if end <= start {
            return Err(AppError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Build a window from two date-time picker values (`YYYY-MM-DDTHH:mm`).
    pub fn custom(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_local_datetime(start)?, parse_local_datetime(end)?)
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whole seconds between start and end; sub-second remainders are dropped.
    pub fn duration_secs(&self) -> i64 {
        self.duration().num_seconds()
    }

    pub fn time_begin(&self) -> String {
        format_query_timestamp(self.start)
    }

    pub fn time_end(&self) -> String {
        format_query_timestamp(self.end)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}",
            self.start.format("%Y-%m-%d %H:%M"),
            self.end.format("%Y-%m-%d %H:%M")
        )
    }
}

pub fn format_query_timestamp(dt: NaiveDateTime) -> String {
    dt.format(QUERY_TIMESTAMP_FORMAT).to_string()
}

pub fn parse_local_datetime(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    LOCAL_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| AppError::InvalidInput(format!("unrecognised date-time: {:?}", raw)))
}

/// Named windows offered by the dashboard range picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangePreset {
    Today,
    Yesterday,
    #[serde(rename = "last7")]
    Last7Days,
    ThisWeek,
    /// Yesterday as the daily-energy summary queries it, see [`daily_energy_window`].
    DailyEnergy,
}

impl RangePreset {
    /// Resolve the preset against the current local wall-clock time.
    ///
    /// Picker presets have minute precision: a day ends at `23:59`.
    pub fn window(self, now: NaiveDateTime) -> Window {
        let today = now.date();
        let (start, end) = match self {
            RangePreset::Today => (start_of_day(today), last_picker_minute(today)),
            RangePreset::Yesterday => {
                let yesterday = days_before(today, 1);
                (start_of_day(yesterday), last_picker_minute(yesterday))
            }
            RangePreset::Last7Days => (
                start_of_day(days_before(today, 7)),
                last_picker_minute(today),
            ),
            RangePreset::ThisWeek => {
                let offset = i64::from(today.weekday().num_days_from_sunday());
                let sunday = days_before(today, offset);
                let saturday = sunday + Duration::days(6);
                (start_of_day(sunday), last_picker_minute(saturday))
            }
            RangePreset::DailyEnergy => return daily_energy_window(now),
        };
        Window { start, end }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RangePreset::Today => "today",
            RangePreset::Yesterday => "yesterday",
            RangePreset::Last7Days => "last7",
            RangePreset::ThisWeek => "this_week",
            RangePreset::DailyEnergy => "daily_energy",
        }
    }
}

impl FromStr for RangePreset {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "today" => Ok(RangePreset::Today),
            "yesterday" => Ok(RangePreset::Yesterday),
            "last7" => Ok(RangePreset::Last7Days),
            "this_week" => Ok(RangePreset::ThisWeek),
            "daily_energy" => Ok(RangePreset::DailyEnergy),
            other => Err(AppError::InvalidInput(format!(
                "unknown range preset: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for RangePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Yesterday's window for daily energy totals.
///
/// The end is one second past local midnight. The query service aligns
/// buckets to the start of the window, and without the extra second it
/// omits the closing midnight sample needed for a full-day delta.
pub fn daily_energy_window(now: NaiveDateTime) -> Window {
    let midnight = start_of_day(now.date());
    Window {
        start: midnight - Duration::days(1),
        end: midnight + Duration::seconds(1),
    }
}

fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn last_picker_minute(date: NaiveDate) -> NaiveDateTime {
    start_of_day(date) + Duration::minutes(23 * 60 + 59)
}

fn days_before(date: NaiveDate, days: i64) -> NaiveDate {
    date - Duration::days(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_inverted_window_is_rejected() {
        let start = at(2025, 6, 2, 12, 0, 0);
        let err = Window::new(start, start).unwrap_err();
        assert!(matches!(err, AppError::InvalidWindow { .. }));

        let err = Window::new(start, start - Duration::minutes(1)).unwrap_err();
        assert!(matches!(err, AppError::InvalidWindow { .. }));
    }

    #[test]
    fn test_custom_window_from_picker_values() {
        let window = Window::custom("2025-06-01T06:30", "2025-06-01T18:45").unwrap();
        assert_eq!(window.start(), at(2025, 6, 1, 6, 30, 0));
        assert_eq!(window.end(), at(2025, 6, 1, 18, 45, 0));
        assert_eq!(window.time_begin(), "2025-06-01 06:30:00.000");
        assert_eq!(window.time_end(), "2025-06-01 18:45:00.000");

        assert!(Window::custom("not a date", "2025-06-01T18:45").is_err());
    }

    #[test]
    fn test_format_query_timestamp_keeps_milliseconds() {
        let dt = at(2025, 1, 9, 7, 5, 3) + Duration::milliseconds(42);
        assert_eq!(format_query_timestamp(dt), "2025-01-09 07:05:03.042");
    }

    #[test]
    fn test_daily_energy_window_extends_past_midnight() {
        let now = at(2025, 3, 1, 14, 22, 9);
        let window = daily_energy_window(now);

        assert_eq!(window.time_begin(), "2025-02-28 00:00:00.000");
        assert_eq!(window.time_end(), "2025-03-01 00:00:01.000");
        assert_eq!(RangePreset::DailyEnergy.window(now), window);
    }

    #[test]
    fn test_today_and_yesterday_presets() {
        let now = at(2025, 3, 1, 14, 22, 9);

        let today = RangePreset::Today.window(now);
        assert_eq!(today.start(), at(2025, 3, 1, 0, 0, 0));
        assert_eq!(today.end(), at(2025, 3, 1, 23, 59, 0));

        let yesterday = RangePreset::Yesterday.window(now);
        assert_eq!(yesterday.start(), at(2025, 2, 28, 0, 0, 0));
        assert_eq!(yesterday.end(), at(2025, 2, 28, 23, 59, 0));
    }

    #[test]
    fn test_last7_preset() {
        let now = at(2025, 3, 5, 9, 0, 0);
        let window = RangePreset::Last7Days.window(now);
        assert_eq!(window.start(), at(2025, 2, 26, 0, 0, 0));
        assert_eq!(window.end(), at(2025, 3, 5, 23, 59, 0));
    }

    #[test]
    fn test_this_week_starts_on_sunday() {
        // 2025-03-05 is a Wednesday
        let window = RangePreset::ThisWeek.window(at(2025, 3, 5, 9, 0, 0));
        assert_eq!(window.start(), at(2025, 3, 2, 0, 0, 0));
        assert_eq!(window.end(), at(2025, 3, 8, 23, 59, 0));

        // On a Sunday the week starts today
        let window = RangePreset::ThisWeek.window(at(2025, 3, 2, 0, 0, 0));
        assert_eq!(window.start(), at(2025, 3, 2, 0, 0, 0));
    }

    #[test]
    fn test_preset_names_round_trip() {
        for preset in [
            RangePreset::Today,
            RangePreset::Yesterday,
            RangePreset::Last7Days,
            RangePreset::ThisWeek,
            RangePreset::DailyEnergy,
        ] {
            assert_eq!(preset.as_str().parse::<RangePreset>().unwrap(), preset);
        }
        assert!("last-week".parse::<RangePreset>().is_err());
    }
}
