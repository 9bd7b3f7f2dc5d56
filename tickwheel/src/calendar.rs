//! Calendar helpers for picking human-meaningful spans and delays.
//!
//! The core wheel deals only in abstract integer units. When an application
//! decides that one unit is one millisecond, these helpers produce the spans
//! and initial delays for day/week/month/year cadences, including the
//! timezone-aware "first fire at local midnight" computation.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;

pub const MILLIS_PER_SECOND: u64 = 1_000;
pub const MILLIS_PER_MINUTE: u64 = 60 * MILLIS_PER_SECOND;
pub const MILLIS_PER_HOUR: u64 = 60 * MILLIS_PER_MINUTE;
pub const MILLIS_PER_DAY: u64 = 24 * MILLIS_PER_HOUR;
pub const MILLIS_PER_WEEK: u64 = 7 * MILLIS_PER_DAY;

/// Length of the given calendar month in milliseconds, or `None` for an
/// invalid year/month pair.
pub fn millis_in_month(year: i32, month: u32) -> Option<u64> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((next - first).num_days() as u64 * MILLIS_PER_DAY)
}

/// Length of the given calendar year in milliseconds.
pub fn millis_in_year(year: i32) -> Option<u64> {
    let first = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let next = NaiveDate::from_ymd_opt(year + 1, 1, 1)?;
    Some((next - first).num_days() as u64 * MILLIS_PER_DAY)
}

/// Milliseconds from `now` until the next wall-clock occurrence of `target`
/// in `now`'s timezone.
///
/// Skips over local times that do not exist (DST gaps) to the next day that
/// has them.
pub fn millis_until(now: DateTime<Tz>, target: NaiveTime) -> u64 {
    let tz = now.timezone();
    for day in 0..3u64 {
        let date = now.date_naive() + Days::new(day);
        if let Some(candidate) = tz.from_local_datetime(&date.and_time(target)).earliest() {
            if candidate > now {
                return (candidate - now).num_milliseconds().max(0) as u64;
            }
        }
    }
    MILLIS_PER_DAY
}

/// Milliseconds from `now` until the next local midnight. The natural first
/// delay for a daily task.
pub fn millis_until_next_midnight(now: DateTime<Tz>) -> u64 {
    millis_until(now, NaiveTime::MIN)
}

/// Length of the month containing `now`, for scheduling the next monthly
/// repetition.
pub fn millis_in_current_month(now: DateTime<Tz>) -> u64 {
    millis_in_month(now.year(), now.month()).unwrap_or(31 * MILLIS_PER_DAY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn month_lengths() {
        assert_eq!(millis_in_month(2024, 2), Some(29 * MILLIS_PER_DAY));
        assert_eq!(millis_in_month(2025, 2), Some(28 * MILLIS_PER_DAY));
        assert_eq!(millis_in_month(2025, 12), Some(31 * MILLIS_PER_DAY));
        assert_eq!(millis_in_month(2025, 13), None);
    }

    #[test]
    fn year_lengths() {
        assert_eq!(millis_in_year(2024), Some(366 * MILLIS_PER_DAY));
        assert_eq!(millis_in_year(2025), Some(365 * MILLIS_PER_DAY));
    }

    #[test]
    fn midnight_delay_is_within_one_day() {
        let now = Utc::now().with_timezone(&chrono_tz::Tz::UTC);
        let delay = millis_until_next_midnight(now);
        assert!(delay > 0);
        assert!(delay <= MILLIS_PER_DAY);
    }

    #[test]
    fn target_later_today_is_hit_today() {
        let tz = chrono_tz::Tz::UTC;
        let now = tz.with_ymd_and_hms(2026, 8, 5, 10, 0, 0).unwrap();
        let delay = millis_until(now, NaiveTime::from_hms_opt(12, 0, 0).unwrap());
        assert_eq!(delay, 2 * MILLIS_PER_HOUR);
    }
}
