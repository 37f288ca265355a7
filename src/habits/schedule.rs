//! Habit schedule construction
//!
//! A schedule is one `DayRecord` per day, contiguous from the start date,
//! built once at creation time and mutated in place afterwards.

use chrono::{DateTime, Duration, Utc};

use crate::db::schemas::DayRecord;
use crate::habits::dates;
use crate::types::{Result, RitualError};

/// Shortest allowed habit, in days
pub const MIN_DURATION_DAYS: i64 = 1;
/// Longest allowed habit, in days
pub const MAX_DURATION_DAYS: i64 = 365;

/// Reject durations outside the supported range.
pub fn validate_duration(duration: i64) -> Result<()> {
    if !(MIN_DURATION_DAYS..=MAX_DURATION_DAYS).contains(&duration) {
        return Err(RitualError::InvalidDuration(duration));
    }
    Ok(())
}

/// Last scheduled day (inclusive) for a habit starting at `start`.
pub fn end_date(start: DateTime<Utc>, duration: i64) -> DateTime<Utc> {
    dates::normalize(start) + Duration::days(duration - 1)
}

/// Build a schedule repeating one title across every day.
pub fn build_schedule(start: DateTime<Utc>, duration: i64, title: &str) -> Result<Vec<DayRecord>> {
    validate_duration(duration)?;
    let start = dates::normalize(start);
    let title = title.trim();

    Ok((0..duration)
        .map(|offset| DayRecord {
            day_title: title.to_string(),
            date: start + Duration::days(offset),
            completed: false,
        })
        .collect())
}

/// Build a schedule from an ordered list of per-day titles. The list
/// length must match the duration exactly.
pub fn build_schedule_from_titles(
    start: DateTime<Utc>,
    duration: i64,
    titles: &[String],
) -> Result<Vec<DayRecord>> {
    validate_duration(duration)?;
    if titles.len() as i64 != duration {
        return Err(RitualError::ScheduleMismatch {
            expected: duration as usize,
            got: titles.len(),
        });
    }
    let start = dates::normalize(start);

    Ok(titles
        .iter()
        .enumerate()
        .map(|(offset, title)| DayRecord {
            day_title: title.trim().to_string(),
            date: start + Duration::days(offset as i64),
            completed: false,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_schedule_is_contiguous_from_start() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let days = build_schedule(start, 5, "Read").unwrap();

        assert_eq!(days.len(), 5);
        for (offset, day) in days.iter().enumerate() {
            assert_eq!(day.date, start + Duration::days(offset as i64));
            assert_eq!(day.day_title, "Read");
            assert!(!day.completed);
        }
    }

    #[test]
    fn test_start_time_of_day_is_dropped() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 17, 45, 12).unwrap();
        let days = build_schedule(start, 2, "Stretch").unwrap();

        assert_eq!(
            days[0].date,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            days[1].date,
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_rejects_out_of_range_durations() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        for bad in [0, -3, 366, 1000] {
            assert!(
                matches!(
                    build_schedule(start, bad, "x"),
                    Err(RitualError::InvalidDuration(_))
                ),
                "expected rejection for duration {}",
                bad
            );
        }

        assert!(build_schedule(start, 1, "x").is_ok());
        assert!(build_schedule(start, 365, "x").is_ok());
    }

    #[test]
    fn test_titles_must_match_duration() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let titles: Vec<String> = vec!["a".into(), "b".into(), "c".into()];

        let err = build_schedule_from_titles(start, 4, &titles).unwrap_err();
        assert!(matches!(
            err,
            RitualError::ScheduleMismatch {
                expected: 4,
                got: 3
            }
        ));
    }

    #[test]
    fn test_titles_keep_their_order_and_are_trimmed() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let titles: Vec<String> = vec!["  warm up ".into(), "run 5k".into()];

        let days = build_schedule_from_titles(start, 2, &titles).unwrap();
        assert_eq!(days[0].day_title, "warm up");
        assert_eq!(days[1].day_title, "run 5k");
    }

    #[test]
    fn test_end_date_is_inclusive() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            end_date(start, 5),
            Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap()
        );
        assert_eq!(end_date(start, 1), start);
    }
}
