//! Current-streak computation
//!
//! The streak counts consecutive completed days ending today, walking
//! backwards one day at a time until the first gap. A day with no
//! completed record, including today itself, ends the walk.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use crate::db::schemas::DayRecord;
use crate::habits::dates;

/// Count consecutive completed days ending at `today`.
pub fn current_streak(days: &[DayRecord], today: DateTime<Utc>) -> i64 {
    let today = dates::normalize(today);
    let completed: HashSet<DateTime<Utc>> = days
        .iter()
        .filter(|day| day.completed)
        .map(|day| dates::normalize(day.date))
        .collect();

    let mut streak = 0i64;
    while completed.contains(&(today - Duration::days(streak))) {
        streak += 1;
    }
    streak
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(date: DateTime<Utc>, completed: bool) -> DayRecord {
        DayRecord {
            day_title: "task".to_string(),
            date,
            completed,
        }
    }

    #[test]
    fn test_single_completion_today_is_streak_one() {
        let today = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let days = vec![day(today, true)];
        assert_eq!(current_streak(&days, today), 1);
    }

    #[test]
    fn test_streak_stops_at_first_gap() {
        let today = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let days = vec![
            day(today, true),
            day(today - Duration::days(1), true),
            day(today - Duration::days(2), true),
            day(today - Duration::days(3), false),
            day(today - Duration::days(4), true),
        ];
        assert_eq!(current_streak(&days, today), 3);
    }

    #[test]
    fn test_no_completion_today_means_zero() {
        let today = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let days = vec![
            day(today, false),
            day(today - Duration::days(1), true),
            day(today - Duration::days(2), true),
        ];
        assert_eq!(current_streak(&days, today), 0);
    }

    #[test]
    fn test_empty_schedule_means_zero() {
        let today = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        assert_eq!(current_streak(&[], today), 0);
    }

    #[test]
    fn test_future_completions_do_not_count() {
        let today = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let days = vec![day(today, true), day(today + Duration::days(1), true)];
        assert_eq!(current_streak(&days, today), 1);
    }

    #[test]
    fn test_stored_times_of_day_are_ignored() {
        let today = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let noon_yesterday = Utc.with_ymd_and_hms(2024, 1, 9, 12, 0, 0).unwrap();
        let days = vec![day(today, true), day(noon_yesterday, true)];
        assert_eq!(current_streak(&days, today), 2);
    }
}
