//! Day-level completion and title updates
//!
//! Target dates must fall inside the habit window and match a scheduled
//! day exactly. Range and lookup failures are distinct errors so clients
//! can tell "outside the habit" from "inside but unscheduled".

use chrono::{DateTime, Utc};

use crate::db::schemas::DayRecord;
use crate::habits::{dates, schedule};
use crate::types::{Result, RitualError};

/// Set the completed flag on the scheduled day matching `target`.
pub fn mark_day(
    days: &mut [DayRecord],
    start: DateTime<Utc>,
    duration: i64,
    target: DateTime<Utc>,
    completed: bool,
) -> Result<()> {
    let day = find_day(days, start, duration, target)?;
    day.completed = completed;
    Ok(())
}

/// Rename the scheduled day matching `target`.
pub fn set_day_title(
    days: &mut [DayRecord],
    start: DateTime<Utc>,
    duration: i64,
    target: DateTime<Utc>,
    title: &str,
) -> Result<()> {
    let day = find_day(days, start, duration, target)?;
    day.day_title = title.trim().to_string();
    Ok(())
}

/// Number of completed days in the schedule.
pub fn completed_count(days: &[DayRecord]) -> usize {
    days.iter().filter(|day| day.completed).count()
}

fn find_day<'a>(
    days: &'a mut [DayRecord],
    start: DateTime<Utc>,
    duration: i64,
    target: DateTime<Utc>,
) -> Result<&'a mut DayRecord> {
    let target = dates::normalize(target);
    let start = dates::normalize(start);
    let end = schedule::end_date(start, duration);

    if target < start || target > end {
        return Err(RitualError::DateOutOfRange);
    }

    days.iter_mut()
        .find(|day| dates::normalize(day.date) == target)
        .ok_or(RitualError::DateNotScheduled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::habits::schedule::build_schedule;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_marks_and_unmarks_a_scheduled_day() {
        let mut days = build_schedule(start(), 5, "Read").unwrap();
        let target = start() + Duration::days(2);

        mark_day(&mut days, start(), 5, target, true).unwrap();
        assert!(days[2].completed);
        assert!(!days[1].completed);

        mark_day(&mut days, start(), 5, target, false).unwrap();
        assert!(!days[2].completed);
    }

    #[test]
    fn test_rejects_dates_outside_the_window() {
        let mut days = build_schedule(start(), 5, "Read").unwrap();

        for completed in [true, false] {
            let before = start() - Duration::days(1);
            assert!(matches!(
                mark_day(&mut days, start(), 5, before, completed),
                Err(RitualError::DateOutOfRange)
            ));

            let after = start() + Duration::days(5);
            assert!(matches!(
                mark_day(&mut days, start(), 5, after, completed),
                Err(RitualError::DateOutOfRange)
            ));
        }
    }

    #[test]
    fn test_missing_record_inside_the_window() {
        let mut days = build_schedule(start(), 5, "Read").unwrap();
        let target = start() + Duration::days(2);
        days.remove(2);

        assert!(matches!(
            mark_day(&mut days, start(), 5, target, true),
            Err(RitualError::DateNotScheduled)
        ));
    }

    #[test]
    fn test_target_time_of_day_is_ignored() {
        let mut days = build_schedule(start(), 5, "Read").unwrap();
        let late_evening = Utc.with_ymd_and_hms(2024, 1, 3, 22, 15, 0).unwrap();

        mark_day(&mut days, start(), 5, late_evening, true).unwrap();
        assert!(days[2].completed);
    }

    #[test]
    fn test_renames_only_the_target_day() {
        let mut days = build_schedule(start(), 3, "Read").unwrap();
        let target = start() + Duration::days(1);

        set_day_title(&mut days, start(), 3, target, "  Read chapter 2  ").unwrap();
        assert_eq!(days[1].day_title, "Read chapter 2");
        assert_eq!(days[0].day_title, "Read");
        assert_eq!(days[2].day_title, "Read");
    }

    #[test]
    fn test_completed_count() {
        let mut days = build_schedule(start(), 4, "Read").unwrap();
        assert_eq!(completed_count(&days), 0);

        days[0].completed = true;
        days[3].completed = true;
        assert_eq!(completed_count(&days), 2);
    }
}
