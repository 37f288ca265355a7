//! Habit lifecycle operations
//!
//! Composes the schedule, completion, and streak modules into the
//! mutations route handlers apply to a habit document.

use chrono::{DateTime, Utc};

use crate::db::schemas::{HabitDoc, HabitKind};
use crate::habits::{completion, dates, streak};
use crate::types::{Result, RitualError};

/// Parse a start date from the wire with the client-facing message.
pub fn parse_start_date(raw: &str) -> Result<DateTime<Utc>> {
    dates::parse_day(raw)
        .map_err(|_| RitualError::Validation("Invalid start date format".to_string()))
}

/// True when `start` lies strictly before `today`, compared as UTC days.
/// Starting today or in the future is allowed.
pub fn starts_in_past(start: DateTime<Utc>, today: DateTime<Utc>) -> bool {
    (dates::normalize(today) - dates::normalize(start)).num_days() > 0
}

/// Partial update; absent fields keep their current values. Changing the
/// duration or start date deliberately leaves the existing schedule alone.
#[derive(Debug, Default)]
pub struct HabitPatch {
    pub title: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub duration: Option<i64>,
    pub kind: Option<HabitKind>,
}

pub fn apply_patch(habit: &mut HabitDoc, patch: HabitPatch) {
    if let Some(title) = patch.title {
        habit.title = title;
    }
    if let Some(start_date) = patch.start_date {
        habit.start_date = start_date;
    }
    if let Some(duration) = patch.duration {
        habit.duration = duration;
    }
    if let Some(kind) = patch.kind {
        habit.kind = kind;
    }
}

/// Mark one scheduled day and refresh the derived state: the streak is
/// recomputed from scratch and the completion flag latches once every
/// scheduled day is done. Unmarking can shrink the streak but never
/// clears the flag.
pub fn record_completion(
    habit: &mut HabitDoc,
    target: DateTime<Utc>,
    completed: bool,
    today: DateTime<Utc>,
) -> Result<()> {
    completion::mark_day(
        &mut habit.days,
        habit.start_date,
        habit.duration,
        target,
        completed,
    )?;

    habit.current_streak = streak::current_streak(&habit.days, today);

    if completion::completed_count(&habit.days) as i64 >= habit.duration {
        habit.is_completed = true;
    }

    Ok(())
}

/// Rename one scheduled day.
pub fn rename_day(habit: &mut HabitDoc, target: DateTime<Utc>, title: &str) -> Result<()> {
    completion::set_day_title(
        &mut habit.days,
        habit.start_date,
        habit.duration,
        target,
        title,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::habits::schedule::build_schedule;
    use bson::oid::ObjectId;
    use chrono::{Duration, TimeZone};

    fn habit(start: DateTime<Utc>, duration: i64) -> HabitDoc {
        let days = build_schedule(start, duration, "Practice").unwrap();
        HabitDoc::new(
            ObjectId::new(),
            "Practice".to_string(),
            start,
            duration,
            HabitKind::Build,
            None,
            None,
            days,
        )
    }

    #[test]
    fn test_five_day_scenario() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let today = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        let mut habit = habit(start, 5);

        for offset in 0..3 {
            record_completion(&mut habit, start + Duration::days(offset), true, today).unwrap();
        }

        assert_eq!(habit.current_streak, 3);
        assert!(!habit.is_completed);

        let out_of_range = Utc.with_ymd_and_hms(2024, 1, 6, 0, 0, 0).unwrap();
        assert!(matches!(
            record_completion(&mut habit, out_of_range, true, today),
            Err(RitualError::DateOutOfRange)
        ));
    }

    #[test]
    fn test_completion_flag_latches() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let today = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let mut habit = habit(start, 2);

        record_completion(&mut habit, start, true, today).unwrap();
        record_completion(&mut habit, start + Duration::days(1), true, today).unwrap();
        assert!(habit.is_completed);
        assert_eq!(habit.current_streak, 2);

        // Unmarking recomputes the streak but the flag stays latched.
        record_completion(&mut habit, start, false, today).unwrap();
        assert!(habit.is_completed);
        assert_eq!(habit.current_streak, 1);
    }

    #[test]
    fn test_streak_resets_when_today_is_unmarked() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let today = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let mut habit = habit(start, 5);

        record_completion(&mut habit, start, true, today).unwrap();
        record_completion(&mut habit, today, true, today).unwrap();
        assert_eq!(habit.current_streak, 2);

        record_completion(&mut habit, today, false, today).unwrap();
        assert_eq!(habit.current_streak, 0);
    }

    #[test]
    fn test_patch_never_rebuilds_the_schedule() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut habit = habit(start, 5);

        apply_patch(
            &mut habit,
            HabitPatch {
                duration: Some(30),
                kind: Some(HabitKind::Quit),
                ..Default::default()
            },
        );

        assert_eq!(habit.duration, 30);
        assert_eq!(habit.kind, HabitKind::Quit);
        assert_eq!(habit.days.len(), 5);
    }

    #[test]
    fn test_start_date_parse_message() {
        let err = parse_start_date("next tuesday").unwrap_err();
        assert_eq!(err.to_string(), "Invalid start date format");
    }

    #[test]
    fn test_past_start_dates() {
        let today = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();

        assert!(starts_in_past(today - Duration::days(1), today));
        assert!(!starts_in_past(today, today));
        assert!(!starts_in_past(today + Duration::days(10), today));

        // Time of day on either side does not matter.
        let late_today = Utc.with_ymd_and_hms(2024, 6, 15, 23, 59, 0).unwrap();
        assert!(!starts_in_past(late_today, today));
    }

    #[test]
    fn test_rename_day_flows_through() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut habit = habit(start, 3);

        rename_day(&mut habit, start + Duration::days(1), "Scales only").unwrap();
        assert_eq!(habit.days[1].day_title, "Scales only");

        assert!(matches!(
            rename_day(&mut habit, start + Duration::days(7), "nope"),
            Err(RitualError::DateOutOfRange)
        ));
    }
}
