//! Habit document schema
//!
//! A habit owns its full daily schedule inline: one `DayRecord` per
//! scheduled day, ordered by date. Streak and completion state live on the
//! same document so every mutation is a single read-modify-write.

use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::types::RitualError;

/// Collection name for habits
pub const HABIT_COLLECTION: &str = "habits";

/// Whether the habit builds a new behavior or quits an old one
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HabitKind {
    #[default]
    Build,
    Quit,
}

impl HabitKind {
    /// Parse the wire value, rejecting anything outside the enum.
    pub fn parse(value: &str) -> Result<Self, RitualError> {
        match value {
            "build" => Ok(HabitKind::Build),
            "quit" => Ok(HabitKind::Quit),
            _ => Err(RitualError::Validation(
                "Type must be either \"build\" or \"quit\"".to_string(),
            )),
        }
    }
}

impl std::fmt::Display for HabitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HabitKind::Build => write!(f, "build"),
            HabitKind::Quit => write!(f, "quit"),
        }
    }
}

/// One scheduled day of a habit
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DayRecord {
    /// Task for the day
    pub day_title: String,

    /// UTC midnight of the scheduled day, unique within the habit
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub date: DateTime<Utc>,

    #[serde(default)]
    pub completed: bool,
}

/// Habit document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct HabitDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Owning user; every query filters on this
    pub owner: ObjectId,

    pub title: String,

    /// First scheduled day, normalized to UTC midnight
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub start_date: DateTime<Utc>,

    /// Total scheduled days, 1 to 365
    pub duration: i64,

    pub kind: HabitKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Consecutive completed days ending today, recomputed on every
    /// completion change
    #[serde(default)]
    pub current_streak: i64,

    /// Latched once the completed-day count reaches the duration
    #[serde(default)]
    pub is_completed: bool,

    /// Full schedule, ascending by date, exactly `duration` entries
    #[serde(default)]
    pub days: Vec<DayRecord>,
}

impl HabitDoc {
    /// Create a new habit document with a prebuilt schedule
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        owner: ObjectId,
        title: String,
        start_date: DateTime<Utc>,
        duration: i64,
        kind: HabitKind,
        color: Option<String>,
        icon: Option<String>,
        days: Vec<DayRecord>,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            owner,
            title,
            start_date,
            duration,
            kind,
            color,
            icon,
            current_streak: 0,
            is_completed: false,
            days,
        }
    }
}

impl IntoIndexes for HabitDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Owner listings sorted by start date
            (
                doc! { "owner": 1, "start_date": 1 },
                Some(
                    IndexOptions::builder()
                        .name("owner_start_date_index".to_string())
                        .build(),
                ),
            ),
            // Daily view filters on completion state
            (
                doc! { "owner": 1, "is_completed": 1 },
                Some(
                    IndexOptions::builder()
                        .name("owner_is_completed_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for HabitDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_habit_kind_parses_wire_values() {
        assert_eq!(HabitKind::parse("build").unwrap(), HabitKind::Build);
        assert_eq!(HabitKind::parse("quit").unwrap(), HabitKind::Quit);
        assert!(HabitKind::parse("Build").is_err());
        assert!(HabitKind::parse("stop").is_err());
    }

    #[test]
    fn test_habit_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&HabitKind::Build).unwrap(),
            "\"build\""
        );
        assert_eq!(serde_json::to_string(&HabitKind::Quit).unwrap(), "\"quit\"");
    }

    #[test]
    fn test_new_habit_starts_clean() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let habit = HabitDoc::new(
            ObjectId::new(),
            "Read daily".to_string(),
            start,
            5,
            HabitKind::Build,
            None,
            None,
            vec![],
        );

        assert_eq!(habit.current_streak, 0);
        assert!(!habit.is_completed);
        assert!(habit._id.is_none());
        assert!(!habit.metadata.is_deleted);
    }
}
