//! Database schemas for ritual
//!
//! Defines MongoDB document structures for users and habits.

mod habit;
mod metadata;
mod user;

pub use habit::{DayRecord, HabitDoc, HabitKind, HABIT_COLLECTION};
pub use metadata::Metadata;
pub use user::{Gender, UserDoc, USER_COLLECTION};
