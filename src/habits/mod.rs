//! Habit scheduling, completion, and streak engine
//!
//! Pure functions over habit documents. Persistence stays in `db`, wire
//! handling in `routes`; everything here is testable without either.

pub mod completion;
pub mod dates;
pub mod lifecycle;
pub mod schedule;
pub mod streak;
