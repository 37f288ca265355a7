//! Database layer for ritual
//!
//! Provides MongoDB storage for users and habits.

pub mod mongo;
pub mod schemas;

pub use mongo::{MongoClient, MongoCollection};
pub use schemas::{HabitDoc, Metadata, UserDoc};
