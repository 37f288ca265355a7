//! AI-assisted habit planning

pub mod planner;

pub use planner::{AiPlanner, HabitPlan, PlannerConfig};
