//! Ritual - habit tracking backend
//!
//! A REST service for building and breaking habits: users register, create
//! habits with day-by-day schedules (hand-written or AI-generated), tick
//! days off, and watch their streaks.
//!
//! ## Services
//!
//! - **Auth**: registration, login, and JWT verification backed by MongoDB
//! - **Habits**: schedule construction, completion tracking, streaks
//! - **AI planner**: per-day task plans from an OpenAI-compatible API

pub mod ai;
pub mod auth;
pub mod config;
pub mod db;
pub mod habits;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Result, RitualError};
