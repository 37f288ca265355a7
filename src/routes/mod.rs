//! HTTP routes for ritual

pub mod auth_routes;
pub mod habit_routes;
pub mod health;

pub use auth_routes::handle_auth_request;
pub use habit_routes::handle_habit_request;
pub use health::{health_check, readiness_check, version_info};
