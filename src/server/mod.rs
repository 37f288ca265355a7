//! HTTP server for ritual

pub mod http;

pub use http::{run, AppState};
