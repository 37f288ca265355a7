//! Configuration for ritual
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

use crate::ai::PlannerConfig;

/// Ritual - habit tracking backend
#[derive(Parser, Debug, Clone)]
#[command(name = "ritual")]
#[command(about = "Habit tracking backend with schedules, streaks, and AI-assisted plans")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "ritual")]
    pub mongodb_db: String,

    /// JWT secret for token signing (required)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds (default 7 days)
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "604800")]
    pub jwt_expiry_seconds: u64,

    /// API key for the AI planner; /habits/ai answers 503 without it
    #[arg(long, env = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible chat-completions API
    #[arg(
        long,
        env = "OPENAI_BASE_URL",
        default_value = "https://api.openai.com/v1"
    )]
    pub openai_base_url: String,

    /// Model used for plan generation
    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    pub openai_model: String,

    /// AI request timeout in milliseconds
    #[arg(long, env = "OPENAI_TIMEOUT_MS", default_value = "30000")]
    pub openai_timeout_ms: u64,

    /// Attempts per AI plan request, including the first
    #[arg(long, env = "OPENAI_MAX_ATTEMPTS", default_value = "3")]
    pub openai_max_attempts: u8,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Build the AI planner configuration, if an API key is set.
    pub fn planner_config(&self) -> Option<PlannerConfig> {
        self.openai_api_key.as_ref().map(|key| PlannerConfig {
            api_key: key.clone(),
            base_url: self.openai_base_url.clone(),
            model: self.openai_model.clone(),
            timeout: Duration::from_millis(self.openai_timeout_ms),
            max_attempts: self.openai_max_attempts,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        match &self.jwt_secret {
            None => return Err("JWT_SECRET is required".to_string()),
            Some(secret) if secret.len() < 32 => {
                return Err("JWT_SECRET must be at least 32 characters".to_string());
            }
            Some(_) => {}
        }

        if self.openai_max_attempts == 0 {
            return Err("OPENAI_MAX_ATTEMPTS must be at least 1".to_string());
        }

        Ok(())
    }
}
