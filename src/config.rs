// src/config.rs

use dotenvy::dotenv;
use std::env;

/// Fan-out width for the written-response evaluation pass. The external
/// service is the rate-limiting resource; attempts rarely carry more than
/// a handful of written questions.
pub const EVALUATION_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub evaluator_url: String,
    pub evaluator_api_key: Option<String>,
    pub evaluator_timeout_secs: u64,
    /// Applied only when a session carries no threshold of its own; the
    /// aggregator logs whenever this fallback is used.
    pub default_qualification_threshold: f64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let evaluator_url = env::var("EVALUATOR_URL").expect("EVALUATOR_URL must be set");

        let evaluator_api_key = env::var("EVALUATOR_API_KEY").ok();

        let evaluator_timeout_secs = env::var("EVALUATOR_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        let default_qualification_threshold = env::var("DEFAULT_QUALIFICATION_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(40.0);

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            evaluator_url,
            evaluator_api_key,
            evaluator_timeout_secs,
            default_qualification_threshold,
        }
    }
}
