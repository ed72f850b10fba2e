// src/models/session.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'exam_sessions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExamSession {
    pub id: i64,
    pub title: String,

    /// Minimum percentage for `is_qualified`, as configured for this
    /// session. When absent the engine falls back to the configured
    /// default and logs the value it applied.
    pub qualification_threshold: Option<f64>,
}

/// Represents the 'candidates' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Candidate {
    pub id: i64,
    pub full_name: String,

    /// Grouping key for class rank (e.g., grade level). Candidates
    /// without a grade are ranked in the "unknown" bucket.
    pub grade: Option<String>,
}
