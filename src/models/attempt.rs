// src/models/attempt.rs

use serde::{Deserialize, Serialize};

/// Lifecycle of one candidate's sitting of a session.
///
/// `Completed` is reached only through finalization; `Expired` is written
/// by an external time-keeper and blocks finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    NotStarted,
    InProgress,
    Completed,
    Expired,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::NotStarted => "not_started",
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Completed => "completed",
            AttemptStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(AttemptStatus::NotStarted),
            "in_progress" => Some(AttemptStatus::InProgress),
            "completed" => Some(AttemptStatus::Completed),
            "expired" => Some(AttemptStatus::Expired),
            _ => None,
        }
    }
}

/// One per (candidate, session).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub candidate_id: i64,
    pub session_id: i64,
    pub status: AttemptStatus,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}
