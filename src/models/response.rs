// src/models/response.rs

use serde::{Deserialize, Serialize};

/// A recorded multiple-choice selection, unique per (attempt, question).
/// `is_correct` / `awarded_marks` are filled by the grader and kept for
/// audit; re-grading overwrites them in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McqResponse {
    pub id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    pub selected_option: String,
    pub is_correct: Option<bool>,
    pub awarded_marks: Option<f64>,
}

/// An uploaded written answer, unique per (attempt, question).
/// A response with images but no evaluation is "pending".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrittenResponse {
    pub id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    pub image_refs: Vec<String>,
    pub language_hint: Option<String>,
}

impl WrittenResponse {
    pub fn has_upload(&self) -> bool {
        !self.image_refs.is_empty()
    }
}
