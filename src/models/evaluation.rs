// src/models/evaluation.rs

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorType {
    Ai,
    Human,
}

impl EvaluatorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluatorType::Ai => "ai",
            EvaluatorType::Human => "human",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ai" => Some(EvaluatorType::Ai),
            "human" => Some(EvaluatorType::Human),
            _ => None,
        }
    }
}

/// The scored outcome of one written response. At most one active record
/// per response: created by the orchestrator, overwritten in place when a
/// human corrects the score, never duplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: i64,
    pub response_id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    pub score: f64,
    pub feedback: String,
    pub extracted_text: Option<String>,
    pub language: String,
    pub evaluator_type: EvaluatorType,
}
