// src/store/mod.rs

pub mod memory;
pub mod pg;

use std::fmt;

use async_trait::async_trait;

use crate::models::{
    attempt::Attempt,
    evaluation::{Evaluation, EvaluatorType},
    overall_score::{OverallScore, RankingRow, ScoreUpsert, SessionStanding},
    question::Question,
    response::{McqResponse, WrittenResponse},
    session::{Candidate, ExamSession},
};

/// A persistence failure. Always fatal for the operation that hit it.
#[derive(Debug)]
pub struct StoreError(pub String);

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store error: {}", self.0)
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError(err.to_string())
    }
}

/// Fields of a newly produced evaluation. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewEvaluation {
    pub response_id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    pub score: f64,
    pub feedback: String,
    pub extracted_text: Option<String>,
    pub language: String,
    pub evaluator_type: EvaluatorType,
}

/// Persistence collaborator for the results engine.
///
/// Every write that must exist at most once per natural key (grade per
/// attempt+question, evaluation per response, overall score per
/// candidate+session) is a keyed upsert so that duplicate runs converge
/// instead of duplicating. No multi-row transactional atomicity is
/// assumed across calls.
#[async_trait]
pub trait ResultsStore: Send + Sync {
    async fn attempt(&self, id: i64) -> Result<Option<Attempt>, StoreError>;
    async fn session(&self, id: i64) -> Result<Option<ExamSession>, StoreError>;
    async fn candidate(&self, id: i64) -> Result<Option<Candidate>, StoreError>;

    /// All questions of a session, joined with their sub-section kind.
    async fn questions_by_session(&self, session_id: i64) -> Result<Vec<Question>, StoreError>;

    async fn mcq_responses_by_attempt(
        &self,
        attempt_id: i64,
    ) -> Result<Vec<McqResponse>, StoreError>;

    async fn written_responses_by_attempt(
        &self,
        attempt_id: i64,
    ) -> Result<Vec<WrittenResponse>, StoreError>;

    async fn written_response(&self, id: i64) -> Result<Option<WrittenResponse>, StoreError>;

    async fn evaluations_by_attempt(&self, attempt_id: i64)
    -> Result<Vec<Evaluation>, StoreError>;

    /// Records grading output on an MCQ response, keyed by
    /// (attempt, question). Re-grading overwrites in place.
    async fn record_mcq_grade(
        &self,
        attempt_id: i64,
        question_id: i64,
        is_correct: bool,
        awarded_marks: f64,
    ) -> Result<(), StoreError>;

    /// Inserts an evaluation unless the response already has one.
    /// Returns whether a row was inserted. Existing evaluations (AI or
    /// human) are never overwritten by this path.
    async fn insert_evaluation_if_absent(&self, eval: NewEvaluation)
    -> Result<bool, StoreError>;

    /// Human correction: overwrites the response's evaluation score in
    /// place (insert when no evaluation exists yet), keyed by response.
    async fn apply_human_correction(
        &self,
        response_id: i64,
        attempt_id: i64,
        question_id: i64,
        score: f64,
    ) -> Result<(), StoreError>;

    async fn overall_score(
        &self,
        candidate_id: i64,
        session_id: i64,
    ) -> Result<Option<OverallScore>, StoreError>;

    /// Upserts the score fields of an OverallScore by (candidate,
    /// session). Rank fields are never touched here.
    async fn upsert_overall_score(&self, score: ScoreUpsert) -> Result<(), StoreError>;

    /// Conditional transition to `completed`; a no-op for attempts that
    /// are neither in progress nor already completed.
    async fn complete_attempt(&self, attempt_id: i64) -> Result<(), StoreError>;

    /// All finalized rows of a session joined with candidate identity,
    /// as ranking input.
    async fn ranking_rows(&self, session_id: i64) -> Result<Vec<RankingRow>, StoreError>;

    async fn write_ranks(
        &self,
        session_id: i64,
        candidate_id: i64,
        overall_rank: i64,
        class_rank: i64,
    ) -> Result<(), StoreError>;

    /// Replaces the session's read-model rows with a freshly computed set.
    async fn replace_standings(
        &self,
        session_id: i64,
        standings: Vec<SessionStanding>,
    ) -> Result<(), StoreError>;

    async fn standings(&self, session_id: i64) -> Result<Vec<SessionStanding>, StoreError>;
}
