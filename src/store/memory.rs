// src/store/memory.rs

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::{
    attempt::{Attempt, AttemptStatus},
    evaluation::{Evaluation, EvaluatorType},
    overall_score::{OverallScore, RankingRow, ScoreUpsert, SessionStanding},
    question::Question,
    response::{McqResponse, WrittenResponse},
    session::{Candidate, ExamSession},
};

use super::{NewEvaluation, ResultsStore, StoreError};

#[derive(Default)]
struct Inner {
    sessions: HashMap<i64, ExamSession>,
    candidates: HashMap<i64, Candidate>,
    /// question -> (session it belongs to, question)
    questions: Vec<(i64, Question)>,
    attempts: HashMap<i64, Attempt>,
    mcq_responses: Vec<McqResponse>,
    written_responses: Vec<WrittenResponse>,
    /// keyed by response id
    evaluations: HashMap<i64, Evaluation>,
    /// keyed by (candidate, session)
    overall_scores: HashMap<(i64, i64), OverallScore>,
    standings: HashMap<i64, Vec<SessionStanding>>,
    next_id: i64,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory store. Backs the test suite and local runs without a
/// database; behaves like the Postgres store for every keyed upsert.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    // Seed helpers for fixtures. Callers provide their own ids.

    pub fn add_session(&self, session: ExamSession) {
        let mut inner = self.lock();
        inner.sessions.insert(session.id, session);
    }

    pub fn add_candidate(&self, candidate: Candidate) {
        let mut inner = self.lock();
        inner.candidates.insert(candidate.id, candidate);
    }

    pub fn add_question(&self, session_id: i64, question: Question) {
        let mut inner = self.lock();
        inner.questions.push((session_id, question));
    }

    pub fn add_attempt(&self, attempt: Attempt) {
        let mut inner = self.lock();
        inner.attempts.insert(attempt.id, attempt);
    }

    pub fn add_mcq_response(&self, response: McqResponse) {
        let mut inner = self.lock();
        inner.mcq_responses.push(response);
    }

    pub fn add_written_response(&self, response: WrittenResponse) {
        let mut inner = self.lock();
        inner.written_responses.push(response);
    }

    pub fn attempt_status(&self, attempt_id: i64) -> Option<AttemptStatus> {
        let inner = self.lock();
        inner.attempts.get(&attempt_id).map(|a| a.status)
    }
}

#[async_trait]
impl ResultsStore for MemoryStore {
    async fn attempt(&self, id: i64) -> Result<Option<Attempt>, StoreError> {
        let inner = self.lock();
        Ok(inner.attempts.get(&id).cloned())
    }

    async fn session(&self, id: i64) -> Result<Option<ExamSession>, StoreError> {
        let inner = self.lock();
        Ok(inner.sessions.get(&id).cloned())
    }

    async fn candidate(&self, id: i64) -> Result<Option<Candidate>, StoreError> {
        let inner = self.lock();
        Ok(inner.candidates.get(&id).cloned())
    }

    async fn questions_by_session(&self, session_id: i64) -> Result<Vec<Question>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .questions
            .iter()
            .filter(|(sid, _)| *sid == session_id)
            .map(|(_, q)| q.clone())
            .collect())
    }

    async fn mcq_responses_by_attempt(
        &self,
        attempt_id: i64,
    ) -> Result<Vec<McqResponse>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .mcq_responses
            .iter()
            .filter(|r| r.attempt_id == attempt_id)
            .cloned()
            .collect())
    }

    async fn written_responses_by_attempt(
        &self,
        attempt_id: i64,
    ) -> Result<Vec<WrittenResponse>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .written_responses
            .iter()
            .filter(|r| r.attempt_id == attempt_id)
            .cloned()
            .collect())
    }

    async fn written_response(&self, id: i64) -> Result<Option<WrittenResponse>, StoreError> {
        let inner = self.lock();
        Ok(inner.written_responses.iter().find(|r| r.id == id).cloned())
    }

    async fn evaluations_by_attempt(
        &self,
        attempt_id: i64,
    ) -> Result<Vec<Evaluation>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .evaluations
            .values()
            .filter(|e| e.attempt_id == attempt_id)
            .cloned()
            .collect())
    }

    async fn record_mcq_grade(
        &self,
        attempt_id: i64,
        question_id: i64,
        is_correct: bool,
        awarded_marks: f64,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(response) = inner
            .mcq_responses
            .iter_mut()
            .find(|r| r.attempt_id == attempt_id && r.question_id == question_id)
        {
            response.is_correct = Some(is_correct);
            response.awarded_marks = Some(awarded_marks);
        }
        Ok(())
    }

    async fn insert_evaluation_if_absent(
        &self,
        eval: NewEvaluation,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        if inner.evaluations.contains_key(&eval.response_id) {
            return Ok(false);
        }
        let id = inner.next_id();
        inner.evaluations.insert(
            eval.response_id,
            Evaluation {
                id,
                response_id: eval.response_id,
                attempt_id: eval.attempt_id,
                question_id: eval.question_id,
                score: eval.score,
                feedback: eval.feedback,
                extracted_text: eval.extracted_text,
                language: eval.language,
                evaluator_type: eval.evaluator_type,
            },
        );
        Ok(true)
    }

    async fn apply_human_correction(
        &self,
        response_id: i64,
        attempt_id: i64,
        question_id: i64,
        score: f64,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(eval) = inner.evaluations.get_mut(&response_id) {
            eval.score = score;
            eval.evaluator_type = EvaluatorType::Human;
        } else {
            let id = inner.next_id();
            inner.evaluations.insert(
                response_id,
                Evaluation {
                    id,
                    response_id,
                    attempt_id,
                    question_id,
                    score,
                    feedback: String::new(),
                    extracted_text: None,
                    language: "unknown".to_string(),
                    evaluator_type: EvaluatorType::Human,
                },
            );
        }
        Ok(())
    }

    async fn overall_score(
        &self,
        candidate_id: i64,
        session_id: i64,
    ) -> Result<Option<OverallScore>, StoreError> {
        let inner = self.lock();
        Ok(inner.overall_scores.get(&(candidate_id, session_id)).cloned())
    }

    async fn upsert_overall_score(&self, score: ScoreUpsert) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let key = (score.candidate_id, score.session_id);
        let now = Some(chrono::Utc::now());
        match inner.overall_scores.get_mut(&key) {
            Some(existing) => {
                // Rank fields survive the upsert untouched.
                existing.mcq_score = score.mcq_score;
                existing.written_score = score.written_score;
                existing.total_weighted_score = score.total_weighted_score;
                existing.total_possible_marks = score.total_possible_marks;
                existing.percentage_score = score.percentage_score;
                existing.is_qualified = score.is_qualified;
                existing.written_by_language = score.written_by_language;
                existing.updated_at = now;
            }
            None => {
                let id = inner.next_id();
                inner.overall_scores.insert(
                    key,
                    OverallScore {
                        id,
                        candidate_id: score.candidate_id,
                        session_id: score.session_id,
                        mcq_score: score.mcq_score,
                        written_score: score.written_score,
                        total_weighted_score: score.total_weighted_score,
                        total_possible_marks: score.total_possible_marks,
                        percentage_score: score.percentage_score,
                        is_qualified: score.is_qualified,
                        overall_rank: None,
                        class_rank: None,
                        written_by_language: score.written_by_language,
                        updated_at: now,
                    },
                );
            }
        }
        Ok(())
    }

    async fn complete_attempt(&self, attempt_id: i64) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(attempt) = inner.attempts.get_mut(&attempt_id)
            && matches!(
                attempt.status,
                AttemptStatus::InProgress | AttemptStatus::Completed
            )
        {
            attempt.status = AttemptStatus::Completed;
            if attempt.submitted_at.is_none() {
                attempt.submitted_at = Some(chrono::Utc::now());
            }
        }
        Ok(())
    }

    async fn ranking_rows(&self, session_id: i64) -> Result<Vec<RankingRow>, StoreError> {
        let inner = self.lock();
        let mut rows: Vec<RankingRow> = inner
            .overall_scores
            .values()
            .filter(|score| score.session_id == session_id)
            .filter(|score| {
                // Finalized attempts only.
                inner.attempts.values().any(|a| {
                    a.candidate_id == score.candidate_id
                        && a.session_id == session_id
                        && a.status == AttemptStatus::Completed
                })
            })
            .map(|score| {
                let candidate = inner.candidates.get(&score.candidate_id);
                RankingRow {
                    candidate_id: score.candidate_id,
                    candidate_name: candidate
                        .map(|c| c.full_name.clone())
                        .unwrap_or_default(),
                    grade: candidate.and_then(|c| c.grade.clone()),
                    total_weighted_score: score.total_weighted_score,
                    percentage_score: score.percentage_score,
                    is_qualified: score.is_qualified,
                }
            })
            .collect();
        rows.sort_by_key(|r| r.candidate_id);
        Ok(rows)
    }

    async fn write_ranks(
        &self,
        session_id: i64,
        candidate_id: i64,
        overall_rank: i64,
        class_rank: i64,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(score) = inner.overall_scores.get_mut(&(candidate_id, session_id)) {
            score.overall_rank = Some(overall_rank);
            score.class_rank = Some(class_rank);
        }
        Ok(())
    }

    async fn replace_standings(
        &self,
        session_id: i64,
        standings: Vec<SessionStanding>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.standings.insert(session_id, standings);
        Ok(())
    }

    async fn standings(&self, session_id: i64) -> Result<Vec<SessionStanding>, StoreError> {
        let inner = self.lock();
        let mut rows = inner.standings.get(&session_id).cloned().unwrap_or_default();
        rows.sort_by_key(|s| s.overall_rank);
        Ok(rows)
    }
}
