// src/store/pg.rs

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, types::Json};

use crate::models::{
    attempt::{Attempt, AttemptStatus},
    evaluation::{Evaluation, EvaluatorType},
    overall_score::{OverallScore, RankingRow, ScoreUpsert, SessionStanding},
    question::{Question, SectionKind},
    response::{McqResponse, WrittenResponse},
    session::{Candidate, ExamSession},
};

use super::{NewEvaluation, ResultsStore, StoreError};

/// Postgres-backed store. All queries are runtime-checked; keyed upserts
/// use native `ON CONFLICT` clauses.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct AttemptRow {
    id: i64,
    candidate_id: i64,
    session_id: i64,
    status: String,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl AttemptRow {
    fn into_model(self) -> Result<Attempt, StoreError> {
        let status = AttemptStatus::parse(&self.status)
            .ok_or_else(|| StoreError(format!("unknown attempt status '{}'", self.status)))?;
        Ok(Attempt {
            id: self.id,
            candidate_id: self.candidate_id,
            session_id: self.session_id,
            status,
            started_at: self.started_at,
            submitted_at: self.submitted_at,
        })
    }
}

#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    sub_section_id: i64,
    kind: String,
    marks: f64,
    correct_option: Option<String>,
}

impl QuestionRow {
    fn into_model(self) -> Result<Question, StoreError> {
        let kind = SectionKind::parse(&self.kind)
            .ok_or_else(|| StoreError(format!("unknown sub-section kind '{}'", self.kind)))?;
        Ok(Question {
            id: self.id,
            sub_section_id: self.sub_section_id,
            kind,
            marks: self.marks,
            correct_option: self.correct_option,
        })
    }
}

#[derive(FromRow)]
struct WrittenResponseRow {
    id: i64,
    attempt_id: i64,
    question_id: i64,
    image_refs: Json<Vec<String>>,
    language_hint: Option<String>,
}

impl WrittenResponseRow {
    fn into_model(self) -> WrittenResponse {
        WrittenResponse {
            id: self.id,
            attempt_id: self.attempt_id,
            question_id: self.question_id,
            image_refs: self.image_refs.0,
            language_hint: self.language_hint,
        }
    }
}

#[derive(FromRow)]
struct EvaluationRow {
    id: i64,
    response_id: i64,
    attempt_id: i64,
    question_id: i64,
    score: f64,
    feedback: String,
    extracted_text: Option<String>,
    language: String,
    evaluator_type: String,
}

impl EvaluationRow {
    fn into_model(self) -> Result<Evaluation, StoreError> {
        let evaluator_type = EvaluatorType::parse(&self.evaluator_type).ok_or_else(|| {
            StoreError(format!("unknown evaluator type '{}'", self.evaluator_type))
        })?;
        Ok(Evaluation {
            id: self.id,
            response_id: self.response_id,
            attempt_id: self.attempt_id,
            question_id: self.question_id,
            score: self.score,
            feedback: self.feedback,
            extracted_text: self.extracted_text,
            language: self.language,
            evaluator_type,
        })
    }
}

#[derive(FromRow)]
struct OverallScoreRow {
    id: i64,
    candidate_id: i64,
    session_id: i64,
    mcq_score: f64,
    written_score: f64,
    total_weighted_score: f64,
    total_possible_marks: f64,
    percentage_score: f64,
    is_qualified: bool,
    overall_rank: Option<i64>,
    class_rank: Option<i64>,
    written_by_language: Json<HashMap<String, f64>>,
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl OverallScoreRow {
    fn into_model(self) -> OverallScore {
        OverallScore {
            id: self.id,
            candidate_id: self.candidate_id,
            session_id: self.session_id,
            mcq_score: self.mcq_score,
            written_score: self.written_score,
            total_weighted_score: self.total_weighted_score,
            total_possible_marks: self.total_possible_marks,
            percentage_score: self.percentage_score,
            is_qualified: self.is_qualified,
            overall_rank: self.overall_rank,
            class_rank: self.class_rank,
            written_by_language: self.written_by_language.0,
            updated_at: self.updated_at,
        }
    }
}

#[async_trait]
impl ResultsStore for PgStore {
    async fn attempt(&self, id: i64) -> Result<Option<Attempt>, StoreError> {
        let row: Option<AttemptRow> = sqlx::query_as(
            "SELECT id, candidate_id, session_id, status, started_at, submitted_at
             FROM attempts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(AttemptRow::into_model).transpose()
    }

    async fn session(&self, id: i64) -> Result<Option<ExamSession>, StoreError> {
        let session = sqlx::query_as::<_, ExamSession>(
            "SELECT id, title, qualification_threshold FROM exam_sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn candidate(&self, id: i64) -> Result<Option<Candidate>, StoreError> {
        let candidate = sqlx::query_as::<_, Candidate>(
            "SELECT id, full_name, grade FROM candidates WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(candidate)
    }

    async fn questions_by_session(&self, session_id: i64) -> Result<Vec<Question>, StoreError> {
        let rows: Vec<QuestionRow> = sqlx::query_as(
            "SELECT q.id, q.sub_section_id, s.kind, q.marks, q.correct_option
             FROM questions q
             JOIN sub_sections s ON s.id = q.sub_section_id
             WHERE s.session_id = $1
             ORDER BY q.id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(QuestionRow::into_model).collect()
    }

    async fn mcq_responses_by_attempt(
        &self,
        attempt_id: i64,
    ) -> Result<Vec<McqResponse>, StoreError> {
        #[derive(FromRow)]
        struct Row {
            id: i64,
            attempt_id: i64,
            question_id: i64,
            selected_option: String,
            is_correct: Option<bool>,
            awarded_marks: Option<f64>,
        }

        let rows: Vec<Row> = sqlx::query_as(
            "SELECT id, attempt_id, question_id, selected_option, is_correct, awarded_marks
             FROM mcq_responses WHERE attempt_id = $1 ORDER BY question_id",
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| McqResponse {
                id: r.id,
                attempt_id: r.attempt_id,
                question_id: r.question_id,
                selected_option: r.selected_option,
                is_correct: r.is_correct,
                awarded_marks: r.awarded_marks,
            })
            .collect())
    }

    async fn written_responses_by_attempt(
        &self,
        attempt_id: i64,
    ) -> Result<Vec<WrittenResponse>, StoreError> {
        let rows: Vec<WrittenResponseRow> = sqlx::query_as(
            "SELECT id, attempt_id, question_id, image_refs, language_hint
             FROM written_responses WHERE attempt_id = $1 ORDER BY question_id",
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(WrittenResponseRow::into_model).collect())
    }

    async fn written_response(&self, id: i64) -> Result<Option<WrittenResponse>, StoreError> {
        let row: Option<WrittenResponseRow> = sqlx::query_as(
            "SELECT id, attempt_id, question_id, image_refs, language_hint
             FROM written_responses WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(WrittenResponseRow::into_model))
    }

    async fn evaluations_by_attempt(
        &self,
        attempt_id: i64,
    ) -> Result<Vec<Evaluation>, StoreError> {
        let rows: Vec<EvaluationRow> = sqlx::query_as(
            "SELECT id, response_id, attempt_id, question_id, score, feedback,
                    extracted_text, language, evaluator_type
             FROM evaluations WHERE attempt_id = $1 ORDER BY question_id",
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(EvaluationRow::into_model).collect()
    }

    async fn record_mcq_grade(
        &self,
        attempt_id: i64,
        question_id: i64,
        is_correct: bool,
        awarded_marks: f64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE mcq_responses SET is_correct = $3, awarded_marks = $4
             WHERE attempt_id = $1 AND question_id = $2",
        )
        .bind(attempt_id)
        .bind(question_id)
        .bind(is_correct)
        .bind(awarded_marks)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_evaluation_if_absent(
        &self,
        eval: NewEvaluation,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO evaluations
                 (response_id, attempt_id, question_id, score, feedback,
                  extracted_text, language, evaluator_type)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (response_id) DO NOTHING",
        )
        .bind(eval.response_id)
        .bind(eval.attempt_id)
        .bind(eval.question_id)
        .bind(eval.score)
        .bind(eval.feedback)
        .bind(eval.extracted_text)
        .bind(eval.language)
        .bind(eval.evaluator_type.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn apply_human_correction(
        &self,
        response_id: i64,
        attempt_id: i64,
        question_id: i64,
        score: f64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO evaluations
                 (response_id, attempt_id, question_id, score, feedback,
                  language, evaluator_type)
             VALUES ($1, $2, $3, $4, '', 'unknown', 'human')
             ON CONFLICT (response_id) DO UPDATE SET
                 score = EXCLUDED.score,
                 evaluator_type = 'human'",
        )
        .bind(response_id)
        .bind(attempt_id)
        .bind(question_id)
        .bind(score)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn overall_score(
        &self,
        candidate_id: i64,
        session_id: i64,
    ) -> Result<Option<OverallScore>, StoreError> {
        let row: Option<OverallScoreRow> = sqlx::query_as(
            "SELECT id, candidate_id, session_id, mcq_score, written_score,
                    total_weighted_score, total_possible_marks, percentage_score,
                    is_qualified, overall_rank, class_rank, written_by_language,
                    updated_at
             FROM overall_scores WHERE candidate_id = $1 AND session_id = $2",
        )
        .bind(candidate_id)
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(OverallScoreRow::into_model))
    }

    async fn upsert_overall_score(&self, score: ScoreUpsert) -> Result<(), StoreError> {
        // Rank columns are deliberately absent from the update list.
        sqlx::query(
            "INSERT INTO overall_scores
                 (candidate_id, session_id, mcq_score, written_score,
                  total_weighted_score, total_possible_marks, percentage_score,
                  is_qualified, written_by_language)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (candidate_id, session_id) DO UPDATE SET
                 mcq_score = EXCLUDED.mcq_score,
                 written_score = EXCLUDED.written_score,
                 total_weighted_score = EXCLUDED.total_weighted_score,
                 total_possible_marks = EXCLUDED.total_possible_marks,
                 percentage_score = EXCLUDED.percentage_score,
                 is_qualified = EXCLUDED.is_qualified,
                 written_by_language = EXCLUDED.written_by_language,
                 updated_at = CURRENT_TIMESTAMP",
        )
        .bind(score.candidate_id)
        .bind(score.session_id)
        .bind(score.mcq_score)
        .bind(score.written_score)
        .bind(score.total_weighted_score)
        .bind(score.total_possible_marks)
        .bind(score.percentage_score)
        .bind(score.is_qualified)
        .bind(Json(score.written_by_language))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn complete_attempt(&self, attempt_id: i64) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE attempts
             SET status = 'completed',
                 submitted_at = COALESCE(submitted_at, CURRENT_TIMESTAMP)
             WHERE id = $1 AND status IN ('in_progress', 'completed')",
        )
        .bind(attempt_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ranking_rows(&self, session_id: i64) -> Result<Vec<RankingRow>, StoreError> {
        #[derive(FromRow)]
        struct Row {
            candidate_id: i64,
            candidate_name: String,
            grade: Option<String>,
            total_weighted_score: f64,
            percentage_score: f64,
            is_qualified: bool,
        }

        let rows: Vec<Row> = sqlx::query_as(
            "SELECT o.candidate_id, c.full_name AS candidate_name, c.grade,
                    o.total_weighted_score, o.percentage_score, o.is_qualified
             FROM overall_scores o
             JOIN candidates c ON c.id = o.candidate_id
             JOIN attempts a ON a.candidate_id = o.candidate_id
                            AND a.session_id = o.session_id
             WHERE o.session_id = $1 AND a.status = 'completed'
             ORDER BY o.candidate_id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| RankingRow {
                candidate_id: r.candidate_id,
                candidate_name: r.candidate_name,
                grade: r.grade,
                total_weighted_score: r.total_weighted_score,
                percentage_score: r.percentage_score,
                is_qualified: r.is_qualified,
            })
            .collect())
    }

    async fn write_ranks(
        &self,
        session_id: i64,
        candidate_id: i64,
        overall_rank: i64,
        class_rank: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE overall_scores SET overall_rank = $3, class_rank = $4
             WHERE session_id = $1 AND candidate_id = $2",
        )
        .bind(session_id)
        .bind(candidate_id)
        .bind(overall_rank)
        .bind(class_rank)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn replace_standings(
        &self,
        session_id: i64,
        standings: Vec<SessionStanding>,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM session_standings WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        for standing in standings {
            sqlx::query(
                "INSERT INTO session_standings
                     (session_id, candidate_id, candidate_name, total_weighted_score,
                      percentage_score, overall_rank, class_rank, grade, result_status)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                 ON CONFLICT (session_id, candidate_id) DO UPDATE SET
                     candidate_name = EXCLUDED.candidate_name,
                     total_weighted_score = EXCLUDED.total_weighted_score,
                     percentage_score = EXCLUDED.percentage_score,
                     overall_rank = EXCLUDED.overall_rank,
                     class_rank = EXCLUDED.class_rank,
                     grade = EXCLUDED.grade,
                     result_status = EXCLUDED.result_status",
            )
            .bind(standing.session_id)
            .bind(standing.candidate_id)
            .bind(standing.candidate_name)
            .bind(standing.total_weighted_score)
            .bind(standing.percentage_score)
            .bind(standing.overall_rank)
            .bind(standing.class_rank)
            .bind(standing.grade)
            .bind(standing.result_status)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn standings(&self, session_id: i64) -> Result<Vec<SessionStanding>, StoreError> {
        let rows = sqlx::query_as::<_, StandingRow>(
            "SELECT session_id, candidate_id, candidate_name, total_weighted_score,
                    percentage_score, overall_rank, class_rank, grade, result_status
             FROM session_standings WHERE session_id = $1 ORDER BY overall_rank",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(StandingRow::into_model).collect())
    }
}

#[derive(FromRow)]
struct StandingRow {
    session_id: i64,
    candidate_id: i64,
    candidate_name: String,
    total_weighted_score: f64,
    percentage_score: f64,
    overall_rank: i64,
    class_rank: i64,
    grade: String,
    result_status: String,
}

impl StandingRow {
    fn into_model(self) -> SessionStanding {
        SessionStanding {
            session_id: self.session_id,
            candidate_id: self.candidate_id,
            candidate_name: self.candidate_name,
            total_weighted_score: self.total_weighted_score,
            percentage_score: self.percentage_score,
            overall_rank: self.overall_rank,
            class_rank: self.class_rank,
            grade: self.grade,
            result_status: self.result_status,
        }
    }
}
