// src/services/aggregator.rs

use std::collections::HashMap;
use std::time::Duration;

use crate::error::AppError;
use crate::models::attempt::{Attempt, AttemptStatus};
use crate::models::overall_score::ScoreUpsert;
use crate::models::question::Question;
use crate::services::{grading, orchestrator};
use crate::state::AppState;
use crate::store::ResultsStore;

/// The per-candidate result returned by finalize and correction. Always
/// best-effort: `pending_written` counts answers still awaiting
/// evaluation (contributing 0 until a later pass).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScoreBreakdown {
    pub attempt_id: i64,
    pub candidate_id: i64,
    pub session_id: i64,
    pub mcq_score: f64,
    pub written_score: f64,
    pub total_weighted_score: f64,
    pub total_possible_marks: f64,
    pub percentage_score: f64,
    pub is_qualified: bool,
    pub qualification_threshold: f64,
    pub pending_written: usize,
    pub written_by_language: HashMap<String, f64>,
}

pub fn percentage(total: f64, possible: f64) -> f64 {
    if possible > 0.0 {
        total / possible * 100.0
    } else {
        0.0
    }
}

pub fn total_possible_marks(questions: &[Question]) -> f64 {
    questions
        .iter()
        .filter(|q| q.is_scored())
        .map(|q| q.marks)
        .sum()
}

/// One threshold per session; the configured default is applied only when
/// the session carries none, and the fallback is logged so it stays
/// auditable.
pub fn resolve_threshold(session_id: i64, configured: Option<f64>, default: f64) -> f64 {
    match configured {
        Some(threshold) => threshold,
        None => {
            tracing::warn!(
                "Session {} has no qualification threshold, applying default {}",
                session_id,
                default
            );
            default
        }
    }
}

fn question_map(questions: Vec<Question>) -> HashMap<i64, Question> {
    questions.into_iter().map(|q| (q.id, q)).collect()
}

async fn load_attempt(store: &dyn ResultsStore, attempt_id: i64) -> Result<Attempt, AppError> {
    store
        .attempt(attempt_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", attempt_id)))
}

/// Finalizes one attempt: grades MCQ selections, runs the best-effort
/// evaluation pass, aggregates both into the (candidate, session)
/// OverallScore via keyed upsert, then conditionally completes the
/// attempt. Safe to repeat: every step recomputes from source data and
/// every write is keyed, so a second call converges to the same row.
pub async fn finalize_attempt(
    state: &AppState,
    attempt_id: i64,
) -> Result<ScoreBreakdown, AppError> {
    let store = state.store.as_ref();
    let attempt = load_attempt(store, attempt_id).await?;

    match attempt.status {
        AttemptStatus::NotStarted => {
            return Err(AppError::Validation(format!(
                "Attempt {} has not been started",
                attempt_id
            )));
        }
        AttemptStatus::Expired => {
            return Err(AppError::Validation(format!(
                "Attempt {} has expired",
                attempt_id
            )));
        }
        AttemptStatus::InProgress | AttemptStatus::Completed => {}
    }

    let session = store
        .session(attempt.session_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session {} not found", attempt.session_id)))?;

    let questions = store.questions_by_session(session.id).await?;
    let possible = total_possible_marks(&questions);
    let questions = question_map(questions);

    let mcq = grading::grade_attempt(store, attempt_id, &questions).await?;

    let timeout = Duration::from_secs(state.config.evaluator_timeout_secs);
    let written = orchestrator::evaluate_attempt(
        store,
        &state.evaluator,
        timeout,
        attempt_id,
        &questions,
    )
    .await?;

    let total = mcq.mcq_score + written.written_score;
    let pct = percentage(total, possible);
    let threshold = resolve_threshold(
        session.id,
        session.qualification_threshold,
        state.config.default_qualification_threshold,
    );
    let qualified = pct >= threshold;

    store
        .upsert_overall_score(ScoreUpsert {
            candidate_id: attempt.candidate_id,
            session_id: session.id,
            mcq_score: mcq.mcq_score,
            written_score: written.written_score,
            total_weighted_score: total,
            total_possible_marks: possible,
            percentage_score: pct,
            is_qualified: qualified,
            written_by_language: written.by_language.clone(),
        })
        .await?;

    store.complete_attempt(attempt_id).await?;

    tracing::info!(
        "Finalized attempt {}: mcq {}, written {} ({} pending), {:.2}%",
        attempt_id,
        mcq.mcq_score,
        written.written_score,
        written.pending,
        pct
    );

    Ok(ScoreBreakdown {
        attempt_id,
        candidate_id: attempt.candidate_id,
        session_id: session.id,
        mcq_score: mcq.mcq_score,
        written_score: written.written_score,
        total_weighted_score: total,
        total_possible_marks: possible,
        percentage_score: pct,
        is_qualified: qualified,
        qualification_threshold: threshold,
        pending_written: written.pending,
        written_by_language: written.by_language,
    })
}

/// Targeted human correction of a single written score.
///
/// Validates the new score against the question's marks before any
/// write, overwrites the evaluation in place (`evaluator_type = human`),
/// then recomputes the written total over ALL evaluations of the attempt
/// (never old + delta). The OverallScore row must already exist; its
/// mcq_score and total_possible_marks are reused untouched.
pub async fn correct_written_score(
    state: &AppState,
    attempt_id: i64,
    response_id: i64,
    new_score: f64,
) -> Result<ScoreBreakdown, AppError> {
    let store = state.store.as_ref();
    let attempt = load_attempt(store, attempt_id).await?;

    let response = store
        .written_response(response_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Written response {} not found", response_id)))?;

    if response.attempt_id != attempt_id {
        return Err(AppError::Validation(format!(
            "Response {} does not belong to attempt {}",
            response_id, attempt_id
        )));
    }

    let session = store
        .session(attempt.session_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session {} not found", attempt.session_id)))?;

    let questions = store.questions_by_session(session.id).await?;
    let question = questions
        .iter()
        .find(|q| q.id == response.question_id)
        .ok_or_else(|| {
            AppError::NotFound(format!("Question {} not found", response.question_id))
        })?;

    if !(0.0..=question.marks).contains(&new_score) {
        return Err(AppError::Validation(format!(
            "Score {} is out of range [0, {}] for question {}",
            new_score, question.marks, question.id
        )));
    }

    // Precondition: finalize must have produced the row already. A
    // correction never creates it.
    let existing = store
        .overall_score(attempt.candidate_id, session.id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "No overall score for candidate {} in session {}; finalize the attempt first",
                attempt.candidate_id, session.id
            ))
        })?;

    store
        .apply_human_correction(response_id, attempt_id, response.question_id, new_score)
        .await?;

    let evaluations = store.evaluations_by_attempt(attempt_id).await?;
    let (written_score, by_language) = orchestrator::written_totals(&evaluations);
    let responses = store.written_responses_by_attempt(attempt_id).await?;
    let pending = orchestrator::pending_responses(&responses, &evaluations).len();

    let total = existing.mcq_score + written_score;
    let pct = percentage(total, existing.total_possible_marks);
    let threshold = resolve_threshold(
        session.id,
        session.qualification_threshold,
        state.config.default_qualification_threshold,
    );
    let qualified = pct >= threshold;

    store
        .upsert_overall_score(ScoreUpsert {
            candidate_id: attempt.candidate_id,
            session_id: session.id,
            mcq_score: existing.mcq_score,
            written_score,
            total_weighted_score: total,
            total_possible_marks: existing.total_possible_marks,
            percentage_score: pct,
            is_qualified: qualified,
            written_by_language: by_language.clone(),
        })
        .await?;

    tracing::info!(
        "Corrected response {} of attempt {} to {}: written {} -> total {}",
        response_id,
        attempt_id,
        new_score,
        written_score,
        total
    );

    Ok(ScoreBreakdown {
        attempt_id,
        candidate_id: attempt.candidate_id,
        session_id: session.id,
        mcq_score: existing.mcq_score,
        written_score,
        total_weighted_score: total,
        total_possible_marks: existing.total_possible_marks,
        percentage_score: pct,
        is_qualified: qualified,
        qualification_threshold: threshold,
        pending_written: pending,
        written_by_language: by_language,
    })
}
