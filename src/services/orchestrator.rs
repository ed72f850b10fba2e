// src/services/orchestrator.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::config::EVALUATION_CONCURRENCY;
use crate::error::AppError;
use crate::evaluator::{EvaluationOutcome, EvaluationRequest, EvaluatorError, WrittenEvaluator};
use crate::models::evaluation::{Evaluation, EvaluatorType};
use crate::models::question::Question;
use crate::models::response::WrittenResponse;
use crate::store::{NewEvaluation, ResultsStore};

/// Written-score summary for one attempt after an evaluation pass.
#[derive(Debug, Clone, serde::Serialize)]
pub struct WrittenOutcome {
    pub written_score: f64,
    pub by_language: HashMap<String, f64>,
    pub evaluated: usize,
    /// Responses with uploads that still have no evaluation. They count
    /// as 0 until a later pass evaluates them.
    pub pending: usize,
    pub newly_evaluated: usize,
}

/// Pending = has uploaded material, no evaluation yet. Re-derived from
/// current state on every pass; there is no stored queue to go stale.
pub fn pending_responses(
    responses: &[WrittenResponse],
    evaluations: &[Evaluation],
) -> Vec<WrittenResponse> {
    let evaluated: HashSet<i64> = evaluations.iter().map(|e| e.response_id).collect();
    responses
        .iter()
        .filter(|r| r.has_upload() && !evaluated.contains(&r.id))
        .cloned()
        .collect()
}

/// Sum of evaluation scores, total and grouped by language tag.
pub fn written_totals(evaluations: &[Evaluation]) -> (f64, HashMap<String, f64>) {
    let mut total = 0.0;
    let mut by_language: HashMap<String, f64> = HashMap::new();
    for eval in evaluations {
        total += eval.score;
        *by_language.entry(eval.language.clone()).or_insert(0.0) += eval.score;
    }
    (total, by_language)
}

/// Runs the best-effort, re-entrant evaluation pass for one attempt:
/// detects pending responses, fans out one external call per item
/// (bounded, individually timed out), records every success, logs every
/// failure, then recomputes the written totals from all evaluations.
///
/// A response that already has an evaluation is never re-submitted, so a
/// human-corrected score cannot be overwritten by a later automatic pass.
pub async fn evaluate_attempt(
    store: &dyn ResultsStore,
    evaluator: &Arc<dyn WrittenEvaluator>,
    timeout: Duration,
    attempt_id: i64,
    questions: &HashMap<i64, Question>,
) -> Result<WrittenOutcome, AppError> {
    let responses = store.written_responses_by_attempt(attempt_id).await?;
    let evaluations = store.evaluations_by_attempt(attempt_id).await?;

    let pending = pending_responses(&responses, &evaluations);

    let semaphore = Arc::new(Semaphore::new(EVALUATION_CONCURRENCY));
    let mut handles = Vec::new();

    for response in pending {
        let Some(question) = questions.get(&response.question_id) else {
            tracing::warn!(
                "Written response {} of attempt {} references unknown question {}",
                response.id,
                attempt_id,
                response.question_id
            );
            continue;
        };

        let request = EvaluationRequest {
            attempt_id,
            question_id: response.question_id,
            image_refs: response.image_refs.clone(),
            max_marks: question.marks,
            language_hint: response.language_hint.clone(),
        };

        let evaluator = Arc::clone(evaluator);
        let semaphore = Arc::clone(&semaphore);

        let handle = tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| EvaluatorError(format!("evaluation pool closed: {}", e)))?;
            match tokio::time::timeout(timeout, evaluator.evaluate(&request)).await {
                Ok(result) => result,
                Err(_) => Err(EvaluatorError(format!(
                    "evaluation of question {} timed out after {:?}",
                    request.question_id, timeout
                ))),
            }
        });
        handles.push((response, handle));
    }

    // Join every outstanding call, success or failure, before computing
    // totals. A failed item stays pending for the next pass.
    let mut newly_evaluated = 0;
    for (response, handle) in handles {
        let outcome = match handle.await {
            Ok(result) => result,
            Err(e) => Err(EvaluatorError(format!("evaluation task failed: {}", e))),
        };

        match outcome {
            Ok(outcome) => {
                if record_outcome(store, &response, questions, outcome).await? {
                    newly_evaluated += 1;
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Evaluation failed for response {} (attempt {}, question {}): {}",
                    response.id,
                    attempt_id,
                    response.question_id,
                    e
                );
            }
        }
    }

    let evaluations = store.evaluations_by_attempt(attempt_id).await?;
    let (written_score, by_language) = written_totals(&evaluations);
    let pending_after = pending_responses(&responses, &evaluations).len();

    Ok(WrittenOutcome {
        written_score,
        by_language,
        evaluated: evaluations.len(),
        pending: pending_after,
        newly_evaluated,
    })
}

/// Persists one successful evaluation. Out-of-range scores are treated
/// as a failed call (the item stays pending) rather than clamped.
async fn record_outcome(
    store: &dyn ResultsStore,
    response: &WrittenResponse,
    questions: &HashMap<i64, Question>,
    outcome: EvaluationOutcome,
) -> Result<bool, AppError> {
    let max_marks = questions
        .get(&response.question_id)
        .map(|q| q.marks)
        .unwrap_or(0.0);

    if !(0.0..=max_marks).contains(&outcome.score) {
        tracing::warn!(
            "Discarding out-of-range score {} for response {} (max {})",
            outcome.score,
            response.id,
            max_marks
        );
        return Ok(false);
    }

    let inserted = store
        .insert_evaluation_if_absent(NewEvaluation {
            response_id: response.id,
            attempt_id: response.attempt_id,
            question_id: response.question_id,
            score: outcome.score,
            feedback: outcome.feedback,
            extracted_text: outcome.extracted_text,
            language: outcome.language.unwrap_or_else(|| "unknown".to_string()),
            evaluator_type: EvaluatorType::Ai,
        })
        .await?;

    Ok(inserted)
}
