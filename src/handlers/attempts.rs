// src/handlers/attempts.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    response::IntoResponse,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    error::AppError, services::aggregator, state::AppState, store::ResultsStore,
    utils::jwt::Claims,
};

/// Finalizes an attempt and returns the best-effort score breakdown.
///
/// * Grades every MCQ response against the answer keys.
/// * Runs the written-response evaluation pass (failures stay pending).
/// * Upserts the candidate's OverallScore and completes the attempt.
/// Safe to call repeatedly; a retry converges to the same result.
pub async fn finalize_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(
        "Finalize requested for attempt {} by caller {}",
        attempt_id,
        claims.sub
    );

    let breakdown = aggregator::finalize_attempt(&state, attempt_id).await?;
    Ok(Json(breakdown))
}

/// Returns the current OverallScore row for the attempt's candidate.
pub async fn get_score(
    State(state): State<AppState>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = state
        .store
        .attempt(attempt_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", attempt_id)))?;

    let score = state
        .store
        .overall_score(attempt.candidate_id, attempt.session_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Attempt {} has not been finalized", attempt_id))
        })?;

    Ok(Json(score))
}

/// DTO for a human score correction. The upper bound is the question's
/// marks and is enforced against the loaded question before any write.
#[derive(Debug, Deserialize, Validate)]
pub struct CorrectionRequest {
    pub attempt_id: i64,
    #[validate(range(min = 0.0, message = "Score cannot be negative."))]
    pub score: f64,
}

/// Applies a human correction to one written response's score and
/// recomputes the attempt's OverallScore. Exam-controller only;
/// all-or-nothing per call.
pub async fn correct_response(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(response_id): Path<i64>,
    Json(payload): Json<CorrectionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::Validation(validation_errors.to_string()));
    }

    tracing::info!(
        "Correction of response {} to {} by controller {}",
        response_id,
        payload.score,
        claims.sub
    );

    let breakdown =
        aggregator::correct_written_score(&state, payload.attempt_id, response_id, payload.score)
            .await?;
    Ok(Json(breakdown))
}
