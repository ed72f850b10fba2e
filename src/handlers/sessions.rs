// src/handlers/sessions.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    response::IntoResponse,
};

use crate::{
    error::AppError, services::ranking, state::AppState, store::ResultsStore,
    utils::jwt::Claims,
};

/// Runs a full ranking pass over the session. Exam-controller only.
/// Reads every finalized OverallScore row, writes both rank orderings
/// back and rewrites the standings read model.
pub async fn rank_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(
        "Ranking pass for session {} triggered by controller {}",
        session_id,
        claims.sub
    );

    let summary = ranking::rank_session(&state, session_id).await?;
    Ok(Json(summary))
}

/// Returns the session's standings read model in rank order.
pub async fn get_standings(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state
        .store
        .session(session_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session {} not found", session_id)))?;

    let standings = state.store.standings(session_id).await?;
    Ok(Json(standings))
}
