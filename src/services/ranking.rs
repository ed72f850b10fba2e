// src/services/ranking.rs

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::AppError;
use crate::models::overall_score::{RankingRow, SessionStanding};
use crate::state::AppState;
use crate::store::ResultsStore;

const UNKNOWN_GRADE: &str = "unknown";

/// One fully ranked row, ready to be written back.
#[derive(Debug, Clone)]
pub struct RankedRow {
    pub row: RankingRow,
    pub overall_rank: i64,
    pub class_rank: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RankingSummary {
    pub session_id: i64,
    pub ranked: usize,
}

/// Orders a session: overall ranks 1..N by total weighted score
/// descending, class ranks 1..M within each grade bucket. Ranks are
/// strictly sequential; ties receive distinct consecutive ranks in sort
/// order (recorded simplification, not competition-style shared ranks).
pub fn assign_ranks(rows: Vec<RankingRow>) -> Vec<RankedRow> {
    let mut rows = rows;
    // Stable sort keeps the incoming order among equal scores.
    rows.sort_by(|a, b| {
        b.total_weighted_score
            .partial_cmp(&a.total_weighted_score)
            .unwrap_or(Ordering::Equal)
    });

    let mut class_counters: HashMap<String, i64> = HashMap::new();
    rows.into_iter()
        .enumerate()
        .map(|(idx, row)| {
            let bucket = row
                .grade
                .clone()
                .unwrap_or_else(|| UNKNOWN_GRADE.to_string());
            let class_counter = class_counters.entry(bucket).or_insert(0);
            *class_counter += 1;
            RankedRow {
                overall_rank: idx as i64 + 1,
                class_rank: *class_counter,
                row,
            }
        })
        .collect()
}

fn standing(session_id: i64, ranked: &RankedRow) -> SessionStanding {
    SessionStanding {
        session_id,
        candidate_id: ranked.row.candidate_id,
        candidate_name: ranked.row.candidate_name.clone(),
        total_weighted_score: ranked.row.total_weighted_score,
        percentage_score: ranked.row.percentage_score,
        overall_rank: ranked.overall_rank,
        class_rank: ranked.class_rank,
        grade: ranked
            .row
            .grade
            .clone()
            .unwrap_or_else(|| UNKNOWN_GRADE.to_string()),
        result_status: if ranked.row.is_qualified {
            "qualified".to_string()
        } else {
            "not_qualified".to_string()
        },
    }
}

/// Full ranking pass over one session: read every finalized OverallScore
/// row, compute both orderings, write ranks back and rewrite the
/// standings read model. Re-run whenever scores change. Passes for the
/// same session are serialized through the
/// per-session lock; a pass never runs interleaved with another.
pub async fn rank_session(
    state: &AppState,
    session_id: i64,
) -> Result<RankingSummary, AppError> {
    let store = state.store.as_ref();

    store
        .session(session_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session {} not found", session_id)))?;

    let lock = state.ranking_lock(session_id);
    let _guard = lock.lock().await;

    let rows = store.ranking_rows(session_id).await?;
    let ranked = assign_ranks(rows);

    for entry in &ranked {
        store
            .write_ranks(
                session_id,
                entry.row.candidate_id,
                entry.overall_rank,
                entry.class_rank,
            )
            .await?;
    }

    let standings = ranked.iter().map(|r| standing(session_id, r)).collect();
    store.replace_standings(session_id, standings).await?;

    tracing::info!("Ranked {} candidates in session {}", ranked.len(), session_id);

    Ok(RankingSummary {
        session_id,
        ranked: ranked.len(),
    })
}
