// src/models/overall_score.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The single aggregated result per (candidate, session).
///
/// Score fields are owned by the aggregator (upsert-by-key on every
/// finalize/correction); `overall_rank` and `class_rank` are written only
/// by the ranking engine and must survive score upserts untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallScore {
    pub id: i64,
    pub candidate_id: i64,
    pub session_id: i64,
    pub mcq_score: f64,
    pub written_score: f64,
    pub total_weighted_score: f64,
    pub total_possible_marks: f64,
    pub percentage_score: f64,
    pub is_qualified: bool,
    pub overall_rank: Option<i64>,
    pub class_rank: Option<i64>,
    pub written_by_language: HashMap<String, f64>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Score fields of an OverallScore upsert. Rank fields are deliberately
/// absent so the aggregator cannot clobber them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreUpsert {
    pub candidate_id: i64,
    pub session_id: i64,
    pub mcq_score: f64,
    pub written_score: f64,
    pub total_weighted_score: f64,
    pub total_possible_marks: f64,
    pub percentage_score: f64,
    pub is_qualified: bool,
    pub written_by_language: HashMap<String, f64>,
}

/// One row of the ranking input: everything the ranking engine needs to
/// order a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingRow {
    pub candidate_id: i64,
    pub candidate_name: String,
    pub grade: Option<String>,
    pub total_weighted_score: f64,
    pub percentage_score: f64,
    pub is_qualified: bool,
}

/// Read-model row consumed by downstream result screens; rewritten in
/// full by every ranking pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStanding {
    pub session_id: i64,
    pub candidate_id: i64,
    pub candidate_name: String,
    pub total_weighted_score: f64,
    pub percentage_score: f64,
    pub overall_rank: i64,
    pub class_rank: i64,
    pub grade: String,
    pub result_status: String,
}
