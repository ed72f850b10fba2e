// src/state.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::FromRef;

use crate::config::Config;
use crate::evaluator::WrittenEvaluator;
use crate::store::ResultsStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ResultsStore>,
    pub evaluator: Arc<dyn WrittenEvaluator>,
    pub config: Config,
    /// Per-session ranking locks: a ranking pass is read-all/compute/
    /// write-all, so concurrent passes for one session are serialized.
    ranking_locks: Arc<Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ResultsStore>,
        evaluator: Arc<dyn WrittenEvaluator>,
        config: Config,
    ) -> Self {
        Self {
            store,
            evaluator,
            config,
            ranking_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The lock guarding ranking passes for one session.
    pub fn ranking_lock(&self, session_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .ranking_locks
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        locks
            .entry(session_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
