// tests/engine_tests.rs

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use exam_results_engine::config::Config;
use exam_results_engine::evaluator::{
    EvaluationOutcome, EvaluationRequest, EvaluatorError, WrittenEvaluator,
};
use exam_results_engine::models::attempt::{Attempt, AttemptStatus};
use exam_results_engine::models::overall_score::ScoreUpsert;
use exam_results_engine::models::question::{Question, SectionKind};
use exam_results_engine::models::response::{McqResponse, WrittenResponse};
use exam_results_engine::models::session::{Candidate, ExamSession};
use exam_results_engine::routes;
use exam_results_engine::state::AppState;
use exam_results_engine::store::ResultsStore;
use exam_results_engine::store::memory::MemoryStore;
use exam_results_engine::utils::jwt::{ROLE_EXAM_CONTROLLER, sign_jwt};

const JWT_SECRET: &str = "test_secret_for_integration_tests";

/// Scripted evaluation service: per-question scores, injectable
/// failures, call counting for re-entrancy assertions.
#[derive(Default)]
struct MockEvaluator {
    scores: Mutex<HashMap<i64, f64>>,
    failing: Mutex<HashSet<i64>>,
    calls: Mutex<HashMap<i64, usize>>,
}

impl MockEvaluator {
    fn new() -> Self {
        Self::default()
    }

    fn score(&self, question_id: i64, score: f64) {
        self.scores.lock().unwrap().insert(question_id, score);
    }

    fn fail(&self, question_id: i64) {
        self.failing.lock().unwrap().insert(question_id);
    }

    fn heal(&self, question_id: i64) {
        self.failing.lock().unwrap().remove(&question_id);
    }

    fn calls_for(&self, question_id: i64) -> usize {
        self.calls.lock().unwrap().get(&question_id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl WrittenEvaluator for MockEvaluator {
    async fn evaluate(
        &self,
        request: &EvaluationRequest,
    ) -> Result<EvaluationOutcome, EvaluatorError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(request.question_id)
            .or_insert(0) += 1;

        if self.failing.lock().unwrap().contains(&request.question_id) {
            return Err(EvaluatorError("scripted failure".to_string()));
        }

        let score = self
            .scores
            .lock()
            .unwrap()
            .get(&request.question_id)
            .copied()
            .ok_or_else(|| EvaluatorError("no scripted score".to_string()))?;

        Ok(EvaluationOutcome {
            score,
            feedback: "scripted feedback".to_string(),
            extracted_text: Some("extracted".to_string()),
            language: Some("english".to_string()),
        })
    }
}

fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        evaluator_url: "http://unused".to_string(),
        evaluator_api_key: None,
        evaluator_timeout_secs: 5,
        default_qualification_threshold: 40.0,
    }
}

/// Spawns the app over the given store/evaluator on a random port.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app(store: Arc<MemoryStore>, evaluator: Arc<MockEvaluator>) -> String {
    let state = AppState::new(store, evaluator, test_config());
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

fn candidate_token() -> String {
    sign_jwt(1, "candidate", JWT_SECRET, 600).unwrap()
}

fn controller_token() -> String {
    sign_jwt(99, ROLE_EXAM_CONTROLLER, JWT_SECRET, 600).unwrap()
}

fn mcq_question(id: i64, marks: f64, correct: &str) -> Question {
    Question {
        id,
        sub_section_id: 1,
        kind: SectionKind::Mcq,
        marks,
        correct_option: Some(correct.to_string()),
    }
}

fn written_question(id: i64, marks: f64) -> Question {
    Question {
        id,
        sub_section_id: 2,
        kind: SectionKind::Written,
        marks,
        correct_option: None,
    }
}

/// Session 100 with MCQ-A (1 mark, "A"), MCQ-B (1 mark, "C") and
/// Written-Q (6 marks): total possible = 8. Candidate 1 selects "A"
/// (correct) and "B" (incorrect) and uploads one written answer.
fn seed_worked_example(store: &MemoryStore) {
    store.add_session(ExamSession {
        id: 100,
        title: "Entrance Exam".to_string(),
        qualification_threshold: Some(40.0),
    });
    store.add_candidate(Candidate {
        id: 1,
        full_name: "First Candidate".to_string(),
        grade: Some("10".to_string()),
    });
    store.add_question(100, mcq_question(10, 1.0, "A"));
    store.add_question(100, mcq_question(11, 1.0, "C"));
    store.add_question(100, written_question(12, 6.0));
    store.add_attempt(Attempt {
        id: 1,
        candidate_id: 1,
        session_id: 100,
        status: AttemptStatus::InProgress,
        started_at: Some(chrono::Utc::now()),
        submitted_at: None,
    });
    store.add_mcq_response(McqResponse {
        id: 1,
        attempt_id: 1,
        question_id: 10,
        selected_option: "A".to_string(),
        is_correct: None,
        awarded_marks: None,
    });
    store.add_mcq_response(McqResponse {
        id: 2,
        attempt_id: 1,
        question_id: 11,
        selected_option: "B".to_string(),
        is_correct: None,
        awarded_marks: None,
    });
    store.add_written_response(WrittenResponse {
        id: 5,
        attempt_id: 1,
        question_id: 12,
        image_refs: vec!["answers/1/12.png".to_string()],
        language_hint: Some("english".to_string()),
    });
}

async fn finalize(
    client: &reqwest::Client,
    address: &str,
    attempt_id: i64,
) -> serde_json::Value {
    let response = client
        .post(format!("{}/api/attempts/{}/finalize", address, attempt_id))
        .bearer_auth(candidate_token())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
    response.json().await.expect("Invalid JSON")
}

#[tokio::test]
async fn finalize_requires_auth() {
    let store = Arc::new(MemoryStore::new());
    seed_worked_example(&store);
    let address = spawn_app(store, Arc::new(MockEvaluator::new())).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/attempts/1/finalize", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn finalize_unknown_attempt_is_404() {
    let store = Arc::new(MemoryStore::new());
    seed_worked_example(&store);
    let address = spawn_app(store, Arc::new(MockEvaluator::new())).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/attempts/999/finalize", address))
        .bearer_auth(candidate_token())
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn finalize_computes_worked_example() {
    let store = Arc::new(MemoryStore::new());
    seed_worked_example(&store);
    let evaluator = Arc::new(MockEvaluator::new());
    evaluator.score(12, 4.5);

    let address = spawn_app(store.clone(), evaluator).await;
    let client = reqwest::Client::new();

    let body = finalize(&client, &address, 1).await;

    assert_eq!(body["mcq_score"], 1.0);
    assert_eq!(body["written_score"], 4.5);
    assert_eq!(body["total_weighted_score"], 5.5);
    assert_eq!(body["total_possible_marks"], 8.0);
    assert_eq!(body["percentage_score"], 68.75);
    assert_eq!(body["is_qualified"], true);
    assert_eq!(body["pending_written"], 0);
    assert_eq!(body["written_by_language"]["english"], 4.5);

    // finalize completes the attempt
    assert_eq!(store.attempt_status(1), Some(AttemptStatus::Completed));
}

#[tokio::test]
async fn finalize_is_idempotent_and_reentrant() {
    let store = Arc::new(MemoryStore::new());
    seed_worked_example(&store);
    let evaluator = Arc::new(MockEvaluator::new());
    evaluator.score(12, 4.5);

    let address = spawn_app(store.clone(), evaluator.clone()).await;
    let client = reqwest::Client::new();

    let first = finalize(&client, &address, 1).await;
    let second = finalize(&client, &address, 1).await;

    assert_eq!(first, second);
    // the already-evaluated response is never re-submitted
    assert_eq!(evaluator.calls_for(12), 1);

    // one row, served back by the score endpoint
    let response = client
        .get(format!("{}/api/attempts/1/score", address))
        .bearer_auth(candidate_token())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
    let score: serde_json::Value = response.json().await.unwrap();
    assert_eq!(score["total_weighted_score"], 5.5);
}

#[tokio::test]
async fn failed_evaluation_stays_pending_and_recovers() {
    let store = Arc::new(MemoryStore::new());
    seed_worked_example(&store);
    let evaluator = Arc::new(MockEvaluator::new());
    evaluator.score(12, 4.5);
    evaluator.fail(12);

    let address = spawn_app(store, evaluator.clone()).await;
    let client = reqwest::Client::new();

    // best effort: finalize succeeds, the written answer contributes 0
    let body = finalize(&client, &address, 1).await;
    assert_eq!(body["mcq_score"], 1.0);
    assert_eq!(body["written_score"], 0.0);
    assert_eq!(body["total_weighted_score"], 1.0);
    assert_eq!(body["percentage_score"], 12.5);
    assert_eq!(body["is_qualified"], false);
    assert_eq!(body["pending_written"], 1);

    // next pass picks the pending response up again
    evaluator.heal(12);
    let body = finalize(&client, &address, 1).await;
    assert_eq!(body["written_score"], 4.5);
    assert_eq!(body["pending_written"], 0);
    assert_eq!(evaluator.calls_for(12), 2);
}

#[tokio::test]
async fn partial_failure_keeps_other_evaluations() {
    let store = Arc::new(MemoryStore::new());
    seed_worked_example(&store);
    store.add_question(100, written_question(13, 4.0));
    store.add_written_response(WrittenResponse {
        id: 6,
        attempt_id: 1,
        question_id: 13,
        image_refs: vec!["answers/1/13.png".to_string()],
        language_hint: None,
    });

    let evaluator = Arc::new(MockEvaluator::new());
    evaluator.score(12, 4.5);
    evaluator.score(13, 3.0);
    evaluator.fail(13);

    let address = spawn_app(store, evaluator).await;
    let client = reqwest::Client::new();

    let body = finalize(&client, &address, 1).await;
    // question 13 failed, question 12 still lands
    assert_eq!(body["written_score"], 4.5);
    assert_eq!(body["pending_written"], 1);
    assert_eq!(body["total_possible_marks"], 12.0);
}

#[tokio::test]
async fn out_of_range_ai_score_is_discarded() {
    let store = Arc::new(MemoryStore::new());
    seed_worked_example(&store);
    let evaluator = Arc::new(MockEvaluator::new());
    evaluator.score(12, 6.5); // above the question's 6 marks

    let address = spawn_app(store, evaluator).await;
    let client = reqwest::Client::new();

    let body = finalize(&client, &address, 1).await;
    assert_eq!(body["written_score"], 0.0);
    assert_eq!(body["pending_written"], 1);
}

#[tokio::test]
async fn correction_recomputes_totals_and_keeps_mcq() {
    let store = Arc::new(MemoryStore::new());
    seed_worked_example(&store);
    let evaluator = Arc::new(MockEvaluator::new());
    evaluator.score(12, 4.5);

    let address = spawn_app(store, evaluator).await;
    let client = reqwest::Client::new();
    finalize(&client, &address, 1).await;

    let response = client
        .post(format!("{}/api/responses/5/correction", address))
        .bearer_auth(controller_token())
        .json(&serde_json::json!({ "attempt_id": 1, "score": 6.0 }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["mcq_score"], 1.0);
    assert_eq!(body["written_score"], 6.0);
    assert_eq!(body["total_weighted_score"], 7.0);
    assert_eq!(body["percentage_score"], 87.5);
    assert_eq!(body["is_qualified"], true);
}

#[tokio::test]
async fn correction_rejects_out_of_range_scores() {
    let store = Arc::new(MemoryStore::new());
    seed_worked_example(&store);
    let evaluator = Arc::new(MockEvaluator::new());
    evaluator.score(12, 4.5);

    let address = spawn_app(store, evaluator).await;
    let client = reqwest::Client::new();
    finalize(&client, &address, 1).await;

    for score in [6.5, -1.0] {
        let response = client
            .post(format!("{}/api/responses/5/correction", address))
            .bearer_auth(controller_token())
            .json(&serde_json::json!({ "attempt_id": 1, "score": score }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 400, "score {}", score);
    }

    // the stored evaluation is untouched
    let response = client
        .get(format!("{}/api/attempts/1/score", address))
        .bearer_auth(candidate_token())
        .send()
        .await
        .unwrap();
    let score: serde_json::Value = response.json().await.unwrap();
    assert_eq!(score["written_score"], 4.5);
}

#[tokio::test]
async fn correction_requires_controller_role() {
    let store = Arc::new(MemoryStore::new());
    seed_worked_example(&store);
    let evaluator = Arc::new(MockEvaluator::new());
    evaluator.score(12, 4.5);

    let address = spawn_app(store, evaluator).await;
    let client = reqwest::Client::new();
    finalize(&client, &address, 1).await;

    let response = client
        .post(format!("{}/api/responses/5/correction", address))
        .bearer_auth(candidate_token())
        .json(&serde_json::json!({ "attempt_id": 1, "score": 6.0 }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn correction_before_finalize_is_a_precondition_failure() {
    let store = Arc::new(MemoryStore::new());
    seed_worked_example(&store);
    let address = spawn_app(store, Arc::new(MockEvaluator::new())).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/responses/5/correction", address))
        .bearer_auth(controller_token())
        .json(&serde_json::json!({ "attempt_id": 1, "score": 3.0 }))
        .send()
        .await
        .expect("Failed to execute request");

    // no OverallScore row yet: fatal, never silently created
    assert_eq!(response.status().as_u16(), 404);
}

/// Three finalized candidates with totals 9, 7 and 5.5 across two grades.
async fn seed_ranked_session(store: &MemoryStore) {
    store.add_session(ExamSession {
        id: 200,
        title: "Ranked Session".to_string(),
        qualification_threshold: Some(40.0),
    });
    for (candidate_id, name, grade, total) in [
        (1, "Alpha", "10", 9.0),
        (2, "Beta", "12", 7.0),
        (3, "Gamma", "10", 5.5),
    ] {
        store.add_candidate(Candidate {
            id: candidate_id,
            full_name: name.to_string(),
            grade: Some(grade.to_string()),
        });
        store.add_attempt(Attempt {
            id: candidate_id,
            candidate_id,
            session_id: 200,
            status: AttemptStatus::Completed,
            started_at: Some(chrono::Utc::now()),
            submitted_at: Some(chrono::Utc::now()),
        });
        store
            .upsert_overall_score(ScoreUpsert {
                candidate_id,
                session_id: 200,
                mcq_score: total,
                written_score: 0.0,
                total_weighted_score: total,
                total_possible_marks: 10.0,
                percentage_score: total * 10.0,
                is_qualified: total * 10.0 >= 40.0,
                written_by_language: HashMap::new(),
            })
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn ranking_orders_session_and_groups() {
    let store = Arc::new(MemoryStore::new());
    seed_ranked_session(&store).await;

    let address = spawn_app(store.clone(), Arc::new(MockEvaluator::new())).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/sessions/200/rankings", address))
        .bearer_auth(controller_token())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
    let summary: serde_json::Value = response.json().await.unwrap();
    assert_eq!(summary["ranked"], 3);

    // standings mirror: rank order 1..3, class ranks per grade
    let response = client
        .get(format!("{}/api/sessions/200/standings", address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let standings: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(standings.len(), 3);

    let ranks: Vec<i64> = standings
        .iter()
        .map(|s| s["overall_rank"].as_i64().unwrap())
        .collect();
    assert_eq!(ranks, vec![1, 2, 3]);

    assert_eq!(standings[0]["candidate_name"], "Alpha");
    assert_eq!(standings[0]["class_rank"], 1);
    assert_eq!(standings[1]["candidate_name"], "Beta");
    assert_eq!(standings[1]["class_rank"], 1); // only grade-12 candidate
    assert_eq!(standings[2]["candidate_name"], "Gamma");
    assert_eq!(standings[2]["class_rank"], 2); // second in grade 10
    assert_eq!(standings[0]["result_status"], "qualified");

    // ranks also land on the OverallScore rows
    let score = store.overall_score(3, 200).await.unwrap().unwrap();
    assert_eq!(score.overall_rank, Some(3));
    assert_eq!(score.class_rank, Some(2));
}

#[tokio::test]
async fn ranking_requires_controller_role() {
    let store = Arc::new(MemoryStore::new());
    seed_ranked_session(&store).await;
    let address = spawn_app(store, Arc::new(MockEvaluator::new())).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/sessions/200/rankings", address))
        .bearer_auth(candidate_token())
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn score_upserts_preserve_rank_fields() {
    let store = Arc::new(MemoryStore::new());
    seed_ranked_session(&store).await;
    let address = spawn_app(store.clone(), Arc::new(MockEvaluator::new())).await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/api/sessions/200/rankings", address))
        .bearer_auth(controller_token())
        .send()
        .await
        .unwrap();

    // a later score upsert must not clear ranks
    store
        .upsert_overall_score(ScoreUpsert {
            candidate_id: 2,
            session_id: 200,
            mcq_score: 8.0,
            written_score: 0.0,
            total_weighted_score: 8.0,
            total_possible_marks: 10.0,
            percentage_score: 80.0,
            is_qualified: true,
            written_by_language: HashMap::new(),
        })
        .await
        .unwrap();

    let score = store.overall_score(2, 200).await.unwrap().unwrap();
    assert_eq!(score.total_weighted_score, 8.0);
    assert_eq!(score.overall_rank, Some(2));
    assert_eq!(score.class_rank, Some(1));
}
