// src/evaluator.rs

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One call to the external evaluation service, covering a single
/// written response.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRequest {
    pub attempt_id: i64,
    pub question_id: i64,
    pub image_refs: Vec<String>,
    pub max_marks: f64,
    pub language_hint: Option<String>,
}

/// What the service returns for one response.
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationOutcome {
    pub score: f64,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub extracted_text: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// Recoverable, per-item failure. The caller logs it and leaves the
/// response pending; it never fails the surrounding finalize pass.
#[derive(Debug)]
pub struct EvaluatorError(pub String);

impl fmt::Display for EvaluatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "evaluator error: {}", self.0)
    }
}

impl std::error::Error for EvaluatorError {}

/// External AI evaluation collaborator. Each call is independent and may
/// fail on its own.
#[async_trait]
pub trait WrittenEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        request: &EvaluationRequest,
    ) -> Result<EvaluationOutcome, EvaluatorError>;
}

/// HTTP client for the evaluation service: JSON request, bearer auth,
/// bounded per-call timeout.
pub struct HttpEvaluator {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpEvaluator {
    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl WrittenEvaluator for HttpEvaluator {
    async fn evaluate(
        &self,
        request: &EvaluationRequest,
    ) -> Result<EvaluationOutcome, EvaluatorError> {
        let url = format!("{}/evaluate", self.base_url.trim_end_matches('/'));

        let mut builder = self.client.post(&url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| EvaluatorError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EvaluatorError(format!(
                "evaluation service returned {}: {}",
                status, body
            )));
        }

        response
            .json::<EvaluationOutcome>()
            .await
            .map_err(|e| EvaluatorError(format!("invalid evaluation response: {}", e)))
    }
}
