use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::engine::{WorkflowEngine, WorkflowSubmission};
use crate::error::EngineError;
use crate::workflow::WorkflowId;

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: WorkflowId,
}

/// Workflow engine reached over its REST submission endpoint.
#[derive(Clone)]
pub struct HttpWorkflowEngine {
    client: reqwest::Client,
    submit_url: String,
    token: Option<String>,
    call_timeout: Duration,
}

impl HttpWorkflowEngine {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        call_timeout: Duration,
    ) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(call_timeout)
            .build()
            .map_err(|e| EngineError::Unavailable(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            submit_url: format!("{}/api/v1/workflows", base_url.trim_end_matches('/')),
            token,
            call_timeout,
        })
    }

    pub fn submit_url(&self) -> &str {
        &self.submit_url
    }
}

/// Only a failed connect proves the engine never saw the request.
fn map_send_error(err: reqwest::Error, call_timeout: Duration) -> EngineError {
    if err.is_timeout() {
        EngineError::Timeout(call_timeout)
    } else if err.is_connect() {
        EngineError::Unavailable(err.to_string())
    } else {
        EngineError::InvalidResponse(format!("Submission interrupted: {err}"))
    }
}

#[async_trait]
impl WorkflowEngine for HttpWorkflowEngine {
    #[instrument(skip(self, submission), fields(kind = ?submission.kind, namespace = %submission.target_namespace))]
    async fn submit(&self, submission: &WorkflowSubmission) -> Result<WorkflowId, EngineError> {
        let mut request = self.client.post(&self.submit_url).json(submission);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| map_send_error(e, self.call_timeout))?;
        let status = response.status();

        if status.is_success() {
            let body: SubmitResponse = response
                .json()
                .await
                .map_err(|e| EngineError::InvalidResponse(format!("Unreadable submit response: {e}")))?;
            debug!(workflow_id = %body.id, "Workflow accepted by engine");
            return Ok(body.id);
        }

        let detail = response.text().await.unwrap_or_default();
        let detail = if detail.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {detail}")
        };

        Err(match status {
            StatusCode::CONFLICT => EngineError::Conflict(detail),
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
                EngineError::Unavailable(detail)
            }
            s if s.is_server_error() => EngineError::Unavailable(detail),
            _ => EngineError::Rejected(detail),
        })
    }
}
