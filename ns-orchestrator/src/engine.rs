use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::workflow::{WorkflowId, WorkflowKind};

/// A parameterized workflow ready for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSubmission {
    pub kind: WorkflowKind,
    pub template: String,
    pub target_namespace: String,
    pub parameters: serde_json::Value,
}

impl WorkflowSubmission {
    pub fn new(kind: WorkflowKind, target_namespace: &str, parameters: serde_json::Value) -> Self {
        Self {
            kind,
            template: kind.template().to_string(),
            target_namespace: target_namespace.to_string(),
            parameters,
        }
    }
}

/// The external engine that executes provisioning workflows.
///
/// `submit` returns as soon as the engine accepts the workflow; progress is
/// reported separately as [`crate::EngineEvent`]s.
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    async fn submit(&self, submission: &WorkflowSubmission) -> Result<WorkflowId, EngineError>;
}
