use std::time::Duration;

use ns_core::ValidationError;
use thiserror::Error;

use crate::workflow::WorkflowId;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Failures talking to the cluster API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Cluster API unavailable: {0}")]
    Unavailable(String),

    #[error("Cluster API call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cluster API rejected the request: {0}")]
    Api(String),
}

impl RegistryError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RegistryError::Unavailable(_) | RegistryError::Timeout(_))
    }
}

/// Failures submitting a workflow to the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Workflow engine unreachable: {0}")]
    Unavailable(String),

    /// The submission may still have been accepted
    #[error("Workflow engine did not answer within {0:?}; the workflow may have been accepted")]
    Timeout(Duration),

    #[error("Workflow engine reported a conflicting resource: {0}")]
    Conflict(String),

    #[error("Workflow engine rejected the submission: {0}")]
    Rejected(String),

    #[error("Unexpected workflow engine response: {0}")]
    InvalidResponse(String),
}

impl EngineError {
    /// Only failures where the engine never saw the submission. A timed-out
    /// submit is not resent, since that could start a second workflow.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Unavailable(_))
    }
}

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Namespace already exists: {0}")]
    AlreadyExists(String),

    #[error("Namespace not found: {0}")]
    NotFound(String),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(WorkflowId),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Namespace {namespace} has no {limit_range} LimitRange, so its resource limits are unknown")]
    MissingLimitRange {
        namespace: String,
        limit_range: &'static str,
    },

    #[error("Workflow dispatch failed: {0}")]
    Dispatch(EngineError),

    #[error("Namespace registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrchestratorError {
    /// Whether the caller may safely retry the whole request.
    pub fn is_retryable(&self) -> bool {
        match self {
            OrchestratorError::Dispatch(e) => e.is_retryable(),
            OrchestratorError::Registry(e) => e.is_retryable(),
            _ => false,
        }
    }
}
