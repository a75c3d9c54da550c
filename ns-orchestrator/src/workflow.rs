use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub type WorkflowId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum WorkflowKind {
    Create,
    Update,
    Delete,
}

impl WorkflowKind {
    /// Name of the workflow template the engine runs for this kind.
    pub fn template(self) -> &'static str {
        match self {
            WorkflowKind::Create => "namespace-create",
            WorkflowKind::Update => "namespace-update",
            WorkflowKind::Delete => "namespace-delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(rename_all = "lowercase")]
pub enum WorkflowPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl WorkflowPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowPhase::Succeeded | WorkflowPhase::Failed)
    }
}

/// Tracking handle returned as soon as the engine accepts a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowHandle {
    #[schema(value_type = String, format = Uuid)]
    pub workflow_id: WorkflowId,
    pub kind: WorkflowKind,
    pub target_namespace: String,
    pub submitted_at: DateTime<Utc>,
}

impl WorkflowHandle {
    pub fn new(workflow_id: WorkflowId, kind: WorkflowKind, target_namespace: &str) -> Self {
        Self {
            workflow_id,
            kind,
            target_namespace: target_namespace.to_string(),
            submitted_at: Utc::now(),
        }
    }
}

/// Progress report emitted by the engine for one workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EngineEvent {
    #[schema(value_type = String, format = Uuid)]
    pub workflow_id: WorkflowId,
    pub phase: WorkflowPhase,
    #[serde(default)]
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl EngineEvent {
    pub fn new(workflow_id: WorkflowId, phase: WorkflowPhase, message: impl Into<String>) -> Self {
        Self {
            workflow_id,
            phase,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Last-known state of a dispatched workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    #[schema(value_type = String, format = Uuid)]
    pub workflow_id: WorkflowId,
    pub kind: WorkflowKind,
    pub target_namespace: String,
    pub phase: WorkflowPhase,
    pub message: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowStatus {
    /// The status as an event, used to answer late subscribers.
    pub fn to_event(&self) -> EngineEvent {
        EngineEvent {
            workflow_id: self.workflow_id,
            phase: self.phase,
            message: self.message.clone().unwrap_or_default(),
            timestamp: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_wire_names() {
        assert_eq!(serde_json::to_string(&WorkflowPhase::Succeeded).unwrap(), "\"Succeeded\"");
        let phase: WorkflowPhase = serde_json::from_str("\"Failed\"").unwrap();
        assert_eq!(phase, WorkflowPhase::Failed);
    }

    #[test]
    fn test_terminal_phases() {
        assert!(!WorkflowPhase::Pending.is_terminal());
        assert!(!WorkflowPhase::Running.is_terminal());
        assert!(WorkflowPhase::Succeeded.is_terminal());
        assert!(WorkflowPhase::Failed.is_terminal());
    }

    #[test]
    fn test_handle_serializes_camel_case() {
        let handle = WorkflowHandle::new(Uuid::new_v4(), WorkflowKind::Create, "team-a");
        let json = serde_json::to_value(&handle).unwrap();
        assert_eq!(json["kind"], "create");
        assert_eq!(json["targetNamespace"], "team-a");
        assert!(json["workflowId"].is_string());
        assert!(json["submittedAt"].is_string());
    }

    #[test]
    fn test_event_message_defaults_to_empty() {
        let id = Uuid::new_v4();
        let json = format!(
            r#"{{"workflowId":"{}","phase":"Running","timestamp":"2025-03-01T10:00:00Z"}}"#,
            id
        );
        let event: EngineEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event.message, "");
        assert_eq!(event.phase, WorkflowPhase::Running);
    }
}
