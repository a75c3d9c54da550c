use std::sync::Arc;

use ns_generator::GeneratedManifestSet;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::engine::{WorkflowEngine, WorkflowSubmission};
use crate::error::{EngineError, OrchestratorError, Result};
use crate::ledger::WorkflowLedger;
use crate::registry::NamespaceRegistry;
use crate::request::{UpdateChanges, ValidatedNamespace};
use crate::retry::RetryPolicy;
use crate::workflow::{WorkflowHandle, WorkflowKind};

/// Submits provisioning workflows and returns as soon as the engine accepts
/// them. Completion is only observable through engine events.
#[derive(Clone)]
pub struct WorkflowDispatcher {
    registry: Arc<dyn NamespaceRegistry>,
    engine: Arc<dyn WorkflowEngine>,
    ledger: WorkflowLedger,
    policy: RetryPolicy,
}

impl WorkflowDispatcher {
    pub fn new(
        registry: Arc<dyn NamespaceRegistry>,
        engine: Arc<dyn WorkflowEngine>,
        ledger: WorkflowLedger,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            engine,
            ledger,
            policy,
        }
    }

    /// Dispatch a create workflow, refusing names that already exist.
    ///
    /// The existence check and the submission are not atomic; a duplicate
    /// that slips through is rejected by the engine and reported the same way.
    #[instrument(skip(self, namespace, manifests), fields(namespace = %namespace.name()))]
    pub async fn submit_create(
        &self,
        namespace: &ValidatedNamespace,
        manifests: &GeneratedManifestSet,
        requested_by: &str,
    ) -> Result<WorkflowHandle> {
        let name = namespace.name();
        let registry = &self.registry;
        let exists = self
            .policy
            .run("registry.exists", || registry.exists(name))
            .await?;
        if exists {
            return Err(OrchestratorError::AlreadyExists(name.to_string()));
        }

        let parameters = json!({
            "namespace": name,
            "requestedBy": requested_by,
            "manifests": manifests,
        });
        self.dispatch(WorkflowKind::Create, name, parameters).await
    }

    #[instrument(skip(self, changes))]
    pub async fn submit_update(
        &self,
        name: &str,
        changes: &UpdateChanges,
        requested_by: &str,
    ) -> Result<WorkflowHandle> {
        let parameters = json!({
            "namespace": name,
            "requestedBy": requested_by,
            "changes": changes,
        });
        self.dispatch(WorkflowKind::Update, name, parameters).await
    }

    /// With `force` the deletion workflow bypasses protected-resource checks;
    /// without it the workflow fails on them.
    #[instrument(skip(self))]
    pub async fn submit_delete(
        &self,
        name: &str,
        force: bool,
        requested_by: &str,
    ) -> Result<WorkflowHandle> {
        let parameters = json!({
            "namespace": name,
            "requestedBy": requested_by,
            "force": force,
        });
        self.dispatch(WorkflowKind::Delete, name, parameters).await
    }

    async fn dispatch(
        &self,
        kind: WorkflowKind,
        name: &str,
        parameters: serde_json::Value,
    ) -> Result<WorkflowHandle> {
        let submission = WorkflowSubmission::new(kind, name, parameters);
        let engine = &self.engine;
        let submission_ref = &submission;

        let workflow_id = self
            .policy
            .run("engine.submit", || engine.submit(submission_ref))
            .await
            .map_err(|e| match e {
                EngineError::Conflict(_) if kind == WorkflowKind::Create => {
                    OrchestratorError::AlreadyExists(name.to_string())
                }
                other => OrchestratorError::Dispatch(other),
            })?;

        let handle = WorkflowHandle::new(workflow_id, kind, name);
        if let Err(e) = self.ledger.record(&handle).await {
            warn!(workflow_id = %workflow_id, error = %e, "Failed to record workflow");
        }

        info!(workflow_id = %workflow_id, ?kind, namespace = %name, "Workflow dispatched");
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryEngine, InMemoryRegistry};
    use crate::registry::NamespaceRecord;
    use crate::request::{CreateNamespaceRequest, CreatePlan};
    use crate::test_utils::create_test_db;
    use crate::workflow::WorkflowPhase;
    use chrono::Utc;
    use ns_core::{ResourceLimits, ResourceQuantity};
    use ns_generator::ManifestGenerator;
    use std::time::Duration;

    struct Fixture {
        registry: Arc<InMemoryRegistry>,
        engine: Arc<InMemoryEngine>,
        ledger: WorkflowLedger,
        dispatcher: WorkflowDispatcher,
    }

    async fn fixture() -> Fixture {
        let registry = Arc::new(InMemoryRegistry::new());
        let engine = Arc::new(InMemoryEngine::new());
        let ledger = WorkflowLedger::new(create_test_db().await);
        let policy = RetryPolicy {
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            ..RetryPolicy::default()
        };
        let dispatcher = WorkflowDispatcher::new(
            registry.clone(),
            engine.clone(),
            ledger.clone(),
            policy,
        );
        Fixture {
            registry,
            engine,
            ledger,
            dispatcher,
        }
    }

    fn validated(name: &str) -> ValidatedNamespace {
        let request = CreateNamespaceRequest {
            name: name.to_string(),
            description: None,
            resource_limits: ResourceLimits::new(
                ResourceQuantity::new("100m", "500m"),
                ResourceQuantity::new("128Mi", "256Mi"),
            ),
            network_isolated: true,
            dry_run: false,
        };
        match request.into_plan().unwrap() {
            CreatePlan::Live(ns) | CreatePlan::DryRun(ns) => ns,
        }
    }

    #[tokio::test]
    async fn test_create_is_recorded_pending() {
        let f = fixture().await;
        let ns = validated("team-a");
        let manifests = ns.render(&ManifestGenerator::default());

        let handle = f.dispatcher.submit_create(&ns, &manifests, "alice").await.unwrap();
        assert_eq!(handle.kind, WorkflowKind::Create);
        assert_eq!(handle.target_namespace, "team-a");

        let status = f.ledger.get(handle.workflow_id).await.unwrap();
        assert_eq!(status.phase, WorkflowPhase::Pending);

        let submissions = f.engine.submissions().await;
        assert_eq!(submissions.len(), 1);
        let (_, submission) = &submissions[0];
        assert_eq!(submission.template, "namespace-create");
        assert_eq!(submission.parameters["requestedBy"], "alice");
        assert_eq!(
            submission.parameters["manifests"]["namespace"]["metadata"]["name"],
            "team-a"
        );
    }

    #[tokio::test]
    async fn test_duplicate_create_is_rejected_without_submission() {
        let f = fixture().await;
        let ns = validated("team-a");
        let manifests = ns.render(&ManifestGenerator::default());
        f.registry
            .insert(NamespaceRecord::from_manifests(&manifests, Utc::now()))
            .await;

        let err = f.dispatcher.submit_create(&ns, &manifests, "alice").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::AlreadyExists(ref name) if name == "team-a"));
        assert_eq!(f.engine.submission_count().await, 0);
    }

    #[tokio::test]
    async fn test_engine_conflict_is_already_exists() {
        let f = fixture().await;
        f.engine
            .set_failure(Some(EngineError::Conflict("namespaces \"team-a\" already exists".to_string())))
            .await;
        let ns = validated("team-a");
        let manifests = ns.render(&ManifestGenerator::default());

        let err = f.dispatcher.submit_create(&ns, &manifests, "alice").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_unreachable_engine_surfaces_dispatch_error() {
        let f = fixture().await;
        f.engine
            .set_failure(Some(EngineError::Unavailable("connection refused".to_string())))
            .await;

        let err = f.dispatcher.submit_delete("team-a", false, "alice").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Dispatch(EngineError::Unavailable(_))));
        assert!(err.is_retryable());
        assert!(f.ledger.latest_for_namespace("team-a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unavailable_registry_is_retryable() {
        let f = fixture().await;
        f.registry.set_unavailable(true);
        let ns = validated("team-a");
        let manifests = ns.render(&ManifestGenerator::default());

        let err = f.dispatcher.submit_create(&ns, &manifests, "alice").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Registry(_)));
        assert!(err.is_retryable());
        assert_eq!(f.registry.call_count(), 3);
        assert_eq!(f.engine.submission_count().await, 0);
    }

    #[tokio::test]
    async fn test_submit_timeout_is_not_resent() {
        use crate::http_engine::HttpWorkflowEngine;
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({ "id": uuid::Uuid::new_v4() }))
                    .set_delay(Duration::from_millis(400)),
            )
            .mount(&server)
            .await;

        let call_timeout = Duration::from_millis(100);
        let engine = HttpWorkflowEngine::new(&server.uri(), None, call_timeout).unwrap();
        let ledger = WorkflowLedger::new(create_test_db().await);
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            call_timeout,
        };
        let dispatcher = WorkflowDispatcher::new(
            Arc::new(InMemoryRegistry::new()),
            Arc::new(engine),
            ledger,
            policy,
        );

        let err = dispatcher.submit_delete("team-a", true, "alice").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Dispatch(EngineError::Timeout(_))));
        assert!(!err.is_retryable());
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete_parameters() {
        let f = fixture().await;
        let changes = UpdateChanges {
            description: Some("Payments".to_string()),
            ..Default::default()
        };

        let update = f.dispatcher.submit_update("team-a", &changes, "bob").await.unwrap();
        let delete = f.dispatcher.submit_delete("team-a", true, "bob").await.unwrap();
        assert_eq!(update.kind, WorkflowKind::Update);
        assert_eq!(delete.kind, WorkflowKind::Delete);

        let submissions = f.engine.submissions().await;
        assert_eq!(
            submissions[0].1.parameters["changes"],
            serde_json::json!({ "description": "Payments" })
        );
        assert_eq!(submissions[1].1.parameters["force"], true);
        assert_eq!(submissions[1].1.template, "namespace-delete");
    }
}
