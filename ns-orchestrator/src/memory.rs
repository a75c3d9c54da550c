//! Process-local registry and engine, used for local runs and tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use ns_generator::GeneratedManifestSet;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::{WorkflowEngine, WorkflowSubmission};
use crate::error::{EngineError, RegistryError};
use crate::pump::EventSink;
use crate::registry::{ListFilter, NamespaceRecord, NamespaceRegistry};
use crate::request::UpdateChanges;
use crate::workflow::{EngineEvent, WorkflowId, WorkflowKind, WorkflowPhase};

#[derive(Default)]
pub struct InMemoryRegistry {
    records: RwLock<BTreeMap<String, NamespaceRecord>>,
    unavailable: AtomicBool,
    calls: AtomicUsize,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: NamespaceRecord) {
        self.records.write().await.insert(record.name.clone(), record);
    }

    pub async fn remove(&self, name: &str) -> Option<NamespaceRecord> {
        self.records.write().await.remove(name)
    }

    /// Make every read fail as if the cluster API were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of reads served (or refused) so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RegistryError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }

    /// Apply a submitted workflow's effect, as the real engine would.
    async fn apply(&self, submission: &WorkflowSubmission) -> Result<String, String> {
        let name = submission.target_namespace.as_str();
        let mut records = self.records.write().await;

        match submission.kind {
            WorkflowKind::Create => {
                if records.contains_key(name) {
                    return Err(format!("AlreadyExists: namespace {} already exists", name));
                }
                let manifests: GeneratedManifestSet =
                    serde_json::from_value(submission.parameters["manifests"].clone())
                        .map_err(|e| format!("Invalid manifests parameter: {}", e))?;
                records.insert(
                    name.to_string(),
                    NamespaceRecord::from_manifests(&manifests, Utc::now()),
                );
                Ok(format!("Namespace {} provisioned", name))
            }
            WorkflowKind::Update => {
                let changes: UpdateChanges =
                    serde_json::from_value(submission.parameters["changes"].clone())
                        .map_err(|e| format!("Invalid changes parameter: {}", e))?;
                let record = records
                    .get_mut(name)
                    .ok_or_else(|| format!("NotFound: namespace {} does not exist", name))?;
                changes.apply_to(record);
                Ok(format!("Namespace {} updated", name))
            }
            WorkflowKind::Delete => records
                .remove(name)
                .map(|_| format!("Namespace {} deleted", name))
                .ok_or_else(|| format!("NotFound: namespace {} does not exist", name)),
        }
    }
}

#[async_trait]
impl NamespaceRegistry for InMemoryRegistry {
    async fn get(&self, name: &str) -> Result<Option<NamespaceRecord>, RegistryError> {
        self.check()?;
        Ok(self.records.read().await.get(name).cloned())
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<NamespaceRecord>, RegistryError> {
        self.check()?;
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|record| filter.matches(&record.labels))
            .cloned()
            .collect())
    }
}

struct Simulation {
    registry: Arc<InMemoryRegistry>,
    events: EventSink,
    step: Duration,
}

/// Engine that accepts every submission and, when simulating, plays the
/// workflow out against an [`InMemoryRegistry`].
#[derive(Default)]
pub struct InMemoryEngine {
    submissions: Mutex<Vec<(WorkflowId, WorkflowSubmission)>>,
    failure: Mutex<Option<EngineError>>,
    simulation: Option<Arc<Simulation>>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run accepted workflows `Pending → Running → Succeeded|Failed`, one
    /// phase per `step`, publishing each phase to `events`.
    pub fn simulated(registry: Arc<InMemoryRegistry>, events: EventSink, step: Duration) -> Self {
        Self {
            simulation: Some(Arc::new(Simulation {
                registry,
                events,
                step,
            })),
            ..Self::default()
        }
    }

    /// Fail every following submission with `error`, or accept again with `None`.
    pub async fn set_failure(&self, error: Option<EngineError>) {
        *self.failure.lock().await = error;
    }

    pub async fn submissions(&self) -> Vec<(WorkflowId, WorkflowSubmission)> {
        self.submissions.lock().await.clone()
    }

    pub async fn submission_count(&self) -> usize {
        self.submissions.lock().await.len()
    }
}

#[async_trait]
impl WorkflowEngine for InMemoryEngine {
    async fn submit(&self, submission: &WorkflowSubmission) -> Result<WorkflowId, EngineError> {
        if let Some(error) = self.failure.lock().await.clone() {
            return Err(error);
        }

        let workflow_id = Uuid::new_v4();
        self.submissions
            .lock()
            .await
            .push((workflow_id, submission.clone()));
        debug!(%workflow_id, kind = ?submission.kind, namespace = %submission.target_namespace, "Accepted workflow");

        if let Some(simulation) = &self.simulation {
            tokio::spawn(simulate(
                Arc::clone(simulation),
                workflow_id,
                submission.clone(),
            ));
        }

        Ok(workflow_id)
    }
}

async fn simulate(simulation: Arc<Simulation>, workflow_id: WorkflowId, submission: WorkflowSubmission) {
    let publish = |phase: WorkflowPhase, message: String| {
        let events = simulation.events.clone();
        async move { events.publish(EngineEvent::new(workflow_id, phase, message)).await }
    };

    // Phases are spaced out so the dispatcher can record the handle first.
    tokio::time::sleep(simulation.step).await;
    if !publish(WorkflowPhase::Pending, "Workflow queued".to_string()).await {
        return;
    }
    tokio::time::sleep(simulation.step).await;
    publish(
        WorkflowPhase::Running,
        format!("Running {}", submission.kind.template()),
    )
    .await;
    tokio::time::sleep(simulation.step).await;

    let (phase, message) = match simulation.registry.apply(&submission).await {
        Ok(message) => (WorkflowPhase::Succeeded, message),
        Err(message) => (WorkflowPhase::Failed, message),
    };
    info!(%workflow_id, ?phase, %message, "Simulated workflow finished");
    publish(phase, message).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pump::event_channel;
    use ns_core::{ResourceLimits, ResourceQuantity};
    use ns_generator::ManifestGenerator;

    fn manifests(name: &str) -> GeneratedManifestSet {
        let limits = ResourceLimits::new(
            ResourceQuantity::new("100m", "500m"),
            ResourceQuantity::new("128Mi", "256Mi"),
        );
        ManifestGenerator::default().generate(name, Some("test"), &limits, true)
    }

    fn create(name: &str) -> WorkflowSubmission {
        WorkflowSubmission::new(
            WorkflowKind::Create,
            name,
            serde_json::json!({ "namespace": name, "manifests": manifests(name) }),
        )
    }

    #[tokio::test]
    async fn test_registry_counts_calls_and_fails_when_unavailable() {
        let registry = InMemoryRegistry::new();
        registry
            .insert(NamespaceRecord::from_manifests(&manifests("team-a"), Utc::now()))
            .await;

        assert!(registry.exists("team-a").await.unwrap());
        assert!(!registry.exists("team-b").await.unwrap());

        registry.set_unavailable(true);
        let err = registry.get("team-a").await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(registry.call_count(), 3);
    }

    #[tokio::test]
    async fn test_registry_list_applies_filter() {
        let registry = InMemoryRegistry::new();
        for (name, team) in [("team-a", "search"), ("team-b", "payments")] {
            let mut record = NamespaceRecord::from_manifests(&manifests(name), Utc::now());
            record.labels.insert("team".to_string(), team.to_string());
            registry.insert(record).await;
        }

        let all = registry.list(&ListFilter::all()).await.unwrap();
        assert_eq!(all.len(), 2);

        let filter = ListFilter::parse(Some("team=payments")).unwrap();
        let some = registry.list(&filter).await.unwrap();
        assert_eq!(some.len(), 1);
        assert_eq!(some[0].name, "team-b");
    }

    #[tokio::test]
    async fn test_engine_failure_injection() {
        let engine = InMemoryEngine::new();
        engine
            .set_failure(Some(EngineError::Unavailable("down".to_string())))
            .await;
        assert!(engine.submit(&create("team-a")).await.is_err());
        assert_eq!(engine.submission_count().await, 0);

        engine.set_failure(None).await;
        let id = engine.submit(&create("team-a")).await.unwrap();
        assert_eq!(engine.submissions().await[0].0, id);
    }

    #[tokio::test]
    async fn test_simulated_create_then_collision() {
        let registry = Arc::new(InMemoryRegistry::new());
        let (sink, mut rx) = event_channel(16);
        let engine = InMemoryEngine::simulated(Arc::clone(&registry), sink, Duration::from_millis(1));

        let first = engine.submit(&create("team-a")).await.unwrap();
        let phases: Vec<_> = [rx.recv().await, rx.recv().await, rx.recv().await]
            .into_iter()
            .map(|e| e.unwrap())
            .inspect(|e| assert_eq!(e.workflow_id, first))
            .map(|e| e.phase)
            .collect();
        assert_eq!(
            phases,
            vec![WorkflowPhase::Pending, WorkflowPhase::Running, WorkflowPhase::Succeeded]
        );
        assert!(registry.exists("team-a").await.unwrap());

        engine.submit(&create("team-a")).await.unwrap();
        let last = [rx.recv().await, rx.recv().await, rx.recv().await]
            .into_iter()
            .last()
            .flatten()
            .unwrap();
        assert_eq!(last.phase, WorkflowPhase::Failed);
        assert!(last.message.contains("AlreadyExists"));
    }

    #[tokio::test]
    async fn test_simulated_delete_of_missing_namespace_fails() {
        let registry = Arc::new(InMemoryRegistry::new());
        let (sink, mut rx) = event_channel(16);
        let engine = InMemoryEngine::simulated(registry, sink, Duration::from_millis(1));

        let submission = WorkflowSubmission::new(
            WorkflowKind::Delete,
            "ghost",
            serde_json::json!({ "namespace": "ghost", "force": false }),
        );
        engine.submit(&submission).await.unwrap();

        let mut last = None;
        for _ in 0..3 {
            last = rx.recv().await;
        }
        assert_eq!(last.unwrap().phase, WorkflowPhase::Failed);
    }
}
