//! Request handling shared by every caller-facing surface: validation, the
//! dry-run fork, registry reads and workflow dispatch.

use std::sync::Arc;

use ns_core::validate_namespace_name;
use ns_generator::{GeneratedManifestSet, ManifestGenerator, ResourceRef};
use serde::Serialize;
use tracing::{debug, instrument};
use utoipa::ToSchema;

use crate::dispatcher::WorkflowDispatcher;
use crate::engine::WorkflowEngine;
use crate::error::{OrchestratorError, Result};
use crate::ledger::WorkflowLedger;
use crate::registry::{ListFilter, NamespacePhase, NamespaceRecord, NamespaceRegistry};
use crate::request::{CreateNamespaceRequest, CreatePlan, DeleteNamespaceRequest, UpdateNamespaceRequest};
use crate::retry::RetryPolicy;
use crate::workflow::{WorkflowHandle, WorkflowPhase, WorkflowStatus};

#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    DryRun(GeneratedManifestSet),
    Accepted {
        namespace: NamespaceRecord,
        workflow: WorkflowHandle,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    /// The namespace as it will look once the workflow succeeds
    pub namespace: NamespaceRecord,
    pub workflow: WorkflowHandle,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    DryRun { resources: Vec<ResourceRef> },
    Accepted { workflow: WorkflowHandle },
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceStatus {
    pub namespace: String,
    pub exists: bool,
    pub phase: Option<NamespacePhase>,
    /// Present, active, and its latest workflow did not fail
    pub healthy: bool,
    pub latest_workflow: Option<WorkflowStatus>,
}

#[derive(Clone)]
pub struct ProvisioningService {
    generator: ManifestGenerator,
    registry: Arc<dyn NamespaceRegistry>,
    dispatcher: WorkflowDispatcher,
    ledger: WorkflowLedger,
    policy: RetryPolicy,
}

impl ProvisioningService {
    pub fn new(
        generator: ManifestGenerator,
        registry: Arc<dyn NamespaceRegistry>,
        engine: Arc<dyn WorkflowEngine>,
        ledger: WorkflowLedger,
        policy: RetryPolicy,
    ) -> Self {
        let dispatcher =
            WorkflowDispatcher::new(Arc::clone(&registry), engine, ledger.clone(), policy);
        Self {
            generator,
            registry,
            dispatcher,
            ledger,
            policy,
        }
    }

    pub fn generator(&self) -> &ManifestGenerator {
        &self.generator
    }

    pub fn ledger(&self) -> &WorkflowLedger {
        &self.ledger
    }

    /// Validate, then either preview the manifests or dispatch a create
    /// workflow. A dry run never reaches the registry or the engine.
    #[instrument(skip(self, request), fields(namespace = %request.name, dry_run = request.dry_run))]
    pub async fn create(
        &self,
        request: CreateNamespaceRequest,
        requested_by: &str,
    ) -> Result<CreateOutcome> {
        match request.into_plan()? {
            CreatePlan::DryRun(namespace) => {
                debug!("Dry run, returning rendered manifests");
                Ok(CreateOutcome::DryRun(namespace.render(&self.generator)))
            }
            CreatePlan::Live(namespace) => {
                let manifests = namespace.render(&self.generator);
                let workflow = self
                    .dispatcher
                    .submit_create(&namespace, &manifests, requested_by)
                    .await?;

                let mut preview = NamespaceRecord::from_manifests(&manifests, workflow.submitted_at);
                preview.created_at = None;

                Ok(CreateOutcome::Accepted {
                    namespace: preview,
                    workflow,
                })
            }
        }
    }

    /// Dispatch a partial update carrying only the fields present in `request`.
    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        name: &str,
        request: UpdateNamespaceRequest,
        requested_by: &str,
    ) -> Result<UpdateOutcome> {
        validate_namespace_name(name)?;
        request.validate()?;

        let record = self.get(name).await?;
        let changes = request.changes(name, &self.generator);
        let workflow = self
            .dispatcher
            .submit_update(name, &changes, requested_by)
            .await?;

        Ok(UpdateOutcome {
            namespace: request.merge_onto(&record),
            workflow,
        })
    }

    #[instrument(skip(self))]
    pub async fn delete(
        &self,
        name: &str,
        request: DeleteNamespaceRequest,
        requested_by: &str,
    ) -> Result<DeleteOutcome> {
        validate_namespace_name(name)?;
        let record = self.get(name).await?;

        if request.dry_run {
            return Ok(DeleteOutcome::DryRun {
                resources: record.resources(),
            });
        }

        let workflow = self
            .dispatcher
            .submit_delete(name, request.force, requested_by)
            .await?;
        Ok(DeleteOutcome::Accepted { workflow })
    }

    pub async fn get(&self, name: &str) -> Result<NamespaceRecord> {
        self.find(name)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(name.to_string()))
    }

    /// Look up a namespace this service manages. Anything else in the
    /// cluster, such as `kube-system`, reads as absent.
    async fn find(&self, name: &str) -> Result<Option<NamespaceRecord>> {
        let registry = &self.registry;
        let record = self
            .policy
            .run("registry.get", || registry.get(name))
            .await?;

        Ok(record.filter(|record| {
            let managed = record.is_managed();
            if !managed {
                debug!(namespace = %name, "Namespace exists but is not managed here");
            }
            managed
        }))
    }

    pub async fn list(&self, label_selector: Option<&str>) -> Result<Vec<NamespaceRecord>> {
        let filter = ListFilter::parse(label_selector)?;
        let registry = &self.registry;
        let filter_ref = &filter;
        let mut records = self
            .policy
            .run("registry.list", || registry.list(filter_ref))
            .await?;
        records.retain(NamespaceRecord::is_managed);
        Ok(records)
    }

    /// Regenerate the manifests an existing namespace was provisioned from.
    pub async fn manifests(&self, name: &str) -> Result<GeneratedManifestSet> {
        self.get(name).await?.manifests(&self.generator)
    }

    /// Current state plus the latest workflow. Known to the ledger alone is
    /// enough, so a namespace mid-creation still reports its progress.
    pub async fn status(&self, name: &str) -> Result<NamespaceStatus> {
        let record = self.find(name).await?;
        let latest_workflow = self.ledger.latest_for_namespace(name).await?;

        if record.is_none() && latest_workflow.is_none() {
            return Err(OrchestratorError::NotFound(name.to_string()));
        }

        let phase = record.as_ref().map(|r| r.phase);
        let healthy = phase == Some(NamespacePhase::Active)
            && latest_workflow
                .as_ref()
                .map_or(true, |w| w.phase != WorkflowPhase::Failed);

        Ok(NamespaceStatus {
            namespace: name.to_string(),
            exists: record.is_some(),
            phase,
            healthy,
            latest_workflow,
        })
    }
}
