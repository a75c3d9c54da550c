use ns_core::{ResourceLimits, ResourceQuantity};
use ns_generator::{GeneratedManifestSet, ResourceRef};
use ns_orchestrator::{
    CreateNamespaceRequest, EngineEvent, NamespacePhase, NamespaceRecord, NamespaceStatus,
    UpdateNamespaceRequest, UpdateOutcome, WorkflowHandle, WorkflowKind, WorkflowPhase,
    WorkflowStatus,
};
use utoipa::OpenApi;

use crate::routes::namespaces::{
    CreateAcceptedResponse, DeleteAcceptedResponse, DeleteDryRunResponse, DryRunResponse,
};
use crate::routes::workflows::EngineEventPayload;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::health_check,
        crate::routes::health::readiness_check,
        crate::routes::namespaces::create_namespace,
        crate::routes::namespaces::list_namespaces,
        crate::routes::namespaces::get_namespace,
        crate::routes::namespaces::update_namespace,
        crate::routes::namespaces::delete_namespace,
        crate::routes::namespaces::get_manifests,
        crate::routes::namespaces::get_status,
        crate::routes::workflows::list_workflows,
        crate::routes::workflows::get_workflow,
        crate::routes::workflows::post_event,
    ),
    components(
        schemas(
            CreateNamespaceRequest,
            UpdateNamespaceRequest,
            ResourceLimits,
            ResourceQuantity,
            NamespaceRecord,
            NamespacePhase,
            NamespaceStatus,
            GeneratedManifestSet,
            ResourceRef,
            WorkflowHandle,
            WorkflowKind,
            WorkflowPhase,
            WorkflowStatus,
            EngineEvent,
            EngineEventPayload,
            UpdateOutcome,
            DryRunResponse,
            CreateAcceptedResponse,
            DeleteDryRunResponse,
            DeleteAcceptedResponse,
        )
    ),
    tags(
        (name = "ns-api", description = "Self-service namespace provisioning API")
    )
)]
pub struct ApiDoc;
