//! Namespace provisioning orchestration
//!
//! Validates tenant requests, renders their manifests, dispatches provisioning
//! workflows to an external engine and relays engine progress to live
//! subscribers. The registry, dispatcher and broadcaster only share the
//! workflow id; engine events reach the broadcaster through the event pump.

pub mod broadcaster;
pub mod db;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod http_engine;
pub mod kube_registry;
pub mod ledger;
pub mod memory;
pub mod pump;
pub mod registry;
pub mod request;
pub mod retry;
pub mod service;
pub mod test_utils;
pub mod workflow;

pub use broadcaster::{ConnectionId, StatusBroadcaster};
pub use dispatcher::WorkflowDispatcher;
pub use engine::{WorkflowEngine, WorkflowSubmission};
pub use error::{EngineError, OrchestratorError, RegistryError, Result};
pub use http_engine::HttpWorkflowEngine;
pub use kube_registry::KubeRegistry;
pub use ledger::{WorkflowFilters, WorkflowLedger};
pub use memory::{InMemoryEngine, InMemoryRegistry};
pub use pump::{event_channel, run_event_pump, EventSink};
pub use registry::{ListFilter, NamespacePhase, NamespaceRecord, NamespaceRegistry};
pub use request::{
    CreateNamespaceRequest, CreatePlan, DeleteNamespaceRequest, NetworkPolicyChange,
    UpdateChanges, UpdateNamespaceRequest, ValidatedNamespace,
};
pub use retry::RetryPolicy;
pub use service::{CreateOutcome, DeleteOutcome, NamespaceStatus, ProvisioningService, UpdateOutcome};
pub use workflow::{EngineEvent, WorkflowHandle, WorkflowId, WorkflowKind, WorkflowPhase, WorkflowStatus};
