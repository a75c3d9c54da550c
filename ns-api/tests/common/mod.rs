//! Common test utilities and helpers for ns-api tests
//!
//! Builds the real router over in-memory backends with the event pump
//! running, plus request helpers shared by the test files.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use ns_api::{create_app, AppState};
use ns_core::{ResourceLimits, ResourceQuantity};
use ns_generator::ManifestGenerator;
use ns_orchestrator::test_utils::create_test_db;
use ns_orchestrator::{
    event_channel, run_event_pump, EventSink, InMemoryEngine, InMemoryRegistry, NamespaceRecord,
    ProvisioningService, RetryPolicy, StatusBroadcaster, WorkflowLedger,
};
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

pub const TEST_USER: &str = "alice";
pub const WEBHOOK_TOKEN: &str = "engine-secret";

pub struct TestApp {
    pub router: Router,
    pub registry: Arc<InMemoryRegistry>,
    pub engine: Arc<InMemoryEngine>,
    pub ledger: WorkflowLedger,
    pub service: ProvisioningService,
    pub broadcaster: StatusBroadcaster,
    pub events: EventSink,
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(1),
        call_timeout: Duration::from_secs(1),
    }
}

/// Create the app over an in-memory registry and a recording engine
pub async fn create_test_app() -> TestApp {
    let registry = Arc::new(InMemoryRegistry::new());
    let engine = Arc::new(InMemoryEngine::new());
    let ledger = WorkflowLedger::new(create_test_db().await);
    let broadcaster = StatusBroadcaster::new();
    let (events, rx) = event_channel(64);
    tokio::spawn(run_event_pump(rx, ledger.clone(), broadcaster.clone()));

    let service = ProvisioningService::new(
        ManifestGenerator::default(),
        registry.clone(),
        engine.clone(),
        ledger.clone(),
        fast_policy(),
    );
    let state = AppState::new(service.clone(), broadcaster.clone(), events.clone())
        .with_webhook_token(Some(WEBHOOK_TOKEN.to_string()));
    let router = create_app(state);

    TestApp {
        router,
        registry,
        engine,
        ledger,
        service,
        broadcaster,
        events,
    }
}

impl TestApp {
    /// Send a request to the API
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .header("x-ns-user", TEST_USER)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post_json(&self, uri: &str, body: &Value) -> Response<Body> {
        self.send_json("POST", uri, body).await
    }

    pub async fn patch_json(&self, uri: &str, body: &Value) -> Response<Body> {
        self.send_json("PATCH", uri, body).await
    }

    pub async fn delete(&self, uri: &str) -> Response<Body> {
        let request = Request::builder()
            .method("DELETE")
            .uri(uri)
            .header("x-ns-user", TEST_USER)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Post an engine event the way the engine does: bearer token, no user
    pub async fn post_event(&self, workflow_id: &str, body: &Value) -> Response<Body> {
        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/v1/workflows/{}/events", workflow_id))
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", WEBHOOK_TOKEN))
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn send_json(&self, method: &str, uri: &str, body: &Value) -> Response<Body> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-ns-user", TEST_USER)
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Store a namespace as if a create workflow had already applied it
    pub async fn seed_namespace(&self, name: &str) -> NamespaceRecord {
        let manifests = ManifestGenerator::default().generate(
            name,
            Some("Tenant namespace"),
            &test_limits(),
            true,
        );
        let record = NamespaceRecord::from_manifests(&manifests, chrono::Utc::now());
        self.registry.insert(record.clone()).await;
        record
    }
}

pub fn test_limits() -> ResourceLimits {
    ResourceLimits::new(
        ResourceQuantity::new("100m", "500m"),
        ResourceQuantity::new("128Mi", "256Mi"),
    )
}

/// Body of a valid create request
pub fn create_body(name: &str, dry_run: bool) -> Value {
    json!({
        "name": name,
        "description": "Tenant namespace",
        "resourceLimits": {
            "cpu": { "request": "100m", "limit": "500m" },
            "memory": { "request": "128Mi", "limit": "256Mi" }
        },
        "networkIsolated": true,
        "dryRun": dry_run
    })
}

/// Helper to extract JSON body from axum response
pub async fn extract_json_body<T>(response: axum::response::Response) -> T
where
    T: serde::de::DeserializeOwned,
{
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");

    serde_json::from_slice(&body).expect("Failed to deserialize JSON")
}
