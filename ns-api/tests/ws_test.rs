//! Integration tests for the live status WebSocket
//!
//! Runs the router on a real HTTP transport so axum-test can upgrade the
//! connection. Engine events are injected through the app's event sink and
//! flow through the pump exactly as webhook events do.

mod common;

use axum::http::{HeaderName, HeaderValue};
use axum_test::{TestServer, TestWebSocket};
use common::{create_test_app, TestApp, TEST_USER};
use ns_orchestrator::{EngineEvent, WorkflowHandle, WorkflowKind, WorkflowPhase};
use serde_json::{json, Value};
use uuid::Uuid;

fn test_server(app: &TestApp) -> TestServer {
    TestServer::builder()
        .http_transport()
        .build(app.router.clone())
        .expect("Failed to create test server")
}

async fn connect(server: &TestServer) -> TestWebSocket {
    server
        .get_websocket("/api/v1/ws")
        .add_header(
            HeaderName::from_static("x-ns-user"),
            HeaderValue::from_static(TEST_USER),
        )
        .await
        .into_websocket()
        .await
}

/// Subscribe and wait until the subscription is live.
///
/// Frames are handled in order, so the pong proves the subscribe frame was
/// fully applied.
async fn subscribe(socket: &mut TestWebSocket, workflow_id: Uuid) {
    socket
        .send_json(&json!({ "type": "subscribe", "workflowId": workflow_id }))
        .await;
    let ack: Value = socket.receive_json().await;
    assert_eq!(ack["type"], "subscribed");
    assert_eq!(ack["workflowId"], workflow_id.to_string());

    socket.send_json(&json!({ "type": "ping" })).await;
    let pong: Value = socket.receive_json().await;
    assert_eq!(pong["type"], "pong");
}

#[tokio::test]
async fn test_subscribers_only_see_their_workflow() {
    let app = create_test_app().await;
    let server = test_server(&app);
    let (workflow_a, workflow_b) = (Uuid::new_v4(), Uuid::new_v4());

    let mut watcher_a = connect(&server).await;
    let mut watcher_b = connect(&server).await;
    subscribe(&mut watcher_a, workflow_a).await;
    subscribe(&mut watcher_b, workflow_b).await;

    // One pump delivers in order, so B's first status proves A's event
    // never reached it.
    assert!(
        app.events
            .publish(EngineEvent::new(workflow_a, WorkflowPhase::Running, "applying a"))
            .await
    );
    assert!(
        app.events
            .publish(EngineEvent::new(workflow_b, WorkflowPhase::Running, "applying b"))
            .await
    );

    let status_a: Value = watcher_a.receive_json().await;
    assert_eq!(status_a["type"], "status");
    assert_eq!(status_a["workflowId"], workflow_a.to_string());
    assert_eq!(status_a["phase"], "Running");
    assert_eq!(status_a["message"], "applying a");

    let status_b: Value = watcher_b.receive_json().await;
    assert_eq!(status_b["workflowId"], workflow_b.to_string());
    assert_eq!(status_b["message"], "applying b");
}

#[tokio::test]
async fn test_events_arrive_in_emitted_order() {
    let app = create_test_app().await;
    let server = test_server(&app);
    let workflow_id = Uuid::new_v4();

    let mut socket = connect(&server).await;
    subscribe(&mut socket, workflow_id).await;

    for (phase, message) in [
        (WorkflowPhase::Pending, "queued"),
        (WorkflowPhase::Running, "applying"),
        (WorkflowPhase::Succeeded, "done"),
    ] {
        app.events
            .publish(EngineEvent::new(workflow_id, phase, message))
            .await;
    }

    let phases: Vec<String> = {
        let mut phases = Vec::new();
        for _ in 0..3 {
            let status: Value = socket.receive_json().await;
            phases.push(status["phase"].as_str().unwrap().to_string());
        }
        phases
    };
    assert_eq!(phases, vec!["Pending", "Running", "Succeeded"]);
}

#[tokio::test]
async fn test_subscribe_to_finished_workflow_replays_terminal_status() {
    let app = create_test_app().await;
    let server = test_server(&app);

    let handle = WorkflowHandle::new(Uuid::new_v4(), WorkflowKind::Create, "svc-api");
    app.ledger.record(&handle).await.unwrap();
    app.ledger
        .update_phase(&EngineEvent::new(
            handle.workflow_id,
            WorkflowPhase::Failed,
            "quota exceeded",
        ))
        .await
        .unwrap();

    let mut socket = connect(&server).await;
    socket
        .send_json(&json!({ "type": "subscribe", "workflowId": handle.workflow_id }))
        .await;

    let ack: Value = socket.receive_json().await;
    assert_eq!(ack["type"], "subscribed");

    let replay: Value = socket.receive_json().await;
    assert_eq!(replay["type"], "status");
    assert_eq!(replay["phase"], "Failed");
    assert_eq!(replay["message"], "quota exceeded");

    socket.send_json(&json!({ "type": "ping" })).await;
    let pong: Value = socket.receive_json().await;
    assert_eq!(pong["type"], "pong");
}

#[tokio::test]
async fn test_malformed_frame_keeps_connection_open() {
    let app = create_test_app().await;
    let server = test_server(&app);

    let mut socket = connect(&server).await;
    socket.send_text("not json").await;

    let error: Value = socket.receive_json().await;
    assert_eq!(error["type"], "error");
    assert!(error["message"].as_str().unwrap().starts_with("Malformed message"));

    socket.send_json(&json!({ "type": "ping" })).await;
    let pong: Value = socket.receive_json().await;
    assert_eq!(pong["type"], "pong");
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let app = create_test_app().await;
    let server = test_server(&app);
    let workflow_id = Uuid::new_v4();

    let mut leaving = connect(&server).await;
    let mut staying = connect(&server).await;
    subscribe(&mut leaving, workflow_id).await;
    subscribe(&mut staying, workflow_id).await;

    leaving.send_json(&json!({ "type": "unsubscribe" })).await;
    let reply: Value = leaving.receive_json().await;
    assert_eq!(reply["type"], "unsubscribed");
    assert_eq!(app.broadcaster.subscriber_count(workflow_id).await, 1);

    app.events
        .publish(EngineEvent::new(workflow_id, WorkflowPhase::Running, "applying"))
        .await;

    // Once the remaining subscriber has the event, fan-out is over.
    let status: Value = staying.receive_json().await;
    assert_eq!(status["type"], "status");

    leaving.send_json(&json!({ "type": "ping" })).await;
    let next: Value = leaving.receive_json().await;
    assert_eq!(next["type"], "pong");
}
