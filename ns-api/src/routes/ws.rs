//! Live workflow status over WebSocket.
//!
//! Each connection watches at most one workflow at a time. Subscribing to a
//! workflow that already finished replays its final status once.

use std::collections::HashSet;

use crate::{auth::AuthenticatedUser, state::AppState};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Extension, Router,
};
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use ns_orchestrator::{ConnectionId, EngineEvent, StatusBroadcaster, WorkflowId, WorkflowLedger, WorkflowPhase};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/v1/ws", get(websocket_handler))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Subscribe {
        #[serde(rename = "workflowId")]
        workflow_id: WorkflowId,
    },
    Unsubscribe,
    Ping,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Subscribed { workflow_id: WorkflowId },
    Unsubscribed,
    #[serde(rename_all = "camelCase")]
    Status {
        workflow_id: WorkflowId,
        phase: WorkflowPhase,
        message: String,
        timestamp: DateTime<Utc>,
    },
    Pong,
    Error { message: String },
}

impl From<EngineEvent> for ServerMessage {
    fn from(event: EngineEvent) -> Self {
        ServerMessage::Status {
            workflow_id: event.workflow_id,
            phase: event.phase,
            message: event.message,
            timestamp: event.timestamp,
        }
    }
}

/// Passes at most one terminal status per workflow per subscription, and
/// nothing for that workflow after it. Both the live event and the ledger
/// replay reach a client that subscribes while the workflow finishes.
#[derive(Debug, Default)]
pub struct TerminalFilter {
    finished: HashSet<WorkflowId>,
}

impl TerminalFilter {
    pub fn admit(&mut self, message: &ServerMessage) -> bool {
        match message {
            ServerMessage::Subscribed { workflow_id } => {
                self.finished.remove(workflow_id);
                true
            }
            ServerMessage::Status {
                workflow_id, phase, ..
            } => {
                if self.finished.contains(workflow_id) {
                    return false;
                }
                if phase.is_terminal() {
                    self.finished.insert(*workflow_id);
                }
                true
            }
            _ => true,
        }
    }
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user))
}

async fn handle_socket(socket: WebSocket, state: AppState, user: AuthenticatedUser) {
    let connection_id = Uuid::new_v4();
    info!(%connection_id, user = %user.username, "Status connection opened");

    let (mut sender, mut receiver) = socket.split();
    let mut events = state.broadcaster.register(connection_id).await;
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ServerMessage>();

    let mut send_task = tokio::spawn(async move {
        let mut filter = TerminalFilter::default();
        loop {
            // Replies first, so an acknowledgement always precedes the
            // events it enables.
            let message = tokio::select! {
                biased;
                Some(reply) = reply_rx.recv() => reply,
                Some(event) = events.recv() => ServerMessage::from(event),
                else => break,
            };
            if !filter.admit(&message) {
                debug!(%connection_id, "Dropping repeated terminal status");
                continue;
            }

            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Failed to encode status message");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let broadcaster = state.broadcaster.clone();
    let ledger = state.ledger().clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_client_message(
                        text.as_str(),
                        connection_id,
                        &broadcaster,
                        &ledger,
                        &reply_tx,
                    )
                    .await;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.broadcaster.disconnect(connection_id).await;
    info!(%connection_id, "Status connection closed");
}

/// Apply one client frame, queueing replies on `reply`.
///
/// A subscribe is acknowledged before the subscription is registered, so the
/// acknowledgement precedes every event for that workflow. The terminal
/// replay, if any, follows it.
pub async fn handle_client_message(
    text: &str,
    connection_id: ConnectionId,
    broadcaster: &StatusBroadcaster,
    ledger: &WorkflowLedger,
    reply: &mpsc::UnboundedSender<ServerMessage>,
) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            let _ = reply.send(ServerMessage::Error {
                message: format!("Malformed message: {}", e),
            });
            return;
        }
    };

    match message {
        ClientMessage::Subscribe { workflow_id } => {
            let _ = reply.send(ServerMessage::Subscribed { workflow_id });
            broadcaster.subscribe(connection_id, workflow_id).await;

            match ledger.terminal_event(workflow_id).await {
                Ok(Some(event)) => {
                    debug!(%connection_id, %workflow_id, "Replaying terminal status");
                    let _ = reply.send(event.into());
                }
                Ok(None) => {}
                Err(e) => warn!(%workflow_id, error = %e, "Failed to read workflow ledger"),
            }
        }
        ClientMessage::Unsubscribe => {
            broadcaster.unsubscribe(connection_id).await;
            let _ = reply.send(ServerMessage::Unsubscribed);
        }
        ClientMessage::Ping => {
            let _ = reply.send(ServerMessage::Pong);
        }
    }
}
