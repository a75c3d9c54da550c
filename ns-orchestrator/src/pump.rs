//! Single consumer that applies engine events to the ledger and then relays
//! them to subscribers, preserving the order they were published in.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::broadcaster::StatusBroadcaster;
use crate::ledger::WorkflowLedger;
use crate::workflow::EngineEvent;

/// Entry point for engine events, shared by the webhook route and the
/// in-memory engine.
#[derive(Clone, Debug)]
pub struct EventSink {
    tx: mpsc::Sender<EngineEvent>,
}

impl EventSink {
    /// Queue an event. Returns false once the pump has stopped.
    pub async fn publish(&self, event: EngineEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }
}

pub fn event_channel(capacity: usize) -> (EventSink, mpsc::Receiver<EngineEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSink { tx }, rx)
}

/// Drain events until every [`EventSink`] is dropped.
pub async fn run_event_pump(
    mut rx: mpsc::Receiver<EngineEvent>,
    ledger: WorkflowLedger,
    broadcaster: StatusBroadcaster,
) {
    info!("Event pump started");

    while let Some(event) = rx.recv().await {
        if let Err(e) = ledger.update_phase(&event).await {
            warn!(workflow_id = %event.workflow_id, error = %e, "Failed to record workflow phase");
        }

        let delivered = broadcaster.on_engine_event(&event).await;
        debug!(
            workflow_id = %event.workflow_id,
            phase = ?event.phase,
            delivered,
            "Relayed engine event"
        );
    }

    info!("Event pump stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_db;
    use crate::workflow::{WorkflowHandle, WorkflowKind, WorkflowPhase};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_pump_updates_ledger_then_broadcasts() {
        let ledger = WorkflowLedger::new(create_test_db().await);
        let broadcaster = StatusBroadcaster::new();
        let (sink, rx) = event_channel(16);

        let handle = WorkflowHandle::new(Uuid::new_v4(), WorkflowKind::Create, "team-a");
        ledger.record(&handle).await.unwrap();

        let conn = Uuid::new_v4();
        let mut events = broadcaster.register(conn).await;
        broadcaster.subscribe(conn, handle.workflow_id).await;

        let pump = tokio::spawn(run_event_pump(rx, ledger.clone(), broadcaster.clone()));

        assert!(sink.publish(EngineEvent::new(handle.workflow_id, WorkflowPhase::Running, "")).await);
        assert!(sink.publish(EngineEvent::new(handle.workflow_id, WorkflowPhase::Succeeded, "done")).await);
        drop(sink);
        pump.await.unwrap();

        assert_eq!(events.recv().await.unwrap().phase, WorkflowPhase::Running);
        assert_eq!(events.recv().await.unwrap().phase, WorkflowPhase::Succeeded);

        let status = ledger.get(handle.workflow_id).await.unwrap();
        assert_eq!(status.phase, WorkflowPhase::Succeeded);
        assert_eq!(status.message.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn test_pump_relays_events_for_unrecorded_workflows() {
        let ledger = WorkflowLedger::new(create_test_db().await);
        let broadcaster = StatusBroadcaster::new();
        let (sink, rx) = event_channel(4);

        let workflow = Uuid::new_v4();
        let conn = Uuid::new_v4();
        let mut events = broadcaster.register(conn).await;
        broadcaster.subscribe(conn, workflow).await;

        let pump = tokio::spawn(run_event_pump(rx, ledger, broadcaster));
        sink.publish(EngineEvent::new(workflow, WorkflowPhase::Running, "")).await;
        drop(sink);
        pump.await.unwrap();

        assert_eq!(events.recv().await.unwrap().workflow_id, workflow);
    }
}
