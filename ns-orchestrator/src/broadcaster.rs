use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::workflow::{EngineEvent, WorkflowId};

pub type ConnectionId = Uuid;

#[derive(Default)]
struct Subscriptions {
    senders: HashMap<ConnectionId, mpsc::UnboundedSender<EngineEvent>>,
    by_workflow: HashMap<WorkflowId, HashSet<ConnectionId>>,
    by_connection: HashMap<ConnectionId, WorkflowId>,
}

impl Subscriptions {
    fn detach(&mut self, connection_id: ConnectionId) -> Option<WorkflowId> {
        let workflow_id = self.by_connection.remove(&connection_id)?;
        if let Some(watchers) = self.by_workflow.get_mut(&workflow_id) {
            watchers.remove(&connection_id);
            if watchers.is_empty() {
                self.by_workflow.remove(&workflow_id);
            }
        }
        Some(workflow_id)
    }
}

/// Relays engine events to the live connections watching each workflow.
///
/// A connection watches at most one workflow. Delivery is best-effort and
/// nothing is buffered for connections that subscribe later.
#[derive(Clone, Default)]
pub struct StatusBroadcaster {
    inner: Arc<RwLock<Subscriptions>>,
}

impl StatusBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live connection and get the stream of events routed to it.
    pub async fn register(&self, connection_id: ConnectionId) -> mpsc::UnboundedReceiver<EngineEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subs = self.inner.write().await;
        subs.detach(connection_id);
        subs.senders.insert(connection_id, tx);
        rx
    }

    /// Point a connection at `workflow_id`, returning the workflow it was
    /// watching before, if any.
    pub async fn subscribe(
        &self,
        connection_id: ConnectionId,
        workflow_id: WorkflowId,
    ) -> Option<WorkflowId> {
        let mut subs = self.inner.write().await;
        let previous = subs.detach(connection_id);
        subs.by_connection.insert(connection_id, workflow_id);
        subs.by_workflow
            .entry(workflow_id)
            .or_default()
            .insert(connection_id);

        debug!(%connection_id, %workflow_id, ?previous, "Subscribed");
        previous
    }

    pub async fn unsubscribe(&self, connection_id: ConnectionId) -> Option<WorkflowId> {
        let removed = self.inner.write().await.detach(connection_id);
        debug!(%connection_id, ?removed, "Unsubscribed");
        removed
    }

    /// Forget a connection entirely.
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let mut subs = self.inner.write().await;
        subs.detach(connection_id);
        subs.senders.remove(&connection_id);
    }

    /// Fan an event out to every connection watching its workflow. Returns
    /// how many connections it reached.
    pub async fn on_engine_event(&self, event: &EngineEvent) -> usize {
        let mut dead = Vec::new();
        let mut delivered = 0;
        {
            let subs = self.inner.read().await;
            let Some(watchers) = subs.by_workflow.get(&event.workflow_id) else {
                trace!(workflow_id = %event.workflow_id, "No subscribers for event");
                return 0;
            };

            for connection_id in watchers {
                match subs.senders.get(connection_id) {
                    Some(tx) if tx.send(event.clone()).is_ok() => delivered += 1,
                    _ => dead.push(*connection_id),
                }
            }
        }

        if !dead.is_empty() {
            let mut subs = self.inner.write().await;
            for connection_id in dead {
                subs.detach(connection_id);
                subs.senders.remove(&connection_id);
            }
        }

        delivered
    }

    pub async fn subscriber_count(&self, workflow_id: WorkflowId) -> usize {
        self.inner
            .read()
            .await
            .by_workflow
            .get(&workflow_id)
            .map_or(0, HashSet::len)
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.senders.len()
    }
}
