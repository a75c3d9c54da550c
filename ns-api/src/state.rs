use std::sync::Arc;

use ns_orchestrator::{EventSink, ProvisioningService, StatusBroadcaster, WorkflowLedger};

#[derive(Clone)]
pub struct AppState {
    pub service: ProvisioningService,
    pub broadcaster: StatusBroadcaster,
    /// Engine events posted to the webhook enter the pump here
    pub events: EventSink,
    /// Bearer token the engine presents on the webhook; unset refuses it
    pub webhook_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(service: ProvisioningService, broadcaster: StatusBroadcaster, events: EventSink) -> Self {
        Self {
            service,
            broadcaster,
            events,
            webhook_token: None,
        }
    }

    pub fn with_webhook_token(mut self, token: Option<String>) -> Self {
        self.webhook_token = token.map(Arc::from);
        self
    }

    pub fn ledger(&self) -> &WorkflowLedger {
        self.service.ledger()
    }
}
