use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use ns_api::{create_app, AppState, Config, RegistryBackend};
use ns_orchestrator::db::{create_pool, run_migrations};
use ns_orchestrator::{
    event_channel, run_event_pump, HttpWorkflowEngine, InMemoryEngine, InMemoryRegistry,
    KubeRegistry, NamespaceRegistry, ProvisioningService, StatusBroadcaster, WorkflowEngine,
    WorkflowLedger,
};
use tracing::{info, warn};

const EVENT_BUFFER: usize = 1024;
const SIMULATED_STEP: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = ns_logging::init_subscriber();

    info!("Starting ns-api service...");

    let config = Config::from_env();
    info!(
        "Configuration loaded: bind_addr={}, db_path={}, registry={:?}",
        config.bind_addr,
        config.db_path.display(),
        config.registry_backend()
    );

    let pool = create_pool(&config.db_path).await?;
    info!("Running database migrations...");
    run_migrations(&pool).await?;
    info!("Migrations complete");

    let ledger = WorkflowLedger::new(pool);
    let broadcaster = StatusBroadcaster::new();
    let (events, event_rx) = event_channel(EVENT_BUFFER);
    let policy = config.retry_policy();

    let (registry, memory_registry): (Arc<dyn NamespaceRegistry>, Option<Arc<InMemoryRegistry>>) =
        match config.registry_backend() {
            RegistryBackend::Kube => {
                let registry = KubeRegistry::connect(config.kubeconfig.clone()).await?;
                info!("Using Kubernetes namespace registry");
                (Arc::new(registry), None)
            }
            RegistryBackend::Memory => {
                let registry = Arc::new(InMemoryRegistry::new());
                info!("Using in-memory namespace registry");
                (registry.clone(), Some(registry))
            }
        };

    let engine: Arc<dyn WorkflowEngine> = match (&config.engine_url, memory_registry) {
        (Some(url), _) => {
            let engine =
                HttpWorkflowEngine::new(url, config.engine_token.clone(), policy.call_timeout)?;
            info!("Dispatching workflows to {}", engine.submit_url());
            Arc::new(engine)
        }
        (None, Some(registry)) => {
            info!("Simulating workflows in memory");
            Arc::new(InMemoryEngine::simulated(registry, events.clone(), SIMULATED_STEP))
        }
        (None, None) => {
            warn!("No workflow engine configured; submissions are accepted but never run");
            Arc::new(InMemoryEngine::new())
        }
    };

    tokio::spawn(run_event_pump(event_rx, ledger.clone(), broadcaster.clone()));

    let service = ProvisioningService::new(
        config.manifest_generator(),
        registry,
        engine,
        ledger,
        policy,
    );
    if config.webhook_token.is_none() {
        warn!("NS_API_WEBHOOK_TOKEN not set; engine events posted to the webhook are refused");
    }
    let state = AppState::new(service, broadcaster, events)
        .with_webhook_token(config.webhook_token.clone());
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
