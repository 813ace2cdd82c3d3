//! # Fetch Orchestrator Demo
//!
//! Fetches every URL given on the command line concurrently, logs how each one settled, then
//! refetches the first one on its own and shuts down.
//!
//! ```bash
//! RUST_LOG=info cargo run -- https://httpbin.org/json https://httpbin.org/status/503
//! ```

use fetch_orchestrator::clients::OrchestratorClient;
use fetch_orchestrator::lifecycle::{
    setup_tracing, FetchSystem, HttpConfig, LoadingPolicy, OrchestratorConfig,
};
use fetch_orchestrator::model::{MultiFetchState, ResourceDescriptor};
use fetch_orchestrator::transport::HttpTransport;
use serde_json::Value;
use tracing::{info, warn, Instrument};

const DEFAULT_TARGETS: [&str; 3] = [
    "https://httpbin.org/json",
    "https://httpbin.org/uuid",
    "https://httpbin.org/status/503",
];

fn report(state: &MultiFetchState<Value>) {
    for index in 0..state.len() {
        let Some(slot) = state.slot(index) else {
            continue;
        };
        let status = slot.response.and_then(|response| response.status);
        match (slot.data, slot.error) {
            (_, Some(error)) => warn!(key = %slot.key, ?status, error, "Resource failed"),
            (Some(data), None) => {
                info!(key = %slot.key, ?status, bytes = data.to_string().len(), "Resource loaded")
            }
            (None, None) => info!(key = %slot.key, "Resource empty"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    // Setup tracing once for the entire application
    setup_tracing();

    let mut targets: Vec<String> = std::env::args().skip(1).collect();
    if targets.is_empty() {
        targets = DEFAULT_TARGETS.iter().map(|target| target.to_string()).collect();
    }
    info!(count = targets.len(), "Starting fetch demo");

    let transport = HttpTransport::new(&HttpConfig::default()).map_err(|e| e.to_string())?;
    let descriptors = targets.into_iter().map(ResourceDescriptor::new).collect();
    let config = OrchestratorConfig::default().with_loading_policy(LoadingPolicy::UntilSettled);
    let system = FetchSystem::start(transport, descriptors, config).map_err(|e| e.to_string())?;

    let span = tracing::info_span!("initial_cycle");
    let state = async {
        info!("Waiting for every resource to settle");
        system.client.settled().await.map_err(|e| e.to_string())
    }
    .instrument(span)
    .await?;
    report(&state);
    info!(
        loaded = state.data_count(),
        failed = state.error_count(),
        "Initial cycle complete"
    );

    let span = tracing::info_span!("targeted_refetch");
    let state = async {
        let attempt = system
            .client
            .refetch_index(0)
            .await
            .map_err(|e| e.to_string())?;
        info!(%attempt, "Refetching first resource");
        system.client.settled().await.map_err(|e| e.to_string())
    }
    .instrument(span)
    .await?;
    report(&state);

    let generation = system.client.refetch().await.map_err(|e| e.to_string())?;
    info!(%generation, "Bulk refetch issued, shutting down without waiting");

    system.shutdown().await.map_err(|e| e.to_string())?;
    Ok(())
}
