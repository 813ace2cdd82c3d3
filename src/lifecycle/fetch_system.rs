use crate::clients::{FetchClient, MultiFetchClient, OrchestratorClient};
use crate::error::FetchError;
use crate::lifecycle::OrchestratorConfig;
use crate::model::ResourceDescriptor;
use crate::orchestrator;
use crate::transport::{Payload, Transport};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// A running multi-resource orchestrator and its client.
///
/// `FetchSystem` is responsible for:
/// - **Lifecycle Management**: spawning the orchestrator task and stopping it
/// - **Access**: handing out the [`MultiFetchClient`] used to drive it
///
/// # Example
///
/// ```ignore
/// let system = FetchSystem::start(HttpTransport::new(&HttpConfig::default())?, descriptors, config)?;
///
/// let state = system.client.settled().await?;
/// system.client.refetch_index(1).await?;
///
/// // Cancels everything still outstanding, then waits for the task to exit
/// system.shutdown().await?;
/// ```
pub struct FetchSystem<P> {
    /// Client for interacting with the orchestrator
    pub client: MultiFetchClient<P>,

    /// Task handle of the running orchestrator (used for graceful shutdown)
    handle: JoinHandle<()>,
}

impl<P: Payload> FetchSystem<P> {
    /// Spawns an orchestrator over `descriptors`. The first cycle starts immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<T>(
        transport: T,
        descriptors: Vec<ResourceDescriptor>,
        config: OrchestratorConfig,
    ) -> Result<Self, FetchError>
    where
        T: Transport<Payload = P>,
    {
        let (orchestrator, client) = orchestrator::new(transport, descriptors, config)?;
        let handle = tokio::spawn(orchestrator.run());
        Ok(Self { client, handle })
    }

    /// Gracefully shuts down the orchestrator.
    ///
    /// 1. Sends a shutdown command, which cancels every tracked attempt and publishes a final
    ///    closed snapshot
    /// 2. Waits for the orchestrator task to complete
    ///
    /// An orchestrator that already shut down (through another client clone) is not an error.
    pub async fn shutdown(self) -> Result<(), FetchError> {
        stop(&self.client, self.handle).await
    }
}

/// A running single-resource controller and its client.
pub struct SingleFetchSystem<P> {
    pub client: FetchClient<P>,
    handle: JoinHandle<()>,
}

impl<P: Payload> SingleFetchSystem<P> {
    /// Spawns a controller for `descriptor`. The first attempt starts immediately.
    pub fn start<T>(
        transport: T,
        descriptor: ResourceDescriptor,
        config: OrchestratorConfig,
    ) -> Result<Self, FetchError>
    where
        T: Transport<Payload = P>,
    {
        let (controller, client) = orchestrator::single(transport, descriptor, config)?;
        let handle = tokio::spawn(controller.run());
        Ok(Self { client, handle })
    }

    pub async fn shutdown(self) -> Result<(), FetchError> {
        stop(&self.client, self.handle).await
    }
}

async fn stop<P: Payload>(
    client: &impl OrchestratorClient<P>,
    handle: JoinHandle<()>,
) -> Result<(), FetchError> {
    info!("Shutting down fetch system...");

    match client.shutdown().await {
        Ok(()) | Err(FetchError::OrchestratorClosed) | Err(FetchError::OrchestratorDropped) => {}
        Err(e) => return Err(e),
    }

    // If the task panicked, this will return an Err
    if let Err(e) = handle.await {
        error!("Orchestrator task failed: {:?}", e);
        return Err(FetchError::TaskFailed(e.to_string()));
    }

    info!("Fetch system shutdown complete.");
    Ok(())
}
