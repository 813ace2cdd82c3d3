use crate::client::OrchestratorHandle;
use crate::error::FetchError;
use crate::generation::Generation;
use crate::model::MultiFetchState;
use crate::transport::Payload;
use async_trait::async_trait;
use tokio::sync::watch;

/// Operations shared by every orchestrator client.
///
/// Implementors only provide [`inner`](OrchestratorClient::inner); refetching, shutdown and
/// state subscription come for free.
#[async_trait]
pub trait OrchestratorClient<P: Payload>: Send + Sync {
    /// Access the underlying handle.
    fn inner(&self) -> &OrchestratorHandle<P>;

    /// Start a new generation, cancelling everything the previous one left outstanding.
    #[tracing::instrument(skip(self))]
    async fn refetch(&self) -> Result<Generation, FetchError> {
        tracing::debug!("Sending request");
        self.inner().refetch().await
    }

    /// Tear the orchestrator down. Later requests fail with `OrchestratorClosed`.
    #[tracing::instrument(skip(self))]
    async fn shutdown(&self) -> Result<(), FetchError> {
        tracing::debug!("Sending request");
        self.inner().shutdown().await
    }

    fn subscribe(&self) -> watch::Receiver<MultiFetchState<P>> {
        self.inner().subscribe()
    }
}
