use crate::client::OrchestratorHandle;
use crate::clients::OrchestratorClient;
use crate::error::FetchError;
use crate::model::{FetchState, ResourceDescriptor};
use crate::orchestrator::SlotRef;
use crate::transport::Payload;
use tracing::instrument;

/// Client for a single-resource controller.
#[derive(Debug, Clone)]
pub struct FetchClient<P> {
    inner: OrchestratorHandle<P>,
}

impl<P: Payload> FetchClient<P> {
    pub fn new(inner: OrchestratorHandle<P>) -> Self {
        Self { inner }
    }

    /// Overwrite `data` without touching the network, `loading`, `error` or the generation.
    #[instrument(skip(self, value))]
    pub async fn set_data(&self, value: Option<P>) -> Result<(), FetchError> {
        self.inner.set_data(vec![value]).await
    }

    /// Replace the reactivity keys. Returns whether a new attempt started.
    #[instrument(skip(self))]
    pub async fn set_deps(&self, deps: Vec<String>) -> Result<bool, FetchError> {
        self.inner.set_deps(SlotRef::Index(0), deps).await
    }

    /// Replace the descriptor. Returns whether a new attempt started.
    ///
    /// The controller's key is kept, so `data` survives a change of target until the next
    /// success overwrites it.
    #[instrument(skip(self, descriptor), fields(target = %descriptor.target))]
    pub async fn set_descriptor(&self, descriptor: ResourceDescriptor) -> Result<bool, FetchError> {
        let descriptor = match self.inner.state().keys.first() {
            Some(key) => descriptor.with_key(key.clone()),
            None => descriptor,
        };
        self.inner.set_descriptors(vec![descriptor]).await
    }

    pub fn state(&self) -> FetchState<P> {
        FetchState::from_multi(&self.inner.state())
    }

    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&FetchState<P>) -> bool,
    ) -> Result<FetchState<P>, FetchError> {
        let state = self
            .inner
            .wait_for(|state| predicate(&FetchState::from_multi(state)))
            .await?;
        Ok(FetchState::from_multi(&state))
    }

    /// Wait until the current attempt has settled.
    pub async fn settled(&self) -> Result<FetchState<P>, FetchError> {
        let state = self.inner.settled().await?;
        Ok(FetchState::from_multi(&state))
    }
}

impl<P: Payload> OrchestratorClient<P> for FetchClient<P> {
    fn inner(&self) -> &OrchestratorHandle<P> {
        &self.inner
    }
}
