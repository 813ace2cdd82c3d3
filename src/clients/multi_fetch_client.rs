use crate::client::OrchestratorHandle;
use crate::clients::OrchestratorClient;
use crate::error::FetchError;
use crate::generation::AttemptId;
use crate::model::{MultiFetchState, ResourceDescriptor, ResourceKey};
use crate::orchestrator::SlotRef;
use crate::transport::Payload;
use tracing::{debug, instrument, Span};

/// Client for a multi-resource orchestrator.
///
/// Cheap to clone; every clone talks to the same orchestrator task.
#[derive(Debug, Clone)]
pub struct MultiFetchClient<P> {
    inner: OrchestratorHandle<P>,
}

impl<P: Payload> MultiFetchClient<P> {
    pub fn new(inner: OrchestratorHandle<P>) -> Self {
        Self { inner }
    }

    /// Refetch one slot by position, outside the bulk cycle.
    ///
    /// Under the default `TargetedRefetch::Untracked` mode this attempt races any bulk refetch
    /// issued meanwhile, and whichever settles last wins.
    #[instrument(skip(self))]
    pub async fn refetch_index(&self, index: usize) -> Result<AttemptId, FetchError> {
        debug!("Sending request");
        self.inner.refetch_index(index).await
    }

    /// Refetch one slot by key, outside the bulk cycle.
    #[instrument(skip(self, key), fields(key = tracing::field::Empty))]
    pub async fn refetch_key(&self, key: impl Into<ResourceKey>) -> Result<AttemptId, FetchError> {
        let key = key.into();
        Span::current().record("key", tracing::field::display(&key));
        self.inner.refetch_key(key).await
    }

    /// Replace every slot's data at once. `values` must have one entry per slot.
    #[instrument(skip(self, values), fields(len = values.len()))]
    pub async fn set_data(&self, values: Vec<Option<P>>) -> Result<(), FetchError> {
        self.inner.set_data(values).await
    }

    /// Replace the descriptor list. Returns whether a new generation started.
    #[instrument(skip(self, descriptors), fields(count = descriptors.len()))]
    pub async fn set_descriptors(
        &self,
        descriptors: Vec<ResourceDescriptor>,
    ) -> Result<bool, FetchError> {
        debug!(?descriptors, "set_descriptors called");
        self.inner.set_descriptors(descriptors).await
    }

    /// Replace one slot's reactivity keys. Returns whether a new generation started.
    #[instrument(skip(self))]
    pub async fn set_deps(&self, slot: SlotRef, deps: Vec<String>) -> Result<bool, FetchError> {
        self.inner.set_deps(slot, deps).await
    }

    pub fn state(&self) -> MultiFetchState<P> {
        self.inner.state()
    }

    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&MultiFetchState<P>) -> bool,
    ) -> Result<MultiFetchState<P>, FetchError> {
        self.inner.wait_for(predicate).await
    }

    /// Wait until nothing is in flight.
    pub async fn settled(&self) -> Result<MultiFetchState<P>, FetchError> {
        self.inner.settled().await
    }
}

impl<P: Payload> OrchestratorClient<P> for MultiFetchClient<P> {
    fn inner(&self) -> &OrchestratorHandle<P> {
        &self.inner
    }
}
