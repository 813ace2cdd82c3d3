//! # Orchestrator Handle
//!
//! The untyped client half of an orchestrator: a command sender plus a receiver for published
//! state. [`MultiFetchClient`](crate::clients::MultiFetchClient) and
//! [`FetchClient`](crate::clients::FetchClient) wrap it with resource-shaped APIs.
//!
//! Every command is a request/response pair over a oneshot channel. The orchestrator publishes
//! the resulting state *before* it acknowledges, so once a method returns `Ok`,
//! [`OrchestratorHandle::state`] already reflects the change.

use crate::error::FetchError;
use crate::generation::{AttemptId, Generation};
use crate::model::{MultiFetchState, ResourceDescriptor, ResourceKey};
use crate::orchestrator::{Ack, Command, SlotRef};
use crate::transport::Payload;
use tokio::sync::{mpsc, oneshot, watch};

/// Cloneable handle for talking to an orchestrator task.
#[derive(Debug)]
pub struct OrchestratorHandle<P> {
    sender: mpsc::Sender<Command<P>>,
    state: watch::Receiver<MultiFetchState<P>>,
}

impl<P> Clone for OrchestratorHandle<P> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            state: self.state.clone(),
        }
    }
}

impl<P: Payload> OrchestratorHandle<P> {
    pub fn new(
        sender: mpsc::Sender<Command<P>>,
        state: watch::Receiver<MultiFetchState<P>>,
    ) -> Self {
        Self { sender, state }
    }

    async fn request<R>(
        &self,
        command: impl FnOnce(Ack<R>) -> Command<P>,
    ) -> Result<R, FetchError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(command(respond_to))
            .await
            .map_err(|_| FetchError::OrchestratorClosed)?;
        response.await.map_err(|_| FetchError::OrchestratorDropped)?
    }

    /// Starts a new generation and returns it.
    pub async fn refetch(&self) -> Result<Generation, FetchError> {
        self.request(|respond_to| Command::Refetch { respond_to })
            .await
    }

    pub async fn refetch_slot(&self, slot: SlotRef) -> Result<AttemptId, FetchError> {
        self.request(|respond_to| Command::RefetchSlot { slot, respond_to })
            .await
    }

    pub async fn refetch_index(&self, index: usize) -> Result<AttemptId, FetchError> {
        self.refetch_slot(SlotRef::Index(index)).await
    }

    pub async fn refetch_key(&self, key: impl Into<ResourceKey>) -> Result<AttemptId, FetchError> {
        self.refetch_slot(SlotRef::Key(key.into())).await
    }

    pub async fn set_data(&self, values: Vec<Option<P>>) -> Result<(), FetchError> {
        self.request(|respond_to| Command::SetData { values, respond_to })
            .await
    }

    /// Returns whether the change started a new generation.
    pub async fn set_descriptors(
        &self,
        descriptors: Vec<ResourceDescriptor>,
    ) -> Result<bool, FetchError> {
        self.request(|respond_to| Command::SetDescriptors {
            descriptors,
            respond_to,
        })
        .await
    }

    /// Returns whether the change started a new generation.
    pub async fn set_deps(&self, slot: SlotRef, deps: Vec<String>) -> Result<bool, FetchError> {
        self.request(|respond_to| Command::SetDeps {
            slot,
            deps,
            respond_to,
        })
        .await
    }

    pub async fn shutdown(&self) -> Result<(), FetchError> {
        self.request(|respond_to| Command::Shutdown { respond_to })
            .await
    }

    /// Latest published snapshot.
    pub fn state(&self) -> MultiFetchState<P> {
        self.state.borrow().clone()
    }

    /// A fresh receiver that is notified on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<MultiFetchState<P>> {
        self.state.clone()
    }

    /// Waits until a published snapshot satisfies `predicate` and returns it.
    ///
    /// The current snapshot is checked first. If the orchestrator goes away while waiting, the
    /// final snapshot is still checked before giving up.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&MultiFetchState<P>) -> bool,
    ) -> Result<MultiFetchState<P>, FetchError> {
        let mut receiver = self.state.clone();
        let reached = receiver
            .wait_for(|state| predicate(state))
            .await
            .map(|state| state.clone());
        match reached {
            Ok(state) => Ok(state),
            Err(_) => {
                let last = self.state.borrow().clone();
                if predicate(&last) {
                    Ok(last)
                } else {
                    Err(FetchError::OrchestratorDropped)
                }
            }
        }
    }

    /// Waits until nothing is in flight (or the orchestrator has closed).
    pub async fn settled(&self) -> Result<MultiFetchState<P>, FetchError> {
        self.wait_for(MultiFetchState::is_settled).await
    }
}
