//! # Orchestrator
//!
//! The orchestrator task and the factories that pair it with a typed client.
//!
//! ```rust,ignore
//! let (orchestrator, client) = orchestrator::new(transport, descriptors, config)?;
//! let handle = tokio::spawn(orchestrator.run());
//! client.refetch().await?;
//! ```
//!
//! The task is returned unspawned so callers decide where it runs;
//! [`FetchSystem`](crate::lifecycle::FetchSystem) does the spawning and shutdown for you.

pub mod actor;
pub mod message;
pub(crate) mod slot;

pub use actor::FetchOrchestrator;
pub use message::{Ack, Command, SlotRef};

use crate::clients::{FetchClient, MultiFetchClient};
use crate::error::FetchError;
use crate::lifecycle::{LoadingPolicy, OrchestratorConfig};
use crate::model::ResourceDescriptor;
use crate::transport::Transport;

/// Creates a multi-resource orchestrator over `descriptors`.
pub fn new<T: Transport>(
    transport: T,
    descriptors: Vec<ResourceDescriptor>,
    config: OrchestratorConfig,
) -> Result<(FetchOrchestrator<T>, MultiFetchClient<T::Payload>), FetchError> {
    let (orchestrator, handle) = FetchOrchestrator::new(transport, descriptors, config)?;
    Ok((orchestrator, MultiFetchClient::new(handle)))
}

/// Creates a single-resource controller.
///
/// The controller is an orchestrator with exactly one slot. Its loading flag always clears
/// when an attempt settles, whatever `config.loading_policy` says.
pub fn single<T: Transport>(
    transport: T,
    descriptor: ResourceDescriptor,
    config: OrchestratorConfig,
) -> Result<(FetchOrchestrator<T>, FetchClient<T::Payload>), FetchError> {
    let config = config.with_loading_policy(LoadingPolicy::UntilSettled);
    let (orchestrator, handle) = FetchOrchestrator::new(transport, vec![descriptor], config)?;
    Ok((orchestrator, FetchClient::new(handle)))
}
