//! Messages exchanged with the orchestrator task.
//!
//! Commands come from clients and are acknowledged through a oneshot channel once their effect
//! is visible in the published state. Settlements come from attempt tasks and are never
//! acknowledged.

use crate::cancel::CancellationToken;
use crate::error::FetchError;
use crate::generation::{AttemptId, Generation};
use crate::model::{ResourceDescriptor, ResourceKey};
use crate::transport::{FetchSuccess, TransportError};
use tokio::sync::oneshot;

/// Type alias for the one-shot acknowledgement channel used by commands.
pub type Ack<T> = oneshot::Sender<Result<T, FetchError>>;

/// Addresses one slot either by position or by stable key.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotRef {
    Index(usize),
    Key(ResourceKey),
}

#[derive(Debug)]
pub enum Command<P> {
    /// Start a new bulk cycle. Acknowledged with the new generation.
    Refetch { respond_to: Ack<Generation> },
    /// Start one targeted attempt outside the bulk cycle.
    RefetchSlot {
        slot: SlotRef,
        respond_to: Ack<AttemptId>,
    },
    /// Replace the whole data collection.
    SetData {
        values: Vec<Option<P>>,
        respond_to: Ack<()>,
    },
    /// Replace the descriptor list. Acknowledged with whether a new generation started.
    SetDescriptors {
        descriptors: Vec<ResourceDescriptor>,
        respond_to: Ack<bool>,
    },
    /// Replace one slot's reactivity key list. Acknowledged with whether a new generation started.
    SetDeps {
        slot: SlotRef,
        deps: Vec<String>,
        respond_to: Ack<bool>,
    },
    Shutdown { respond_to: Ack<()> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum AttemptKind {
    Bulk(Generation),
    Targeted,
}

/// Report from a finished attempt task.
#[derive(Debug)]
pub(crate) struct Settlement<P> {
    pub key: ResourceKey,
    pub attempt: AttemptId,
    pub kind: AttemptKind,
    pub token: CancellationToken,
    pub result: Result<FetchSuccess<P>, TransportError>,
}
