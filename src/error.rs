//! # Orchestrator Errors
//!
//! Errors returned by the orchestrator clients. Fetch failures are *not* errors at this level:
//! they are recorded per slot and observed through the published state. A `FetchError` only
//! means a request to the orchestrator itself could not be honoured.

use crate::model::ResourceKey;

/// Errors that can occur when talking to an orchestrator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("Orchestrator closed")]
    OrchestratorClosed,
    #[error("Orchestrator dropped response channel")]
    OrchestratorDropped,
    #[error("Slot index {index} out of range for {len} resources")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Unknown resource key: {0}")]
    UnknownKey(ResourceKey),
    #[error("Duplicate resource key: {0}")]
    DuplicateKey(ResourceKey),
    #[error("Expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("Transport setup failed: {0}")]
    TransportSetup(String),
    #[error("Orchestrator task failed: {0}")]
    TaskFailed(String),
}
