//! # Transport Collaborator
//!
//! The orchestrator never performs network I/O itself. Every attempt calls a [`Transport`],
//! which turns a [`FetchRequest`] into either a [`FetchSuccess`] or a [`TransportError`].
//!
//! Implementations must honour the supplied [`CancellationToken`] on a best-effort basis and
//! must report cancellation as [`TransportError::Cancelled`] rather than as a failure, so the
//! orchestrator can swallow it.
//!
//! - [`HttpTransport`] – the production implementation on top of `reqwest`.
//! - [`crate::mock`] – scripted and channel-driven transports for tests.

pub mod http;

pub use http::HttpTransport;

use crate::cancel::CancellationToken;
use crate::model::{RequestParams, ResourceKey};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::time::Duration;

/// Bounds every payload type must satisfy to flow through an orchestrator.
pub trait Payload: Clone + Debug + Send + Sync + 'static {}

impl<T: Clone + Debug + Send + Sync + 'static> Payload for T {}

/// One request, built from a descriptor when an attempt starts.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub key: ResourceKey,
    pub target: String,
    pub params: RequestParams,
}

/// Raw metadata of an exchange, successful or not.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub target: String,
    pub status: Option<u16>,
    pub elapsed: Duration,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchSuccess<P> {
    pub payload: P,
    pub meta: ResponseMeta,
}

/// Outcome of a transport call that did not succeed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// The attempt was cancelled. Never surfaced to callers.
    #[error("Request cancelled")]
    Cancelled,
    /// The exchange failed. `message` is `None` when the transport has nothing readable to say;
    /// the orchestrator then substitutes its configured fallback message.
    #[error("{}", .message.as_deref().unwrap_or("Request failed"))]
    Failed {
        message: Option<String>,
        meta: Option<ResponseMeta>,
    },
}

impl TransportError {
    pub fn failed(message: impl Into<String>) -> Self {
        TransportError::Failed {
            message: Some(message.into()),
            meta: None,
        }
    }

    pub fn failed_with(message: impl Into<String>, meta: ResponseMeta) -> Self {
        TransportError::Failed {
            message: Some(message.into()),
            meta: Some(meta),
        }
    }
}

/// The request function the orchestrator calls once per attempt.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Payload: Payload;

    async fn fetch(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<FetchSuccess<Self::Payload>, TransportError>;
}
