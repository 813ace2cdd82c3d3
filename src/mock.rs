//! # Mock Transports
//!
//! Utilities for driving an orchestrator in tests without a network.
//!
//! Two styles are available:
//!
//! - [`MockTransport`] with a fluent expectation API: script what each target answers up front,
//!   optionally after a delay, or [`hold`](ExpectationBuilder::hold) the answer and release it
//!   later from the test.
//! - [`create_mock_transport`] hands every call to the test over a channel, so the test decides
//!   when and how each attempt settles. Use [`expect_call`] to pull the next one.

use crate::cancel::CancellationToken;
use crate::transport::{FetchRequest, FetchSuccess, Payload, ResponseMeta, Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

type FetchResult<P> = Result<FetchSuccess<P>, TransportError>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn success<P>(target: &str, payload: P) -> FetchResult<P> {
    Ok(FetchSuccess {
        payload,
        meta: ResponseMeta {
            target: target.to_string(),
            status: Some(200),
            ..ResponseMeta::default()
        },
    })
}

// =============================================================================
// EXPECTATION BUILDER API
// =============================================================================

enum Response<P> {
    Ready(FetchResult<P>),
    Held(oneshot::Receiver<FetchResult<P>>),
}

struct Expectation<P> {
    target: String,
    delay: Duration,
    response: Response<P>,
}

#[derive(Debug, Clone)]
struct RecordedCall {
    request: FetchRequest,
    cancel: CancellationToken,
}

/// A scripted transport.
///
/// Each call consumes the first queued expectation for its target. Calls with no matching
/// expectation fail with `Unexpected request to <target>`. Clones share expectations and call
/// history, so keep one in the test after handing another to the orchestrator.
///
/// # Example
/// ```ignore
/// let mock = MockTransport::<u32>::new();
/// mock.expect("/a").return_ok(1);
/// mock.expect("/b").after(Duration::from_millis(20)).return_err("timeout");
/// let pending = mock.expect("/c").hold();
///
/// let system = FetchSystem::start(mock.clone(), descriptors, config)?;
/// pending.succeed(3);
/// mock.verify(); // Ensures all expectations were consumed
/// ```
pub struct MockTransport<P> {
    expectations: Arc<Mutex<VecDeque<Expectation<P>>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl<P> Clone for MockTransport<P> {
    fn clone(&self) -> Self {
        Self {
            expectations: Arc::clone(&self.expectations),
            calls: Arc::clone(&self.calls),
        }
    }
}

impl<P: Payload> Default for MockTransport<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Payload> MockTransport<P> {
    pub fn new() -> Self {
        Self {
            expectations: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Expects one call for `target`.
    pub fn expect(&self, target: impl Into<String>) -> ExpectationBuilder<P> {
        ExpectationBuilder {
            target: target.into(),
            delay: Duration::ZERO,
            expectations: Arc::clone(&self.expectations),
        }
    }

    /// Every request seen so far, in call order.
    pub fn calls(&self) -> Vec<FetchRequest> {
        lock(&self.calls)
            .iter()
            .map(|call| call.request.clone())
            .collect()
    }

    pub fn call_count(&self, target: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| call.request.target == target)
            .count()
    }

    /// Calls for `target` whose cancellation token has fired.
    pub fn cancelled_calls(&self, target: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| call.request.target == target && call.cancel.is_cancelled())
            .count()
    }

    /// Verifies that all expectations were consumed.
    pub fn verify(&self) {
        let exps = lock(&self.expectations);
        if !exps.is_empty() {
            let remaining: Vec<&str> = exps.iter().map(|e| e.target.as_str()).collect();
            panic!(
                "Not all expectations were met. {} remaining: {:?}",
                exps.len(),
                remaining
            );
        }
    }

    fn take(&self, target: &str) -> Option<Expectation<P>> {
        let mut exps = lock(&self.expectations);
        let index = exps.iter().position(|e| e.target == target)?;
        exps.remove(index)
    }
}

#[async_trait]
impl<P: Payload> Transport for MockTransport<P> {
    type Payload = P;

    async fn fetch(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<FetchSuccess<P>, TransportError> {
        lock(&self.calls).push(RecordedCall {
            request: request.clone(),
            cancel: cancel.clone(),
        });

        let Some(expectation) = self.take(&request.target) else {
            return Err(TransportError::failed(format!(
                "Unexpected request to {}",
                request.target
            )));
        };

        let respond = async move {
            if !expectation.delay.is_zero() {
                tokio::time::sleep(expectation.delay).await;
            }
            match expectation.response {
                Response::Ready(result) => result,
                Response::Held(receiver) => receiver
                    .await
                    .unwrap_or_else(|_| Err(TransportError::failed("Held response dropped"))),
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = respond => result,
        }
    }
}

/// Builder for one expectation.
pub struct ExpectationBuilder<P> {
    target: String,
    delay: Duration,
    expectations: Arc<Mutex<VecDeque<Expectation<P>>>>,
}

impl<P: Payload> ExpectationBuilder<P> {
    /// Delays the response.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn return_ok(self, payload: P) {
        let result = success(&self.target, payload);
        self.push(Response::Ready(result));
    }

    pub fn return_err(self, message: impl Into<String>) {
        self.push(Response::Ready(Err(TransportError::failed(message))));
    }

    /// Fails without a message, leaving the orchestrator to pick its fallback.
    pub fn return_err_without_message(self) {
        self.push(Response::Ready(Err(TransportError::Failed {
            message: None,
            meta: None,
        })));
    }

    /// Reports cancellation even though nobody fired the token.
    pub fn return_cancelled(self) {
        self.push(Response::Ready(Err(TransportError::Cancelled)));
    }

    /// Keeps the call pending until the returned handle is resolved.
    pub fn hold(self) -> PendingResponse<P> {
        let (sender, receiver) = oneshot::channel();
        let target = self.target.clone();
        self.push(Response::Held(receiver));
        PendingResponse { target, sender }
    }

    fn push(self, response: Response<P>) {
        lock(&self.expectations).push_back(Expectation {
            target: self.target,
            delay: self.delay,
            response,
        });
    }
}

/// Answer for a held expectation.
pub struct PendingResponse<P> {
    target: String,
    sender: oneshot::Sender<FetchResult<P>>,
}

impl<P: Payload> PendingResponse<P> {
    pub fn succeed(self, payload: P) {
        let _ = self.sender.send(success(&self.target, payload));
    }

    pub fn fail(self, message: impl Into<String>) {
        let _ = self.sender.send(Err(TransportError::failed(message)));
    }
}

// =============================================================================
// CHANNEL HELPERS
// =============================================================================

/// A transport that hands every call to the test.
pub struct ChannelTransport<P> {
    sender: mpsc::Sender<MockCall<P>>,
}

/// One call received by a [`ChannelTransport`].
#[derive(Debug)]
pub struct MockCall<P> {
    pub request: FetchRequest,
    cancel: CancellationToken,
    respond_to: oneshot::Sender<FetchResult<P>>,
}

impl<P: Payload> MockCall<P> {
    pub fn target(&self) -> &str {
        &self.request.target
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A clone of the attempt's token, for waiting on cancellation.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn respond(self, result: Result<FetchSuccess<P>, TransportError>) {
        let _ = self.respond_to.send(result);
    }

    pub fn succeed(self, payload: P) {
        let result = success(&self.request.target, payload);
        self.respond(result);
    }

    pub fn fail(self, message: impl Into<String>) {
        self.respond(Err(TransportError::failed(message)));
    }
}

#[async_trait]
impl<P: Payload> Transport for ChannelTransport<P> {
    type Payload = P;

    async fn fetch(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<FetchSuccess<P>, TransportError> {
        let (respond_to, response) = oneshot::channel();
        let call = MockCall {
            request: request.clone(),
            cancel: cancel.clone(),
            respond_to,
        };
        self.sender
            .send(call)
            .await
            .map_err(|_| TransportError::failed("Mock receiver dropped"))?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = response => {
                result.unwrap_or_else(|_| Err(TransportError::failed("Mock call dropped")))
            }
        }
    }
}

/// Creates a channel transport and the receiver the test answers calls from.
///
/// # Testing Strategy
/// Attempts are independent tasks, so the order in which they settle is up to the test: pull
/// calls with [`expect_call`], keep them around, and answer them in whatever order the scenario
/// needs. An answered call whose attempt was superseded in the meantime must not show up in
/// the published state.
pub fn create_mock_transport<P: Payload>(
    buffer_size: usize,
) -> (ChannelTransport<P>, mpsc::Receiver<MockCall<P>>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    (ChannelTransport { sender }, receiver)
}

/// Helper to receive the next transport call.
pub async fn expect_call<P>(receiver: &mut mpsc::Receiver<MockCall<P>>) -> Option<MockCall<P>> {
    receiver.recv().await
}
