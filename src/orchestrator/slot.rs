use crate::cancel::CancellationToken;
use crate::generation::AttemptId;
use crate::lifecycle::LoadingPolicy;
use crate::model::{Outcome, ResourceDescriptor, ResourceKey};
use crate::transport::{FetchSuccess, ResponseMeta};

/// An attempt the slot is currently waiting on.
#[derive(Debug)]
pub(crate) struct InFlight {
    pub id: AttemptId,
    pub token: CancellationToken,
}

impl InFlight {
    pub fn cancel(self) {
        self.token.cancel();
    }
}

/// Per-resource state record, owned exclusively by the orchestrator task.
#[derive(Debug)]
pub(crate) struct Slot<P> {
    pub descriptor: ResourceDescriptor,
    pub data: Option<P>,
    pub error: Option<String>,
    pub response: Option<ResponseMeta>,
    pub loading: bool,
    pub outcome: Outcome<P>,
    /// Bulk attempt of the current generation, if still outstanding.
    pub bulk: Option<InFlight>,
    /// Targeted attempt, only populated under `TargetedRefetch::Tracked`.
    pub tracked: Option<InFlight>,
}

impl<P: Clone> Slot<P> {
    pub fn new(descriptor: ResourceDescriptor) -> Self {
        Self {
            descriptor,
            data: None,
            error: None,
            response: None,
            loading: false,
            outcome: Outcome::Pending,
            bulk: None,
            tracked: None,
        }
    }

    pub fn key(&self) -> &ResourceKey {
        &self.descriptor.key
    }

    /// Prepares the slot for a new attempt.
    pub fn arm(&mut self) {
        self.loading = true;
        self.error = None;
        self.outcome = Outcome::Pending;
    }

    /// Cancels every attempt the slot tracks. Returns true if anything was outstanding.
    pub fn cancel_all(&mut self) -> bool {
        let mut cancelled = false;
        for attempt in [self.bulk.take(), self.tracked.take()].into_iter().flatten() {
            attempt.cancel();
            cancelled = true;
        }
        cancelled
    }

    pub fn commit_success(&mut self, success: FetchSuccess<P>) {
        self.data = Some(success.payload.clone());
        self.outcome = Outcome::Success(success.payload);
        self.response = Some(success.meta);
        self.error = None;
        self.loading = false;
    }

    /// The transport gave up on its own. Data, error and response stay as they were.
    pub fn commit_cancelled(&mut self) {
        self.outcome = Outcome::Cancelled;
        self.loading = false;
    }

    pub fn commit_failure(
        &mut self,
        message: String,
        meta: Option<ResponseMeta>,
        policy: LoadingPolicy,
    ) {
        self.error = Some(message.clone());
        self.outcome = Outcome::Failure(message);
        self.response = meta;
        if policy == LoadingPolicy::UntilSettled {
            self.loading = false;
        }
    }
}
