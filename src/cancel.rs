//! Cooperative cancellation for in-flight attempts.

use std::sync::Arc;
use tokio::sync::watch;

/// A cloneable, one-way cancellation signal.
///
/// Every attempt owns one token. The orchestrator fires it when the attempt's generation is
/// superseded or when the orchestrator is torn down; the attempt races its transport call
/// against [`CancellationToken::cancelled`], and the orchestrator re-checks
/// [`CancellationToken::is_cancelled`] before committing any outcome.
///
/// Cancelling is idempotent and visible through every clone.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    state: Arc<watch::Sender<bool>>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Fires the token. Later calls are no-ops.
    pub fn cancel(&self) {
        self.state.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        });
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves once the token has been fired.
    pub async fn cancelled(&self) {
        let mut receiver = self.state.subscribe();
        // The sender lives as long as `self`, so the wait cannot fail on a closed channel.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}
