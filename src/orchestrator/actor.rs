//! # Fetch Orchestrator Task
//!
//! [`FetchOrchestrator`] is the server half of the orchestrator. It owns every slot together with
//! the receiver ends of two channels:
//!
//! - **commands** from clients (refetch, targeted refetch, data replacement, descriptor changes)
//! - **settlements** from attempt tasks
//!
//! Both are processed one at a time in a single loop, so slot state needs no locks. Attempts run
//! as independent Tokio tasks that race their transport call against their cancellation token
//! and report back with a settlement; completion order is never relied upon.
//!
//! ## Commit check
//!
//! A settlement only mutates its slot when all of the following hold:
//!
//! 1. the slot still exists (its key was not removed),
//! 2. the attempt is still the one the slot is waiting on (for bulk attempts this includes the
//!    generation the attempt was started in being the current one),
//! 3. the attempt's token has not fired.
//!
//! Untracked targeted attempts skip (2): they race bulk attempts and the last one to settle wins.

use super::message::{Ack, AttemptKind, Command, Settlement, SlotRef};
use super::slot::{InFlight, Slot};
use crate::cancel::CancellationToken;
use crate::client::OrchestratorHandle;
use crate::error::FetchError;
use crate::generation::{AttemptId, Generation};
use crate::lifecycle::{OrchestratorConfig, TargetedRefetch};
use crate::model::descriptor::{check_unique_keys, reactivity_changed};
use crate::model::{MultiFetchState, Outcome, ResourceDescriptor, ResourceKey};
use crate::transport::{FetchSuccess, Transport, TransportError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, Copy)]
struct CycleStats {
    succeeded: usize,
    failed: usize,
    reported: bool,
}

enum Committed {
    Success,
    Failure,
    Nothing,
}

pub struct FetchOrchestrator<T: Transport> {
    transport: Arc<T>,
    config: OrchestratorConfig,
    receiver: mpsc::Receiver<Command<T::Payload>>,
    settle_tx: mpsc::UnboundedSender<Settlement<T::Payload>>,
    settle_rx: mpsc::UnboundedReceiver<Settlement<T::Payload>>,
    state_tx: watch::Sender<MultiFetchState<T::Payload>>,
    slots: Vec<Slot<T::Payload>>,
    generation: Generation,
    next_attempt: u64,
    targeted_pending: usize,
    cycle: CycleStats,
    closed: bool,
}

impl<T: Transport> FetchOrchestrator<T> {
    /// Creates the orchestrator and the handle used to talk to it.
    ///
    /// Every slot is armed immediately so the first published snapshot already reports
    /// loading; the first generation of attempts is issued when [`run`](Self::run) starts.
    ///
    /// # Errors
    ///
    /// [`FetchError::DuplicateKey`] if two descriptors share a key.
    pub fn new(
        transport: T,
        descriptors: Vec<ResourceDescriptor>,
        config: OrchestratorConfig,
    ) -> Result<(Self, OrchestratorHandle<T::Payload>), FetchError> {
        check_unique_keys(&descriptors)?;

        let (sender, receiver) = mpsc::channel(config.buffer_size.max(1));
        let (settle_tx, settle_rx) = mpsc::unbounded_channel();
        let mut slots: Vec<_> = descriptors.into_iter().map(Slot::new).collect();
        slots.iter_mut().for_each(Slot::arm);
        let (state_tx, state_rx) = watch::channel(MultiFetchState::default());

        let orchestrator = Self {
            transport: Arc::new(transport),
            config,
            receiver,
            settle_tx,
            settle_rx,
            state_tx,
            slots,
            generation: Generation::INITIAL,
            next_attempt: 1,
            targeted_pending: 0,
            cycle: CycleStats::default(),
            closed: false,
        };
        orchestrator.publish();

        Ok((orchestrator, OrchestratorHandle::new(sender, state_rx)))
    }

    /// Runs the event loop until a shutdown command arrives or every handle is dropped.
    /// Either way the orchestrator is torn down before returning.
    pub async fn run(mut self) {
        info!(slots = self.slots.len(), "Orchestrator started");
        self.start_cycle("mount");
        self.publish();

        loop {
            tokio::select! {
                command = self.receiver.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command) {
                            return;
                        }
                    }
                    None => break,
                },
                Some(settlement) = self.settle_rx.recv() => {
                    self.handle_settlement(settlement);
                    self.publish();
                }
            }
        }

        self.teardown();
    }

    /// Applies one command. Returns false once the orchestrator has shut down.
    fn handle_command(&mut self, command: Command<T::Payload>) -> bool {
        match command {
            Command::Refetch { respond_to } => {
                self.start_cycle("refetch");
                self.reply(respond_to, Ok(self.generation));
            }
            Command::RefetchSlot { slot, respond_to } => {
                let result = self
                    .resolve(&slot)
                    .map(|index| self.start_targeted(index));
                self.reply(respond_to, result);
            }
            Command::SetData { values, respond_to } => {
                let result = self.set_data(values);
                self.reply(respond_to, result);
            }
            Command::SetDescriptors {
                descriptors,
                respond_to,
            } => {
                let result = self.set_descriptors(descriptors);
                self.reply(respond_to, result);
            }
            Command::SetDeps {
                slot,
                deps,
                respond_to,
            } => {
                let result = self.set_deps(&slot, deps);
                self.reply(respond_to, result);
            }
            Command::Shutdown { respond_to } => {
                self.teardown();
                let _ = respond_to.send(Ok(()));
                return false;
            }
        }
        true
    }

    /// Publishes the new state before acknowledging, so callers observe the effect on return.
    fn reply<R>(&self, respond_to: Ack<R>, result: Result<R, FetchError>) {
        self.publish();
        let _ = respond_to.send(result);
    }

    fn resolve(&self, slot: &SlotRef) -> Result<usize, FetchError> {
        match slot {
            SlotRef::Index(index) if *index < self.slots.len() => Ok(*index),
            SlotRef::Index(index) => Err(FetchError::IndexOutOfRange {
                index: *index,
                len: self.slots.len(),
            }),
            SlotRef::Key(key) => self
                .slots
                .iter()
                .position(|slot| slot.key() == key)
                .ok_or_else(|| FetchError::UnknownKey(key.clone())),
        }
    }

    /// Advances the generation, then cancels everything the previous one left outstanding and
    /// issues one attempt per slot in index order.
    fn start_cycle(&mut self, reason: &'static str) {
        self.generation = self.generation.next();
        let generation = self.generation;

        let superseded = self
            .slots
            .iter_mut()
            .map(|slot| slot.cancel_all())
            .filter(|cancelled| *cancelled)
            .count();
        self.cycle = CycleStats::default();
        info!(%generation, reason, slots = self.slots.len(), superseded, "Cycle started");

        for index in 0..self.slots.len() {
            let attempt = self.spawn_attempt(index, AttemptKind::Bulk(generation));
            self.slots[index].bulk = Some(attempt);
        }
        self.check_cycle_settled();
    }

    fn start_targeted(&mut self, index: usize) -> AttemptId {
        let attempt = self.spawn_attempt(index, AttemptKind::Targeted);
        let id = attempt.id;
        self.targeted_pending += 1;

        if self.config.targeted_refetch == TargetedRefetch::Tracked {
            let slot = &mut self.slots[index];
            slot.cancel_all();
            slot.tracked = Some(attempt);
            self.check_cycle_settled();
        }
        id
    }

    fn spawn_attempt(&mut self, index: usize, kind: AttemptKind) -> InFlight {
        let id = AttemptId::new(self.next_attempt);
        self.next_attempt += 1;
        let token = CancellationToken::new();

        let slot = &mut self.slots[index];
        slot.arm();
        let request = slot.descriptor.request();
        debug!(key = %request.key, attempt = %id, ?kind, "Attempt started");

        let transport = Arc::clone(&self.transport);
        let settle_tx = self.settle_tx.clone();
        let attempt_token = token.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = attempt_token.cancelled() => Err(TransportError::Cancelled),
                result = transport.fetch(&request, &attempt_token) => result,
            };
            // Only fails once the orchestrator is gone, when the outcome no longer matters.
            let _ = settle_tx.send(Settlement {
                key: request.key,
                attempt: id,
                kind,
                token: attempt_token,
                result,
            });
        });

        InFlight { id, token }
    }

    fn set_data(&mut self, values: Vec<Option<T::Payload>>) -> Result<(), FetchError> {
        if values.len() != self.slots.len() {
            return Err(FetchError::LengthMismatch {
                expected: self.slots.len(),
                actual: values.len(),
            });
        }
        for (slot, value) in self.slots.iter_mut().zip(values) {
            slot.data = value;
        }
        debug!(slots = self.slots.len(), "Data replaced");
        Ok(())
    }

    /// Reconciles slots by key: surviving keys keep their state, removed keys are cancelled and
    /// dropped, new keys start empty.
    fn set_descriptors(&mut self, descriptors: Vec<ResourceDescriptor>) -> Result<bool, FetchError> {
        check_unique_keys(&descriptors)?;

        let current: Vec<ResourceDescriptor> = self
            .slots
            .iter()
            .map(|slot| slot.descriptor.clone())
            .collect();
        let changed = reactivity_changed(&current, &descriptors);

        let mut previous: HashMap<ResourceKey, Slot<T::Payload>> = self
            .slots
            .drain(..)
            .map(|slot| (slot.key().clone(), slot))
            .collect();
        self.slots = descriptors
            .into_iter()
            .map(|descriptor| match previous.remove(&descriptor.key) {
                Some(mut slot) => {
                    slot.descriptor = descriptor;
                    slot
                }
                None => Slot::new(descriptor),
            })
            .collect();
        for (key, mut slot) in previous {
            slot.cancel_all();
            debug!(%key, "Slot discarded");
        }

        if changed {
            self.start_cycle("descriptors changed");
        }
        Ok(changed)
    }

    fn set_deps(&mut self, slot: &SlotRef, deps: Vec<String>) -> Result<bool, FetchError> {
        let index = self.resolve(slot)?;
        let descriptor = &mut self.slots[index].descriptor;
        if descriptor.deps == deps {
            return Ok(false);
        }
        descriptor.deps = deps;
        self.start_cycle("deps changed");
        Ok(true)
    }

    fn handle_settlement(&mut self, settlement: Settlement<T::Payload>) {
        let Settlement {
            key,
            attempt,
            kind,
            token,
            result,
        } = settlement;

        if kind == AttemptKind::Targeted {
            self.targeted_pending = self.targeted_pending.saturating_sub(1);
        }

        let Some(index) = self.slots.iter().position(|slot| slot.key() == &key) else {
            debug!(%key, %attempt, "Discarded outcome for removed slot");
            return;
        };

        let current_generation = self.generation;
        let slot = &mut self.slots[index];
        let current = match kind {
            AttemptKind::Bulk(generation) => {
                generation == current_generation && take_if_current(&mut slot.bulk, attempt)
            }
            AttemptKind::Targeted => match self.config.targeted_refetch {
                TargetedRefetch::Untracked => true,
                TargetedRefetch::Tracked => take_if_current(&mut slot.tracked, attempt),
            },
        };

        if current && !token.is_cancelled() {
            let committed = self.commit(index, result);
            if matches!(kind, AttemptKind::Bulk(_)) {
                match committed {
                    Committed::Success => self.cycle.succeeded += 1,
                    Committed::Failure => self.cycle.failed += 1,
                    Committed::Nothing => {}
                }
            }
        } else {
            debug!(%key, %attempt, ?kind, "Discarded stale outcome");
        }

        self.check_cycle_settled();
    }

    fn commit(
        &mut self,
        index: usize,
        result: Result<FetchSuccess<T::Payload>, TransportError>,
    ) -> Committed {
        let policy = self.config.loading_policy;
        let slot = &mut self.slots[index];
        match result {
            Ok(success) => {
                debug!(key = %slot.key(), status = ?success.meta.status, "Committed success");
                slot.commit_success(success);
                Committed::Success
            }
            Err(TransportError::Cancelled) => {
                debug!(key = %slot.key(), "Transport reported cancellation");
                slot.commit_cancelled();
                Committed::Nothing
            }
            Err(TransportError::Failed { message, meta }) => {
                let message =
                    message.unwrap_or_else(|| self.config.fallback_error_message.clone());
                warn!(key = %slot.key(), error = %message, "Attempt failed");
                slot.commit_failure(message, meta, policy);
                Committed::Failure
            }
        }
    }

    fn check_cycle_settled(&mut self) {
        let outstanding = self
            .slots
            .iter()
            .any(|slot| slot.bulk.is_some() || slot.tracked.is_some());
        if self.cycle.reported || outstanding {
            return;
        }
        self.cycle.reported = true;
        info!(
            generation = %self.generation,
            succeeded = self.cycle.succeeded,
            failed = self.cycle.failed,
            "Cycle settled"
        );
    }

    fn teardown(&mut self) {
        if self.closed {
            return;
        }
        let mut cancelled = 0;
        for slot in &mut self.slots {
            if slot.cancel_all() {
                cancelled += 1;
                if slot.outcome.is_pending() {
                    slot.outcome = Outcome::Cancelled;
                }
                slot.loading = false;
            }
        }
        self.closed = true;
        self.publish();
        info!(generation = %self.generation, cancelled, "Shutdown");
    }

    fn snapshot(&self) -> MultiFetchState<T::Payload> {
        let errors: Vec<Option<String>> = self.slots.iter().map(|slot| slot.error.clone()).collect();
        let bulk_pending = self.slots.iter().filter(|slot| slot.bulk.is_some()).count();

        MultiFetchState {
            generation: self.generation,
            keys: self.slots.iter().map(|slot| slot.key().clone()).collect(),
            data: self.slots.iter().map(|slot| slot.data.clone()).collect(),
            error: errors.iter().flatten().next().cloned(),
            errors,
            responses: self.slots.iter().map(|slot| slot.response.clone()).collect(),
            loading_index: self.slots.iter().map(|slot| slot.loading).collect(),
            outcomes: self.slots.iter().map(|slot| slot.outcome.clone()).collect(),
            in_flight: bulk_pending + self.targeted_pending,
            cycle_settled: self.generation > Generation::INITIAL && bulk_pending == 0,
            closed: self.closed,
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.snapshot());
    }
}

fn take_if_current(in_flight: &mut Option<InFlight>, attempt: AttemptId) -> bool {
    if in_flight.as_ref().map(|current| current.id) == Some(attempt) {
        *in_flight = None;
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{FetchRequest, ResponseMeta};
    use async_trait::async_trait;

    /// Never answers on its own; every attempt ends when its token fires.
    struct SilentTransport;

    #[async_trait]
    impl Transport for SilentTransport {
        type Payload = u32;

        async fn fetch(
            &self,
            _request: &FetchRequest,
            cancel: &CancellationToken,
        ) -> Result<FetchSuccess<u32>, TransportError> {
            cancel.cancelled().await;
            Err(TransportError::Cancelled)
        }
    }

    fn orchestrator(targets: &[&str]) -> FetchOrchestrator<SilentTransport> {
        let descriptors = targets.iter().map(|t| ResourceDescriptor::new(*t)).collect();
        let (orchestrator, _handle) =
            FetchOrchestrator::new(SilentTransport, descriptors, OrchestratorConfig::default())
                .unwrap();
        orchestrator
    }

    fn current_attempt(
        orchestrator: &FetchOrchestrator<SilentTransport>,
        index: usize,
    ) -> (AttemptId, CancellationToken) {
        let in_flight = orchestrator.slots[index].bulk.as_ref().unwrap();
        (in_flight.id, in_flight.token.clone())
    }

    fn settle(
        key: &str,
        attempt: (AttemptId, CancellationToken),
        generation: Generation,
        result: Result<FetchSuccess<u32>, TransportError>,
    ) -> Settlement<u32> {
        Settlement {
            key: ResourceKey::from(key),
            attempt: attempt.0,
            kind: AttemptKind::Bulk(generation),
            token: attempt.1,
            result,
        }
    }

    fn ok(payload: u32) -> Result<FetchSuccess<u32>, TransportError> {
        Ok(FetchSuccess {
            payload,
            meta: ResponseMeta::default(),
        })
    }

    #[tokio::test]
    async fn test_first_snapshot_reports_loading() {
        let orchestrator = orchestrator(&["/a", "/b"]);
        let state = orchestrator.snapshot();
        assert_eq!(state.generation, Generation::INITIAL);
        assert_eq!(state.loading_index, vec![true, true]);
        assert!(!state.cycle_settled);
    }

    #[tokio::test]
    async fn test_stale_generation_outcome_is_discarded() {
        let mut orchestrator = orchestrator(&["/a"]);
        orchestrator.start_cycle("mount");
        let first_generation = orchestrator.generation;
        let first = current_attempt(&orchestrator, 0);

        orchestrator.start_cycle("refetch");
        assert!(first.1.is_cancelled());

        orchestrator.handle_settlement(settle("/a", first, first_generation, ok(1)));

        let state = orchestrator.snapshot();
        assert_eq!(state.data, vec![None]);
        assert_eq!(state.loading_index, vec![true]);
        assert_eq!(state.in_flight, 1);
        assert!(!state.cycle_settled);
    }

    #[tokio::test]
    async fn test_token_fired_before_commit_discards_outcome() {
        let mut orchestrator = orchestrator(&["/a"]);
        orchestrator.start_cycle("mount");
        let attempt = current_attempt(&orchestrator, 0);

        // Payload fully received, but the token fired before the commit check.
        attempt.1.cancel();
        orchestrator.handle_settlement(settle("/a", attempt, orchestrator.generation, ok(9)));

        let state = orchestrator.snapshot();
        assert_eq!(state.data, vec![None]);
        assert!(state.cycle_settled);
    }

    #[tokio::test]
    async fn test_current_outcomes_commit_and_settle_cycle() {
        let mut orchestrator = orchestrator(&["/a", "/b"]);
        orchestrator.start_cycle("mount");
        let generation = orchestrator.generation;
        let a = current_attempt(&orchestrator, 0);
        let b = current_attempt(&orchestrator, 1);

        orchestrator.handle_settlement(settle("/b", b, generation, Err(TransportError::failed("timeout"))));
        assert!(!orchestrator.snapshot().cycle_settled);

        orchestrator.handle_settlement(settle("/a", a, generation, ok(1)));
        let state = orchestrator.snapshot();
        assert_eq!(state.data, vec![Some(1), None]);
        assert_eq!(state.errors, vec![None, Some("timeout".to_string())]);
        assert_eq!(state.error.as_deref(), Some("timeout"));
        assert_eq!(state.loading_index, vec![false, true]);
        assert!(state.cycle_settled);
        assert_eq!(orchestrator.cycle.succeeded, 1);
        assert_eq!(orchestrator.cycle.failed, 1);
    }

    #[tokio::test]
    async fn test_missing_message_uses_fallback() {
        let mut orchestrator = orchestrator(&["/a"]);
        orchestrator.start_cycle("mount");
        let attempt = current_attempt(&orchestrator, 0);
        let silent_failure = Err(TransportError::Failed {
            message: None,
            meta: None,
        });
        orchestrator.handle_settlement(settle("/a", attempt, orchestrator.generation, silent_failure));

        let expected = orchestrator.config.fallback_error_message.clone();
        assert_eq!(orchestrator.snapshot().errors, vec![Some(expected)]);
    }

    #[tokio::test]
    async fn test_descriptor_reorder_keeps_state_by_key() {
        let mut orchestrator = orchestrator(&["/a", "/b"]);
        orchestrator.start_cycle("mount");
        let generation = orchestrator.generation;
        let a = current_attempt(&orchestrator, 0);
        let b = current_attempt(&orchestrator, 1);
        orchestrator.handle_settlement(settle("/a", a, generation, ok(1)));
        orchestrator.handle_settlement(settle("/b", b, generation, ok(2)));

        let changed = orchestrator
            .set_descriptors(vec![
                ResourceDescriptor::new("/b"),
                ResourceDescriptor::new("/a"),
                ResourceDescriptor::new("/c"),
            ])
            .unwrap();
        assert!(changed);

        let state = orchestrator.snapshot();
        assert_eq!(state.generation, generation.next());
        assert_eq!(state.data, vec![Some(2), Some(1), None]);
        assert_eq!(state.loading_index, vec![true, true, true]);
        assert_eq!(state.in_flight, 3);
    }

    #[tokio::test]
    async fn test_set_data_checks_length() {
        let mut orchestrator = orchestrator(&["/a", "/b"]);
        assert_eq!(
            orchestrator.set_data(vec![Some(1)]),
            Err(FetchError::LengthMismatch {
                expected: 2,
                actual: 1
            })
        );
        orchestrator.set_data(vec![Some(1), None]).unwrap();
        assert_eq!(orchestrator.snapshot().data, vec![Some(1), None]);
    }

    #[tokio::test]
    async fn test_unchanged_deps_do_not_start_cycle() {
        let mut orchestrator = orchestrator(&["/a"]);
        orchestrator.start_cycle("mount");
        let generation = orchestrator.generation;

        assert!(!orchestrator.set_deps(&SlotRef::Index(0), Vec::new()).unwrap());
        assert_eq!(orchestrator.generation, generation);

        assert!(orchestrator
            .set_deps(&SlotRef::Key(ResourceKey::from("/a")), vec!["user-2".to_string()])
            .unwrap());
        assert_eq!(orchestrator.generation, generation.next());
    }

    #[tokio::test]
    async fn test_transport_cancellation_clears_loading() {
        let mut orchestrator = orchestrator(&["/a"]);
        orchestrator.start_cycle("mount");
        let attempt = current_attempt(&orchestrator, 0);
        orchestrator.handle_settlement(settle(
            "/a",
            attempt,
            orchestrator.generation,
            Err(TransportError::Cancelled),
        ));

        let state = orchestrator.snapshot();
        assert_eq!(state.loading_index, vec![false]);
        assert_eq!(state.outcomes, vec![Outcome::Cancelled]);
        assert_eq!(state.errors, vec![None]);
        assert_eq!(state.in_flight, 0);
        assert!(orchestrator.cycle.reported);
    }

    #[tokio::test]
    async fn test_tracked_attempt_holds_back_cycle_report() {
        let descriptors = vec![ResourceDescriptor::new("/a")];
        let config = OrchestratorConfig::default().with_targeted_refetch(TargetedRefetch::Tracked);
        let (mut orchestrator, _handle) =
            FetchOrchestrator::new(SilentTransport, descriptors, config).unwrap();
        orchestrator.start_cycle("mount");

        let id = orchestrator.start_targeted(0);
        assert!(orchestrator.slots[0].bulk.is_none());
        assert!(!orchestrator.cycle.reported);

        let token = orchestrator.slots[0].tracked.as_ref().unwrap().token.clone();
        orchestrator.handle_settlement(Settlement {
            key: ResourceKey::from("/a"),
            attempt: id,
            kind: AttemptKind::Targeted,
            token,
            result: ok(4),
        });
        assert!(orchestrator.cycle.reported);
        assert_eq!(orchestrator.snapshot().data, vec![Some(4)]);
    }
}
