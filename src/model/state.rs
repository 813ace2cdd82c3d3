use crate::generation::Generation;
use crate::model::ResourceKey;
use crate::transport::ResponseMeta;

/// Tagged result of the most recent observed attempt for a slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<P> {
    /// An attempt has been armed and nothing has been committed for it yet.
    Pending,
    Success(P),
    Failure(String),
    /// The orchestrator was torn down while the attempt was outstanding.
    Cancelled,
}

impl<P> Outcome<P> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Outcome::Pending)
    }
}

/// Snapshot of a multi-resource orchestrator, published after every state change.
///
/// All per-slot vectors share the same length and follow the order of the current descriptor
/// list.
#[derive(Debug, Clone)]
pub struct MultiFetchState<P> {
    pub generation: Generation,
    pub keys: Vec<ResourceKey>,
    pub data: Vec<Option<P>>,
    pub errors: Vec<Option<String>>,
    /// First error in slot order, if any slot currently holds one.
    pub error: Option<String>,
    pub responses: Vec<Option<ResponseMeta>>,
    pub loading_index: Vec<bool>,
    pub outcomes: Vec<Outcome<P>>,
    /// Attempts the orchestrator is still waiting on (current generation plus targeted ones).
    pub in_flight: usize,
    /// True once every bulk attempt of the current generation has resolved.
    pub cycle_settled: bool,
    /// True once the orchestrator has been torn down. No further snapshots follow.
    pub closed: bool,
}

impl<P> Default for MultiFetchState<P> {
    fn default() -> Self {
        Self {
            generation: Generation::INITIAL,
            keys: Vec::new(),
            data: Vec::new(),
            errors: Vec::new(),
            error: None,
            responses: Vec::new(),
            loading_index: Vec::new(),
            outcomes: Vec::new(),
            in_flight: 0,
            cycle_settled: false,
            closed: false,
        }
    }
}

/// Borrowed view of a single slot inside a [`MultiFetchState`].
#[derive(Debug)]
pub struct SlotView<'a, P> {
    pub key: &'a ResourceKey,
    pub data: Option<&'a P>,
    pub error: Option<&'a str>,
    pub response: Option<&'a ResponseMeta>,
    pub loading: bool,
    pub outcome: &'a Outcome<P>,
}

impl<P> MultiFetchState<P> {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn index_of(&self, key: &ResourceKey) -> Option<usize> {
        self.keys.iter().position(|candidate| candidate == key)
    }

    pub fn slot(&self, index: usize) -> Option<SlotView<'_, P>> {
        Some(SlotView {
            key: self.keys.get(index)?,
            data: self.data.get(index)?.as_ref(),
            error: self.errors.get(index)?.as_deref(),
            response: self.responses.get(index)?.as_ref(),
            loading: *self.loading_index.get(index)?,
            outcome: self.outcomes.get(index)?,
        })
    }

    pub fn get(&self, key: &ResourceKey) -> Option<SlotView<'_, P>> {
        self.slot(self.index_of(key)?)
    }

    pub fn is_loading(&self) -> bool {
        self.loading_index.iter().any(|loading| *loading)
    }

    /// True once the first cycle has started and nothing is in flight.
    pub fn is_settled(&self) -> bool {
        self.closed || (self.generation > Generation::INITIAL && self.in_flight == 0)
    }

    pub fn error_count(&self) -> usize {
        self.errors.iter().filter(|error| error.is_some()).count()
    }

    pub fn data_count(&self) -> usize {
        self.data.iter().filter(|data| data.is_some()).count()
    }
}

/// Snapshot of a single-resource controller.
#[derive(Debug, Clone)]
pub struct FetchState<P> {
    pub generation: Generation,
    pub data: Option<P>,
    pub error: Option<String>,
    pub loading: bool,
    pub response: Option<ResponseMeta>,
    pub outcome: Outcome<P>,
    pub closed: bool,
}

impl<P: Clone> FetchState<P> {
    pub(crate) fn from_multi(state: &MultiFetchState<P>) -> Self {
        Self {
            generation: state.generation,
            data: state.data.first().cloned().flatten(),
            error: state.errors.first().cloned().flatten(),
            loading: state.loading_index.first().copied().unwrap_or(false),
            response: state.responses.first().cloned().flatten(),
            outcome: state
                .outcomes
                .first()
                .cloned()
                .unwrap_or(Outcome::Pending),
            closed: state.closed,
        }
    }
}

impl<P> FetchState<P> {
    /// True while the very first load is running: no data yet, no error yet.
    pub fn is_initial_loading(&self) -> bool {
        self.loading && self.data.is_none() && self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_slot_state() -> MultiFetchState<u32> {
        MultiFetchState {
            generation: Generation::INITIAL.next(),
            keys: vec![ResourceKey::from("a"), ResourceKey::from("b")],
            data: vec![Some(1), None],
            errors: vec![None, Some("boom".to_string())],
            error: Some("boom".to_string()),
            responses: vec![None, None],
            loading_index: vec![false, true],
            outcomes: vec![Outcome::Success(1), Outcome::Failure("boom".to_string())],
            in_flight: 0,
            cycle_settled: true,
            closed: false,
        }
    }

    #[test]
    fn test_slot_lookup_by_key() {
        let state = two_slot_state();
        let b = state.get(&ResourceKey::from("b")).unwrap();
        assert_eq!(b.error, Some("boom"));
        assert!(b.loading);
        assert!(b.data.is_none());
        assert!(state.get(&ResourceKey::from("c")).is_none());
        assert_eq!(state.error_count(), 1);
        assert_eq!(state.data_count(), 1);
        assert!(state.is_settled());
    }

    #[test]
    fn test_initial_snapshot_is_not_settled() {
        let state = MultiFetchState::<u32>::default();
        assert!(!state.is_settled());
        assert!(state.is_empty());
    }

    #[test]
    fn test_single_projection_uses_first_slot() {
        let state = two_slot_state();
        let single = FetchState::from_multi(&state);
        assert_eq!(single.data, Some(1));
        assert_eq!(single.error, None);
        assert!(!single.loading);
        assert_eq!(single.outcome, Outcome::Success(1));
        assert!(!single.is_initial_loading());
    }
}
