//! Generation and attempt identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version counter identifying one coordinated round of attempts.
///
/// Every attempt captures the generation that was current when it started. Before an outcome
/// is committed the orchestrator compares the captured value with the current one; anything
/// older is discarded without touching state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Generation(u64);

impl Generation {
    /// The generation before the first cycle has been started.
    pub const INITIAL: Generation = Generation(0);

    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a single attempt, unique within one orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptId(u64);

impl AttemptId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_is_monotonic() {
        let first = Generation::INITIAL.next();
        let second = first.next();
        assert!(second > first);
        assert!(first > Generation::INITIAL);
        assert_eq!(second.value(), 2);
        assert_eq!(second.to_string(), "2");
    }
}
