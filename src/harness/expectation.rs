//! Count-based contract on a peer's response.

use tracing::warn;

use crate::harness::error::{CollectError, Shortfall, Unmet};
use crate::harness::timeouts::TimeoutPolicy;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Expectation {
    /// Lower bound. Unset means "at least one".
    pub min_messages: Option<usize>,
    /// Upper bound. Unset means unbounded.
    pub max_messages: Option<usize>,
}

impl Expectation {
    /// Exactly `count` messages.
    pub fn exactly(count: usize) -> Self {
        Self {
            min_messages: Some(count),
            max_messages: Some(count),
        }
    }

    pub fn at_least(count: usize) -> Self {
        Self {
            min_messages: Some(count),
            max_messages: None,
        }
    }

    pub fn between(min: usize, max: usize) -> Self {
        Self {
            min_messages: Some(min),
            max_messages: Some(max),
        }
    }

    fn min(&self) -> usize {
        self.min_messages.unwrap_or(1)
    }

    /// Enough messages arrived to stop waiting.
    pub fn sufficient(&self, n: usize) -> bool {
        n >= self.min()
    }

    /// Sufficient and not above the upper bound.
    pub fn matches(&self, n: usize) -> bool {
        self.sufficient(n) && self.max_messages.is_none_or(|max| n <= max)
    }

    /// Check `n` against the expectation. Depending on the policy an unmet
    /// expectation is returned as an error or only logged.
    pub fn verify(&self, n: usize, policy: &TimeoutPolicy) -> Result<(), CollectError> {
        let Some(unmet) = self.shortfall(n, policy) else {
            return Ok(());
        };

        if policy.raise_on_timeout {
            return Err(CollectError::ExpectationUnmet(unmet));
        }
        warn!("{unmet}");
        Ok(())
    }

    fn shortfall(&self, n: usize, policy: &TimeoutPolicy) -> Option<Unmet> {
        if self.matches(n) {
            return None;
        }
        let (kind, expected) = if n < self.min() {
            (Shortfall::TooFew, self.min())
        } else {
            (Shortfall::TooMany, self.max_messages.unwrap_or(n))
        };
        Some(Unmet {
            kind,
            expected,
            received: n,
            max_wait: policy.max_wait,
        })
    }
}
