use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::harness::transport::TransportError;

/// Which side of the expected range the received count fell on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortfall {
    TooFew,
    TooMany,
}

/// Details of an unmet expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unmet {
    pub kind: Shortfall,
    /// `min_messages` for `TooFew`, `max_messages` for `TooMany`.
    pub expected: usize,
    pub received: usize,
    pub max_wait: Duration,
}

impl fmt::Display for Unmet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Shortfall::TooFew => write!(
                f,
                "Expected {} messages but only received {} after waiting {} seconds.",
                self.expected,
                self.received,
                self.max_wait.as_secs_f64()
            ),
            Shortfall::TooMany => write!(
                f,
                "Expected only {} messages but received {}.",
                self.expected, self.received
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum CollectError {
    /// The peer's response did not satisfy the expectation.
    #[error("{0}")]
    ExpectationUnmet(Unmet),
    /// A subscription slot disappeared from the registry before release.
    /// Means shared dispatch state was corrupted.
    #[error("subscription slot {slot} does not exist; handler was not removed")]
    SubscriptionLifecycle { slot: i32 },
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
