//! Minimum spacing between consecutive interactions with the same peer.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{Instant, sleep};
use tracing::debug;

pub struct ActionThrottle {
    delay: Duration,
    last_response: Mutex<Option<Instant>>,
}

impl ActionThrottle {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_response: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Remember when the last response arrived. `None` clears the marker.
    pub fn record(&self, last_response: Option<Instant>) {
        *self.last_response.lock() = last_response;
    }

    /// How much longer the next action has to wait.
    pub fn remaining(&self) -> Duration {
        match *self.last_response.lock() {
            Some(at) if !self.delay.is_zero() => match at.checked_add(self.delay) {
                Some(until) => until.saturating_duration_since(Instant::now()),
                None => self.delay,
            },
            _ => Duration::ZERO,
        }
    }

    /// Sleep until `delay` has passed since the last recorded response.
    pub async fn wait(&self) {
        let remaining = self.remaining();
        if remaining.is_zero() {
            return;
        }
        debug!("Waiting {:.3}s due to global action delay...", remaining.as_secs_f64());
        sleep(remaining).await;
    }
}
