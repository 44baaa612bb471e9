//! Scoped collection of a peer's response to one interaction.
//!
//! A collection session subscribes to the dispatch registry, runs the
//! caller's interaction (usually a send), then waits until the expectation
//! is sufficient or the deadline passes. The subscription is removed and the
//! record frozen however the session ends, including when the future
//! driving it is dropped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::harness::error::CollectError;
use crate::harness::expectation::Expectation;
use crate::harness::filter::Filter;
use crate::harness::message::MessageEvent;
use crate::harness::record::{MessageRecord, WaitOutcome};
use crate::harness::registry::{DEFAULT_SLOT_CEILING, DispatchRegistry};
use crate::harness::response::Response;
use crate::harness::subscription::TransientSubscription;
use crate::harness::timeouts::TimeoutPolicy;
use crate::harness::transport::TransportError;

/// Pause after a transient server error before waiting resumes.
pub const DEFAULT_FAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// Stand-in deadline for waits too long to represent.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

pub struct ResponseCollector {
    registry: Arc<DispatchRegistry>,
    slot_ceiling: i32,
    fault_cooldown: Duration,
}

impl ResponseCollector {
    pub fn new(registry: Arc<DispatchRegistry>) -> Self {
        Self {
            registry,
            slot_ceiling: DEFAULT_SLOT_CEILING,
            fault_cooldown: DEFAULT_FAULT_COOLDOWN,
        }
    }

    pub fn with_slot_ceiling(mut self, ceiling: i32) -> Self {
        self.slot_ceiling = ceiling;
        self
    }

    pub fn with_fault_cooldown(mut self, cooldown: Duration) -> Self {
        self.fault_cooldown = cooldown;
        self
    }

    pub fn registry(&self) -> &Arc<DispatchRegistry> {
        &self.registry
    }

    /// Record messages matching `filter` while `interaction` runs and
    /// afterwards until `expectation` is settled under `policy`.
    ///
    /// Messages arriving during the interaction already count. The
    /// `max_wait` deadline starts once the interaction has completed.
    pub async fn collect<F, Fut>(
        &self,
        filter: Filter,
        expectation: Expectation,
        policy: &TimeoutPolicy,
        interaction: F,
    ) -> Result<Response, CollectError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), TransportError>>,
    {
        let session = Session::open(self.registry.clone(), self.slot_ceiling, filter);
        debug!("Collector set up on slot {}. Executing interaction...", session.slot());

        interaction().await?;
        debug!("Interaction complete.");

        let verdict = self.await_expectation(&session.record, &expectation, policy).await;
        let record = session.finish()?;
        verdict?;

        let response = Response::new(record.snapshot());
        debug!("Collected {} message(s)", response.count());
        Ok(response)
    }

    /// Run `send(args)` as the interaction of a collection session.
    pub async fn send_and_await<S, A, Fut, T>(
        &self,
        send: S,
        args: A,
        filter: Filter,
        expectation: Expectation,
        policy: &TimeoutPolicy,
    ) -> Result<Response, CollectError>
    where
        S: FnOnce(A) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        self.collect(filter, expectation, policy, move || async move { send(args).await.map(|_| ()) })
            .await
    }

    async fn await_expectation(
        &self,
        record: &MessageRecord,
        expectation: &Expectation,
        policy: &TimeoutPolicy,
    ) -> Result<(), CollectError> {
        let deadline = deadline_after(policy.max_wait);
        let mut num_received = 0;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !remaining.is_zero() {
                debug!("Waiting for message #{}", num_received + 1);
                let seen = num_received;
                let outcome = record
                    .wait_until(|m| expectation.sufficient(m.len()) || m.len() > seen, remaining)
                    .await;
                if outcome == WaitOutcome::Interrupted {
                    self.cool_down(record).await;
                    continue;
                }
            }
            num_received = record.len();

            if let Some(window) = policy.wait_consecutive {
                // One window per pass; may run past the deadline.
                debug!("Checking for consecutive message to #{num_received}...");
                let seen = num_received;
                match record.wait_until(|m| m.len() > seen, window).await {
                    WaitOutcome::Satisfied => debug!("Received consecutive message."),
                    WaitOutcome::TimedOut => debug!("None received."),
                    WaitOutcome::Interrupted => self.cool_down(record).await,
                }
                num_received = record.len();
            }

            if expectation.sufficient(num_received) {
                return expectation.verify(num_received, policy);
            }
            if Instant::now() >= deadline {
                return expectation.verify(num_received, policy);
            }
        }
    }

    async fn cool_down(&self, record: &MessageRecord) {
        if let Some(fault) = record.take_fault() {
            warn!(
                "Transport fault while waiting for response: {fault}. Resuming in {}s",
                self.fault_cooldown.as_secs_f64()
            );
            sleep(self.fault_cooldown).await;
        }
    }
}

/// `now + wait`, or a far-future instant when that overflows.
fn deadline_after(wait: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(wait).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Record plus subscription for one collection. Dropping it unfinished still
/// stops the record and removes the handler.
struct Session {
    record: Arc<MessageRecord>,
    subscription: Option<TransientSubscription>,
}

impl Session {
    fn open(registry: Arc<DispatchRegistry>, ceiling: i32, filter: Filter) -> Self {
        let record = Arc::new(MessageRecord::new());
        let sink = record.clone();
        let subscription = TransientSubscription::register(registry, ceiling, filter, move |event| match event {
            MessageEvent::New(message) | MessageEvent::Edited(message) => {
                sink.append(message.clone());
            }
            MessageEvent::ServerError(description) => sink.record_fault(description.clone()),
        });
        Self {
            record,
            subscription: Some(subscription),
        }
    }

    fn slot(&self) -> i32 {
        self.subscription.as_ref().map_or(0, TransientSubscription::slot)
    }

    fn finish(mut self) -> Result<Arc<MessageRecord>, CollectError> {
        self.record.stop();
        if let Some(subscription) = self.subscription.take() {
            subscription.release()?;
        }
        Ok(self.record.clone())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.record.stop();
    }
}
