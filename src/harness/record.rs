//! Ordered, append-only record of the messages one collection session sees.
//!
//! Appends go through a `watch` channel so that every waiter is woken after
//! the new message is visible, never before.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::harness::message::Message;

#[derive(Debug, Default)]
struct RecordState {
    messages: Vec<Message>,
    stopped: bool,
    /// Last transient transport fault not yet handled by the collector.
    fault: Option<String>,
}

/// How a call to [`MessageRecord::wait_until`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Satisfied,
    TimedOut,
    /// A transport fault was reported while waiting. See [`MessageRecord::take_fault`].
    Interrupted,
}

pub struct MessageRecord {
    tx: watch::Sender<RecordState>,
}

impl MessageRecord {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(RecordState::default());
        Self { tx }
    }

    /// Append a message and wake waiters. Returns false if the record is stopped.
    pub fn append(&self, mut message: Message) -> bool {
        message.received_at = Some(Instant::now());
        self.tx.send_if_modified(|state| {
            if state.stopped {
                return false;
            }
            state.messages.push(message);
            true
        })
    }

    /// Note a transient transport fault. Ignored once stopped.
    pub fn record_fault(&self, description: String) {
        self.tx.send_if_modified(|state| {
            if state.stopped {
                return false;
            }
            state.fault = Some(description);
            true
        });
    }

    pub fn take_fault(&self) -> Option<String> {
        let mut fault = None;
        self.tx.send_if_modified(|state| {
            fault = state.fault.take();
            false
        });
        fault
    }

    /// Freeze the record. Later appends are dropped.
    pub fn stop(&self) {
        self.tx.send_if_modified(|state| {
            if !state.stopped {
                debug!("Record stopped with {} message(s)", state.messages.len());
            }
            state.stopped = true;
            false
        });
    }

    pub fn is_stopped(&self) -> bool {
        self.tx.borrow().stopped
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.tx.borrow().messages.clone()
    }

    /// Suspend until `predicate` holds for the recorded messages, a fault is
    /// reported, or `timeout` elapses.
    pub async fn wait_until<P>(&self, mut predicate: P, timeout: Duration) -> WaitOutcome
    where
        P: FnMut(&[Message]) -> bool,
    {
        let mut rx = self.tx.subscribe();
        let waited = tokio::time::timeout(
            timeout,
            rx.wait_for(|state| state.fault.is_some() || predicate(&state.messages)),
        )
        .await;

        match waited {
            Ok(Ok(state)) if state.fault.is_some() => WaitOutcome::Interrupted,
            Ok(Ok(_)) => WaitOutcome::Satisfied,
            // The sender lives in `self`, so a closed channel cannot happen here.
            Ok(Err(_)) | Err(_) => WaitOutcome::TimedOut,
        }
    }
}

impl Default for MessageRecord {
    fn default() -> Self {
        Self::new()
    }
}
