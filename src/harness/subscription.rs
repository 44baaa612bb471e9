//! A handler that lives in the dispatch registry for one collection session.

use std::sync::Arc;

use tracing::error;

use crate::harness::error::CollectError;
use crate::harness::filter::Filter;
use crate::harness::message::MessageEvent;
use crate::harness::registry::{DispatchRegistry, Handler, HandlerId};

/// Handle to a registered transient handler.
///
/// Call [`release`](Self::release) on the normal exit path to observe
/// lifecycle errors. If the handle is dropped unreleased (an error return, a
/// panic, or the owning future being cancelled) the handler is removed in
/// `Drop` instead.
pub struct TransientSubscription {
    registry: Arc<DispatchRegistry>,
    slot: i32,
    handler_id: HandlerId,
    released: bool,
}

impl TransientSubscription {
    /// Reserve a free slot at or below `ceiling` and install `callback`
    /// there behind `filter`.
    pub fn register<F>(registry: Arc<DispatchRegistry>, ceiling: i32, filter: Filter, callback: F) -> Self
    where
        F: Fn(&MessageEvent) + Send + Sync + 'static,
    {
        let handler = Handler::new(filter, callback);
        let handler_id = handler.id();
        let slot = registry.reserve_and_insert(ceiling, handler);
        Self {
            registry,
            slot,
            handler_id,
            released: false,
        }
    }

    pub fn slot(&self) -> i32 {
        self.slot
    }

    pub fn release(mut self) -> Result<(), CollectError> {
        self.released = true;
        self.registry.remove_exact(self.slot, self.handler_id)
    }
}

impl Drop for TransientSubscription {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.registry.remove_exact(self.slot, self.handler_id) {
            // Corrupted shared state must not pass silently, but a second
            // panic while unwinding would abort the process.
            if std::thread::panicking() {
                error!("{e}");
            } else {
                panic!("{e}");
            }
        }
    }
}
