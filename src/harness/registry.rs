//! Shared, priority-ordered table of event handlers.
//!
//! Every client connection owns one registry. Long-lived handlers are added
//! to fixed groups; collection sessions reserve a free group below a ceiling
//! for the duration of one interaction. All table access goes through one
//! lock, and slot allocation scans and inserts under that same lock so no
//! two sessions can ever share a slot.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::harness::error::CollectError;
use crate::harness::filter::Filter;
use crate::harness::message::MessageEvent;

/// Default ceiling for transient slots. Kept far below the groups regular
/// handlers use so transient handlers run first.
pub const DEFAULT_SLOT_CEILING: i32 = -1000;

type Callback = dyn Fn(&MessageEvent) + Send + Sync;

/// Identifies one registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

#[derive(Clone)]
pub struct Handler {
    id: HandlerId,
    filter: Filter,
    callback: Arc<Callback>,
}

impl Handler {
    pub fn new<F>(filter: Filter, callback: F) -> Self
    where
        F: Fn(&MessageEvent) + Send + Sync + 'static,
    {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self {
            id: HandlerId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            filter,
            callback: Arc::new(callback),
        }
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    fn handle(&self, event: &MessageEvent) {
        let accepted = match event.message() {
            Some(message) => self.filter.matches(message),
            None => true,
        };
        if accepted {
            (self.callback)(event);
        }
    }
}

/// First key at or below `ceiling` that is not in `groups`.
pub fn find_free_slot<V>(groups: &BTreeMap<i32, V>, ceiling: i32) -> i32 {
    let mut slot = ceiling;
    while groups.contains_key(&slot) {
        slot -= 1;
    }
    slot
}

#[derive(Default)]
pub struct DispatchRegistry {
    groups: Mutex<BTreeMap<i32, Vec<Handler>>>,
}

impl DispatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently in use, ascending.
    pub fn slots(&self) -> Vec<i32> {
        self.groups.lock().keys().copied().collect()
    }

    /// Add a handler to a fixed group, creating the group if needed.
    pub fn insert(&self, slot: i32, handler: Handler) {
        self.groups.lock().entry(slot).or_default().push(handler);
    }

    /// Find a free slot at or below `ceiling` and install `handler` there,
    /// all under one lock acquisition.
    pub fn reserve_and_insert(&self, ceiling: i32, handler: Handler) -> i32 {
        let mut groups = self.groups.lock();
        let slot = find_free_slot(&groups, ceiling);
        groups.insert(slot, vec![handler]);
        debug!("Reserved dispatch slot {slot}");
        slot
    }

    /// Remove exactly the handler `id` from `slot`. The group is dropped once
    /// empty so the slot becomes free again. A missing slot is a lifecycle error.
    pub fn remove_exact(&self, slot: i32, id: HandlerId) -> Result<(), CollectError> {
        let mut groups = self.groups.lock();
        let Some(handlers) = groups.get_mut(&slot) else {
            return Err(CollectError::SubscriptionLifecycle { slot });
        };
        handlers.retain(|h| h.id != id);
        if handlers.is_empty() {
            groups.remove(&slot);
        }
        debug!("Released dispatch slot {slot}");
        Ok(())
    }

    /// Deliver an event to every handler, groups in ascending key order.
    pub fn dispatch(&self, event: &MessageEvent) {
        // Handlers run without the lock so they may touch the registry themselves.
        let handlers: Vec<Handler> = self.groups.lock().values().flatten().cloned().collect();
        for handler in &handlers {
            handler.handle(event);
        }
    }

    /// Drop a whole group regardless of who owns it.
    pub fn clear_slot(&self, slot: i32) -> bool {
        self.groups.lock().remove(&slot).is_some()
    }
}
