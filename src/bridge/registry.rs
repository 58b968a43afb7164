use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::trace;

use super::host_value::HostFn;
use super::object::HostObject;
use crate::engine::ProxyId;

/// Host object reachable from the engine by id.
#[derive(Clone)]
pub enum Entry {
    Callable(HostFn),
    Object(Arc<HostObject>),
}

struct Slot {
    entry: Entry,
    /// Engine-side references still pointing at this id.
    live: usize,
}

/// Id-to-object table for everything the engine reaches by indirection.
///
/// Ids come from a monotonic counter and are never reused, so a late
/// release for an id that is already gone is harmless. The table has its own
/// lock and never calls into the engine, so it can be used from hooks
/// whether or not the engine gate is held.
pub struct LiveRegistry {
    next: AtomicU64,
    slots: RwLock<HashMap<ProxyId, Slot>>,
}

impl Default for LiveRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveRegistry {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts `entry` with `live` outstanding references and returns its id.
    pub fn register(&self, entry: Entry, live: usize) -> ProxyId {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        self.slots.write().insert(id, Slot { entry, live });
        trace!(id, live, "registered host entry");
        id
    }

    pub fn resolve(&self, id: ProxyId) -> Option<Entry> {
        self.slots.read().get(&id).map(|slot| slot.entry.clone())
    }

    /// Drops one reference. Returns the entry once the last one is gone; the
    /// caller decides when it is safe to drop it.
    pub fn release(&self, id: ProxyId) -> Option<Entry> {
        let mut slots = self.slots.write();
        let slot = slots.get_mut(&id)?;
        slot.live = slot.live.saturating_sub(1);
        if slot.live > 0 {
            return None;
        }
        trace!(id, "released host entry");
        slots.remove(&id).map(|slot| slot.entry)
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
