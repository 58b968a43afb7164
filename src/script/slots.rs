use crate::engine::RawValue;

use super::value::Value;

struct SlotEntry {
    value: Value,
    refs: usize,
}

/// Table of values referenced from the host side.
///
/// Each slot carries its own reference count. A slot is freed when the
/// count reaches zero and its index goes back on the free list, so a
/// [`RawValue`] must not be used after its last reference is released.
#[derive(Default)]
pub struct Slots {
    entries: Vec<Option<SlotEntry>>,
    free_list: Vec<u32>,
    live: usize,
}

impl Slots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` in a fresh slot holding one reference.
    pub fn insert(&mut self, value: Value) -> RawValue {
        self.live += 1;

        let entry = SlotEntry { value, refs: 1 };

        if let Some(idx) = self.free_list.pop() {
            self.entries[idx as usize] = Some(entry);
            RawValue::new(idx)
        } else {
            let idx = self.entries.len() as u32;
            self.entries.push(Some(entry));
            RawValue::new(idx)
        }
    }

    pub fn get(&self, raw: RawValue) -> Option<&Value> {
        self.entries
            .get(raw.index() as usize)
            .and_then(|entry| entry.as_ref())
            .map(|entry| &entry.value)
    }

    pub fn inc(&mut self, raw: RawValue) {
        match self.entry_mut(raw) {
            Some(entry) => entry.refs += 1,
            None => debug_assert!(false, "inc_ref on free slot {}", raw),
        }
    }

    /// Drops one reference. Returns the value when the slot was freed so the
    /// caller can drop it after releasing any borrow of the table.
    pub fn dec(&mut self, raw: RawValue) -> Option<Value> {
        let Some(entry) = self.entry_mut(raw) else {
            debug_assert!(false, "dec_ref on free slot {}", raw);
            return None;
        };

        entry.refs -= 1;
        if entry.refs > 0 {
            return None;
        }

        let idx = raw.index();
        let freed = self.entries[idx as usize].take();
        self.free_list.push(idx);
        self.live -= 1;
        freed.map(|entry| entry.value)
    }

    /// Reads the value and gives up one reference to it.
    pub fn take(&mut self, raw: RawValue) -> Option<Value> {
        let value = self.get(raw).cloned();
        drop(self.dec(raw));
        value
    }

    /// Number of occupied slots.
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Empties the table, handing every value back for the caller to drop.
    pub fn drain(&mut self) -> Vec<Value> {
        self.free_list.clear();
        self.live = 0;
        self.entries
            .drain(..)
            .flatten()
            .map(|entry| entry.value)
            .collect()
    }

    fn entry_mut(&mut self, raw: RawValue) -> Option<&mut SlotEntry> {
        self.entries
            .get_mut(raw.index() as usize)
            .and_then(|entry| entry.as_mut())
    }
}
