//! Active Set
//!
//! Fixed-capacity table of in-flight items, indexed by slot. Slot numbers are
//! what the worker reports back on completion, so the collector can free the
//! exact entry and cross-check the item index.

use super::error::ExecutorError;

/// A currently running item
#[derive(Debug, Clone)]
pub struct ActiveSlot {
    /// Sequence index of the item occupying the slot
    pub index: usize,
}

/// Slot-indexed set of running items, never larger than its capacity
#[derive(Debug)]
pub struct ActiveSet {
    slots: Vec<Option<ActiveSlot>>,
    len: usize,
}

impl ActiveSet {
    /// Create an empty set with `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            len: 0,
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no item is running.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether another item can be admitted.
    pub fn has_free_slot(&self) -> bool {
        self.len < self.slots.len()
    }

    /// Place `index` in the lowest free slot and return the slot number.
    pub fn occupy(&mut self, index: usize) -> Result<usize, ExecutorError> {
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(ExecutorError::ActiveSetFull {
                capacity: self.slots.len(),
            })?;
        self.slots[slot] = Some(ActiveSlot { index });
        self.len += 1;
        Ok(slot)
    }

    /// Free `slot`, returning what occupied it.
    pub fn release(&mut self, slot: usize) -> Result<ActiveSlot, ExecutorError> {
        let entry = self
            .slots
            .get_mut(slot)
            .and_then(Option::take)
            .ok_or(ExecutorError::VacantSlot(slot))?;
        self.len -= 1;
        Ok(entry)
    }

    /// Sequence indices of running items, in slot order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter().flatten().map(|slot| slot.index)
    }
}
