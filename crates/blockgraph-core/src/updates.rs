//! Deduplicated pending-work queues.

use core::hash::Hash;

use indexmap::IndexSet;

/// An insertion-ordered set of pending work items.
///
/// Pushing an item that is already queued is a no-op, so a cell changed
/// many times in one tick is rescanned once.
#[derive(Debug, Clone)]
pub struct UpdateQueue<T: Hash + Eq> {
    items: IndexSet<T>,
}

impl<T: Hash + Eq> Default for UpdateQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Hash + Eq> UpdateQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            items: IndexSet::new(),
        }
    }

    /// Queue an item. Returns `false` if it was already queued.
    pub fn push(&mut self, item: T) -> bool {
        self.items.insert(item)
    }

    /// Queue every item.
    pub fn extend(&mut self, items: impl IntoIterator<Item = T>) {
        self.items.extend(items);
    }

    /// Whether the item is queued.
    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Take every queued item in insertion order, leaving the queue empty.
    ///
    /// Items pushed while the returned batch is processed land in the next
    /// batch.
    pub fn drain(&mut self) -> IndexSet<T> {
        core::mem::take(&mut self.items)
    }
}
