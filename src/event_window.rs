use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::models::Event;

/// The small, always-sorted-ascending, truncated set of upcoming events
/// held in memory. Held as a lock-free atomic pointer so readers never
/// block a writer mid-swap and never observe a partially-updated window —
/// each reader sees exactly one complete `Vec<Event>` via an `Arc` clone.
pub struct EventWindow {
    inner: ArcSwap<Vec<Event>>,
}

impl EventWindow {
    pub fn new() -> Self {
        EventWindow {
            inner: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Takes a snapshot `Arc` of the current window. Cheap, lock-free.
    pub fn snapshot(&self) -> Arc<Vec<Event>> {
        self.inner.load_full()
    }

    /// Atomically replaces the whole window. Called only by the refresh
    /// pipeline, and only after fetch/parse/expand/filter/sort/truncate
    /// have all completed for the cycle.
    pub fn replace(&self, events: Vec<Event>) {
        self.inner.store(Arc::new(events));
    }

    pub fn len(&self) -> usize {
        self.inner.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventWindow {
    fn default() -> Self {
        Self::new()
    }
}
