//! Pending-change accumulation for incremental index maintenance.
//!
//! File watcher events land here as `(path, kind)` pairs. Redundant
//! operations on the same path coalesce, and a debounce window keeps rapid
//! bursts (git checkouts, IDE auto-save) from triggering one transaction per
//! event. The builder drains a ready batch and applies it atomically.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Kind of change observed for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// Coalescing map of path → latest effective operation.
#[derive(Debug)]
pub struct PendingChanges {
    pending: HashMap<String, ChangeKind>,
    last_event: Option<Instant>,
    debounce: Duration,
}

impl PendingChanges {
    pub fn new(debounce: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            last_event: None,
            debounce,
        }
    }

    /// Record one change, collapsing it with whatever is already pending
    /// for the path.
    pub fn record(&mut self, path: String, kind: ChangeKind) {
        let effective = match (self.pending.get(&path).copied(), kind) {
            // A modify during creation is still a creation.
            (Some(ChangeKind::Created), ChangeKind::Modified) => ChangeKind::Created,
            // Delete then create within one window: the file was replaced.
            (Some(ChangeKind::Deleted), ChangeKind::Created) => ChangeKind::Modified,
            (_, k) => k,
        };
        self.pending.insert(path, effective);
        self.last_event = Some(Instant::now());
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// True when changes are pending and the debounce window has elapsed
    /// since the last event.
    pub fn is_ready(&self) -> bool {
        match self.last_event {
            Some(last) => self.has_pending() && last.elapsed() >= self.debounce,
            None => false,
        }
    }

    /// Take every pending change, resetting the window.
    pub fn drain(&mut self) -> Vec<(String, ChangeKind)> {
        self.last_event = None;
        self.pending.drain().collect()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.last_event = None;
    }
}
