//! In-memory event queue.

use crate::{Event, EventFingerprint};
use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::debug;

/// A queued event plus its delivery bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEvent {
    pub event: Event,
    /// Set while a batch containing this event is in flight, so concurrent
    /// selections skip it. Cleared again if that send fails.
    pub is_tracked: bool,
}

/// FIFO buffer of events awaiting confirmed delivery.
///
/// Lives for the process lifetime only; events that must survive a restart
/// are mirrored into the [`RecoveryStore`](crate::RecoveryStore) when a send
/// fails. Entries leave the queue only through [`EventQueue::remove_tracked`],
/// which the transmission controller calls after a confirmed delivery.
#[derive(Debug, Default)]
pub struct EventQueue {
    entries: Mutex<Vec<QueuedEvent>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event at the tail.
    pub fn push(&self, event: Event) {
        self.entries.lock().push(QueuedEvent {
            event,
            is_tracked: false,
        });
    }

    /// All events not currently in flight, in insertion order.
    pub fn select_untransmitted(&self) -> Vec<Event> {
        self.entries
            .lock()
            .iter()
            .filter(|entry| !entry.is_tracked)
            .map(|entry| entry.event.clone())
            .collect()
    }

    /// Remove in-flight entries whose fingerprint is in `matching`.
    ///
    /// Untracked copies pushed after the batch was marked were never sent and
    /// stay queued. Returns the number of entries removed.
    pub fn remove_tracked(&self, matching: &HashSet<EventFingerprint>) -> usize {
        if matching.is_empty() {
            return 0;
        }
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|entry| {
            !(entry.is_tracked && matching.contains(&entry.event.fingerprint()))
        });
        let removed = before - entries.len();
        debug!(removed, remaining = entries.len(), "Removed delivered events from queue");
        removed
    }

    /// Flag matching entries as in flight.
    pub fn mark_tracked(&self, matching: &HashSet<EventFingerprint>) {
        self.set_tracked(matching, true);
    }

    /// Return matching entries to the untransmitted pool.
    pub fn clear_tracked(&self, matching: &HashSet<EventFingerprint>) {
        self.set_tracked(matching, false);
    }

    fn set_tracked(&self, matching: &HashSet<EventFingerprint>, tracked: bool) {
        if matching.is_empty() {
            return;
        }
        for entry in self.entries.lock().iter_mut() {
            if matching.contains(&entry.event.fingerprint()) {
                entry.is_tracked = tracked;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Number of entries not currently in flight.
    pub fn untransmitted_count(&self) -> usize {
        self.entries.lock().iter().filter(|e| !e.is_tracked).count()
    }

    /// Copy of the current entries, in order.
    pub fn snapshot(&self) -> Vec<QueuedEvent> {
        self.entries.lock().clone()
    }
}
