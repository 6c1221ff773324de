//! Durable store for events whose delivery has not been confirmed.

use crate::{fingerprints, Event, EventFingerprint};
use beacon_config_and_utils::parse_json_array;
use beacon_storage::KeyValueStore;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Persisted, deduplicated sequence of unsent events under one storage key.
///
/// The whole sequence is stored as a single JSON array. Every storage failure
/// is logged and absorbed: reads fall back to an empty sequence and writes
/// become no-ops, so a broken backend never interrupts event tracking.
pub struct RecoveryStore {
    storage: Arc<dyn KeyValueStore>,
    key: String,
    /// Serializes load-modify-write cycles.
    write_lock: Mutex<()>,
}

impl RecoveryStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Storage key holding the array.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Full persisted sequence, or empty if absent, corrupted or unreadable.
    pub fn load(&self) -> Vec<Event> {
        let raw = match self.storage.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(key = %self.key, error = %err, "Recovery store unreadable, treating as empty");
                return Vec::new();
            }
        };

        let events: Vec<Event> = parse_json_array(&raw);
        let total = events.len();
        let valid: Vec<Event> = events.into_iter().filter(Event::is_valid).collect();
        if valid.len() != total {
            warn!(
                key = %self.key,
                dropped = total - valid.len(),
                "Dropped persisted events without an event id"
            );
        }
        valid
    }

    /// Merge `batch` into the persisted sequence, skipping events already present.
    ///
    /// Idempotent. Returns the number of newly persisted events.
    pub fn persist(&self, batch: &[Event]) -> usize {
        if batch.is_empty() {
            return 0;
        }
        let _guard = self.write_lock.lock();

        let mut merged = self.load();
        let mut seen = fingerprints(&merged);
        let mut appended = 0;
        for event in batch {
            if seen.insert(event.fingerprint()) {
                merged.push(event.clone());
                appended += 1;
            }
        }

        if appended > 0 {
            self.write(&merged);
        }
        debug!(key = %self.key, appended, total = merged.len(), "Persisted unsent events");
        appended
    }

    /// Remove entries matching `matching`; returns how many were removed.
    pub fn clear(&self, matching: &HashSet<EventFingerprint>) -> usize {
        if matching.is_empty() {
            return 0;
        }
        let _guard = self.write_lock.lock();

        let mut events = self.load();
        let before = events.len();
        events.retain(|event| !matching.contains(&event.fingerprint()));
        let removed = before - events.len();

        if removed > 0 {
            if events.is_empty() {
                self.delete();
            } else {
                self.write(&events);
            }
        }
        removed
    }

    /// Drop the persisted sequence unconditionally.
    pub fn reset(&self) {
        let _guard = self.write_lock.lock();
        self.delete();
        info!(key = %self.key, "Recovery store reset");
    }

    pub fn is_empty(&self) -> bool {
        self.load().is_empty()
    }

    fn write(&self, events: &[Event]) {
        let serialized = match serde_json::to_string(events) {
            Ok(serialized) => serialized,
            Err(err) => {
                warn!(key = %self.key, error = %err, "Failed to serialize unsent events");
                return;
            }
        };
        if let Err(err) = self.storage.set(&self.key, &serialized) {
            warn!(key = %self.key, error = %err, "Failed to write recovery store");
        }
    }

    fn delete(&self) {
        if let Err(err) = self.storage.delete(&self.key) {
            warn!(key = %self.key, error = %err, "Failed to clear recovery store");
        }
    }
}
