//! In-memory storage backend.

use crate::{KeyValueStore, StorageError, StorageResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-local storage. Contents are lost when the process exits.
///
/// `set_unavailable(true)` makes every operation fail, which lets callers
/// exercise their storage-outage paths.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an inaccessible backend.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("memory store disabled".to_string()));
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.check()?;
        self.data.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.check()?;
        Ok(self.data.lock().get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        self.check()?;
        Ok(self.data.lock().remove(key).is_some())
    }
}
