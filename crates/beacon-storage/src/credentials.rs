//! Credential accessors over a key-value backend.

use crate::{KeyValueStore, StorageKeys, StorageResult};
use std::sync::Arc;

/// High-level API for the collector API key, session and user identifiers.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    /// Create a credential store over the given backend.
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Store the API key
    pub fn set_api_key(&self, api_key: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::API_KEY, api_key)
    }

    /// Retrieve the API key. Blank values count as absent.
    pub fn get_api_key(&self) -> StorageResult<Option<String>> {
        Ok(non_blank(self.storage.get(StorageKeys::API_KEY)?))
    }

    /// Store the session identifier
    pub fn set_session_id(&self, session_id: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::SESSION_ID, session_id)
    }

    /// Retrieve the session identifier. Blank values count as absent.
    pub fn get_session_id(&self) -> StorageResult<Option<String>> {
        Ok(non_blank(self.storage.get(StorageKeys::SESSION_ID)?))
    }

    /// Store the user identifier
    pub fn set_user_id(&self, user_id: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::USER_ID, user_id)
    }

    /// Retrieve the user identifier. Blank values count as absent.
    pub fn get_user_id(&self) -> StorageResult<Option<String>> {
        Ok(non_blank(self.storage.get(StorageKeys::USER_ID)?))
    }

    /// Remove all stored credentials.
    pub fn clear(&self) -> StorageResult<()> {
        self.storage.delete(StorageKeys::API_KEY)?;
        self.storage.delete(StorageKeys::SESSION_ID)?;
        self.storage.delete(StorageKeys::USER_ID)?;
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
