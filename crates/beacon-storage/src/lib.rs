//! Durable key-value storage for the Beacon pipeline.
//!
//! This crate provides:
//! - **FileStore**: one file per key under `~/.beacon/storage`, replaced atomically
//! - **MemoryStore**: process-local map, for tests and ephemeral hosts
//! - **CredentialStore**: API key and session identifier accessors over any backend

mod credentials;
mod file;
mod keys;
mod memory;
mod traits;

pub use credentials::CredentialStore;
pub use file::FileStore;
pub use keys::StorageKeys;
pub use memory::MemoryStore;
pub use traits::KeyValueStore;

use beacon_config_and_utils::Paths;
use std::sync::Arc;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Key contains characters that cannot be mapped to a file name
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// Stored bytes are not valid UTF-8
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Backend refused the operation
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the default file-backed storage under `paths.storage_dir()`.
pub fn create_storage(paths: &Paths) -> StorageResult<Arc<dyn KeyValueStore>> {
    let store = FileStore::new(paths.storage_dir())?;
    Ok(Arc::new(store))
}
