//! Outbox error types.

use thiserror::Error;

/// Outbox error type.
#[derive(Error, Debug)]
pub enum OutboxError {
    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(#[from] beacon_storage::StorageError),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Collector answered outside the success range
    #[error("Send failed: HTTP {status}")]
    Send {
        /// HTTP status returned by the collector.
        status: u16,
    },

    /// Request could not be built
    #[error("Request error: {0}")]
    Request(String),

    /// Invalid argument or configuration
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias using OutboxError.
pub type OutboxResult<T> = Result<T, OutboxError>;

/// Why `track` refused an event. No state changes when this is returned.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackRejection {
    /// Event id was empty
    #[error("event id must not be empty")]
    EmptyEventId,

    /// No delivery observer is registered
    #[error("no delivery observer registered")]
    NoObserver,

    /// Credentials are missing
    #[error("not authorized to track events")]
    Unauthorized,
}
