//! Single-flight batch transmission.

use crate::{
    fingerprints, CollectorClient, CredentialProvider, DeliveryRequest, Event, EventFingerprint,
    EventQueue, MetadataProvider, OutboxError, RecoveryStore,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Result of one [`TransmissionController::send_batch`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Nothing to send.
    Empty,
    /// Another batch was in flight; nothing changed.
    Skipped,
    /// Credentials were missing; nothing changed.
    Unauthorized,
    /// Collector confirmed the batch; it left the queue and the recovery store.
    Delivered { count: usize },
    /// Batch was persisted for retry.
    Failed { count: usize, error: String },
}

impl SendOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered { .. })
    }
}

/// Sends batches to the collector, at most one at a time.
pub struct TransmissionController {
    queue: Arc<EventQueue>,
    recovery: Arc<RecoveryStore>,
    collector: Arc<dyn CollectorClient>,
    metadata: Arc<dyn MetadataProvider>,
    credentials: Arc<dyn CredentialProvider>,
    in_flight: AtomicBool,
}

impl TransmissionController {
    pub fn new(
        queue: Arc<EventQueue>,
        recovery: Arc<RecoveryStore>,
        collector: Arc<dyn CollectorClient>,
        metadata: Arc<dyn MetadataProvider>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            queue,
            recovery,
            collector,
            metadata,
            credentials,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Whether a batch is currently being sent.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Send `batch` in one exchange.
    ///
    /// The lock is taken before the first await, so of two concurrent calls
    /// exactly one reaches the collector.
    pub async fn send_batch(&self, batch: Vec<Event>) -> SendOutcome {
        if batch.is_empty() {
            return SendOutcome::Empty;
        }

        let keys = fingerprints(&batch);
        let Some(guard) = FlightGuard::acquire(&self.in_flight, &self.queue, keys) else {
            debug!(events = batch.len(), "Send already in flight, skipping batch");
            return SendOutcome::Skipped;
        };

        let credentials = match self.credentials.credentials() {
            Some(credentials) if self.credentials.is_authorized() => credentials,
            _ => {
                warn!(events = batch.len(), "Not authorized, batch not sent");
                return SendOutcome::Unauthorized;
            }
        };

        self.queue.mark_tracked(guard.keys());

        let metadata = self.metadata.collect().await;
        let request = DeliveryRequest {
            batch_id: Uuid::new_v4(),
            user_id: self.credentials.user_id().or(credentials.session_id),
            api_key: credentials.api_key,
            events: batch,
            metadata,
        };
        let count = request.events.len();

        let error = match self.collector.deliver(&request).await {
            Ok(response) if response.is_success() => {
                let removed = self.queue.remove_tracked(guard.keys());
                let cleared = self.recovery.clear(guard.keys());
                info!(
                    batch_id = %request.batch_id,
                    events = count,
                    removed,
                    cleared,
                    "Batch delivered"
                );
                return SendOutcome::Delivered { count };
            }
            Ok(response) => OutboxError::Send {
                status: response.status,
            },
            Err(err) => err,
        };

        let persisted = self.recovery.persist(&request.events);
        error!(
            batch_id = %request.batch_id,
            events = count,
            persisted,
            error = %error,
            "Batch delivery failed, persisted for retry"
        );
        SendOutcome::Failed {
            count,
            error: error.to_string(),
        }
    }
}

/// Holds the transmission lock.
///
/// Dropping it, on any path including cancellation and unwinding, returns
/// still-queued batch events to the untransmitted pool and releases the lock.
struct FlightGuard<'a> {
    flag: &'a AtomicBool,
    queue: &'a EventQueue,
    keys: HashSet<EventFingerprint>,
}

impl<'a> FlightGuard<'a> {
    fn acquire(
        flag: &'a AtomicBool,
        queue: &'a EventQueue,
        keys: HashSet<EventFingerprint>,
    ) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag, queue, keys })
    }

    fn keys(&self) -> &HashSet<EventFingerprint> {
        &self.keys
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.queue.clear_tracked(&self.keys);
        self.flag.store(false, Ordering::Release);
    }
}
