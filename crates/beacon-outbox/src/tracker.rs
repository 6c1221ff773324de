//! Enqueue entry point.

use crate::{CredentialProvider, Event, EventQueue, ObserverSlot, TrackRejection};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Validates, announces and enqueues events.
///
/// Shared by the pipeline and the idle monitor so that synthetic events take
/// the same path as host events.
pub struct EventTracker {
    queue: Arc<EventQueue>,
    observer: ObserverSlot,
    credentials: Arc<dyn CredentialProvider>,
}

impl EventTracker {
    pub fn new(
        queue: Arc<EventQueue>,
        observer: ObserverSlot,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            queue,
            observer,
            credentials,
        }
    }

    /// Accept an event into the queue.
    ///
    /// Rejected events leave no trace. Accepted events are handed to the
    /// observer first, then appended.
    pub fn track(
        &self,
        event_id: &str,
        properties: Map<String, Value>,
    ) -> Result<Event, TrackRejection> {
        let event = Event::new(event_id, properties).inspect_err(|_| {
            warn!("Rejected event with empty id");
        })?;

        if !self.observer.is_registered() {
            warn!(event_id, "Rejected event: no delivery observer registered");
            return Err(TrackRejection::NoObserver);
        }

        if !self.credentials.is_authorized() {
            warn!(event_id, "Rejected event: not authorized");
            return Err(TrackRejection::Unauthorized);
        }

        self.observer.notify(&event);
        self.queue.push(event.clone());
        debug!(event_id, queued = self.queue.len(), "Event queued");
        Ok(event)
    }

    pub fn observer(&self) -> &ObserverSlot {
        &self.observer
    }
}
