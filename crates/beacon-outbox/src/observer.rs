//! Delivery observer slot.

use crate::Event;
use parking_lot::RwLock;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;

/// Error an observer may report. It is logged and otherwise ignored.
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Host capability invoked for every accepted event, before it is queued.
pub trait EventObserver: Send + Sync {
    fn on_event(&self, event: &Event) -> Result<(), ObserverError>;
}

impl<F> EventObserver for F
where
    F: Fn(&Event) -> Result<(), ObserverError> + Send + Sync,
{
    fn on_event(&self, event: &Event) -> Result<(), ObserverError> {
        self(event)
    }
}

/// Replaceable single-observer slot.
///
/// Cloning shares the slot.
#[derive(Clone, Default)]
pub struct ObserverSlot {
    inner: Arc<RwLock<Option<Arc<dyn EventObserver>>>>,
}

impl ObserverSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `observer`, returning the previous one.
    pub fn replace(&self, observer: Arc<dyn EventObserver>) -> Option<Arc<dyn EventObserver>> {
        self.inner.write().replace(observer)
    }

    pub fn clear(&self) -> Option<Arc<dyn EventObserver>> {
        self.inner.write().take()
    }

    pub fn is_registered(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Invoke the observer, if any. Returns whether one was registered.
    ///
    /// Errors and panics raised by the observer are logged and swallowed. The
    /// slot lock is released before the call so an observer may replace
    /// itself.
    pub fn notify(&self, event: &Event) -> bool {
        let Some(observer) = self.inner.read().clone() else {
            return false;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| observer.on_event(event))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                error!(event_id = %event.event_id(), error = %err, "Event observer failed");
            }
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                error!(event_id = %event.event_id(), panic = %message, "Event observer panicked");
            }
        }
        true
    }
}
