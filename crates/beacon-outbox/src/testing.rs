//! Recording collaborators for tests and embedding hosts.
//!
//! Nothing here touches the network or the filesystem.

use crate::{
    ClientMetadata, CollectorClient, DeliveryRequest, DeliveryResponse, Event, EventObserver,
    MetadataProvider, ObserverError, OutboxError, OutboxResult,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
enum Reply {
    Status(u16),
    TransportError,
}

/// Collector that records every request and answers from a script.
///
/// Scripted replies are consumed in order; once exhausted, every request gets
/// the fallback reply.
pub struct RecordingCollector {
    script: Mutex<VecDeque<Reply>>,
    fallback: Mutex<Reply>,
    latency: Option<Duration>,
    requests: Mutex<Vec<(Instant, DeliveryRequest)>>,
}

impl RecordingCollector {
    fn with_fallback(fallback: Reply) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            latency: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers 200 to everything.
    pub fn succeeding() -> Self {
        Self::with_fallback(Reply::Status(200))
    }

    /// Answers `status` to everything.
    pub fn failing_with_status(status: u16) -> Self {
        Self::with_fallback(Reply::Status(status))
    }

    /// Every exchange fails before producing a status.
    pub fn failing_transport() -> Self {
        Self::with_fallback(Reply::TransportError)
    }

    /// Answers `statuses` in order, then 200.
    pub fn with_statuses(statuses: impl IntoIterator<Item = u16>) -> Self {
        let collector = Self::succeeding();
        collector
            .script
            .lock()
            .extend(statuses.into_iter().map(Reply::Status));
        collector
    }

    /// Delay every answer by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Change the reply used once the script is exhausted.
    pub fn set_fallback_status(&self, status: u16) {
        *self.fallback.lock() = Reply::Status(status);
    }

    pub fn requests(&self) -> Vec<DeliveryRequest> {
        self.requests.lock().iter().map(|(_, r)| r.clone()).collect()
    }

    /// Instants at which each exchange started.
    pub fn request_times(&self) -> Vec<Instant> {
        self.requests.lock().iter().map(|(at, _)| *at).collect()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Every event delivered so far, in request order.
    pub fn delivered_events(&self) -> Vec<Event> {
        self.requests
            .lock()
            .iter()
            .flat_map(|(_, r)| r.events.clone())
            .collect()
    }
}

#[async_trait]
impl CollectorClient for RecordingCollector {
    async fn deliver(&self, request: &DeliveryRequest) -> OutboxResult<DeliveryResponse> {
        self.requests.lock().push((Instant::now(), request.clone()));
        let reply = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| *self.fallback.lock());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match reply {
            Reply::Status(status) => Ok(DeliveryResponse::new(status)),
            Reply::TransportError => Err(OutboxError::Request("connection refused".to_string())),
        }
    }
}

/// Metadata provider returning a fixed value.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata(pub ClientMetadata);

#[async_trait]
impl MetadataProvider for StaticMetadata {
    async fn collect(&self) -> ClientMetadata {
        self.0.clone()
    }
}

/// Observer that records every event it sees.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Ids of the observed events, in order.
    pub fn event_ids(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .map(|e| e.event_id().to_string())
            .collect()
    }
}

impl EventObserver for RecordingObserver {
    fn on_event(&self, event: &Event) -> Result<(), ObserverError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Observer that always reports an error.
pub struct FailingObserver;

impl EventObserver for FailingObserver {
    fn on_event(&self, _event: &Event) -> Result<(), ObserverError> {
        Err("observer failure".into())
    }
}
