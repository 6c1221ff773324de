//! Reliable delivery pipeline for user-interaction events.
//!
//! This crate provides:
//! - Pipeline: owns the queue, recovery store, schedulers and idle monitor
//! - EventQueue: in-memory FIFO of events awaiting delivery
//! - RecoveryStore: durable, deduplicated copy of events whose send failed
//! - TransmissionController: single-flight batch sender
//! - FlushScheduler / retry loop: periodic and bounded re-delivery
//! - IdleMonitor: emits `idl-start` / `idl-end` from interaction signals
//!
//! ```text
//! track() ──▶ EventQueue ──flush tick──▶ TransmissionController ──▶ collector
//!                 ▲                          │ failure
//!                 │                          ▼
//!            IdleMonitor               RecoveryStore ◀── retry loop
//! ```

mod credentials;
mod error;
mod event;
mod flush;
mod idle;
mod metadata;
mod observer;
mod pipeline;
mod queue;
mod recovery;
mod retry;
mod sender;
pub mod testing;
mod tracker;
mod transmitter;

pub use credentials::{CredentialProvider, Credentials, StaticCredentials};
pub use error::{OutboxError, OutboxResult, TrackRejection};
pub use event::{fingerprints, Event, EventFingerprint};
pub use flush::{flush_once, validate_flush_interval, FlushScheduler};
pub use idle::{
    IdleMonitor, IdleState, InteractionSignal, PathSource, StaticPath, IDLE_END_EVENT,
    IDLE_START_EVENT,
};
pub use metadata::{
    ClientMetadata, Location, LocationSource, MetadataProvider, NoLocation,
    SystemMetadataProvider, UNKNOWN,
};
pub use observer::{EventObserver, ObserverError, ObserverSlot};
pub use pipeline::{Pipeline, PipelineConfig, PipelineDeps, PipelineStatus};
pub use queue::{EventQueue, QueuedEvent};
pub use recovery::RecoveryStore;
pub use retry::{retry_unsent_events, retry_unsent_events_with, RetryOutcome, RetryPolicy};
pub use sender::{
    CollectorClient, DeliveryRequest, DeliveryResponse, HttpCollectorClient, SenderConfig,
};
pub use tracker::EventTracker;
pub use transmitter::{SendOutcome, TransmissionController};
