//! Pipeline context tying the queue, recovery store and schedulers together.

use crate::{
    flush_once, retry_unsent_events, retry_unsent_events_with, validate_flush_interval,
    CollectorClient, CredentialProvider, Event, EventObserver, EventQueue, EventTracker,
    FlushScheduler, HttpCollectorClient, IdleMonitor, IdleState, InteractionSignal,
    MetadataProvider, NoLocation, ObserverSlot, OutboxResult, PathSource, RecoveryStore,
    RetryOutcome, RetryPolicy, SendOutcome, SenderConfig, StaticPath, SystemMetadataProvider,
    TrackRejection, TransmissionController,
};
use beacon_config_and_utils::{parse_properties, Config, Paths};
use beacon_storage::{create_storage, CredentialStore, KeyValueStore, StorageKeys};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Pipeline tuning, usually derived from [`Config`].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub flush_interval_secs: f64,
    pub retry: RetryPolicy,
    /// Idle monitor threshold; `None` leaves the monitor off at start.
    pub idle_threshold: Option<Duration>,
    pub recovery_key: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: 10.0,
            retry: RetryPolicy::default(),
            idle_threshold: None,
            recovery_key: StorageKeys::UNSENT_EVENTS.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            flush_interval_secs: config.flush_interval_secs,
            retry: RetryPolicy::from_config(config),
            idle_threshold: config.idle_threshold_secs.map(Duration::from_secs),
            recovery_key: config.recovery_key.clone(),
        }
    }
}

/// External collaborators of a pipeline.
#[derive(Clone)]
pub struct PipelineDeps {
    pub storage: Arc<dyn KeyValueStore>,
    pub collector: Arc<dyn CollectorClient>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub metadata: Arc<dyn MetadataProvider>,
    pub path: Arc<dyn PathSource>,
}

impl PipelineDeps {
    /// Production collaborators: file storage under `paths`, HTTP collector,
    /// stored credentials and process metadata.
    pub fn system(config: &Config, paths: &Paths) -> OutboxResult<Self> {
        let storage = create_storage(paths)?;
        let collector = HttpCollectorClient::new(SenderConfig::from_config(config))?;
        let metadata = SystemMetadataProvider::new(
            Arc::new(NoLocation),
            Duration::from_millis(config.location_timeout_ms),
        );

        Ok(Self {
            credentials: Arc::new(CredentialStore::new(storage.clone())),
            storage,
            collector: Arc::new(collector),
            metadata: Arc::new(metadata),
            path: Arc::new(StaticPath::default()),
        })
    }
}

/// Point-in-time view of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStatus {
    /// Events in the queue, in flight or not.
    pub queued: usize,
    /// Queued events not currently in flight.
    pub untransmitted: usize,
    /// Events in the recovery store.
    pub persisted: usize,
    pub in_flight: bool,
    pub flush_running: bool,
    pub idle_enabled: bool,
    pub idle_state: IdleState,
}

/// The delivery pipeline.
///
/// Built once per host process with [`Pipeline::init`] and torn down with
/// [`Pipeline::shutdown`]. All methods that spawn timers must be called from
/// within a tokio runtime.
pub struct Pipeline {
    config: PipelineConfig,
    queue: Arc<EventQueue>,
    recovery: Arc<RecoveryStore>,
    controller: Arc<TransmissionController>,
    tracker: Arc<EventTracker>,
    flush: FlushScheduler,
    idle: IdleMonitor,
    retry_task: Mutex<Option<JoinHandle<RetryOutcome>>>,
}

impl Pipeline {
    /// Wire up a pipeline. Nothing runs until [`Pipeline::start`].
    pub fn init(config: PipelineConfig, deps: PipelineDeps) -> Self {
        let queue = Arc::new(EventQueue::new());
        let recovery = Arc::new(RecoveryStore::new(deps.storage, config.recovery_key.clone()));
        let controller = Arc::new(TransmissionController::new(
            queue.clone(),
            recovery.clone(),
            deps.collector,
            deps.metadata,
            deps.credentials.clone(),
        ));
        let tracker = Arc::new(EventTracker::new(
            queue.clone(),
            ObserverSlot::new(),
            deps.credentials,
        ));
        let idle = IdleMonitor::new(tracker.clone(), deps.path);

        Self {
            config,
            queue,
            recovery,
            controller,
            tracker,
            flush: FlushScheduler::new(),
            idle,
            retry_task: Mutex::new(None),
        }
    }

    /// Start the flush timer, the idle monitor if configured, and a background
    /// retry of events persisted by an earlier run.
    pub fn start(&self) -> OutboxResult<()> {
        self.start_flush(self.config.flush_interval_secs)?;

        if let Some(threshold) = self.config.idle_threshold {
            self.idle.enable(threshold);
        }

        let recovery = self.recovery.clone();
        let controller = self.controller.clone();
        let policy = self.config.retry;
        let task = tokio::spawn(async move { retry_unsent_events(&recovery, &controller, policy).await });
        if let Some(previous) = self.retry_task.lock().replace(task) {
            previous.abort();
        }

        info!(
            flush_interval_secs = self.config.flush_interval_secs,
            idle = self.config.idle_threshold.is_some(),
            "Pipeline started"
        );
        Ok(())
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Install the delivery observer, replacing any previous one.
    pub fn set_observer(&self, observer: Arc<dyn EventObserver>) {
        self.tracker.observer().replace(observer);
    }

    pub fn clear_observer(&self) {
        self.tracker.observer().clear();
    }

    /// Enqueue an event.
    pub fn track(
        &self,
        event_id: &str,
        properties: Map<String, Value>,
    ) -> Result<Event, TrackRejection> {
        self.tracker.track(event_id, properties)
    }

    /// Enqueue an event whose properties arrive as raw JSON text.
    ///
    /// Malformed or non-object JSON is replaced by empty properties.
    pub fn track_raw(&self, event_id: &str, raw_properties: &str) -> Result<Event, TrackRejection> {
        self.tracker.track(event_id, parse_properties(raw_properties))
    }

    pub async fn send_batch(&self, batch: Vec<Event>) -> SendOutcome {
        self.controller.send_batch(batch).await
    }

    /// Run one flush pass now.
    pub async fn flush_now(&self) -> SendOutcome {
        flush_once(&self.queue, &self.controller).await
    }

    /// (Re)start the flush timer. Out-of-range intervals leave any running
    /// timer untouched.
    pub fn start_flush(&self, interval_secs: f64) -> OutboxResult<()> {
        let period = validate_flush_interval(interval_secs)?;
        self.flush
            .start(period, self.queue.clone(), self.controller.clone());
        Ok(())
    }

    pub fn stop_flush(&self) {
        self.flush.stop();
    }

    pub async fn retry_unsent_events(&self, max_attempts: u32, interval: Duration) -> RetryOutcome {
        retry_unsent_events(
            &self.recovery,
            &self.controller,
            RetryPolicy::new(max_attempts, interval),
        )
        .await
    }

    pub async fn retry_unsent_events_with<D, F>(&self, policy: RetryPolicy, delay: D) -> RetryOutcome
    where
        D: FnMut(Duration) -> F,
        F: Future<Output = ()>,
    {
        retry_unsent_events_with(&self.recovery, &self.controller, policy, delay).await
    }

    /// Retry with the configured policy.
    pub async fn retry_with_config(&self) -> RetryOutcome {
        retry_unsent_events(&self.recovery, &self.controller, self.config.retry).await
    }

    pub fn idle_monitor(&self) -> &IdleMonitor {
        &self.idle
    }

    pub fn toggle_idle(&self, enabled: bool, threshold: Duration) {
        self.idle.toggle(enabled, threshold);
    }

    pub fn observe_interaction(&self, signal: InteractionSignal) {
        self.idle.observe(signal);
    }

    /// Contents of the recovery store.
    pub fn unsent_events(&self) -> Vec<Event> {
        self.recovery.load()
    }

    /// Drop every persisted event.
    pub fn reset_recovery(&self) {
        self.recovery.reset();
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            queued: self.queue.len(),
            untransmitted: self.queue.untransmitted_count(),
            persisted: self.recovery.load().len(),
            in_flight: self.controller.is_in_flight(),
            flush_running: self.flush.is_running(),
            idle_enabled: self.idle.is_enabled(),
            idle_state: self.idle.state(),
        }
    }

    /// Stop timers and background work. Queued events that were never sent
    /// are dropped; persisted events stay for the next run.
    pub fn shutdown(&self) {
        self.flush.stop();
        self.idle.disable();
        if let Some(task) = self.retry_task.lock().take() {
            task.abort();
        }
        debug!(queued = self.queue.len(), "Pipeline shut down");
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if let Some(task) = self.retry_task.get_mut().take() {
            task.abort();
        }
    }
}
