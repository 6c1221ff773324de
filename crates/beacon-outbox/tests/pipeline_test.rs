//! End-to-end tests for the delivery pipeline.
//!
//! Every test drives a `Pipeline` through its public API with recording
//! collaborators in place of the network, storage and host.

use std::sync::Arc;
use std::time::Duration;

use beacon_outbox::testing::{RecordingCollector, RecordingObserver, StaticMetadata};
use beacon_outbox::{
    Event, IdleState, InteractionSignal, Pipeline, PipelineConfig, PipelineDeps, RetryOutcome,
    RetryPolicy, SendOutcome, StaticCredentials, StaticPath, TrackRejection, IDLE_END_EVENT,
    IDLE_START_EVENT,
};
use beacon_storage::{FileStore, KeyValueStore, MemoryStore, StorageKeys};
use serde_json::{json, Map, Value};
use tokio::time::Instant;

struct Harness {
    pipeline: Pipeline,
    collector: Arc<RecordingCollector>,
    observer: Arc<RecordingObserver>,
    storage: Arc<dyn KeyValueStore>,
}

fn harness_with(collector: RecordingCollector, storage: Arc<dyn KeyValueStore>) -> Harness {
    let collector = Arc::new(collector);
    let observer = Arc::new(RecordingObserver::new());
    let pipeline = Pipeline::init(
        PipelineConfig::default(),
        PipelineDeps {
            storage: storage.clone(),
            collector: collector.clone(),
            credentials: Arc::new(StaticCredentials::new("api-key", "session-1")),
            metadata: Arc::new(StaticMetadata::default()),
            path: Arc::new(StaticPath::new("/checkout")),
        },
    );
    pipeline.set_observer(observer.clone());
    Harness {
        pipeline,
        collector,
        observer,
        storage,
    }
}

fn harness(collector: RecordingCollector) -> Harness {
    harness_with(collector, Arc::new(MemoryStore::new()))
}

fn props(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {}", other),
    }
}

fn track(h: &Harness, id: &str, n: i64) -> Event {
    h.pipeline.track(id, props(json!({ "n": n }))).unwrap()
}

#[tokio::test]
async fn test_rejections_leave_no_trace() {
    let h = harness(RecordingCollector::succeeding());

    assert_eq!(
        h.pipeline.track("", Map::new()),
        Err(TrackRejection::EmptyEventId)
    );
    h.pipeline.clear_observer();
    assert_eq!(
        h.pipeline.track("click", Map::new()),
        Err(TrackRejection::NoObserver)
    );

    let status = h.pipeline.status();
    assert_eq!(status.queued, 0);
    assert!(h.observer.events().is_empty());
    assert_eq!(h.pipeline.flush_now().await, SendOutcome::Empty);
}

#[tokio::test]
async fn test_selection_is_fifo() {
    let h = harness(RecordingCollector::succeeding());
    let e1 = track(&h, "e1", 1);
    let e2 = track(&h, "e2", 2);
    let e3 = track(&h, "e3", 3);

    assert_eq!(h.pipeline.queue().select_untransmitted(), vec![e1.clone(), e2.clone(), e3.clone()]);
    assert_eq!(h.observer.events(), vec![e1.clone(), e2.clone(), e3.clone()]);

    assert!(h.pipeline.flush_now().await.is_delivered());
    assert_eq!(h.collector.requests()[0].events, vec![e1, e2, e3]);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_sends_hit_collector_once() {
    let h = harness(RecordingCollector::succeeding().with_latency(Duration::from_millis(250)));
    let e1 = track(&h, "e1", 1);
    let e2 = track(&h, "e2", 2);

    let first = vec![e1.clone()];
    let second = vec![e1, e2];
    let (a, b) = tokio::join!(h.pipeline.send_batch(first), h.pipeline.send_batch(second));

    assert_eq!(a, SendOutcome::Delivered { count: 1 });
    assert_eq!(b, SendOutcome::Skipped);
    assert_eq!(h.collector.request_count(), 1);
    assert!(!h.pipeline.status().in_flight);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_event_during_flush_is_not_lost() {
    let h = harness(RecordingCollector::succeeding().with_latency(Duration::from_millis(100)));
    let first = track(&h, "click", 1);

    let (outcome, second) = tokio::join!(h.pipeline.flush_now(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        track(&h, "click", 1)
    });
    assert_eq!(outcome, SendOutcome::Delivered { count: 1 });
    assert_eq!(h.pipeline.status().queued, 1);

    assert_eq!(h.pipeline.flush_now().await, SendOutcome::Delivered { count: 1 });
    assert_eq!(h.collector.delivered_events(), vec![first, second]);
    assert_eq!(h.pipeline.status().queued, 0);
}

#[tokio::test]
async fn test_failed_send_keeps_events_queued_and_persisted() {
    let h = harness(RecordingCollector::failing_with_status(500));
    let e1 = track(&h, "e1", 1);
    let e2 = track(&h, "e2", 2);

    let outcome = h.pipeline.send_batch(vec![e1.clone(), e2.clone()]).await;
    assert!(matches!(outcome, SendOutcome::Failed { count: 2, .. }));

    assert_eq!(h.pipeline.queue().select_untransmitted(), vec![e1.clone(), e2.clone()]);
    assert_eq!(h.pipeline.unsent_events(), vec![e1.clone(), e2.clone()]);

    // A second failure of the same batch does not duplicate entries.
    h.pipeline.send_batch(vec![e1.clone(), e2.clone()]).await;
    assert_eq!(h.pipeline.unsent_events(), vec![e1, e2]);

    let status = h.pipeline.status();
    assert_eq!(status.queued, 2);
    assert_eq!(status.untransmitted, 2);
    assert_eq!(status.persisted, 2);
}

#[tokio::test]
async fn test_success_removes_only_the_batch() {
    let h = harness(RecordingCollector::with_statuses([500]));
    let e1 = track(&h, "e1", 1);
    let e2 = track(&h, "e2", 2);
    let e3 = track(&h, "e3", 3);

    h.pipeline.send_batch(vec![e1.clone(), e2.clone(), e3.clone()]).await;
    assert_eq!(h.pipeline.unsent_events().len(), 3);

    let outcome = h.pipeline.send_batch(vec![e1, e2]).await;
    assert_eq!(outcome, SendOutcome::Delivered { count: 2 });
    assert_eq!(h.pipeline.queue().select_untransmitted(), vec![e3.clone()]);
    assert_eq!(h.pipeline.unsent_events(), vec![e3]);
}

#[tokio::test(start_paused = true)]
async fn test_retry_is_bounded() {
    let h = harness(RecordingCollector::failing_transport());
    let e1 = track(&h, "e1", 1);
    h.pipeline.flush_now().await;
    let baseline = h.collector.request_count();

    let started = Instant::now();
    let outcome = h
        .pipeline
        .retry_unsent_events(3, Duration::from_secs(1))
        .await;

    assert_eq!(outcome, RetryOutcome::Exhausted { attempts: 3, remaining: 1 });
    assert_eq!(h.collector.request_count(), baseline + 3);
    assert_eq!(started.elapsed(), Duration::from_secs(2));

    let times = h.collector.request_times();
    let retries = &times[baseline..];
    assert_eq!(retries[1] - retries[0], Duration::from_secs(1));
    assert_eq!(retries[2] - retries[1], Duration::from_secs(1));
    assert_eq!(h.pipeline.unsent_events(), vec![e1]);
}

#[tokio::test]
async fn test_retry_drains_once_collector_recovers() {
    let h = harness(RecordingCollector::with_statuses([503, 503]));
    track(&h, "e1", 1);
    track(&h, "e2", 2);
    h.pipeline.flush_now().await;

    let outcome = h
        .pipeline
        .retry_unsent_events_with(RetryPolicy::new(5, Duration::from_secs(1)), |_| async {})
        .await;

    assert_eq!(outcome, RetryOutcome::Drained { attempts: 2 });
    assert!(h.pipeline.unsent_events().is_empty());
    assert_eq!(h.pipeline.status().queued, 0);
}

#[tokio::test(start_paused = true)]
async fn test_idle_transitions() {
    let h = harness(RecordingCollector::succeeding());
    let start = Instant::now();
    h.pipeline.toggle_idle(true, Duration::from_secs(10));

    tokio::time::sleep_until(start + Duration::from_millis(9_900)).await;
    assert_eq!(h.pipeline.status().idle_state, IdleState::Active);

    tokio::time::sleep_until(start + Duration::from_millis(10_100)).await;
    assert_eq!(h.pipeline.status().idle_state, IdleState::Idle);
    assert_eq!(h.observer.event_ids(), vec![IDLE_START_EVENT]);

    tokio::time::sleep_until(start + Duration::from_secs(15)).await;
    h.pipeline.observe_interaction(InteractionSignal::PointerDown);
    assert_eq!(h.pipeline.status().idle_state, IdleState::Active);
    assert_eq!(h.observer.event_ids(), vec![IDLE_START_EVENT, IDLE_END_EVENT]);

    let queued = h.pipeline.queue().select_untransmitted();
    assert_eq!(queued.len(), 2);
    assert_eq!(queued[1].properties()["path"], json!("/checkout"));

    h.pipeline.shutdown();
    assert!(!h.pipeline.status().idle_enabled);
}

#[tokio::test]
async fn test_reset_discards_persisted_events() {
    let h = harness(RecordingCollector::with_statuses([500]));
    track(&h, "e1", 1);
    h.pipeline.flush_now().await;
    assert_eq!(h.pipeline.unsent_events().len(), 1);

    h.pipeline.reset_recovery();
    assert!(h.pipeline.unsent_events().is_empty());
    assert_eq!(h.storage.get(StorageKeys::UNSENT_EVENTS).unwrap(), None);

    let outcome = h
        .pipeline
        .retry_unsent_events_with(RetryPolicy::default(), |_| async {})
        .await;
    assert_eq!(outcome, RetryOutcome::NothingToRetry);
    assert_eq!(h.collector.request_count(), 1);
}

#[tokio::test]
async fn test_persisted_events_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let e1;
    {
        let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(dir.path()).unwrap());
        let h = harness_with(RecordingCollector::failing_with_status(502), storage);
        e1 = track(&h, "e1", 1);
        h.pipeline.flush_now().await;
        h.pipeline.shutdown();
    }

    let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(dir.path()).unwrap());
    let h = harness_with(RecordingCollector::succeeding(), storage);
    assert_eq!(h.pipeline.unsent_events(), vec![e1.clone()]);

    let outcome = h
        .pipeline
        .retry_unsent_events_with(RetryPolicy::default(), |_| async {})
        .await;
    assert_eq!(outcome, RetryOutcome::Drained { attempts: 1 });
    assert_eq!(h.collector.delivered_events(), vec![e1]);
}

#[tokio::test]
async fn test_storage_outage_does_not_block_tracking() {
    let backend = Arc::new(MemoryStore::new());
    let h = harness_with(RecordingCollector::failing_with_status(500), backend.clone());
    backend.set_unavailable(true);

    track(&h, "e1", 1);
    let outcome = h.pipeline.flush_now().await;
    assert!(matches!(outcome, SendOutcome::Failed { .. }));
    assert!(h.pipeline.unsent_events().is_empty());
    assert_eq!(h.pipeline.status().queued, 1);
}
