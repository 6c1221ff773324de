//! Idle/active user state machine.
//!
//! ```text
//!            threshold elapsed (emit idl-start)
//!   Active ──────────────────────────────────▶ Idle
//!     ▲  │                                      │
//!     │  └── signal: restart timer              │
//!     └─────────────────────────────────────────┘
//!            signal (emit idl-end, restart timer)
//! ```

use crate::EventTracker;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Emitted when the user goes idle.
pub const IDLE_START_EVENT: &str = "idl-start";

/// Emitted when an idle user interacts again.
pub const IDLE_END_EVENT: &str = "idl-end";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdleState {
    #[default]
    Active,
    Idle,
}

/// User interactions that count as activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionSignal {
    PointerMove,
    PointerDown,
    KeyDown,
    TouchStart,
    Scroll,
}

impl InteractionSignal {
    pub const ALL: [InteractionSignal; 5] = [
        InteractionSignal::PointerMove,
        InteractionSignal::PointerDown,
        InteractionSignal::KeyDown,
        InteractionSignal::TouchStart,
        InteractionSignal::Scroll,
    ];

    /// DOM event name the signal is bound to.
    pub fn dom_event(self) -> &'static str {
        match self {
            InteractionSignal::PointerMove => "mousemove",
            InteractionSignal::PointerDown => "mousedown",
            InteractionSignal::KeyDown => "keydown",
            InteractionSignal::TouchStart => "touchstart",
            InteractionSignal::Scroll => "scroll",
        }
    }

    pub fn from_dom_event(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|signal| signal.dom_event() == name)
    }
}

/// Supplies the current location for idle event payloads.
pub trait PathSource: Send + Sync {
    fn current_path(&self) -> String;
}

/// Fixed location string.
#[derive(Debug, Clone)]
pub struct StaticPath(String);

impl StaticPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }
}

impl Default for StaticPath {
    fn default() -> Self {
        Self::new("/")
    }
}

impl PathSource for StaticPath {
    fn current_path(&self) -> String {
        self.0.clone()
    }
}

struct MonitorState {
    state: IdleState,
    enabled: bool,
    threshold: Duration,
    /// Bumped on every arm and disable; a timer only acts if it still matches.
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

struct Shared {
    state: Mutex<MonitorState>,
    tracker: Arc<EventTracker>,
    path: Arc<dyn PathSource>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(timer) = self.state.get_mut().timer.take() {
            timer.abort();
        }
    }
}

/// Watches interaction signals and emits idle transitions through the tracker.
pub struct IdleMonitor {
    shared: Arc<Shared>,
}

impl IdleMonitor {
    pub fn new(tracker: Arc<EventTracker>, path: Arc<dyn PathSource>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(MonitorState {
                    state: IdleState::Active,
                    enabled: false,
                    threshold: Duration::ZERO,
                    generation: 0,
                    timer: None,
                }),
                tracker,
                path,
            }),
        }
    }

    /// Start watching with the given inactivity threshold.
    ///
    /// Must be called within a tokio runtime. Re-enabling keeps the current
    /// state and restarts the timer with the new threshold.
    pub fn enable(&self, threshold: Duration) {
        let mut state = self.shared.state.lock();
        state.enabled = true;
        state.threshold = threshold;
        arm(&self.shared, &mut state);
        info!(threshold_ms = threshold.as_millis() as u64, state = ?state.state, "Idle monitor enabled");
    }

    /// Stop watching. A pending timer is cancelled and ignored if it already fired.
    pub fn disable(&self) {
        let mut state = self.shared.state.lock();
        if !state.enabled {
            return;
        }
        state.enabled = false;
        state.generation += 1;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        info!("Idle monitor disabled");
    }

    pub fn toggle(&self, enabled: bool, threshold: Duration) {
        if enabled {
            self.enable(threshold);
        } else {
            self.disable();
        }
    }

    /// Record a user interaction.
    pub fn observe(&self, signal: InteractionSignal) {
        let woke = {
            let mut state = self.shared.state.lock();
            if !state.enabled {
                return;
            }
            let woke = state.state == IdleState::Idle;
            state.state = IdleState::Active;
            arm(&self.shared, &mut state);
            woke
        };

        if woke {
            debug!(signal = signal.dom_event(), "User active again");
            self.shared.emit(IDLE_END_EVENT);
        }
    }

    pub fn state(&self) -> IdleState {
        self.shared.state.lock().state
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.state.lock().enabled
    }
}

impl Shared {
    fn on_timeout(&self, generation: u64) {
        {
            let mut state = self.state.lock();
            if !state.enabled || state.generation != generation || state.state != IdleState::Active {
                return;
            }
            state.state = IdleState::Idle;
            state.timer = None;
        }
        debug!("User went idle");
        self.emit(IDLE_START_EVENT);
    }

    fn emit(&self, event_id: &str) {
        let mut properties = Map::new();
        properties.insert("time".into(), json!(chrono::Utc::now().to_rfc3339()));
        properties.insert("path".into(), Value::String(self.path.current_path()));
        if let Err(rejection) = self.tracker.track(event_id, properties) {
            debug!(event_id, reason = %rejection, "Idle transition not recorded");
        }
    }
}

fn arm(shared: &Arc<Shared>, state: &mut MonitorState) {
    state.generation += 1;
    if let Some(timer) = state.timer.take() {
        timer.abort();
    }

    let generation = state.generation;
    let threshold = state.threshold;
    let weak: Weak<Shared> = Arc::downgrade(shared);
    state.timer = Some(tokio::spawn(async move {
        tokio::time::sleep(threshold).await;
        if let Some(shared) = weak.upgrade() {
            shared.on_timeout(generation);
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingObserver;
    use crate::{EventQueue, ObserverSlot, StaticCredentials};

    struct Fixture {
        queue: Arc<EventQueue>,
        observer: Arc<RecordingObserver>,
        slot: ObserverSlot,
        monitor: IdleMonitor,
    }

    fn fixture() -> Fixture {
        let queue = Arc::new(EventQueue::new());
        let observer = Arc::new(RecordingObserver::new());
        let slot = ObserverSlot::new();
        slot.replace(observer.clone());
        let tracker = Arc::new(EventTracker::new(
            queue.clone(),
            slot.clone(),
            Arc::new(StaticCredentials::new("key", "session")),
        ));
        let monitor = IdleMonitor::new(tracker, Arc::new(StaticPath::new("/pricing")));
        Fixture {
            queue,
            observer,
            slot,
            monitor,
        }
    }

    async fn advance_to(start: tokio::time::Instant, secs: f64) {
        tokio::time::sleep_until(start + Duration::from_secs_f64(secs)).await;
    }

    #[test]
    fn signals_map_to_dom_events() {
        for signal in InteractionSignal::ALL {
            assert_eq!(InteractionSignal::from_dom_event(signal.dom_event()), Some(signal));
        }
        assert_eq!(InteractionSignal::from_dom_event("click"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn goes_idle_at_threshold_and_back_on_signal() {
        let f = fixture();
        let start = tokio::time::Instant::now();
        f.monitor.enable(Duration::from_secs(10));

        advance_to(start, 9.9).await;
        assert_eq!(f.monitor.state(), IdleState::Active);
        assert!(f.observer.events().is_empty());

        advance_to(start, 10.1).await;
        assert_eq!(f.monitor.state(), IdleState::Idle);
        assert_eq!(f.observer.event_ids(), vec![IDLE_START_EVENT]);

        advance_to(start, 15.0).await;
        f.monitor.observe(InteractionSignal::PointerMove);
        assert_eq!(f.monitor.state(), IdleState::Active);
        assert_eq!(f.observer.event_ids(), vec![IDLE_START_EVENT, IDLE_END_EVENT]);
        assert_eq!(f.queue.len(), 2);

        let payload = f.observer.events()[0].properties().clone();
        assert_eq!(payload["path"], json!("/pricing"));
        assert!(chrono::DateTime::parse_from_rfc3339(payload["time"].as_str().unwrap()).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_idle_events_still_change_state() {
        let f = fixture();
        f.slot.clear();
        let start = tokio::time::Instant::now();
        f.monitor.enable(Duration::from_secs(10));

        advance_to(start, 10.1).await;
        assert_eq!(f.monitor.state(), IdleState::Idle);
        assert!(f.queue.is_empty());

        f.monitor.observe(InteractionSignal::KeyDown);
        assert_eq!(f.monitor.state(), IdleState::Active);
        assert!(f.queue.is_empty());
        assert!(f.observer.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn activity_restarts_timer_without_events() {
        let f = fixture();
        let start = tokio::time::Instant::now();
        f.monitor.enable(Duration::from_secs(10));

        advance_to(start, 8.0).await;
        f.monitor.observe(InteractionSignal::KeyDown);

        advance_to(start, 17.0).await;
        assert_eq!(f.monitor.state(), IdleState::Active);
        assert!(f.observer.events().is_empty());

        advance_to(start, 18.5).await;
        assert_eq!(f.monitor.state(), IdleState::Idle);
        assert_eq!(f.observer.event_ids(), vec![IDLE_START_EVENT]);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timer_is_not_restarted() {
        let f = fixture();
        f.monitor.enable(Duration::from_secs(1));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(f.observer.event_ids(), vec![IDLE_START_EVENT]);
    }

    #[tokio::test(start_paused = true)]
    async fn disable_cancels_pending_transition() {
        let f = fixture();
        f.monitor.enable(Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(5)).await;
        f.monitor.disable();
        assert!(!f.monitor.is_enabled());

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(f.monitor.state(), IdleState::Active);
        assert!(f.observer.events().is_empty());

        f.monitor.observe(InteractionSignal::Scroll);
        assert!(f.observer.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timer_generation_is_ignored() {
        let f = fixture();
        f.monitor.enable(Duration::from_secs(10));
        let stale = f.monitor.shared.state.lock().generation;

        f.monitor.disable();
        f.monitor.shared.on_timeout(stale);
        assert_eq!(f.monitor.state(), IdleState::Active);

        f.monitor.enable(Duration::from_secs(10));
        f.monitor.shared.on_timeout(stale);
        assert_eq!(f.monitor.state(), IdleState::Active);
        assert!(f.observer.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_composes_enable_and_disable() {
        let f = fixture();
        f.monitor.toggle(true, Duration::from_secs(10));
        assert!(f.monitor.is_enabled());
        f.monitor.toggle(false, Duration::from_secs(10));
        assert!(!f.monitor.is_enabled());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(f.observer.events().is_empty());
    }
}
