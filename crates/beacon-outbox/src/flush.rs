//! Periodic flush of the event queue.

use crate::{EventQueue, OutboxError, OutboxResult, SendOutcome, TransmissionController};
use beacon_config_and_utils::{FLUSH_INTERVAL_MAX_SECS, FLUSH_INTERVAL_MIN_SECS};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Check a flush interval in seconds and convert it.
pub fn validate_flush_interval(secs: f64) -> OutboxResult<Duration> {
    if !secs.is_finite() || !(FLUSH_INTERVAL_MIN_SECS..=FLUSH_INTERVAL_MAX_SECS).contains(&secs) {
        warn!(
            interval_secs = secs,
            min = FLUSH_INTERVAL_MIN_SECS,
            max = FLUSH_INTERVAL_MAX_SECS,
            "Rejected flush interval"
        );
        return Err(OutboxError::Validation(format!(
            "flush interval must be between {} and {} seconds, got {}",
            FLUSH_INTERVAL_MIN_SECS, FLUSH_INTERVAL_MAX_SECS, secs
        )));
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Hand every untransmitted queued event to the controller.
pub async fn flush_once(queue: &EventQueue, controller: &TransmissionController) -> SendOutcome {
    if queue.is_empty() {
        return SendOutcome::Empty;
    }
    let batch = queue.select_untransmitted();
    if batch.is_empty() {
        return SendOutcome::Empty;
    }
    controller.send_batch(batch).await
}

/// Owns the flush timer task.
#[derive(Default)]
pub struct FlushScheduler {
    task: Mutex<Option<JoinHandle<()>>>,
}

impl FlushScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking every `period`, replacing any running timer. `period`
    /// must be non-zero; see [`validate_flush_interval`].
    ///
    /// The first tick fires one period from now. Each tick flushes in its own
    /// task so a slow exchange never delays the timer.
    pub fn start(
        &self,
        period: Duration,
        queue: Arc<EventQueue>,
        controller: Arc<TransmissionController>,
    ) {
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if queue.is_empty() {
                    continue;
                }
                let queue = queue.clone();
                let controller = controller.clone();
                tokio::spawn(async move {
                    let outcome = flush_once(&queue, &controller).await;
                    debug!(?outcome, "Flush tick finished");
                });
            }
        });

        if let Some(previous) = self.task.lock().replace(task) {
            previous.abort();
        }
        info!(interval_ms = period.as_millis() as u64, "Flush scheduler started");
    }

    /// Stop the timer. Sends already started run to completion.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            info!("Flush scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}
