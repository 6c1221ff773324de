//! Bounded re-delivery of persisted events.

use crate::{RecoveryStore, TransmissionController};
use beacon_config_and_utils::Config;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info};

/// How many passes a retry makes and how long it waits between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            interval: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.retry_max_attempts,
            Duration::from_secs(config.retry_interval_secs),
        )
    }
}

/// How a retry pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The recovery store was already empty.
    NothingToRetry,
    /// The store emptied after `attempts` sends.
    Drained { attempts: u32 },
    /// Attempts ran out; `remaining` events stay persisted.
    Exhausted { attempts: u32, remaining: usize },
}

/// Re-send the recovery store contents until it empties or attempts run out,
/// sleeping `policy.interval` between attempts.
pub async fn retry_unsent_events(
    recovery: &RecoveryStore,
    controller: &TransmissionController,
    policy: RetryPolicy,
) -> RetryOutcome {
    retry_unsent_events_with(recovery, controller, policy, tokio::time::sleep).await
}

/// [`retry_unsent_events`] with a caller-supplied delay.
///
/// There is no wait before the first attempt or after the last one.
pub async fn retry_unsent_events_with<D, F>(
    recovery: &RecoveryStore,
    controller: &TransmissionController,
    policy: RetryPolicy,
    mut delay: D,
) -> RetryOutcome
where
    D: FnMut(Duration) -> F,
    F: Future<Output = ()>,
{
    let mut pending = recovery.load();
    if pending.is_empty() {
        debug!("No unsent events to retry");
        return RetryOutcome::NothingToRetry;
    }

    let mut attempt = 0;
    while attempt < policy.max_attempts {
        attempt += 1;
        let outcome = controller.send_batch(pending).await;
        debug!(attempt, ?outcome, "Retry attempt finished");

        pending = recovery.load();
        if pending.is_empty() {
            info!(attempts = attempt, "Unsent events delivered");
            return RetryOutcome::Drained { attempts: attempt };
        }
        if attempt < policy.max_attempts {
            delay(policy.interval).await;
        }
    }

    error!(
        attempts = attempt,
        remaining = pending.len(),
        "Retry attempts exhausted, events remain persisted"
    );
    RetryOutcome::Exhausted {
        attempts: attempt,
        remaining: pending.len(),
    }
}
