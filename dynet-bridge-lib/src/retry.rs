//! Per-query retry bookkeeping.
//!
//! Every state query ("what is your current preset / level") carries a
//! [`RequestCounter`] slot. A scheduled retry samples the slot's
//! sequence number; when the matching update arrives the sequence
//! advances, which both cancels the armed timer and invalidates any
//! retry already sitting in the outbound queue (via [`SendGuard`],
//! evaluated at send time).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// First retry delay for ordinary queries.
pub const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);

/// First retry delay for post-connect queries, letting a large bus
/// settle before polling again.
pub const STARTUP_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Ceiling for the doubling retry delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(3600);

/// Retry policy for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDelay {
    /// Send once, never retry.
    NoRetry,
    /// Retry after this delay, doubling up to [`MAX_RETRY_DELAY`].
    After(Duration),
}

/// Doubled delay, capped.
pub fn next_delay(delay: Duration) -> Duration {
    (delay * 2).min(MAX_RETRY_DELAY)
}

/// Monotone sequence number plus the currently armed retry timer for
/// one query slot. At most one timer is armed per slot; arming a new
/// one aborts the previous.
#[derive(Debug, Default)]
pub struct RequestCounter {
    seq: Arc<AtomicU64>,
    timer: Option<AbortHandle>,
}

impl RequestCounter {
    pub fn new() -> RequestCounter {
        RequestCounter::default()
    }

    pub fn sequence(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    /// Relevance check bound to the current sequence, attached to the
    /// outbound packet and evaluated at send time.
    pub fn guard(&self) -> SendGuard {
        SendGuard { seq: Arc::clone(&self.seq), sampled: self.sequence() }
    }

    /// The awaited update arrived: advance the sequence and cancel any
    /// pending retry.
    pub fn update(&mut self) {
        self.seq.fetch_add(1, Ordering::SeqCst);
        self.disarm();
    }

    pub fn arm(&mut self, handle: AbortHandle) {
        if let Some(previous) = self.timer.replace(handle) {
            previous.abort();
        }
    }

    pub fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for RequestCounter {
    fn drop(&mut self) {
        self.disarm();
    }
}

/// `should_run` predicate as a value: the query is still wanted iff
/// the slot's sequence has not advanced since sampling.
#[derive(Debug, Clone)]
pub struct SendGuard {
    seq: Arc<AtomicU64>,
    sampled: u64,
}

impl SendGuard {
    pub fn should_run(&self) -> bool {
        self.seq.load(Ordering::SeqCst) == self.sampled
    }
}

/// Arm a one-shot timer on `counter`; `fire` is delivered on `tx`
/// when `delay` elapses unless the slot is updated or re-armed first.
pub fn arm_timer<T: Send + 'static>(
    counter: &mut RequestCounter,
    delay: Duration,
    tx: &mpsc::UnboundedSender<T>,
    fire: T,
) {
    let tx = tx.clone();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = tx.send(fire);
    });
    counter.arm(handle.abort_handle());
}
