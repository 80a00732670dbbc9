//! Debounced idle timeout.
//!
//! After every processed event the driver arms a one-shot timer. If no
//! other event arrives within the idle threshold, the timer feeds a
//! synthetic timeout back into the driver so idle time keeps accruing while
//! the editor is silent.
//!
//! # Panic-Free Guarantees
//!
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`.
//! Cancelling a handle is always safe, including after it fired.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Work run when a timer fires.
pub type TimerCallback = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Schedules one-shot callbacks.
pub trait TimerService: Send + Sync + 'static {
    /// Runs `callback` after `delay` unless the returned handle is cancelled first.
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;
}

// ============================================================================
// Timer Handle
// ============================================================================

/// Cancellable handle to a scheduled callback.
///
/// Dropping the handle cancels the timer.
#[derive(Debug)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Cancels the timer. Idempotent; a no-op once the callback has started.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Timer service backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

impl TimerService for TokioTimer {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        // Deadline is fixed now, not when the task is first polled.
        let sleep = tokio::time::sleep(delay);

        tokio::spawn(async move {
            tokio::select! {
                biased;

                _ = cancelled.cancelled() => {
                    trace!("Timer cancelled before firing");
                }

                _ = sleep => {
                    callback.await;
                }
            }
        });

        TimerHandle::new(token)
    }
}

// ============================================================================
// Debouncer
// ============================================================================

/// Owns at most one pending idle timer.
///
/// Every arm gets a new generation number. The callback receives it, so the
/// driver can tell a timeout of the current window from one that fired just
/// before being superseded.
pub struct Debouncer {
    timer: Arc<dyn TimerService>,
    pending: Option<TimerHandle>,
    generation: u64,
}

impl Debouncer {
    pub fn new(timer: Arc<dyn TimerService>) -> Self {
        Self {
            timer,
            pending: None,
            generation: 0,
        }
    }

    /// Arms a new timer, cancelling any pending one first.
    ///
    /// `on_timeout` builds the callback from the new generation number.
    /// Returns that generation.
    pub fn arm<F>(&mut self, threshold: Duration, on_timeout: F) -> u64
    where
        F: FnOnce(u64) -> TimerCallback,
    {
        self.disarm();
        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        self.pending = Some(self.timer.schedule(threshold, on_timeout(generation)));
        generation
    }

    /// Cancels the pending timer, if any. Returns whether one was pending.
    pub fn disarm(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_cancelled())
    }

    /// True if `generation` belongs to the timer that is still pending.
    pub fn is_current(&self, generation: u64) -> bool {
        self.is_armed() && generation == self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
