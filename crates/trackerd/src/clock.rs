//! Millisecond clock used to stamp events.
//!
//! Event timestamps are wall-clock milliseconds, but the tracker must never
//! see them jump backward because the system clock was adjusted. The clock
//! therefore reads the wall time once and advances it with a monotonic
//! `tokio::time::Instant`, which also makes it follow paused time in tests.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;

/// Source of event timestamps.
pub trait Clock: Send + Sync + 'static {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// Clock shared between the driver, its timers and event sources.
pub type SharedClock = Arc<dyn Clock>;

/// Wall-clock anchor advanced by a monotonic instant.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    anchor_ms: u64,
    origin: Instant,
}

impl MonotonicClock {
    /// Anchors at the current wall time.
    pub fn new() -> Self {
        let anchor_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        Self::starting_at(anchor_ms)
    }

    /// Anchors at an explicit timestamp.
    pub fn starting_at(anchor_ms: u64) -> Self {
        Self {
            anchor_ms,
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        let elapsed = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.anchor_ms.saturating_add(elapsed)
    }
}
