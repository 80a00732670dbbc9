//! Flush throttle decision.
//!
//! The flush window reuses the session's idle threshold.

use crate::{SessionEvent, SessionState};

/// Returns true when `event` is far enough past the last flush attempt.
pub fn should_flush(state: &SessionState, event: &SessionEvent) -> bool {
    event.timestamp.saturating_sub(state.last_flush) > state.idle_threshold()
}

/// Records a flush attempt at `timestamp`, whatever its outcome.
#[must_use]
pub fn mark_flushed(mut state: SessionState, timestamp: u64) -> SessionState {
    state.last_flush = timestamp;
    state
}
