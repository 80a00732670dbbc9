//! Session identity, accumulated state and the transition function.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::event::both_idle;
use crate::{SessionEvent, SessionTotals};

/// Default quiet period before a synthetic timeout, in milliseconds.
pub const DEFAULT_IDLE_THRESHOLD_MS: u64 = 15_000;

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Stable identifier for one run of the host process.
///
/// Used as the row key in the remote worksheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives an id from the session start time and the process id.
    pub fn generate(started_at_ms: u64, pid: u32) -> Self {
        Self(format!("{started_at_ms:x}-{pid:x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Session State
// ============================================================================

/// Accumulated active/idle bookkeeping for one session.
///
/// A plain value: every event produces a new state via [`transition`].
/// The pending debounce timer is owned by whoever drives the state, not by
/// the state itself.
///
/// # Invariants
///
/// - `active_time + idle_time == last_event.timestamp - session_start`
/// - `last_event.timestamp` never decreases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Milliseconds attributed to engagement
    pub active_time: u64,

    /// Milliseconds attributed to absence of engagement
    pub idle_time: u64,

    /// Start boundary of the next interval
    pub last_event: SessionEvent,

    /// Timestamp of the last flush attempt (0 before the first one)
    pub last_flush: u64,

    session_id: SessionId,
    workspace_name: String,
    session_start: u64,
    idle_threshold: u64,
}

impl SessionState {
    /// Creates the initial state for a session starting at `now`.
    pub fn new(
        session_id: SessionId,
        workspace_name: impl Into<String>,
        now: u64,
        idle_threshold: u64,
    ) -> Self {
        Self {
            active_time: 0,
            idle_time: 0,
            last_event: SessionEvent::session_start(now),
            last_flush: 0,
            session_id,
            workspace_name: workspace_name.into(),
            session_start: now,
            idle_threshold,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn workspace_name(&self) -> &str {
        &self.workspace_name
    }

    pub fn session_start(&self) -> u64 {
        self.session_start
    }

    /// Debounce period, also used as the flush throttle window.
    pub fn idle_threshold(&self) -> u64 {
        self.idle_threshold
    }

    /// Wall time covered by the accumulators.
    pub fn elapsed(&self) -> u64 {
        self.last_event.timestamp.saturating_sub(self.session_start)
    }

    /// Cumulative totals as of the last processed event.
    pub fn totals(&self) -> SessionTotals {
        SessionTotals {
            session_id: self.session_id.clone(),
            workspace_name: self.workspace_name.clone(),
            active_ms: self.active_time,
            idle_ms: self.idle_time,
            observed_at: self.last_event.timestamp,
        }
    }
}

/// Returns true when `event` is timestamped before the state's last event.
pub fn is_out_of_order(state: &SessionState, event: &SessionEvent) -> bool {
    event.timestamp < state.last_event.timestamp
}

/// Computes the next state for `event`.
///
/// The interval since the previous event goes to `idle_time` when both
/// boundaries are idle-signaling and to `active_time` otherwise. A backward
/// timestamp is clamped to a zero-length interval and the event is pinned to
/// the previous boundary, so neither invariant is broken.
#[must_use]
pub fn transition(state: &SessionState, mut event: SessionEvent) -> SessionState {
    let previous = state.last_event.timestamp;
    let delta = event.timestamp.saturating_sub(previous);
    event.timestamp = event.timestamp.max(previous);

    let mut next = state.clone();
    if both_idle(&state.last_event, &event) {
        next.idle_time += delta;
    } else {
        next.active_time += delta;
    }
    next.last_event = event;
    next
}
