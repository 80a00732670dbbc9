//! Cumulative totals reported to the sink.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::SessionId;

/// Snapshot of a session's cumulative totals.
///
/// Always the full running totals, never deltas, so a stale write is
/// corrected by the next one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTotals {
    pub session_id: SessionId,
    pub workspace_name: String,
    pub active_ms: u64,
    pub idle_ms: u64,
    /// Timestamp of the event these totals were taken at
    pub observed_at: u64,
}

impl SessionTotals {
    pub fn total_ms(&self) -> u64 {
        self.active_ms + self.idle_ms
    }
}

impl fmt::Display for SessionTotals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Active Time: {}. Idle Time: {}.",
            format_duration_ms(self.active_ms),
            format_duration_ms(self.idle_ms)
        )
    }
}

/// Formats milliseconds as `H:MM:SS`. Hours are not wrapped at 24.
pub fn format_duration_ms(ms: u64) -> String {
    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours}:{minutes:02}:{seconds:02}")
}
