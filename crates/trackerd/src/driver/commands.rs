//! Driver commands, errors, and events.
//!
//! This module defines the message types for communicating with the `DriverActor`:
//! - `DriverCommand`: Commands sent to the actor
//! - `DriverError`: Errors returned by `DriverHandle` calls
//! - `TrackerEvent`: Events published by the driver for subscribers

use thiserror::Error;
use tokio::sync::oneshot;

use tracker_core::{DomainError, EventKind, SessionEvent, SessionState, SessionTotals};

use crate::sink::FlushError;

// ============================================================================
// Driver Commands
// ============================================================================

/// Commands sent to the driver actor.
#[derive(Debug)]
pub enum DriverCommand {
    /// A real event from an event source. Fire-and-forget.
    Event(SessionEvent),

    /// The idle timer armed as `generation` fired at `timestamp`.
    ///
    /// Ignored unless `generation` is still the pending timer.
    Timeout { generation: u64, timestamp: u64 },

    /// Read the current state.
    Snapshot {
        respond_to: oneshot::Sender<SessionState>,
    },

    /// Stop the driver after a final flush.
    ///
    /// Responds with the final totals once the flush has completed (or
    /// immediately when flushing is disabled).
    Shutdown {
        respond_to: oneshot::Sender<SessionTotals>,
    },
}

// ============================================================================
// Driver Errors
// ============================================================================

/// Errors returned by `DriverHandle` calls.
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    /// The driver has stopped.
    #[error("driver channel closed")]
    ChannelClosed,

    /// The event was rejected before reaching the driver.
    #[error("invalid event: {0}")]
    InvalidEvent(#[from] DomainError),
}

// ============================================================================
// Tracker Events
// ============================================================================

/// Events published by the driver to subscribers.
#[derive(Debug, Clone)]
pub enum TrackerEvent {
    /// An event went through the state machine.
    Processed {
        kind: EventKind,
        timestamp: u64,
        totals: SessionTotals,
        /// Whether this event triggered a flush attempt
        flush_attempted: bool,
    },

    /// A timer fired after it had been superseded and was dropped.
    TimeoutDiscarded { generation: u64 },

    /// The sink stored the totals.
    Flushed { totals: SessionTotals },

    /// The sink failed; the driver keeps running.
    FlushFailed {
        totals: SessionTotals,
        error: FlushError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_display() {
        assert_eq!(DriverError::ChannelClosed.to_string(), "driver channel closed");

        let err = DriverError::from(DomainError::SyntheticKind {
            kind: EventKind::Timeout,
        });
        assert_eq!(
            err.to_string(),
            "invalid event: Timeout is synthetic and cannot be submitted by an event source"
        );
    }
}
