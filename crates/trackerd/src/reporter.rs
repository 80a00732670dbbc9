//! Reporting of cumulative totals to the remote sink.
//!
//! The driver decides *when* to flush; the reporter performs the flush off
//! the event path. Flushes are fire-and-forget: errors are logged and
//! broadcast, never returned to the driver.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tracker_core::SessionTotals;

use crate::driver::TrackerEvent;
use crate::sink::{FlushError, SinkTarget};

/// Sends totals to the configured sink, if any.
#[derive(Debug, Clone)]
pub struct Reporter {
    target: Option<SinkTarget>,
    events: broadcast::Sender<TrackerEvent>,
}

impl Reporter {
    pub fn new(target: Option<SinkTarget>, events: broadcast::Sender<TrackerEvent>) -> Self {
        Self { target, events }
    }

    /// Whether a sink is configured.
    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Logs the totals and starts a background flush.
    ///
    /// Returns the flush task, or `None` when flushing is disabled.
    pub fn report(&self, totals: SessionTotals) -> Option<JoinHandle<()>> {
        info!(target: "stats", session_id = %totals.session_id, "{totals}");

        let target = self.target.clone()?;
        let events = self.events.clone();
        Some(tokio::spawn(async move {
            let result = target.sink.flush(&totals, &target.destination).await;
            record_outcome(&target, totals, result, &events);
        }))
    }

    /// Flushes and waits for the outcome. Used for the final flush.
    pub async fn flush_now(&self, totals: SessionTotals) -> Option<Result<(), FlushError>> {
        info!(target: "stats", session_id = %totals.session_id, "{totals}");

        let target = self.target.as_ref()?;
        let result = target.sink.flush(&totals, &target.destination).await;
        record_outcome(target, totals, result.clone(), &self.events);
        Some(result)
    }
}

fn record_outcome(
    target: &SinkTarget,
    totals: SessionTotals,
    result: Result<(), FlushError>,
    events: &broadcast::Sender<TrackerEvent>,
) {
    let event = match result {
        Ok(()) => {
            debug!(
                sink = target.sink.name(),
                destination = %target.destination,
                active_ms = totals.active_ms,
                idle_ms = totals.idle_ms,
                "Totals flushed"
            );
            TrackerEvent::Flushed { totals }
        }
        Err(error) => {
            if error.is_user_facing() {
                warn!(
                    sink = target.sink.name(),
                    destination = %target.destination,
                    "Flush failed, check the sink configuration: {error}"
                );
            } else {
                debug!(
                    sink = target.sink.name(),
                    destination = %target.destination,
                    error = %error,
                    "Flush failed, will retry on the next eligible event"
                );
            }
            TrackerEvent::FlushFailed { totals, error }
        }
    };

    // No subscribers is fine.
    let _ = events.send(event);
}
