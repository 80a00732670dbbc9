//! Driver actor - owns the session state and processes commands.
//!
//! The DriverActor is the single owner of `SessionState` and of the pending
//! idle timer. It receives commands via an mpsc channel and publishes events
//! via broadcast.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel send failures are ignored or logged, never propagated
//! - Flush failures never reach this module

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use tracker_core::{
    is_out_of_order, mark_flushed, should_flush, transition, SessionEvent, SessionState,
    SessionTotals,
};

use super::commands::{DriverCommand, TrackerEvent};
use crate::clock::SharedClock;
use crate::debounce::{Debouncer, TimerService};
use crate::reporter::Reporter;

/// The driver actor - owns the session state.
///
/// Processes commands sequentially in a single task, so transitions never
/// race and are applied in arrival order.
pub struct DriverActor {
    /// Command receiver
    receiver: mpsc::Receiver<DriverCommand>,

    /// Used by idle timers to feed timeouts back in.
    /// Weak so that the actor stops once every handle is dropped.
    timeout_sender: mpsc::WeakSender<DriverCommand>,

    state: SessionState,

    /// The at-most-one pending idle timer
    debouncer: Debouncer,

    reporter: Reporter,

    clock: SharedClock,

    /// Event publisher for subscribers
    event_publisher: broadcast::Sender<TrackerEvent>,
}

impl DriverActor {
    pub fn new(
        receiver: mpsc::Receiver<DriverCommand>,
        timeout_sender: mpsc::WeakSender<DriverCommand>,
        state: SessionState,
        timer: Arc<dyn TimerService>,
        reporter: Reporter,
        clock: SharedClock,
        event_publisher: broadcast::Sender<TrackerEvent>,
    ) -> Self {
        Self {
            receiver,
            timeout_sender,
            state,
            debouncer: Debouncer::new(timer),
            reporter,
            clock,
            event_publisher,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes the session start, then commands until `Shutdown` or until
    /// every handle is dropped.
    pub async fn run(mut self) {
        info!(
            session_id = %self.state.session_id(),
            workspace = self.state.workspace_name(),
            idle_threshold_ms = self.state.idle_threshold(),
            flushing = self.reporter.is_enabled(),
            "Session driver starting"
        );

        let start = self.state.last_event.clone();
        self.process_event(start);

        while let Some(cmd) = self.receiver.recv().await {
            if self.handle_command(cmd).await.is_break() {
                break;
            }
        }

        self.debouncer.disarm();
        info!(
            session_id = %self.state.session_id(),
            active_ms = self.state.active_time,
            idle_ms = self.state.idle_time,
            "Session driver stopped"
        );
    }

    /// Dispatches a command to the appropriate handler.
    async fn handle_command(&mut self, cmd: DriverCommand) -> ControlFlow<()> {
        match cmd {
            DriverCommand::Event(event) => self.process_event(event),
            DriverCommand::Timeout {
                generation,
                timestamp,
            } => self.handle_timeout(generation, timestamp),
            DriverCommand::Snapshot { respond_to } => {
                // Ignore send error - client may have dropped the receiver
                let _ = respond_to.send(self.state.clone());
            }
            DriverCommand::Shutdown { respond_to } => {
                self.handle_shutdown(respond_to).await;
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    /// Runs one event through the state machine.
    ///
    /// Order matters: the pending timer is cancelled before the transition
    /// and a fresh one is armed after it, so exactly one timer covers the
    /// silence following this event.
    fn process_event(&mut self, event: SessionEvent) {
        self.debouncer.disarm();

        if is_out_of_order(&self.state, &event) {
            warn!(
                kind = %event.kind,
                timestamp = event.timestamp,
                last_timestamp = self.state.last_event.timestamp,
                "Event timestamp precedes the last event, counting a zero-length interval"
            );
        }

        let mut next = transition(&self.state, event.clone());
        // Throttle on the clamped timestamp so last_flush never trails last_event.
        let flush_attempted = should_flush(&next, &next.last_event);
        if flush_attempted {
            // Advances whether or not the flush succeeds.
            let flushed_at = next.last_event.timestamp;
            next = mark_flushed(next, flushed_at);
            self.reporter.report(next.totals());
        }

        match &event.path {
            Some(path) => info!(
                target: "events",
                kind = %event.kind,
                workspace = next.workspace_name(),
                path = %path,
                "Event"
            ),
            None => info!(
                target: "events",
                kind = %event.kind,
                workspace = next.workspace_name(),
                "Event"
            ),
        }

        self.arm_idle_timer(next.idle_threshold());
        self.state = next;

        let _ = self.event_publisher.send(TrackerEvent::Processed {
            kind: event.kind,
            timestamp: self.state.last_event.timestamp,
            totals: self.state.totals(),
            flush_attempted,
        });
    }

    /// Handles a fired idle timer.
    fn handle_timeout(&mut self, generation: u64, timestamp: u64) {
        if !self.debouncer.is_current(generation) {
            debug!(
                generation = generation,
                current = self.debouncer.generation(),
                "Discarding superseded idle timeout"
            );
            let _ = self
                .event_publisher
                .send(TrackerEvent::TimeoutDiscarded { generation });
            return;
        }

        self.process_event(SessionEvent::timeout(timestamp));
    }

    /// Cancels the idle timer and performs the final flush.
    async fn handle_shutdown(&mut self, respond_to: oneshot::Sender<SessionTotals>) {
        self.debouncer.disarm();

        let totals = self.state.totals();
        info!(
            session_id = %totals.session_id,
            active_ms = totals.active_ms,
            idle_ms = totals.idle_ms,
            "Session ending, performing final flush"
        );
        // Outcome is logged and broadcast by the reporter.
        let _ = self.reporter.flush_now(totals.clone()).await;

        let _ = respond_to.send(totals);
    }

    /// Arms a timer that feeds a `Timeout` command back into this actor.
    fn arm_idle_timer(&mut self, idle_threshold_ms: u64) {
        let sender = self.timeout_sender.clone();
        let clock = self.clock.clone();

        self.debouncer
            .arm(Duration::from_millis(idle_threshold_ms), move |generation| {
                Box::pin(async move {
                    let Some(sender) = sender.upgrade() else {
                        return;
                    };
                    let timestamp = clock.now_ms();
                    let _ = sender
                        .send(DriverCommand::Timeout {
                            generation,
                            timestamp,
                        })
                        .await;
                })
            });
    }

    #[cfg(test)]
    pub fn state(&self) -> &SessionState {
        &self.state
    }
}
