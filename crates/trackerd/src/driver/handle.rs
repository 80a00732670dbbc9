//! Client interface for interacting with the DriverActor.
//!
//! The `DriverHandle` is cheap to clone and is what event sources hold.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `DriverError::ChannelClosed`

use tokio::sync::{broadcast, mpsc, oneshot};

use tracker_core::{DomainError, EventKind, SessionEvent, SessionState, SessionTotals};

use super::commands::{DriverCommand, DriverError, TrackerEvent};
use crate::clock::SharedClock;

/// Handle for interacting with the driver actor.
#[derive(Clone)]
pub struct DriverHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<DriverCommand>,

    /// Event broadcaster for subscribing to updates
    event_sender: broadcast::Sender<TrackerEvent>,

    /// Clock used to stamp events submitted with `submit_now`
    clock: SharedClock,
}

impl DriverHandle {
    pub fn new(
        sender: mpsc::Sender<DriverCommand>,
        event_sender: broadcast::Sender<TrackerEvent>,
        clock: SharedClock,
    ) -> Self {
        Self {
            sender,
            event_sender,
            clock,
        }
    }

    /// Submits an event from an event source.
    ///
    /// # Errors
    ///
    /// - `DriverError::InvalidEvent` for synthetic kinds (`SessionStart`, `Timeout`)
    /// - `DriverError::ChannelClosed` if the driver has stopped
    pub async fn submit(&self, event: SessionEvent) -> Result<(), DriverError> {
        if event.kind.is_synthetic() {
            return Err(DomainError::SyntheticKind { kind: event.kind }.into());
        }

        self.sender
            .send(DriverCommand::Event(event))
            .await
            .map_err(|_| DriverError::ChannelClosed)
    }

    /// Stamps an event with the driver clock and submits it.
    ///
    /// # Errors
    ///
    /// - `DriverError::InvalidEvent` if `path` does not match the kind
    /// - `DriverError::ChannelClosed` if the driver has stopped
    pub async fn submit_now(
        &self,
        kind: EventKind,
        path: Option<String>,
    ) -> Result<(), DriverError> {
        let event = SessionEvent::try_new(kind, self.clock.now_ms(), path)?;
        self.submit(event).await
    }

    /// Returns the current session state.
    pub async fn snapshot(&self) -> Result<SessionState, DriverError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(DriverCommand::Snapshot { respond_to: tx })
            .await
            .map_err(|_| DriverError::ChannelClosed)?;

        rx.await.map_err(|_| DriverError::ChannelClosed)
    }

    /// Stops the driver after a final flush and returns the final totals.
    pub async fn shutdown(&self) -> Result<SessionTotals, DriverError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(DriverCommand::Shutdown { respond_to: tx })
            .await
            .map_err(|_| DriverError::ChannelClosed)?;

        rx.await.map_err(|_| DriverError::ChannelClosed)
    }

    /// Subscribe to tracker events.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.event_sender.subscribe()
    }

    /// Current time on the driver clock, in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Returns true while the actor is accepting commands.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

impl std::fmt::Debug for DriverHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverHandle")
            .field("connected", &self.is_connected())
            .field("subscribers", &self.event_sender.receiver_count())
            .finish()
    }
}
