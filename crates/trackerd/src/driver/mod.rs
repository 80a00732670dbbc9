//! Session driver using the Actor pattern.
//!
//! The driver is the single writer of a session's state. Event sources and
//! the idle timer both feed one command channel, so every transition runs
//! on one task in arrival order.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │  Event Source   │────▶│   DriverActor   │────▶│ Broadcast Channel│
//! └─────────────────┘     └────────┬────────┘     └──────────────────┘
//!         ▲                        │  │
//!         │ DriverCommand          │  │ report (spawned)
//!         │ (mpsc channel)         │  ▼
//! ┌───────┴─────────┐              │ ┌─────────────────┐
//! │   Idle timer    │◀─────────────┘ │   RemoteSink    │
//! │  (Debouncer)    │    re-arm      └─────────────────┘
//! └─────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use tracker_core::{SessionId, SessionState};

mod actor;
mod commands;
mod handle;

pub use actor::DriverActor;
pub use commands::{DriverCommand, DriverError, TrackerEvent};
pub use handle::DriverHandle;

use crate::clock::SharedClock;
use crate::debounce::TimerService;
use crate::reporter::Reporter;
use crate::sink::SinkTarget;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 256;
const EVENT_BUFFER: usize = 256;

/// Identity and timing of the session to drive.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub session_id: SessionId,
    pub workspace_name: String,
    pub idle_threshold: Duration,
}

/// Spawn the driver actor and return a handle for interaction.
///
/// The session starts at the clock's current time. The actor processes the
/// synthetic session start immediately, arming the first idle timer.
///
/// Must be called from within a tokio runtime.
pub fn spawn_driver(
    config: DriverConfig,
    sink: Option<SinkTarget>,
    clock: SharedClock,
    timer: Arc<dyn TimerService>,
) -> DriverHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let idle_threshold_ms = u64::try_from(config.idle_threshold.as_millis()).unwrap_or(u64::MAX);
    let state = SessionState::new(
        config.session_id,
        config.workspace_name,
        clock.now_ms(),
        idle_threshold_ms,
    );

    let actor = DriverActor::new(
        cmd_rx,
        cmd_tx.downgrade(),
        state,
        timer,
        Reporter::new(sink, event_tx.clone()),
        clock.clone(),
        event_tx.clone(),
    );
    tokio::spawn(actor.run());

    DriverHandle::new(cmd_tx, event_tx, clock)
}
