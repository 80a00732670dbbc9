//! Line-oriented event source.
//!
//! The editor integration writes one JSON object per line:
//!
//! ```json
//! {"kind":"FileEdited","path":"src/lib.rs"}
//! {"kind":"FocusOff"}
//! {"kind":"FileSaved","path":"src/lib.rs","timestamp":1700000000000}
//! ```
//!
//! Lines without a `timestamp` are stamped on receipt with the driver
//! clock. Malformed lines are logged and skipped.

use std::io::BufRead;
use std::ops::ControlFlow;

use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tracker_core::{DomainError, EventKind, SessionEvent};

use crate::driver::{DriverError, DriverHandle};

/// Lines buffered between the stdin thread and the source task.
const LINE_BUFFER: usize = 256;

/// Raw message as written by the editor integration.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceMessage {
    pub kind: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub timestamp: Option<u64>,
}

/// Why a line was not turned into an event.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("malformed event line: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Parses one line into an event, stamping it with `now` if needed.
///
/// Synthetic kinds are rejected: only the tracker produces them.
pub fn parse_line(line: &str, now: u64) -> Result<SessionEvent, SourceError> {
    let message: SourceMessage = serde_json::from_str(line)?;
    let kind: EventKind = message.kind.parse()?;
    if kind.is_synthetic() {
        return Err(DomainError::SyntheticKind { kind }.into());
    }
    Ok(SessionEvent::try_new(
        kind,
        message.timestamp.unwrap_or(now),
        message.path,
    )?)
}

/// Reads events from `reader` until EOF or cancellation.
///
/// Returns the number of events submitted.
pub async fn run_line_source<R>(reader: R, handle: DriverHandle, cancel: CancellationToken) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut submitted = 0;

    loop {
        let line = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("Event source cancelled");
                break;
            }

            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("Event source reached end of input");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Event source read failed");
                break;
            }
        };

        match submit_line(&line, &handle).await {
            ControlFlow::Continue(true) => submitted += 1,
            ControlFlow::Continue(false) => {}
            ControlFlow::Break(()) => break,
        }
    }

    submitted
}

/// Reads events from a channel of raw lines until it closes or cancellation.
///
/// Returns the number of events submitted.
pub async fn run_channel_source(
    mut lines: mpsc::Receiver<String>,
    handle: DriverHandle,
    cancel: CancellationToken,
) -> usize {
    let mut submitted = 0;

    loop {
        let line = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("Event source cancelled");
                break;
            }

            line = lines.recv() => line,
        };

        let Some(line) = line else {
            info!("Event source reached end of input");
            break;
        };

        match submit_line(&line, &handle).await {
            ControlFlow::Continue(true) => submitted += 1,
            ControlFlow::Continue(false) => {}
            ControlFlow::Break(()) => break,
        }
    }

    submitted
}

/// Parses and submits one line.
///
/// Continues with whether an event was submitted; breaks once the driver
/// has stopped.
async fn submit_line(line: &str, handle: &DriverHandle) -> ControlFlow<(), bool> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ControlFlow::Continue(false);
    }

    let event = match parse_line(trimmed, handle.now_ms()) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, line = trimmed, "Skipping event line");
            return ControlFlow::Continue(false);
        }
    };

    match handle.submit(event).await {
        Ok(()) => ControlFlow::Continue(true),
        Err(DriverError::ChannelClosed) => {
            debug!("Driver stopped, closing event source");
            ControlFlow::Break(())
        }
        Err(e) => {
            warn!(error = %e, "Event rejected");
            ControlFlow::Continue(false)
        }
    }
}

/// Spawns a source reading from stdin.
///
/// Stdin is read on a dedicated OS thread. A blocking read there never
/// holds the runtime open, so the process can exit while the writer side
/// of the pipe is still open.
pub fn spawn_stdin_source(handle: DriverHandle, cancel: CancellationToken) -> JoinHandle<usize> {
    let (line_tx, line_rx) = mpsc::channel(LINE_BUFFER);

    let reader = std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || read_stdin_lines(line_tx));
    if let Err(e) = reader {
        // The sender went down with the closure, so the source ends at once.
        warn!(error = %e, "Failed to start stdin reader thread");
    }

    tokio::spawn(run_channel_source(line_rx, handle, cancel))
}

fn read_stdin_lines(line_tx: mpsc::Sender<String>) {
    for line in std::io::stdin().lock().lines() {
        match line {
            Ok(line) => {
                if line_tx.blocking_send(line).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "Event source read failed");
                break;
            }
        }
    }
}
