//! Integration tests for the session driver.
//!
//! These tests drive `spawn_driver()` through its `DriverHandle` on paused
//! tokio time, so idle timers fire deterministically.
//!
//! Tests CAN use `.unwrap()` and `.expect()`. We test the panic-free
//! behavior of production code through assertions.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::BufReader;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use tracker_core::{EventKind, SessionEvent, SessionId, SessionTotals};
use trackerd::clock::MonotonicClock;
use trackerd::debounce::TokioTimer;
use trackerd::driver::{spawn_driver, DriverConfig, DriverError, DriverHandle, TrackerEvent};
use trackerd::sink::{Destination, FlushError, RemoteSink, SinkTarget, WorksheetSink};
use trackerd::source::{run_channel_source, run_line_source};

// ============================================================================
// Test Helpers
// ============================================================================

/// Sink that records every flush and optionally fails.
#[derive(Default)]
struct RecordingSink {
    flushed: Mutex<Vec<SessionTotals>>,
    fail: bool,
}

impl RecordingSink {
    fn failing() -> Self {
        Self {
            flushed: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn attempts(&self) -> Vec<SessionTotals> {
        self.flushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn flush(&self, totals: &SessionTotals, _: &Destination) -> Result<(), FlushError> {
        self.flushed.lock().unwrap().push(totals.clone());
        if self.fail {
            Err(FlushError::Unreachable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

fn config() -> DriverConfig {
    DriverConfig {
        session_id: SessionId::new("integration"),
        workspace_name: "code-tracker".to_string(),
        idle_threshold: Duration::from_millis(15_000),
    }
}

/// Spawns a driver whose session starts at t=0.
fn spawn_at_zero(sink: Option<Arc<dyn RemoteSink>>) -> DriverHandle {
    let target = sink.map(|sink| SinkTarget::new(sink, Destination::new("sheet-1", "Extension")));
    spawn_driver(
        config(),
        target,
        Arc::new(MonotonicClock::starting_at(0)),
        Arc::new(TokioTimer),
    )
}

fn edit(ts: u64) -> SessionEvent {
    SessionEvent::file(EventKind::FileEdited, ts, "/work/code-tracker/src/lib.rs").unwrap()
}

fn drain(rx: &mut broadcast::Receiver<TrackerEvent>) -> Vec<TrackerEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

fn timeouts(events: &[TrackerEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|event| match event {
            TrackerEvent::Processed {
                kind: EventKind::Timeout,
                timestamp,
                ..
            } => Some(*timestamp),
            _ => None,
        })
        .collect()
}

/// Waits for the next flush outcome event.
async fn next_flush_outcome(rx: &mut broadcast::Receiver<TrackerEvent>) -> TrackerEvent {
    timeout(Duration::from_millis(500), async {
        loop {
            match rx.recv().await.expect("event channel open") {
                event @ (TrackerEvent::Flushed { .. } | TrackerEvent::FlushFailed { .. }) => {
                    return event
                }
                _ => continue,
            }
        }
    })
    .await
    .expect("flush outcome within timeout")
}

// ============================================================================
// Accounting
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_active_then_focus_off() {
    let handle = spawn_at_zero(None);

    handle.submit(edit(5_000)).await.unwrap();
    handle.submit(SessionEvent::focus(false, 20_000)).await.unwrap();

    let state = handle.snapshot().await.unwrap();
    assert_eq!(state.active_time, 20_000);
    assert_eq!(state.idle_time, 0);
    assert_eq!(state.last_event.kind, EventKind::FocusOff);
}

#[tokio::test(start_paused = true)]
async fn test_out_of_order_event_is_clamped() {
    let handle = spawn_at_zero(None);

    handle.submit(edit(10_000)).await.unwrap();
    handle.submit(edit(9_000)).await.unwrap();

    let state = handle.snapshot().await.unwrap();
    assert_eq!(state.active_time, 10_000);
    assert_eq!(state.last_event.timestamp, 10_000);
}

#[tokio::test(start_paused = true)]
async fn test_synthetic_kinds_are_rejected() {
    let handle = spawn_at_zero(None);

    let result = handle.submit(SessionEvent::timeout(1_000)).await;
    assert!(matches!(result, Err(DriverError::InvalidEvent(_))));

    let result = handle.submit_now(EventKind::FileSaved, None).await;
    assert!(matches!(result, Err(DriverError::InvalidEvent(_))));

    let state = handle.snapshot().await.unwrap();
    assert_eq!(state.last_event.kind, EventKind::SessionStart);
}

// ============================================================================
// Debounce
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_silence_of_threshold_produces_one_timeout() {
    let handle = spawn_at_zero(None);
    let mut rx = handle.subscribe();

    sleep(Duration::from_millis(15_001)).await;

    let events = drain(&mut rx);
    assert_eq!(timeouts(&events), vec![15_000]);

    let state = handle.snapshot().await.unwrap();
    assert_eq!(state.last_event.kind, EventKind::Timeout);
    // SessionStart -> Timeout is not idle on both ends.
    assert_eq!(state.active_time, 15_000);
    assert_eq!(state.idle_time, 0);
}

#[tokio::test(start_paused = true)]
async fn test_event_before_deadline_resets_window() {
    let handle = spawn_at_zero(None);
    let mut rx = handle.subscribe();

    sleep(Duration::from_millis(14_999)).await;
    handle.submit_now(EventKind::Interaction, None).await.unwrap();

    sleep(Duration::from_millis(2)).await;
    assert!(timeouts(&drain(&mut rx)).is_empty());

    // The new window ends at 14_999 + 15_000.
    sleep(Duration::from_millis(14_999)).await;
    assert_eq!(timeouts(&drain(&mut rx)), vec![29_999]);
}

#[tokio::test(start_paused = true)]
async fn test_idle_keeps_accruing_without_events() {
    let handle = spawn_at_zero(None);
    let mut rx = handle.subscribe();

    handle.submit_now(EventKind::FocusOff, None).await.unwrap();
    sleep(Duration::from_millis(45_001)).await;

    assert_eq!(timeouts(&drain(&mut rx)), vec![15_000, 30_000, 45_000]);

    let state = handle.snapshot().await.unwrap();
    assert_eq!(state.active_time, 0);
    assert_eq!(state.idle_time, 45_000);
}

#[tokio::test(start_paused = true)]
async fn test_rapid_events_never_stack_timers() {
    let handle = spawn_at_zero(None);
    let mut rx = handle.subscribe();

    for _ in 0..50 {
        handle.submit_now(EventKind::Interaction, None).await.unwrap();
        sleep(Duration::from_millis(100)).await;
    }
    // Last real event at 4_900; its window closes at 19_900.
    sleep(Duration::from_millis(15_000)).await;

    let events = drain(&mut rx);
    assert_eq!(timeouts(&events), vec![19_900]);
    assert!(!events
        .iter()
        .any(|e| matches!(e, TrackerEvent::TimeoutDiscarded { .. })));
}

// ============================================================================
// Reporting
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_flush_sends_cumulative_totals() {
    let sink = Arc::new(RecordingSink::default());
    let handle = spawn_at_zero(Some(sink.clone()));
    let mut rx = handle.subscribe();

    handle.submit(edit(5_000)).await.unwrap();
    handle.submit(SessionEvent::focus(false, 20_000)).await.unwrap();

    match next_flush_outcome(&mut rx).await {
        TrackerEvent::Flushed { totals } => {
            assert_eq!(totals.active_ms, 20_000);
            assert_eq!(totals.idle_ms, 0);
            assert_eq!(totals.observed_at, 20_000);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(sink.attempts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_flush_does_not_stop_processing() {
    let sink = Arc::new(RecordingSink::failing());
    let handle = spawn_at_zero(Some(sink.clone()));
    let mut rx = handle.subscribe();

    handle.submit(edit(5_000)).await.unwrap();
    handle.submit(SessionEvent::focus(false, 20_000)).await.unwrap();
    handle.submit(SessionEvent::focus(true, 36_000)).await.unwrap();
    handle
        .submit(SessionEvent::file(EventKind::FileSaved, 40_000, "src/lib.rs").unwrap())
        .await
        .unwrap();
    handle.submit(edit(41_000)).await.unwrap();

    for expected in [20_000, 40_000] {
        match next_flush_outcome(&mut rx).await {
            TrackerEvent::FlushFailed { totals, error } => {
                assert_eq!(totals.observed_at, expected);
                assert!(!error.is_user_facing());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    let state = handle.snapshot().await.unwrap();
    assert_eq!(state.last_flush, 40_000);
    assert_eq!(state.last_event.timestamp, 41_000);
    assert_eq!(state.active_time + state.idle_time, 41_000);
    assert_eq!(sink.attempts().len(), 2);
    assert!(handle.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_no_sink_still_accumulates() {
    let handle = spawn_at_zero(None);
    let mut rx = handle.subscribe();

    handle.submit(edit(16_000)).await.unwrap();

    let state = handle.snapshot().await.unwrap();
    assert_eq!(state.active_time, 16_000);
    assert_eq!(state.last_flush, 16_000);

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        TrackerEvent::Processed {
            flush_attempted: true,
            ..
        }
    )));
    assert!(!events.iter().any(|e| matches!(
        e,
        TrackerEvent::Flushed { .. } | TrackerEvent::FlushFailed { .. }
    )));
}

#[tokio::test]
async fn test_worksheet_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(WorksheetSink::new(dir.path()));
    let handle = spawn_at_zero(Some(sink.clone()));

    handle.submit(edit(20_000)).await.unwrap();
    let totals = handle.shutdown().await.unwrap();
    assert_eq!(totals.active_ms, 20_000);

    let sheet = sink
        .read_worksheet(&Destination::new("sheet-1", "Extension"))
        .await
        .unwrap();
    assert_eq!(sheet.rows.len(), 1);
    assert_eq!(sheet.rows[0].session_id, "integration");
    assert_eq!(sheet.rows[0].active, "0:00:20");
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_shutdown_flushes_and_closes() {
    let sink = Arc::new(RecordingSink::default());
    let handle = spawn_at_zero(Some(sink.clone()));

    handle.submit(edit(1_000)).await.unwrap();
    let totals = handle.shutdown().await.unwrap();
    assert_eq!(totals.active_ms, 1_000);

    let attempts = sink.attempts();
    assert_eq!(attempts.last().map(|t| t.active_ms), Some(1_000));

    tokio::task::yield_now().await;
    assert!(!handle.is_connected());
    assert!(matches!(
        handle.submit(edit(2_000)).await,
        Err(DriverError::ChannelClosed)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_line_source_feeds_driver() {
    let handle = spawn_at_zero(None);
    let input = concat!(
        "{\"kind\":\"FileOpened\",\"path\":\"src/lib.rs\",\"timestamp\":1000}\n",
        "not json\n",
        "\n",
        "{\"kind\":\"Timeout\"}\n",
        "{\"kind\":\"FocusOff\",\"timestamp\":4000}\n",
    );

    let submitted =
        run_line_source(input.as_bytes(), handle.clone(), CancellationToken::new()).await;
    assert_eq!(submitted, 2);

    let state = handle.snapshot().await.unwrap();
    assert_eq!(state.last_event.kind, EventKind::FocusOff);
    assert_eq!(state.active_time, 4_000);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_source_blocked_on_silent_reader() {
    let handle = spawn_at_zero(None);
    // The writer stays open, so the reader never yields a line or EOF.
    let (_writer, reader) = tokio::io::duplex(64);
    let cancel = CancellationToken::new();

    let source = tokio::spawn(run_line_source(
        BufReader::new(reader),
        handle.clone(),
        cancel.clone(),
    ));
    tokio::task::yield_now().await;
    assert!(!source.is_finished());

    cancel.cancel();
    let submitted = timeout(Duration::from_millis(100), source)
        .await
        .expect("source stops after cancellation")
        .unwrap();
    assert_eq!(submitted, 0);

    let totals = handle.shutdown().await.unwrap();
    assert_eq!(totals.active_ms, 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_channel_source_with_open_sender() {
    let handle = spawn_at_zero(None);
    let (line_tx, line_rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();

    let source = tokio::spawn(run_channel_source(line_rx, handle.clone(), cancel.clone()));
    line_tx
        .send(r#"{"kind":"FileEdited","path":"src/lib.rs","timestamp":2000}"#.to_string())
        .await
        .unwrap();
    line_tx.send("garbage".to_string()).await.unwrap();

    let state = timeout(Duration::from_millis(100), async {
        loop {
            let state = handle.snapshot().await.unwrap();
            if state.last_event.kind == EventKind::FileEdited {
                return state;
            }
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("line reaches the driver");
    assert_eq!(state.active_time, 2_000);

    cancel.cancel();
    let submitted = timeout(Duration::from_millis(100), source)
        .await
        .expect("source stops after cancellation")
        .unwrap();
    assert_eq!(submitted, 1);
    drop(line_tx);
}
