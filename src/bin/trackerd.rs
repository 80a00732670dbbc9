//! trackerd - editor session active/idle time tracker
//!
//! Reads editor events as JSON lines on stdin, accumulates active and idle
//! time for one session, and periodically writes the totals to a worksheet.
//!
//! # Usage
//!
//! ```bash
//! # Track a session for the current directory
//! editor-bridge | trackerd
//!
//! # Explicit workspace and a shorter idle window
//! editor-bridge | trackerd --workspace my-project --idle-threshold-ms 5000
//!
//! # Enable debug logging
//! RUST_LOG=trackerd=debug trackerd
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: final flush, then exit
//! - EOF on stdin: same as SIGTERM

use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use tracker_core::SessionId;
use trackerd::clock::{Clock, MonotonicClock};
use trackerd::config::{load_or_default, FileConfigProvider, TrackerConfig};
use trackerd::debounce::TokioTimer;
use trackerd::driver::{spawn_driver, DriverConfig};
use trackerd::source::spawn_stdin_source;

/// trackerd - editor session time tracker
#[derive(Parser, Debug)]
#[command(name = "trackerd", version, about)]
struct Args {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Workspace name reported with the totals
    #[arg(short, long)]
    workspace: Option<String>,

    /// Session identifier (generated when omitted)
    #[arg(long)]
    session_id: Option<String>,

    /// Silence after which the session counts as idle
    #[arg(long)]
    idle_threshold_ms: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let provider = args
        .config
        .clone()
        .or_else(TrackerConfig::default_path)
        .map(FileConfigProvider::new);
    let (config, config_error) = match &provider {
        Some(provider) => load_or_default(provider),
        None => (TrackerConfig::default(), None),
    };

    let level = if args.debug || config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("trackerd={level}").parse()?)
                .add_directive(format!("tracker_core={level}").parse()?)
                .add_directive(format!("events={level}").parse()?)
                .add_directive(format!("stats={level}").parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "trackerd starting"
    );

    if let Some(provider) = &provider {
        match config_error {
            Some(e) => debug!(
                path = %provider.path().display(),
                error = %e,
                "Using default configuration"
            ),
            None => debug!(path = %provider.path().display(), "Configuration loaded"),
        }
    }

    let workspace_name = args
        .workspace
        .or_else(|| config.workspace_name.clone())
        .or_else(current_dir_name)
        .context("No workspace name given and the current directory has none")?;

    let sink = match config.sink_target() {
        Ok(sink) => sink,
        Err(e) => {
            debug!(error = %e, "Worksheet sink disabled");
            None
        }
    };

    let clock = Arc::new(MonotonicClock::new());
    let session_id = args
        .session_id
        .or_else(|| config.session_id.clone())
        .map(SessionId::new)
        .unwrap_or_else(|| SessionId::generate(clock.now_ms(), process::id()));

    let idle_threshold = args
        .idle_threshold_ms
        .map(|ms| Duration::from_millis(ms.max(1)))
        .unwrap_or_else(|| config.idle_threshold());

    let handle = spawn_driver(
        DriverConfig {
            session_id,
            workspace_name,
            idle_threshold,
        },
        sink,
        clock,
        Arc::new(TokioTimer),
    );

    let cancel_token = CancellationToken::new();
    let mut source = spawn_stdin_source(handle.clone(), cancel_token.clone());

    tokio::select! {
        result = wait_for_shutdown_signal() => {
            if let Err(e) = result {
                error!(error = %e, "Error waiting for shutdown signal");
            }
            info!("Shutdown signal received");
        }
        result = &mut source => {
            match result {
                Ok(submitted) => info!(submitted, "Event source finished"),
                Err(e) => error!(error = %e, "Event source task failed"),
            }
        }
    }

    cancel_token.cancel();

    let totals = handle
        .shutdown()
        .await
        .context("Session driver stopped before shutdown")?;
    info!(
        target: "stats",
        session_id = %totals.session_id,
        workspace = %totals.workspace_name,
        "{totals}"
    );

    info!("trackerd stopped");
    Ok(())
}

fn current_dir_name() -> Option<String> {
    let dir = env::current_dir().ok()?;
    dir.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
