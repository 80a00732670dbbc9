//! Worksheet sink backed by JSON documents on disk.
//!
//! Layout: `<root>/<spreadsheet_id>/<worksheet_title>.json`, one document per
//! worksheet holding its rows. A flush replaces the row whose session id
//! matches, or appends a new row.
//!
//! Several tracker processes may share one worksheet. Each read-modify-write
//! cycle holds an advisory lock on `<worksheet_title>.json.lock` next to the
//! document.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use tracker_core::{format_duration_ms, SessionTotals};

use super::{Destination, FlushError, RemoteSink};

/// One row of the worksheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorksheetRow {
    pub session_id: String,
    pub workspace_name: String,
    /// Active time as `H:MM:SS`
    pub active: String,
    /// Idle time as `H:MM:SS`
    pub idle: String,
    pub active_ms: u64,
    pub idle_ms: u64,
    pub observed_at: u64,
    pub updated_at: DateTime<Utc>,
}

impl WorksheetRow {
    pub fn from_totals(totals: &SessionTotals, updated_at: DateTime<Utc>) -> Self {
        Self {
            session_id: totals.session_id.to_string(),
            workspace_name: totals.workspace_name.clone(),
            active: format_duration_ms(totals.active_ms),
            idle: format_duration_ms(totals.idle_ms),
            active_ms: totals.active_ms,
            idle_ms: totals.idle_ms,
            observed_at: totals.observed_at,
            updated_at,
        }
    }
}

/// Outcome of writing a row into a worksheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Appended,
    Updated,
    /// The stored row is newer; nothing changed.
    Stale,
}

/// Rows of a single worksheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worksheet {
    pub title: String,
    pub rows: Vec<WorksheetRow>,
}

impl Worksheet {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            rows: Vec::new(),
        }
    }

    /// Index of the row keyed by `session_id`.
    pub fn find_row(&self, session_id: &str) -> Option<usize> {
        self.rows.iter().position(|row| row.session_id == session_id)
    }

    /// Replaces the row with the same session id, or appends it.
    ///
    /// A row observed earlier than the stored one is ignored, so an old
    /// flush landing late never overwrites newer totals.
    pub fn upsert(&mut self, row: WorksheetRow) -> Upsert {
        match self
            .rows
            .iter_mut()
            .find(|existing| existing.session_id == row.session_id)
        {
            Some(existing) if existing.observed_at > row.observed_at => Upsert::Stale,
            Some(existing) => {
                *existing = row;
                Upsert::Updated
            }
            None => {
                self.rows.push(row);
                Upsert::Appended
            }
        }
    }
}

/// Sink writing worksheets under a root directory.
#[derive(Debug)]
pub struct WorksheetSink {
    root: PathBuf,
    // Serializes flushes within this process; the file lock covers the rest.
    write_lock: Mutex<()>,
}

impl WorksheetSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Resolves the document path for `destination`.
    pub fn worksheet_path(&self, destination: &Destination) -> Result<PathBuf, FlushError> {
        if !is_valid_component(&destination.spreadsheet_id)
            || !is_valid_component(&destination.worksheet_title)
        {
            return Err(FlushError::UnparsableRange {
                range: destination.range(),
            });
        }
        Ok(self
            .root
            .join(&destination.spreadsheet_id)
            .join(format!("{}.json", destination.worksheet_title)))
    }

    /// Reads a worksheet, returning an empty one if it does not exist yet.
    pub async fn read_worksheet(&self, destination: &Destination) -> Result<Worksheet, FlushError> {
        let path = self.worksheet_path(destination)?;
        match fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                FlushError::Rejected(format!("{} is not a valid worksheet: {e}", path.display()))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Ok(Worksheet::new(destination.worksheet_title.clone()))
            }
            Err(e) => Err(FlushError::Unreachable(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn write_worksheet(&self, path: &Path, sheet: &Worksheet) -> Result<(), FlushError> {
        let content =
            serde_json::to_string_pretty(sheet).map_err(|e| FlushError::Unknown(e.to_string()))?;

        // Per-process name so concurrent writers never share a temp file.
        let tmp = path.with_extension(format!("json.{}.tmp", std::process::id()));
        fs::write(&tmp, content).await.map_err(|e| {
            FlushError::Unreachable(format!("failed to write {}: {e}", tmp.display()))
        })?;
        fs::rename(&tmp, path).await.map_err(|e| {
            FlushError::Unreachable(format!("failed to replace {}: {e}", path.display()))
        })
    }
}

/// Takes the cross-process lock for the worksheet at `path`.
///
/// The lock is released when the returned file is dropped.
async fn lock_worksheet(path: &Path) -> Result<File, FlushError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(|e| {
            FlushError::Unreachable(format!("failed to create {}: {e}", parent.display()))
        })?;
    }

    let lock_path = path.with_extension("json.lock");
    tokio::task::spawn_blocking(move || {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        file.lock_exclusive()?;
        Ok::<_, std::io::Error>(file)
    })
    .await
    .map_err(|e| FlushError::Unknown(format!("worksheet lock task failed: {e}")))?
    .map_err(|e| FlushError::Unreachable(format!("failed to lock worksheet: {e}")))
}

#[async_trait]
impl RemoteSink for WorksheetSink {
    fn name(&self) -> &str {
        "worksheet"
    }

    async fn flush(
        &self,
        totals: &SessionTotals,
        destination: &Destination,
    ) -> Result<(), FlushError> {
        let path = self.worksheet_path(destination)?;
        let _guard = self.write_lock.lock().await;
        let _file_lock = lock_worksheet(&path).await?;

        let mut sheet = self.read_worksheet(destination).await?;
        let outcome = sheet.upsert(WorksheetRow::from_totals(totals, Utc::now()));
        debug!(
            session_id = %totals.session_id,
            destination = %destination,
            outcome = ?outcome,
            "Worksheet row written"
        );

        if outcome == Upsert::Stale {
            return Ok(());
        }
        self.write_worksheet(&path, &sheet).await
    }
}

fn is_valid_component(name: &str) -> bool {
    !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
}
