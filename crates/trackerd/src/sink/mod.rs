//! Remote sink for cumulative session totals.
//!
//! A sink stores one row per session, keyed by session id. The driver always
//! sends full cumulative totals, so a sink may see writes out of order or
//! more than once without corrupting anything.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tracker_core::SessionTotals;

mod worksheet;

pub use worksheet::{Upsert, Worksheet, WorksheetRow, WorksheetSink};

/// Where totals are written: a worksheet inside a spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub spreadsheet_id: String,
    pub worksheet_title: String,
}

impl Destination {
    pub fn new(spreadsheet_id: impl Into<String>, worksheet_title: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            worksheet_title: worksheet_title.into(),
        }
    }

    /// A1-style range covering the row columns.
    pub fn range(&self) -> String {
        format!("{}!A:H", self.worksheet_title)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.spreadsheet_id, self.worksheet_title)
    }
}

/// Errors a flush can end with.
#[derive(Debug, Clone, Error)]
pub enum FlushError {
    /// The store could not be reached or written.
    #[error("sink unreachable: {0}")]
    Unreachable(String),

    /// The destination range does not resolve to a worksheet.
    #[error("the requested range is unparsable: {range}")]
    UnparsableRange { range: String },

    /// The store refused the data.
    #[error("sink rejected the update: {0}")]
    Rejected(String),

    #[error("unknown sink error: {0}")]
    Unknown(String),
}

impl FlushError {
    /// Errors the user can fix and should be told about.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::UnparsableRange { .. } | Self::Rejected(_))
    }
}

/// Store receiving cumulative totals.
#[async_trait]
pub trait RemoteSink: Send + Sync {
    fn name(&self) -> &str;

    /// Appends or updates the row for `totals.session_id`.
    async fn flush(&self, totals: &SessionTotals, destination: &Destination)
        -> Result<(), FlushError>;
}

pub type SharedSink = Arc<dyn RemoteSink>;

/// A sink together with the destination it writes to.
#[derive(Clone)]
pub struct SinkTarget {
    pub sink: SharedSink,
    pub destination: Destination,
}

impl SinkTarget {
    pub fn new(sink: SharedSink, destination: Destination) -> Self {
        Self { sink, destination }
    }
}

impl fmt::Debug for SinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkTarget")
            .field("sink", &self.sink.name())
            .field("destination", &self.destination)
            .finish()
    }
}
