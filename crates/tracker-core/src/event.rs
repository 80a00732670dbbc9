//! Session event model and the active/idle partition.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{DomainError, DomainResult};

// ============================================================================
// Event Kinds
// ============================================================================

/// Closed set of triggers the tracker distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum EventKind {
    /// Synthetic event marking the start of the session
    SessionStart,

    /// Editor window gained foreground focus
    FocusOn,

    /// Editor window lost foreground focus
    FocusOff,

    /// Synthetic event produced after a quiet period
    Timeout,

    FileCreated,
    FileDeleted,
    FileOpened,
    FileSaved,
    FileEdited,
    FileClosed,
    FileRenamed,

    /// The focused text editor switched to another document
    ActiveEditorChanged,

    /// Any other user-initiated interaction (command, selection, scroll)
    Interaction,
}

/// Which accumulator an event signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Active,
    Idle,
}

impl EventKind {
    /// Every declared kind, in declaration order.
    pub const ALL: [EventKind; 13] = [
        Self::SessionStart,
        Self::FocusOn,
        Self::FocusOff,
        Self::Timeout,
        Self::FileCreated,
        Self::FileDeleted,
        Self::FileOpened,
        Self::FileSaved,
        Self::FileEdited,
        Self::FileClosed,
        Self::FileRenamed,
        Self::ActiveEditorChanged,
        Self::Interaction,
    ];

    /// Classifies this kind as active or idle.
    ///
    /// The match is exhaustive on purpose: a new kind does not compile until
    /// it is placed on one side of the partition.
    #[must_use]
    pub fn activity(self) -> Activity {
        match self {
            Self::SessionStart
            | Self::FocusOn
            | Self::FileCreated
            | Self::FileDeleted
            | Self::FileOpened
            | Self::FileSaved
            | Self::FileEdited
            | Self::FileClosed
            | Self::FileRenamed
            | Self::ActiveEditorChanged
            | Self::Interaction => Activity::Active,
            Self::FocusOff | Self::Timeout => Activity::Idle,
        }
    }

    /// Returns true for kinds that carry the affected resource's path.
    #[must_use]
    pub fn is_file_scoped(self) -> bool {
        matches!(
            self,
            Self::FileCreated
                | Self::FileDeleted
                | Self::FileOpened
                | Self::FileSaved
                | Self::FileEdited
                | Self::FileClosed
                | Self::FileRenamed
                | Self::ActiveEditorChanged
        )
    }

    /// Returns true for kinds only the tracker itself produces.
    #[must_use]
    pub fn is_synthetic(self) -> bool {
        matches!(self, Self::SessionStart | Self::Timeout)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionStart => "SessionStart",
            Self::FocusOn => "FocusOn",
            Self::FocusOff => "FocusOff",
            Self::Timeout => "Timeout",
            Self::FileCreated => "FileCreated",
            Self::FileDeleted => "FileDeleted",
            Self::FileOpened => "FileOpened",
            Self::FileSaved => "FileSaved",
            Self::FileEdited => "FileEdited",
            Self::FileClosed => "FileClosed",
            Self::FileRenamed => "FileRenamed",
            Self::ActiveEditorChanged => "ActiveEditorChanged",
            Self::Interaction => "Interaction",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = DomainError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| DomainError::UnknownKind {
                name: name.to_string(),
            })
    }
}

// ============================================================================
// Session Event
// ============================================================================

/// A single trigger observed during a session.
///
/// `timestamp` is milliseconds since the Unix epoch. `path` is present
/// exactly when `kind.is_file_scoped()`; the constructors enforce this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub kind: EventKind,
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl SessionEvent {
    /// Builds an event, validating that `path` matches the kind.
    pub fn try_new(kind: EventKind, timestamp: u64, path: Option<String>) -> DomainResult<Self> {
        match (kind.is_file_scoped(), path) {
            (true, Some(path)) => Ok(Self {
                kind,
                timestamp,
                path: Some(path),
            }),
            (true, None) => Err(DomainError::MissingPath { kind }),
            (false, Some(path)) => Err(DomainError::UnexpectedPath { kind, path }),
            (false, None) => Ok(Self {
                kind,
                timestamp,
                path: None,
            }),
        }
    }

    /// Synthetic session start boundary.
    pub fn session_start(timestamp: u64) -> Self {
        Self {
            kind: EventKind::SessionStart,
            timestamp,
            path: None,
        }
    }

    /// Synthetic quiet-period event.
    pub fn timeout(timestamp: u64) -> Self {
        Self {
            kind: EventKind::Timeout,
            timestamp,
            path: None,
        }
    }

    pub fn focus(focused: bool, timestamp: u64) -> Self {
        Self {
            kind: if focused {
                EventKind::FocusOn
            } else {
                EventKind::FocusOff
            },
            timestamp,
            path: None,
        }
    }

    /// File-scoped event. Non-file kinds are rejected.
    pub fn file(kind: EventKind, timestamp: u64, path: impl Into<String>) -> DomainResult<Self> {
        Self::try_new(kind, timestamp, Some(path.into()))
    }

    pub fn activity(&self) -> Activity {
        self.kind.activity()
    }
}

/// Classifies an event. Depends only on its kind.
pub fn classify(event: &SessionEvent) -> Activity {
    event.kind.activity()
}

/// True iff both events are idle-signaling.
///
/// This is the only predicate that decides whether the interval between
/// two events counts as idle time.
pub fn both_idle(first: &SessionEvent, second: &SessionEvent) -> bool {
    classify(first) == Activity::Idle && classify(second) == Activity::Idle
}
