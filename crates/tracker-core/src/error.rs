//! Domain-specific error types following panic-free policy.

use crate::EventKind;
use thiserror::Error;

/// Errors that can occur while building or validating domain values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A file-scoped event arrived without the affected path
    #[error("{kind} event requires a path")]
    MissingPath { kind: EventKind },

    /// A path was attached to an event kind that is not file-scoped
    #[error("{kind} event does not carry a path (got {path})")]
    UnexpectedPath { kind: EventKind, path: String },

    /// Event kind name not part of the closed enumeration
    #[error("Unknown event kind: {name}")]
    UnknownKind { name: String },

    /// Synthetic kinds are produced internally and never accepted from a source
    #[error("{kind} is synthetic and cannot be submitted by an event source")]
    SyntheticKind { kind: EventKind },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
