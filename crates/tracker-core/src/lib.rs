//! code-tracker core - session state machine
//!
//! Pure domain logic shared by the runtime (`trackerd`):
//! - `event` - closed event model and the active/idle partition
//! - `session` - accumulated state and the transition function
//! - `throttle` - flush throttle decision
//! - `stats` - cumulative totals and formatting
//!
//! Nothing here performs I/O or scheduling. All code follows the panic-free
//! policy: no `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`,
//! `todo!()`, or direct indexing `[i]` outside tests.

pub mod error;
pub mod event;
pub mod session;
pub mod stats;
pub mod throttle;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use event::{both_idle, classify, Activity, EventKind, SessionEvent};
pub use session::{
    is_out_of_order, transition, SessionId, SessionState, DEFAULT_IDLE_THRESHOLD_MS,
};
pub use stats::{format_duration_ms, SessionTotals};
pub use throttle::{mark_flushed, should_flush};
