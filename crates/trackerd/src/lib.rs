//! code-tracker runtime - session driver and reporting
//!
//! This crate wires the pure state machine from `tracker-core` to time and
//! I/O:
//! - `driver` - session driver actor, the single owner of session state
//! - `debounce` - resettable idle timer producing synthetic timeouts
//! - `reporter` - fire-and-forget flushes to the remote sink
//! - `sink` - remote sink trait and the worksheet sink
//! - `config` - TOML configuration with recovery to defaults
//! - `source` - JSON-lines event source
//! - `clock` - monotonic millisecond clock
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        trackerd                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │  Event Source   │────▶│       DriverActor           │    │
//! │  │ (stdin lines)   │     │  (session state owner)      │    │
//! │  └─────────────────┘     └──────┬───────────────┬──────┘    │
//! │                                 │               │           │
//! │                  timeouts       │               │ flushes   │
//! │                                 ▼               ▼           │
//! │  ┌─────────────────┐     ┌─────────────┐ ┌─────────────┐    │
//! │  │   Debouncer     │◀────│  re-arm     │ │  Reporter   │    │
//! │  └─────────────────┘     └─────────────┘ └─────────────┘    │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! Production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod clock;
pub mod config;
pub mod debounce;
pub mod driver;
pub mod reporter;
pub mod sink;
pub mod source;
