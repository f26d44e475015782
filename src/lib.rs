//! # Attendance Logger
//!
//! Reads attendance records from a serial-connected reader board and keeps
//! them in an append-only CSV log plus a live in-memory view.
//!
//! ## Features
//!
//! - **Async Serial Ingestion**: One background read loop per session using
//!   the Tokio runtime, with a bounded wait per read.
//! - **Durable Log**: Each record is synced to disk before it becomes visible.
//! - **Lenient Parsing**: Malformed or unknown lines are dropped, never fatal.
//! - **Operator Console**: start/stop control, live readings, and CSV export.
//!
//! ## Architecture
//!
//! The project is organized into the following modules:
//!
//! - [`record`]: The attendance record and the line parser
//! - [`store`]: Append-only CSV log and the in-memory mirror
//! - [`serial`]: Device connection and the session read loop
//! - [`controller`]: Start/stop lifecycle exposed to the operator
//! - [`console`]: Interactive command surface used by the binary
//! - [`config`]: Session configuration
//! - [`error`]: Custom error types for the application

pub mod config;
pub mod console;
pub mod controller;
pub mod error;
pub mod record;
pub mod serial;
pub mod store;

/// Re-exports for convenience
pub mod prelude {
    pub use crate::config::LoggerConfig;
    pub use crate::controller::Controller;
    pub use crate::error::*;
    pub use crate::record::{AttendanceEvent, ParsedLine, parse_line};
    pub use crate::serial::{Notice, SessionState};
    pub use crate::store::EventLog;
}
