//! # Serial Module
//!
//! Device connection and the per-session read loop.

pub mod port;
pub mod session;

pub use port::{Connector, DeviceStream, PortSettings, SerialConnector, list_ports};
pub use session::{
    IngestStats, LineReader, Notice, ReadLine, Session, SessionEnd, SessionOutcome, SessionState,
    StatusBoard,
};
