//! # Error Module
//!
//! This module provides the error types for the attendance logger.
//! It uses the `thiserror` crate for ergonomic error handling.

use thiserror::Error;

/// Result type alias for attendance logger operations.
pub type Result<T> = std::result::Result<T, AttendanceError>;

/// Main error type for the attendance logger.
#[derive(Debug, Error)]
pub enum AttendanceError {
    /// Serial port operation failed.
    #[error("serial port error: {0}")]
    SerialPort(String),

    /// Failed to open the serial device.
    #[error("could not open '{port_name}': {reason}")]
    PortOpen { port_name: String, reason: String },

    /// Failed to read from the serial device.
    #[error("serial read failed: {0}")]
    PortRead(String),

    /// A line from the device was not valid UTF-8.
    #[error("could not decode serial line: {0}")]
    Decode(String),

    /// Failed to write a record to the durable log.
    #[error("log write failed: {0}")]
    LogWrite(#[from] csv::Error),

    /// File I/O error.
    #[error("file I/O error: {0}")]
    FileIo(#[from] std::io::Error),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AttendanceError {
    /// Creates a new serial port error.
    #[must_use]
    pub fn serial_port(msg: impl Into<String>) -> Self {
        Self::SerialPort(msg.into())
    }

    /// Creates a new port open error.
    #[must_use]
    pub fn port_open(port_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PortOpen {
            port_name: port_name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new read error.
    #[must_use]
    pub fn port_read(msg: impl Into<String>) -> Self {
        Self::PortRead(msg.into())
    }

    /// Creates a new decode error.
    #[must_use]
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Creates a new configuration error.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
