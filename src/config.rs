//! # Config Module
//!
//! Runtime configuration for a logging session.

use crate::error::{AttendanceError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Baud rate the attendance firmware transmits at.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default durable log file name.
pub const DEFAULT_LOG_FILE: &str = "attendance_log.csv";

/// Default port shown to the operator before they pick one.
pub const DEFAULT_PORT: &str = "COM3";

/// Bounded wait for a single read attempt.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Warm-up time after opening the port; the board resets when DTR toggles.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// logger configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggerConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub log_path: PathBuf,
    pub read_timeout: Duration,
    pub settle_delay: Duration,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            port_name: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            log_path: PathBuf::from(DEFAULT_LOG_FILE),
            read_timeout: DEFAULT_READ_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

impl LoggerConfig {
    #[must_use]
    pub fn with_port(mut self, port_name: impl Into<String>) -> Self {
        self.port_name = port_name.into();
        self
    }

    #[must_use]
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    #[must_use]
    pub fn with_log_path(mut self, log_path: impl AsRef<Path>) -> Self {
        self.log_path = log_path.as_ref().to_path_buf();
        self
    }

    #[must_use]
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    #[must_use]
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Rejects settings the session cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(AttendanceError::invalid_config("baud rate must be positive"));
        }
        if self.log_path.as_os_str().is_empty() {
            return Err(AttendanceError::invalid_config("log file path is empty"));
        }
        // a zero timeout would turn the read loop into a busy spin
        if self.read_timeout.is_zero() {
            return Err(AttendanceError::invalid_config("read timeout must be non-zero"));
        }
        Ok(())
    }
}
