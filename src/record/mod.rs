//! # Record Module
//!
//! The attendance record produced by the device and the parser that
//! recognizes it on the serial line.

pub mod parser;

use chrono::{Local, NaiveDateTime, Timelike};
use std::fmt;

pub use parser::{ParsedLine, parse_line};

/// Column names of the durable log, in record order.
pub const CSV_HEADER: [&str; 5] = ["Timestamp", "UID", "Fingerprint ID", "Distance (cm)", "Access"];

/// Timestamp layout used in the log file.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One attendance record.
///
/// Every field except the timestamp is stored exactly as the device sent it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttendanceEvent {
    /// Capture time on this host, second resolution.
    pub timestamp: NaiveDateTime,
    pub uid: String,
    pub fingerprint_id: String,
    pub distance_cm: String,
    pub access: String,
}

impl AttendanceEvent {
    /// Formatted capture time as written to the log.
    #[must_use]
    pub fn timestamp_text(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    /// The record as the five log columns.
    #[must_use]
    pub fn to_record(&self) -> [String; 5] {
        [
            self.timestamp_text(),
            self.uid.clone(),
            self.fingerprint_id.clone(),
            self.distance_cm.clone(),
            self.access.clone(),
        ]
    }
}

impl fmt::Display for AttendanceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  uid={}  fp={}  dist={}cm  {}",
            self.timestamp_text(),
            self.uid,
            self.fingerprint_id,
            self.distance_cm,
            self.access
        )
    }
}

/// Local wall-clock time truncated to whole seconds.
#[must_use]
pub fn capture_time() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> AttendanceEvent {
        AttendanceEvent {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                .and_then(|d| d.and_hms_opt(12, 0, 0))
                .unwrap(),
            uid: "A1B2".to_string(),
            fingerprint_id: "FP-7".to_string(),
            distance_cm: "12.3".to_string(),
            access: "GRANTED".to_string(),
        }
    }

    #[test]
    fn test_to_record_column_order() {
        let record = sample().to_record();
        assert_eq!(record, ["2024-01-01 12:00:00", "A1B2", "FP-7", "12.3", "GRANTED"]);
    }

    #[test]
    fn test_capture_time_has_no_subseconds() {
        assert_eq!(capture_time().nanosecond(), 0);
    }
}
