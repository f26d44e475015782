//! Line parser for the device protocol.
//!
//! The firmware emits one of:
//!
//! - `LOG,<uid>,<fingerprint id>,<distance cm>,<access>` for an attendance record
//! - any line mentioning `Ultrasonic` for a live sensor reading
//! - anything else, which is debug chatter and dropped

use super::AttendanceEvent;
use chrono::NaiveDateTime;

/// Prefix of an attendance record line.
pub const RECORD_MARKER: &str = "LOG,";

/// Substring identifying a sensor status line.
pub const INFO_MARKER: &str = "Ultrasonic";

/// Number of comma-separated fields in a record, marker included.
pub const RECORD_FIELDS: usize = 5;

/// Classification of one serial line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParsedLine {
    /// A complete attendance record.
    Event(AttendanceEvent),
    /// Status text for the live display, never persisted.
    Informational(String),
    /// Empty, unrecognized, or a malformed record.
    Ignored,
}

/// Classifies a line already stripped of its terminator.
///
/// `captured_at` becomes the event timestamp; the device clock is never used.
/// A record with the marker but the wrong field count, or an empty uid,
/// is dropped as [`ParsedLine::Ignored`].
#[must_use]
pub fn parse_line(line: &str, captured_at: NaiveDateTime) -> ParsedLine {
    let line = line.trim();
    if line.is_empty() {
        return ParsedLine::Ignored;
    }

    if line.starts_with(RECORD_MARKER) {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != RECORD_FIELDS || fields[1].is_empty() {
            return ParsedLine::Ignored;
        }
        return ParsedLine::Event(AttendanceEvent {
            timestamp: captured_at,
            uid: fields[1].to_string(),
            fingerprint_id: fields[2].to_string(),
            distance_cm: fields[3].to_string(),
            access: fields[4].to_string(),
        });
    }

    if line.contains(INFO_MARKER) {
        return ParsedLine::Informational(line.to_string());
    }

    ParsedLine::Ignored
}
