//! # Store Module
//!
//! Append-only attendance log: a CSV file on disk plus an in-memory mirror
//! of the records written during the current session.

mod mirror;

pub use mirror::EventMirror;

use crate::error::Result;
use crate::record::{AttendanceEvent, CSV_HEADER};
use log::{debug, info};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Durable attendance log.
///
/// Every append reaches the disk before it reaches the mirror, so the file
/// never holds fewer records than the mirror shows.
pub struct EventLog {
    writer: csv::Writer<File>,
    mirror: EventMirror,
}

impl EventLog {
    /// Opens (or creates) the log at `path` with a fresh mirror.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_mirror(path, EventMirror::new())
    }

    /// Opens the log, appending into an existing mirror.
    ///
    /// The header row is written only when the file is empty, so reopening
    /// across restarts keeps a single header.
    pub fn open_with_mirror(path: impl AsRef<Path>, mirror: EventMirror) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let is_empty = file.metadata()?.len() == 0;

        let mut writer = csv::Writer::from_writer(file);
        if is_empty {
            writer.write_record(CSV_HEADER)?;
            writer.flush()?;
            writer.get_ref().sync_data()?;
            info!("created attendance log {}", path.display());
        } else {
            info!("appending to attendance log {}", path.display());
        }

        Ok(Self { writer, mirror })
    }

    /// Log over an already opened file, header untouched.
    #[cfg(test)]
    pub(crate) fn from_file(file: File, mirror: EventMirror) -> Self {
        Self {
            writer: csv::Writer::from_writer(file),
            mirror,
        }
    }

    /// Writes one record, syncs it to disk, then mirrors it.
    ///
    /// On error the event is neither mirrored nor retried.
    pub fn append(&mut self, event: AttendanceEvent) -> Result<()> {
        self.writer.write_record(event.to_record())?;
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        debug!("logged {} ({})", event.uid, event.access);
        self.mirror.push(event);
        Ok(())
    }

    /// Events appended through this mirror, in arrival order.
    pub fn snapshot(&self) -> Vec<AttendanceEvent> {
        self.mirror.snapshot()
    }
}

/// Writes `events` in the durable log layout, header included.
pub fn write_csv<W: io::Write>(writer: W, events: &[AttendanceEvent]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CSV_HEADER)?;
    for event in events {
        wtr.write_record(event.to_record())?;
    }
    wtr.flush()?;
    Ok(())
}

/// Exports `events` to a new CSV file at `path`.
pub fn export_csv(path: impl AsRef<Path>, events: &[AttendanceEvent]) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_csv(file, events)?;
    info!("exported {} events to {}", events.len(), path.as_ref().display());
    Ok(())
}
