//! # Session Module
//!
//! One logging session: connect, settle, then read lines until stopped or
//! until the device fails. The lifecycle is
//!
//! ```text
//! Stopped -> Connecting -> Running -> Stopped
//!                 \            \
//!                  +-> Failed   +-> Failed
//! ```
//!
//! The device connection is owned by [`Session::run`] and dropped on every
//! exit path, which closes the port.

use super::port::{Connector, PortSettings};
use crate::config::LoggerConfig;
use crate::error::{AttendanceError, Result};
use crate::record::{AttendanceEvent, ParsedLine, capture_time, parse_line};
use crate::store::{EventLog, EventMirror};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::broadcast;

/// session lifecycle state
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Connecting,
    Running,
    Failed(String),
}

impl SessionState {
    /// connecting or running
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Running)
    }
}

/// Published to everyone subscribed to the status board.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    /// status message changed
    Status(String),
    /// live sensor line from the device
    Info(String),
    /// record written to the log
    Event(AttendanceEvent),
}

/// Per-session line counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub events: usize,
    pub informational: usize,
    pub ignored: usize,
}

/// How a session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    Stopped,
    Failed(String),
}

/// Result of a finished session task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionOutcome {
    pub stats: IngestStats,
    pub end: SessionEnd,
}

#[derive(Debug)]
struct BoardInner {
    generation: u64,
    state: SessionState,
    message: String,
    latest_info: Option<String>,
}

/// Shared status surface between the controller and the running session.
///
/// Writes carry the generation of the session that made them; a session
/// that has been superseded by a newer `start` cannot overwrite its status.
#[derive(Clone, Debug)]
pub struct StatusBoard {
    inner: Arc<Mutex<BoardInner>>,
    notices: broadcast::Sender<Notice>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        let (notices, _) = broadcast::channel(100);
        StatusBoard {
            inner: Arc::new(Mutex::new(BoardInner {
                generation: 0,
                state: SessionState::Stopped,
                message: "stopped".to_string(),
                latest_info: None,
            })),
            notices,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BoardInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    pub fn message(&self) -> String {
        self.lock().message.clone()
    }

    pub fn latest_info(&self) -> Option<String> {
        self.lock().latest_info.clone()
    }

    /// Starts a new generation in `Connecting` and returns it.
    pub(crate) fn begin(&self, message: String) -> u64 {
        let generation = {
            let mut inner = self.lock();
            inner.generation += 1;
            inner.state = SessionState::Connecting;
            inner.message = message.clone();
            inner.latest_info = None;
            inner.generation
        };
        let _ = self.notices.send(Notice::Status(message));
        generation
    }

    /// Applies a transition made by session `generation`, if still current.
    pub(crate) fn update(&self, generation: u64, state: SessionState, message: String) -> bool {
        {
            let mut inner = self.lock();
            if inner.generation != generation {
                return false;
            }
            inner.state = state;
            inner.message = message.clone();
        }
        let _ = self.notices.send(Notice::Status(message));
        true
    }

    /// Moves the current session to `Stopped` if it is still active.
    pub(crate) fn stop_current(&self, message: String) -> bool {
        {
            let mut inner = self.lock();
            if !inner.state.is_active() {
                return false;
            }
            inner.state = SessionState::Stopped;
            inner.message = message.clone();
        }
        let _ = self.notices.send(Notice::Status(message));
        true
    }

    pub(crate) fn info(&self, generation: u64, line: String) {
        {
            let mut inner = self.lock();
            if inner.generation != generation {
                return;
            }
            inner.latest_info = Some(line.clone());
        }
        let _ = self.notices.send(Notice::Info(line));
    }

    pub(crate) fn event(&self, event: AttendanceEvent) {
        let _ = self.notices.send(Notice::Event(event));
    }
}

/// One read attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadLine {
    /// a complete line, terminator stripped
    Line(String),
    /// nothing complete arrived within the read timeout
    Timeout,
}

/// Newline framing over a device stream with a bounded wait per read.
///
/// Bytes that arrive before a timeout are kept and completed by the next read.
pub struct LineReader<R> {
    inner: BufReader<R>,
    pending: Vec<u8>,
    timeout: Duration,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R, timeout: Duration) -> Self {
        LineReader {
            inner: BufReader::new(inner),
            pending: Vec::new(),
            timeout,
        }
    }

    /// Reads the next line.
    ///
    /// End of stream and I/O failures are [`AttendanceError::PortRead`];
    /// a line that is not UTF-8 is [`AttendanceError::Decode`].
    pub async fn next_line(&mut self) -> Result<ReadLine> {
        let read = tokio::time::timeout(
            self.timeout,
            self.inner.read_until(b'\n', &mut self.pending),
        )
        .await;

        match read {
            Err(_) => Ok(ReadLine::Timeout),
            Ok(Err(e)) => Err(AttendanceError::port_read(e.to_string())),
            Ok(Ok(0)) => Err(AttendanceError::port_read("device closed the serial stream")),
            Ok(Ok(_)) => {
                let bytes = std::mem::take(&mut self.pending);
                let line =
                    String::from_utf8(bytes).map_err(|e| AttendanceError::decode(e.to_string()))?;
                Ok(ReadLine::Line(line.trim_end().to_string()))
            }
        }
    }
}

/// A single logging session, consumed by [`Session::run`].
pub struct Session {
    config: LoggerConfig,
    connector: Arc<dyn Connector>,
    mirror: EventMirror,
    board: StatusBoard,
    running: Arc<AtomicBool>,
    generation: u64,
}

impl Session {
    pub fn new(
        config: LoggerConfig,
        connector: Arc<dyn Connector>,
        mirror: EventMirror,
        board: StatusBoard,
        running: Arc<AtomicBool>,
        generation: u64,
    ) -> Self {
        Session {
            config,
            connector,
            mirror,
            board,
            running,
            generation,
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Drives the session to completion.
    pub async fn run(self) -> SessionOutcome {
        let mut stats = IngestStats::default();
        let port = self.config.port_name.clone();
        let settings = PortSettings::from_config(&self.config);

        // a start queued behind a draining session may be stopped before it runs
        if !self.is_running() {
            info!("stopped before connecting to {port}");
            return SessionOutcome {
                stats,
                end: SessionEnd::Stopped,
            };
        }

        let stream = match self.connector.connect(&settings) {
            Ok(stream) => stream,
            Err(e) => {
                let end = self.terminate(e, "connection failed");
                return SessionOutcome { stats, end };
            }
        };

        // the board resets when the port opens
        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }
        if !self.is_running() {
            info!("stopped before {port} settled");
            return SessionOutcome {
                stats,
                end: SessionEnd::Stopped,
            };
        }

        info!("connected to {port}");
        self.board.update(
            self.generation,
            SessionState::Running,
            format!("connected to {port}"),
        );

        let end = match EventLog::open_with_mirror(&self.config.log_path, self.mirror.clone()) {
            Ok(mut log) => {
                let mut reader = LineReader::new(stream, self.config.read_timeout);
                self.read_loop(&mut reader, &mut log, &mut stats).await
            }
            Err(e) => {
                drop(stream);
                self.fail(e)
            }
        };

        info!(
            "closed {port}: {} logged, {} informational, {} ignored",
            stats.events, stats.informational, stats.ignored
        );
        SessionOutcome { stats, end }
    }

    async fn read_loop<R: AsyncRead + Unpin>(
        &self,
        reader: &mut LineReader<R>,
        log: &mut EventLog,
        stats: &mut IngestStats,
    ) -> SessionEnd {
        while self.is_running() {
            let line = match reader.next_line().await {
                Ok(ReadLine::Timeout) => continue,
                Ok(ReadLine::Line(line)) => line,
                Err(e) => return self.fail(e),
            };
            if let Err(e) = self.handle_line(&line, log, stats) {
                return self.fail(e);
            }
        }
        SessionEnd::Stopped
    }

    fn handle_line(&self, line: &str, log: &mut EventLog, stats: &mut IngestStats) -> Result<()> {
        match parse_line(line, capture_time()) {
            ParsedLine::Event(event) => {
                log.append(event.clone())?;
                stats.events += 1;
                info!("attendance: {event}");
                self.board.event(event);
            }
            ParsedLine::Informational(text) => {
                stats.informational += 1;
                info!("{text}");
                self.board.info(self.generation, text);
            }
            ParsedLine::Ignored => {
                stats.ignored += 1;
                debug!("ignored line {line:?}");
            }
        }
        Ok(())
    }

    /// Terminal error. After an operator stop it is only logged.
    fn fail(&self, e: AttendanceError) -> SessionEnd {
        self.terminate(e, "error")
    }

    fn terminate(&self, e: AttendanceError, label: &str) -> SessionEnd {
        let reason = e.to_string();
        if !self.running.swap(false, Ordering::AcqRel) {
            warn!("{label} after stop: {reason}");
            return SessionEnd::Stopped;
        }
        error!("{label} on {}: {reason}", self.config.port_name);
        self.board.update(
            self.generation,
            SessionState::Failed(reason.clone()),
            format!("{label}: {reason}"),
        );
        SessionEnd::Failed(reason)
    }
}
