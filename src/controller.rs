//! # Controller Module
//!
//! Start/stop lifecycle for the operator surface. The controller owns the
//! only handle to the background session; callers never touch the running
//! flag, the device, or the mirror directly.

use crate::config::LoggerConfig;
use crate::record::AttendanceEvent;
use crate::serial::{
    Connector, Notice, SerialConnector, Session, SessionOutcome, SessionState, StatusBoard,
};
use crate::store::EventMirror;
use log::{error, info};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub struct Controller {
    config: LoggerConfig,
    connector: Arc<dyn Connector>,
    runtime: Handle,
    board: StatusBoard,
    mirror: EventMirror,
    running: Arc<AtomicBool>,
    task: Option<JoinHandle<SessionOutcome>>,
}

impl Controller {
    /// Controller for real serial hardware.
    pub fn new(config: LoggerConfig, runtime: Handle) -> Self {
        Self::with_connector(config, Arc::new(SerialConnector), runtime)
    }

    pub fn with_connector(
        config: LoggerConfig,
        connector: Arc<dyn Connector>,
        runtime: Handle,
    ) -> Self {
        Controller {
            config,
            connector,
            runtime,
            board: StatusBoard::new(),
            mirror: EventMirror::new(),
            running: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// Launches a session on `port` in the background.
    ///
    /// Returns `false` without side effects if a session is already
    /// connecting or running. A previous session still draining after
    /// [`Controller::stop`] is awaited by the new task before it connects.
    pub fn start(&mut self, port: &str) -> bool {
        if self.is_active() {
            info!("start ignored: session already active");
            return false;
        }

        self.mirror = EventMirror::new();
        self.running = Arc::new(AtomicBool::new(true));
        let generation = self.board.begin(format!("connecting to {port}"));
        info!("starting session on {port}");

        let session = Session::new(
            self.config.clone().with_port(port),
            Arc::clone(&self.connector),
            self.mirror.clone(),
            self.board.clone(),
            Arc::clone(&self.running),
            generation,
        );
        let previous = self.task.take();
        self.task = Some(self.runtime.spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            session.run().await
        }));
        true
    }

    /// Asks the active session to stop and reports it stopped right away.
    ///
    /// The loop notices within one read timeout. Returns `false` if no
    /// session was active.
    pub fn stop(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.running.store(false, Ordering::Release);
        let stopped = self.board.stop_current("logging stopped".to_string());
        if stopped {
            info!("logging stopped");
        }
        stopped
    }

    /// Waits for the current session task to finish.
    ///
    /// Does not stop the session; call [`Controller::stop`] first for a
    /// clean shutdown.
    pub async fn wait_stopped(&mut self) -> Option<SessionOutcome> {
        let task = self.task.take()?;
        match task.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("session task ended abnormally: {e}");
                None
            }
        }
    }

    /// Events logged by the current session, in arrival order.
    pub fn current_events(&self) -> Vec<AttendanceEvent> {
        self.mirror.snapshot()
    }

    /// Current status message.
    pub fn status(&self) -> String {
        self.board.message()
    }

    pub fn state(&self) -> SessionState {
        self.board.state()
    }

    pub fn is_active(&self) -> bool {
        self.board.state().is_active()
    }

    /// Most recent informational line from the device.
    pub fn latest_info(&self) -> Option<String> {
        self.board.latest_info()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.board.subscribe()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        // a detached task would otherwise keep the port open
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AttendanceError;
    use crate::serial::port::{DeviceStream, MockConnector};
    use crate::serial::SessionEnd;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::{AsyncWriteExt, DuplexStream};

    fn config(dir: &TempDir) -> LoggerConfig {
        LoggerConfig::default()
            .with_log_path(dir.path().join("attendance_log.csv"))
            .with_read_timeout(Duration::from_millis(50))
            .with_settle_delay(Duration::ZERO)
    }

    /// Connector handing out one end of a duplex pipe per connect call.
    fn duplex_connector(count: usize) -> (Arc<dyn Connector>, Vec<DuplexStream>) {
        let mut devices = Vec::new();
        let mut clients = Vec::new();
        for _ in 0..count {
            let (client, device) = tokio::io::duplex(4096);
            clients.push(client);
            devices.push(device);
        }
        let mut mock = MockConnector::new();
        mock.expect_connect()
            .times(count)
            .returning(move |_| Ok(Box::new(clients.remove(0)) as DeviceStream));
        (Arc::new(mock), devices)
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_stop_before_start_is_noop() {
        let dir = TempDir::new().unwrap();
        let mut controller = Controller::with_connector(
            config(&dir),
            Arc::new(MockConnector::new()),
            Handle::current(),
        );
        assert!(!controller.stop());
        assert_eq!(controller.status(), "stopped");
        assert_eq!(controller.state(), SessionState::Stopped);
        assert!(controller.wait_stopped().await.is_none());
    }

    #[tokio::test]
    async fn test_unopenable_port_reports_connection_failed() {
        let dir = TempDir::new().unwrap();
        let mut mock = MockConnector::new();
        mock.expect_connect().times(1).returning(|settings| {
            Err(AttendanceError::port_open(&settings.port_name, "No such file or directory"))
        });
        let mut controller =
            Controller::with_connector(config(&dir), Arc::new(mock), Handle::current());

        assert!(controller.start("FAKE_PORT"));
        let outcome = controller.wait_stopped().await.unwrap();

        assert!(matches!(outcome.end, SessionEnd::Failed(_)));
        assert!(matches!(controller.state(), SessionState::Failed(_)));
        assert!(controller.status().starts_with("connection failed"));
        assert!(controller.status().contains("FAKE_PORT"));
        assert!(controller.current_events().is_empty());
        assert!(!dir.path().join("attendance_log.csv").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_mirror_grows_monotonically_while_reading() {
        const K: usize = 40;
        let dir = TempDir::new().unwrap();
        let (connector, mut devices) = duplex_connector(1);
        let mut device = devices.remove(0);
        let mut controller = Controller::with_connector(config(&dir), connector, Handle::current());

        assert!(controller.start("TEST_PORT"));
        let writer = tokio::spawn(async move {
            for i in 0..K {
                let line = format!("LOG,U{i},FP{i},{i},GRANTED\n");
                device.write_all(line.as_bytes()).await.unwrap();
                if i % 8 == 0 {
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
            }
            device
        });

        let mut last_seen = 0;
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let events = controller.current_events();
                assert!(events.len() >= last_seen, "mirror shrank");
                last_seen = events.len();
                if last_seen == K {
                    break;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let events = controller.current_events();
        assert_eq!(events.len(), K);
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.uid, format!("U{i}"));
        }

        let _device = writer.await.unwrap();
        assert!(controller.stop());
        let outcome = controller.wait_stopped().await.unwrap();
        assert_eq!(outcome.end, SessionEnd::Stopped);
        assert_eq!(outcome.stats.events, K);

        let log = std::fs::read_to_string(dir.path().join("attendance_log.csv")).unwrap();
        assert_eq!(log.lines().count(), 1 + K);
    }

    #[tokio::test]
    async fn test_start_while_running_is_noop() {
        let dir = TempDir::new().unwrap();
        let (connector, _devices) = duplex_connector(1);
        let mut controller = Controller::with_connector(config(&dir), connector, Handle::current());

        assert!(controller.start("TEST_PORT"));
        wait_for(|| controller.state() == SessionState::Running).await;
        assert!(!controller.start("OTHER_PORT"));
        assert_eq!(controller.status(), "connected to TEST_PORT");

        assert!(controller.stop());
        assert_eq!(controller.status(), "logging stopped");
        assert!(!controller.stop());
        controller.wait_stopped().await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_resets_mirror_and_appends_to_log() {
        let dir = TempDir::new().unwrap();
        let (connector, mut devices) = duplex_connector(2);
        let mut controller = Controller::with_connector(config(&dir), connector, Handle::current());

        controller.start("TEST_PORT");
        devices[0]
            .write_all(b"LOG,A1,FP1,10,GRANTED\nLOG,A2,FP2,11,DENIED\n")
            .await
            .unwrap();
        wait_for(|| controller.current_events().len() == 2).await;
        controller.stop();

        // started again before the first loop has drained
        assert!(controller.start("TEST_PORT"));
        assert!(controller.current_events().is_empty());
        wait_for(|| controller.state() == SessionState::Running).await;
        devices[1].write_all(b"LOG,B1,FP3,12,GRANTED\n").await.unwrap();
        wait_for(|| controller.current_events().len() == 1).await;
        assert_eq!(controller.current_events()[0].uid, "B1");

        controller.stop();
        controller.wait_stopped().await.unwrap();

        let log = std::fs::read_to_string(dir.path().join("attendance_log.csv")).unwrap();
        let lines: Vec<_> = log.lines().collect();
        assert_eq!(lines.len(), 1 + 2 + 1);
        assert_eq!(lines[0], "Timestamp,UID,Fingerprint ID,Distance (cm),Access");
    }

    #[tokio::test]
    async fn test_stopped_restart_does_not_connect() {
        let dir = TempDir::new().unwrap();
        let (client, _device) = tokio::io::duplex(64);
        let mut mock = MockConnector::new();
        // only the first session may touch a device
        mock.expect_connect()
            .times(1)
            .return_once(move |_| Ok(Box::new(client) as DeviceStream));
        let mut controller =
            Controller::with_connector(config(&dir), Arc::new(mock), Handle::current());

        assert!(controller.start("A"));
        wait_for(|| controller.state() == SessionState::Running).await;
        assert!(controller.stop());
        // first loop is still inside its read timeout
        assert!(controller.start("BAD"));
        assert!(controller.stop());

        let outcome = controller.wait_stopped().await.unwrap();
        assert_eq!(outcome.end, SessionEnd::Stopped);
        assert_eq!(controller.state(), SessionState::Stopped);
        assert_eq!(controller.status(), "logging stopped");
    }

    #[tokio::test]
    async fn test_informational_lines_reach_subscribers() {
        let dir = TempDir::new().unwrap();
        let (connector, mut devices) = duplex_connector(1);
        let mut controller = Controller::with_connector(config(&dir), connector, Handle::current());
        let mut notices = controller.subscribe();

        controller.start("TEST_PORT");
        devices[0].write_all(b"Ultrasonic: 42cm\n").await.unwrap();

        let info = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(Notice::Info(text)) = notices.recv().await {
                    return text;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(info, "Ultrasonic: 42cm");
        assert_eq!(controller.latest_info().as_deref(), Some("Ultrasonic: 42cm"));
        assert!(controller.current_events().is_empty());

        controller.stop();
        controller.wait_stopped().await.unwrap();
    }
}
