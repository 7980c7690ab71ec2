use crate::core::session::line::LineReader;
use crate::core::session::state::{Counters, SessionStatistics, SessionStatus};
use crate::domain::{config::SessionConfig, error::SessionError};
use crate::infrastructure::serial::{PortConnector, SystemConnector};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Longest single blocking read; bounds how long `close` waits for an in-flight read
const MAX_POLL_SLICE: Duration = Duration::from_millis(100);

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handles and bookkeeping for one open port
struct OpenPort {
    config: SessionConfig,
    reader: Mutex<LineReader>,
    writer: Mutex<Option<Box<dyn Write + Send>>>,
    stop: AtomicBool,
    counters: Counters,
}

impl OpenPort {
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn poll_slice(&self) -> Duration {
        self.config.read_timeout.min(MAX_POLL_SLICE)
    }
}

/// A serial port session.
///
/// Holds at most one open port. `read_line` is meant to run in a loop on its
/// own blocking thread while `write_line` and `close` are called from
/// elsewhere; the session is `Sync` and is usually shared through an `Arc`.
///
/// ```text
/// Closed --open()--> Open --close()--> Closed
///                    Open --read/write fault--> Closed
/// ```
pub struct SerialSession {
    connector: Box<dyn PortConnector>,
    slot: Mutex<Option<Arc<OpenPort>>>,
}

impl SerialSession {
    /// Create a closed session that opens ports through `connector`
    pub fn new(connector: impl PortConnector + 'static) -> Self {
        Self {
            connector: Box::new(connector),
            slot: Mutex::new(None),
        }
    }

    /// Create a closed session backed by the OS serial driver
    pub fn system() -> Self {
        Self::new(SystemConnector)
    }

    /// Open the configured port.
    ///
    /// Fails with [`SessionError::AlreadyOpen`] if a port is already open and
    /// with [`SessionError::Open`] if the device is missing, busy, or rejects
    /// the configuration. The session stays closed on failure.
    pub fn open(&self, config: SessionConfig) -> Result<(), SessionError> {
        let mut slot = lock(&self.slot);
        if let Some(current) = slot.as_ref() {
            warn!("Open requested while '{}' is open", current.config.port);
            return Err(SessionError::AlreadyOpen {
                port: current.config.port.clone(),
            });
        }

        config.validate()?;
        let halves = self.connector.connect(&config).map_err(|e| {
            error!("Failed to open '{}': {}", config.port, e);
            e
        })?;

        info!("Connected to {} at {} bps", config.port, config.baud_rate);
        *slot = Some(Arc::new(OpenPort {
            config,
            reader: Mutex::new(LineReader::new(halves.reader)),
            writer: Mutex::new(Some(halves.writer)),
            stop: AtomicBool::new(false),
            counters: Counters::new(),
        }));
        Ok(())
    }

    /// Wait up to `timeout` for one complete line.
    ///
    /// Returns `Ok(None)` if none arrived; that is the idle case, not an error.
    /// Bytes of an incomplete line are kept for the next call. A device fault
    /// closes the session and returns [`SessionError::Read`]. Closing the
    /// session while this call is blocked makes it return
    /// [`SessionError::NotOpen`] within one poll slice.
    pub fn read_line(&self, timeout: Duration) -> Result<Option<String>, SessionError> {
        let port = self.current()?;
        let mut reader = match port.reader.try_lock() {
            Ok(reader) => reader,
            Err(TryLockError::WouldBlock) => return Err(SessionError::ReaderBusy),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        // No deadline when `timeout` does not fit in an Instant
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if let Some((line, consumed)) = reader.take_line() {
                port.counters.record_received(consumed);
                debug!("Received {} bytes on '{}'", consumed, port.config.port);
                return Ok(Some(line));
            }
            if port.stopped() {
                return Err(SessionError::NotOpen);
            }

            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    (deadline - now).min(port.poll_slice())
                }
                None => port.poll_slice(),
            };
            if let Err(e) = reader.fill(slice) {
                reader.release();
                drop(reader);
                error!("Error reading from '{}': {}", port.config.port, e);
                self.fault(&port);
                return Err(SessionError::Read(e));
            }
        }
    }

    /// Write `text` followed by the configured line terminator.
    ///
    /// Concurrent writers are serialized, so each line reaches the wire whole.
    pub fn write_line(&self, text: &str) -> Result<(), SessionError> {
        let port = self.current()?;
        let mut writer = lock(&port.writer);
        if port.stopped() {
            return Err(SessionError::NotOpen);
        }
        let link = writer.as_mut().ok_or(SessionError::NotOpen)?;

        let mut frame = String::with_capacity(text.len() + 2);
        frame.push_str(text);
        frame.push_str(port.config.line_ending.as_str());

        match link
            .write_all(frame.as_bytes())
            .and_then(|_| link.flush())
        {
            Ok(()) => {
                port.counters.record_sent(frame.len());
                debug!("Sent {} bytes on '{}'", frame.len(), port.config.port);
                Ok(())
            }
            Err(e) => {
                *writer = None;
                drop(writer);
                error!("Error writing to '{}': {}", port.config.port, e);
                self.fault(&port);
                Err(SessionError::Write(e))
            }
        }
    }

    /// Release the port if open. Safe to call any number of times.
    ///
    /// An in-flight `read_line` is told to stop and waited for before the
    /// handle is dropped.
    pub fn close(&self) {
        let port = lock(&self.slot).take();
        let Some(port) = port else {
            return;
        };

        port.stop.store(true, Ordering::Release);
        lock(&port.reader).release();
        lock(&port.writer).take();
        info!("Disconnected from serial port '{}'", port.config.port);
    }

    pub fn is_open(&self) -> bool {
        lock(&self.slot).is_some()
    }

    pub fn status(&self) -> SessionStatus {
        if self.is_open() {
            SessionStatus::Open
        } else {
            SessionStatus::Closed
        }
    }

    /// Configuration of the open port
    pub fn config(&self) -> Option<SessionConfig> {
        lock(&self.slot).as_ref().map(|port| port.config.clone())
    }

    /// Counters of the open port
    pub fn statistics(&self) -> Option<SessionStatistics> {
        lock(&self.slot).as_ref().map(|port| port.counters.snapshot())
    }

    fn current(&self) -> Result<Arc<OpenPort>, SessionError> {
        lock(&self.slot).clone().ok_or(SessionError::NotOpen)
    }

    /// Close after an I/O fault, unless the slot already moved on
    fn fault(&self, port: &Arc<OpenPort>) {
        port.stop.store(true, Ordering::Release);
        let mut slot = lock(&self.slot);
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, port)) {
            slot.take();
            warn!("Session on '{}' closed after I/O fault", port.config.port);
        }
    }
}

impl Drop for SerialSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::{BaudRate, LineEnding};
    use crate::infrastructure::serial::{LoopbackConnector, PortHalves, DEFAULT_LOOPBACK_PORT};
    use std::io;

    fn loopback_config() -> SessionConfig {
        SessionConfig::new(DEFAULT_LOOPBACK_PORT, BaudRate::DEFAULT)
            .with_read_timeout(Duration::from_millis(50))
    }

    fn open_loopback() -> SerialSession {
        let session = SerialSession::new(LoopbackConnector::default());
        session.open(loopback_config()).unwrap();
        session
    }

    /// Connector whose write half always fails
    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "cable cut"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenWriteConnector(LoopbackConnector);

    impl PortConnector for BrokenWriteConnector {
        fn connect(&self, config: &SessionConfig) -> Result<PortHalves, SessionError> {
            let mut halves = self.0.connect(config)?;
            halves.writer = Box::new(BrokenWriter);
            Ok(halves)
        }
    }

    #[test]
    fn test_new_session_is_closed() {
        let session = SerialSession::new(LoopbackConnector::default());
        assert!(!session.is_open());
        assert_eq!(session.status(), SessionStatus::Closed);
        assert!(session.config().is_none());
        assert!(session.statistics().is_none());
    }

    #[test]
    fn test_open_twice_is_rejected() {
        let session = open_loopback();
        match session.open(loopback_config()) {
            Err(SessionError::AlreadyOpen { port }) => assert_eq!(port, DEFAULT_LOOPBACK_PORT),
            other => panic!("expected AlreadyOpen, got {:?}", other),
        }
        assert!(session.is_open());
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let session = open_loopback();
        session.write_line("PING").unwrap();
        assert_eq!(
            session.read_line(Duration::from_millis(200)).unwrap().as_deref(),
            Some("PING")
        );

        let stats = session.statistics().unwrap();
        assert_eq!(stats.lines_sent, 1);
        assert_eq!(stats.bytes_sent, 5);
        assert_eq!(stats.lines_received, 1);
        assert_eq!(stats.bytes_received, 5);
    }

    #[test]
    fn test_crlf_line_ending_is_stripped_on_read() {
        let session = SerialSession::new(LoopbackConnector::default());
        session
            .open(loopback_config().with_line_ending(LineEnding::CrLf))
            .unwrap();
        session.write_line("AT").unwrap();
        assert_eq!(
            session.read_line(Duration::from_millis(200)).unwrap().as_deref(),
            Some("AT")
        );

        let stats = session.statistics().unwrap();
        assert_eq!(stats.bytes_sent, 4);
        assert_eq!(stats.bytes_received, 4);
    }

    #[test]
    fn test_unbounded_timeout_does_not_overflow() {
        let session = open_loopback();
        session.write_line("x").unwrap();
        assert_eq!(session.read_line(Duration::MAX).unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn test_close_interrupts_unbounded_read() {
        let session = Arc::new(open_loopback());
        let background = {
            let session = Arc::clone(&session);
            std::thread::spawn(move || session.read_line(Duration::MAX))
        };

        std::thread::sleep(Duration::from_millis(100));
        session.close();
        assert!(matches!(background.join().unwrap(), Err(SessionError::NotOpen)));
    }

    #[test]
    fn test_idle_read_returns_none() {
        let session = open_loopback();
        let start = Instant::now();
        assert_eq!(session.read_line(Duration::from_millis(120)).unwrap(), None);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100), "returned early: {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(2), "blocked too long: {:?}", elapsed);
        assert!(session.is_open());
    }

    #[test]
    fn test_zero_timeout_does_not_block() {
        let session = open_loopback();
        assert_eq!(session.read_line(Duration::ZERO).unwrap(), None);
    }

    #[test]
    fn test_close_is_idempotent() {
        let session = open_loopback();
        session.close();
        session.close();
        assert!(!session.is_open());

        let never_opened = SerialSession::new(LoopbackConnector::default());
        never_opened.close();
        never_opened.close();
    }

    #[test]
    fn test_io_on_closed_session_fails() {
        let session = SerialSession::new(LoopbackConnector::default());
        assert!(matches!(session.write_line("x"), Err(SessionError::NotOpen)));
        assert!(matches!(
            session.read_line(Duration::from_millis(10)),
            Err(SessionError::NotOpen)
        ));
    }

    #[test]
    fn test_reopen_after_close() {
        let session = open_loopback();
        session.close();
        session.open(loopback_config()).unwrap();
        session.write_line("again").unwrap();
        assert_eq!(
            session.read_line(Duration::from_millis(200)).unwrap().as_deref(),
            Some("again")
        );
    }

    #[test]
    fn test_read_fault_closes_session() {
        let connector = Arc::new(LoopbackConnector::default());
        let session = SerialSession::new(Arc::clone(&connector));
        session.open(loopback_config()).unwrap();

        connector.unplug(DEFAULT_LOOPBACK_PORT).unwrap();
        assert!(matches!(
            session.read_line(Duration::from_millis(200)),
            Err(SessionError::Read(_))
        ));
        assert!(!session.is_open());
        assert!(matches!(session.write_line("x"), Err(SessionError::NotOpen)));
    }

    #[test]
    fn test_write_fault_closes_session() {
        let session = SerialSession::new(BrokenWriteConnector(LoopbackConnector::default()));
        session.open(loopback_config()).unwrap();

        assert!(matches!(session.write_line("hello"), Err(SessionError::Write(_))));
        assert!(!session.is_open());
    }

    #[test]
    fn test_second_concurrent_reader_is_rejected() {
        let session = Arc::new(open_loopback());
        let background = {
            let session = Arc::clone(&session);
            std::thread::spawn(move || session.read_line(Duration::from_millis(500)))
        };

        std::thread::sleep(Duration::from_millis(100));
        assert!(matches!(
            session.read_line(Duration::from_millis(10)),
            Err(SessionError::ReaderBusy)
        ));
        session.close();
        assert!(matches!(background.join().unwrap(), Err(SessionError::NotOpen)));
    }

    #[test]
    fn test_invalid_framing_keeps_session_closed() {
        let session = SerialSession::new(LoopbackConnector::default());
        let mut config = loopback_config();
        config.data_bits = 4;
        assert!(matches!(session.open(config), Err(SessionError::Open { .. })));
        assert!(!session.is_open());
    }
}
