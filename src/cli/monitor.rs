use crate::core::session::{spawn_reader, SerialSession, SessionEvent};
use crate::core::transcript::{LineKind, LogFile, Transcript};
use crate::domain::error::{SerialMonResult, SessionError};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const HELP_TEXT: &str =
    "Type a line and press Enter to send it. Commands: :clear, :save FILE, :log start, :log stop, :quit";

/// Whether the shell keeps going after handling an input or event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Console consumer of a serial session.
///
/// Prints received and sent lines, keeps them in a [`Transcript`] and mirrors
/// them to an optional [`LogFile`].
pub struct Monitor<W: Write> {
    session: Arc<SerialSession>,
    transcript: Transcript,
    log_file: Option<LogFile>,
    log_dir: PathBuf,
    out: W,
}

impl<W: Write> Monitor<W> {
    pub fn new(
        session: Arc<SerialSession>,
        timestamps: bool,
        log_dir: impl Into<PathBuf>,
        out: W,
    ) -> Self {
        Self {
            session,
            transcript: Transcript::new(timestamps),
            log_file: None,
            log_dir: log_dir.into(),
            out,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_file.as_ref().map(LogFile::path)
    }

    /// Record, print and log one line
    pub fn emit(&mut self, kind: LineKind, text: impl Into<String>) -> SerialMonResult<()> {
        let timestamps = self.transcript.timestamps();
        let rendered = self.transcript.push(kind, text).render(timestamps);
        writeln!(self.out, "{}", rendered)?;
        self.out.flush()?;

        let failed = match self.log_file.as_mut() {
            Some(log) => log.append(&rendered).err(),
            None => None,
        };
        if let Some(e) = failed {
            self.log_file = None;
            warn!("Log file write failed, logging stopped: {}", e);
            self.emit(LineKind::Error, format!("Error writing to log file: {}", e))?;
        }
        Ok(())
    }

    pub fn handle_event(&mut self, event: SessionEvent) -> SerialMonResult<Flow> {
        match event {
            SessionEvent::Line(line) => {
                if !line.trim().is_empty() {
                    self.emit(LineKind::Received, line)?;
                }
                Ok(Flow::Continue)
            }
            SessionEvent::Fault(e) => {
                self.emit(LineKind::Error, format!("Error reading data: {}", e))?;
                Ok(Flow::Quit)
            }
        }
    }

    /// Handle one line typed by the user
    pub fn handle_input(&mut self, input: &str) -> SerialMonResult<Flow> {
        let input = input.trim_end_matches(['\r', '\n']);
        if input.is_empty() {
            return Ok(Flow::Continue);
        }

        match input.trim() {
            ":quit" => return Ok(Flow::Quit),
            ":clear" => {
                self.transcript.clear();
                writeln!(self.out, "-- display cleared --")?;
                return Ok(Flow::Continue);
            }
            ":log start" => {
                self.start_logging()?;
                return Ok(Flow::Continue);
            }
            ":log stop" => {
                self.stop_logging()?;
                return Ok(Flow::Continue);
            }
            _ => {}
        }

        if let Some(path) = input.trim().strip_prefix(":save ") {
            self.save_transcript(Path::new(path.trim()))?;
            return Ok(Flow::Continue);
        }
        // "::" escapes a line that starts with a colon
        let text = input.strip_prefix(':').filter(|rest| rest.starts_with(':'));
        if text.is_none() && input.starts_with(':') {
            self.emit(LineKind::Error, format!("Unknown command '{}'. {}", input, HELP_TEXT))?;
            return Ok(Flow::Continue);
        }
        self.send(text.unwrap_or(input))
    }

    /// Write one line to the port and echo it
    pub fn send(&mut self, text: &str) -> SerialMonResult<Flow> {
        match self.session.write_line(text) {
            Ok(()) => {
                self.emit(LineKind::Sent, text)?;
                Ok(Flow::Continue)
            }
            Err(SessionError::NotOpen) => {
                self.emit(LineKind::Error, "Not connected to a serial port.")?;
                Ok(Flow::Continue)
            }
            Err(e) => {
                let fatal = e.is_fatal();
                self.emit(LineKind::Error, format!("Error sending data: {}", e))?;
                Ok(if fatal { Flow::Quit } else { Flow::Continue })
            }
        }
    }

    pub fn start_logging(&mut self) -> SerialMonResult<()> {
        if let Some(path) = self.log_path() {
            let message = format!("Already logging to {}", path.display());
            return self.emit(LineKind::Info, message);
        }

        match LogFile::create_in(&self.log_dir) {
            Ok(log) => {
                let message = format!("Started logging to {}", log.path().display());
                self.log_file = Some(log);
                self.emit(LineKind::Info, message)
            }
            Err(e) => self.emit(LineKind::Error, format!("Error starting log: {}", e)),
        }
    }

    /// Stop mirroring to the log file; a no-op when not logging
    pub fn stop_logging(&mut self) -> SerialMonResult<()> {
        if self.log_file.is_none() {
            return Ok(());
        }
        self.emit(LineKind::Info, "Logging stopped")?;
        self.log_file = None;
        Ok(())
    }

    fn save_transcript(&mut self, path: &Path) -> SerialMonResult<()> {
        match self.transcript.save(path) {
            Ok(()) => self.emit(LineKind::Info, format!("Saved transcript to {}", path.display())),
            Err(e) => self.emit(LineKind::Error, format!("Error saving transcript: {}", e)),
        }
    }

    /// Interactive loop: port events, user input and Ctrl+C until one of them ends it
    pub async fn run(
        &mut self,
        mut input: mpsc::UnboundedReceiver<String>,
        poll_interval: Duration,
    ) -> SerialMonResult<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reader = spawn_reader(Arc::clone(&self.session), poll_interval, tx);
        let mut input_open = true;

        loop {
            let flow = tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => self.handle_event(event)?,
                    None => Flow::Quit,
                },
                line = input.recv(), if input_open => match line {
                    Some(line) => self.handle_input(&line)?,
                    None => {
                        debug!("Input closed, waiting for port events");
                        input_open = false;
                        Flow::Continue
                    }
                },
                _ = tokio::signal::ctrl_c() => Flow::Quit,
            };
            if flow == Flow::Quit {
                break;
            }
        }

        self.shutdown(reader).await
    }

    /// Send `lines`, then print whatever arrives within `wait`
    pub async fn send_and_listen(
        &mut self,
        lines: &[String],
        poll_interval: Duration,
        wait: Duration,
    ) -> SerialMonResult<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reader = spawn_reader(Arc::clone(&self.session), poll_interval, tx);

        let mut flow = Flow::Continue;
        for line in lines {
            flow = self.send(line)?;
            if flow == Flow::Quit {
                break;
            }
        }

        let deadline = tokio::time::Instant::now() + wait;
        while flow == Flow::Continue {
            flow = match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(event)) => self.handle_event(event)?,
                Ok(None) | Err(_) => Flow::Quit,
            };
        }

        self.shutdown(reader).await
    }

    async fn shutdown(&mut self, reader: JoinHandle<()>) -> SerialMonResult<()> {
        let session = Arc::clone(&self.session);
        if let Err(e) = tokio::task::spawn_blocking(move || session.close()).await {
            warn!("Close task failed: {}", e);
        }
        if let Err(e) = reader.await {
            warn!("Read loop task failed: {}", e);
        }

        self.emit(LineKind::Info, "Disconnected from serial port.")?;
        self.stop_logging()
    }
}

/// Forward stdin lines from a dedicated thread; the channel closes at EOF
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::{BaudRate, SessionConfig};
    use crate::infrastructure::serial::{LoopbackConnector, DEFAULT_LOOPBACK_PORT};
    use std::fs;
    use tempfile::TempDir;

    fn open_session(connector: Arc<LoopbackConnector>) -> Arc<SerialSession> {
        let session = SerialSession::new(connector);
        session
            .open(
                SessionConfig::new(DEFAULT_LOOPBACK_PORT, BaudRate::DEFAULT)
                    .with_read_timeout(Duration::from_millis(50)),
            )
            .unwrap();
        Arc::new(session)
    }

    fn monitor(dir: &Path) -> Monitor<Vec<u8>> {
        Monitor::new(
            open_session(Arc::new(LoopbackConnector::default())),
            false,
            dir,
            Vec::new(),
        )
    }

    fn printed(monitor: &Monitor<Vec<u8>>) -> String {
        String::from_utf8_lossy(monitor.output()).into_owned()
    }

    #[test]
    fn test_input_is_sent_and_echoed() {
        let temp_dir = TempDir::new().unwrap();
        let mut monitor = monitor(temp_dir.path());

        assert_eq!(monitor.handle_input("AT+GMR\n").unwrap(), Flow::Continue);
        assert_eq!(printed(&monitor), "Sent: AT+GMR\n");
        assert_eq!(
            monitor.session.read_line(Duration::from_millis(200)).unwrap().as_deref(),
            Some("AT+GMR")
        );
    }

    #[test]
    fn test_blank_received_lines_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let mut monitor = monitor(temp_dir.path());

        monitor.handle_event(SessionEvent::Line("  ".to_string())).unwrap();
        monitor.handle_event(SessionEvent::Line("OK".to_string())).unwrap();
        assert_eq!(printed(&monitor), "Received: OK\n");
        assert_eq!(monitor.transcript().len(), 1);
    }

    #[test]
    fn test_fault_event_stops_monitor() {
        let temp_dir = TempDir::new().unwrap();
        let mut monitor = monitor(temp_dir.path());

        let fault = SessionError::Read(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
        assert_eq!(monitor.handle_event(SessionEvent::Fault(fault)).unwrap(), Flow::Quit);
        assert!(printed(&monitor).starts_with("Error reading data: "));
    }

    #[test]
    fn test_send_on_closed_session_reports_not_connected() {
        let temp_dir = TempDir::new().unwrap();
        let mut monitor = monitor(temp_dir.path());
        monitor.session.close();

        assert_eq!(monitor.handle_input("hello").unwrap(), Flow::Continue);
        assert_eq!(printed(&monitor), "Not connected to a serial port.\n");
    }

    #[test]
    fn test_shell_commands() {
        let temp_dir = TempDir::new().unwrap();
        let mut monitor = monitor(temp_dir.path());

        monitor.handle_input("one").unwrap();
        monitor.handle_input(":clear").unwrap();
        assert!(monitor.transcript().is_empty());

        monitor.handle_input(":bogus").unwrap();
        assert!(printed(&monitor).contains("Unknown command ':bogus'"));

        assert_eq!(monitor.handle_input(":quit").unwrap(), Flow::Quit);
    }

    #[test]
    fn test_double_colon_sends_literal_colon() {
        let temp_dir = TempDir::new().unwrap();
        let mut monitor = monitor(temp_dir.path());

        monitor.handle_input("::quit").unwrap();
        assert_eq!(printed(&monitor), "Sent: :quit\n");
    }

    #[test]
    fn test_save_transcript() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.txt");
        let mut monitor = monitor(temp_dir.path());

        monitor.handle_input("PING").unwrap();
        monitor.handle_input(&format!(":save {}", path.display())).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "Sent: PING\n");
    }

    #[test]
    fn test_logging_start_and_stop() {
        let temp_dir = TempDir::new().unwrap();
        let mut monitor = monitor(temp_dir.path());

        monitor.handle_input(":log start").unwrap();
        let path = monitor.log_path().unwrap().to_path_buf();
        monitor.handle_input("hello").unwrap();
        monitor.handle_event(SessionEvent::Line("hello".to_string())).unwrap();
        monitor.handle_input(":log stop").unwrap();
        assert!(monitor.log_path().is_none());
        monitor.handle_input("after").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert!(lines[0].starts_with("Started logging to "));
        assert_eq!(&lines[1..], ["Sent: hello", "Received: hello", "Logging stopped"]);
    }

    #[test]
    fn test_logging_into_missing_directory_reports_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut monitor = monitor(&temp_dir.path().join("missing"));

        monitor.start_logging().unwrap();
        assert!(monitor.log_path().is_none());
        assert!(printed(&monitor).starts_with("Error starting log: "));
    }

    #[tokio::test]
    async fn test_run_until_quit() {
        let temp_dir = TempDir::new().unwrap();
        let mut monitor = monitor(temp_dir.path());
        let (input_tx, input_rx) = mpsc::unbounded_channel();

        input_tx.send("PING".to_string()).unwrap();
        let run = async {
            monitor.run(input_rx, Duration::from_millis(20)).await.unwrap();
        };
        let quit = async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            input_tx.send(":quit".to_string()).unwrap();
        };
        tokio::time::timeout(Duration::from_secs(5), async { tokio::join!(run, quit) })
            .await
            .unwrap();

        assert!(!monitor.session.is_open());
        let out = printed(&monitor);
        assert!(out.contains("Sent: PING\n"));
        assert!(out.contains("Received: PING\n"));
        assert!(out.ends_with("Disconnected from serial port.\n"));
    }

    #[tokio::test]
    async fn test_send_and_listen_collects_replies() {
        let temp_dir = TempDir::new().unwrap();
        let mut monitor = monitor(temp_dir.path());

        let lines = vec!["one".to_string(), "two".to_string()];
        monitor
            .send_and_listen(&lines, Duration::from_millis(20), Duration::from_millis(300))
            .await
            .unwrap();

        assert_eq!(
            printed(&monitor),
            "Sent: one\nSent: two\nReceived: one\nReceived: two\nDisconnected from serial port.\n"
        );
        assert!(!monitor.session.is_open());
    }
}
