use crate::core::session::session::SerialSession;
use crate::domain::error::SessionError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// What the read loop observed
#[derive(Debug)]
pub enum SessionEvent {
    /// One complete line, terminator stripped
    Line(String),
    /// The loop stopped on an error; the session is closed if the error was an I/O fault
    Fault(SessionError),
}

/// Run `read_line` in a loop on a blocking thread, forwarding lines over `tx`.
///
/// The loop ends when the session is closed, when the receiver goes away, or
/// after the first error other than "not open", which is forwarded as
/// [`SessionEvent::Fault`].
pub fn spawn_reader(
    session: Arc<SerialSession>,
    poll_interval: Duration,
    tx: mpsc::UnboundedSender<SessionEvent>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        loop {
            match session.read_line(poll_interval) {
                Ok(Some(line)) => {
                    if tx.send(SessionEvent::Line(line)).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    if tx.is_closed() {
                        break;
                    }
                }
                Err(SessionError::NotOpen) => break,
                Err(e) => {
                    warn!("Read loop stopped: {}", e);
                    let _ = tx.send(SessionEvent::Fault(e));
                    break;
                }
            }
        }
        debug!("Read loop finished");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::{BaudRate, SessionConfig};
    use crate::infrastructure::serial::{LoopbackConnector, DEFAULT_LOOPBACK_PORT};
    use tokio::time::timeout;

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

    #[tokio::test]
    async fn test_lines_are_forwarded_in_order() {
        let session = open_session(Arc::new(LoopbackConnector::default()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = spawn_reader(Arc::clone(&session), Duration::from_millis(50), tx);

        session.write_line("one").unwrap();
        session.write_line("two").unwrap();

        for expected in ["one", "two"] {
            match timeout(Duration::from_secs(2), rx.recv()).await.unwrap() {
                Some(SessionEvent::Line(line)) => assert_eq!(line, expected),
                other => panic!("unexpected event: {:?}", other),
            }
        }

        session.close();
        timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_fault_is_forwarded_once() {
        let connector = Arc::new(LoopbackConnector::default());
        let session = open_session(Arc::clone(&connector));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = spawn_reader(Arc::clone(&session), Duration::from_millis(50), tx);

        connector.unplug(DEFAULT_LOOPBACK_PORT).unwrap();

        match timeout(Duration::from_secs(2), rx.recv()).await.unwrap() {
            Some(SessionEvent::Fault(SessionError::Read(_))) => {}
            other => panic!("unexpected event: {:?}", other),
        }
        timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
        assert!(rx.recv().await.is_none());
        assert!(!session.is_open());
    }

    #[tokio::test]
    async fn test_dropping_receiver_stops_loop() {
        let session = open_session(Arc::new(LoopbackConnector::default()));
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_reader(Arc::clone(&session), Duration::from_millis(20), tx);

        drop(rx);
        timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
        assert!(session.is_open());
    }
}
