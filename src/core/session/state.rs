use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionStatus {
    /// No port handle held
    Closed,
    /// Port handle held and usable
    Open,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Closed => write!(f, "Closed"),
            SessionStatus::Open => write!(f, "Open"),
        }
    }
}

/// Traffic counters for one open session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionStatistics {
    pub lines_sent: u64,
    pub lines_received: u64,
    /// Payload bytes, terminators included
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub opened_at: SystemTime,
    pub uptime: Duration,
}

#[derive(Debug)]
pub(crate) struct Counters {
    lines_sent: AtomicU64,
    lines_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    opened_at: SystemTime,
}

impl Counters {
    pub(crate) fn new() -> Self {
        Self {
            lines_sent: AtomicU64::new(0),
            lines_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            opened_at: SystemTime::now(),
        }
    }

    pub(crate) fn record_sent(&self, bytes: usize) {
        self.lines_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_received(&self, bytes: usize) {
        self.lines_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SessionStatistics {
        SessionStatistics {
            lines_sent: self.lines_sent.load(Ordering::Relaxed),
            lines_received: self.lines_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            opened_at: self.opened_at,
            uptime: self.opened_at.elapsed().unwrap_or_default(),
        }
    }
}
