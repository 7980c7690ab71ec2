//! Consumer-side record of everything shown to the user.
//!
//! A transcript is an append-only list of [`LogLine`]s in production order.
//! Only [`Transcript::clear`] removes lines.

pub mod file;

pub use file::LogFile;

use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::Path;

/// Where a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Read from the port
    Received,
    /// Written to the port
    Sent,
    /// Status notice from the shell
    Info,
    /// Failure notice from the shell
    Error,
}

#[derive(Debug, Clone)]
pub struct LogLine {
    pub at: DateTime<Local>,
    pub kind: LineKind,
    pub text: String,
}

impl LogLine {
    pub fn new(kind: LineKind, text: impl Into<String>) -> Self {
        Self {
            at: Local::now(),
            kind,
            text: text.into(),
        }
    }

    /// Display form, e.g. `[14:03:07.512] Received: OK`
    pub fn render(&self, timestamps: bool) -> String {
        let body = match self.kind {
            LineKind::Received => format!("Received: {}", self.text),
            LineKind::Sent => format!("Sent: {}", self.text),
            LineKind::Info | LineKind::Error => self.text.clone(),
        };
        if timestamps {
            format!("[{}] {}", self.at.format("%H:%M:%S%.3f"), body)
        } else {
            body
        }
    }
}

#[derive(Debug, Default)]
pub struct Transcript {
    lines: Vec<LogLine>,
    timestamps: bool,
}

impl Transcript {
    pub fn new(timestamps: bool) -> Self {
        Self {
            lines: Vec::new(),
            timestamps,
        }
    }

    pub fn push(&mut self, kind: LineKind, text: impl Into<String>) -> &LogLine {
        self.lines.push(LogLine::new(kind, text));
        &self.lines[self.lines.len() - 1]
    }

    pub fn render(&self, line: &LogLine) -> String {
        line.render(self.timestamps)
    }

    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn timestamps(&self) -> bool {
        self.timestamps
    }

    pub fn set_timestamps(&mut self, enabled: bool) {
        self.timestamps = enabled;
    }

    /// Write every rendered line to `path`, replacing its contents
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut content = String::new();
        for line in &self.lines {
            content.push_str(&self.render(line));
            content.push('\n');
        }
        fs::write(path, content)
    }
}
