use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Append-only log file, flushed after every line
#[derive(Debug)]
pub struct LogFile {
    path: PathBuf,
    file: File,
}

impl LogFile {
    /// Create `serial_log_YYYYMMDD_HHMMSS.txt` inside `dir`
    pub fn create_in(dir: &Path) -> io::Result<Self> {
        let name = format!("serial_log_{}.txt", Local::now().format("%Y%m%d_%H%M%S"));
        Self::open(dir.join(name))
    }

    /// Open `path` for appending, creating it if needed
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!("Logging to {}", path.display());
        Ok(Self { path, file })
    }

    pub fn append(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.file, "{}", line)?;
        self.file.flush()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
