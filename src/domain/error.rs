use std::io;
use thiserror::Error;

/// Errors produced by a serial session
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to open serial port '{port}': {reason}")]
    Open { port: String, reason: String },

    #[error("Serial port '{port}' is already open")]
    AlreadyOpen { port: String },

    #[error("Serial port is not open")]
    NotOpen,

    #[error("Another read is already in progress on this session")]
    ReaderBusy,

    #[error("Error reading from serial port: {0}")]
    Read(#[source] io::Error),

    #[error("Error writing to serial port: {0}")]
    Write(#[source] io::Error),
}

impl SessionError {
    pub fn open(port: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Open {
            port: port.into(),
            reason: reason.into(),
        }
    }

    /// Read and write faults end the session they happened on.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Read(_) | Self::Write(_))
    }
}

/// SerialMon unified error type
#[derive(Error, Debug)]
pub enum SerialMonError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Output error: {0}")]
    Output(String),
}

pub type SerialMonResult<T> = Result<T, SerialMonError>;
