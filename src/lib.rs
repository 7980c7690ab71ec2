//! SerialMon Library
//!
//! Line-oriented serial port sessions: port discovery, open/read/write/close
//! on a single port, and the console shell built on top of them.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use crate::core::session::{spawn_reader, SerialSession, SessionEvent, SessionStatus};
pub use crate::domain::config::{BaudRate, SessionConfig, Settings};
pub use crate::domain::error::{SerialMonError, SerialMonResult, SessionError};
pub use crate::infrastructure::serial::{list_ports, LoopbackConnector, PortDescriptor};
