// Session module - Serial session lifecycle and line I/O
pub mod line;
pub mod reader;
pub mod session;
pub mod state;

pub use reader::{spawn_reader, SessionEvent};
pub use session::SerialSession;
pub use state::{SessionStatistics, SessionStatus};
