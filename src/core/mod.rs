// Core module - Serial session and transcript
pub mod session;
pub mod transcript;
