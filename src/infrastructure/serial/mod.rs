// Serial module - Port backends and enumeration
pub mod client;
pub mod loopback;
pub mod ports;

pub use client::{PortConnector, PortHalves, SerialLink, SystemConnector};
pub use loopback::{LoopbackConnector, DEFAULT_LOOPBACK_PORT};
pub use ports::{list_ports, PortDescriptor, PortKind};
