use crate::domain::error::SerialMonResult;
use serde::Serialize;
use serialport::{SerialPortInfo, SerialPortType};
use std::fmt;
use tracing::debug;

/// Bus a discovered port hangs off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    Usb,
    Pci,
    Bluetooth,
    Unknown,
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortKind::Usb => write!(f, "usb"),
            PortKind::Pci => write!(f, "pci"),
            PortKind::Bluetooth => write!(f, "bluetooth"),
            PortKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// One discoverable serial device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortDescriptor {
    /// Identifier passed to `open`
    pub name: String,
    pub kind: PortKind,
    pub description: Option<String>,
}

impl From<SerialPortInfo> for PortDescriptor {
    fn from(info: SerialPortInfo) -> Self {
        let (kind, description) = match info.port_type {
            SerialPortType::UsbPort(usb) => (
                PortKind::Usb,
                Some(describe_usb(
                    usb.vid,
                    usb.pid,
                    usb.manufacturer.as_deref(),
                    usb.product.as_deref(),
                    usb.serial_number.as_deref(),
                )),
            ),
            SerialPortType::PciPort => (PortKind::Pci, None),
            SerialPortType::BluetoothPort => (PortKind::Bluetooth, None),
            SerialPortType::Unknown => (PortKind::Unknown, None),
        };

        Self {
            name: info.port_name,
            kind,
            description,
        }
    }
}

/// Human-readable summary of a USB serial adapter, e.g. `FTDI FT232R (0403:6001, SN A1B2)`
pub fn describe_usb(
    vid: u16,
    pid: u16,
    manufacturer: Option<&str>,
    product: Option<&str>,
    serial_number: Option<&str>,
) -> String {
    let label = [manufacturer, product]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let mut ids = format!("{:04x}:{:04x}", vid, pid);
    if let Some(serial) = serial_number.filter(|s| !s.is_empty()) {
        ids.push_str(", SN ");
        ids.push_str(serial);
    }

    if label.is_empty() {
        format!("USB device ({})", ids)
    } else {
        format!("{} ({})", label, ids)
    }
}

/// List the serial devices currently attached, sorted by name.
///
/// Nothing is cached; every call queries the OS again. No attached devices
/// is an empty list, not an error.
pub fn list_ports() -> SerialMonResult<Vec<PortDescriptor>> {
    let ports = serialport::available_ports()?;
    let descriptors = sort_descriptors(ports.into_iter().map(PortDescriptor::from).collect());
    debug!("Found {} serial port(s)", descriptors.len());
    Ok(descriptors)
}

fn sort_descriptors(mut ports: Vec<PortDescriptor>) -> Vec<PortDescriptor> {
    ports.sort_by(|a, b| a.name.cmp(&b.name));
    ports.dedup_by(|a, b| a.name == b.name);
    ports
}
