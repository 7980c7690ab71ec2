use crate::domain::config::{FlowControlConfig, ParityConfig, SessionConfig};
use crate::domain::error::SessionError;
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::{debug, info};

/// Receiving half of an open port
pub trait SerialLink: Read + Send {
    /// Bound the next blocking `read` to `timeout`
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

/// Independent receive and transmit halves of one open port
pub struct PortHalves {
    pub reader: Box<dyn SerialLink>,
    pub writer: Box<dyn Write + Send>,
}

/// Opens configured ports. Implemented by the OS backend and the loopback used in tests.
pub trait PortConnector: Send + Sync {
    fn connect(&self, config: &SessionConfig) -> Result<PortHalves, SessionError>;
}

impl<C: PortConnector + ?Sized> PortConnector for std::sync::Arc<C> {
    fn connect(&self, config: &SessionConfig) -> Result<PortHalves, SessionError> {
        (**self).connect(config)
    }
}

/// OS serial backend built on the `serialport` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConnector;

struct SystemLink(Box<dyn SerialPort>);

impl Read for SystemLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl SerialLink for SystemLink {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.0.set_timeout(timeout).map_err(io::Error::from)
    }
}

impl PortConnector for SystemConnector {
    fn connect(&self, config: &SessionConfig) -> Result<PortHalves, SessionError> {
        let data_bits = match config.data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            8 => serialport::DataBits::Eight,
            other => {
                return Err(SessionError::open(
                    &config.port,
                    format!("Invalid data bits: {}", other),
                ))
            }
        };

        let stop_bits = match config.stop_bits {
            1 => serialport::StopBits::One,
            2 => serialport::StopBits::Two,
            other => {
                return Err(SessionError::open(
                    &config.port,
                    format!("Invalid stop bits: {}", other),
                ))
            }
        };

        let parity = match config.parity {
            ParityConfig::None => serialport::Parity::None,
            ParityConfig::Even => serialport::Parity::Even,
            ParityConfig::Odd => serialport::Parity::Odd,
        };

        let flow_control = match config.flow_control {
            FlowControlConfig::None => serialport::FlowControl::None,
            FlowControlConfig::Software => serialport::FlowControl::Software,
            FlowControlConfig::Hardware => serialport::FlowControl::Hardware,
        };

        let port = serialport::new(&config.port, config.baud_rate.value())
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity)
            .flow_control(flow_control)
            .timeout(config.read_timeout)
            .open()
            .map_err(|e| SessionError::open(&config.port, e.to_string()))?;

        let writer = port
            .try_clone()
            .map_err(|e| {
                SessionError::open(&config.port, format!("Failed to clone handle: {}", e))
            })?;

        debug!(
            "Serial port '{}' configured: {} {}{}{}",
            config.port,
            config.baud_rate,
            config.data_bits,
            parity_letter(config.parity),
            config.stop_bits
        );
        info!("Serial port '{}' opened successfully", config.port);

        Ok(PortHalves {
            reader: Box::new(SystemLink(port)),
            writer: Box::new(writer),
        })
    }
}

fn parity_letter(parity: ParityConfig) -> char {
    match parity {
        ParityConfig::None => 'N',
        ParityConfig::Even => 'E',
        ParityConfig::Odd => 'O',
    }
}
