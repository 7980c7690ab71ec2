//! In-memory loopback ports.
//!
//! Every byte written to a loopback port is read back from the same port, the
//! way a TX-RX jumper behaves on real hardware. Ports can also be fed bytes
//! directly to simulate a chatty device, and unplugged to simulate a fault.

use crate::domain::config::SessionConfig;
use crate::domain::error::SessionError;
use crate::infrastructure::serial::client::{PortConnector, PortHalves, SerialLink};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{self, Read, Write};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_LOOPBACK_PORT: &str = "MOCK0";

#[derive(Default)]
struct WireState {
    bytes: VecDeque<u8>,
    unplugged: bool,
}

#[derive(Default)]
struct Wire {
    state: Mutex<WireState>,
    ready: Condvar,
}

impl Wire {
    fn lock(&self) -> MutexGuard<'_, WireState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, data: &[u8]) -> io::Result<()> {
        let mut state = self.lock();
        if state.unplugged {
            return Err(unplugged_error());
        }
        state.bytes.extend(data);
        self.ready.notify_all();
        Ok(())
    }
}

fn unplugged_error() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "device disconnected")
}

/// Releases the port name when both halves are gone
struct Claim {
    port: String,
    claimed: Arc<Mutex<HashSet<String>>>,
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.port);
        debug!("Loopback port '{}' released", self.port);
    }
}

struct LoopbackReader {
    wire: Arc<Wire>,
    timeout: Duration,
    _claim: Arc<Claim>,
}

impl Read for LoopbackReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let deadline = Instant::now().checked_add(self.timeout);
        let mut state = self.wire.lock();
        loop {
            if state.unplugged {
                return Err(unplugged_error());
            }
            if !state.bytes.is_empty() {
                break;
            }
            state = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(io::Error::new(io::ErrorKind::TimedOut, "Operation timed out"));
                    }
                    self.wire
                        .ready
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self.wire.ready.wait(state).unwrap_or_else(PoisonError::into_inner),
            };
        }
        let n = buf.len().min(state.bytes.len());
        for (slot, byte) in buf.iter_mut().zip(state.bytes.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl SerialLink for LoopbackReader {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.timeout = timeout;
        Ok(())
    }
}

struct LoopbackWriter {
    wire: Arc<Wire>,
    _claim: Arc<Claim>,
}

impl Write for LoopbackWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.wire.push(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.wire.lock().unplugged {
            return Err(unplugged_error());
        }
        Ok(())
    }
}

/// Connector over a fixed set of named loopback ports
pub struct LoopbackConnector {
    wires: HashMap<String, Arc<Wire>>,
    claimed: Arc<Mutex<HashSet<String>>>,
}

impl LoopbackConnector {
    pub fn with_ports<I, S>(ports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            wires: ports
                .into_iter()
                .map(|name| (name.into(), Arc::new(Wire::default())))
                .collect(),
            claimed: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Port names, sorted
    pub fn port_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.wires.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_claimed(&self, port: &str) -> bool {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(port)
    }

    /// Queue bytes as if the device had sent them
    pub fn inject(&self, port: &str, data: &[u8]) -> io::Result<()> {
        self.wire(port)?.push(data)
    }

    /// Simulate the device disappearing; pending I/O fails and new opens are refused
    pub fn unplug(&self, port: &str) -> io::Result<()> {
        let wire = self.wire(port)?;
        let mut state = wire.lock();
        state.unplugged = true;
        state.bytes.clear();
        wire.ready.notify_all();
        Ok(())
    }

    pub fn plug(&self, port: &str) -> io::Result<()> {
        self.wire(port)?.lock().unplugged = false;
        Ok(())
    }

    fn wire(&self, port: &str) -> io::Result<&Arc<Wire>> {
        self.wires.get(port).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("No loopback port '{}'", port))
        })
    }
}

impl Default for LoopbackConnector {
    fn default() -> Self {
        Self::with_ports([DEFAULT_LOOPBACK_PORT])
    }
}

impl PortConnector for LoopbackConnector {
    fn connect(&self, config: &SessionConfig) -> Result<PortHalves, SessionError> {
        let wire = self
            .wires
            .get(&config.port)
            .ok_or_else(|| SessionError::open(&config.port, "No such device"))?;

        if wire.lock().unplugged {
            return Err(SessionError::open(&config.port, "No such device"));
        }

        {
            let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
            if !claimed.insert(config.port.clone()) {
                return Err(SessionError::open(&config.port, "Device or resource busy"));
            }
        }

        // Stale bytes from a previous session are not delivered
        wire.lock().bytes.clear();

        let claim = Arc::new(Claim {
            port: config.port.clone(),
            claimed: Arc::clone(&self.claimed),
        });

        debug!("Loopback port '{}' opened at {} baud", config.port, config.baud_rate);

        Ok(PortHalves {
            reader: Box::new(LoopbackReader {
                wire: Arc::clone(wire),
                timeout: config.read_timeout,
                _claim: Arc::clone(&claim),
            }),
            writer: Box::new(LoopbackWriter {
                wire: Arc::clone(wire),
                _claim: claim,
            }),
        })
    }
}
