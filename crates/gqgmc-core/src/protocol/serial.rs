//! Serial port handling
//!
//! The command channel: a byte transport bound to one serial port. It knows
//! nothing about frames or responses.

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::collections::BTreeMap;
#[cfg(target_os = "linux")]
use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use super::ProtocolError;

/// Per-read timeout; the client loops over short reads until its own deadline
const READ_POLL_MS: u64 = 50;

/// Bidirectional byte transport used by the protocol client
///
/// Implementations must not reorder writes relative to reads. A read may
/// return fewer bytes than the peer sent; returning 0 means nothing arrived
/// within the transport's poll interval.
pub trait Channel {
    /// Write the whole buffer
    fn write_all(&mut self, data: &[u8]) -> Result<(), ProtocolError>;

    /// Read up to `buf.len()` bytes
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ProtocolError>;

    /// Discard unread input and unsent output
    fn flush(&mut self) -> Result<(), ProtocolError>;
}

/// A channel over a physical serial port
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    /// Open and configure a port (8N1, no flow control)
    pub fn open(name: &str, baud_rate: u32) -> Result<Self, ProtocolError> {
        let mut port = serialport::new(name, baud_rate)
            .timeout(Duration::from_millis(READ_POLL_MS))
            .open()
            .map_err(|e| ProtocolError::SerialError(format!("{}: {}", name, e)))?;
        configure_port(port.as_mut())?;
        tracing::debug!(port = name, baud_rate, "serial port opened");
        Ok(Self { port })
    }
}

impl Channel for SerialChannel {
    fn write_all(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        self.port
            .write_all(data)
            .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
        self.port
            .flush()
            .map_err(|e| ProtocolError::SerialError(e.to_string()))
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ProtocolError> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                Ok(0)
            }
            Err(e) => Err(ProtocolError::SerialError(e.to_string())),
        }
    }

    fn flush(&mut self) -> Result<(), ProtocolError> {
        self.port
            .clear(serialport::ClearBuffer::All)
            .map_err(|e| ProtocolError::SerialError(e.to_string()))
    }
}

fn configure_port(port: &mut dyn SerialPort) -> Result<(), ProtocolError> {
    port.set_data_bits(serialport::DataBits::Eight)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    port.set_parity(serialport::Parity::None)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    port.set_stop_bits(serialport::StopBits::One)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    port.set_flow_control(serialport::FlowControl::None)
        .map_err(|e| ProtocolError::SerialError(e.to_string()))?;
    Ok(())
}

/// An attached serial port that could host a GMC device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0")
    pub name: String,

    /// USB product name (if available); GMC units enumerate as CH340 bridges
    pub product: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let product = match info.port_type {
            SerialPortType::UsbPort(usb) => usb.product,
            _ => None,
        };
        Self {
            name: info.port_name,
            product,
        }
    }
}

/// USB serial adapters first (ttyUSB, then ttyACM), numerically; others by name
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    for (rank, prefix) in [(0u8, "ttyUSB"), (1u8, "ttyACM")] {
        if let Some(rest) = basename.strip_prefix(prefix) {
            let num = rest.parse::<usize>().unwrap_or(usize::MAX);
            return (rank, num, basename.to_string());
        }
    }
    (2, 0, basename.to_string())
}

/// Candidate ports, used to report what is attached when opening fails
pub fn list_ports() -> Vec<PortInfo> {
    let mut found: BTreeMap<String, PortInfo> = BTreeMap::new();
    for info in serialport::available_ports().unwrap_or_default() {
        let port = PortInfo::from(info);
        found.entry(port.name.clone()).or_insert(port);
    }

    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname.starts_with("ttyUSB") || fname.starts_with("ttyACM") {
                    let name = format!("/dev/{}", fname);
                    found.entry(name.clone()).or_insert(PortInfo {
                        name,
                        product: None,
                    });
                }
            }
        }
    }

    let mut ports: Vec<PortInfo> = found.into_values().collect();
    ports.sort_by_key(|p| port_sort_key(&p.name));
    ports
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_sorting() {
        let mut names = vec![
            "/dev/ttyACM0",
            "/dev/ttyUSB10",
            "/dev/ttyS0",
            "/dev/ttyUSB1",
            "/dev/ttyUSB0",
        ];
        names.sort_by_key(|n| port_sort_key(n));
        assert_eq!(
            names,
            vec![
                "/dev/ttyUSB0",
                "/dev/ttyUSB1",
                "/dev/ttyUSB10",
                "/dev/ttyACM0",
                "/dev/ttyS0",
            ]
        );
    }

    #[test]
    fn test_open_missing_port() {
        let result = SerialChannel::open("/dev/gqgmc-does-not-exist", 115200);
        assert!(matches!(result, Err(ProtocolError::SerialError(_))));
    }
}
