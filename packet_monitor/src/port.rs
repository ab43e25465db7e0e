//! Gateway serial port.

use std::io::Read;
use std::time::Duration;

use anyhow::Result;
use serialport::{SerialPort, SerialPortType};

/// Find candidate gateway ports: USB serial adapters and CDC-ACM devices.
pub fn find_gateway_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports()?;

    Ok(ports
        .into_iter()
        .filter(|info| {
            matches!(info.port_type, SerialPortType::UsbPort(_))
                || info.port_name.contains("ttyACM")
                || info.port_name.contains("ttyUSB")
        })
        .map(|info| info.port_name)
        .collect())
}

/// Resolve a port argument - returns the port path if not "auto", otherwise auto-detects.
pub fn resolve_port(port_arg: &str) -> Result<String> {
    if port_arg != "auto" {
        return Ok(port_arg.to_string());
    }

    match find_gateway_ports()?.into_iter().next() {
        Some(port) => Ok(port),
        None => anyhow::bail!("No gateway port found - ensure the receiver is connected"),
    }
}

/// Byte stream from the gateway.
pub struct GatewayPort {
    port: Box<dyn SerialPort>,
}

impl GatewayPort {
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(200))
            .open()?;

        Ok(Self { port })
    }

    /// Discard anything buffered before we attached.
    pub fn clear_buffer(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::All)?;
        Ok(())
    }

    /// Read whatever is available. A timeout yields zero bytes.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}
