use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;
use std::time::Duration;

use log::{info, warn};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::client::protocol::port_handler::PortHandler;
use crate::error::{ProtocolError, Result};

const READ_TIMEOUT: Duration = Duration::from_millis(2);
const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Serial line settings in the form
/// `port:baud:dataBits:parity:stopBits:rtsCtsIn:rtsCtsOut:xonXoffIn:xonXoffOut`.
///
/// Only the port is required; missing fields fall back to 115200 8N1 without
/// flow control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub port: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
}

impl ConnectionDescriptor {
    pub fn new(port: &str) -> Self {
        Self {
            port: port.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }

    pub fn parse(descriptor: &str) -> Result<Self> {
        let mut fields = descriptor.split(':').map(str::trim);
        let port = fields.next().unwrap_or_default();
        if port.is_empty() {
            return Err(ProtocolError::InvalidDescriptor(format!(
                "no port in '{descriptor}'"
            )));
        }
        let mut parsed = Self::new(port);

        if let Some(baud) = fields.next().filter(|f| !f.is_empty()) {
            parsed.baud_rate = baud.parse().map_err(|_| {
                ProtocolError::InvalidDescriptor(format!("invalid baud rate '{baud}'"))
            })?;
        }
        if let Some(bits) = fields.next().filter(|f| !f.is_empty()) {
            parsed.data_bits = match bits {
                "5" => DataBits::Five,
                "6" => DataBits::Six,
                "7" => DataBits::Seven,
                "8" => DataBits::Eight,
                other => {
                    return Err(ProtocolError::InvalidDescriptor(format!(
                        "invalid data bits '{other}'"
                    )));
                }
            };
        }
        if let Some(parity) = fields.next().filter(|f| !f.is_empty()) {
            parsed.parity = match parity.to_ascii_lowercase().as_str() {
                "none" => Parity::None,
                "even" => Parity::Even,
                "odd" => Parity::Odd,
                "mark" | "space" => {
                    warn!("Parity {parity} is not supported, using none!");
                    Parity::None
                }
                _ => {
                    warn!("Unknown parity '{parity}', using none!");
                    Parity::None
                }
            };
        }
        if let Some(stop) = fields.next().filter(|f| !f.is_empty()) {
            parsed.stop_bits = match stop {
                "1" => StopBits::One,
                "2" => StopBits::Two,
                "1 1/2" | "1.5" => {
                    warn!("1.5 stop bits are not supported, using 1!");
                    StopBits::One
                }
                other => {
                    warn!("Unknown stop bits '{other}', using 1!");
                    StopBits::One
                }
            };
        }

        let mut flags = [false; 4];
        for (index, field) in fields.take(4).enumerate() {
            flags[index] = parse_flag(field)?;
        }
        let [rts_cts_in, rts_cts_out, xon_xoff_in, xon_xoff_out] = flags;
        parsed.flow_control = if rts_cts_in || rts_cts_out {
            FlowControl::Hardware
        } else if xon_xoff_in || xon_xoff_out {
            FlowControl::Software
        } else {
            FlowControl::None
        };
        Ok(parsed)
    }
}

fn parse_flag(field: &str) -> Result<bool> {
    if field.is_empty() || field.eq_ignore_ascii_case("false") {
        Ok(false)
    } else if field.eq_ignore_ascii_case("true") {
        Ok(true)
    } else {
        Err(ProtocolError::InvalidDescriptor(format!(
            "invalid flag '{field}', expected true or false"
        )))
    }
}

impl FromStr for ConnectionDescriptor {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} baud, {:?} data bits, parity {:?}, {:?} stop bits, flow control {:?}",
            self.port,
            self.baud_rate,
            self.data_bits,
            self.parity,
            self.stop_bits,
            self.flow_control
        )
    }
}

pub struct SerialPortHandler {
    port: Box<dyn SerialPort>,
    descriptor: ConnectionDescriptor,
}

impl SerialPortHandler {
    pub fn open(descriptor: &ConnectionDescriptor) -> io::Result<Self> {
        info!("Opening {descriptor}");
        let port = serialport::new(&descriptor.port, descriptor.baud_rate)
            .data_bits(descriptor.data_bits)
            .parity(descriptor.parity)
            .stop_bits(descriptor.stop_bits)
            .flow_control(descriptor.flow_control)
            .timeout(READ_TIMEOUT)
            .open()?;
        Ok(Self::from_port(port, descriptor.clone()))
    }

    pub fn from_port(port: Box<dyn SerialPort>, descriptor: ConnectionDescriptor) -> Self {
        Self { port, descriptor }
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }
}

impl PortHandler for SerialPortHandler {
    fn clear_port(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn read_port(&mut self, length: usize) -> io::Result<Vec<u8>> {
        let mut out = vec![0u8; length];
        if length == 0 {
            return Ok(out);
        }
        match self.port.read(&mut out) {
            Ok(read_len) => {
                out.truncate(read_len);
                Ok(out)
            }
            Err(err)
                if err.kind() == io::ErrorKind::TimedOut
                    || err.kind() == io::ErrorKind::WouldBlock =>
            {
                out.clear();
                Ok(out)
            }
            Err(err) => Err(err),
        }
    }

    fn write_port(&mut self, packet: &[u8]) -> io::Result<usize> {
        if packet.is_empty() {
            return Ok(0);
        }
        self.port.write_all(packet)?;
        self.port.flush()?;
        Ok(packet.len())
    }

    fn get_bytes_available(&self) -> io::Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }
}
