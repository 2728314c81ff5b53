use std::fs;
use std::path::Path;

use log::{error, trace, warn};

use crate::client::protocol::catalog::Order;
use crate::client::protocol::port_handler::PortHandler;
use crate::client::protocol::protocol_packet_handler::ProtocolPacketHandler;
use crate::error::{ProtocolError, Result};

const COMMENT_START: char = '#';
const SEPARATOR: char = '=';

/// One `key = value` line of a firmware configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareSetting {
    pub key: String,
    pub value: String,
}

impl FirmwareSetting {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    /// Parameters of the write order: `[keyLen][key][value]`.
    pub fn payload(&self) -> Result<Vec<u8>> {
        let key = self.key.as_bytes();
        let key_len = u8::try_from(key.len()).map_err(|_| {
            ProtocolError::FirmwareConfiguration(format!(
                "setting name '{}' is longer than 255 bytes",
                self.key
            ))
        })?;
        let mut payload = Vec::with_capacity(1 + key.len() + self.value.len());
        payload.push(key_len);
        payload.extend_from_slice(key);
        payload.extend_from_slice(self.value.as_bytes());
        Ok(payload)
    }
}

/// Parses configuration text. Text after `#` is dropped and blank lines are
/// skipped. A line without `=` is a key with an empty value. An empty key is
/// kept, the client decides whether it is valid.
pub fn parse_firmware_configuration(text: &str) -> Vec<FirmwareSetting> {
    let mut settings = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = match line.find(COMMENT_START) {
            Some(start) => &line[..start],
            None => line,
        }
        .trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) = match line.split_once(SEPARATOR) {
            Some((key, value)) => (key.trim(), value.trim()),
            None => (line, ""),
        };
        if key.is_empty() {
            warn!("Line {}: setting without a name!", index + 1);
        }
        settings.push(FirmwareSetting::new(key, value));
    }
    settings
}

pub fn load_firmware_configuration(path: impl AsRef<Path>) -> Result<Vec<FirmwareSetting>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|err| {
        ProtocolError::FirmwareConfiguration(format!("cannot read {}: {err}", path.display()))
    })?;
    Ok(parse_firmware_configuration(&text))
}

pub fn write_setting<P: PortHandler>(
    handler: &mut ProtocolPacketHandler<P>,
    setting: &FirmwareSetting,
) -> Result<()> {
    trace!("Writing to client: -{}- = -{}-", setting.key, setting.value);
    let reply = handler.tx_rx(Order::WriteFirmwareConfiguration, &setting.payload()?)?;
    if let Err(err) = handler.accept_ok(Order::WriteFirmwareConfiguration, &reply) {
        error!(
            "Failed to apply firmware setting {} = {}!",
            setting.key, setting.value
        );
        return Err(err);
    }
    Ok(())
}

/// Writes every setting in order. The first refused setting aborts.
pub fn apply<P: PortHandler>(
    handler: &mut ProtocolPacketHandler<P>,
    settings: &[FirmwareSetting],
) -> Result<()> {
    for setting in settings {
        write_setting(handler, setting)?;
    }
    Ok(())
}
