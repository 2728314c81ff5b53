use std::collections::BTreeMap;
use std::fmt;

use log::error;

use crate::client::protocol::catalog::{DeviceType, InfoKind, ProtocolExtension, Reply};

/// Attributes collected from a client during a conformance run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInformation {
    pub connection: String,
    pub firmware_name: String,
    pub serial_number: String,
    pub hardware_name: String,
    pub given_identity: String,
    pub extensions: Vec<ProtocolExtension>,
    pub protocol_version: (u64, u64),
    pub firmware_type: Option<u64>,
    pub firmware_version: (u64, u64),
    pub hardware_type: Option<u64>,
    pub hardware_revision: Option<u64>,
    /// Steps per second.
    pub max_step_rate: Option<u64>,
    /// Seconds.
    pub host_timeout: Option<u64>,
    pub device_counts: BTreeMap<DeviceType, u64>,
    pub can_deactivate_stepper_control: Option<bool>,
}

impl ClientInformation {
    pub fn new(connection: &str) -> Self {
        Self {
            connection: connection.to_string(),
            ..Self::default()
        }
    }

    /// Stores the answer to a request information order.
    pub fn record(&mut self, kind: InfoKind, reply: &Reply) {
        match kind {
            InfoKind::FirmwareName => self.firmware_name = reply.text(),
            InfoKind::SerialNumber => self.serial_number = reply.text(),
            InfoKind::BoardName => self.hardware_name = reply.text(),
            InfoKind::GivenName => self.given_identity = reply.text(),
            InfoKind::ProtocolVersionMajor => self.protocol_version.0 = reply.integer(),
            InfoKind::ProtocolVersionMinor => self.protocol_version.1 = reply.integer(),
            InfoKind::SupportedExtensions => {
                self.extensions = reply
                    .parameters
                    .iter()
                    .map(|code| ProtocolExtension::from_code(*code))
                    .collect();
            }
            InfoKind::FirmwareType => self.firmware_type = Some(reply.integer()),
            InfoKind::FirmwareRevisionMajor => self.firmware_version.0 = reply.integer(),
            InfoKind::FirmwareRevisionMinor => self.firmware_version.1 = reply.integer(),
            InfoKind::HardwareType => self.hardware_type = Some(reply.integer()),
            InfoKind::HardwareRevision => self.hardware_revision = Some(reply.integer()),
            InfoKind::MaxStepRate => self.max_step_rate = Some(reply.integer()),
            InfoKind::HostTimeout => self.host_timeout = Some(reply.integer()),
            InfoKind::Unknown(_) => {}
        }
    }

    pub fn set_device_count(&mut self, device_type: DeviceType, count: u64) {
        self.device_counts.insert(device_type, count);
    }

    /// Zero, with an error logged, when the count was never reported.
    pub fn device_count(&self, device_type: DeviceType) -> u64 {
        match self.device_counts.get(&device_type) {
            Some(count) => *count,
            None => {
                error!("No information about the number of devices of type {device_type}!");
                0
            }
        }
    }

    pub fn supports(&self, extension: ProtocolExtension) -> bool {
        self.extensions.contains(&extension)
    }
}

fn firmware_type_name(code: u64) -> Option<&'static str> {
    match code {
        0 => Some("pmc"),
        1 => Some("Minnow"),
        _ => None,
    }
}

fn hardware_type_name(code: u64) -> Option<&'static str> {
    match code {
        0 => Some("pipy"),
        1 => Some("AVR (Arduino,..)"),
        _ => None,
    }
}

struct Maybe(Option<u64>);

impl fmt::Display for Maybe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{value}"),
            None => f.write_str("unknown"),
        }
    }
}

fn write_named(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    value: Option<u64>,
    name: fn(u64) -> Option<&'static str>,
) -> fmt::Result {
    match value.and_then(name) {
        Some(name) => writeln!(f, "{label:<21}: {name}"),
        None => writeln!(f, "{label:<21}: {}", Maybe(value)),
    }
}

impl fmt::Display for ClientInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Client at {}", self.connection)?;
        writeln!(f, "is {}", self.firmware_name)?;
        writeln!(f, "Serial Number        : {}", self.serial_number)?;
        writeln!(f, "Hardware             : {}", self.hardware_name)?;
        writeln!(f, "ID                   : {}", self.given_identity)?;
        writeln!(f, "supported Extensions :")?;
        for extension in &self.extensions {
            match extension {
                ProtocolExtension::Unknown(_) => {
                    writeln!(f, "ERROR: client reports an {extension}!")?
                }
                known => writeln!(f, " - {known}")?,
            }
        }
        write_named(f, "Firmware Type", self.firmware_type, firmware_type_name)?;
        writeln!(
            f,
            "Firmware Version     : {}.{}",
            self.firmware_version.0, self.firmware_version.1
        )?;
        writeln!(
            f,
            "Protocol Version     : {}.{}",
            self.protocol_version.0, self.protocol_version.1
        )?;
        write_named(f, "Hardware Type", self.hardware_type, hardware_type_name)?;
        writeln!(f, "Hardware Revision    : {}", Maybe(self.hardware_revision))?;
        writeln!(f, "Step Rate max.       : {} Steps/sec", Maybe(self.max_step_rate))?;
        writeln!(f, "Host Timeout         : {} sec", Maybe(self.host_timeout))?;
        writeln!(f, "has these Devices    :")?;
        for device_type in DeviceType::ALL {
            let count = Maybe(self.device_counts.get(&device_type).copied());
            writeln!(f, "{count} {device_type}")?;
        }
        match self.can_deactivate_stepper_control {
            Some(true) => write!(f, "can deactivate the stepper control."),
            Some(false) => write!(f, "can not deactivate the stepper control."),
            None => write!(f, "stepper control was not tested."),
        }
    }
}
