//! Order codes, reply codes and the sub-codes carried in reply parameters.
//!
//! Every vocabulary is a closed enum with an `Unknown` fallback so that
//! frames from newer firmware still decode and render.

use std::fmt;

use log::{error, warn};

use crate::client::protocol::pacemaker_def::*;
use crate::error::{ProtocolError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Order {
    Resume,
    RequestInformation,
    RequestDeviceName,
    RequestTemperature,
    GetHeaterConfiguration,
    ConfigureHeater,
    SetHeaterTargetTemperature,
    RequestInput,
    SetOutput,
    SetPwm,
    WriteFirmwareConfiguration,
    ReadFirmwareConfiguration,
    StopPrint,
    ActivateStepperControl,
    EnableDisableStepperMotors,
    ConfigureEndStops,
    EnableDisableEndStops,
    RequestDeviceCount,
    QueueCommandBlocks,
    ConfigureAxisMovementRates,
    RetrieveEvents,
    GetNumberEventFormatIds,
    GetEventStringFormatId,
    ClearCommandBlockQueue,
    RequestDeviceStatus,
    ConfigureMovementUnderrunAvoidanceParameters,
    GetFirmwareConfigurationValueProperties,
    TraverseFirmwareConfigurationValues,
    Reset,
    Unknown(u8),
}

/// How an order lays out its parameter bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderShape {
    OrderOnly,
    Byte,
    /// One byte followed by a big-endian u32.
    ByteU32,
    Bytes,
}

impl OrderShape {
    /// Whether a parameter area of this length fits the shape.
    pub fn accepts(self, parameter_len: usize) -> bool {
        match self {
            OrderShape::OrderOnly => parameter_len == 0,
            OrderShape::Byte => parameter_len == 1,
            OrderShape::ByteU32 => parameter_len == 5,
            OrderShape::Bytes => true,
        }
    }
}

impl Order {
    pub fn from_code(code: u8) -> Self {
        match code {
            ORDER_RESUME => Order::Resume,
            ORDER_REQ_INFORMATION => Order::RequestInformation,
            ORDER_REQ_DEVICE_NAME => Order::RequestDeviceName,
            ORDER_REQ_TEMPERATURE => Order::RequestTemperature,
            ORDER_GET_HEATER_CONFIGURATION => Order::GetHeaterConfiguration,
            ORDER_CONFIGURE_HEATER => Order::ConfigureHeater,
            ORDER_SET_HEATER_TARGET_TEMPERATURE => Order::SetHeaterTargetTemperature,
            ORDER_REQ_INPUT => Order::RequestInput,
            ORDER_SET_OUTPUT => Order::SetOutput,
            ORDER_SET_PWM => Order::SetPwm,
            ORDER_WRITE_FIRMWARE_CONFIGURATION => Order::WriteFirmwareConfiguration,
            ORDER_READ_FIRMWARE_CONFIGURATION => Order::ReadFirmwareConfiguration,
            ORDER_STOP_PRINT => Order::StopPrint,
            ORDER_ACTIVATE_STEPPER_CONTROL => Order::ActivateStepperControl,
            ORDER_ENABLE_DISABLE_STEPPER_MOTORS => Order::EnableDisableStepperMotors,
            ORDER_CONFIGURE_END_STOPS => Order::ConfigureEndStops,
            ORDER_ENABLE_DISABLE_END_STOPS => Order::EnableDisableEndStops,
            ORDER_REQUEST_DEVICE_COUNT => Order::RequestDeviceCount,
            ORDER_QUEUE_COMMAND_BLOCKS => Order::QueueCommandBlocks,
            ORDER_CONFIGURE_AXIS_MOVEMENT_RATES => Order::ConfigureAxisMovementRates,
            ORDER_RETRIEVE_EVENTS => Order::RetrieveEvents,
            ORDER_GET_NUMBER_EVENT_FORMAT_IDS => Order::GetNumberEventFormatIds,
            ORDER_GET_EVENT_STRING_FORMAT_ID => Order::GetEventStringFormatId,
            ORDER_CLEAR_COMMAND_BLOCK_QUEUE => Order::ClearCommandBlockQueue,
            ORDER_REQUEST_DEVICE_STATUS => Order::RequestDeviceStatus,
            ORDER_CONFIGURE_MOVEMENT_UNDERRUN_AVOIDANCE_PARAMETERS => {
                Order::ConfigureMovementUnderrunAvoidanceParameters
            }
            ORDER_GET_FIRMWARE_CONFIGURATION_VALUE_PROPERTIES => {
                Order::GetFirmwareConfigurationValueProperties
            }
            ORDER_TRAVERSE_FIRMWARE_CONFIGURATION_VALUES => {
                Order::TraverseFirmwareConfigurationValues
            }
            ORDER_RESET => Order::Reset,
            other => Order::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Order::Resume => ORDER_RESUME,
            Order::RequestInformation => ORDER_REQ_INFORMATION,
            Order::RequestDeviceName => ORDER_REQ_DEVICE_NAME,
            Order::RequestTemperature => ORDER_REQ_TEMPERATURE,
            Order::GetHeaterConfiguration => ORDER_GET_HEATER_CONFIGURATION,
            Order::ConfigureHeater => ORDER_CONFIGURE_HEATER,
            Order::SetHeaterTargetTemperature => ORDER_SET_HEATER_TARGET_TEMPERATURE,
            Order::RequestInput => ORDER_REQ_INPUT,
            Order::SetOutput => ORDER_SET_OUTPUT,
            Order::SetPwm => ORDER_SET_PWM,
            Order::WriteFirmwareConfiguration => ORDER_WRITE_FIRMWARE_CONFIGURATION,
            Order::ReadFirmwareConfiguration => ORDER_READ_FIRMWARE_CONFIGURATION,
            Order::StopPrint => ORDER_STOP_PRINT,
            Order::ActivateStepperControl => ORDER_ACTIVATE_STEPPER_CONTROL,
            Order::EnableDisableStepperMotors => ORDER_ENABLE_DISABLE_STEPPER_MOTORS,
            Order::ConfigureEndStops => ORDER_CONFIGURE_END_STOPS,
            Order::EnableDisableEndStops => ORDER_ENABLE_DISABLE_END_STOPS,
            Order::RequestDeviceCount => ORDER_REQUEST_DEVICE_COUNT,
            Order::QueueCommandBlocks => ORDER_QUEUE_COMMAND_BLOCKS,
            Order::ConfigureAxisMovementRates => ORDER_CONFIGURE_AXIS_MOVEMENT_RATES,
            Order::RetrieveEvents => ORDER_RETRIEVE_EVENTS,
            Order::GetNumberEventFormatIds => ORDER_GET_NUMBER_EVENT_FORMAT_IDS,
            Order::GetEventStringFormatId => ORDER_GET_EVENT_STRING_FORMAT_ID,
            Order::ClearCommandBlockQueue => ORDER_CLEAR_COMMAND_BLOCK_QUEUE,
            Order::RequestDeviceStatus => ORDER_REQUEST_DEVICE_STATUS,
            Order::ConfigureMovementUnderrunAvoidanceParameters => {
                ORDER_CONFIGURE_MOVEMENT_UNDERRUN_AVOIDANCE_PARAMETERS
            }
            Order::GetFirmwareConfigurationValueProperties => {
                ORDER_GET_FIRMWARE_CONFIGURATION_VALUE_PROPERTIES
            }
            Order::TraverseFirmwareConfigurationValues => {
                ORDER_TRAVERSE_FIRMWARE_CONFIGURATION_VALUES
            }
            Order::Reset => ORDER_RESET,
            Order::Unknown(code) => code,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Order::Resume => "resume",
            Order::RequestInformation => "request information",
            Order::RequestDeviceName => "request device name",
            Order::RequestTemperature => "request temperature",
            Order::GetHeaterConfiguration => "get heater configuration",
            Order::ConfigureHeater => "configure heater",
            Order::SetHeaterTargetTemperature => "set heater target temperature",
            Order::RequestInput => "request input",
            Order::SetOutput => "set output",
            Order::SetPwm => "set pwm",
            Order::WriteFirmwareConfiguration => "write firmware configuration",
            Order::ReadFirmwareConfiguration => "read firmware configuration",
            Order::StopPrint => "stop print",
            Order::ActivateStepperControl => "activate stepper control",
            Order::EnableDisableStepperMotors => "enable/disable stepper motors",
            Order::ConfigureEndStops => "configure end stops",
            Order::EnableDisableEndStops => "enable/disable end stops",
            Order::RequestDeviceCount => "request device count",
            Order::QueueCommandBlocks => "queue command blocks",
            Order::ConfigureAxisMovementRates => "configure axis movement rates",
            Order::RetrieveEvents => "retrieve events",
            Order::GetNumberEventFormatIds => "get number of event format ids",
            Order::GetEventStringFormatId => "get event string format id",
            Order::ClearCommandBlockQueue => "clear command block queue",
            Order::RequestDeviceStatus => "request device status",
            Order::ConfigureMovementUnderrunAvoidanceParameters => {
                "configure movement underrun avoidance parameters"
            }
            Order::GetFirmwareConfigurationValueProperties => {
                "get firmware configuration value properties"
            }
            Order::TraverseFirmwareConfigurationValues => "traverse firmware configuration values",
            Order::Reset => "reset",
            Order::Unknown(_) => "unrecognized order",
        }
    }

    pub fn shape(self) -> OrderShape {
        match self {
            Order::RetrieveEvents
            | Order::GetNumberEventFormatIds
            | Order::ClearCommandBlockQueue
            | Order::Reset => OrderShape::OrderOnly,
            Order::Resume
            | Order::RequestInformation
            | Order::GetHeaterConfiguration
            | Order::StopPrint
            | Order::ActivateStepperControl
            | Order::RequestDeviceCount => OrderShape::Byte,
            Order::ConfigureAxisMovementRates => OrderShape::ByteU32,
            _ => OrderShape::Bytes,
        }
    }

    /// Minimum parameter bytes of an OK reply to this order.
    pub fn min_reply_len(self) -> usize {
        match self {
            Order::RequestTemperature => 2,
            Order::GetHeaterConfiguration
            | Order::RequestInput
            | Order::RequestDeviceCount
            | Order::GetNumberEventFormatIds
            | Order::RequestDeviceStatus => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::Unknown(code) => write!(f, "unrecognized order 0x{code:02X}"),
            known => f.write_str(known.name()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyCode {
    FrameReceiptError,
    Ok,
    GenericApplicationError,
    Stopped,
    OrderSpecificError,
    DebugMessage,
    NewEvent,
    Unknown(u8),
}

impl ReplyCode {
    pub fn from_code(code: u8) -> Self {
        match code {
            RESPONSE_FRAME_RECEIPT_ERROR => ReplyCode::FrameReceiptError,
            RESPONSE_OK => ReplyCode::Ok,
            RESPONSE_GENERIC_APPLICATION_ERROR => ReplyCode::GenericApplicationError,
            RESPONSE_STOPPED => ReplyCode::Stopped,
            RESPONSE_ORDER_SPECIFIC_ERROR => ReplyCode::OrderSpecificError,
            RESPONSE_DEBUG_FRAME_DEBUG_MESSAGE => ReplyCode::DebugMessage,
            RESPONSE_DEBUG_FRAME_NEW_EVENT => ReplyCode::NewEvent,
            other => ReplyCode::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            ReplyCode::FrameReceiptError => RESPONSE_FRAME_RECEIPT_ERROR,
            ReplyCode::Ok => RESPONSE_OK,
            ReplyCode::GenericApplicationError => RESPONSE_GENERIC_APPLICATION_ERROR,
            ReplyCode::Stopped => RESPONSE_STOPPED,
            ReplyCode::OrderSpecificError => RESPONSE_ORDER_SPECIFIC_ERROR,
            ReplyCode::DebugMessage => RESPONSE_DEBUG_FRAME_DEBUG_MESSAGE,
            ReplyCode::NewEvent => RESPONSE_DEBUG_FRAME_NEW_EVENT,
            ReplyCode::Unknown(code) => code,
        }
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyCode::FrameReceiptError => f.write_str("frame receipt error"),
            ReplyCode::Ok => f.write_str("ok"),
            ReplyCode::GenericApplicationError => f.write_str("generic application error"),
            ReplyCode::Stopped => f.write_str("stopped"),
            ReplyCode::OrderSpecificError => f.write_str("order specific error"),
            ReplyCode::DebugMessage => f.write_str("debug message"),
            ReplyCode::NewEvent => f.write_str("new event"),
            ReplyCode::Unknown(code) => write!(f, "unrecognized reply 0x{code:02X}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameReceiptError {
    BadFrame,
    BadErrorCheckCode,
    UnableToAcceptFrame,
    Unknown(u8),
}

impl FrameReceiptError {
    pub fn from_code(code: u8) -> Self {
        match code {
            RECEIPT_BAD_FRAME => FrameReceiptError::BadFrame,
            RECEIPT_BAD_ERROR_CHECK_CODE => FrameReceiptError::BadErrorCheckCode,
            RECEIPT_UNABLE_TO_ACCEPT_FRAME => FrameReceiptError::UnableToAcceptFrame,
            other => FrameReceiptError::Unknown(other),
        }
    }
}

impl fmt::Display for FrameReceiptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameReceiptError::BadFrame => f.write_str("bad frame"),
            FrameReceiptError::BadErrorCheckCode => f.write_str("bad error check code"),
            FrameReceiptError::UnableToAcceptFrame => f.write_str("unable to accept frame"),
            FrameReceiptError::Unknown(code) => {
                write!(f, "unrecognized receipt error 0x{code:02X}")
            }
        }
    }
}

/// Sub-reason of a generic application error reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationError {
    UnknownOrder,
    BadParameterFormat,
    BadParameterValue,
    InvalidDeviceType,
    InvalidDeviceNumber,
    IncorrectMode,
    Busy,
    Failed,
    FirmwareError,
    CannotActivateDevice,
    Unknown(u8),
}

impl ApplicationError {
    pub fn from_code(code: u8) -> Self {
        match code {
            ERR_UNKNOWN_ORDER => ApplicationError::UnknownOrder,
            ERR_BAD_PARAMETER_FORMAT => ApplicationError::BadParameterFormat,
            ERR_BAD_PARAMETER_VALUE => ApplicationError::BadParameterValue,
            ERR_INVALID_DEVICE_TYPE => ApplicationError::InvalidDeviceType,
            ERR_INVALID_DEVICE_NUMBER => ApplicationError::InvalidDeviceNumber,
            ERR_INCORRECT_MODE => ApplicationError::IncorrectMode,
            ERR_BUSY => ApplicationError::Busy,
            ERR_FAILED => ApplicationError::Failed,
            ERR_FIRMWARE_ERROR => ApplicationError::FirmwareError,
            ERR_CANNOT_ACTIVATE_DEVICE => ApplicationError::CannotActivateDevice,
            other => ApplicationError::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            ApplicationError::UnknownOrder => ERR_UNKNOWN_ORDER,
            ApplicationError::BadParameterFormat => ERR_BAD_PARAMETER_FORMAT,
            ApplicationError::BadParameterValue => ERR_BAD_PARAMETER_VALUE,
            ApplicationError::InvalidDeviceType => ERR_INVALID_DEVICE_TYPE,
            ApplicationError::InvalidDeviceNumber => ERR_INVALID_DEVICE_NUMBER,
            ApplicationError::IncorrectMode => ERR_INCORRECT_MODE,
            ApplicationError::Busy => ERR_BUSY,
            ApplicationError::Failed => ERR_FAILED,
            ApplicationError::FirmwareError => ERR_FIRMWARE_ERROR,
            ApplicationError::CannotActivateDevice => ERR_CANNOT_ACTIVATE_DEVICE,
            ApplicationError::Unknown(code) => code,
        }
    }
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ApplicationError::UnknownOrder => "unknown order",
            ApplicationError::BadParameterFormat => "bad parameter format",
            ApplicationError::BadParameterValue => "bad parameter value",
            ApplicationError::InvalidDeviceType => "invalid device type",
            ApplicationError::InvalidDeviceNumber => "invalid device number",
            ApplicationError::IncorrectMode => "incorrect mode",
            ApplicationError::Busy => "busy",
            ApplicationError::Failed => "failed",
            ApplicationError::FirmwareError => "firmware error",
            ApplicationError::CannotActivateDevice => "cannot activate device",
            ApplicationError::Unknown(code) => {
                return write!(f, "unrecognized reason 0x{code:02X}");
            }
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    Cleared,
    Persists,
    Unrecoverable,
    Unknown(u8),
}

impl Recovery {
    pub fn from_code(code: u8) -> Self {
        match code {
            RECOVERY_CLEARED => Recovery::Cleared,
            RECOVERY_PERSISTS => Recovery::Persists,
            RECOVERY_UNRECOVERABLE => Recovery::Unrecoverable,
            other => Recovery::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Recovery::Cleared => RECOVERY_CLEARED,
            Recovery::Persists => RECOVERY_PERSISTS,
            Recovery::Unrecoverable => RECOVERY_UNRECOVERABLE,
            Recovery::Unknown(code) => code,
        }
    }
}

impl fmt::Display for Recovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recovery::Cleared => f.write_str("one time event, cleared"),
            Recovery::Persists => f.write_str("persisting problem"),
            Recovery::Unrecoverable => f.write_str("unrecoverable"),
            Recovery::Unknown(code) => write!(f, "unrecognized recovery 0x{code:02X}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    Reset,
    EndStopHit,
    MovementError,
    TemperatureError,
    DeviceFault,
    ElectricalFault,
    FirmwareFault,
    UserRequested,
    HostTimeout,
    Other,
    Unknown(u8),
}

impl StopCause {
    pub fn from_code(code: u8) -> Self {
        match code {
            CAUSE_RESET => StopCause::Reset,
            CAUSE_END_STOP_HIT => StopCause::EndStopHit,
            CAUSE_MOVEMENT_ERROR => StopCause::MovementError,
            CAUSE_TEMPERATURE_ERROR => StopCause::TemperatureError,
            CAUSE_DEVICE_FAULT => StopCause::DeviceFault,
            CAUSE_ELECTRICAL_FAULT => StopCause::ElectricalFault,
            CAUSE_FIRMWARE_FAULT => StopCause::FirmwareFault,
            CAUSE_USER_REQUESTED => StopCause::UserRequested,
            CAUSE_HOST_TIMEOUT => StopCause::HostTimeout,
            CAUSE_OTHER_FAULT => StopCause::Other,
            other => StopCause::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            StopCause::Reset => CAUSE_RESET,
            StopCause::EndStopHit => CAUSE_END_STOP_HIT,
            StopCause::MovementError => CAUSE_MOVEMENT_ERROR,
            StopCause::TemperatureError => CAUSE_TEMPERATURE_ERROR,
            StopCause::DeviceFault => CAUSE_DEVICE_FAULT,
            StopCause::ElectricalFault => CAUSE_ELECTRICAL_FAULT,
            StopCause::FirmwareFault => CAUSE_FIRMWARE_FAULT,
            StopCause::UserRequested => CAUSE_USER_REQUESTED,
            StopCause::HostTimeout => CAUSE_HOST_TIMEOUT,
            StopCause::Other => CAUSE_OTHER_FAULT,
            StopCause::Unknown(code) => code,
        }
    }
}

impl fmt::Display for StopCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopCause::Reset => "reset",
            StopCause::EndStopHit => "end stop hit",
            StopCause::MovementError => "movement error",
            StopCause::TemperatureError => "temperature error",
            StopCause::DeviceFault => "device fault",
            StopCause::ElectricalFault => "electrical fault",
            StopCause::FirmwareFault => "firmware fault",
            StopCause::UserRequested => "user requested",
            StopCause::HostTimeout => "host timeout",
            StopCause::Other => "other cause",
            StopCause::Unknown(code) => return write!(f, "unrecognized cause 0x{code:02X}"),
        };
        f.write_str(text)
    }
}

/// Parameters of a stopped reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoppedReply {
    pub recovery: Recovery,
    pub cause: StopCause,
    pub reason: Option<String>,
}

impl StoppedReply {
    pub fn decode(parameters: &[u8]) -> Option<Self> {
        if parameters.len() < 2 {
            return None;
        }
        let reason = if parameters.len() > 2 {
            Some(String::from_utf8_lossy(&parameters[2..]).into_owned())
        } else {
            None
        };
        Some(Self {
            recovery: Recovery::from_code(parameters[0]),
            cause: StopCause::from_code(parameters[1]),
            reason,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut parameters = vec![self.recovery.code(), self.cause.code()];
        if let Some(reason) = &self.reason {
            parameters.extend_from_slice(reason.as_bytes());
        }
        parameters
    }
}

impl fmt::Display for StoppedReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) {}", self.recovery, self.cause)?;
        if let Some(reason) = &self.reason {
            write!(f, " {reason}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceType {
    Input,
    Output,
    PwmOutput,
    Stepper,
    Heater,
    TemperatureSensor,
    Buzzer,
    Unknown(u8),
}

impl DeviceType {
    pub const ALL: [DeviceType; 7] = [
        DeviceType::Input,
        DeviceType::Output,
        DeviceType::PwmOutput,
        DeviceType::Stepper,
        DeviceType::Heater,
        DeviceType::TemperatureSensor,
        DeviceType::Buzzer,
    ];

    pub fn from_code(code: u8) -> Self {
        match code {
            DEVICE_TYPE_INPUT => DeviceType::Input,
            DEVICE_TYPE_OUTPUT => DeviceType::Output,
            DEVICE_TYPE_PWM_OUTPUT => DeviceType::PwmOutput,
            DEVICE_TYPE_STEPPER => DeviceType::Stepper,
            DEVICE_TYPE_HEATER => DeviceType::Heater,
            DEVICE_TYPE_TEMPERATURE_SENSOR => DeviceType::TemperatureSensor,
            DEVICE_TYPE_BUZZER => DeviceType::Buzzer,
            other => DeviceType::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            DeviceType::Input => DEVICE_TYPE_INPUT,
            DeviceType::Output => DEVICE_TYPE_OUTPUT,
            DeviceType::PwmOutput => DEVICE_TYPE_PWM_OUTPUT,
            DeviceType::Stepper => DEVICE_TYPE_STEPPER,
            DeviceType::Heater => DEVICE_TYPE_HEATER,
            DeviceType::TemperatureSensor => DEVICE_TYPE_TEMPERATURE_SENSOR,
            DeviceType::Buzzer => DEVICE_TYPE_BUZZER,
            DeviceType::Unknown(code) => code,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DeviceType::Input => "switch inputs",
            DeviceType::Output => "switch outputs",
            DeviceType::PwmOutput => "PWM controlled outputs",
            DeviceType::Stepper => "stepper",
            DeviceType::Heater => "heater",
            DeviceType::TemperatureSensor => "temperature sensors",
            DeviceType::Buzzer => "buzzer",
            DeviceType::Unknown(code) => {
                return write!(f, "unrecognized device type 0x{code:02X}");
            }
        };
        f.write_str(text)
    }
}

/// Parameter of a request information order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoKind {
    FirmwareName,
    SerialNumber,
    BoardName,
    GivenName,
    ProtocolVersionMajor,
    ProtocolVersionMinor,
    SupportedExtensions,
    FirmwareType,
    FirmwareRevisionMajor,
    FirmwareRevisionMinor,
    HardwareType,
    HardwareRevision,
    MaxStepRate,
    HostTimeout,
    Unknown(u8),
}

impl InfoKind {
    pub const ALL: [InfoKind; 14] = [
        InfoKind::FirmwareName,
        InfoKind::SerialNumber,
        InfoKind::BoardName,
        InfoKind::GivenName,
        InfoKind::ProtocolVersionMajor,
        InfoKind::ProtocolVersionMinor,
        InfoKind::SupportedExtensions,
        InfoKind::FirmwareType,
        InfoKind::FirmwareRevisionMajor,
        InfoKind::FirmwareRevisionMinor,
        InfoKind::HardwareType,
        InfoKind::HardwareRevision,
        InfoKind::MaxStepRate,
        InfoKind::HostTimeout,
    ];

    pub fn from_code(code: u8) -> Self {
        Self::ALL
            .get(code as usize)
            .copied()
            .unwrap_or(InfoKind::Unknown(code))
    }

    pub fn code(self) -> u8 {
        match self {
            InfoKind::Unknown(code) => code,
            known => Self::ALL
                .iter()
                .position(|kind| *kind == known)
                .map_or(u8::MAX, |index| index as u8),
        }
    }

    /// Minimum parameter bytes of an OK reply carrying this information.
    pub fn min_reply_len(self) -> usize {
        match self {
            InfoKind::ProtocolVersionMajor
            | InfoKind::ProtocolVersionMinor
            | InfoKind::FirmwareType
            | InfoKind::FirmwareRevisionMajor
            | InfoKind::FirmwareRevisionMinor
            | InfoKind::HardwareType
            | InfoKind::MaxStepRate
            | InfoKind::HostTimeout => 1,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolExtension {
    StepperControl,
    QueuedCommand,
    BasicMove,
    EventReporting,
    Unknown(u8),
}

impl ProtocolExtension {
    pub fn from_code(code: u8) -> Self {
        match code {
            EXTENSION_STEPPER_CONTROL => ProtocolExtension::StepperControl,
            EXTENSION_QUEUED_COMMAND => ProtocolExtension::QueuedCommand,
            EXTENSION_BASIC_MOVE => ProtocolExtension::BasicMove,
            EXTENSION_EVENT_REPORTING => ProtocolExtension::EventReporting,
            other => ProtocolExtension::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            ProtocolExtension::StepperControl => EXTENSION_STEPPER_CONTROL,
            ProtocolExtension::QueuedCommand => EXTENSION_QUEUED_COMMAND,
            ProtocolExtension::BasicMove => EXTENSION_BASIC_MOVE,
            ProtocolExtension::EventReporting => EXTENSION_EVENT_REPORTING,
            ProtocolExtension::Unknown(code) => code,
        }
    }
}

impl fmt::Display for ProtocolExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolExtension::StepperControl => f.write_str("stepper control"),
            ProtocolExtension::QueuedCommand => f.write_str("queued commands"),
            ProtocolExtension::BasicMove => f.write_str("basic move"),
            ProtocolExtension::EventReporting => f.write_str("event reporting"),
            ProtocolExtension::Unknown(code) => write!(f, "unrecognized extension 0x{code:02X}"),
        }
    }
}

/// A validated reply with the framing stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u8,
    pub parameters: Vec<u8>,
}

impl Reply {
    pub fn new(code: ReplyCode, parameters: Vec<u8>) -> Self {
        Self {
            code: code.code(),
            parameters,
        }
    }

    /// `raw[0]` is the reply code, the rest are parameters.
    pub fn from_raw(raw: &[u8]) -> Option<Self> {
        let (&code, parameters) = raw.split_first()?;
        Some(Self {
            code,
            parameters: parameters.to_vec(),
        })
    }

    pub fn to_raw(&self) -> Vec<u8> {
        let mut raw = Vec::with_capacity(1 + self.parameters.len());
        raw.push(self.code);
        raw.extend_from_slice(&self.parameters);
        raw
    }

    pub fn reply_code(&self) -> ReplyCode {
        ReplyCode::from_code(self.code)
    }

    pub fn is_ok(&self) -> bool {
        self.code == RESPONSE_OK
    }

    pub fn check(&self, expected: ReplyCode, min_parameter_len: usize) -> Result<()> {
        if self.code != expected.code() {
            let actual = match self.reply_code() {
                ReplyCode::GenericApplicationError => match self.application_error() {
                    Some(reason) => format!("{} ({reason})", self.reply_code()),
                    None => self.reply_code().to_string(),
                },
                ReplyCode::Stopped => match self.stopped() {
                    Some(stopped) => format!("{} {stopped}", self.reply_code()),
                    None => self.reply_code().to_string(),
                },
                other => other.to_string(),
            };
            error!("Reply has wrong reply code ({actual})!");
            return Err(ProtocolError::UnexpectedReply {
                expected: expected.to_string(),
                actual,
            });
        }
        if self.parameters.len() < min_parameter_len {
            error!("Reply too short!");
            return Err(ProtocolError::ReplyTooShort {
                expected: min_parameter_len,
                actual: self.parameters.len(),
            });
        }
        Ok(())
    }

    pub fn application_error(&self) -> Option<ApplicationError> {
        if self.code != RESPONSE_GENERIC_APPLICATION_ERROR {
            return None;
        }
        self.parameters.first().map(|code| ApplicationError::from_code(*code))
    }

    pub fn stopped(&self) -> Option<StoppedReply> {
        if self.code != RESPONSE_STOPPED {
            return None;
        }
        StoppedReply::decode(&self.parameters)
    }

    /// All parameters as one big-endian integer. See [`integer_from`] for
    /// replies longer than eight bytes.
    pub fn integer(&self) -> u64 {
        integer_from(&self.parameters, 0, self.parameters.len()).0
    }

    pub fn text(&self) -> String {
        string_from(&self.parameters, 0, self.parameters.len()).0
    }
}

fn clamp_range(bytes: &[u8], start: usize, length: usize, what: &str) -> (usize, usize, bool) {
    let start = start.min(bytes.len());
    let available = bytes.len() - start;
    if length > available {
        error!("Invalid length for {what}: requested {length} bytes, {available} available!");
        (start, start + available, false)
    } else {
        (start, start + length, true)
    }
}

/// Big-endian unsigned integer from `length` bytes at `start`.
///
/// The range is clamped to the available bytes. Only the last eight bytes of
/// a longer range are kept. The flag is `false` when either happened.
pub fn integer_from(bytes: &[u8], start: usize, length: usize) -> (u64, bool) {
    let (start, end, mut complete) = clamp_range(bytes, start, length, "integer");
    let mut digits = &bytes[start..end];
    if digits.len() > 8 {
        warn!(
            "Integer of {} bytes does not fit 64 bits, keeping the low 8 bytes!",
            digits.len()
        );
        digits = &digits[digits.len() - 8..];
        complete = false;
    }
    let value = digits
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | *byte as u64);
    (value, complete)
}

/// UTF-8 text from `length` bytes at `start`, clamped like [`integer_from`].
pub fn string_from(bytes: &[u8], start: usize, length: usize) -> (String, bool) {
    let (start, end, complete) = clamp_range(bytes, start, length, "string");
    (String::from_utf8_lossy(&bytes[start..end]).into_owned(), complete)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_codes_round_trip() {
        for code in 0..=255u8 {
            assert_eq!(Order::from_code(code).code(), code);
        }
        assert_eq!(Order::from_code(0x12), Order::QueueCommandBlocks);
        assert_eq!(Order::from_code(0x7F), Order::Reset);
        assert_eq!(Order::from_code(0x42), Order::Unknown(0x42));
        assert_eq!(Order::from_code(0x42).to_string(), "unrecognized order 0x42");
    }

    #[test]
    fn order_shapes() {
        assert_eq!(Order::Resume.shape(), OrderShape::Byte);
        assert_eq!(Order::ConfigureAxisMovementRates.shape(), OrderShape::ByteU32);
        assert_eq!(Order::ClearCommandBlockQueue.shape(), OrderShape::OrderOnly);
        assert_eq!(Order::QueueCommandBlocks.shape(), OrderShape::Bytes);
        assert_eq!(Order::RequestDeviceCount.min_reply_len(), 1);

        assert!(OrderShape::OrderOnly.accepts(0));
        assert!(!OrderShape::OrderOnly.accepts(1));
        assert!(OrderShape::Byte.accepts(1));
        assert!(!OrderShape::ByteU32.accepts(4));
        assert!(OrderShape::ByteU32.accepts(5));
        assert!(OrderShape::Bytes.accepts(0));
    }

    #[test]
    fn application_error_reasons() {
        assert_eq!(ApplicationError::from_code(3), ApplicationError::BadParameterValue);
        assert_eq!(ApplicationError::from_code(3).to_string(), "bad parameter value");
        assert_eq!(ApplicationError::from_code(0xFF), ApplicationError::Unknown(0xFF));
        assert_eq!(
            ApplicationError::from_code(0xFF).to_string(),
            "unrecognized reason 0xFF"
        );

        let reply = Reply::from_raw(&[0x11, 0x03]).expect("reply");
        assert_eq!(reply.reply_code(), ReplyCode::GenericApplicationError);
        assert_eq!(reply.application_error(), Some(ApplicationError::BadParameterValue));
    }

    #[test]
    fn stopped_reply_with_reason() {
        let reply = Reply::from_raw(&[0x12, 0x02, 0x03, b'h', b'o', b't']).expect("reply");
        let stopped = reply.stopped().expect("stopped");
        assert_eq!(stopped.recovery, Recovery::Persists);
        assert_eq!(stopped.cause, StopCause::TemperatureError);
        assert_eq!(stopped.reason.as_deref(), Some("hot"));
        assert_eq!(stopped.to_string(), "(persisting problem) temperature error hot");
        assert_eq!(stopped.encode(), reply.parameters);

        let unknown = StoppedReply::decode(&[0x09, 0x44]).expect("stopped");
        assert_eq!(unknown.recovery, Recovery::Unknown(0x09));
        assert_eq!(unknown.cause, StopCause::Unknown(0x44));
        assert!(StoppedReply::decode(&[0x01]).is_none());
    }

    #[test]
    fn check_reply_code_and_length() {
        let ok = Reply::new(ReplyCode::Ok, vec![0x05]);
        assert!(ok.check(ReplyCode::Ok, 1).is_ok());
        assert!(matches!(
            ok.check(ReplyCode::Ok, 2),
            Err(ProtocolError::ReplyTooShort { expected: 2, actual: 1 })
        ));
        match ok.check(ReplyCode::Stopped, 0) {
            Err(ProtocolError::UnexpectedReply { expected, actual }) => {
                assert_eq!(expected, "stopped");
                assert_eq!(actual, "ok");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn integer_and_string_extraction_clamp() {
        let bytes = [0x00, 0x98, 0x58, b'a', b'b'];
        assert_eq!(integer_from(&bytes, 0, 3), (39000, true));
        assert_eq!(integer_from(&bytes, 3, 10), (0x6162, false));
        assert_eq!(integer_from(&bytes, 9, 1), (0, false));
        assert_eq!(string_from(&bytes, 3, 2), ("ab".to_string(), true));
        assert_eq!(string_from(&bytes, 4, 5), ("b".to_string(), false));
    }

    #[test]
    fn oversized_integer_keeps_low_bytes() {
        let bytes = [0xAA, 0, 0, 0, 0, 0, 0, 0x01, 0x02];
        assert_eq!(integer_from(&bytes, 0, 9), (0x0102, false));
        assert_eq!(integer_from(&bytes, 1, 8), (0x0102, true));

        let reply = Reply::new(ReplyCode::Ok, bytes.to_vec());
        assert_eq!(reply.integer(), 0x0102);
    }

    #[test]
    fn info_kind_codes() {
        assert_eq!(InfoKind::from_code(6), InfoKind::SupportedExtensions);
        assert_eq!(InfoKind::HostTimeout.code(), 13);
        assert_eq!(InfoKind::from_code(14), InfoKind::Unknown(14));
        assert_eq!(InfoKind::HardwareRevision.min_reply_len(), 0);
        assert_eq!(DeviceType::from_code(4), DeviceType::Stepper);
    }
}
