//! In-process model of a conforming Pacemaker client.
//!
//! Starts like firmware after a reset: in stopped mode until the host
//! acknowledges with RESUME(1).

use std::collections::{BTreeMap, VecDeque};

use log::{debug, warn};

use crate::client::protocol::catalog::{
    ApplicationError, DeviceType, InfoKind, Order, ProtocolExtension, Recovery, Reply, ReplyCode,
    StopCause, StoppedReply,
};
use crate::client::protocol::frame::{
    OrderFrame, decode_order_frame, encode_reply_frame, extract_frames,
};
use crate::client::protocol::motion_block::{MotionBlock, decode_blocks};
use crate::client::protocol::pacemaker_def::*;
use crate::error::FrameError;

/// Identity and limits reported by the simulated client.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub firmware_name: String,
    pub serial_number: String,
    pub board_name: String,
    pub given_name: String,
    pub protocol_version_major: u8,
    pub protocol_version_minor: u8,
    pub extensions: Vec<ProtocolExtension>,
    pub firmware_type: u8,
    pub firmware_revision_major: u8,
    pub firmware_revision_minor: u8,
    pub hardware_type: u8,
    pub hardware_revision: u8,
    /// Steps per second.
    pub max_step_rate: u32,
    /// Seconds.
    pub host_timeout: u8,
    pub device_counts: BTreeMap<DeviceType, u8>,
    pub can_deactivate_stepper_control: bool,
    pub queue_capacity: u16,
}

impl Default for SimConfig {
    fn default() -> Self {
        let device_counts = BTreeMap::from([
            (DeviceType::Input, 3),
            (DeviceType::Output, 2),
            (DeviceType::PwmOutput, 2),
            (DeviceType::Stepper, 3),
            (DeviceType::Heater, 1),
            (DeviceType::TemperatureSensor, 2),
            (DeviceType::Buzzer, 0),
        ]);
        Self {
            firmware_name: "Pacemaker Client Simulator".to_string(),
            serial_number: "SIM-0001".to_string(),
            board_name: "virtual board".to_string(),
            given_name: "sim".to_string(),
            protocol_version_major: 0,
            protocol_version_minor: 1,
            extensions: vec![
                ProtocolExtension::StepperControl,
                ProtocolExtension::QueuedCommand,
                ProtocolExtension::BasicMove,
            ],
            firmware_type: 0,
            firmware_revision_major: 0,
            firmware_revision_minor: 1,
            hardware_type: 0,
            hardware_revision: 1,
            max_step_rate: 100_000,
            host_timeout: 2,
            device_counts,
            can_deactivate_stepper_control: true,
            queue_capacity: 32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnderrunAvoidance {
    pub max_rate: u32,
    pub max_acceleration: u32,
}

#[derive(Debug)]
pub struct PacemakerClientSim {
    config: SimConfig,
    stopped: Option<StoppedReply>,
    stepper_control_active: bool,
    axis_rates: BTreeMap<u8, u32>,
    underrun_avoidance: BTreeMap<u8, UnderrunAvoidance>,
    settings: BTreeMap<String, Vec<u8>>,
    queue: Vec<MotionBlock>,
    pending_debug: VecDeque<String>,
    rx_pending: Vec<u8>,
    received: Vec<Order>,
}

impl PacemakerClientSim {
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    pub fn with_config(config: SimConfig) -> Self {
        Self {
            config,
            stopped: Some(Self::reset_stop()),
            stepper_control_active: false,
            axis_rates: BTreeMap::new(),
            underrun_avoidance: BTreeMap::new(),
            settings: BTreeMap::new(),
            queue: Vec::new(),
            pending_debug: VecDeque::new(),
            rx_pending: Vec::new(),
            received: Vec::new(),
        }
    }

    fn reset_stop() -> StoppedReply {
        StoppedReply {
            recovery: Recovery::Cleared,
            cause: StopCause::Reset,
            reason: None,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.is_some()
    }

    pub fn enter_stopped(&mut self, stopped: StoppedReply) {
        self.queue.clear();
        self.stopped = Some(stopped);
    }

    pub fn stepper_control_active(&self) -> bool {
        self.stepper_control_active
    }

    pub fn axis_rate(&self, axis: u8) -> Option<u32> {
        self.axis_rates.get(&axis).copied()
    }

    pub fn underrun_avoidance(&self, axis: u8) -> Option<UnderrunAvoidance> {
        self.underrun_avoidance.get(&axis).copied()
    }

    pub fn setting(&self, key: &str) -> Option<&[u8]> {
        self.settings.get(key).map(Vec::as_slice)
    }

    pub fn queued_blocks(&self) -> &[MotionBlock] {
        &self.queue
    }

    /// Orders seen so far, in arrival order.
    pub fn received_orders(&self) -> &[Order] {
        &self.received
    }

    /// Sent as a debug frame ahead of the next reply.
    pub fn queue_debug_message(&mut self, text: &str) {
        self.pending_debug.push_back(text.to_string());
    }

    pub fn reset(&mut self) {
        self.stopped = Some(Self::reset_stop());
        self.stepper_control_active = false;
        self.axis_rates.clear();
        self.underrun_avoidance.clear();
        self.settings.clear();
        self.queue.clear();
        self.pending_debug.clear();
    }

    fn device_count(&self, device_type: DeviceType) -> u8 {
        self.config
            .device_counts
            .get(&device_type)
            .copied()
            .unwrap_or(0)
    }

    /// Feeds raw bytes from the host; returns whatever the client sends back.
    ///
    /// Partial frames are kept until the rest arrives.
    pub fn handle_bytes(&mut self, bytes: &[u8]) -> Vec<u8> {
        self.rx_pending.extend_from_slice(bytes);
        let frames = extract_frames(&mut self.rx_pending, START_OF_HOST_FRAME);
        let mut out = Vec::new();
        for frame in frames {
            out.extend(self.handle_frame(&frame));
        }
        out
    }

    pub fn handle_frame(&mut self, frame: &[u8]) -> Vec<u8> {
        let control = frame.get(POS_CONTROL).copied().unwrap_or(0) & SEQUENCE_MASK;
        let reply = match decode_order_frame(frame) {
            Ok(order) => {
                self.received.push(order.order);
                self.apply_order(&order)
            }
            Err(FrameError::BadCrc { .. }) => {
                warn!("sim: order frame with bad CRC");
                Reply::new(ReplyCode::FrameReceiptError, vec![RECEIPT_BAD_ERROR_CHECK_CODE])
            }
            Err(err) => {
                warn!("sim: bad order frame: {err}");
                Reply::new(ReplyCode::FrameReceiptError, vec![RECEIPT_BAD_FRAME])
            }
        };

        let mut out = Vec::new();
        while let Some(text) = self.pending_debug.pop_front() {
            let message = Reply::new(ReplyCode::DebugMessage, text.into_bytes());
            match encode_reply_frame(&message, DEBUG_FLAG) {
                Ok(bytes) => out.extend(bytes),
                Err(err) => warn!("sim: dropping debug message: {err}"),
            }
        }
        match encode_reply_frame(&reply, control) {
            Ok(bytes) => out.extend(bytes),
            Err(err) => warn!("sim: reply does not fit a frame: {err}"),
        }
        out
    }

    fn apply_order(&mut self, frame: &OrderFrame) -> Reply {
        debug!("sim: {} {:02X?}", frame.order, frame.parameters);
        let parameters = frame.parameters.as_slice();
        if !frame.order.shape().accepts(parameters.len()) {
            return generic(ApplicationError::BadParameterFormat);
        }
        match frame.order {
            Order::Reset => {
                self.reset();
                return ok(Vec::new());
            }
            Order::Resume => return self.resume(parameters),
            _ => {}
        }
        if let Some(stopped) = &self.stopped {
            return Reply::new(ReplyCode::Stopped, stopped.encode());
        }

        match frame.order {
            Order::RequestInformation => self.request_information(parameters),
            Order::RequestDeviceCount => match parameters {
                [code] => match DeviceType::from_code(*code) {
                    DeviceType::Unknown(_) => generic(ApplicationError::InvalidDeviceType),
                    device_type => ok(vec![self.device_count(device_type)]),
                },
                _ => generic(ApplicationError::BadParameterFormat),
            },
            Order::ConfigureAxisMovementRates => self.configure_axis_rate(parameters),
            Order::ConfigureMovementUnderrunAvoidanceParameters => {
                self.configure_underrun_avoidance(parameters)
            }
            Order::ActivateStepperControl => self.activate_stepper_control(parameters),
            Order::WriteFirmwareConfiguration => self.write_setting(parameters),
            Order::ReadFirmwareConfiguration => {
                let key = String::from_utf8_lossy(parameters);
                match self.settings.get(key.as_ref()) {
                    Some(value) => ok(value.clone()),
                    None => generic(ApplicationError::BadParameterValue),
                }
            }
            Order::QueueCommandBlocks => self.queue_blocks(parameters),
            Order::ClearCommandBlockQueue => {
                self.queue.clear();
                ok(Vec::new())
            }
            _ => generic(ApplicationError::UnknownOrder),
        }
    }

    fn resume(&mut self, parameters: &[u8]) -> Reply {
        match parameters {
            [QUERY_STOPPED_STATE] => match &self.stopped {
                Some(stopped) => Reply::new(ReplyCode::Stopped, stopped.encode()),
                None => ok(Vec::new()),
            },
            [CLEAR_STOPPED_STATE] => {
                if let Some(stopped) = &self.stopped {
                    if stopped.recovery == Recovery::Unrecoverable {
                        return Reply::new(ReplyCode::Stopped, stopped.encode());
                    }
                }
                self.stopped = None;
                ok(Vec::new())
            }
            [_] => generic(ApplicationError::BadParameterValue),
            _ => generic(ApplicationError::BadParameterFormat),
        }
    }

    fn request_information(&self, parameters: &[u8]) -> Reply {
        let [kind] = parameters else {
            return generic(ApplicationError::BadParameterFormat);
        };
        let config = &self.config;
        let value = match InfoKind::from_code(*kind) {
            InfoKind::FirmwareName => config.firmware_name.as_bytes().to_vec(),
            InfoKind::SerialNumber => config.serial_number.as_bytes().to_vec(),
            InfoKind::BoardName => config.board_name.as_bytes().to_vec(),
            InfoKind::GivenName => config.given_name.as_bytes().to_vec(),
            InfoKind::ProtocolVersionMajor => vec![config.protocol_version_major],
            InfoKind::ProtocolVersionMinor => vec![config.protocol_version_minor],
            InfoKind::SupportedExtensions => {
                config.extensions.iter().map(|ext| ext.code()).collect()
            }
            InfoKind::FirmwareType => vec![config.firmware_type],
            InfoKind::FirmwareRevisionMajor => vec![config.firmware_revision_major],
            InfoKind::FirmwareRevisionMinor => vec![config.firmware_revision_minor],
            InfoKind::HardwareType => vec![config.hardware_type],
            InfoKind::HardwareRevision => vec![config.hardware_revision],
            InfoKind::MaxStepRate => config.max_step_rate.to_be_bytes().to_vec(),
            InfoKind::HostTimeout => vec![config.host_timeout],
            InfoKind::Unknown(_) => return generic(ApplicationError::BadParameterValue),
        };
        ok(value)
    }

    fn check_stepper(&self, axis: u8) -> Option<Reply> {
        if axis == 0 || axis > self.device_count(DeviceType::Stepper) {
            return Some(generic(ApplicationError::InvalidDeviceNumber));
        }
        None
    }

    fn rate_in_range(&self, rate: u32) -> bool {
        rate != 0 && rate <= self.config.max_step_rate
    }

    fn configure_axis_rate(&mut self, parameters: &[u8]) -> Reply {
        let [axis, r0, r1, r2, r3] = *parameters else {
            return generic(ApplicationError::BadParameterFormat);
        };
        if let Some(reply) = self.check_stepper(axis) {
            return reply;
        }
        let rate = u32::from_be_bytes([r0, r1, r2, r3]);
        if !self.rate_in_range(rate) {
            return generic(ApplicationError::BadParameterValue);
        }
        self.axis_rates.insert(axis, rate);
        ok(Vec::new())
    }

    fn configure_underrun_avoidance(&mut self, parameters: &[u8]) -> Reply {
        let [axis, r0, r1, r2, r3, a0, a1, a2, a3] = *parameters else {
            return generic(ApplicationError::BadParameterFormat);
        };
        if let Some(reply) = self.check_stepper(axis) {
            return reply;
        }
        let max_rate = u32::from_be_bytes([r0, r1, r2, r3]);
        let max_acceleration = u32::from_be_bytes([a0, a1, a2, a3]);
        if !self.rate_in_range(max_rate) || max_acceleration == 0 {
            return generic(ApplicationError::BadParameterValue);
        }
        self.underrun_avoidance.insert(
            axis,
            UnderrunAvoidance {
                max_rate,
                max_acceleration,
            },
        );
        ok(Vec::new())
    }

    fn activate_stepper_control(&mut self, parameters: &[u8]) -> Reply {
        match parameters {
            [0] => {
                if !self.config.can_deactivate_stepper_control {
                    return generic(ApplicationError::Failed);
                }
                self.stepper_control_active = false;
                self.queue.clear();
                ok(Vec::new())
            }
            [1] => {
                self.stepper_control_active = true;
                ok(Vec::new())
            }
            [_] => generic(ApplicationError::BadParameterValue),
            _ => generic(ApplicationError::BadParameterFormat),
        }
    }

    fn write_setting(&mut self, parameters: &[u8]) -> Reply {
        let Some((&key_len, rest)) = parameters.split_first() else {
            return generic(ApplicationError::BadParameterFormat);
        };
        let key_len = key_len as usize;
        if key_len == 0 || key_len > rest.len() {
            return generic(ApplicationError::BadParameterFormat);
        }
        let key = String::from_utf8_lossy(&rest[..key_len]).into_owned();
        self.settings.insert(key, rest[key_len..].to_vec());
        ok(Vec::new())
    }

    fn queue_blocks(&mut self, parameters: &[u8]) -> Reply {
        if !self.stepper_control_active {
            return generic(ApplicationError::IncorrectMode);
        }
        let blocks = decode_blocks(parameters);
        if blocks
            .iter()
            .any(|block| matches!(block, MotionBlock::Opaque { .. }))
        {
            return generic(ApplicationError::BadParameterFormat);
        }
        let capacity = self.config.queue_capacity as usize;
        if self.queue.len() + blocks.len() > capacity {
            return generic(ApplicationError::Busy);
        }
        self.queue.extend(blocks);
        let free = (capacity - self.queue.len()) as u16;
        ok(free.to_be_bytes().to_vec())
    }
}

impl Default for PacemakerClientSim {
    fn default() -> Self {
        Self::new()
    }
}

fn ok(parameters: Vec<u8>) -> Reply {
    Reply::new(ReplyCode::Ok, parameters)
}

fn generic(reason: ApplicationError) -> Reply {
    Reply::new(ReplyCode::GenericApplicationError, vec![reason.code()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::protocol::frame::{
        DecodedFrame, decode_reply_frame, encode_byte, encode_byte_u32, encode_order,
    };

    fn exchange(sim: &mut PacemakerClientSim, frame: &[u8], sequence: u8) -> Reply {
        let bytes = sim.handle_bytes(frame);
        match decode_reply_frame(&bytes, sequence) {
            Ok(DecodedFrame::Reply(reply)) => reply,
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    fn resumed() -> PacemakerClientSim {
        let mut sim = PacemakerClientSim::new();
        let reply = exchange(&mut sim, &encode_byte(Order::Resume, CLEAR_STOPPED_STATE, 0), 0);
        assert!(reply.is_ok());
        sim
    }

    #[test]
    fn starts_in_stopped_mode() {
        let mut sim = PacemakerClientSim::new();
        let reply = exchange(&mut sim, &encode_byte(Order::RequestInformation, 0, 3), 3);
        assert_eq!(reply.reply_code(), ReplyCode::Stopped);
        assert_eq!(reply.parameters, vec![RECOVERY_CLEARED, CAUSE_RESET]);

        let reply = exchange(&mut sim, &encode_byte(Order::Resume, QUERY_STOPPED_STATE, 4), 4);
        assert_eq!(reply.reply_code(), ReplyCode::Stopped);
        assert!(sim.is_stopped());

        let reply = exchange(&mut sim, &encode_byte(Order::Resume, CLEAR_STOPPED_STATE, 5), 5);
        assert!(reply.is_ok());
        assert!(!sim.is_stopped());
    }

    #[test]
    fn reports_information() {
        let mut sim = resumed();
        let name = exchange(&mut sim, &encode_byte(Order::RequestInformation, 0, 1), 1);
        assert_eq!(name.text(), "Pacemaker Client Simulator");
        let rate = exchange(&mut sim, &encode_byte(Order::RequestInformation, 12, 2), 2);
        assert_eq!(rate.integer(), 100_000);
        let bad = exchange(&mut sim, &encode_byte(Order::RequestInformation, 99, 3), 3);
        assert_eq!(bad.application_error(), Some(ApplicationError::BadParameterValue));
    }

    #[test]
    fn validates_axis_rates() {
        let mut sim = resumed();
        let zero = exchange(
            &mut sim,
            &encode_byte_u32(Order::ConfigureAxisMovementRates, 1, 0, 1),
            1,
        );
        assert_eq!(zero.reply_code(), ReplyCode::GenericApplicationError);
        let fine = exchange(
            &mut sim,
            &encode_byte_u32(Order::ConfigureAxisMovementRates, 1, 39000, 2),
            2,
        );
        assert!(fine.is_ok());
        assert_eq!(sim.axis_rate(1), Some(39000));
        let missing = exchange(
            &mut sim,
            &encode_byte_u32(Order::ConfigureAxisMovementRates, 9, 39000, 3),
            3,
        );
        assert_eq!(
            missing.application_error(),
            Some(ApplicationError::InvalidDeviceNumber)
        );
    }

    #[test]
    fn stores_firmware_settings() {
        let mut sim = resumed();
        let reply = exchange(
            &mut sim,
            &encode_order(Order::WriteFirmwareConfiguration, b"\x04name42", 1).expect("encode"),
            1,
        );
        assert!(reply.is_ok());
        assert_eq!(sim.setting("name"), Some(&b"42"[..]));

        let read = exchange(
            &mut sim,
            &encode_order(Order::ReadFirmwareConfiguration, b"name", 2).expect("encode"),
            2,
        );
        assert_eq!(read.text(), "42");
    }

    #[test]
    fn queues_blocks_only_with_stepper_control() {
        let mut sim = resumed();
        let area = [0x04, 0x02, 0x01, 0xF4];
        let refused = exchange(
            &mut sim,
            &encode_order(Order::QueueCommandBlocks, &area, 1).expect("encode"),
            1,
        );
        assert_eq!(refused.application_error(), Some(ApplicationError::IncorrectMode));

        exchange(&mut sim, &encode_byte(Order::ActivateStepperControl, 1, 2), 2);
        let accepted = exchange(
            &mut sim,
            &encode_order(Order::QueueCommandBlocks, &area, 3).expect("encode"),
            3,
        );
        assert!(accepted.is_ok());
        assert_eq!(accepted.integer(), 31);
        assert_eq!(sim.queued_blocks(), &[MotionBlock::Delay { ticks: 500 }]);
    }

    #[test]
    fn parameters_must_fit_the_order() {
        let mut sim = PacemakerClientSim::new();
        let reply = exchange(
            &mut sim,
            &encode_order(Order::Resume, &[], 0).expect("encode"),
            0,
        );
        assert_eq!(
            reply.application_error(),
            Some(ApplicationError::BadParameterFormat)
        );
        assert!(sim.is_stopped());

        let mut sim = resumed();
        let reply = exchange(
            &mut sim,
            &encode_order(Order::ConfigureAxisMovementRates, &[1, 0, 0, 0x98], 1)
                .expect("encode"),
            1,
        );
        assert_eq!(
            reply.application_error(),
            Some(ApplicationError::BadParameterFormat)
        );
        assert_eq!(sim.axis_rate(1), None);
    }

    #[test]
    fn bad_crc_gets_receipt_error() {
        let mut sim = resumed();
        let mut frame = encode_byte(Order::RequestDeviceCount, 4, 1);
        frame[5] ^= 0xFF;
        let reply = exchange(&mut sim, &frame, 1);
        assert_eq!(reply.reply_code(), ReplyCode::FrameReceiptError);
        assert_eq!(reply.parameters, vec![RECEIPT_BAD_ERROR_CHECK_CODE]);
    }

    #[test]
    fn unknown_order_is_reported() {
        let mut sim = resumed();
        let reply = exchange(
            &mut sim,
            &encode_order(Order::Unknown(0x42), &[], 1).expect("encode"),
            1,
        );
        assert_eq!(reply.application_error(), Some(ApplicationError::UnknownOrder));
    }

    #[test]
    fn debug_messages_precede_the_reply() {
        let mut sim = resumed();
        sim.queue_debug_message("hello");
        let mut bytes = sim.handle_bytes(&encode_byte(Order::RequestDeviceCount, 4, 1));
        let frames = extract_frames(&mut bytes, START_OF_CLIENT_FRAME);
        assert_eq!(frames.len(), 2);
        match decode_reply_frame(&frames[0], 1) {
            Ok(DecodedFrame::Debug(message)) => assert_eq!(message.text(), "hello"),
            other => panic!("unexpected frame: {other:?}"),
        }
        match decode_reply_frame(&frames[1], 1) {
            Ok(DecodedFrame::Reply(reply)) => assert_eq!(reply.parameters, vec![3]),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn split_writes_are_reassembled() {
        let mut sim = resumed();
        let frame = encode_byte(Order::RequestDeviceCount, 4, 1);
        assert!(sim.handle_bytes(&frame[..3]).is_empty());
        let bytes = sim.handle_bytes(&frame[3..]);
        assert!(!bytes.is_empty());
    }
}
