//! Scripted checks that walk a freshly reset client through the order set and
//! collect what it reports about itself.

pub mod client_information;
pub mod firmware_config;

use std::fmt;

use log::{debug, error, info, warn};
use thiserror::Error;

pub use client_information::ClientInformation;
pub use firmware_config::{
    FirmwareSetting, load_firmware_configuration, parse_firmware_configuration,
};

use crate::client::protocol::catalog::{
    ApplicationError, DeviceType, InfoKind, Order, ProtocolExtension, Recovery, Reply, ReplyCode,
    StopCause,
};
use crate::client::protocol::command_queue::CommandBlockQueue;
use crate::client::protocol::diagnostics::hex_string;
use crate::client::protocol::motion_block::{AxisMove, BasicLinearMove, MotionBlock};
use crate::client::protocol::pacemaker_def::*;
use crate::client::protocol::port_handler::PortHandler;
use crate::client::protocol::protocol_packet_handler::ProtocolPacketHandler;
use crate::error::{ProtocolError, Result};

const TOO_FAST_STEP_RATE: u32 = 17_000_000;
const TOO_FAST_UNDERRUN_RATE: u32 = 170_000_000;
const VALID_STEP_RATE: u32 = 39_000;
const VALID_ACCELERATION: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Prepare,
    StoppedMode,
    FirmwareConfiguration,
    RequestInformation,
    DeviceCount,
    AxisMovementRates,
    UnderrunAvoidance,
    ActivateStepperControl,
    QueueCommandBlocks,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Step::Prepare => "prepare",
            Step::StoppedMode => "stopped mode",
            Step::FirmwareConfiguration => "applying firmware configuration",
            Step::RequestInformation => "request information",
            Step::DeviceCount => "device count",
            Step::AxisMovementRates => "configure axis movement rates",
            Step::UnderrunAvoidance => "configure movement underrun avoidance parameters",
            Step::ActivateStepperControl => "activate stepper control",
            Step::QueueCommandBlocks => "queue command blocks",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Error)]
pub enum ConformanceError {
    #[error("received a frame before the first order: {}", hex_string(.frame))]
    UnexpectedFrame { frame: Vec<u8> },

    #[error("test '{step}' failed: {source}")]
    StepFailed {
        step: Step,
        #[source]
        source: ProtocolError,
    },
}

impl ConformanceError {
    /// The step that failed, if the run got past preparing.
    pub fn step(&self) -> Step {
        match self {
            ConformanceError::UnexpectedFrame { .. } => Step::Prepare,
            ConformanceError::StepFailed { step, .. } => *step,
        }
    }
}

/// One pass over the conformance steps. Stops at the first failing step.
pub struct ConformanceRun<'a, P: PortHandler> {
    handler: &'a mut ProtocolPacketHandler<P>,
    settings: Vec<FirmwareSetting>,
    info: ClientInformation,
}

impl<'a, P: PortHandler> ConformanceRun<'a, P> {
    pub fn new(handler: &'a mut ProtocolPacketHandler<P>, connection: &str) -> Self {
        Self {
            handler,
            settings: Vec::new(),
            info: ClientInformation::new(connection),
        }
    }

    /// Settings written to the client right after it left stopped mode.
    pub fn with_firmware_settings(mut self, settings: Vec<FirmwareSetting>) -> Self {
        self.settings = settings;
        self
    }

    pub fn run(mut self) -> std::result::Result<ClientInformation, ConformanceError> {
        self.prepare()?;
        self.step(Step::StoppedMode, Self::stopped_mode)?;
        self.step(Step::FirmwareConfiguration, Self::firmware_configuration)?;
        self.step(Step::RequestInformation, Self::request_information)?;
        self.step(Step::DeviceCount, Self::device_count)?;
        self.step(Step::AxisMovementRates, Self::axis_movement_rates)?;
        self.step(Step::UnderrunAvoidance, Self::underrun_avoidance)?;
        self.step(Step::ActivateStepperControl, Self::activate_stepper_control)?;
        self.step(Step::QueueCommandBlocks, Self::queue_command_blocks)?;
        info!("All conformance tests passed");
        Ok(self.info)
    }

    fn step(
        &mut self,
        step: Step,
        test: impl FnOnce(&mut Self) -> Result<()>,
    ) -> std::result::Result<(), ConformanceError> {
        debug!("Starting test: {step}");
        test(self).map_err(|source| {
            error!("Test '{step}' failed: {source}");
            ConformanceError::StepFailed { step, source }
        })
    }

    fn prepare(&mut self) -> std::result::Result<(), ConformanceError> {
        debug!("Starting test: {}", Step::Prepare);
        match self.handler.poll_pending_frame() {
            Ok(None) => Ok(()),
            Ok(Some(frame)) => {
                error!("Did receive something unexpectedly!");
                Err(ConformanceError::UnexpectedFrame { frame })
            }
            Err(source) => Err(ConformanceError::StepFailed {
                step: Step::Prepare,
                source,
            }),
        }
    }

    fn accept_reset_stop(&mut self, reply: &Reply) -> Result<()> {
        reply.check(ReplyCode::Stopped, 2)?;
        let recovery = Recovery::from_code(reply.parameters[0]);
        let cause = StopCause::from_code(reply.parameters[1]);
        if recovery != Recovery::Cleared || cause != StopCause::Reset {
            error!("Reply has wrong recovery option ({recovery}) or stop cause ({cause})!");
            return Err(ProtocolError::UnexpectedReply {
                expected: format!(
                    "{} ({}) {}",
                    ReplyCode::Stopped,
                    Recovery::Cleared,
                    StopCause::Reset
                ),
                actual: format!("{} ({recovery}) {cause}", ReplyCode::Stopped),
            });
        }
        self.handler.increment_sequence_counter();
        Ok(())
    }

    fn stopped_mode(&mut self) -> Result<()> {
        // a client fresh out of reset refuses everything but resume
        let reply = self.handler.tx_rx_byte(Order::RequestInformation, 0)?;
        self.accept_reset_stop(&reply)?;

        let reply = self.handler.tx_rx_byte(Order::Resume, QUERY_STOPPED_STATE)?;
        self.accept_reset_stop(&reply)?;

        let reply = self.handler.tx_rx_byte(Order::Resume, CLEAR_STOPPED_STATE)?;
        self.handler.accept_ok(Order::Resume, &reply)
    }

    fn firmware_configuration(&mut self) -> Result<()> {
        firmware_config::apply(self.handler, &self.settings)
    }

    fn request_information(&mut self) -> Result<()> {
        for kind in InfoKind::ALL {
            let reply = self.handler.tx_rx_byte(Order::RequestInformation, kind.code())?;
            self.handler
                .accept(&reply, ReplyCode::Ok, kind.min_reply_len())?;
            self.info.record(kind, &reply);
        }
        Ok(())
    }

    fn device_count(&mut self) -> Result<()> {
        for device_type in DeviceType::ALL {
            let order = Order::RequestDeviceCount;
            let reply = self.handler.tx_rx_byte(order, device_type.code())?;
            self.handler.accept_ok(order, &reply)?;
            self.info.set_device_count(device_type, reply.integer());
        }
        Ok(())
    }

    fn steppers(&self) -> u8 {
        self.info
            .device_count(DeviceType::Stepper)
            .min(u8::MAX as u64) as u8
    }

    fn accept_bad_value(&mut self, reply: &Reply) -> Result<()> {
        reply.check(ReplyCode::GenericApplicationError, 1)?;
        match reply.application_error() {
            Some(ApplicationError::BadParameterValue) => {
                self.handler.increment_sequence_counter();
                Ok(())
            }
            other => {
                let actual = other.map_or_else(String::new, |reason| reason.to_string());
                error!("Reply has wrong error reason ({actual})!");
                Err(ProtocolError::UnexpectedReply {
                    expected: format!(
                        "{} ({})",
                        ReplyCode::GenericApplicationError,
                        ApplicationError::BadParameterValue
                    ),
                    actual: format!("{} ({actual})", ReplyCode::GenericApplicationError),
                })
            }
        }
    }

    fn axis_movement_rates(&mut self) -> Result<()> {
        for stepper in 1..=self.steppers() {
            let order = Order::ConfigureAxisMovementRates;
            // zero is not a rate
            let reply = self.handler.tx_rx_byte_u32(order, stepper, 0)?;
            self.handler
                .accept(&reply, ReplyCode::GenericApplicationError, 1)?;
            let reply = self
                .handler
                .tx_rx_byte_u32(order, stepper, TOO_FAST_STEP_RATE)?;
            self.handler
                .accept(&reply, ReplyCode::GenericApplicationError, 1)?;
            let reply = self.handler.tx_rx_byte_u32(order, stepper, VALID_STEP_RATE)?;
            self.handler.accept_ok(order, &reply)?;
        }
        Ok(())
    }

    fn underrun_parameters(stepper: u8, max_rate: u32, max_acceleration: u32) -> Vec<u8> {
        let mut parameters = Vec::with_capacity(9);
        parameters.push(stepper);
        parameters.extend_from_slice(&max_rate.to_be_bytes());
        parameters.extend_from_slice(&max_acceleration.to_be_bytes());
        parameters
    }

    fn underrun_avoidance(&mut self) -> Result<()> {
        let order = Order::ConfigureMovementUnderrunAvoidanceParameters;
        for stepper in 1..=self.steppers() {
            let reply = self
                .handler
                .tx_rx(order, &Self::underrun_parameters(stepper, 0, 0))?;
            self.accept_bad_value(&reply)?;

            let reply = self.handler.tx_rx(
                order,
                &Self::underrun_parameters(stepper, TOO_FAST_UNDERRUN_RATE, 0),
            )?;
            self.accept_bad_value(&reply)?;

            let reply = self.handler.tx_rx(
                order,
                &Self::underrun_parameters(stepper, VALID_STEP_RATE, VALID_ACCELERATION),
            )?;
            self.handler.accept_ok(order, &reply)?;
        }
        Ok(())
    }

    fn activate_stepper_control(&mut self) -> Result<()> {
        let order = Order::ActivateStepperControl;
        let reply = self.handler.tx_rx_byte(order, 0)?;
        if reply.is_ok() {
            self.handler.accept_ok(order, &reply)?;
            self.info.can_deactivate_stepper_control = Some(true);
        } else {
            self.handler
                .accept(&reply, ReplyCode::GenericApplicationError, 1)?;
            warn!("Client can not deactivate the stepper control");
            self.info.can_deactivate_stepper_control = Some(false);
        }
        let reply = self.handler.tx_rx_byte(order, 1)?;
        self.handler.accept_ok(order, &reply)
    }

    fn queue_command_blocks(&mut self) -> Result<()> {
        if !self.info.supports(ProtocolExtension::QueuedCommand)
            || !self.info.supports(ProtocolExtension::BasicMove)
            || self.steppers() == 0
        {
            debug!("Client has no basic move queue, skipping");
            return Ok(());
        }
        let mut queue = CommandBlockQueue::new();
        queue.add_block(MotionBlock::BasicLinearMove(BasicLinearMove {
            primary_axis: 0,
            homing: false,
            nominal_speed: 100,
            end_speed: 0,
            acceleration_steps: 10,
            deceleration_steps: 10,
            axes: vec![AxisMove {
                axis: 0,
                steps: 40,
                increasing: true,
            }],
        }))?;
        queue.add_block(MotionBlock::Delay { ticks: 100 })?;
        let reply = queue.tx_rx(self.handler)?;
        self.handler.accept_ok(Order::QueueCommandBlocks, &reply)?;

        let order = Order::ClearCommandBlockQueue;
        let reply = self.handler.tx_rx_order_only(order)?;
        self.handler.accept_ok(order, &reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::protocol::catalog::StoppedReply;
    use crate::client::protocol::port_handler::SimPort;
    use crate::client::sim::{PacemakerClientSim, SimConfig};

    fn handler_for(config: SimConfig) -> ProtocolPacketHandler<SimPort> {
        ProtocolPacketHandler::new(SimPort::new(PacemakerClientSim::with_config(config)))
    }

    #[test]
    fn simulator_passes() {
        let mut handler = ProtocolPacketHandler::new(SimPort::default());
        let info = ConformanceRun::new(&mut handler, "sim")
            .with_firmware_settings(vec![FirmwareSetting::new("steps", "80")])
            .run()
            .expect("conformance run");

        assert_eq!(info.firmware_name, "Pacemaker Client Simulator");
        assert_eq!(info.serial_number, "SIM-0001");
        assert_eq!(info.protocol_version, (0, 1));
        assert_eq!(info.max_step_rate, Some(100_000));
        assert_eq!(info.device_count(DeviceType::Stepper), 3);
        assert_eq!(info.device_count(DeviceType::Buzzer), 0);
        assert_eq!(info.can_deactivate_stepper_control, Some(true));

        let sim = handler.port().sim();
        assert_eq!(sim.setting("steps"), Some(&b"80"[..]));
        for stepper in 1..=3 {
            assert_eq!(sim.axis_rate(stepper), Some(VALID_STEP_RATE));
            assert_eq!(
                sim.underrun_avoidance(stepper).map(|u| u.max_acceleration),
                Some(VALID_ACCELERATION)
            );
        }
        assert!(sim.stepper_control_active());
        assert!(sim.received_orders().contains(&Order::QueueCommandBlocks));
        assert!(sim.queued_blocks().is_empty());
        // every exchange of a passing run was accepted
        assert_eq!(
            handler.sequence() as usize,
            handler.port().sim().received_orders().len() % 16
        );
    }

    #[test]
    fn refused_deactivation_still_passes() {
        let mut handler = handler_for(SimConfig {
            can_deactivate_stepper_control: false,
            ..SimConfig::default()
        });
        let info = ConformanceRun::new(&mut handler, "sim").run().expect("run");
        assert_eq!(info.can_deactivate_stepper_control, Some(false));
        assert!(info.to_string().ends_with("can not deactivate the stepper control."));
    }

    #[test]
    fn queue_step_needs_the_extensions() {
        let mut handler = handler_for(SimConfig {
            extensions: vec![ProtocolExtension::StepperControl],
            ..SimConfig::default()
        });
        ConformanceRun::new(&mut handler, "sim").run().expect("run");
        let orders = handler.port().sim().received_orders();
        assert!(!orders.contains(&Order::QueueCommandBlocks));
        assert_eq!(orders.last(), Some(&Order::ActivateStepperControl));
    }

    #[test]
    fn pending_frame_fails_prepare() {
        let mut handler = ProtocolPacketHandler::new(SimPort::default());
        handler.port_mut().inject(&[0x42, 0x02, 0x00, 0x10, 0xFE]);
        let err = ConformanceRun::new(&mut handler, "sim").run().unwrap_err();
        assert!(matches!(err, ConformanceError::UnexpectedFrame { .. }));
        assert_eq!(err.step(), Step::Prepare);
        assert!(handler.port().sim().received_orders().is_empty());
    }

    #[test]
    fn resumed_client_fails_stopped_mode() {
        let mut handler = ProtocolPacketHandler::new(SimPort::default());
        let reply = handler
            .tx_rx_byte(Order::Resume, CLEAR_STOPPED_STATE)
            .expect("resume");
        handler.accept_ok(Order::Resume, &reply).expect("accept");
        let err = ConformanceRun::new(&mut handler, "sim").run().unwrap_err();
        assert_eq!(err.step(), Step::StoppedMode);
        assert_eq!(handler.sequence(), 1);
    }

    #[test]
    fn wrong_stop_cause_fails_stopped_mode() {
        let mut sim = PacemakerClientSim::new();
        sim.enter_stopped(StoppedReply {
            recovery: Recovery::Cleared,
            cause: StopCause::HostTimeout,
            reason: None,
        });
        let mut handler = ProtocolPacketHandler::new(SimPort::new(sim));
        let err = ConformanceRun::new(&mut handler, "sim").run().unwrap_err();
        assert!(matches!(
            err,
            ConformanceError::StepFailed {
                step: Step::StoppedMode,
                source: ProtocolError::UnexpectedReply { .. }
            }
        ));
        assert_eq!(handler.sequence(), 0);
    }

    #[test]
    fn refused_setting_fails_configuration() {
        let mut handler = ProtocolPacketHandler::new(SimPort::default());
        let err = ConformanceRun::new(&mut handler, "sim")
            .with_firmware_settings(vec![FirmwareSetting::new("", "orphan")])
            .run()
            .unwrap_err();
        assert_eq!(err.step(), Step::FirmwareConfiguration);
    }

    #[test]
    fn permissive_rates_fail_axis_check() {
        let mut handler = handler_for(SimConfig {
            max_step_rate: 20_000_000,
            ..SimConfig::default()
        });
        let err = ConformanceRun::new(&mut handler, "sim").run().unwrap_err();
        assert_eq!(err.step(), Step::AxisMovementRates);
        assert_eq!(handler.port().sim().axis_rate(1), Some(TOO_FAST_STEP_RATE));
    }
}
