use std::collections::VecDeque;
use std::io;

use crate::client::protocol::catalog::{Order, Reply, ReplyCode};
use crate::client::protocol::command_queue::CommandBlockQueue;
use crate::client::protocol::frame::{decode_order_frame, encode_reply_frame};
use crate::client::protocol::motion_block::{AxisMove, BasicLinearMove, MotionBlock};
use crate::client::protocol::pacemaker_def::*;
use crate::client::protocol::port_handler::{PortHandler, SimPort};
use crate::client::protocol::protocol_packet_handler::{HandlerConfig, ProtocolPacketHandler};
use crate::client::sim::PacemakerClientSim;
use crate::error::{FrameError, ProtocolError};

fn fast_config() -> HandlerConfig {
    HandlerConfig {
        first_byte_timeout_ms: 5,
        byte_timeout_ms: 2,
        debug_deadline_ms: 200,
    }
}

fn resumed_handler() -> ProtocolPacketHandler<SimPort> {
    let mut handler = ProtocolPacketHandler::new(SimPort::default());
    let reply = handler
        .tx_rx_byte(Order::Resume, CLEAR_STOPPED_STATE)
        .expect("resume");
    handler.accept_ok(Order::Resume, &reply).expect("resumed");
    handler
}

/// Records written frames and answers from a script.
#[derive(Debug, Default)]
struct LoopbackPort {
    written: Vec<Vec<u8>>,
    rx: VecDeque<u8>,
}

impl PortHandler for LoopbackPort {
    fn clear_port(&mut self) -> io::Result<()> {
        self.rx.clear();
        Ok(())
    }

    fn read_port(&mut self, length: usize) -> io::Result<Vec<u8>> {
        let take = length.min(self.rx.len());
        Ok(self.rx.drain(..take).collect())
    }

    fn write_port(&mut self, packet: &[u8]) -> io::Result<usize> {
        self.written.push(packet.to_vec());
        Ok(packet.len())
    }

    fn get_bytes_available(&self) -> io::Result<usize> {
        Ok(self.rx.len())
    }
}

#[test]
fn stopped_mode_then_resume() {
    let mut handler = ProtocolPacketHandler::new(SimPort::default());

    let reply = handler
        .tx_rx_byte(Order::RequestInformation, 0)
        .expect("exchange");
    assert_eq!(handler.sequence(), 0);
    handler
        .accept(&reply, ReplyCode::Stopped, 2)
        .expect("stopped");
    assert_eq!(handler.sequence(), 1);

    let reply = handler
        .tx_rx_byte(Order::Resume, QUERY_STOPPED_STATE)
        .expect("exchange");
    handler
        .accept(&reply, ReplyCode::Stopped, 2)
        .expect("still stopped");

    let reply = handler
        .tx_rx_byte(Order::Resume, CLEAR_STOPPED_STATE)
        .expect("exchange");
    handler.accept_ok(Order::Resume, &reply).expect("resumed");
    assert_eq!(handler.sequence(), 3);
    assert!(!handler.port().sim().is_stopped());
}

#[test]
fn refused_reply_keeps_the_sequence() {
    let mut handler = ProtocolPacketHandler::new(SimPort::default());
    let reply = handler
        .tx_rx_byte(Order::RequestInformation, 0)
        .expect("exchange");
    assert_eq!(reply.reply_code(), ReplyCode::Stopped);
    assert!(matches!(
        handler.accept(&reply, ReplyCode::Ok, 0),
        Err(ProtocolError::UnexpectedReply { .. })
    ));
    assert_eq!(handler.sequence(), 0);

    // an OK that is too short is refused as well
    let reply = handler
        .tx_rx_byte(Order::Resume, CLEAR_STOPPED_STATE)
        .expect("exchange");
    assert!(matches!(
        handler.accept(&reply, ReplyCode::Ok, 1),
        Err(ProtocolError::ReplyTooShort { .. })
    ));
    assert_eq!(handler.sequence(), 0);

    let reply = handler
        .tx_rx_byte(Order::RequestDeviceCount, DEVICE_TYPE_STEPPER)
        .expect("exchange");
    handler
        .accept_ok(Order::RequestDeviceCount, &reply)
        .expect("device count");
    assert_eq!(handler.sequence(), 1);
}

#[test]
fn sequence_follows_every_exchange() {
    let mut handler = resumed_handler();
    for expected in 1..40u32 {
        assert_eq!(handler.sequence() as u32, expected % 16);
        let reply = handler
            .tx_rx_byte(Order::RequestDeviceCount, DEVICE_TYPE_STEPPER)
            .expect("exchange");
        handler
            .accept_ok(Order::RequestDeviceCount, &reply)
            .expect("device count");
        assert_eq!(reply.integer(), 3);
    }
}

#[test]
fn debug_frames_are_skipped() {
    let mut handler = resumed_handler();
    handler.port_mut().sim_mut().queue_debug_message("warming up");
    handler.port_mut().sim_mut().queue_debug_message("still warming up");

    let reply = handler
        .tx_rx_byte(Order::RequestInformation, 0)
        .expect("exchange");
    assert_eq!(reply.text(), "Pacemaker Client Simulator");
}

#[test]
fn wrong_sequence_is_rejected_without_advancing() {
    let mut handler = ProtocolPacketHandler::with_config(SimPort::default(), fast_config());
    let stale = encode_reply_frame(&Reply::new(ReplyCode::Ok, Vec::new()), 7).expect("encode");

    handler.send_order_only(Order::RetrieveEvents).expect("send");
    handler.port_mut().clear_port().expect("clear");
    handler.port_mut().inject(&stale);
    let result = handler.get_frame();
    assert!(matches!(
        result,
        Err(ProtocolError::Frame(FrameError::BadSequence {
            expected: 0,
            actual: 7
        }))
    ));
    assert_eq!(handler.sequence(), 0);
}

#[test]
fn corrupted_reply_is_rejected() {
    let mut handler = ProtocolPacketHandler::with_config(SimPort::default(), fast_config());
    handler.port_mut().inject(&[0x42, 0x02, 0x00, 0x10, 0x00]);
    assert!(matches!(
        handler.get_frame(),
        Err(ProtocolError::Frame(FrameError::BadCrc { .. }))
    ));

    handler.port_mut().inject(&[0x17, 0x02, 0x00, 0x10, 0xFE]);
    assert!(matches!(
        handler.get_frame(),
        Err(ProtocolError::Frame(FrameError::BadSync { actual: 0x17 }))
    ));
}

#[test]
fn endless_debug_output_gives_up() {
    let config = HandlerConfig {
        debug_deadline_ms: 0,
        ..fast_config()
    };
    let mut handler = ProtocolPacketHandler::with_config(SimPort::default(), config);
    let chatter = Reply::new(ReplyCode::DebugMessage, b"tick".to_vec());
    let frame = encode_reply_frame(&chatter, DEBUG_FLAG).expect("encode");
    for _ in 0..3 {
        handler.port_mut().inject(&frame);
    }
    assert!(matches!(
        handler.get_frame(),
        Err(ProtocolError::Frame(FrameError::DebugFlood { deadline_ms: 0 }))
    ));
}

#[test]
fn truncated_reply_times_out() {
    let mut handler = ProtocolPacketHandler::with_config(SimPort::default(), fast_config());
    handler.port_mut().inject(&[0x42, 0x05, 0x00, 0x10]);
    assert!(matches!(
        handler.get_frame(),
        Err(ProtocolError::Frame(FrameError::TooShort { actual: 4 }))
    ));

    assert!(matches!(
        handler.get_frame(),
        Err(ProtocolError::Frame(FrameError::NoReply))
    ));
    assert_eq!(handler.poll_pending_frame().expect("poll"), None);
}

#[test]
fn orders_survive_a_loopback() {
    let mut handler = ProtocolPacketHandler::with_config(LoopbackPort::default(), fast_config());
    handler
        .send_byte_u32(Order::ConfigureAxisMovementRates, 2, 39000)
        .expect("send");
    handler.increment_sequence_counter();
    handler
        .send_order(Order::WriteFirmwareConfiguration, b"\x03keyvalue")
        .expect("send");

    let port = handler.into_port();
    assert_eq!(port.written.len(), 2);

    let rates = decode_order_frame(&port.written[0]).expect("decode");
    assert_eq!(rates.order, Order::ConfigureAxisMovementRates);
    assert_eq!(rates.sequence(), 0);
    assert_eq!(rates.parameters, vec![0x02, 0x00, 0x00, 0x98, 0x58]);

    let setting = decode_order_frame(&port.written[1]).expect("decode");
    assert_eq!(setting.order, Order::WriteFirmwareConfiguration);
    assert_eq!(setting.sequence(), 1);
    assert_eq!(setting.parameters, b"\x03keyvalue".to_vec());
}

#[test]
fn default_read_byte_timeout_polls_the_port() {
    let mut port = LoopbackPort::default();
    assert_eq!(port.read_byte_timeout(3).expect("read"), None);
    port.rx.push_back(0x42);
    assert_eq!(port.read_byte_timeout(3).expect("read"), Some(0x42));
}

#[test]
fn queued_blocks_reach_the_client() {
    let mut handler = resumed_handler();
    let reply = handler
        .tx_rx_byte(Order::ActivateStepperControl, 1)
        .expect("exchange");
    handler
        .accept_ok(Order::ActivateStepperControl, &reply)
        .expect("activate");

    let mut queue = CommandBlockQueue::new();
    let linear = MotionBlock::BasicLinearMove(BasicLinearMove {
        primary_axis: 0,
        homing: false,
        nominal_speed: 100,
        end_speed: 0,
        acceleration_steps: 20,
        deceleration_steps: 20,
        axes: vec![AxisMove {
            axis: 0,
            steps: 400,
            increasing: true,
        }],
    });
    assert!(queue.add_block(linear.clone()).expect("encode"));
    assert!(queue.add_block(MotionBlock::Delay { ticks: 100 }).expect("encode"));

    let reply = queue.tx_rx(&mut handler).expect("exchange");
    handler.accept(&reply, ReplyCode::Ok, 2).expect("queued");
    assert!(!queue.is_available());
    assert_eq!(
        handler.port().sim().queued_blocks(),
        &[linear, MotionBlock::Delay { ticks: 100 }]
    );

    let reply = handler
        .tx_rx_order_only(Order::ClearCommandBlockQueue)
        .expect("exchange");
    handler
        .accept_ok(Order::ClearCommandBlockQueue, &reply)
        .expect("cleared");
    assert_eq!(handler.sequence(), 4);
    assert!(handler.port().sim().queued_blocks().is_empty());
}

#[test]
fn closed_port_fails_the_exchange() {
    let mut handler = ProtocolPacketHandler::new(SimPort::new(PacemakerClientSim::new()));
    handler.close().expect("close");
    assert!(matches!(
        handler.tx_rx_byte(Order::Resume, 0),
        Err(ProtocolError::Io(_))
    ));
}

#[cfg(unix)]
mod virtual_uart {
    use std::fs::OpenOptions;
    use std::io::{Read, Write};
    use std::os::unix::fs::OpenOptionsExt;
    use std::time::{Duration, Instant};

    use crate::client::protocol::port_handler::PortHandler;
    use crate::client::protocol::virtual_uart::VirtualUartPort;

    fn read_until_len<P: PortHandler>(port: &mut P, len: usize) -> Vec<u8> {
        let start = Instant::now();
        let mut out = Vec::new();
        while out.len() < len && start.elapsed() < Duration::from_secs(1) {
            let mut chunk = port.read_port(len - out.len()).expect("read master");
            if chunk.is_empty() {
                std::thread::sleep(Duration::from_millis(5));
                continue;
            }
            out.append(&mut chunk);
        }
        out
    }

    #[test]
    fn virtual_uart_transfers_frames() {
        let mut port = VirtualUartPort::new().expect("create virtual uart");
        let slave_path = port.slave_path().to_string();

        let mut slave = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_NOCTTY)
            .open(&slave_path)
            .expect("open slave");

        // 0x0D and 0x0A must pass untouched in raw mode
        let frame = [0x23, 0x03, 0x00, 0x0D, 0x0A, 0x11];
        slave.write_all(&frame).expect("write to slave");
        assert_eq!(read_until_len(&mut port, frame.len()), frame.to_vec());

        assert_eq!(port.write_port(&[0x42, 0x02]).expect("write master"), 2);
        let mut buf = [0u8; 2];
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(1) {
            match slave.read(&mut buf) {
                Ok(0) => std::thread::sleep(Duration::from_millis(5)),
                Ok(n) => {
                    assert_eq!(&buf[..n], &[0x42, 0x02][..n]);
                    return;
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(5));
                }
                Err(err) => panic!("read slave: {err}"),
            }
        }
        panic!("timed out reading from slave");
    }
}
