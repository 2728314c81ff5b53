use std::time::{Duration, Instant};

use log::{debug, error, trace};

use crate::client::protocol::catalog::{Order, Reply, ReplyCode};
use crate::client::protocol::diagnostics::{describe_frame, hex_string};
use crate::client::protocol::frame::{
    DecodedFrame, decode_reply_frame, encode_byte, encode_byte_u32, encode_order,
    encode_order_only,
};
use crate::client::protocol::pacemaker_def::*;
use crate::client::protocol::port_handler::PortHandler;
use crate::client::protocol::sequence::SequenceCounter;
use crate::error::{FrameError, ProtocolError, Result};

/// Receive timing of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerConfig {
    /// Wait for the sync byte of a reply.
    pub first_byte_timeout_ms: u64,
    /// Wait for each following byte.
    pub byte_timeout_ms: u64,
    /// Upper bound on skipping debug frames while waiting for a reply.
    pub debug_deadline_ms: u64,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            first_byte_timeout_ms: DEFAULT_FIRST_BYTE_TIMEOUT_MS,
            byte_timeout_ms: DEFAULT_BYTE_TIMEOUT_MS,
            debug_deadline_ms: DEFAULT_DEBUG_DEADLINE_MS,
        }
    }
}

/// Request/reply engine for one connection.
///
/// Owns the port, the sequence counter and the receive buffer. At most one
/// order is outstanding at a time.
#[derive(Debug)]
pub struct ProtocolPacketHandler<P: PortHandler> {
    port: P,
    sequence: SequenceCounter,
    rx_buffer: [u8; RX_BUFFER_LEN],
    config: HandlerConfig,
}

impl<P: PortHandler> ProtocolPacketHandler<P> {
    pub fn new(port: P) -> Self {
        Self::with_config(port, HandlerConfig::default())
    }

    pub fn with_config(port: P, config: HandlerConfig) -> Self {
        Self {
            port,
            sequence: SequenceCounter::new(),
            rx_buffer: [0; RX_BUFFER_LEN],
            config,
        }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn into_port(self) -> P {
        self.port
    }

    pub fn config(&self) -> HandlerConfig {
        self.config
    }

    /// Sequence number used by the next order.
    pub fn sequence(&self) -> u8 {
        self.sequence.current()
    }

    pub fn increment_sequence_counter(&mut self) {
        self.sequence.advance();
    }

    pub fn tx_packet(&mut self, frame: &[u8]) -> Result<()> {
        trace!("Sending: {} ({})", hex_string(frame), describe_frame(frame));
        let written = self.port.write_port(frame)?;
        if written != frame.len() {
            error!("Could not send the complete frame ({written} of {} bytes)!", frame.len());
            return Err(ProtocolError::ShortWrite {
                written,
                expected: frame.len(),
            });
        }
        Ok(())
    }

    pub fn send_order(&mut self, order: Order, parameters: &[u8]) -> Result<()> {
        let frame = encode_order(order, parameters, self.sequence.current())?;
        self.tx_packet(&frame)
    }

    pub fn send_order_only(&mut self, order: Order) -> Result<()> {
        let frame = encode_order_only(order, self.sequence.current());
        self.tx_packet(&frame)
    }

    pub fn send_byte(&mut self, order: Order, value: u8) -> Result<()> {
        let frame = encode_byte(order, value, self.sequence.current());
        self.tx_packet(&frame)
    }

    pub fn send_byte_u32(&mut self, order: Order, byte: u8, value: u32) -> Result<()> {
        let frame = encode_byte_u32(order, byte, value, self.sequence.current());
        self.tx_packet(&frame)
    }

    /// Assembles one candidate reply frame from the port.
    ///
    /// A timeout after the sync byte returns the bytes received so far; the
    /// decoder rejects them.
    pub fn rx_packet(&mut self) -> Result<Vec<u8>> {
        let Some(sync) = self
            .port
            .read_byte_timeout(self.config.first_byte_timeout_ms)?
        else {
            return Err(FrameError::NoReply.into());
        };
        if sync != START_OF_CLIENT_FRAME {
            error!("Received 0x{sync:02X} instead of the sync byte!");
            return Err(FrameError::BadSync { actual: sync }.into());
        }
        self.rx_buffer[POS_SYNC] = sync;
        let mut position = 1;
        while position < RX_BUFFER_LEN {
            if position > POS_CONTROL && position == self.rx_buffer[POS_LENGTH] as usize + 3 {
                break;
            }
            match self.port.read_byte_timeout(self.config.byte_timeout_ms)? {
                Some(byte) => {
                    self.rx_buffer[position] = byte;
                    position += 1;
                }
                None => {
                    error!(
                        "Timeout after {position} bytes: {}",
                        hex_string(&self.rx_buffer[..position])
                    );
                    break;
                }
            }
        }
        let frame = self.rx_buffer[..position].to_vec();
        trace!("Received: {} ({})", hex_string(&frame), describe_frame(&frame));
        Ok(frame)
    }

    /// Receives the reply to the outstanding order, skipping debug frames.
    pub fn get_frame(&mut self) -> Result<Reply> {
        let deadline = Duration::from_millis(self.config.debug_deadline_ms);
        let start = Instant::now();
        loop {
            let frame = match self.rx_packet() {
                Ok(frame) => frame,
                Err(err) => {
                    error!("No valid reply: {err}");
                    return Err(err);
                }
            };
            match decode_reply_frame(&frame, self.sequence.current()) {
                Ok(DecodedFrame::Reply(reply)) => return Ok(reply),
                Ok(DecodedFrame::Debug(message)) => {
                    debug!("{}", describe_frame(&frame));
                    trace!("Skipped debug frame with code 0x{:02X}", message.code);
                }
                Err(err) => {
                    error!("Rejected frame {}: {err}", hex_string(&frame));
                    return Err(err.into());
                }
            }
            if start.elapsed() >= deadline {
                error!("Only debug frames received, giving up!");
                return Err(FrameError::DebugFlood {
                    deadline_ms: self.config.debug_deadline_ms,
                }
                .into());
            }
        }
    }

    /// Sends one order and waits for its reply. The sequence counter stays
    /// put until the caller accepts the reply.
    pub fn tx_rx(&mut self, order: Order, parameters: &[u8]) -> Result<Reply> {
        self.send_order(order, parameters)?;
        self.get_frame()
    }

    pub fn tx_rx_order_only(&mut self, order: Order) -> Result<Reply> {
        self.send_order_only(order)?;
        self.get_frame()
    }

    pub fn tx_rx_byte(&mut self, order: Order, value: u8) -> Result<Reply> {
        self.send_byte(order, value)?;
        self.get_frame()
    }

    pub fn tx_rx_byte_u32(&mut self, order: Order, byte: u8, value: u32) -> Result<Reply> {
        self.send_byte_u32(order, byte, value)?;
        self.get_frame()
    }

    /// Checks the reply to the outstanding order and completes the exchange.
    /// A rejected reply leaves the sequence counter unchanged.
    pub fn accept(
        &mut self,
        reply: &Reply,
        expected: ReplyCode,
        min_parameter_len: usize,
    ) -> Result<()> {
        reply.check(expected, min_parameter_len)?;
        self.increment_sequence_counter();
        Ok(())
    }

    /// Completes the exchange with an OK reply long enough for `order`.
    pub fn accept_ok(&mut self, order: Order, reply: &Reply) -> Result<()> {
        self.accept(reply, ReplyCode::Ok, order.min_reply_len())
    }

    /// Returns a frame the client sent without being asked, if any.
    pub fn poll_pending_frame(&mut self) -> Result<Option<Vec<u8>>> {
        match self.rx_packet() {
            Ok(frame) => Ok(Some(frame)),
            Err(ProtocolError::Frame(FrameError::NoReply)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn close(&mut self) -> Result<()> {
        self.port.close()?;
        Ok(())
    }
}
