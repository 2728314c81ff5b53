//! Wire codec for order frames (host to client) and reply frames (client to host).
//!
//! ```text
//! [sync][length][control][code][parameters...][crc]
//! ```
//!
//! `length` counts control, code and parameters. The CRC covers every byte
//! between sync and crc.

use crate::client::protocol::catalog::{Order, Reply};
use crate::client::protocol::crc::crc8;
use crate::client::protocol::pacemaker_def::*;
use crate::error::FrameError;

/// Outcome of decoding one reply frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedFrame {
    Reply(Reply),
    /// Asynchronous debug or event frame; carries no sequence number.
    Debug(Reply),
}

/// An order frame as seen by the client side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFrame {
    pub control: u8,
    pub order: Order,
    pub parameters: Vec<u8>,
}

impl OrderFrame {
    pub fn sequence(&self) -> u8 {
        self.control & SEQUENCE_MASK
    }
}

fn write_frame(sync: u8, control: u8, code: u8, parameters: &[u8]) -> Result<Vec<u8>, FrameError> {
    if parameters.len() > MAX_PARAMETER_LEN {
        return Err(FrameError::ParametersTooLong {
            len: parameters.len(),
            max: MAX_PARAMETER_LEN,
        });
    }
    let mut frame = Vec::with_capacity(FRAME_OVERHEAD + parameters.len());
    frame.push(sync);
    frame.push((parameters.len() + 2) as u8);
    frame.push(control);
    frame.push(code);
    frame.extend_from_slice(parameters);
    let crc = crc8(&frame[POS_LENGTH..]);
    frame.push(crc);
    Ok(frame)
}

pub fn encode_order(order: Order, parameters: &[u8], sequence: u8) -> Result<Vec<u8>, FrameError> {
    write_frame(
        START_OF_HOST_FRAME,
        sequence & SEQUENCE_MASK,
        order.code(),
        parameters,
    )
}

pub fn encode_order_only(order: Order, sequence: u8) -> [u8; ORDER_ONLY_FRAME_LEN] {
    let mut frame = [
        START_OF_HOST_FRAME,
        2,
        sequence & SEQUENCE_MASK,
        order.code(),
        0,
    ];
    frame[4] = crc8(&frame[POS_LENGTH..4]);
    frame
}

pub fn encode_byte(order: Order, value: u8, sequence: u8) -> [u8; BYTE_FRAME_LEN] {
    let mut frame = [
        START_OF_HOST_FRAME,
        3,
        sequence & SEQUENCE_MASK,
        order.code(),
        value,
        0,
    ];
    frame[5] = crc8(&frame[POS_LENGTH..5]);
    frame
}

pub fn encode_byte_u32(
    order: Order,
    byte: u8,
    value: u32,
    sequence: u8,
) -> [u8; BYTE_U32_FRAME_LEN] {
    let [b0, b1, b2, b3] = value.to_be_bytes();
    let mut frame = [
        START_OF_HOST_FRAME,
        7,
        sequence & SEQUENCE_MASK,
        order.code(),
        byte,
        b0,
        b1,
        b2,
        b3,
        0,
    ];
    frame[9] = crc8(&frame[POS_LENGTH..9]);
    frame
}

/// Builds a reply frame. `control` is sent as is so debug frames can set
/// [`DEBUG_FLAG`].
pub fn encode_reply_frame(reply: &Reply, control: u8) -> Result<Vec<u8>, FrameError> {
    write_frame(START_OF_CLIENT_FRAME, control, reply.code, &reply.parameters)
}

fn validate(frame: &[u8], sync: u8) -> Result<(), FrameError> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(FrameError::TooShort {
            actual: frame.len(),
        });
    }
    if frame[POS_SYNC] != sync {
        return Err(FrameError::BadSync {
            actual: frame[POS_SYNC],
        });
    }
    let last = frame.len() - 1;
    let computed = crc8(&frame[POS_LENGTH..last]);
    if computed != frame[last] {
        return Err(FrameError::BadCrc {
            received: frame[last],
            computed,
        });
    }
    let length = frame[POS_LENGTH];
    if length < 2 || length as usize != frame.len() - 3 {
        return Err(FrameError::BadLength {
            length,
            frame_len: frame.len(),
        });
    }
    Ok(())
}

/// Validates a reply frame: size, sync, CRC, length, then sequence.
///
/// Debug frames are returned without a sequence check.
pub fn decode_reply_frame(frame: &[u8], expected_sequence: u8) -> Result<DecodedFrame, FrameError> {
    validate(frame, START_OF_CLIENT_FRAME)?;
    let control = frame[POS_CONTROL];
    let reply = Reply {
        code: frame[POS_CODE],
        parameters: frame[POS_PARAMETER0..frame.len() - 1].to_vec(),
    };
    if control & DEBUG_FLAG != 0 {
        return Ok(DecodedFrame::Debug(reply));
    }
    let actual = control & SEQUENCE_MASK;
    if actual != expected_sequence & SEQUENCE_MASK {
        return Err(FrameError::BadSequence {
            expected: expected_sequence & SEQUENCE_MASK,
            actual,
        });
    }
    Ok(DecodedFrame::Reply(reply))
}

pub fn decode_order_frame(frame: &[u8]) -> Result<OrderFrame, FrameError> {
    validate(frame, START_OF_HOST_FRAME)?;
    Ok(OrderFrame {
        control: frame[POS_CONTROL],
        order: Order::from_code(frame[POS_CODE]),
        parameters: frame[POS_PARAMETER0..frame.len() - 1].to_vec(),
    })
}

/// Splits a byte stream into complete frames starting with `sync`.
///
/// Bytes before a sync byte are dropped. A trailing partial frame is left in
/// `buffer` for the next call.
pub fn extract_frames(buffer: &mut Vec<u8>, sync: u8) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    loop {
        match buffer.iter().position(|byte| *byte == sync) {
            Some(0) => {}
            Some(start) => {
                buffer.drain(..start);
            }
            None => {
                buffer.clear();
                break;
            }
        }
        if buffer.len() <= POS_LENGTH {
            break;
        }
        let total = buffer[POS_LENGTH] as usize + 3;
        if total < MIN_FRAME_LEN {
            buffer.drain(..1);
            continue;
        }
        if buffer.len() < total {
            break;
        }
        frames.push(buffer.drain(..total).collect());
    }
    frames
}
