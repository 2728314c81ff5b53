//! Error types for the pacemaker host engine.

use thiserror::Error;

/// Reasons a response frame is rejected by the codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Nothing arrived before the first-byte timeout.
    #[error("no reply received")]
    NoReply,

    #[error("frame too short: {actual} bytes")]
    TooShort { actual: usize },

    #[error("frame did not start with the sync byte (got 0x{actual:02X})")]
    BadSync { actual: u8 },

    #[error("invalid CRC: frame carries 0x{received:02X}, computed 0x{computed:02X}")]
    BadCrc { received: u8, computed: u8 },

    #[error("invalid length byte {length} for a frame of {frame_len} bytes")]
    BadLength { length: u8, frame_len: usize },

    #[error("invalid sequence number {actual}, expected {expected}")]
    BadSequence { expected: u8, actual: u8 },

    /// Debug frames kept arriving until the reply deadline passed.
    #[error("only debug frames received within {deadline_ms} ms")]
    DebugFlood { deadline_ms: u64 },

    #[error("{len} parameter bytes do not fit into one frame (max {max})")]
    ParametersTooLong { len: usize, max: usize },
}

/// Main error type for protocol operations.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Transport failure. Fatal to the session.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame rejected: {0}")]
    Frame(#[from] FrameError),

    #[error("reply has wrong reply code ({actual}), expected {expected}")]
    UnexpectedReply { expected: String, actual: String },

    #[error("reply too short: {actual} parameter bytes, expected at least {expected}")]
    ReplyTooShort { expected: usize, actual: usize },

    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("invalid connection descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("firmware configuration: {0}")]
    FirmwareConfiguration(String),

    #[error("motion block cannot be encoded: {0}")]
    InvalidMotionBlock(String),
}

/// Result type alias using ProtocolError.
pub type Result<T> = std::result::Result<T, ProtocolError>;
