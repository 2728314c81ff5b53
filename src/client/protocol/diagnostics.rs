//! Human-readable rendering of frames for logs.

use crate::client::protocol::catalog::{
    ApplicationError, FrameReceiptError, Order, ReplyCode, StoppedReply,
};
use crate::client::protocol::motion_block::decode_blocks;
use crate::client::protocol::pacemaker_def::*;

pub fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn parameter_area(frame: &[u8]) -> &[u8] {
    if frame.len() <= POS_PARAMETER0 {
        return &[];
    }
    let declared = (frame[POS_LENGTH] as usize).saturating_sub(2);
    let end = (POS_PARAMETER0 + declared).min(frame.len());
    &frame[POS_PARAMETER0..end]
}

/// Renders a request or response frame; tolerates truncated input.
pub fn describe_frame(frame: &[u8]) -> String {
    let Some(&sync) = frame.first() else {
        return "no data".to_string();
    };
    let mut out = String::new();
    match sync {
        START_OF_HOST_FRAME => {
            out.push_str("Order:");
            let Some(&code) = frame.get(POS_CODE) else {
                return out;
            };
            let order = Order::from_code(code);
            out.push_str(&order.to_string());
            let parameters = parameter_area(frame);
            if parameters.is_empty() {
                return out;
            }
            if order == Order::QueueCommandBlocks {
                for block in decode_blocks(parameters) {
                    out.push_str(&block.to_string());
                }
            } else {
                out.push(' ');
                out.push_str(&hex_string(parameters));
            }
        }
        START_OF_CLIENT_FRAME => {
            out.push_str("Response:");
            let Some(&code) = frame.get(POS_CODE) else {
                return out;
            };
            out.push_str(&ReplyCode::from_code(code).to_string());
            let parameters = parameter_area(frame);
            if !parameters.is_empty() {
                out.push(' ');
                out.push_str(&describe_reply_parameters(code, parameters));
            }
        }
        _ => {
            out.push_str("unrecognized frame: ");
            out.push_str(&hex_string(frame));
        }
    }
    out
}

pub fn describe_reply_parameters(code: u8, parameters: &[u8]) -> String {
    let Some(&first) = parameters.first() else {
        return String::new();
    };
    match ReplyCode::from_code(code) {
        ReplyCode::FrameReceiptError => format!("({})", FrameReceiptError::from_code(first)),
        ReplyCode::GenericApplicationError => format!("({})", ApplicationError::from_code(first)),
        ReplyCode::Stopped => match StoppedReply::decode(parameters) {
            Some(stopped) => stopped.to_string(),
            None => hex_string(parameters),
        },
        ReplyCode::DebugMessage => String::from_utf8_lossy(parameters).into_owned(),
        _ => hex_string(parameters),
    }
}
