//! Blocks carried in the parameter area of a queue command blocks order.
//!
//! Each block starts with `[block length][block type]`; the length includes
//! those two header bytes.

use std::fmt;

use crate::client::protocol::catalog::Order;
use crate::client::protocol::diagnostics::hex_string;
use crate::client::protocol::pacemaker_def::*;
use crate::error::{ProtocolError, Result};

const WIDTH_FLAG: u8 = 0x80;
const PRIMARY_AXIS_MASK: u8 = 0x0F;
const HOMING_FLAG: u8 = 0x10;
/// A two byte mask carries 15 usable bits.
const MAX_AXIS: u8 = 14;
const MAX_ONE_BYTE_AXIS: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldWidth {
    One,
    Two,
}

impl FieldWidth {
    fn from_flag(lead: u8) -> Self {
        if lead & WIDTH_FLAG != 0 {
            FieldWidth::Two
        } else {
            FieldWidth::One
        }
    }
}

struct BlockReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BlockReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    fn byte(&mut self) -> Option<u8> {
        let value = *self.data.get(self.position)?;
        self.position += 1;
        Some(value)
    }

    fn field(&mut self, width: FieldWidth) -> Option<u16> {
        match width {
            FieldWidth::One => self.byte().map(u16::from),
            FieldWidth::Two => {
                let high = self.byte()?;
                let low = self.byte()?;
                Some(u16::from_be_bytes([high, low]))
            }
        }
    }

    /// Reads a mask whose lead byte donates bit 7 as a flag.
    fn mask(&mut self, width: FieldWidth) -> Option<(u16, bool)> {
        let lead = self.byte()?;
        let flag = lead & WIDTH_FLAG != 0;
        let high = u16::from(lead & !WIDTH_FLAG);
        let value = match width {
            FieldWidth::One => high,
            FieldWidth::Two => (high << 8) | u16::from(self.byte()?),
        };
        Some((value, flag))
    }

    fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }
}

fn push_field(out: &mut Vec<u8>, value: u16, width: FieldWidth) {
    match width {
        FieldWidth::One => out.push(value as u8),
        FieldWidth::Two => out.extend_from_slice(&value.to_be_bytes()),
    }
}

fn push_mask(out: &mut Vec<u8>, value: u16, flag: bool, width: FieldWidth) {
    let flag = if flag { WIDTH_FLAG } else { 0 };
    match width {
        FieldWidth::One => out.push(flag | (value as u8 & !WIDTH_FLAG)),
        FieldWidth::Two => {
            let [high, low] = value.to_be_bytes();
            out.push(flag | (high & !WIDTH_FLAG));
            out.push(low);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisMove {
    pub axis: u8,
    pub steps: u16,
    pub increasing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicLinearMove {
    pub primary_axis: u8,
    pub homing: bool,
    pub nominal_speed: u8,
    pub end_speed: u8,
    pub acceleration_steps: u16,
    pub deceleration_steps: u16,
    /// Ordered by axis number.
    pub axes: Vec<AxisMove>,
}

impl BasicLinearMove {
    /// Decodes the block body (header already stripped).
    pub fn decode(body: &[u8]) -> Option<Self> {
        let mut reader = BlockReader::new(body);
        let mask_width = FieldWidth::from_flag(*body.first()?);
        let (selection, _) = reader.mask(mask_width)?;
        let (direction, two_byte_steps) = reader.mask(mask_width)?;
        let step_width = if two_byte_steps {
            FieldWidth::Two
        } else {
            FieldWidth::One
        };

        let axis_byte = reader.byte()?;
        let nominal_speed = reader.byte()?;
        let end_speed = reader.byte()?;
        let acceleration_steps = reader.field(step_width)?;
        let deceleration_steps = reader.field(step_width)?;

        let mut axes = Vec::new();
        for axis in 0..=MAX_AXIS {
            let bit = 1u16 << axis;
            if selection & bit == 0 {
                continue;
            }
            axes.push(AxisMove {
                axis,
                steps: reader.field(step_width)?,
                increasing: direction & bit != 0,
            });
        }
        if !reader.is_empty() {
            return None;
        }

        Some(Self {
            primary_axis: axis_byte & PRIMARY_AXIS_MASK,
            homing: axis_byte & HOMING_FLAG != 0,
            nominal_speed,
            end_speed,
            acceleration_steps,
            deceleration_steps,
            axes,
        })
    }

    /// Encodes the block body with the narrowest widths that fit.
    pub fn encode_body(&self) -> Result<Vec<u8>> {
        if self.primary_axis > PRIMARY_AXIS_MASK {
            return Err(ProtocolError::InvalidMotionBlock(format!(
                "primary axis {} out of range",
                self.primary_axis
            )));
        }
        let mut selection = 0u16;
        let mut direction = 0u16;
        for movement in &self.axes {
            if movement.axis > MAX_AXIS {
                return Err(ProtocolError::InvalidMotionBlock(format!(
                    "axis {} out of range",
                    movement.axis
                )));
            }
            let bit = 1u16 << movement.axis;
            if selection & bit != 0 {
                return Err(ProtocolError::InvalidMotionBlock(format!(
                    "axis {} listed twice",
                    movement.axis
                )));
            }
            selection |= bit;
            if movement.increasing {
                direction |= bit;
            }
        }

        let mask_width = if self.axes.iter().any(|m| m.axis > MAX_ONE_BYTE_AXIS) {
            FieldWidth::Two
        } else {
            FieldWidth::One
        };
        let largest = self
            .axes
            .iter()
            .map(|m| m.steps)
            .chain([self.acceleration_steps, self.deceleration_steps])
            .max()
            .unwrap_or(0);
        let step_width = if largest > u16::from(u8::MAX) {
            FieldWidth::Two
        } else {
            FieldWidth::One
        };

        let mut body = Vec::new();
        push_mask(&mut body, selection, mask_width == FieldWidth::Two, mask_width);
        push_mask(&mut body, direction, step_width == FieldWidth::Two, mask_width);
        let homing = if self.homing { HOMING_FLAG } else { 0 };
        body.push(self.primary_axis | homing);
        body.push(self.nominal_speed);
        body.push(self.end_speed);
        push_field(&mut body, self.acceleration_steps, step_width);
        push_field(&mut body, self.deceleration_steps, step_width);
        for movement in self.axes_in_order() {
            push_field(&mut body, movement.steps, step_width);
        }
        Ok(body)
    }

    fn axes_in_order(&self) -> Vec<AxisMove> {
        let mut axes = self.axes.clone();
        axes.sort_by_key(|m| m.axis);
        axes
    }

    fn direction_mask(&self) -> u16 {
        self.axes
            .iter()
            .filter(|m| m.increasing && m.axis <= MAX_AXIS)
            .fold(0, |mask, m| mask | (1u16 << m.axis))
    }
}

impl fmt::Display for BasicLinearMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[axisDirections={} primaryAxis={}",
            self.direction_mask(),
            self.primary_axis
        )?;
        if self.homing {
            f.write_str(" homing")?;
        }
        write!(
            f,
            " nominalSpeed={} endSpeed={} accelSteps={} decelSteps={}",
            self.nominal_speed, self.end_speed, self.acceleration_steps, self.deceleration_steps
        )?;
        for movement in &self.axes {
            let direction = if movement.increasing {
                "increasing"
            } else {
                "decreasing"
            };
            write!(
                f,
                "({} steps on axis {} direction {direction})",
                movement.steps, movement.axis
            )?;
        }
        f.write_str("]")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MotionBlock {
    CommandWrapper { order: Order, parameters: Vec<u8> },
    /// Pause in ticks of 10 µs.
    Delay { ticks: u16 },
    BasicLinearMove(BasicLinearMove),
    SetActiveToolhead { toolhead: u8 },
    /// Unknown type or a body that does not parse; kept verbatim.
    Opaque { block_type: Option<u8>, raw: Vec<u8> },
}

impl MotionBlock {
    /// Decodes one block including its two header bytes.
    pub fn decode(block: &[u8]) -> Self {
        let opaque = || MotionBlock::Opaque {
            block_type: block.get(1).copied(),
            raw: block.to_vec(),
        };
        if block.len() < BLOCK_HEADER_LEN {
            return opaque();
        }
        let body = &block[BLOCK_HEADER_LEN..];
        match block[1] {
            MOVEMENT_BLOCK_TYPE_COMMAND_WRAPPER => match body.split_first() {
                Some((order, parameters)) => MotionBlock::CommandWrapper {
                    order: Order::from_code(*order),
                    parameters: parameters.to_vec(),
                },
                None => opaque(),
            },
            MOVEMENT_BLOCK_TYPE_DELAY => match body {
                [high, low] => MotionBlock::Delay {
                    ticks: u16::from_be_bytes([*high, *low]),
                },
                _ => opaque(),
            },
            MOVEMENT_BLOCK_TYPE_BASIC_LINEAR_MOVE => match BasicLinearMove::decode(body) {
                Some(linear) => MotionBlock::BasicLinearMove(linear),
                None => opaque(),
            },
            MOVEMENT_BLOCK_TYPE_SET_ACTIVE_TOOLHEAD => match body {
                [toolhead] => MotionBlock::SetActiveToolhead {
                    toolhead: *toolhead,
                },
                _ => opaque(),
            },
            _ => opaque(),
        }
    }

    pub fn block_type(&self) -> Option<u8> {
        match self {
            MotionBlock::CommandWrapper { .. } => Some(MOVEMENT_BLOCK_TYPE_COMMAND_WRAPPER),
            MotionBlock::Delay { .. } => Some(MOVEMENT_BLOCK_TYPE_DELAY),
            MotionBlock::BasicLinearMove(_) => Some(MOVEMENT_BLOCK_TYPE_BASIC_LINEAR_MOVE),
            MotionBlock::SetActiveToolhead { .. } => Some(MOVEMENT_BLOCK_TYPE_SET_ACTIVE_TOOLHEAD),
            MotionBlock::Opaque { block_type, .. } => *block_type,
        }
    }

    /// Encodes the block including its header.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let body = match self {
            MotionBlock::CommandWrapper { order, parameters } => {
                let mut body = Vec::with_capacity(1 + parameters.len());
                body.push(order.code());
                body.extend_from_slice(parameters);
                body
            }
            MotionBlock::Delay { ticks } => ticks.to_be_bytes().to_vec(),
            MotionBlock::BasicLinearMove(linear) => linear.encode_body()?,
            MotionBlock::SetActiveToolhead { toolhead } => vec![*toolhead],
            MotionBlock::Opaque { raw, .. } => return Ok(raw.clone()),
        };
        let total = BLOCK_HEADER_LEN + body.len();
        if total > u8::MAX as usize {
            return Err(ProtocolError::InvalidMotionBlock(format!(
                "block of {total} bytes exceeds the length byte"
            )));
        }
        let mut block = Vec::with_capacity(total);
        block.push(total as u8);
        // Opaque blocks returned early, so the type is always known here.
        block.push(self.block_type().unwrap_or_default());
        block.extend_from_slice(&body);
        Ok(block)
    }
}

impl fmt::Display for MotionBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionBlock::CommandWrapper { order, parameters } => {
                write!(f, "[order:{order}")?;
                if !parameters.is_empty() {
                    write!(f, " {}", hex_string(parameters))?;
                }
                f.write_str("]")
            }
            MotionBlock::Delay { ticks } => {
                write!(f, "[delay {}us]", u32::from(*ticks) * DELAY_TICK_MICROSECONDS)
            }
            MotionBlock::BasicLinearMove(linear) => write!(f, "{linear}"),
            MotionBlock::SetActiveToolhead { toolhead } => write!(f, "[use toolhead {toolhead}]"),
            MotionBlock::Opaque { raw, .. } => write!(f, "[{}]", hex_string(raw)),
        }
    }
}

/// Splits a parameter area into blocks.
///
/// A declared length below the header size or beyond the remaining bytes
/// turns the rest of the area into a single opaque block.
pub fn decode_blocks(area: &[u8]) -> Vec<MotionBlock> {
    let mut blocks = Vec::new();
    let mut offset = 0;
    while offset < area.len() {
        let rest = &area[offset..];
        let length = rest[0] as usize;
        if length < BLOCK_HEADER_LEN || length > rest.len() {
            blocks.push(MotionBlock::Opaque {
                block_type: rest.get(1).copied(),
                raw: rest.to_vec(),
            });
            break;
        }
        blocks.push(MotionBlock::decode(&rest[..length]));
        offset += length;
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_move() -> BasicLinearMove {
        BasicLinearMove {
            primary_axis: 1,
            homing: false,
            nominal_speed: 200,
            end_speed: 10,
            acceleration_steps: 12,
            deceleration_steps: 34,
            axes: vec![
                AxisMove {
                    axis: 0,
                    steps: 100,
                    increasing: true,
                },
                AxisMove {
                    axis: 1,
                    steps: 250,
                    increasing: false,
                },
            ],
        }
    }

    #[test]
    fn delay_and_toolhead_scan() {
        let area = [0x04, 0x02, 0x01, 0xF4, 0x03, 0x04, 0x02];
        let blocks = decode_blocks(&area);
        assert_eq!(
            blocks,
            vec![
                MotionBlock::Delay { ticks: 500 },
                MotionBlock::SetActiveToolhead { toolhead: 2 },
            ]
        );
        assert_eq!(blocks[0].to_string(), "[delay 5000us]");
        assert_eq!(blocks[1].to_string(), "[use toolhead 2]");
    }

    #[test]
    fn command_wrapper_keeps_order_and_parameters() {
        let block = MotionBlock::decode(&[0x05, 0x01, 0x08, 0x02, 0x01]);
        assert_eq!(
            block,
            MotionBlock::CommandWrapper {
                order: Order::SetOutput,
                parameters: vec![0x02, 0x01],
            }
        );
        assert_eq!(block.to_string(), "[order:set output 02 01]");
    }

    #[test]
    fn basic_linear_move_one_byte_fields() {
        let body = [0x03, 0x01, 0x01, 200, 10, 12, 34, 100, 250];
        let decoded = BasicLinearMove::decode(&body).expect("decode");
        assert_eq!(decoded, sample_move());
        assert_eq!(decoded.encode_body().expect("encode"), body.to_vec());
        assert_eq!(
            decoded.to_string(),
            "[axisDirections=1 primaryAxis=1 nominalSpeed=200 endSpeed=10 accelSteps=12 \
             decelSteps=34(100 steps on axis 0 direction increasing)\
             (250 steps on axis 1 direction decreasing)]"
        );
    }

    #[test]
    fn basic_linear_move_two_byte_fields() {
        let linear = BasicLinearMove {
            primary_axis: 8,
            homing: true,
            nominal_speed: 1,
            end_speed: 0,
            acceleration_steps: 300,
            deceleration_steps: 2,
            axes: vec![
                AxisMove {
                    axis: 2,
                    steps: 5,
                    increasing: false,
                },
                AxisMove {
                    axis: 8,
                    steps: 1000,
                    increasing: true,
                },
            ],
        };
        let body = linear.encode_body().expect("encode");
        assert_eq!(
            body,
            vec![
                0x81, 0x04, // selection: two byte flag, axes 2 and 8
                0x81, 0x00, // direction: two byte steps flag, axis 8
                0x18, 1, 0, // homing, primary axis 8, speeds
                0x01, 0x2C, 0x00, 0x02, // accel, decel
                0x00, 0x05, 0x03, 0xE8, // steps for axes 2 and 8
            ]
        );
        assert_eq!(BasicLinearMove::decode(&body), Some(linear));
    }

    #[test]
    fn rejects_moves_that_cannot_be_encoded() {
        let mut linear = sample_move();
        linear.axes.push(AxisMove {
            axis: 15,
            steps: 1,
            increasing: true,
        });
        assert!(matches!(
            linear.encode_body(),
            Err(ProtocolError::InvalidMotionBlock(_))
        ));
    }

    #[test]
    fn malformed_blocks_become_opaque() {
        // truncated linear move, then a valid delay
        let area = [0x04, 0x03, 0x03, 0x01, 0x04, 0x02, 0x00, 0x01];
        let blocks = decode_blocks(&area);
        assert_eq!(
            blocks[0],
            MotionBlock::Opaque {
                block_type: Some(0x03),
                raw: vec![0x04, 0x03, 0x03, 0x01],
            }
        );
        assert_eq!(blocks[1], MotionBlock::Delay { ticks: 1 });

        let unknown = decode_blocks(&[0x03, 0x09, 0xAA]);
        assert_eq!(unknown[0].block_type(), Some(0x09));
        assert_eq!(unknown[0].to_string(), "[03 09 AA]");
    }

    #[test]
    fn bad_block_length_consumes_the_rest() {
        let blocks = decode_blocks(&[0x04, 0x02, 0x00, 0x01, 0x09, 0x04, 0x01]);
        assert_eq!(blocks.len(), 2);
        assert_eq!(
            blocks[1],
            MotionBlock::Opaque {
                block_type: Some(0x04),
                raw: vec![0x09, 0x04, 0x01],
            }
        );

        let zero = decode_blocks(&[0x00, 0x02, 0x01]);
        assert_eq!(zero.len(), 1);
        assert!(matches!(zero[0], MotionBlock::Opaque { .. }));
    }

    #[test]
    fn encode_adds_header() {
        let delay = MotionBlock::Delay { ticks: 500 };
        assert_eq!(delay.encode().expect("encode"), vec![0x04, 0x02, 0x01, 0xF4]);
        let linear = MotionBlock::BasicLinearMove(sample_move());
        let block = linear.encode().expect("encode");
        assert_eq!(block[0] as usize, block.len());
        assert_eq!(MotionBlock::decode(&block), linear);
    }
}
