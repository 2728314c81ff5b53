use log::debug;

use crate::client::protocol::catalog::{Order, Reply};
use crate::client::protocol::motion_block::MotionBlock;
use crate::client::protocol::pacemaker_def::MAX_PARAMETER_LEN;
use crate::client::protocol::port_handler::PortHandler;
use crate::client::protocol::protocol_packet_handler::ProtocolPacketHandler;
use crate::error::Result;

/// Collects motion blocks into the parameter area of one queue command
/// blocks order.
#[derive(Debug, Default)]
pub struct CommandBlockQueue {
    blocks: Vec<MotionBlock>,
    param: Vec<u8>,
}

impl CommandBlockQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Ok(false)` when the block would not fit into the frame.
    pub fn add_block(&mut self, block: MotionBlock) -> Result<bool> {
        let encoded = block.encode()?;
        if self.param.len() + encoded.len() > MAX_PARAMETER_LEN {
            debug!(
                "Block of {} bytes does not fit, {} bytes queued",
                encoded.len(),
                self.param.len()
            );
            return Ok(false);
        }
        self.param.extend_from_slice(&encoded);
        self.blocks.push(block);
        Ok(true)
    }

    pub fn blocks(&self) -> &[MotionBlock] {
        &self.blocks
    }

    pub fn param(&self) -> &[u8] {
        &self.param
    }

    pub fn is_available(&self) -> bool {
        !self.blocks.is_empty()
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
        self.param.clear();
    }

    /// Sends the collected blocks as one order and clears the queue once the
    /// reply has been received. The caller accepts the reply.
    pub fn tx_rx<P: PortHandler>(
        &mut self,
        handler: &mut ProtocolPacketHandler<P>,
    ) -> Result<Reply> {
        let reply = handler.tx_rx(Order::QueueCommandBlocks, &self.param)?;
        self.clear();
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_blocks_past_the_frame_limit() {
        let mut queue = CommandBlockQueue::new();
        let filler = MotionBlock::CommandWrapper {
            order: Order::SetOutput,
            parameters: vec![0; 97],
        };
        assert!(queue.add_block(filler.clone()).expect("encode"));
        assert!(queue.add_block(filler.clone()).expect("encode"));
        assert_eq!(queue.param().len(), 200);
        assert!(!queue.add_block(filler).expect("encode"));
        assert!(queue.add_block(MotionBlock::Delay { ticks: 7 }).expect("encode"));
        assert_eq!(queue.blocks().len(), 3);
        assert_eq!(queue.param().len(), 204);
    }

    #[test]
    fn clear_empties_the_queue() {
        let mut queue = CommandBlockQueue::new();
        assert!(!queue.is_available());
        queue
            .add_block(MotionBlock::SetActiveToolhead { toolhead: 1 })
            .expect("encode");
        assert!(queue.is_available());
        queue.clear();
        assert!(queue.param().is_empty());
    }
}
