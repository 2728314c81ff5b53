use std::collections::VecDeque;
use std::io;
use std::thread;
use std::time::{Duration, Instant};

use crate::client::sim::PacemakerClientSim;

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Byte transport between host and client. One consumer, half duplex.
pub trait PortHandler {
    /// Drops everything received so far.
    fn clear_port(&mut self) -> io::Result<()>;
    fn read_port(&mut self, length: usize) -> io::Result<Vec<u8>>;
    fn write_port(&mut self, packet: &[u8]) -> io::Result<usize>;
    fn get_bytes_available(&self) -> io::Result<usize>;

    /// Waits up to `timeout_ms` for one byte, polling in 1 ms ticks.
    fn read_byte_timeout(&mut self, timeout_ms: u64) -> io::Result<Option<u8>> {
        let deadline = Duration::from_millis(timeout_ms);
        let start = Instant::now();
        loop {
            if self.get_bytes_available()? > 0 {
                if let Some(byte) = self.read_port(1)?.first() {
                    return Ok(Some(*byte));
                }
            }
            if start.elapsed() >= deadline {
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// In-memory port wired straight to a simulated client.
#[derive(Debug)]
pub struct SimPort {
    sim: PacemakerClientSim,
    rx_buffer: VecDeque<u8>,
    closed: bool,
}

impl SimPort {
    pub fn new(sim: PacemakerClientSim) -> Self {
        Self {
            sim,
            rx_buffer: VecDeque::new(),
            closed: false,
        }
    }

    pub fn sim(&self) -> &PacemakerClientSim {
        &self.sim
    }

    pub fn sim_mut(&mut self) -> &mut PacemakerClientSim {
        &mut self.sim
    }

    /// Queues raw bytes as if the client had sent them.
    pub fn inject(&mut self, bytes: &[u8]) {
        self.rx_buffer.extend(bytes.iter().copied());
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "sim port closed"));
        }
        Ok(())
    }
}

impl PortHandler for SimPort {
    fn clear_port(&mut self) -> io::Result<()> {
        self.ensure_open()?;
        self.rx_buffer.clear();
        Ok(())
    }

    fn read_port(&mut self, length: usize) -> io::Result<Vec<u8>> {
        self.ensure_open()?;
        let take = length.min(self.rx_buffer.len());
        Ok(self.rx_buffer.drain(..take).collect())
    }

    fn write_port(&mut self, packet: &[u8]) -> io::Result<usize> {
        self.ensure_open()?;
        let response = self.sim.handle_bytes(packet);
        self.rx_buffer.extend(response);
        Ok(packet.len())
    }

    fn get_bytes_available(&self) -> io::Result<usize> {
        self.ensure_open()?;
        Ok(self.rx_buffer.len())
    }

    // Nothing arrives later on an in-memory port, so an empty buffer is final.
    fn read_byte_timeout(&mut self, _timeout_ms: u64) -> io::Result<Option<u8>> {
        self.ensure_open()?;
        Ok(self.rx_buffer.pop_front())
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        self.rx_buffer.clear();
        Ok(())
    }
}

impl Default for SimPort {
    fn default() -> Self {
        Self::new(PacemakerClientSim::new())
    }
}
