//! Host side of the Pacemaker serial protocol and a conformance tester for
//! Pacemaker client firmware.

pub mod client;
pub mod conformance;
pub mod error;

pub use client::protocol::catalog::{Order, Reply, ReplyCode};
pub use client::protocol::port_handler::{PortHandler, SimPort};
pub use client::protocol::protocol_packet_handler::{HandlerConfig, ProtocolPacketHandler};
pub use conformance::{ClientInformation, ConformanceError, ConformanceRun};
pub use error::{FrameError, ProtocolError, Result};
