pub mod catalog;
pub mod command_queue;
pub mod crc;
pub mod diagnostics;
pub mod frame;
pub mod motion_block;
pub mod pacemaker_def;
pub mod port_handler;
pub mod protocol_packet_handler;
pub mod sequence;
pub mod serial_port;
#[cfg(unix)]
pub mod virtual_uart;
