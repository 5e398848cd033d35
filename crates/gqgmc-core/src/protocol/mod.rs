//! Serial Protocol Communication
//!
//! Implements the GQ-RFC1201 command protocol spoken by GMC-3xx Geiger counters.
//!
//! Requests are ASCII frames of the form `<KEYWORD>>`; responses are raw
//! binary with no length prefix, terminator or checksum, so every command
//! carries its own expected response shape.

mod client;
pub mod commands;
pub mod decode;
mod error;
pub mod frame;
pub mod serial;
pub mod time;

pub use client::DeviceClient;
pub use commands::{Command, ResponseShape};
pub use decode::Orientation;
pub use error::ProtocolError;
pub use serial::{list_ports, Channel, PortInfo, SerialChannel};
pub use time::DeviceTime;

/// Default baud rate for GMC-3xx devices
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default deadline for a complete response in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Size of the response buffer; no response may exceed it
pub const MAX_RESPONSE_SIZE: usize = 4096;

/// Settling time before reading a GETCFG response, in milliseconds
pub const CONFIG_SETTLE_MS: u64 = 100;

/// Exact length of the GETCFG configuration block
pub const CONFIG_BLOCK_SIZE: usize = 256;
