//! Protocol module - Defines the wire protocol between controller and device
//!
//! Each frame is:
//! - 4 bytes magic ("PTRD")
//! - 4 bytes payload length (big-endian)
//! - 4 bytes sequence number (big-endian)
//! - Variable length JSON payload

mod codec;
mod message;

pub use codec::*;
pub use message::*;

/// Protocol version reported by `pointerd info`
pub const PROTOCOL_VERSION: u32 = 1;

/// Default port for controller connections
pub const DEFAULT_PORT: u16 = 24801;

/// Magic bytes for protocol identification
pub const MAGIC_BYTES: [u8; 4] = [0x50, 0x54, 0x52, 0x44]; // "PTRD"
