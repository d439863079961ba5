//! Wire protocol constants

/// Frame magic: ASCII "FLWR" read as a big-endian word
pub const FRAME_MAGIC: u32 = 0x464C_5752;

/// Current wire protocol version
pub const PROTOCOL_VERSION: u8 = 1;

/// Fixed frame header size in bytes
pub const HEADER_SIZE: usize = 40;

/// Default upper bound on a single frame payload (64KB)
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Source code used by endpoints that have not registered a component
pub const UNBOUND_SOURCE: u32 = 0;
