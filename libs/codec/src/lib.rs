//! # Flow Registry Codec
//!
//! ## Purpose
//!
//! The "rules" layer of the flow registry transport:
//! - Fixed 40-byte [`FrameHeader`] (magic, version, type, source, sequence,
//!   payload length, timestamp, payload CRC32)
//! - [`Frame`] assembly/validation
//! - [`MessageType`] tags for the six frame kinds
//! - Control payload layouts (registration, acknowledgement, discovery)
//!
//! ## What This Crate Does NOT Contain
//! - Socket management or connection handling (belongs in flow-network)
//! - Registry data structures (belongs in flow-registry)
//!
//! ## Architecture Role
//!
//! ```text
//! flow-types → [flow-codec] → flow-network
//!     ↑             ↓              ↓
//! Pure Data    Frame Rules     Transport
//! FlowKey      FrameHeader     Unix Sockets
//! ```

pub mod checksum;
pub mod constants;
pub mod error;
pub mod frame;
pub mod header;
pub mod message_type;
pub mod payload;

pub use checksum::{calculate_crc32, verify_payload_checksum};
pub use constants::*;
pub use error::{ProtocolError, ProtocolResult};
pub use frame::Frame;
pub use header::FrameHeader;
pub use message_type::MessageType;
