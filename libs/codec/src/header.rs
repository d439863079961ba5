//! Frame Header Implementation
//!
//! Every frame starts with the same fixed 40-byte header followed by exactly
//! `payload_size` payload bytes.
//!
//! ```text
//! ┌─────────────────┬─────────────────────────────────────┐
//! │ FrameHeader     │ Payload                             │
//! │ (40 bytes)      │ (payload_size bytes, CRC32-covered) │
//! └─────────────────┴─────────────────────────────────────┘
//! ```

use crate::checksum::verify_payload_checksum;
use crate::constants::{FRAME_MAGIC, HEADER_SIZE, PROTOCOL_VERSION};
use crate::{MessageType, ProtocolError, ProtocolResult};
use flow_types::current_timestamp_ns;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// Frame Header (40 bytes)
///
/// **CRITICAL**: Field ordering keeps every field naturally aligned so the
/// struct has no padding (required by `AsBytes`). Fields are grouped
/// u32/u8/u16 → u32 → u64 → u32. DO NOT REORDER without re-checking layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
pub struct FrameHeader {
    pub magic: u32,        // bytes 0-3
    pub version: u8,       // byte 4
    pub message_type: u8,  // byte 5
    pub flags: u16,        // bytes 6-7
    pub source: u32,       // bytes 8-11, component code (0 = unbound)
    pub payload_size: u32, // bytes 12-15
    pub sequence: u64,     // bytes 16-23, per-connection
    pub timestamp: u64,    // bytes 24-31, ns since epoch
    pub checksum: u32,     // bytes 32-35, CRC32 of payload only
    pub reserved: u32,     // bytes 36-39
}

impl FrameHeader {
    /// Header size in bytes
    pub const SIZE: usize = HEADER_SIZE;

    /// Create a header stamped with the current time. Payload size and
    /// checksum are filled in when the frame is assembled.
    pub fn new(message_type: MessageType, source: u32, sequence: u64) -> Self {
        Self {
            magic: FRAME_MAGIC,
            version: PROTOCOL_VERSION,
            message_type: message_type.tag(),
            flags: 0,
            source,
            payload_size: 0,
            sequence,
            timestamp: current_timestamp_ns(),
            checksum: 0,
            reserved: 0,
        }
    }

    /// Parse and structurally validate a header.
    ///
    /// Checks size, magic, version and the payload bound. The message type is
    /// NOT checked here; unknown types are a per-frame condition, not a
    /// framing failure.
    pub fn decode(bytes: &[u8], max_payload_size: usize) -> ProtocolResult<Self> {
        if bytes.len() < Self::SIZE {
            return Err(ProtocolError::message_too_small(
                Self::SIZE,
                bytes.len(),
                "frame header",
            ));
        }

        let header = Self::read_from(&bytes[..Self::SIZE]).ok_or_else(|| {
            ProtocolError::message_too_small(Self::SIZE, bytes.len(), "frame header layout")
        })?;
        header.validate(max_payload_size)?;
        Ok(header)
    }

    /// Validate magic, version and payload bound
    pub fn validate(&self, max_payload_size: usize) -> ProtocolResult<()> {
        if self.magic != FRAME_MAGIC {
            return Err(ProtocolError::invalid_magic(FRAME_MAGIC, self.magic));
        }

        if self.version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion {
                version: self.version,
                supported: PROTOCOL_VERSION,
            });
        }

        if self.payload_size as usize > max_payload_size {
            return Err(ProtocolError::PayloadTooLarge {
                size: self.payload_size as usize,
                max: max_payload_size,
            });
        }

        Ok(())
    }

    /// Message type, if recognized
    pub fn message_type(&self) -> ProtocolResult<MessageType> {
        MessageType::from_tag(self.message_type)
    }

    pub fn payload_len(&self) -> usize {
        self.payload_size as usize
    }

    /// Check a payload against the header checksum
    pub fn verify_checksum(&self, payload: &[u8]) -> bool {
        verify_payload_checksum(payload, self.checksum)
    }

    /// Age of this frame in nanoseconds
    pub fn age_ns(&self) -> u64 {
        current_timestamp_ns().saturating_sub(self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_MAX_PAYLOAD_SIZE;

    #[test]
    fn test_header_size() {
        assert_eq!(std::mem::size_of::<FrameHeader>(), FrameHeader::SIZE);
        assert_eq!(FrameHeader::SIZE, 40);
    }

    #[test]
    fn test_header_creation() {
        let header = FrameHeader::new(MessageType::Heartbeat, 3, 17);

        assert_eq!(header.magic, FRAME_MAGIC);
        assert_eq!(header.version, PROTOCOL_VERSION);
        assert_eq!(header.message_type().unwrap(), MessageType::Heartbeat);
        assert_eq!(header.source, 3);
        assert_eq!(header.sequence, 17);
        assert!(header.timestamp > 0);
    }

    #[test]
    fn test_decode_roundtrip() {
        let mut header = FrameHeader::new(MessageType::Command, 1, 5);
        header.payload_size = 12;
        let decoded = FrameHeader::decode(header.as_bytes(), DEFAULT_MAX_PAYLOAD_SIZE).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_decode_short_buffer() {
        let header = FrameHeader::new(MessageType::Command, 1, 5);
        let err = FrameHeader::decode(&header.as_bytes()[..20], DEFAULT_MAX_PAYLOAD_SIZE).unwrap_err();
        assert!(matches!(err, ProtocolError::MessageTooSmall { need: 40, got: 20, .. }));
    }

    #[test]
    fn test_decode_bad_magic() {
        let mut header = FrameHeader::new(MessageType::Event, 1, 1);
        header.magic = 0xDEADBEEF;
        let err = FrameHeader::decode(header.as_bytes(), DEFAULT_MAX_PAYLOAD_SIZE).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMagic { actual: 0xDEADBEEF, .. }));
    }

    #[test]
    fn test_decode_bad_version() {
        let mut header = FrameHeader::new(MessageType::Event, 1, 1);
        header.version = 9;
        let err = FrameHeader::decode(header.as_bytes(), DEFAULT_MAX_PAYLOAD_SIZE).unwrap_err();
        assert!(matches!(err, ProtocolError::UnsupportedVersion { version: 9, .. }));
    }

    #[test]
    fn test_decode_oversized_payload() {
        let mut header = FrameHeader::new(MessageType::Command, 1, 1);
        header.payload_size = 1_000_000;
        let err = FrameHeader::decode(header.as_bytes(), 4096).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::PayloadTooLarge {
                size: 1_000_000,
                max: 4096
            }
        );
    }

    #[test]
    fn test_unknown_type_survives_decode() {
        let mut header = FrameHeader::new(MessageType::Command, 1, 1);
        header.message_type = 42;
        let decoded = FrameHeader::decode(header.as_bytes(), DEFAULT_MAX_PAYLOAD_SIZE).unwrap();
        assert_eq!(
            decoded.message_type().unwrap_err(),
            ProtocolError::UnknownMessageType(42)
        );
    }
}
