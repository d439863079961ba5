//! Frame assembly and parsing
//!
//! A [`Frame`] is a validated header plus its payload. Frames built through
//! [`Frame::new`] always carry a correct payload length and checksum; frames
//! read off the wire go through [`Frame::from_parts`] or [`Frame::decode`],
//! which reject length or checksum mismatches.

use crate::checksum::calculate_crc32;
use crate::{FrameHeader, MessageType, ProtocolError, ProtocolResult};
use bytes::{BufMut, Bytes, BytesMut};
use zerocopy::AsBytes;

/// Header plus payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    header: FrameHeader,
    payload: Bytes,
}

impl Frame {
    /// Build a frame, filling in payload length and checksum
    pub fn new(
        message_type: MessageType,
        source: u32,
        sequence: u64,
        payload: impl Into<Bytes>,
    ) -> Self {
        let payload = payload.into();
        let mut header = FrameHeader::new(message_type, source, sequence);
        header.payload_size = payload.len() as u32;
        header.checksum = calculate_crc32(&payload);
        Self { header, payload }
    }

    /// Empty heartbeat frame
    pub fn heartbeat(source: u32, sequence: u64) -> Self {
        Self::new(MessageType::Heartbeat, source, sequence, Bytes::new())
    }

    /// Combine a decoded header with the payload read after it.
    ///
    /// Fails if the payload length differs from the header field or the
    /// checksum does not match.
    pub fn from_parts(header: FrameHeader, payload: Bytes) -> ProtocolResult<Self> {
        if payload.len() != header.payload_len() {
            return Err(ProtocolError::PayloadSizeMismatch {
                declared: header.payload_len(),
                actual: payload.len(),
            });
        }

        let calculated = calculate_crc32(&payload);
        if calculated != header.checksum {
            return Err(ProtocolError::checksum_mismatch(
                header.checksum,
                calculated,
                payload.len(),
            ));
        }

        Ok(Self { header, payload })
    }

    /// Decode a complete frame from a buffer holding exactly one frame
    pub fn decode(bytes: &[u8], max_payload_size: usize) -> ProtocolResult<Self> {
        let header = FrameHeader::decode(bytes, max_payload_size)?;
        let body = &bytes[FrameHeader::SIZE..];

        if body.len() < header.payload_len() {
            return Err(ProtocolError::message_too_small(
                FrameHeader::SIZE + header.payload_len(),
                bytes.len(),
                "frame payload",
            ));
        }

        Self::from_parts(header, Bytes::copy_from_slice(body))
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    pub fn message_type(&self) -> ProtocolResult<MessageType> {
        self.header.message_type()
    }

    pub fn sequence(&self) -> u64 {
        self.header.sequence
    }

    pub fn source(&self) -> u32 {
        self.header.source
    }

    /// Total bytes on the wire
    pub fn encoded_len(&self) -> usize {
        FrameHeader::SIZE + self.payload.len()
    }

    /// Append header and payload to `buf`
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());
        buf.put_slice(self.header.as_bytes());
        buf.put_slice(&self.payload);
    }

    /// Encode into a fresh buffer
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_MAX_PAYLOAD_SIZE;

    #[test]
    fn test_frame_encode_decode() {
        let frame = Frame::new(MessageType::Command, 2, 7, &b"flow:payload"[..]);
        let wire = frame.encode();

        assert_eq!(wire.len(), FrameHeader::SIZE + 12);

        let decoded = Frame::decode(&wire, DEFAULT_MAX_PAYLOAD_SIZE).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decoded.message_type().unwrap(), MessageType::Command);
        assert_eq!(decoded.payload().as_ref(), b"flow:payload");
    }

    #[test]
    fn test_heartbeat_is_empty() {
        let frame = Frame::heartbeat(0, 1);
        assert!(frame.payload().is_empty());
        assert_eq!(frame.header().payload_size, 0);
        assert_eq!(frame.encoded_len(), FrameHeader::SIZE);
    }

    #[test]
    fn test_corrupted_payload_rejected() {
        let frame = Frame::new(MessageType::Event, 1, 3, &b"important"[..]);
        let mut wire = frame.encode().to_vec();
        let last = wire.len() - 1;
        wire[last] ^= 0xFF;

        let err = Frame::decode(&wire, DEFAULT_MAX_PAYLOAD_SIZE).unwrap_err();
        assert!(matches!(err, ProtocolError::ChecksumMismatch { payload_size: 9, .. }));
    }

    #[test]
    fn test_checksum_excludes_header() {
        // Changing header fields other than the checksum does not affect payload validation
        let frame = Frame::new(MessageType::Event, 1, 3, &b"abc"[..]);
        let mut header = *frame.header();
        header.sequence = 999;
        assert!(Frame::from_parts(header, frame.payload().clone()).is_ok());
    }

    #[test]
    fn test_truncated_payload() {
        let frame = Frame::new(MessageType::Command, 1, 1, &b"0123456789"[..]);
        let wire = frame.encode();
        let err = Frame::decode(&wire[..wire.len() - 4], DEFAULT_MAX_PAYLOAD_SIZE).unwrap_err();
        assert!(matches!(err, ProtocolError::MessageTooSmall { .. }));
    }

    #[test]
    fn test_from_parts_length_mismatch() {
        let frame = Frame::new(MessageType::Command, 1, 1, &b"abcd"[..]);
        let err = Frame::from_parts(*frame.header(), Bytes::from_static(b"ab")).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::PayloadSizeMismatch {
                declared: 4,
                actual: 2
            }
        );
    }
}
