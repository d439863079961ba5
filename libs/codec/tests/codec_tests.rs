//! # Flow Codec Integration Tests
//!
//! Wire-level behavior seen from outside the crate:
//! - frames survive the wire intact and keep their routing fields
//! - corruption anywhere in the payload is caught by the checksum
//! - truncated, foreign or oversized input is rejected without panicking

use flow_codec::payload::{discovery_payload, parse_discovery, parse_registration, registration_payload};
use flow_codec::{
    Frame, FrameHeader, MessageType, ProtocolError, DEFAULT_MAX_PAYLOAD_SIZE, FRAME_MAGIC,
    HEADER_SIZE,
};
use flow_types::ComponentId;
use proptest::prelude::*;

fn message_type() -> impl Strategy<Value = MessageType> {
    prop_oneof![
        Just(MessageType::Command),
        Just(MessageType::Response),
        Just(MessageType::Event),
        Just(MessageType::Heartbeat),
        Just(MessageType::Discovery),
        Just(MessageType::Registration),
    ]
}

#[test]
fn test_header_layout_is_stable() {
    let frame = Frame::new(MessageType::Event, 3, 0x0102_0304_0506_0708, b"abc".to_vec());
    let wire = frame.encode();

    assert_eq!(wire.len(), HEADER_SIZE + 3);
    assert_eq!(u32::from_ne_bytes(wire[0..4].try_into().unwrap()), FRAME_MAGIC);
    assert_eq!(wire[5], MessageType::Event as u8);
    assert_eq!(u32::from_ne_bytes(wire[8..12].try_into().unwrap()), 3);
    assert_eq!(u32::from_ne_bytes(wire[12..16].try_into().unwrap()), 3);
    assert_eq!(
        u64::from_ne_bytes(wire[16..24].try_into().unwrap()),
        0x0102_0304_0506_0708
    );
    assert_eq!(&wire[HEADER_SIZE..], b"abc");
}

#[test]
fn test_control_payloads_through_frames() {
    let registration = Frame::new(
        MessageType::Registration,
        0,
        0,
        registration_payload(ComponentId::Orchestration).to_vec(),
    );
    let decoded = Frame::decode(&registration.encode(), DEFAULT_MAX_PAYLOAD_SIZE).unwrap();
    assert_eq!(parse_registration(decoded.payload()).unwrap(), ComponentId::Orchestration);

    let running = [ComponentId::Consensus, ComponentId::Networking];
    let discovery = Frame::new(MessageType::Discovery, 1, 9, discovery_payload(&running));
    let decoded = Frame::decode(&discovery.encode(), DEFAULT_MAX_PAYLOAD_SIZE).unwrap();
    assert_eq!(parse_discovery(decoded.payload()).unwrap(), running.to_vec());
}

#[test]
fn test_unknown_message_type_is_not_a_framing_error() {
    let mut wire = Frame::heartbeat(1, 1).encode().to_vec();
    wire[5] = 42;

    let header = FrameHeader::decode(&wire, DEFAULT_MAX_PAYLOAD_SIZE).unwrap();
    assert_eq!(header.message_type(), Err(ProtocolError::UnknownMessageType(42)));
}

proptest! {
    #[test]
    fn frames_survive_the_wire(
        message_type in message_type(),
        source in 0u32..8,
        sequence in any::<u64>(),
        payload in prop::collection::vec(any::<u8>(), 0..2_048),
    ) {
        let frame = Frame::new(message_type, source, sequence, payload.clone());
        let decoded = Frame::decode(&frame.encode(), DEFAULT_MAX_PAYLOAD_SIZE).unwrap();

        prop_assert_eq!(decoded.message_type().unwrap(), message_type);
        prop_assert_eq!(decoded.source(), source);
        prop_assert_eq!(decoded.sequence(), sequence);
        prop_assert_eq!(&decoded.payload()[..], &payload[..]);
        prop_assert!(decoded.header().verify_checksum(&payload));
    }

    #[test]
    fn payload_corruption_is_detected(
        payload in prop::collection::vec(any::<u8>(), 1..1_024),
        position in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let mut wire = Frame::new(MessageType::Command, 2, 7, payload.clone()).encode().to_vec();
        let offset = HEADER_SIZE + position.index(payload.len());
        wire[offset] ^= flip;

        let is_checksum_mismatch = matches!(
            Frame::decode(&wire, DEFAULT_MAX_PAYLOAD_SIZE),
            Err(ProtocolError::ChecksumMismatch { .. })
        );
        prop_assert!(is_checksum_mismatch);
    }

    #[test]
    fn truncated_frames_are_rejected(
        payload in prop::collection::vec(any::<u8>(), 1..512),
        cut in any::<prop::sample::Index>(),
    ) {
        let wire = Frame::new(MessageType::Event, 1, 1, payload).encode();
        let keep = cut.index(wire.len());
        prop_assert!(Frame::decode(&wire[..keep], DEFAULT_MAX_PAYLOAD_SIZE).is_err());
    }

    #[test]
    fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = Frame::decode(&bytes, DEFAULT_MAX_PAYLOAD_SIZE);
        let _ = FrameHeader::decode(&bytes, DEFAULT_MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn oversized_declarations_are_rejected(declared in 1_025u32..u32::MAX) {
        let mut wire = Frame::new(MessageType::Command, 1, 1, vec![0u8; 16]).encode().to_vec();
        wire[12..16].copy_from_slice(&declared.to_ne_bytes());

        let is_too_large = matches!(
            FrameHeader::decode(&wire, 1_024),
            Err(ProtocolError::PayloadTooLarge { .. })
        );
        prop_assert!(is_too_large);
    }
}
