//! Flow key normalization and identifier parsing properties

use flow_types::{ComponentId, FlowKey, FlowRecord, FlowType, TypeError, FLOW_KEY_SIZE};
use proptest::prelude::*;

proptest! {
    #[test]
    fn short_keys_are_zero_padded(raw in prop::collection::vec(any::<u8>(), 0..=FLOW_KEY_SIZE)) {
        let key = FlowKey::from_bytes(&raw);
        prop_assert_eq!(&key.as_bytes()[..raw.len()], &raw[..]);
        prop_assert!(key.as_bytes()[raw.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn long_keys_are_content_hashed(raw in prop::collection::vec(any::<u8>(), FLOW_KEY_SIZE + 1..256)) {
        let key = FlowKey::from_bytes(&raw);
        let expected = blake3::hash(&raw);
        prop_assert_eq!(key.as_bytes(), expected.as_bytes());
        prop_assert_eq!(key, FlowKey::from_bytes(&raw));
    }

    #[test]
    fn distinct_sequence_keys_differ(a in any::<u64>(), b in any::<u64>()) {
        prop_assume!(a != b);
        prop_assert_ne!(FlowKey::from_u64(a), FlowKey::from_u64(b));
        prop_assert_ne!(FlowKey::from_u64(a).hash64(), FlowKey::from_u64(b).hash64());
    }

    #[test]
    fn priority_above_seven_is_rejected(priority in 8u8..) {
        let result = FlowRecord::new(
            FlowKey::from_u64(1),
            ComponentId::Transport,
            FlowType::Command,
            0,
            priority,
        );
        prop_assert_eq!(result, Err(TypeError::InvalidPriority { priority, max: 7 }));
    }

    #[test]
    fn component_codes_outside_range_are_rejected(code in 8u32..) {
        prop_assert_eq!(
            ComponentId::from_code(code),
            Err(TypeError::UnknownComponentCode(code))
        );
    }
}

#[test]
fn test_component_names_resolve_socket_files() {
    for id in ComponentId::ALL {
        let file = id.socket_file_name();
        let stem = file.strip_suffix(".sock").unwrap();
        assert_eq!(stem.parse::<ComponentId>().unwrap(), id);
        assert_eq!(ComponentId::from_code(id.code()).unwrap(), id);
    }
    assert!(ComponentId::from_code(0).is_err());
    assert!("ledger".parse::<ComponentId>().is_err());
}
