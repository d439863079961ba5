//! Payload layouts for control frames
//!
//! Control payloads use explicit little-endian encoding:
//!
//! | Frame | Payload |
//! |---|---|
//! | Registration | component code (u32) |
//! | Response (ack) | acknowledged sequence (u64) |
//! | Discovery reply | component codes (u32 each) |

use crate::{ProtocolError, ProtocolResult};
use flow_types::ComponentId;

/// Registration payload: the component's wire code
pub fn registration_payload(component: ComponentId) -> [u8; 4] {
    component.code().to_le_bytes()
}

/// Parse a registration payload
pub fn parse_registration(payload: &[u8]) -> ProtocolResult<ComponentId> {
    let bytes: [u8; 4] = payload.try_into().map_err(|_| {
        ProtocolError::invalid_payload(
            "registration",
            format!("expected 4 bytes, got {}", payload.len()),
        )
    })?;

    let code = u32::from_le_bytes(bytes);
    ComponentId::from_code(code)
        .map_err(|e| ProtocolError::invalid_payload("registration", e.to_string()))
}

/// Acknowledgement payload: sequence number being acknowledged
pub fn ack_payload(sequence: u64) -> [u8; 8] {
    sequence.to_le_bytes()
}

/// Parse an acknowledgement payload
pub fn parse_ack(payload: &[u8]) -> ProtocolResult<u64> {
    let bytes: [u8; 8] = payload.try_into().map_err(|_| {
        ProtocolError::invalid_payload("response", format!("expected 8 bytes, got {}", payload.len()))
    })?;
    Ok(u64::from_le_bytes(bytes))
}

/// Discovery reply payload: list of component codes
pub fn discovery_payload(components: &[ComponentId]) -> Vec<u8> {
    components
        .iter()
        .flat_map(|c| c.code().to_le_bytes())
        .collect()
}

/// Parse a discovery reply payload
pub fn parse_discovery(payload: &[u8]) -> ProtocolResult<Vec<ComponentId>> {
    if payload.len() % 4 != 0 {
        return Err(ProtocolError::invalid_payload(
            "discovery",
            format!("length {} is not a multiple of 4", payload.len()),
        ));
    }

    payload
        .chunks_exact(4)
        .map(|chunk| {
            let code = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            ComponentId::from_code(code)
                .map_err(|e| ProtocolError::invalid_payload("discovery", e.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_payload() {
        let payload = registration_payload(ComponentId::Security);
        assert_eq!(parse_registration(&payload).unwrap(), ComponentId::Security);
    }

    #[test]
    fn test_registration_rejects_bad_input() {
        assert!(parse_registration(&[1, 2]).is_err());
        assert!(parse_registration(&99u32.to_le_bytes()).is_err());
    }

    #[test]
    fn test_ack_payload() {
        assert_eq!(parse_ack(&ack_payload(12345)).unwrap(), 12345);
        assert!(parse_ack(&[0u8; 3]).is_err());
    }

    #[test]
    fn test_discovery_payload() {
        let components = vec![ComponentId::Transport, ComponentId::Scheduler];
        let payload = discovery_payload(&components);
        assert_eq!(payload.len(), 8);
        assert_eq!(parse_discovery(&payload).unwrap(), components);
        assert!(parse_discovery(&[]).unwrap().is_empty());
        assert!(parse_discovery(&[1, 0, 0]).is_err());
    }
}
