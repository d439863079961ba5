//! Frame message types

use crate::ProtocolError;
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The six frame kinds understood by the transport
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Request for work; answered with a `Response` acknowledgement
    Command = 1,
    /// Acknowledgement or reply
    Response = 2,
    /// Fire-and-forget notification; also acknowledged
    Event = 3,
    /// Liveness probe; answered with an empty `Heartbeat`
    Heartbeat = 4,
    /// Peer listing request/reply
    Discovery = 5,
    /// Binds a connection to a component id
    Registration = 6,
}

impl MessageType {
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Parse a header tag
    pub fn from_tag(tag: u8) -> Result<Self, ProtocolError> {
        Self::try_from_primitive(tag).map_err(|_| ProtocolError::UnknownMessageType(tag))
    }

    pub fn name(self) -> &'static str {
        match self {
            MessageType::Command => "command",
            MessageType::Response => "response",
            MessageType::Event => "event",
            MessageType::Heartbeat => "heartbeat",
            MessageType::Discovery => "discovery",
            MessageType::Registration => "registration",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags() {
        for tag in 1..=6u8 {
            assert_eq!(MessageType::from_tag(tag).unwrap().tag(), tag);
        }
        assert_eq!(
            MessageType::from_tag(0).unwrap_err(),
            ProtocolError::UnknownMessageType(0)
        );
        assert!(MessageType::from_tag(7).is_err());
    }
}
