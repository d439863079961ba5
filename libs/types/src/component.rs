//! Component identifiers and lifecycle
//!
//! The flow registry coordinates a fixed set of seven cooperating processes.
//! Each has a stable numeric code (used in frame headers and registration
//! payloads) and a name (used for socket artifact names during discovery:
//! `<name>.sock`).

use crate::{Result, TypeError};
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the seven recognized component roles
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, TryFromPrimitive, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentId {
    Transport = 1,
    Consensus = 2,
    Container = 3,
    Security = 4,
    Orchestration = 5,
    Networking = 6,
    Scheduler = 7,
}

impl ComponentId {
    /// Every recognized component, in code order
    pub const ALL: [ComponentId; 7] = [
        ComponentId::Transport,
        ComponentId::Consensus,
        ComponentId::Container,
        ComponentId::Security,
        ComponentId::Orchestration,
        ComponentId::Networking,
        ComponentId::Scheduler,
    ];

    /// Wire code carried by frame headers
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Parse a wire code
    pub fn from_code(code: u32) -> Result<Self> {
        Self::try_from_primitive(code).map_err(|_| TypeError::UnknownComponentCode(code))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ComponentId::Transport => "transport",
            ComponentId::Consensus => "consensus",
            ComponentId::Container => "container",
            ComponentId::Security => "security",
            ComponentId::Orchestration => "orchestration",
            ComponentId::Networking => "networking",
            ComponentId::Scheduler => "scheduler",
        }
    }

    /// Socket artifact name used in the shared discovery directory
    pub fn socket_file_name(self) -> String {
        format!("{}.sock", self.as_str())
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self> {
        ComponentId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| TypeError::UnknownComponentName(s.to_string()))
    }
}

/// Lifecycle of a peer component.
///
/// Normal progression is `Unknown → Starting → Running → Stopping → Stopped`.
/// `Failed` is reachable from every state, and a failed or stopped component may
/// start again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Unknown,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl ComponentStatus {
    fn rank(self) -> u8 {
        match self {
            ComponentStatus::Unknown => 0,
            ComponentStatus::Starting => 1,
            ComponentStatus::Running => 2,
            ComponentStatus::Stopping => 3,
            ComponentStatus::Stopped => 4,
            ComponentStatus::Failed => 5,
        }
    }

    /// Whether moving from `self` to `next` is allowed
    pub fn can_transition_to(self, next: ComponentStatus) -> bool {
        match (self, next) {
            (_, ComponentStatus::Failed) => true,
            (ComponentStatus::Failed | ComponentStatus::Stopped, ComponentStatus::Starting) => true,
            (ComponentStatus::Failed, _) => false,
            (from, to) => to.rank() > from.rank(),
        }
    }

    /// Validate a transition, returning the new status
    pub fn transition(self, next: ComponentStatus) -> Result<ComponentStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TypeError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentStatus::Unknown => "unknown",
            ComponentStatus::Starting => "starting",
            ComponentStatus::Running => "running",
            ComponentStatus::Stopping => "stopping",
            ComponentStatus::Stopped => "stopped",
            ComponentStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_roundtrip() {
        for id in ComponentId::ALL {
            assert_eq!(ComponentId::from_code(id.code()).unwrap(), id);
            assert_eq!(id.as_str().parse::<ComponentId>().unwrap(), id);
        }
        assert!(ComponentId::from_code(0).is_err());
        assert!(ComponentId::from_code(8).is_err());
    }

    #[test]
    fn test_unknown_name() {
        assert_eq!(
            "dashboard".parse::<ComponentId>().unwrap_err(),
            TypeError::UnknownComponentName("dashboard".to_string())
        );
    }

    #[test]
    fn test_socket_file_name() {
        assert_eq!(ComponentId::Consensus.socket_file_name(), "consensus.sock");
    }

    #[test]
    fn test_lifecycle_transitions() {
        use ComponentStatus::*;

        assert!(Unknown.can_transition_to(Starting));
        assert!(Starting.can_transition_to(Running));
        assert!(Running.can_transition_to(Stopping));
        assert!(Stopping.can_transition_to(Stopped));
        assert!(Unknown.can_transition_to(Running));

        for status in [Unknown, Starting, Running, Stopping, Stopped, Failed] {
            assert!(status.can_transition_to(Failed));
        }

        assert!(!Running.can_transition_to(Starting));
        assert!(!Stopped.can_transition_to(Running));
        assert!(Stopped.can_transition_to(Starting));
        assert!(Failed.can_transition_to(Starting));
        assert!(!Failed.can_transition_to(Running));
    }

    #[test]
    fn test_transition_error() {
        let err = ComponentStatus::Stopped
            .transition(ComponentStatus::Running)
            .unwrap_err();
        assert!(matches!(err, TypeError::InvalidTransition { .. }));
    }
}
