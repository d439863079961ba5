//! Flow records
//!
//! A [`FlowRecord`] describes one unit of work known to the registry. Records
//! are immutable once stored; re-registering the same key overwrites the whole
//! record.

use crate::{current_timestamp_ns, ComponentId, FlowKey, Result, TypeError};
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

/// Highest allowed flow priority
pub const MAX_PRIORITY: u8 = 7;

/// Kind of work a flow carries
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    Command = 0,
    DataTransfer = 1,
    Event = 2,
    Metric = 3,
    Security = 4,
    Health = 5,
}

impl FlowType {
    /// Parse a wire tag
    pub fn from_tag(tag: u8) -> Result<Self> {
        Self::try_from_primitive(tag).map_err(|_| TypeError::UnknownFlowType(tag))
    }
}

/// A registered flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowRecord {
    /// Normalized content key
    pub key: FlowKey,
    /// Component that produced the flow
    pub component: ComponentId,
    pub flow_type: FlowType,
    /// Nanoseconds since the Unix epoch
    pub timestamp_ns: u64,
    /// Payload size in bytes
    pub size: u64,
    /// 0 (lowest) to 7 (highest)
    pub priority: u8,
}

impl FlowRecord {
    /// Build a record stamped with the current time
    pub fn new(
        key: FlowKey,
        component: ComponentId,
        flow_type: FlowType,
        size: u64,
        priority: u8,
    ) -> Result<Self> {
        let record = Self {
            key,
            component,
            flow_type,
            timestamp_ns: current_timestamp_ns(),
            size,
            priority,
        };
        record.validate()?;
        Ok(record)
    }

    /// Override the timestamp (replayed or externally stamped flows)
    pub fn with_timestamp(mut self, timestamp_ns: u64) -> Self {
        self.timestamp_ns = timestamp_ns;
        self
    }

    /// Check field ranges
    pub fn validate(&self) -> Result<()> {
        if self.priority > MAX_PRIORITY {
            return Err(TypeError::InvalidPriority {
                priority: self.priority,
                max: MAX_PRIORITY,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_creation() {
        let record = FlowRecord::new(
            FlowKey::from_u64(1),
            ComponentId::Transport,
            FlowType::DataTransfer,
            1024,
            3,
        )
        .unwrap();

        assert_eq!(record.priority, 3);
        assert_eq!(record.size, 1024);
        assert!(record.timestamp_ns > 0);
    }

    #[test]
    fn test_priority_out_of_range() {
        let err = FlowRecord::new(
            FlowKey::from_u64(1),
            ComponentId::Security,
            FlowType::Security,
            0,
            8,
        )
        .unwrap_err();

        assert_eq!(err, TypeError::InvalidPriority { priority: 8, max: 7 });
    }

    #[test]
    fn test_flow_type_tags() {
        assert_eq!(FlowType::from_tag(0).unwrap(), FlowType::Command);
        assert_eq!(FlowType::from_tag(5).unwrap(), FlowType::Health);
        assert!(FlowType::from_tag(6).is_err());
    }

    #[test]
    fn test_with_timestamp() {
        let record = FlowRecord::new(
            FlowKey::from_u64(9),
            ComponentId::Scheduler,
            FlowType::Event,
            1,
            0,
        )
        .unwrap()
        .with_timestamp(123);
        assert_eq!(record.timestamp_ns, 123);
    }
}
