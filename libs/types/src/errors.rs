//! Validation errors for flow-registry data types

use thiserror::Error;

/// Errors raised while constructing or parsing core types
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    /// Flow priority outside the 0-7 range
    #[error("Invalid priority {priority}: must be between 0 and {max}")]
    InvalidPriority { priority: u8, max: u8 },

    /// Flow type tag not recognized
    #[error("Unknown flow type tag {0}")]
    UnknownFlowType(u8),

    /// Component code not one of the seven fixed roles
    #[error("Unknown component code {0}: valid codes are 1-7")]
    UnknownComponentCode(u32),

    /// Component name not one of the seven fixed roles
    #[error("Unknown component name '{0}'")]
    UnknownComponentName(String),

    /// Lifecycle transition not permitted
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

/// Result alias for type construction
pub type Result<T> = std::result::Result<T, TypeError>;
