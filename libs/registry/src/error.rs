//! Registry Error Types

use flow_config::ConfigError;
use flow_network::TransportError;
use flow_types::{ComponentId, TypeError};
use thiserror::Error;

/// Errors surfaced by the flow registry orchestrator
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Record failed validation
    #[error("Invalid flow record: {0}")]
    InvalidRecord(#[from] TypeError),

    /// Socket server, client or discovery failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration rejected by validation
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Configuration file or environment could not be read
    #[error("Failed to load configuration: {message}")]
    ConfigLoad { message: String },

    /// Destination is not registered or not healthy
    #[error("Unknown destination: {component} ({reason})")]
    UnknownDestination {
        component: ComponentId,
        reason: String,
    },

    #[error("{0} is already running")]
    AlreadyRunning(&'static str),

    #[error("Flow registry is not running")]
    NotRunning,

    /// Global subscriber could not be installed
    #[error("Logging setup failed: {message}")]
    Logging { message: String },

    /// Async runtime could not be created
    #[error("Runtime error: {message}")]
    Runtime { message: String },
}

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

impl RegistryError {
    pub fn unknown_destination(component: ComponentId, reason: impl Into<String>) -> Self {
        Self::UnknownDestination {
            component,
            reason: reason.into(),
        }
    }

    /// Flatten an `anyhow` chain from the configuration loader
    pub fn config_load(error: anyhow::Error) -> Self {
        Self::ConfigLoad {
            message: format!("{:#}", error),
        }
    }

    /// True when the destination is absent or unhealthy, wherever that was detected
    pub fn is_unknown_destination(&self) -> bool {
        matches!(
            self,
            Self::UnknownDestination { .. }
                | Self::Transport(TransportError::UnknownDestination { .. })
        )
    }
}
