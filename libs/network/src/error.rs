//! Transport Error Types
//!
//! Error handling for the local socket server, client connections and peer
//! discovery.

use flow_codec::ProtocolError;
use flow_types::ComponentId;
use thiserror::Error;

/// Main transport error type
#[derive(Error, Debug)]
pub enum TransportError {
    /// Socket bind/accept/connect failures
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Connection closed or unusable
    #[error("Connection error: {message} (connection: {connection_id:?})")]
    Connection {
        message: String,
        connection_id: Option<u64>,
    },

    /// Malformed, oversized or corrupted frames
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Transport timeout errors
    #[error("Timeout error: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Destination is unregistered, unhealthy or has no live connection
    #[error("Unknown destination: {component} ({reason})")]
    UnknownDestination {
        component: ComponentId,
        reason: String,
    },

    /// Peer replied with something other than what the exchange expects
    #[error("Unexpected reply: expected {expected}, got {actual}")]
    UnexpectedReply { expected: String, actual: String },

    /// Generic I/O errors
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Server is already running
    #[error("Server already running on {path}")]
    AlreadyRunning { path: String },

    /// Operation requires a running server
    #[error("Server is not running")]
    NotRunning,
}

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    /// Create a network error with source
    pub fn network_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>, connection_id: Option<u64>) -> Self {
        Self::Connection {
            message: message.into(),
            connection_id,
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create an unknown-destination error
    pub fn unknown_destination(component: ComponentId, reason: impl Into<String>) -> Self {
        Self::UnknownDestination {
            component,
            reason: reason.into(),
        }
    }

    /// Create an unexpected-reply error
    pub fn unexpected_reply(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::UnexpectedReply {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Peer closed the stream cleanly
    pub fn is_disconnect(&self) -> bool {
        match self {
            TransportError::Io { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// Convert standard I/O errors to transport errors
impl From<std::io::Error> for TransportError {
    fn from(error: std::io::Error) -> Self {
        TransportError::Io {
            message: error.to_string(),
            source: error,
        }
    }
}
