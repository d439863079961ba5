//! Protocol-level errors for frame processing
//!
//! Each variant carries enough context to tell a truncated read from a
//! corrupted payload or a peer speaking a different protocol. Connection
//! handlers log these and drop the offending connection only.

use thiserror::Error;

/// Frame decoding and validation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer is too small to contain the expected structure (short read)
    #[error("Message too small: need {need} bytes, got {got} (context: {context})")]
    MessageTooSmall {
        need: usize,
        got: usize,
        context: String,
    },

    /// Frame magic validation failed
    #[error("Invalid magic number: expected {expected:#010x}, got {actual:#010x} (indicates: {diagnosis})")]
    InvalidMagic {
        expected: u32,
        actual: u32,
        diagnosis: String,
    },

    /// Protocol version not understood by this codec
    #[error("Unsupported protocol version {version}: supported version is {supported}")]
    UnsupportedVersion { version: u8, supported: u8 },

    /// Payload checksum mismatch - data corruption
    #[error("Checksum mismatch: expected {expected:#010x}, calculated {calculated:#010x} (payload: {payload_size} bytes, cause: {likely_cause})")]
    ChecksumMismatch {
        expected: u32,
        calculated: u32,
        payload_size: usize,
        likely_cause: String,
    },

    /// Declared payload exceeds the configured maximum
    #[error("Payload too large: {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// Payload length differs from the header field
    #[error("Payload size mismatch: header declares {declared} bytes, got {actual}")]
    PayloadSizeMismatch { declared: usize, actual: usize },

    /// Message type tag not recognized
    #[error("Unknown message type {0}: valid types are 1-6")]
    UnknownMessageType(u8),

    /// Payload content invalid for its message type
    #[error("Invalid {message_type} payload: {reason}")]
    InvalidPayload {
        message_type: String,
        reason: String,
    },
}

impl ProtocolError {
    /// Short-read error with context
    pub fn message_too_small(need: usize, got: usize, context: impl Into<String>) -> Self {
        Self::MessageTooSmall {
            need,
            got,
            context: context.into(),
        }
    }

    /// Invalid magic error with a guess at the cause
    pub fn invalid_magic(expected: u32, actual: u32) -> Self {
        let diagnosis = match actual {
            0x00000000 => "uninitialized buffer",
            0xFFFFFFFF => "corrupted buffer",
            _ if actual.swap_bytes() == expected => "byte order (endianness) mismatch",
            _ => "data corruption or foreign protocol",
        };

        Self::InvalidMagic {
            expected,
            actual,
            diagnosis: diagnosis.to_string(),
        }
    }

    /// Checksum mismatch error with a guess at the cause
    pub fn checksum_mismatch(expected: u32, calculated: u32, payload_size: usize) -> Self {
        let likely_cause = if expected == 0 && payload_size > 0 {
            "frame built without checksum calculation"
        } else {
            "data corruption during transmission"
        };

        Self::ChecksumMismatch {
            expected,
            calculated,
            payload_size,
            likely_cause: likely_cause.to_string(),
        }
    }

    /// Invalid payload error
    pub fn invalid_payload(message_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message_type: message_type.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error means the stream can no longer be trusted
    pub fn is_fatal_for_connection(&self) -> bool {
        !matches!(self, Self::UnknownMessageType(_) | Self::InvalidPayload { .. })
    }
}

/// Result type for codec operations
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;
