//! Error types for codec operations.

use std::fmt;

use dataio::StreamError;
use schema::{PacketType, SchemaError};
use thiserror::Error;
use wire::WireError;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding packets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Malformed or truncated packet body.
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    /// Framing error.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Registry validation error.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Packet type is not in the registry.
    #[error("unknown packet type {packet_type}")]
    UnknownPacket { packet_type: PacketType },

    /// No variant predicate matched the negotiated capabilities.
    #[error("packet {packet_type} ({name}): no variant matches the negotiated capabilities")]
    NoMatchingVariant {
        packet_type: PacketType,
        name: String,
    },

    /// Message does not have one value per declared field.
    #[error("packet {packet_type}: message has {actual} fields, expected {expected}")]
    FieldCountMismatch {
        packet_type: PacketType,
        expected: usize,
        actual: usize,
    },

    /// A field value cannot be encoded, or a decoded value is invalid.
    #[error("packet {packet_type} field {field:?}: {reason}")]
    InvalidValue {
        packet_type: PacketType,
        field: String,
        reason: ValueReason,
    },

    /// Limits exceeded.
    #[error("{kind} limit exceeded: {actual} > {limit}")]
    LimitsExceeded {
        kind: LimitKind,
        limit: usize,
        actual: usize,
    },

    /// Body had unread bytes after the last field.
    #[error("packet {packet_type}: {remaining} trailing bytes after body")]
    TrailingBytes {
        packet_type: PacketType,
        remaining: usize,
    },
}

/// Specific limit that was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    ArrayLen,
    StringLen,
    BodyBytes,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ArrayLen => "array length",
            Self::StringLen => "string length",
            Self::BodyBytes => "body bytes",
        };
        write!(f, "{name}")
    }
}

/// Details for invalid value errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueReason {
    #[error("expected {expected} but got {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("{0}")]
    Unencodable(StreamError),

    #[error("scaled float does not fit in {bytes} bytes")]
    FloatOutOfRange { bytes: u8 },

    #[error("expected {expected} bytes, got {actual}")]
    BytesLength { expected: usize, actual: usize },

    #[error("array holds {actual} elements, expected {expected}")]
    ArrayLength { expected: usize, actual: usize },

    #[error("array length {len} exceeds maximum {max}")]
    ArrayTooLong { len: u64, max: u16 },

    #[error("sparse index {index} outside array of {len} elements")]
    SparseIndexOutOfRange { index: usize, len: usize },
}
