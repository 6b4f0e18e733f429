//! Error types for frame encoding and decoding.

use thiserror::Error;

/// Result type for wire operations.
pub type WireResult<T> = Result<T, WireError>;

/// Errors that can occur while framing packets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum WireError {
    /// Declared frame length is smaller than the frame header.
    #[error("frame length {declared} is shorter than the {header_len}-byte header")]
    FrameTooShort { declared: usize, header_len: usize },

    /// Frame exceeds the configured or protocol maximum.
    #[error("frame of {actual} bytes exceeds limit of {limit}")]
    FrameTooLarge { actual: usize, limit: usize },

    /// Inbound buffer would exceed its limit.
    #[error("inbound buffer of {actual} bytes exceeds limit of {limit}")]
    BufferOverflow { actual: usize, limit: usize },

    /// Packet type does not fit the header layout.
    #[error("packet type {packet_type} does not fit in {type_bytes} header bytes")]
    TypeOutOfRange { packet_type: u16, type_bytes: usize },
}
