//! Error types for byte-stream operations.

use thiserror::Error;

/// Result type for byte-stream operations.
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors that can occur while reading or writing primitive values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Attempted to read past the end of the buffer.
    #[error("attempted to read {requested} bytes but only {available} bytes available")]
    UnexpectedEof {
        /// Number of bytes requested.
        requested: usize,
        /// Number of bytes available.
        available: usize,
    },

    /// Integer width is not one of the supported sizes (1, 2 or 4 bytes).
    #[error("invalid integer width {bytes}, expected 1, 2 or 4 bytes")]
    InvalidWidth { bytes: usize },

    /// Unsigned value does not fit the requested width.
    #[error("value {value} cannot be represented in {bytes} bytes")]
    ValueOutOfRange { value: u64, bytes: usize },

    /// Signed value does not fit the requested width.
    #[error("signed value {value} cannot be represented in {bytes} bytes")]
    SignedOutOfRange { value: i64, bytes: usize },

    /// String exceeds its declared maximum (terminator included).
    #[error("string of {len} bytes exceeds maximum of {max_len}")]
    StringTooLong { len: usize, max_len: usize },

    /// String contains an interior NUL and cannot be terminated.
    #[error("string contains an interior NUL byte")]
    InteriorNul,

    /// No NUL terminator found within the declared maximum.
    #[error("string not terminated within {max_len} bytes")]
    UnterminatedString { max_len: usize },

    /// String bytes are not valid UTF-8.
    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    /// Boolean byte was neither 0 nor 1.
    #[error("invalid boolean byte {value}")]
    InvalidBool { value: u8 },

    /// Bit vector storage does not match its declared bit count.
    #[error("bit vector of {actual} bytes does not hold {bits} bits")]
    BitVectorSize { bits: usize, actual: usize },
}
