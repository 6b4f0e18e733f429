//! Limits for codec-level encoding and decoding.

/// Codec-specific limits enforced on every packet body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecLimits {
    /// Maximum number of elements in one array field.
    pub max_array_len: usize,
    /// Maximum string length in bytes, terminator included. Applies to
    /// strings declared longer, on encode and decode alike.
    pub max_string_len: usize,
    /// Maximum number of bytes in a packet body.
    pub max_body_bytes: usize,
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self {
            max_array_len: 4096,
            max_string_len: 4096,
            max_body_bytes: 60 * 1024,
        }
    }
}

impl CodecLimits {
    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_array_len: 256,
            max_string_len: 256,
            max_body_bytes: 1024,
        }
    }

    /// Creates limits with no restrictions (use with caution).
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_array_len: usize::MAX,
            max_string_len: usize::MAX,
            max_body_bytes: usize::MAX,
        }
    }
}
