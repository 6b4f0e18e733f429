//! Configurable limits for bounded frame decoding.

use crate::frame::MAX_FRAME_BYTES;

/// Wire-level limits for frame buffering.
///
/// These limits are enforced while splitting inbound bytes into frames so a
/// misbehaving peer cannot grow the inbound buffer without bound. Body
/// parsing limits belong to the codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum size of one frame in bytes, header included.
    pub max_frame_bytes: usize,

    /// Maximum number of bytes buffered while waiting for complete frames.
    pub max_buffered_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_bytes: MAX_FRAME_BYTES,
            max_buffered_bytes: 256 * 1024,
        }
    }
}

impl Limits {
    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_frame_bytes: 1024,
            max_buffered_bytes: 4096,
        }
    }

    /// Creates limits bounded only by the frame length field.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_frame_bytes: MAX_FRAME_BYTES,
            max_buffered_bytes: usize::MAX,
        }
    }
}
