//! Frame layout: `[length: u16][packet type: u8 | u16][body]`.

use crate::error::{WireError, WireResult};
use crate::limits::Limits;

/// Size of the big-endian length prefix. The length counts the whole frame.
pub const LENGTH_BYTES: usize = 2;

/// Largest frame the length prefix can describe.
pub const MAX_FRAME_BYTES: usize = u16::MAX as usize;

/// Width of the packet type field in the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TypeWidth {
    /// One byte; packet types 0..=255.
    #[default]
    Narrow,
    /// Two bytes, big-endian.
    Wide,
}

impl TypeWidth {
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::Narrow => 1,
            Self::Wide => 2,
        }
    }
}

/// Frame header layout negotiated for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HeaderLayout {
    pub type_width: TypeWidth,
}

impl HeaderLayout {
    /// Layout with a one-byte packet type.
    #[must_use]
    pub const fn narrow() -> Self {
        Self {
            type_width: TypeWidth::Narrow,
        }
    }

    /// Layout with a two-byte packet type.
    #[must_use]
    pub const fn wide() -> Self {
        Self {
            type_width: TypeWidth::Wide,
        }
    }

    /// Total header length in bytes.
    #[must_use]
    pub const fn header_len(self) -> usize {
        LENGTH_BYTES + self.type_width.bytes()
    }
}

/// A complete frame split off the inbound stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub packet_type: u16,
    pub body: Vec<u8>,
}

/// Appends one frame to `out` and returns the number of bytes appended.
///
/// Nothing is appended on error.
pub fn encode_frame(
    layout: HeaderLayout,
    packet_type: u16,
    body: &[u8],
    limits: &Limits,
    out: &mut Vec<u8>,
) -> WireResult<usize> {
    let total = layout.header_len() + body.len();
    let limit = limits.max_frame_bytes.min(MAX_FRAME_BYTES);
    if total > limit {
        return Err(WireError::FrameTooLarge {
            actual: total,
            limit,
        });
    }
    let len = u16::try_from(total).map_err(|_| WireError::FrameTooLarge {
        actual: total,
        limit,
    })?;

    match layout.type_width {
        TypeWidth::Narrow => {
            let ty = u8::try_from(packet_type).map_err(|_| WireError::TypeOutOfRange {
                packet_type,
                type_bytes: 1,
            })?;
            out.reserve(total);
            out.extend_from_slice(&len.to_be_bytes());
            out.push(ty);
        }
        TypeWidth::Wide => {
            out.reserve(total);
            out.extend_from_slice(&len.to_be_bytes());
            out.extend_from_slice(&packet_type.to_be_bytes());
        }
    }
    out.extend_from_slice(body);
    Ok(total)
}

/// Accumulates inbound bytes and yields complete frames in arrival order.
#[derive(Debug)]
pub struct FrameBuffer {
    layout: HeaderLayout,
    limits: Limits,
    pending: Vec<u8>,
}

impl FrameBuffer {
    #[must_use]
    pub fn new(layout: HeaderLayout, limits: Limits) -> Self {
        Self {
            layout,
            limits,
            pending: Vec::new(),
        }
    }

    /// Number of buffered bytes not yet returned as frames.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Appends transport bytes.
    pub fn push(&mut self, bytes: &[u8]) -> WireResult<()> {
        let actual = self.pending.len() + bytes.len();
        if actual > self.limits.max_buffered_bytes {
            return Err(WireError::BufferOverflow {
                actual,
                limit: self.limits.max_buffered_bytes,
            });
        }
        self.pending.extend_from_slice(bytes);
        Ok(())
    }

    /// Returns `true` if a complete frame is buffered.
    #[must_use]
    pub fn has_frame(&self) -> bool {
        self.declared_len()
            .is_some_and(|len| len <= self.pending.len())
    }

    /// Splits off the next complete frame, if any.
    ///
    /// A malformed length prefix is an error; the offending bytes stay
    /// buffered until [`clear`](Self::clear) is called.
    pub fn next_frame(&mut self) -> WireResult<Option<Frame>> {
        let Some(declared) = self.declared_len() else {
            return Ok(None);
        };
        let header_len = self.layout.header_len();
        if declared < header_len {
            return Err(WireError::FrameTooShort {
                declared,
                header_len,
            });
        }
        if declared > self.limits.max_frame_bytes {
            return Err(WireError::FrameTooLarge {
                actual: declared,
                limit: self.limits.max_frame_bytes,
            });
        }
        if self.pending.len() < declared {
            return Ok(None);
        }

        let packet_type = match self.layout.type_width {
            TypeWidth::Narrow => u16::from(self.pending[LENGTH_BYTES]),
            TypeWidth::Wide => {
                u16::from_be_bytes([self.pending[LENGTH_BYTES], self.pending[LENGTH_BYTES + 1]])
            }
        };
        let body = self.pending[header_len..declared].to_vec();
        self.pending.drain(..declared);
        Ok(Some(Frame { packet_type, body }))
    }

    /// Drops all buffered bytes.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    fn declared_len(&self) -> Option<usize> {
        match self.pending.as_slice() {
            [hi, lo, ..] => Some(usize::from(u16::from_be_bytes([*hi, *lo]))),
            _ => None,
        }
    }
}
