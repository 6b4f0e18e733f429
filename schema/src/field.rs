//! Field codec definitions.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The wire encoding of a field (representation only).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FieldCodec {
    /// Boolean, one byte on the wire unless folded into the bitmap.
    Bool,

    /// Unsigned integer of 1, 2 or 4 bytes.
    UInt { bytes: u8 },

    /// Signed integer of 1, 2 or 4 bytes.
    SInt { bytes: u8 },

    /// Float sent as `round(value * factor)` in a signed integer of `bytes`.
    Float { bytes: u8, factor: u32 },

    /// NUL-terminated string; `max_len` includes the terminator.
    String { max_len: u16 },

    /// Fixed-size bit vector of `bits` bits.
    BitVector { bits: u16 },

    /// Opaque block of exactly `len` bytes.
    Bytes { len: u16 },

    /// Array of scalar elements.
    ///
    /// Sparse arrays only carry the indices whose element changed, followed
    /// by a sentinel index.
    Array {
        element: Box<FieldCodec>,
        len: ArrayLen,
        sparse: bool,
    },
}

/// How many elements an array field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ArrayLen {
    /// Always exactly this many elements.
    Fixed(u16),
    /// As many elements as the value of an earlier unsigned field, at most `max`.
    Field { field: usize, max: u16 },
}

impl FieldCodec {
    #[must_use]
    pub const fn bool() -> Self {
        Self::Bool
    }

    #[must_use]
    pub const fn uint(bytes: u8) -> Self {
        Self::UInt { bytes }
    }

    #[must_use]
    pub const fn sint(bytes: u8) -> Self {
        Self::SInt { bytes }
    }

    #[must_use]
    pub const fn float(bytes: u8, factor: u32) -> Self {
        Self::Float { bytes, factor }
    }

    #[must_use]
    pub const fn string(max_len: u16) -> Self {
        Self::String { max_len }
    }

    #[must_use]
    pub const fn bitvector(bits: u16) -> Self {
        Self::BitVector { bits }
    }

    #[must_use]
    pub const fn bytes(len: u16) -> Self {
        Self::Bytes { len }
    }

    /// Dense array with a fixed element count.
    #[must_use]
    pub fn array(element: Self, len: u16) -> Self {
        Self::Array {
            element: Box::new(element),
            len: ArrayLen::Fixed(len),
            sparse: false,
        }
    }

    /// Dense array whose element count is the value of field `field`.
    #[must_use]
    pub fn array_sized_by(element: Self, field: usize, max: u16) -> Self {
        Self::Array {
            element: Box::new(element),
            len: ArrayLen::Field { field, max },
            sparse: false,
        }
    }

    /// Sparse array with a fixed element count.
    #[must_use]
    pub fn sparse_array(element: Self, len: u16) -> Self {
        Self::Array {
            element: Box::new(element),
            len: ArrayLen::Fixed(len),
            sparse: true,
        }
    }

    /// Returns `true` for integer codecs usable as identity keys.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(self, Self::UInt { .. } | Self::SInt { .. })
    }

    /// Short name of the codec kind, used in diagnostics.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::UInt { .. } => "uint",
            Self::SInt { .. } => "sint",
            Self::Float { .. } => "float",
            Self::String { .. } => "string",
            Self::BitVector { .. } => "bitvector",
            Self::Bytes { .. } => "bytes",
            Self::Array { .. } => "array",
        }
    }
}

/// Field definition within a packet.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FieldDef {
    pub name: String,
    pub codec: FieldCodec,
    /// Part of the identity key; always sent, never covered by the bitmap.
    #[cfg_attr(feature = "serde", serde(default))]
    pub key: bool,
    /// Boolean carried by its own bitmap bit instead of a payload byte.
    #[cfg_attr(feature = "serde", serde(default))]
    pub folded: bool,
}

impl FieldDef {
    #[must_use]
    pub fn new(name: impl Into<String>, codec: FieldCodec) -> Self {
        Self {
            name: name.into(),
            codec,
            key: false,
            folded: false,
        }
    }

    /// Marks the field as part of the identity key.
    #[must_use]
    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }

    /// Folds a boolean field into the changed-field bitmap.
    #[must_use]
    pub fn folded(mut self) -> Self {
        self.folded = true;
        self
    }
}
