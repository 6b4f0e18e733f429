//! Field values, message instances and identity keys.

use schema::{ArrayLen, FieldCodec, PacketDef};

use crate::error::{CodecError, CodecResult, ValueReason};

/// A field value in decoded form.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    UInt(u64),
    SInt(i64),
    /// Unscaled value of a `Float` field.
    Float(f64),
    String(String),
    /// Bit vector storage, `ceil(bits / 8)` bytes, LSB first.
    BitVector(Vec<u8>),
    Bytes(Vec<u8>),
    Array(Vec<FieldValue>),
}

impl FieldValue {
    /// The all-zero value for `codec`.
    ///
    /// Arrays sized by another field start empty.
    #[must_use]
    pub fn zeroed(codec: &FieldCodec) -> Self {
        match codec {
            FieldCodec::Bool => Self::Bool(false),
            FieldCodec::UInt { .. } => Self::UInt(0),
            FieldCodec::SInt { .. } => Self::SInt(0),
            FieldCodec::Float { .. } => Self::Float(0.0),
            FieldCodec::String { .. } => Self::String(String::new()),
            FieldCodec::BitVector { bits } => {
                Self::BitVector(vec![0; usize::from(*bits).div_ceil(8)])
            }
            FieldCodec::Bytes { len } => Self::Bytes(vec![0; usize::from(*len)]),
            FieldCodec::Array { element, len, .. } => match len {
                ArrayLen::Fixed(n) => {
                    Self::Array(vec![Self::zeroed(element); usize::from(*n)])
                }
                ArrayLen::Field { .. } => Self::Array(Vec::new()),
            },
        }
    }

    /// Short name of the value kind, matching [`FieldCodec::kind_name`].
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::UInt(_) => "uint",
            Self::SInt(_) => "sint",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::BitVector(_) => "bitvector",
            Self::Bytes(_) => "bytes",
            Self::Array(_) => "array",
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_uint(&self) -> Option<u64> {
        match self {
            Self::UInt(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_sint(&self) -> Option<i64> {
        match self {
            Self::SInt(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[Self]> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

macro_rules! from_unsigned {
    ($($ty:ty),*) => {
        $(impl From<$ty> for FieldValue {
            fn from(value: $ty) -> Self {
                Self::UInt(u64::from(value))
            }
        })*
    };
}

macro_rules! from_signed {
    ($($ty:ty),*) => {
        $(impl From<$ty> for FieldValue {
            fn from(value: $ty) -> Self {
                Self::SInt(i64::from(value))
            }
        })*
    };
}

from_unsigned!(u8, u16, u32, u64);
from_signed!(i8, i16, i32, i64);

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// One instance of a packet: a value per field, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    values: Vec<FieldValue>,
}

impl Message {
    #[must_use]
    pub fn new(values: Vec<FieldValue>) -> Self {
        Self { values }
    }

    /// The all-zero instance of `def`.
    #[must_use]
    pub fn zeroed(def: &PacketDef) -> Self {
        Self {
            values: def
                .fields
                .iter()
                .map(|f| FieldValue::zeroed(&f.codec))
                .collect(),
        }
    }

    #[must_use]
    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Vec<FieldValue> {
        self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn get(&self, field: usize) -> Option<&FieldValue> {
        self.values.get(field)
    }

    /// Replaces the value of field `field`, returning the previous value.
    pub fn set(&mut self, field: usize, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.values
            .get_mut(field)
            .map(|slot| std::mem::replace(slot, value.into()))
    }

    /// Builder form of [`set`](Self::set); out-of-range indices are ignored.
    #[must_use]
    pub fn with(mut self, field: usize, value: impl Into<FieldValue>) -> Self {
        self.set(field, value);
        self
    }

    #[must_use]
    pub fn get_named(&self, def: &PacketDef, name: &str) -> Option<&FieldValue> {
        def.field_index(name).and_then(|idx| self.get(idx))
    }

    /// Sets a field by name. Returns `false` if `def` has no such field.
    pub fn set_named(&mut self, def: &PacketDef, name: &str, value: impl Into<FieldValue>) -> bool {
        match def.field_index(name) {
            Some(idx) => self.set(idx, value).is_some(),
            None => false,
        }
    }

    pub(crate) fn slot_mut(&mut self, field: usize) -> Option<&mut FieldValue> {
        self.values.get_mut(field)
    }
}

/// One integer component of an identity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    UInt(u64),
    SInt(i64),
}

/// Identity key of a message instance: the values of its key fields.
///
/// Packets without key fields share the single [`MessageKey::singleton`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MessageKey(Vec<KeyPart>);

impl MessageKey {
    #[must_use]
    pub const fn singleton() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn new(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }

    /// Key with one unsigned part, the common case.
    #[must_use]
    pub fn uint(value: u64) -> Self {
        Self(vec![KeyPart::UInt(value)])
    }

    #[must_use]
    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.0.is_empty()
    }

    /// Extracts the key of `message` according to the key fields of `def`.
    pub fn from_message(def: &PacketDef, message: &Message) -> CodecResult<Self> {
        let mut parts = Vec::new();
        for idx in def.key_fields() {
            let part = match message.get(idx) {
                Some(FieldValue::UInt(v)) => KeyPart::UInt(*v),
                Some(FieldValue::SInt(v)) => KeyPart::SInt(*v),
                other => {
                    return Err(CodecError::InvalidValue {
                        packet_type: def.packet_type,
                        field: def.fields[idx].name.clone(),
                        reason: ValueReason::TypeMismatch {
                            expected: def.fields[idx].codec.kind_name(),
                            found: other.map_or("nothing", FieldValue::kind_name),
                        },
                    })
                }
            };
            parts.push(part);
        }
        Ok(Self(parts))
    }
}

impl std::fmt::Display for MessageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return f.write_str("()");
        }
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match part {
                KeyPart::UInt(v) => write!(f, "{v}")?,
                KeyPart::SInt(v) => write!(f, "{v}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::FieldDef;

    fn player_info() -> PacketDef {
        PacketDef::new(51, "player_info")
            .field(FieldDef::new("playerno", FieldCodec::uint(1)).key())
            .field(FieldDef::new("name", FieldCodec::string(48)))
            .field(FieldDef::new("gold", FieldCodec::uint(4)))
            .field(FieldDef::new("flags", FieldCodec::bitvector(10)))
            .field(FieldDef::new("love", FieldCodec::array(FieldCodec::sint(1), 3)))
            .field(FieldDef::new("tax", FieldCodec::float(2, 100)))
    }

    #[test]
    fn zeroed_message_matches_codecs() {
        let msg = Message::zeroed(&player_info());
        assert_eq!(msg.len(), 6);
        assert_eq!(msg.get(0), Some(&FieldValue::UInt(0)));
        assert_eq!(msg.get(1), Some(&FieldValue::String(String::new())));
        assert_eq!(msg.get(3), Some(&FieldValue::BitVector(vec![0, 0])));
        assert_eq!(
            msg.get(4),
            Some(&FieldValue::Array(vec![FieldValue::SInt(0); 3]))
        );
        assert_eq!(msg.get(5), Some(&FieldValue::Float(0.0)));
    }

    #[test]
    fn zeroed_sized_array_is_empty() {
        let codec = FieldCodec::array_sized_by(FieldCodec::uint(2), 0, 16);
        assert_eq!(FieldValue::zeroed(&codec), FieldValue::Array(Vec::new()));
    }

    #[test]
    fn set_and_get_by_name() {
        let def = player_info();
        let mut msg = Message::zeroed(&def).with(0, 3u8);
        assert!(msg.set_named(&def, "gold", 250u32));
        assert!(!msg.set_named(&def, "missing", 1u8));
        assert_eq!(msg.get_named(&def, "gold").and_then(FieldValue::as_uint), Some(250));
        assert_eq!(msg.set(1, "Hammurabi"), Some(FieldValue::String(String::new())));
        assert_eq!(msg.get(1).and_then(FieldValue::as_str), Some("Hammurabi"));
        assert_eq!(msg.set(99, true), None);
    }

    #[test]
    fn value_conversions() {
        assert_eq!(FieldValue::from(7u16), FieldValue::UInt(7));
        assert_eq!(FieldValue::from(-7i8), FieldValue::SInt(-7));
        assert_eq!(FieldValue::from(1.5), FieldValue::Float(1.5));
        assert_eq!(FieldValue::from(true).as_bool(), Some(true));
        assert_eq!(FieldValue::SInt(-2).as_sint(), Some(-2));
        assert_eq!(FieldValue::UInt(2).as_sint(), None);
        assert_eq!(FieldValue::Float(0.25).as_float(), Some(0.25));
        assert_eq!(FieldValue::Array(vec![]).as_array().map(<[_]>::len), Some(0));
    }

    #[test]
    fn key_from_message() {
        let def = player_info();
        let msg = Message::zeroed(&def).with(0, 4u8);
        let key = MessageKey::from_message(&def, &msg).unwrap();
        assert_eq!(key, MessageKey::uint(4));
        assert_eq!(key.to_string(), "4");
    }

    #[test]
    fn key_rejects_wrong_kind() {
        let def = player_info();
        let msg = Message::zeroed(&def).with(0, "four");
        let err = MessageKey::from_message(&def, &msg).unwrap_err();
        assert!(matches!(err, CodecError::InvalidValue { .. }));
    }

    #[test]
    fn keyless_packets_use_singleton() {
        let def = PacketDef::new(16, "game_info").field(FieldDef::new("turn", FieldCodec::uint(2)));
        let key = MessageKey::from_message(&def, &Message::zeroed(&def)).unwrap();
        assert!(key.is_singleton());
        assert_eq!(key, MessageKey::singleton());
        assert_eq!(key.to_string(), "()");
    }

    #[test]
    fn composite_keys_order_parts() {
        let key = MessageKey::new(vec![KeyPart::UInt(1), KeyPart::SInt(-3)]);
        assert_eq!(key.parts().len(), 2);
        assert_eq!(key.to_string(), "1,-3");
    }
}
