//! Packet and variant definitions.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::capability::CapPredicate;
use crate::field::{FieldCodec, FieldDef};

/// Numeric packet type carried in the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct PacketType(u16);

impl PacketType {
    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl From<u16> for PacketType {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a wire layout within one packet type.
pub type VariantId = u16;

/// Which side may legitimately send a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Direction {
    ClientToServer,
    ServerToClient,
    #[default]
    Both,
}

impl Direction {
    #[must_use]
    pub const fn client_sends(self) -> bool {
        matches!(self, Self::ClientToServer | Self::Both)
    }

    #[must_use]
    pub const fn server_sends(self) -> bool {
        matches!(self, Self::ServerToClient | Self::Both)
    }
}

/// Whether a packet is delta-compressed against the per-key cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DeltaMode {
    /// Bitmap plus changed fields, diffed against the cache.
    #[default]
    Delta,
    /// Every field written in full; no bitmap, no cache.
    NoDelta,
}

/// Application hooks the engine invokes for a packet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HookPoints {
    /// Called with the outgoing value before it is diffed.
    #[cfg_attr(feature = "serde", serde(default))]
    pub pre_send: bool,
    /// Called with the merged value before it is returned.
    #[cfg_attr(feature = "serde", serde(default))]
    pub post_receive: bool,
}

/// A packet field as it appears in one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VariantField {
    /// Index into [`PacketDef::fields`].
    pub field: usize,
    /// Encoding override for this variant.
    #[cfg_attr(feature = "serde", serde(default))]
    pub codec: Option<FieldCodec>,
}

/// One wire layout of a packet, selected by capability predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VariantDef {
    pub id: VariantId,
    #[cfg_attr(feature = "serde", serde(default))]
    pub condition: CapPredicate,
    pub fields: Vec<VariantField>,
}

impl VariantDef {
    #[must_use]
    pub fn new(id: VariantId, condition: CapPredicate) -> Self {
        Self {
            id,
            condition,
            fields: Vec::new(),
        }
    }

    /// Variant carrying every field of `def` with its declared codec.
    #[must_use]
    pub fn all_fields(id: VariantId, condition: CapPredicate, def: &PacketDef) -> Self {
        Self {
            id,
            condition,
            fields: (0..def.fields.len())
                .map(|field| VariantField { field, codec: None })
                .collect(),
        }
    }

    /// Adds a field with its declared codec.
    #[must_use]
    pub fn field(mut self, field: usize) -> Self {
        self.fields.push(VariantField { field, codec: None });
        self
    }

    /// Adds a field with a variant-specific codec.
    #[must_use]
    pub fn field_as(mut self, field: usize, codec: FieldCodec) -> Self {
        self.fields.push(VariantField {
            field,
            codec: Some(codec),
        });
        self
    }

    /// Returns `true` if the variant carries master field `field`.
    #[must_use]
    pub fn carries(&self, field: usize) -> bool {
        self.fields.iter().any(|vf| vf.field == field)
    }
}

/// Declarative description of one packet type.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PacketDef {
    pub packet_type: PacketType,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub direction: Direction,
    #[cfg_attr(feature = "serde", serde(default))]
    pub delta: DeltaMode,
    /// Send even when nothing changed since the cached value.
    #[cfg_attr(feature = "serde", serde(default))]
    pub force_full: bool,
    pub fields: Vec<FieldDef>,
    /// Layouts in priority order; empty means one variant with all fields.
    #[cfg_attr(feature = "serde", serde(default))]
    pub variants: Vec<VariantDef>,
    /// Packet types whose cache entry with the same key this packet removes.
    #[cfg_attr(feature = "serde", serde(default))]
    pub cancels: Vec<PacketType>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub hooks: HookPoints,
}

impl PacketDef {
    #[must_use]
    pub fn new(packet_type: u16, name: impl Into<String>) -> Self {
        Self {
            packet_type: PacketType::new(packet_type),
            name: name.into(),
            direction: Direction::Both,
            delta: DeltaMode::Delta,
            force_full: false,
            fields: Vec::new(),
            variants: Vec::new(),
            cancels: Vec::new(),
            hooks: HookPoints::default(),
        }
    }

    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    #[must_use]
    pub fn no_delta(mut self) -> Self {
        self.delta = DeltaMode::NoDelta;
        self
    }

    #[must_use]
    pub fn force_full(mut self) -> Self {
        self.force_full = true;
        self
    }

    #[must_use]
    pub fn variant(mut self, variant: VariantDef) -> Self {
        self.variants.push(variant);
        self
    }

    #[must_use]
    pub fn cancels(mut self, packet_type: u16) -> Self {
        self.cancels.push(PacketType::new(packet_type));
        self
    }

    #[must_use]
    pub fn hooks(mut self, hooks: HookPoints) -> Self {
        self.hooks = hooks;
        self
    }

    /// Returns the index of the field named `name`.
    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Indices of the identity key fields, in declaration order.
    pub fn key_fields(&self) -> impl Iterator<Item = usize> + '_ {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.key)
            .map(|(idx, _)| idx)
    }

    #[must_use]
    pub fn is_keyed(&self) -> bool {
        self.fields.iter().any(|f| f.key)
    }

    #[must_use]
    pub const fn is_delta(&self) -> bool {
        matches!(self.delta, DeltaMode::Delta)
    }

    /// Returns the variant at priority position `index`.
    #[must_use]
    pub fn variant_at(&self, index: usize) -> Option<&VariantDef> {
        self.variants.get(index)
    }
}
