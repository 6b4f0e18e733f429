//! Validated packet registry.

use std::collections::{BTreeMap, HashSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::capability::CapPredicate;
use crate::error::{SchemaError, SchemaResult};
use crate::field::{ArrayLen, FieldCodec, FieldDef};
use crate::packet::{PacketDef, PacketType, VariantDef, VariantId};

/// Largest sparse array: the top index value is reserved as the sentinel.
pub const MAX_SPARSE_LEN: u16 = u16::MAX - 1;

/// Collection of packet definitions keyed by packet type.
///
/// Every definition has passed validation, and every packet carries at least
/// one variant. Variant fields are kept in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "RegistrySpec", into = "RegistrySpec")
)]
pub struct Registry {
    packets: BTreeMap<PacketType, PacketDef>,
}

impl Registry {
    /// Creates a registry from packet definitions after validation.
    pub fn new(packets: Vec<PacketDef>) -> SchemaResult<Self> {
        let mut map = BTreeMap::new();
        for packet in packets {
            let packet_type = packet.packet_type;
            if map.insert(packet_type, normalize(packet)).is_some() {
                return Err(SchemaError::DuplicatePacketType { packet_type });
            }
        }
        let registry = Self { packets: map };
        registry.validate()?;
        Ok(registry)
    }

    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    #[must_use]
    pub fn get(&self, packet_type: PacketType) -> Option<&PacketDef> {
        self.packets.get(&packet_type)
    }

    /// Looks a packet up by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&PacketDef> {
        self.packets.values().find(|p| p.name == name)
    }

    /// Packet definitions in ascending packet type order.
    pub fn iter(&self) -> impl Iterator<Item = &PacketDef> {
        self.packets.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Returns `true` if any packet type needs the wide frame header.
    #[must_use]
    pub fn needs_wide_types(&self) -> bool {
        self.packets.keys().any(|ty| ty.raw() > u16::from(u8::MAX))
    }

    fn validate(&self) -> SchemaResult<()> {
        for packet in self.packets.values() {
            validate_packet(packet)?;
            for &cancelled in &packet.cancels {
                if !self.packets.contains_key(&cancelled) {
                    return Err(SchemaError::UnknownCancelledPacket {
                        packet_type: packet.packet_type,
                        cancelled,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Builder for `Registry`.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    packets: Vec<PacketDef>,
}

impl RegistryBuilder {
    /// Adds a packet definition.
    #[must_use]
    pub fn packet(mut self, packet: PacketDef) -> Self {
        self.packets.push(packet);
        self
    }

    /// Builds the registry after validation.
    pub fn build(self) -> SchemaResult<Registry> {
        Registry::new(self.packets)
    }
}

#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct RegistrySpec {
    #[serde(default)]
    packets: Vec<PacketDef>,
}

#[cfg(feature = "serde")]
impl TryFrom<RegistrySpec> for Registry {
    type Error = SchemaError;

    fn try_from(spec: RegistrySpec) -> SchemaResult<Self> {
        Self::new(spec.packets)
    }
}

#[cfg(feature = "serde")]
impl From<Registry> for RegistrySpec {
    fn from(registry: Registry) -> Self {
        Self {
            packets: registry.packets.into_values().collect(),
        }
    }
}

fn normalize(mut packet: PacketDef) -> PacketDef {
    if packet.variants.is_empty() {
        let implicit = VariantDef::all_fields(0, CapPredicate::Always, &packet);
        packet.variants.push(implicit);
    }
    for variant in &mut packet.variants {
        variant.fields.sort_by_key(|vf| vf.field);
    }
    packet
}

fn validate_packet(packet: &PacketDef) -> SchemaResult<()> {
    let packet_type = packet.packet_type;

    let mut names = HashSet::new();
    for (idx, field) in packet.fields.iter().enumerate() {
        if !names.insert(field.name.as_str()) {
            return Err(SchemaError::DuplicateFieldName {
                packet_type,
                name: field.name.clone(),
            });
        }
        validate_codec(packet, idx, &field.codec)?;
        validate_flags(packet, idx, field)?;
    }

    let mut ids = HashSet::new();
    for variant in &packet.variants {
        if !ids.insert(variant.id) {
            return Err(SchemaError::DuplicateVariantId {
                packet_type,
                variant: variant.id,
            });
        }
        validate_variant(packet, variant)?;
    }
    Ok(())
}

fn validate_flags(packet: &PacketDef, idx: usize, field: &FieldDef) -> SchemaResult<()> {
    let packet_type = packet.packet_type;
    if field.key && !field.codec.is_integer() {
        return Err(SchemaError::InvalidKeyField {
            packet_type,
            field: idx,
        });
    }
    if field.folded {
        if field.key || field.codec != FieldCodec::Bool {
            return Err(SchemaError::InvalidFoldedField {
                packet_type,
                field: idx,
            });
        }
        if !packet.is_delta() {
            return Err(SchemaError::FoldedWithoutDelta {
                packet_type,
                field: idx,
            });
        }
    }
    Ok(())
}

fn validate_codec(packet: &PacketDef, idx: usize, codec: &FieldCodec) -> SchemaResult<()> {
    let packet_type = packet.packet_type;
    match codec {
        FieldCodec::UInt { bytes } | FieldCodec::SInt { bytes } => check_width(packet_type, idx, *bytes),
        FieldCodec::Float { bytes, factor } => {
            check_width(packet_type, idx, *bytes)?;
            if *factor == 0 {
                return Err(SchemaError::InvalidFloatFactor {
                    packet_type,
                    field: idx,
                });
            }
            Ok(())
        }
        FieldCodec::String { max_len } => {
            if *max_len == 0 {
                return Err(SchemaError::InvalidStringLength {
                    packet_type,
                    field: idx,
                });
            }
            Ok(())
        }
        FieldCodec::Bool | FieldCodec::BitVector { .. } | FieldCodec::Bytes { .. } => Ok(()),
        FieldCodec::Array {
            element,
            len,
            sparse,
        } => {
            if matches!(**element, FieldCodec::Array { .. }) {
                return Err(SchemaError::NestedArray {
                    packet_type,
                    field: idx,
                });
            }
            validate_codec(packet, idx, element)?;
            match (*len, *sparse) {
                (ArrayLen::Fixed(n), true) if n > MAX_SPARSE_LEN => {
                    Err(SchemaError::SparseArrayTooLong {
                        packet_type,
                        field: idx,
                        len: n,
                        max: MAX_SPARSE_LEN,
                    })
                }
                (ArrayLen::Field { .. }, true) => Err(SchemaError::SparseArrayNeedsFixedLength {
                    packet_type,
                    field: idx,
                }),
                (ArrayLen::Field { field: length_field, .. }, false) => {
                    let valid = length_field < idx
                        && matches!(
                            packet.fields.get(length_field).map(|f| &f.codec),
                            Some(FieldCodec::UInt { .. })
                        );
                    if valid {
                        Ok(())
                    } else {
                        Err(SchemaError::InvalidArrayLength {
                            packet_type,
                            field: idx,
                            length_field,
                        })
                    }
                }
                (ArrayLen::Fixed(_), _) => Ok(()),
            }
        }
    }
}

fn check_width(packet_type: PacketType, field: usize, bytes: u8) -> SchemaResult<()> {
    if matches!(bytes, 1 | 2 | 4) {
        Ok(())
    } else {
        Err(SchemaError::InvalidIntegerWidth {
            packet_type,
            field,
            bytes,
        })
    }
}

fn validate_variant(packet: &PacketDef, variant: &VariantDef) -> SchemaResult<()> {
    let packet_type = packet.packet_type;
    let id: VariantId = variant.id;

    let mut seen = HashSet::new();
    for vf in &variant.fields {
        let Some(field) = packet.fields.get(vf.field) else {
            return Err(SchemaError::UnknownVariantField {
                packet_type,
                variant: id,
                field: vf.field,
            });
        };
        if !seen.insert(vf.field) {
            return Err(SchemaError::DuplicateVariantField {
                packet_type,
                variant: id,
                field: vf.field,
            });
        }

        let codec = match &vf.codec {
            Some(codec) => {
                if codec.kind_name() != field.codec.kind_name() {
                    return Err(SchemaError::OverrideChangesKind {
                        packet_type,
                        variant: id,
                        field: vf.field,
                    });
                }
                validate_codec(packet, vf.field, codec)?;
                codec
            }
            None => &field.codec,
        };

        if let FieldCodec::Array {
            len: ArrayLen::Field { field: length_field, .. },
            ..
        } = codec
        {
            if !variant.carries(*length_field) {
                return Err(SchemaError::ArrayLengthNotInVariant {
                    packet_type,
                    variant: id,
                    field: vf.field,
                    length_field: *length_field,
                });
            }
        }
    }

    if let Some(missing) = packet.key_fields().find(|&k| !variant.carries(k)) {
        return Err(SchemaError::KeyFieldMissingFromVariant {
            packet_type,
            variant: id,
            field: missing,
        });
    }
    Ok(())
}
