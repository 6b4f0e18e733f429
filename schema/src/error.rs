//! Registry validation errors.

use thiserror::Error;

use crate::packet::{PacketType, VariantId};

/// Result type for registry operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur when building or validating a registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("duplicate packet type {packet_type}")]
    DuplicatePacketType { packet_type: PacketType },

    #[error("packet {packet_type}: duplicate field name {name:?}")]
    DuplicateFieldName { packet_type: PacketType, name: String },

    #[error("packet {packet_type} field {field}: integer width {bytes} is not 1, 2 or 4")]
    InvalidIntegerWidth {
        packet_type: PacketType,
        field: usize,
        bytes: u8,
    },

    #[error("packet {packet_type} field {field}: float factor must be non-zero")]
    InvalidFloatFactor { packet_type: PacketType, field: usize },

    #[error("packet {packet_type} field {field}: string max_len must leave room for the terminator")]
    InvalidStringLength { packet_type: PacketType, field: usize },

    #[error("packet {packet_type} field {field}: key fields must be integers")]
    InvalidKeyField { packet_type: PacketType, field: usize },

    #[error("packet {packet_type} field {field}: only non-key bool fields can be folded")]
    InvalidFoldedField { packet_type: PacketType, field: usize },

    #[error("packet {packet_type} field {field}: folded fields need a delta packet")]
    FoldedWithoutDelta { packet_type: PacketType, field: usize },

    #[error("packet {packet_type} field {field}: length field {length_field} is not an earlier unsigned field")]
    InvalidArrayLength {
        packet_type: PacketType,
        field: usize,
        length_field: usize,
    },

    #[error("packet {packet_type} variant {variant}: array field {field} needs its length field {length_field}")]
    ArrayLengthNotInVariant {
        packet_type: PacketType,
        variant: VariantId,
        field: usize,
        length_field: usize,
    },

    #[error("packet {packet_type} field {field}: sparse arrays need a fixed length")]
    SparseArrayNeedsFixedLength { packet_type: PacketType, field: usize },

    #[error("packet {packet_type} field {field}: sparse array of {len} elements exceeds {max}")]
    SparseArrayTooLong {
        packet_type: PacketType,
        field: usize,
        len: u16,
        max: u16,
    },

    #[error("packet {packet_type} field {field}: arrays cannot be nested")]
    NestedArray { packet_type: PacketType, field: usize },

    #[error("packet {packet_type} variant {variant}: unknown field index {field}")]
    UnknownVariantField {
        packet_type: PacketType,
        variant: VariantId,
        field: usize,
    },

    #[error("packet {packet_type} variant {variant}: field {field} listed twice")]
    DuplicateVariantField {
        packet_type: PacketType,
        variant: VariantId,
        field: usize,
    },

    #[error("packet {packet_type} variant {variant}: key field {field} missing")]
    KeyFieldMissingFromVariant {
        packet_type: PacketType,
        variant: VariantId,
        field: usize,
    },

    #[error("packet {packet_type}: duplicate variant id {variant}")]
    DuplicateVariantId {
        packet_type: PacketType,
        variant: VariantId,
    },

    #[error("packet {packet_type} variant {variant}: override of field {field} changes its kind")]
    OverrideChangesKind {
        packet_type: PacketType,
        variant: VariantId,
        field: usize,
    },

    #[error("packet {packet_type}: cancels unknown packet type {cancelled}")]
    UnknownCancelledPacket {
        packet_type: PacketType,
        cancelled: PacketType,
    },
}
