//! Packet registry and field codec definitions for the netdelta codec.
//!
//! This crate describes what travels on the wire, not how it is diffed:
//! - Field codecs (integers, scaled floats, strings, bit vectors, arrays)
//! - Packet definitions with identity keys, folded booleans and variants
//! - Capability strings and the predicates that select variants
//! - Deterministic registry hashing
//!
//! # Design Principles
//!
//! - **Packets are data** - A packet type is a list of field descriptors; one
//!   generic engine encodes all of them.
//! - **Validated once** - A [`Registry`] only exists if every definition in it
//!   is consistent.
//! - **Deterministic hashing** - The registry hash is stable given the same
//!   wire layout.

mod capability;
mod error;
mod field;
mod hash;
mod packet;
mod registry;

pub use capability::{CapPredicate, Capabilities, NegotiatedCaps};
pub use error::{SchemaError, SchemaResult};
pub use field::{ArrayLen, FieldCodec, FieldDef};
pub use hash::registry_hash;
pub use packet::{
    DeltaMode, Direction, HookPoints, PacketDef, PacketType, VariantDef, VariantField, VariantId,
};
pub use registry::{Registry, RegistryBuilder, MAX_SPARSE_LEN};
