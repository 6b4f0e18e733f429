//! Deterministic registry hashing.

use blake3::Hasher;

use crate::capability::CapPredicate;
use crate::field::{ArrayLen, FieldCodec};
use crate::packet::{DeltaMode, Direction, PacketDef};
use crate::registry::Registry;

/// Computes a deterministic fingerprint of the registry layout.
///
/// Peers exchange it to detect mismatched packet definitions. Field names do
/// not contribute; everything that changes the bytes on the wire does.
#[must_use]
pub fn registry_hash(registry: &Registry) -> u64 {
    let mut hasher = Hasher::new();
    write_len(&mut hasher, registry.len());
    for packet in registry.iter() {
        write_packet(&mut hasher, packet);
    }

    let hash = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(prefix)
}

fn write_packet(hasher: &mut Hasher, packet: &PacketDef) {
    write_u16(hasher, packet.packet_type.raw());
    write_u8(
        hasher,
        match packet.direction {
            Direction::ClientToServer => 0,
            Direction::ServerToClient => 1,
            Direction::Both => 2,
        },
    );
    write_u8(
        hasher,
        match packet.delta {
            DeltaMode::Delta => 0,
            DeltaMode::NoDelta => 1,
        },
    );
    write_bool(hasher, packet.force_full);

    write_len(hasher, packet.fields.len());
    for field in &packet.fields {
        write_codec(hasher, &field.codec);
        write_bool(hasher, field.key);
        write_bool(hasher, field.folded);
    }

    write_len(hasher, packet.variants.len());
    for variant in &packet.variants {
        write_u16(hasher, variant.id);
        write_predicate(hasher, &variant.condition);
        write_len(hasher, variant.fields.len());
        for vf in &variant.fields {
            write_len(hasher, vf.field);
            match &vf.codec {
                Some(codec) => {
                    write_u8(hasher, 1);
                    write_codec(hasher, codec);
                }
                None => write_u8(hasher, 0),
            }
        }
    }

    write_len(hasher, packet.cancels.len());
    for cancelled in &packet.cancels {
        write_u16(hasher, cancelled.raw());
    }
}

fn write_codec(hasher: &mut Hasher, codec: &FieldCodec) {
    match codec {
        FieldCodec::Bool => write_u8(hasher, 0),
        FieldCodec::UInt { bytes } => {
            write_u8(hasher, 1);
            write_u8(hasher, *bytes);
        }
        FieldCodec::SInt { bytes } => {
            write_u8(hasher, 2);
            write_u8(hasher, *bytes);
        }
        FieldCodec::Float { bytes, factor } => {
            write_u8(hasher, 3);
            write_u8(hasher, *bytes);
            write_u32(hasher, *factor);
        }
        FieldCodec::String { max_len } => {
            write_u8(hasher, 4);
            write_u16(hasher, *max_len);
        }
        FieldCodec::BitVector { bits } => {
            write_u8(hasher, 5);
            write_u16(hasher, *bits);
        }
        FieldCodec::Bytes { len } => {
            write_u8(hasher, 6);
            write_u16(hasher, *len);
        }
        FieldCodec::Array {
            element,
            len,
            sparse,
        } => {
            write_u8(hasher, 7);
            write_codec(hasher, element);
            match len {
                ArrayLen::Fixed(n) => {
                    write_u8(hasher, 0);
                    write_u16(hasher, *n);
                }
                ArrayLen::Field { field, max } => {
                    write_u8(hasher, 1);
                    write_len(hasher, *field);
                    write_u16(hasher, *max);
                }
            }
            write_bool(hasher, *sparse);
        }
    }
}

fn write_predicate(hasher: &mut Hasher, predicate: &CapPredicate) {
    match predicate {
        CapPredicate::Always => write_u8(hasher, 0),
        CapPredicate::Has(flag) => {
            write_u8(hasher, 1);
            write_str(hasher, flag);
        }
        CapPredicate::LocalHas(flag) => {
            write_u8(hasher, 2);
            write_str(hasher, flag);
        }
        CapPredicate::PeerHas(flag) => {
            write_u8(hasher, 3);
            write_str(hasher, flag);
        }
        CapPredicate::Not(inner) => {
            write_u8(hasher, 4);
            write_predicate(hasher, inner);
        }
        CapPredicate::All(all) => {
            write_u8(hasher, 5);
            write_len(hasher, all.len());
            for p in all {
                write_predicate(hasher, p);
            }
        }
        CapPredicate::Any(any) => {
            write_u8(hasher, 6);
            write_len(hasher, any.len());
            for p in any {
                write_predicate(hasher, p);
            }
        }
    }
}

fn write_u8(hasher: &mut Hasher, value: u8) {
    hasher.update(&[value]);
}

fn write_bool(hasher: &mut Hasher, value: bool) {
    write_u8(hasher, u8::from(value));
}

fn write_u16(hasher: &mut Hasher, value: u16) {
    hasher.update(&value.to_le_bytes());
}

fn write_u32(hasher: &mut Hasher, value: u32) {
    hasher.update(&value.to_le_bytes());
}

fn write_len(hasher: &mut Hasher, len: usize) {
    hasher.update(&(len as u64).to_le_bytes());
}

fn write_str(hasher: &mut Hasher, value: &str) {
    write_len(hasher, value.len());
    hasher.update(value.as_bytes());
}
