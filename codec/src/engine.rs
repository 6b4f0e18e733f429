//! Table-driven delta encoding and decoding of one packet body.
//!
//! Body layout of a delta packet:
//!
//! ```text
//! [key fields][bitmap: ceil(n / 8) bytes][set fields, declaration order]
//! ```
//!
//! `n` counts the non-key fields of the chosen variant. A folded boolean
//! carries its value in its bit and has no payload. No-delta packets write
//! the key fields followed by every other field, without a bitmap.

use dataio::{DataReader, DataWriter};
use schema::{ArrayLen, FieldCodec, FieldDef, PacketDef, SchemaError, VariantDef, MAX_SPARSE_LEN};
use tracing::trace;

use crate::bitmap::FieldBitmap;
use crate::error::{CodecError, CodecResult, LimitKind, ValueReason};
use crate::limits::CodecLimits;
use crate::value::{FieldValue, KeyPart, Message, MessageKey};

/// Sparse arrays up to this length use one-byte indices.
const NARROW_SPARSE_LEN: u16 = u8::MAX as u16;

/// Result of encoding one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeOutcome {
    /// A body of `bytes` bytes carrying `fields` fields was written.
    Written { bytes: usize, fields: usize },
    /// Nothing differs from the cached value; nothing was written.
    Unchanged,
}

/// Key field values read from the front of a body.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyFields {
    values: Vec<(usize, FieldValue)>,
}

impl KeyFields {
    /// The identity key formed by the values.
    #[must_use]
    pub fn key(&self) -> MessageKey {
        MessageKey::new(
            self.values
                .iter()
                .filter_map(|(_, value)| match value {
                    FieldValue::UInt(v) => Some(KeyPart::UInt(*v)),
                    FieldValue::SInt(v) => Some(KeyPart::SInt(*v)),
                    _ => None,
                })
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot<'a> {
    index: usize,
    field: &'a FieldDef,
    codec: &'a FieldCodec,
}

/// Fields of one variant split into key fields and bitmap fields.
struct Layout<'a> {
    keys: Vec<Slot<'a>>,
    bits: Vec<Slot<'a>>,
}

impl<'a> Layout<'a> {
    fn new(def: &'a PacketDef, variant: &'a VariantDef) -> CodecResult<Self> {
        let mut keys = Vec::new();
        let mut bits = Vec::new();
        for vf in &variant.fields {
            let field = def
                .fields
                .get(vf.field)
                .ok_or(SchemaError::UnknownVariantField {
                    packet_type: def.packet_type,
                    variant: variant.id,
                    field: vf.field,
                })?;
            let slot = Slot {
                index: vf.field,
                field,
                codec: vf.codec.as_ref().unwrap_or(&field.codec),
            };
            if field.key {
                keys.push(slot);
            } else {
                bits.push(slot);
            }
        }
        Ok(Self { keys, bits })
    }
}

/// Returns `true` if `new` has to be transmitted given the previous `old`.
///
/// Floats compare in the unscaled domain, so two values that round to the
/// same wire integer still count as different. Arrays of different length
/// always differ.
#[must_use]
pub fn fields_differ(old: &FieldValue, new: &FieldValue) -> bool {
    match (old, new) {
        (FieldValue::Array(a), FieldValue::Array(b)) => {
            a.len() != b.len() || a.iter().zip(b).any(|(x, y)| fields_differ(x, y))
        }
        _ => old != new,
    }
}

/// Encodes `new` against the previous value `old` and appends the body to
/// `out`.
///
/// A missing `old` diffs against the zeroed message and forces every bit on.
/// Nothing is appended on error or when the outcome is
/// [`EncodeOutcome::Unchanged`]. No-delta packets ignore `old`.
pub fn encode_message(
    def: &PacketDef,
    variant: &VariantDef,
    old: Option<&Message>,
    new: &Message,
    limits: &CodecLimits,
    out: &mut DataWriter,
) -> CodecResult<EncodeOutcome> {
    if new.len() != def.fields.len() {
        return Err(CodecError::FieldCountMismatch {
            packet_type: def.packet_type,
            expected: def.fields.len(),
            actual: new.len(),
        });
    }

    let layout = Layout::new(def, variant)?;
    for slot in layout.keys.iter().chain(&layout.bits) {
        check_value(def, slot, new, limits)?;
    }

    let mut body = DataWriter::new();
    for slot in &layout.keys {
        write_slot(def, slot, None, new, &mut body)?;
    }

    let fields = if def.is_delta() {
        let zeroed;
        let (old, force_full) = match old {
            Some(old) => (old, def.force_full),
            None => {
                zeroed = Message::zeroed(def);
                (&zeroed, true)
            }
        };

        let mut bitmap = FieldBitmap::new(layout.bits.len());
        let mut changed = false;
        for (bit, slot) in layout.bits.iter().enumerate() {
            let value = &new.values()[slot.index];
            let differs = old
                .get(slot.index)
                .map_or(true, |previous| fields_differ(previous, value));
            changed |= differs;
            if slot.field.folded {
                bitmap.assign(bit, value.as_bool() == Some(true));
            } else if differs || force_full {
                bitmap.set(bit);
            }
        }

        if !changed && !force_full {
            trace!(packet = %def.packet_type, "no field changed");
            return Ok(EncodeOutcome::Unchanged);
        }

        trace!(
            packet = %def.packet_type,
            bits = bitmap.len(),
            set = bitmap.count_ones(),
            force_full,
            "changed-field bitmap"
        );
        bitmap.write(&mut body)?;

        let mut fields = layout.keys.len();
        for (bit, slot) in layout.bits.iter().enumerate() {
            if slot.field.folded || !bitmap.is_set(bit) {
                continue;
            }
            write_slot(def, slot, old.get(slot.index), new, &mut body)?;
            fields += 1;
        }
        fields
    } else {
        for slot in &layout.bits {
            write_slot(def, slot, None, new, &mut body)?;
        }
        layout.keys.len() + layout.bits.len()
    };

    let bytes = body.bytes_written();
    out.write_bytes(body.as_slice());
    Ok(EncodeOutcome::Written { bytes, fields })
}

/// Reads the key fields at the front of a body.
pub fn read_key(
    def: &PacketDef,
    variant: &VariantDef,
    reader: &mut DataReader<'_>,
    limits: &CodecLimits,
) -> CodecResult<KeyFields> {
    let layout = Layout::new(def, variant)?;
    let mut values = Vec::with_capacity(layout.keys.len());
    for slot in &layout.keys {
        let value = read_scalar(def, slot.field, slot.codec, reader, limits)?;
        values.push((slot.index, value));
    }
    Ok(KeyFields { values })
}

/// Decodes the rest of a body, after [`read_key`], onto `old`.
///
/// Fields whose bit is clear keep their previous value; a missing `old`
/// starts from the zeroed message. No-delta packets ignore `old`.
pub fn decode_message(
    def: &PacketDef,
    variant: &VariantDef,
    keys: KeyFields,
    old: Option<Message>,
    reader: &mut DataReader<'_>,
    limits: &CodecLimits,
) -> CodecResult<Message> {
    let layout = Layout::new(def, variant)?;
    let mut message = match old {
        Some(old) if def.is_delta() && old.len() == def.fields.len() => old,
        _ => Message::zeroed(def),
    };
    for (idx, value) in keys.values {
        message.set(idx, value);
    }

    if def.is_delta() {
        let bitmap = FieldBitmap::read(reader, layout.bits.len())?;
        trace!(
            packet = %def.packet_type,
            bits = bitmap.len(),
            set = bitmap.count_ones(),
            "read changed-field bitmap"
        );
        for (bit, slot) in layout.bits.iter().enumerate() {
            if slot.field.folded {
                message.set(slot.index, bitmap.is_set(bit));
            } else if bitmap.is_set(bit) {
                read_slot(def, slot, &mut message, reader, limits)?;
            }
        }
    } else {
        for slot in &layout.bits {
            read_slot(def, slot, &mut message, reader, limits)?;
        }
    }

    for slot in &layout.bits {
        check_sized_array(def, slot, &message)?;
    }
    Ok(message)
}

fn invalid(def: &PacketDef, field: &FieldDef, reason: ValueReason) -> CodecError {
    CodecError::InvalidValue {
        packet_type: def.packet_type,
        field: field.name.clone(),
        reason,
    }
}

fn string_bound(max_len: u16, limits: &CodecLimits) -> usize {
    usize::from(max_len).min(limits.max_string_len)
}

fn check_value(
    def: &PacketDef,
    slot: &Slot<'_>,
    message: &Message,
    limits: &CodecLimits,
) -> CodecResult<()> {
    let value = &message.values()[slot.index];
    if value.kind_name() != slot.codec.kind_name() {
        return Err(invalid(
            def,
            slot.field,
            ValueReason::TypeMismatch {
                expected: slot.codec.kind_name(),
                found: value.kind_name(),
            },
        ));
    }
    check_string_len(value, limits)?;
    let (FieldCodec::Array { len, .. }, FieldValue::Array(items)) = (slot.codec, value) else {
        return Ok(());
    };

    let expected = array_len(def, slot.field, *len, message)?;
    if expected > limits.max_array_len {
        return Err(CodecError::LimitsExceeded {
            kind: LimitKind::ArrayLen,
            limit: limits.max_array_len,
            actual: expected,
        });
    }
    if items.len() != expected {
        return Err(invalid(
            def,
            slot.field,
            ValueReason::ArrayLength {
                expected,
                actual: items.len(),
            },
        ));
    }
    Ok(())
}

/// Strings the peer would refuse under the same limits are rejected before
/// anything is written or cached.
fn check_string_len(value: &FieldValue, limits: &CodecLimits) -> CodecResult<()> {
    match value {
        FieldValue::String(s) if s.len() >= limits.max_string_len => {
            Err(CodecError::LimitsExceeded {
                kind: LimitKind::StringLen,
                limit: limits.max_string_len,
                actual: s.len() + 1,
            })
        }
        FieldValue::Array(items) => items
            .iter()
            .try_for_each(|item| check_string_len(item, limits)),
        _ => Ok(()),
    }
}

fn check_sized_array(def: &PacketDef, slot: &Slot<'_>, message: &Message) -> CodecResult<()> {
    let FieldCodec::Array {
        len: len @ ArrayLen::Field { .. },
        ..
    } = slot.codec
    else {
        return Ok(());
    };
    let expected = array_len(def, slot.field, *len, message)?;
    let actual = message
        .get(slot.index)
        .and_then(FieldValue::as_array)
        .map_or(0, <[FieldValue]>::len);
    if actual != expected {
        return Err(invalid(
            def,
            slot.field,
            ValueReason::ArrayLength { expected, actual },
        ));
    }
    Ok(())
}

/// Element count of an array field in `message`.
fn array_len(
    def: &PacketDef,
    field: &FieldDef,
    len: ArrayLen,
    message: &Message,
) -> CodecResult<usize> {
    match len {
        ArrayLen::Fixed(n) => Ok(usize::from(n)),
        ArrayLen::Field {
            field: length_field,
            max,
        } => {
            let count = match message.get(length_field) {
                Some(FieldValue::UInt(count)) => *count,
                other => {
                    return Err(invalid(
                        def,
                        field,
                        ValueReason::TypeMismatch {
                            expected: "uint",
                            found: other.map_or("nothing", FieldValue::kind_name),
                        },
                    ))
                }
            };
            if count > u64::from(max) {
                return Err(invalid(
                    def,
                    field,
                    ValueReason::ArrayTooLong { len: count, max },
                ));
            }
            Ok(usize::from(max).min(count as usize))
        }
    }
}

fn write_slot(
    def: &PacketDef,
    slot: &Slot<'_>,
    old: Option<&FieldValue>,
    message: &Message,
    writer: &mut DataWriter,
) -> CodecResult<()> {
    let value = &message.values()[slot.index];
    trace!(packet = %def.packet_type, field = %slot.field.name, ?value, "encode field");
    match (slot.codec, value) {
        (
            FieldCodec::Array {
                element,
                sparse: true,
                ..
            },
            FieldValue::Array(items),
        ) => {
            let base = old.and_then(FieldValue::as_array).unwrap_or(&[]);
            write_sparse(def, slot.field, element, items, base, writer)
        }
        (FieldCodec::Array { element, .. }, FieldValue::Array(items)) => {
            for item in items {
                write_scalar(def, slot.field, element, item, writer)?;
            }
            Ok(())
        }
        (codec, value) => write_scalar(def, slot.field, codec, value, writer),
    }
}

/// Writes `(index, element)` for each element that differs from `base`,
/// then the sentinel index.
fn write_sparse(
    def: &PacketDef,
    field: &FieldDef,
    element: &FieldCodec,
    items: &[FieldValue],
    base: &[FieldValue],
    writer: &mut DataWriter,
) -> CodecResult<()> {
    let zero = FieldValue::zeroed(element);
    let wide = items.len() > usize::from(NARROW_SPARSE_LEN);
    for (index, item) in items.iter().enumerate() {
        let previous = base.get(index).unwrap_or(&zero);
        if !fields_differ(previous, item) {
            continue;
        }
        if wide {
            writer.write_uint(index as u64, 2)?;
        } else {
            writer.write_uint(index as u64, 1)?;
        }
        write_scalar(def, field, element, item, writer)?;
    }
    if wide {
        writer.write_u16(u16::MAX);
    } else {
        writer.write_u8(u8::MAX);
    }
    Ok(())
}

fn scale_float(value: f64, factor: u32) -> Option<i64> {
    let scaled = (value * f64::from(factor)).round();
    if scaled.is_finite() && scaled >= i64::MIN as f64 && scaled <= i64::MAX as f64 {
        Some(scaled as i64)
    } else {
        None
    }
}

fn write_scalar(
    def: &PacketDef,
    field: &FieldDef,
    codec: &FieldCodec,
    value: &FieldValue,
    writer: &mut DataWriter,
) -> CodecResult<()> {
    let unencodable = |err| invalid(def, field, ValueReason::Unencodable(err));
    match (codec, value) {
        (FieldCodec::Bool, FieldValue::Bool(v)) => writer.write_bool(*v),
        (FieldCodec::UInt { bytes }, FieldValue::UInt(v)) => writer
            .write_uint(*v, usize::from(*bytes))
            .map_err(unencodable)?,
        (FieldCodec::SInt { bytes }, FieldValue::SInt(v)) => writer
            .write_sint(*v, usize::from(*bytes))
            .map_err(unencodable)?,
        (FieldCodec::Float { bytes, factor }, FieldValue::Float(v)) => {
            let out_of_range = || invalid(def, field, ValueReason::FloatOutOfRange { bytes: *bytes });
            let scaled = scale_float(*v, *factor).ok_or_else(out_of_range)?;
            writer
                .write_sint(scaled, usize::from(*bytes))
                .map_err(|_| out_of_range())?;
        }
        (FieldCodec::String { max_len }, FieldValue::String(s)) => writer
            .write_string(s, usize::from(*max_len))
            .map_err(unencodable)?,
        (FieldCodec::BitVector { bits }, FieldValue::BitVector(storage)) => writer
            .write_bitvector(storage, usize::from(*bits))
            .map_err(unencodable)?,
        (FieldCodec::Bytes { len }, FieldValue::Bytes(raw)) => {
            if raw.len() != usize::from(*len) {
                return Err(invalid(
                    def,
                    field,
                    ValueReason::BytesLength {
                        expected: usize::from(*len),
                        actual: raw.len(),
                    },
                ));
            }
            writer.write_bytes(raw);
        }
        (codec, value) => {
            return Err(invalid(
                def,
                field,
                ValueReason::TypeMismatch {
                    expected: codec.kind_name(),
                    found: value.kind_name(),
                },
            ))
        }
    }
    Ok(())
}

fn read_slot(
    def: &PacketDef,
    slot: &Slot<'_>,
    message: &mut Message,
    reader: &mut DataReader<'_>,
    limits: &CodecLimits,
) -> CodecResult<()> {
    let value = match slot.codec {
        FieldCodec::Array {
            element,
            len,
            sparse,
        } => {
            let count = array_len(def, slot.field, *len, message)?;
            if count > limits.max_array_len {
                return Err(CodecError::LimitsExceeded {
                    kind: LimitKind::ArrayLen,
                    limit: limits.max_array_len,
                    actual: count,
                });
            }
            if *sparse {
                let base = match message.slot_mut(slot.index) {
                    Some(FieldValue::Array(items)) => std::mem::take(items),
                    _ => Vec::new(),
                };
                read_sparse(def, slot.field, element, base, count, reader, limits)?
            } else {
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(read_scalar(def, slot.field, element, reader, limits)?);
                }
                FieldValue::Array(items)
            }
        }
        codec => read_scalar(def, slot.field, codec, reader, limits)?,
    };
    trace!(packet = %def.packet_type, field = %slot.field.name, ?value, "decode field");
    message.set(slot.index, value);
    Ok(())
}

fn read_sparse(
    def: &PacketDef,
    field: &FieldDef,
    element: &FieldCodec,
    mut items: Vec<FieldValue>,
    len: usize,
    reader: &mut DataReader<'_>,
    limits: &CodecLimits,
) -> CodecResult<FieldValue> {
    items.resize(len, FieldValue::zeroed(element));
    let wide = len > usize::from(NARROW_SPARSE_LEN);
    let (index_bytes, sentinel) = if wide {
        (2, u64::from(u16::MAX))
    } else {
        (1, u64::from(u8::MAX))
    };
    debug_assert!(len <= usize::from(MAX_SPARSE_LEN));

    loop {
        let index = reader.read_uint(index_bytes)?;
        if index == sentinel {
            break;
        }
        let index = index as usize;
        if index >= len {
            return Err(invalid(
                def,
                field,
                ValueReason::SparseIndexOutOfRange { index, len },
            ));
        }
        items[index] = read_scalar(def, field, element, reader, limits)?;
    }
    Ok(FieldValue::Array(items))
}

fn read_scalar(
    def: &PacketDef,
    field: &FieldDef,
    codec: &FieldCodec,
    reader: &mut DataReader<'_>,
    limits: &CodecLimits,
) -> CodecResult<FieldValue> {
    let value = match codec {
        FieldCodec::Bool => FieldValue::Bool(reader.read_bool()?),
        FieldCodec::UInt { bytes } => FieldValue::UInt(reader.read_uint(usize::from(*bytes))?),
        FieldCodec::SInt { bytes } => FieldValue::SInt(reader.read_sint(usize::from(*bytes))?),
        FieldCodec::Float { bytes, factor } => {
            let raw = reader.read_sint(usize::from(*bytes))?;
            FieldValue::Float(raw as f64 / f64::from(*factor))
        }
        FieldCodec::String { max_len } => {
            FieldValue::String(reader.read_string(string_bound(*max_len, limits))?)
        }
        FieldCodec::BitVector { bits } => {
            FieldValue::BitVector(reader.read_bitvector(usize::from(*bits))?)
        }
        FieldCodec::Bytes { len } => FieldValue::Bytes(reader.read_bytes(usize::from(*len))?.to_vec()),
        FieldCodec::Array { .. } => {
            return Err(invalid(
                def,
                field,
                ValueReason::TypeMismatch {
                    expected: "scalar",
                    found: "array",
                },
            ))
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataio::StreamError;
    use schema::{CapPredicate, Registry};

    fn unit_pos() -> PacketDef {
        let def = PacketDef::new(10, "unit_pos")
            .field(FieldDef::new("id", FieldCodec::uint(2)).key())
            .field(FieldDef::new("x", FieldCodec::uint(1)))
            .field(FieldDef::new("y", FieldCodec::uint(1)))
            .field(FieldDef::new("owner", FieldCodec::uint(1)));
        normalized(def)
    }

    fn normalized(def: PacketDef) -> PacketDef {
        let ty = def.packet_type;
        Registry::new(vec![def]).unwrap().get(ty).unwrap().clone()
    }

    fn pos(id: u16, x: u8, y: u8, owner: u8) -> Message {
        Message::new(vec![id.into(), x.into(), y.into(), owner.into()])
    }

    fn encode(def: &PacketDef, old: Option<&Message>, new: &Message) -> (EncodeOutcome, Vec<u8>) {
        let mut out = DataWriter::new();
        let outcome = encode_message(
            def,
            &def.variants[0],
            old,
            new,
            &CodecLimits::for_testing(),
            &mut out,
        )
        .unwrap();
        (outcome, out.finish())
    }

    fn decode(def: &PacketDef, old: Option<Message>, body: &[u8]) -> CodecResult<Message> {
        let limits = CodecLimits::for_testing();
        let variant = &def.variants[0];
        let mut reader = DataReader::new(body);
        let keys = read_key(def, variant, &mut reader, &limits)?;
        let message = decode_message(def, variant, keys, old, &mut reader, &limits)?;
        assert!(reader.is_empty(), "body fully consumed");
        Ok(message)
    }

    #[test]
    fn first_send_sets_every_bit() {
        let def = unit_pos();
        let (outcome, body) = encode(&def, None, &pos(5, 3, 4, 1));
        assert_eq!(outcome, EncodeOutcome::Written { bytes: 6, fields: 4 });
        assert_eq!(body, vec![0x00, 0x05, 0b0000_0111, 3, 4, 1]);
    }

    #[test]
    fn first_send_of_zero_value_is_still_full() {
        let def = unit_pos();
        let (_, body) = encode(&def, None, &pos(0, 0, 0, 0));
        assert_eq!(body, vec![0x00, 0x00, 0b0000_0111, 0, 0, 0]);
    }

    #[test]
    fn partial_update_carries_only_changed_fields() {
        let def = unit_pos();
        let first = pos(5, 3, 4, 1);
        let second = pos(5, 3, 4, 2);
        let (outcome, body) = encode(&def, Some(&first), &second);
        assert_eq!(outcome, EncodeOutcome::Written { bytes: 4, fields: 2 });
        assert_eq!(body, vec![0x00, 0x05, 0b0000_0100, 2]);

        let decoded = decode(&def, Some(first), &body).unwrap();
        assert_eq!(decoded, second);
    }

    #[test]
    fn unchanged_writes_nothing() {
        let def = unit_pos();
        let msg = pos(5, 3, 4, 2);
        let (outcome, body) = encode(&def, Some(&msg), &msg);
        assert_eq!(outcome, EncodeOutcome::Unchanged);
        assert!(body.is_empty());
    }

    #[test]
    fn force_full_sends_unchanged_value() {
        let def = normalized(
            PacketDef::new(25, "chat_msg")
                .force_full()
                .field(FieldDef::new("message", FieldCodec::string(64)))
                .field(FieldDef::new("event", FieldCodec::sint(2))),
        );
        let msg = Message::new(vec!["hello".into(), (-1i16).into()]);
        let (outcome, body) = encode(&def, Some(&msg), &msg);
        assert!(matches!(outcome, EncodeOutcome::Written { .. }));
        assert_eq!(body[0], 0b0000_0011);
        assert_eq!(decode(&def, Some(msg.clone()), &body).unwrap(), msg);
    }

    #[test]
    fn folded_bool_lives_in_the_bitmap() {
        let def = normalized(
            PacketDef::new(31, "city_short")
                .field(FieldDef::new("id", FieldCodec::uint(2)).key())
                .field(FieldDef::new("size", FieldCodec::uint(1)))
                .field(FieldDef::new("capital", FieldCodec::bool()).folded())
                .field(FieldDef::new("occupied", FieldCodec::bool()).folded()),
        );
        let before = Message::new(vec![7u16.into(), 3u8.into(), false.into(), true.into()]);
        let after = Message::new(vec![7u16.into(), 3u8.into(), true.into(), true.into()]);

        let (_, body) = encode(&def, Some(&before), &after);
        assert_eq!(body, vec![0x00, 0x07, 0b0000_0110], "no payload bytes for folded bools");
        assert_eq!(decode(&def, Some(before.clone()), &body).unwrap(), after);

        let (outcome, _) = encode(&def, Some(&after), &after);
        assert_eq!(outcome, EncodeOutcome::Unchanged, "true bit alone is not a change");

        let cleared = Message::new(vec![7u16.into(), 3u8.into(), false.into(), true.into()]);
        let (outcome, body) = encode(&def, Some(&after), &cleared);
        assert!(matches!(outcome, EncodeOutcome::Written { .. }), "true to false is a change");
        assert_eq!(body, vec![0x00, 0x07, 0b0000_0100]);
        assert_eq!(decode(&def, Some(after), &body).unwrap(), cleared);
    }

    #[test]
    fn sparse_array_writes_changed_indices() {
        let def = normalized(
            PacketDef::new(60, "research_info")
                .field(FieldDef::new("inventions", FieldCodec::sparse_array(FieldCodec::uint(1), 100))),
        );
        let old = Message::new(vec![FieldValue::Array(vec![FieldValue::UInt(0); 100])]);
        let mut items = vec![FieldValue::UInt(0); 100];
        items[3] = FieldValue::UInt(1);
        items[97] = FieldValue::UInt(2);
        let new = Message::new(vec![FieldValue::Array(items)]);

        let (_, body) = encode(&def, Some(&old), &new);
        assert_eq!(body, vec![0b0000_0001, 3, 1, 97, 2, 0xFF]);
        assert_eq!(decode(&def, Some(old), &body).unwrap(), new);
    }

    #[test]
    fn wide_sparse_array_uses_two_byte_indices() {
        let def = normalized(
            PacketDef::new(61, "tile_known")
                .field(FieldDef::new("known", FieldCodec::sparse_array(FieldCodec::bool(), 256))),
        );
        let mut items = vec![FieldValue::Bool(false); 256];
        items[255] = FieldValue::Bool(true);
        let new = Message::new(vec![FieldValue::Array(items)]);

        let (_, body) = encode(&def, None, &new);
        assert_eq!(body, vec![0b0000_0001, 0x00, 0xFF, 1, 0xFF, 0xFF]);
        assert_eq!(decode(&def, None, &body).unwrap(), new);
    }

    #[test]
    fn sparse_index_out_of_range_is_rejected() {
        let def = normalized(
            PacketDef::new(60, "research_info")
                .field(FieldDef::new("inventions", FieldCodec::sparse_array(FieldCodec::uint(1), 4))),
        );
        let err = decode(&def, None, &[0b0000_0001, 9, 1, 0xFF]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::InvalidValue {
                reason: ValueReason::SparseIndexOutOfRange { index: 9, len: 4 },
                ..
            }
        ));
    }

    #[test]
    fn floats_scale_and_compare_unscaled() {
        let def = normalized(
            PacketDef::new(16, "game_info")
                .field(FieldDef::new("tax_rate", FieldCodec::float(2, 100))),
        );
        let old = Message::new(vec![FieldValue::Float(0.5)]);
        let new = Message::new(vec![FieldValue::Float(-1.25)]);
        let (_, body) = encode(&def, Some(&old), &new);
        assert_eq!(body, vec![0b0000_0001, 0xFF, 0x83]);
        assert_eq!(decode(&def, Some(old), &body).unwrap(), new);

        let a = Message::new(vec![FieldValue::Float(0.501)]);
        let b = Message::new(vec![FieldValue::Float(0.502)]);
        let (outcome, _) = encode(&def, Some(&a), &b);
        assert!(
            matches!(outcome, EncodeOutcome::Written { .. }),
            "values rounding to the same integer still differ"
        );
    }

    #[test]
    fn float_out_of_range_is_invalid() {
        let def = normalized(
            PacketDef::new(16, "game_info").field(FieldDef::new("rate", FieldCodec::float(1, 100))),
        );
        let mut out = DataWriter::new();
        let err = encode_message(
            &def,
            &def.variants[0],
            None,
            &Message::new(vec![FieldValue::Float(5.0)]),
            &CodecLimits::for_testing(),
            &mut out,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CodecError::InvalidValue {
                reason: ValueReason::FloatOutOfRange { bytes: 1 },
                ..
            }
        ));
        assert_eq!(out.bytes_written(), 0);
    }

    fn city_units() -> PacketDef {
        normalized(
            PacketDef::new(40, "city_units")
                .field(FieldDef::new("city", FieldCodec::uint(2)).key())
                .field(FieldDef::new("count", FieldCodec::uint(1)))
                .field(FieldDef::new("units", FieldCodec::array_sized_by(FieldCodec::uint(2), 1, 8))),
        )
    }

    fn units(city: u16, ids: &[u16]) -> Message {
        Message::new(vec![
            city.into(),
            (ids.len() as u8).into(),
            FieldValue::Array(ids.iter().map(|&id| id.into()).collect()),
        ])
    }

    #[test]
    fn sized_array_changes_with_length() {
        let def = city_units();
        let old = units(1, &[10, 11]);
        let new = units(1, &[10, 11, 12]);
        let (_, body) = encode(&def, Some(&old), &new);
        assert_eq!(body, vec![0x00, 0x01, 0b0000_0011, 3, 0, 10, 0, 11, 0, 12]);
        assert_eq!(decode(&def, Some(old), &body).unwrap(), new);
    }

    #[test]
    fn sized_array_must_match_length_field() {
        let def = city_units();
        let mut bad = units(1, &[10, 11]);
        bad.set(1, 3u8);
        let mut out = DataWriter::new();
        let err = encode_message(
            &def,
            &def.variants[0],
            None,
            &bad,
            &CodecLimits::for_testing(),
            &mut out,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CodecError::InvalidValue {
                reason: ValueReason::ArrayLength { expected: 3, actual: 2 },
                ..
            }
        ));
    }

    #[test]
    fn sized_array_length_over_max_is_rejected_on_decode() {
        let def = city_units();
        let err = decode(&def, None, &[0x00, 0x01, 0b0000_0011, 9]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::InvalidValue {
                reason: ValueReason::ArrayTooLong { len: 9, max: 8 },
                ..
            }
        ));
    }

    #[test]
    fn stale_length_without_array_is_rejected_on_decode() {
        let def = city_units();
        let err = decode(&def, Some(units(1, &[10])), &[0x00, 0x01, 0b0000_0001, 2]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::InvalidValue {
                reason: ValueReason::ArrayLength { expected: 2, actual: 1 },
                ..
            }
        ));
    }

    #[test]
    fn no_delta_writes_every_field() {
        let def = normalized(
            PacketDef::new(3, "ping")
                .no_delta()
                .field(FieldDef::new("seq", FieldCodec::uint(2)))
                .field(FieldDef::new("tag", FieldCodec::string(8))),
        );
        let msg = Message::new(vec![9u16.into(), "hi".into()]);
        let (outcome, body) = encode(&def, Some(&msg), &msg);
        assert_eq!(outcome, EncodeOutcome::Written { bytes: 5, fields: 2 });
        assert_eq!(body, vec![0x00, 0x09, b'h', b'i', 0]);
        assert_eq!(decode(&def, None, &body).unwrap(), msg);
    }

    #[test]
    fn type_mismatch_is_invalid_value() {
        let def = unit_pos();
        let bad = Message::new(vec![5u16.into(), "x".into(), 4u8.into(), 1u8.into()]);
        let mut out = DataWriter::new();
        let err = encode_message(&def, &def.variants[0], None, &bad, &CodecLimits::for_testing(), &mut out)
            .unwrap_err();
        assert!(matches!(
            err,
            CodecError::InvalidValue {
                reason: ValueReason::TypeMismatch {
                    expected: "uint",
                    found: "string"
                },
                ..
            }
        ));
        assert_eq!(out.bytes_written(), 0);
    }

    #[test]
    fn out_of_range_integer_is_invalid_value() {
        let def = unit_pos();
        let bad = Message::new(vec![5u16.into(), 300u16.into(), 4u8.into(), 1u8.into()]);
        let mut out = DataWriter::new();
        let err = encode_message(&def, &def.variants[0], None, &bad, &CodecLimits::for_testing(), &mut out)
            .unwrap_err();
        assert!(matches!(
            err,
            CodecError::InvalidValue {
                reason: ValueReason::Unencodable(StreamError::ValueOutOfRange { value: 300, bytes: 1 }),
                ..
            }
        ));
    }

    #[test]
    fn field_count_mismatch() {
        let def = unit_pos();
        let mut out = DataWriter::new();
        let err = encode_message(
            &def,
            &def.variants[0],
            None,
            &Message::new(vec![1u16.into()]),
            &CodecLimits::for_testing(),
            &mut out,
        )
        .unwrap_err();
        assert_eq!(
            err,
            CodecError::FieldCountMismatch {
                packet_type: def.packet_type,
                expected: 4,
                actual: 1
            }
        );
    }

    #[test]
    fn truncated_body_is_a_stream_error() {
        let def = unit_pos();
        let err = decode(&def, None, &[0x00, 0x05, 0b0000_0111, 3]).unwrap_err();
        assert!(matches!(err, CodecError::Stream(StreamError::UnexpectedEof { .. })));
    }

    #[test]
    fn variant_override_changes_width() {
        let def = normalized(
            PacketDef::new(10, "unit_pos")
                .field(FieldDef::new("id", FieldCodec::uint(2)).key())
                .field(FieldDef::new("x", FieldCodec::uint(1)))
                .variant(
                    VariantDef::new(1, CapPredicate::Always)
                        .field_as(0, FieldCodec::uint(4))
                        .field(1),
                ),
        );
        let msg = Message::new(vec![70_000u32.into(), 2u8.into()]);
        let (_, body) = encode(&def, None, &msg);
        assert_eq!(body, vec![0x00, 0x01, 0x11, 0x70, 0b0000_0001, 2]);
        assert_eq!(decode(&def, None, &body).unwrap(), msg);
    }

    #[test]
    fn fields_not_in_variant_are_left_alone() {
        let def = normalized(
            PacketDef::new(10, "unit_pos")
                .field(FieldDef::new("id", FieldCodec::uint(2)).key())
                .field(FieldDef::new("x", FieldCodec::uint(1)))
                .field(FieldDef::new("y", FieldCodec::uint(1)))
                .variant(VariantDef::new(0, CapPredicate::Always).field(0).field(2)),
        );
        let old = Message::new(vec![1u16.into(), 9u8.into(), 0u8.into()]);
        let new = Message::new(vec![1u16.into(), 0u8.into(), 4u8.into()]);
        let (_, body) = encode(&def, Some(&old), &new);
        assert_eq!(body, vec![0x00, 0x01, 0b0000_0001, 4]);
        let decoded = decode(&def, Some(old), &body).unwrap();
        assert_eq!(decoded.get(1), Some(&FieldValue::UInt(9)), "x not carried");
        assert_eq!(decoded.get(2), Some(&FieldValue::UInt(4)));
    }

    #[test]
    fn variant_with_unknown_field_is_rejected() {
        let def = PacketDef::new(10, "unit_pos")
            .field(FieldDef::new("id", FieldCodec::uint(2)).key())
            .variant(VariantDef::new(3, CapPredicate::Always).field(0).field(5));
        let variant = &def.variants[0];
        let expected = CodecError::Schema(SchemaError::UnknownVariantField {
            packet_type: def.packet_type,
            variant: variant.id,
            field: 5,
        });

        let mut out = DataWriter::new();
        let msg = Message::new(vec![1u16.into()]);
        let err = encode_message(&def, variant, None, &msg, &CodecLimits::for_testing(), &mut out)
            .unwrap_err();
        assert_eq!(err, expected);
        assert_eq!(out.bytes_written(), 0);

        let mut reader = DataReader::new(&[0x00, 0x01, 0x00]);
        let err = read_key(&def, variant, &mut reader, &CodecLimits::for_testing()).unwrap_err();
        assert_eq!(err, expected);
    }

    #[test]
    fn strings_in_arrays_respect_codec_limit() {
        let def = normalized(
            PacketDef::new(26, "city_names")
                .field(FieldDef::new("names", FieldCodec::array(FieldCodec::string(512), 2))),
        );
        let msg = Message::new(vec![FieldValue::Array(vec!["ok".into(), "z".repeat(256).into()])]);
        let mut out = DataWriter::new();
        let err = encode_message(&def, &def.variants[0], None, &msg, &CodecLimits::for_testing(), &mut out)
            .unwrap_err();
        assert_eq!(
            err,
            CodecError::LimitsExceeded {
                kind: LimitKind::StringLen,
                limit: 256,
                actual: 257,
            }
        );
        assert_eq!(out.bytes_written(), 0);
    }

    #[test]
    fn key_fields_form_message_key() {
        let def = unit_pos();
        let body = [0x01, 0x02, 0, 0];
        let mut reader = DataReader::new(&body);
        let keys = read_key(&def, &def.variants[0], &mut reader, &CodecLimits::for_testing()).unwrap();
        assert_eq!(keys.key(), MessageKey::uint(0x0102));
        assert_eq!(reader.position(), 2);
    }

    #[test]
    fn differ_on_arrays() {
        let a = FieldValue::Array(vec![1u8.into(), 2u8.into()]);
        let b = FieldValue::Array(vec![1u8.into()]);
        let c = FieldValue::Array(vec![1u8.into(), 3u8.into()]);
        assert!(fields_differ(&a, &b));
        assert!(fields_differ(&a, &c));
        assert!(!fields_differ(&a, &a.clone()));
    }
}
