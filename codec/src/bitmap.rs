//! Changed-field bitmap written in front of every delta body.

use dataio::{DataReader, DataWriter, StreamResult};

/// One bit per non-key field of a variant, LSB first within each byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBitmap {
    bytes: Vec<u8>,
    len: usize,
}

impl FieldBitmap {
    /// All-clear bitmap of `len` bits.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            bytes: vec![0; len.div_ceil(8)],
            len,
        }
    }

    /// Number of bits.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Wire size in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Sets bit `index`. Out-of-range indices are ignored.
    pub fn set(&mut self, index: usize) {
        self.assign(index, true);
    }

    /// Sets or clears bit `index`. Out-of-range indices are ignored.
    pub fn assign(&mut self, index: usize, value: bool) {
        if index >= self.len {
            return;
        }
        let mask = 1u8 << (index % 8);
        if value {
            self.bytes[index / 8] |= mask;
        } else {
            self.bytes[index / 8] &= !mask;
        }
    }

    #[must_use]
    pub fn is_set(&self, index: usize) -> bool {
        index < self.len && self.bytes[index / 8] & (1u8 << (index % 8)) != 0
    }

    #[must_use]
    pub fn count_ones(&self) -> usize {
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Returns `true` if any bit is set.
    #[must_use]
    pub fn any(&self) -> bool {
        self.bytes.iter().any(|&b| b != 0)
    }

    pub fn write(&self, writer: &mut DataWriter) -> StreamResult<()> {
        writer.write_bitvector(&self.bytes, self.len)
    }

    /// Reads a bitmap of `len` bits. Padding bits in the last byte are
    /// discarded.
    pub fn read(reader: &mut DataReader<'_>, len: usize) -> StreamResult<Self> {
        let mut bytes = reader.read_bitvector(len)?;
        let used = len % 8;
        if used != 0 {
            if let Some(last) = bytes.last_mut() {
                *last &= (1u8 << used) - 1;
            }
        }
        Ok(Self { bytes, len })
    }
}
