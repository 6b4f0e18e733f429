//! Byte-level writer for encoding packet bodies.

use crate::error::{StreamError, StreamResult};

/// A byte-level writer for encoding packet bodies.
///
/// Writes are accumulated in an internal buffer. Call [`finish`](Self::finish)
/// to get the final byte buffer. Multi-byte integers are big-endian.
#[derive(Debug, Default)]
pub struct DataWriter {
    bytes: Vec<u8>,
}

impl DataWriter {
    /// Creates a new empty `DataWriter`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `DataWriter` with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
        }
    }

    /// Returns the number of bytes written so far.
    #[must_use]
    pub fn bytes_written(&self) -> usize {
        self.bytes.len()
    }

    /// Returns the bytes written so far.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i8(&mut self, value: i8) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i16(&mut self, value: i16) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    /// Writes a boolean as a single `0` or `1` byte.
    pub fn write_bool(&mut self, value: bool) {
        self.bytes.push(u8::from(value));
    }

    /// Writes an unsigned integer using `bytes` bytes (1, 2 or 4).
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidWidth`] for unsupported widths and
    /// [`StreamError::ValueOutOfRange`] if `value` does not fit.
    pub fn write_uint(&mut self, value: u64, bytes: usize) -> StreamResult<()> {
        let out_of_range = || StreamError::ValueOutOfRange { value, bytes };
        match bytes {
            1 => self.write_u8(u8::try_from(value).map_err(|_| out_of_range())?),
            2 => self.write_u16(u16::try_from(value).map_err(|_| out_of_range())?),
            4 => self.write_u32(u32::try_from(value).map_err(|_| out_of_range())?),
            _ => return Err(StreamError::InvalidWidth { bytes }),
        }
        Ok(())
    }

    /// Writes a signed integer using `bytes` bytes (1, 2 or 4).
    pub fn write_sint(&mut self, value: i64, bytes: usize) -> StreamResult<()> {
        let out_of_range = || StreamError::SignedOutOfRange { value, bytes };
        match bytes {
            1 => self.write_i8(i8::try_from(value).map_err(|_| out_of_range())?),
            2 => self.write_i16(i16::try_from(value).map_err(|_| out_of_range())?),
            4 => self.write_i32(i32::try_from(value).map_err(|_| out_of_range())?),
            _ => return Err(StreamError::InvalidWidth { bytes }),
        }
        Ok(())
    }

    /// Writes a NUL-terminated string.
    ///
    /// `max_len` counts the terminator, so at most `max_len - 1` content
    /// bytes are accepted.
    pub fn write_string(&mut self, value: &str, max_len: usize) -> StreamResult<()> {
        let raw = value.as_bytes();
        if raw.len() >= max_len {
            return Err(StreamError::StringTooLong {
                len: raw.len(),
                max_len,
            });
        }
        if raw.contains(&0) {
            return Err(StreamError::InteriorNul);
        }
        self.bytes.extend_from_slice(raw);
        self.bytes.push(0);
        Ok(())
    }

    /// Writes a bit vector of `bits` bits stored in `ceil(bits / 8)` bytes.
    pub fn write_bitvector(&mut self, storage: &[u8], bits: usize) -> StreamResult<()> {
        let expected = bits.div_ceil(8);
        if storage.len() != expected {
            return Err(StreamError::BitVectorSize {
                bits,
                actual: storage.len(),
            });
        }
        self.bytes.extend_from_slice(storage);
        Ok(())
    }

    /// Writes a raw block of bytes.
    pub fn write_bytes(&mut self, raw: &[u8]) {
        self.bytes.extend_from_slice(raw);
    }

    /// Finishes writing and returns the byte buffer.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }

    /// Finishes writing and appends to the provided buffer.
    pub fn finish_into(mut self, buf: &mut Vec<u8>) {
        buf.append(&mut self.bytes);
    }
}
