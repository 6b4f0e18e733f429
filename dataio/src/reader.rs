//! Byte-level reader with bounded operations.

use crate::error::{StreamError, StreamResult};

/// A byte-level reader for decoding packet bodies.
///
/// All read operations are bounds-checked and return errors on failure.
/// The reader never panics on malformed input.
#[derive(Debug)]
pub struct DataReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> DataReader<'a> {
    /// Creates a new `DataReader` from a byte slice.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the number of bytes remaining to read.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Returns `true` if there are no more bytes to read.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Returns the current byte position.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    pub fn read_u8(&mut self) -> StreamResult<u8> {
        let [value] = self.read_array::<1>()?;
        Ok(value)
    }

    pub fn read_u16(&mut self) -> StreamResult<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> StreamResult<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_i8(&mut self) -> StreamResult<i8> {
        Ok(i8::from_be_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> StreamResult<i16> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> StreamResult<i32> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    /// Reads a boolean byte; anything but `0` or `1` is rejected.
    pub fn read_bool(&mut self) -> StreamResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(StreamError::InvalidBool { value }),
        }
    }

    /// Reads an unsigned integer of `bytes` bytes (1, 2 or 4).
    pub fn read_uint(&mut self, bytes: usize) -> StreamResult<u64> {
        match bytes {
            1 => self.read_u8().map(u64::from),
            2 => self.read_u16().map(u64::from),
            4 => self.read_u32().map(u64::from),
            _ => Err(StreamError::InvalidWidth { bytes }),
        }
    }

    /// Reads a signed integer of `bytes` bytes (1, 2 or 4).
    pub fn read_sint(&mut self, bytes: usize) -> StreamResult<i64> {
        match bytes {
            1 => self.read_i8().map(i64::from),
            2 => self.read_i16().map(i64::from),
            4 => self.read_i32().map(i64::from),
            _ => Err(StreamError::InvalidWidth { bytes }),
        }
    }

    /// Reads a NUL-terminated string of at most `max_len` bytes, terminator
    /// included.
    pub fn read_string(&mut self, max_len: usize) -> StreamResult<String> {
        let rest = &self.data[self.pos..];
        let window = &rest[..rest.len().min(max_len)];
        let Some(end) = window.iter().position(|&b| b == 0) else {
            if rest.len() < max_len {
                return Err(StreamError::UnexpectedEof {
                    requested: rest.len() + 1,
                    available: rest.len(),
                });
            }
            return Err(StreamError::UnterminatedString { max_len });
        };
        let text = std::str::from_utf8(&window[..end]).map_err(|_| StreamError::InvalidUtf8)?;
        self.pos += end + 1;
        Ok(text.to_owned())
    }

    /// Reads a bit vector of `bits` bits (`ceil(bits / 8)` bytes).
    pub fn read_bitvector(&mut self, bits: usize) -> StreamResult<Vec<u8>> {
        self.read_bytes(bits.div_ceil(8)).map(<[u8]>::to_vec)
    }

    /// Reads a raw block of `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> StreamResult<&'a [u8]> {
        self.ensure(len)?;
        let data: &'a [u8] = self.data;
        let out = &data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    fn ensure(&self, len: usize) -> StreamResult<()> {
        let available = self.remaining();
        if len > available {
            return Err(StreamError::UnexpectedEof {
                requested: len,
                available,
            });
        }
        Ok(())
    }

    fn read_array<const N: usize>(&mut self) -> StreamResult<[u8; N]> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }
}
