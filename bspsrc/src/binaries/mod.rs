use bytemuck::{AnyBitPattern, Pod};

use crate::error::FormatError;

/// Forward-only cursor over a little-endian byte slice. Used for the lumps
/// whose layout is not a plain array of records.
pub struct RecordReader<'a> {
    data: &'a [u8],
    pos: usize,
    what: &'static str,
}

impl<'a> RecordReader<'a> {
    pub fn new(data: &'a [u8], what: &'static str) -> Self {
        Self { data, pos: 0, what }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn seek(&mut self, pos: usize) -> Result<(), FormatError> {
        if pos > self.data.len() {
            return Err(FormatError::Truncated {
                what: self.what,
                needed: pos,
                available: self.data.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    pub fn skip(&mut self, len: usize) -> Result<(), FormatError> {
        self.bytes(len).map(|_| ())
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        if len > self.remaining() {
            return Err(self.truncated(len));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read<T: AnyBitPattern>(&mut self) -> Result<T, FormatError> {
        let bytes = self.bytes(std::mem::size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Reads a record of `size` bytes into `T`, zero padding a short record and
    /// ignoring the tail of a long one. Always consumes exactly `size` bytes.
    pub fn read_sized<T: Pod>(&mut self, size: usize) -> Result<T, FormatError> {
        let bytes = self.bytes(size)?;
        let mut value = T::zeroed();
        let dst = bytemuck::bytes_of_mut(&mut value);
        let n = dst.len().min(size);
        dst[..n].copy_from_slice(&bytes[..n]);
        Ok(value)
    }

    pub fn read_vec<T: AnyBitPattern>(&mut self, count: usize) -> Result<Vec<T>, FormatError> {
        let size = std::mem::size_of::<T>();
        let needed = size.saturating_mul(count);
        if needed > self.remaining() {
            return Err(self.truncated(needed));
        }
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.read()?);
        }
        Ok(out)
    }

    /// Reads a count prefix that must be non-negative
    pub fn read_count(&mut self) -> Result<usize, FormatError> {
        let count: i32 = self.read()?;
        usize::try_from(count).map_err(|_| FormatError::Truncated {
            what: self.what,
            needed: 0,
            available: self.remaining(),
        })
    }

    fn truncated(&self, needed: usize) -> FormatError {
        FormatError::Truncated {
            what: self.what,
            needed,
            available: self.remaining(),
        }
    }
}

/// Decodes a NUL-terminated fixed-width string field
pub fn fixed_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
