use crate::error::FormatError;

use super::consts::LumpType;

/// Record types stored as a flat array in a single lump
pub trait Lump
where
    Self: Sized,
{
    fn max() -> usize;
    fn lump_type() -> LumpType;
}

// https://developer.valvesoftware.com/wiki/BSP_(Source)
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BSPLump {
    pub file_ofs: i32,    // offset into file (bytes)
    pub file_len: i32,    // length of lump (bytes)
    pub version: i32,     // lump format version
    pub four_cc: [u8; 4], // lump ident code, uncompressed size for LZMA lumps
}

impl BSPLump {
    /// Uncompressed size stored in the ident field. Zero for plain lumps.
    pub fn uncompressed_len(&self) -> usize {
        u32::from_le_bytes(self.four_cc) as usize
    }

    /// Returns the stored byte range of this lump, checked against the file size
    pub fn range(&self, lump: LumpType, file_size: usize) -> Result<std::ops::Range<usize>, FormatError> {
        let out_of_bounds = || FormatError::LumpOutOfBounds {
            lump,
            offset: self.file_ofs as i64,
            length: self.file_len as i64,
            file_size,
        };

        if self.file_len == 0 {
            return Ok(0..0);
        }
        let start = usize::try_from(self.file_ofs).map_err(|_| out_of_bounds())?;
        let len = usize::try_from(self.file_len).map_err(|_| out_of_bounds())?;
        let end = start.checked_add(len).ok_or_else(out_of_bounds)?;
        if end > file_size {
            return Err(out_of_bounds());
        }
        Ok(start..end)
    }
}

/// Decodes a flat record array, dropping a trailing partial record with a warning.
pub fn decode_records<T: bytemuck::Pod>(lump: LumpType, bytes: &[u8]) -> Box<[T]> {
    let item_size = std::mem::size_of::<T>();
    let count = bytes.len() / item_size;
    let residual = bytes.len() % item_size;
    if residual != 0 {
        log::warn!(
            "{lump:?} lump has {residual} residual bytes after {count} records of {item_size} bytes"
        );
    }
    bytemuck::pod_collect_to_vec::<u8, T>(&bytes[..count * item_size]).into_boxed_slice()
}
