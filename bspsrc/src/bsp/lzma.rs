use crate::{binaries::RecordReader, error::FormatError};

use super::consts::LZMA_IDENT;

/// Header written by the engine in front of every compressed lump. It is not
/// the header of a standard .lzma stream, which is rebuilt before decoding.
#[repr(C, packed)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LzmaHeader {
    pub id: [u8; 4],
    pub actual_size: u32,
    pub lzma_size: u32,
    pub properties: [u8; 5],
}

pub const LZMA_HEADER_SIZE: usize = std::mem::size_of::<LzmaHeader>();

impl LzmaHeader {
    pub fn read(data: &[u8]) -> Result<Self, FormatError> {
        let header: LzmaHeader = RecordReader::new(data, "LZMA header").read()?;
        let id = header.id;
        if id != LZMA_IDENT {
            return Err(FormatError::BadMagic(id));
        }
        Ok(header)
    }
}

/// Decompresses an engine LZMA block into its declared uncompressed size.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, FormatError> {
    let header = LzmaHeader::read(data)?;
    let actual_size = header.actual_size as usize;
    let lzma_size = header.lzma_size as usize;
    let properties = header.properties;

    let payload = &data[LZMA_HEADER_SIZE..];
    if payload.len() < lzma_size {
        return Err(FormatError::CompressedSizeMismatch {
            declared: lzma_size,
            available: payload.len(),
        });
    }

    // standard header: properties, dictionary size, 64 bit uncompressed size
    let mut stream = Vec::with_capacity(13 + lzma_size);
    stream.extend_from_slice(&properties);
    stream.extend_from_slice(&(actual_size as u64).to_le_bytes());
    stream.extend_from_slice(&payload[..lzma_size]);

    let mut out = Vec::new();
    lzma_rs::lzma_decompress(&mut &stream[..], &mut out)
        .map_err(|e| FormatError::Decompress(e.to_string()))?;

    if out.len() != actual_size {
        return Err(FormatError::DecompressedSizeMismatch {
            expected: actual_size,
            actual: out.len(),
        });
    }
    Ok(out)
}

/// Compresses `data` into an engine LZMA block. Used by tests to build
/// compressed lumps.
#[cfg(test)]
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut standard = Vec::new();
    lzma_rs::lzma_compress(&mut &data[..], &mut standard).unwrap();
    // properties (5) + uncompressed size (8)
    let payload = &standard[13..];

    let mut out = Vec::with_capacity(LZMA_HEADER_SIZE + payload.len());
    out.extend_from_slice(&LZMA_IDENT);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&standard[..5]);
    out.extend_from_slice(payload);
    out
}

#[cfg(test)]
mod lzma_tests {
    use super::*;

    #[test]
    fn header_size() {
        assert_eq!(LZMA_HEADER_SIZE, 17);
    }

    #[test]
    fn decompresses() {
        let data: Vec<u8> = (0..2000u32).map(|i| (i % 7) as u8).collect();
        let block = compress(&data);
        assert_eq!(decompress(&block).unwrap(), data);
    }

    #[test]
    fn tampered_compressed_size() {
        let data = vec![42u8; 500];
        let mut block = compress(&data);
        let bogus = (block.len() as u32) * 2;
        block[8..12].copy_from_slice(&bogus.to_le_bytes());
        assert!(matches!(
            decompress(&block),
            Err(FormatError::CompressedSizeMismatch { .. })
        ));
    }

    #[test]
    fn tampered_actual_size() {
        let data = vec![42u8; 500];
        let mut block = compress(&data);
        block[4..8].copy_from_slice(&100_000u32.to_le_bytes());
        assert!(decompress(&block).is_err());
    }

    #[test]
    fn short_block() {
        assert!(decompress(b"LZMA\x01\x00").is_err());
    }
}
