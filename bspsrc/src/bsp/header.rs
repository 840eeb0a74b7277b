use std::fmt;

use bytemuck::Zeroable;

use crate::error::FormatError;

use super::{
    consts::{
        LumpType, HEADER_LUMPS, LZMA_IDENT, MAX_BSP_VERSION, MIN_BSP_VERSION, PSBV_IDENT,
        VBSP_IDENT,
    },
    lump::BSPLump,
};

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BSPHeader {
    pub ident: [u8; 4],                 // BSP file identifier
    pub version: i32,                   // BSP file version
    pub lumps: [BSPLump; HEADER_LUMPS], // lump directory array
    pub map_revision: i32,              // the map's revision (iteration, version) number
}

impl Default for BSPHeader {
    fn default() -> Self {
        Self {
            ident: VBSP_IDENT,
            version: 20,
            lumps: [BSPLump::zeroed(); HEADER_LUMPS],
            map_revision: 0,
        }
    }
}

impl fmt::Debug for BSPHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BSPHeader")
            .field("ident", &String::from_utf8_lossy(&self.ident))
            .field("version", &self.version)
            .field("map_revision", &self.map_revision)
            .finish()
    }
}

/// Byte order of the container. Only little endian files are decoded.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

impl BSPHeader {
    pub fn get_lump_header(&self, lump: LumpType) -> &BSPLump {
        &self.lumps[lump as usize]
    }

    pub fn byte_order(&self) -> ByteOrder {
        // This way around means little endian, PSBV is big endian
        if self.ident == PSBV_IDENT {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        }
    }

    /// Checks the magic number and version range.
    pub fn validate(&self) -> Result<(), FormatError> {
        if self.ident == PSBV_IDENT {
            return Err(FormatError::BigEndian);
        }
        if self.ident != VBSP_IDENT {
            // GoldSrc maps start straight with the version number
            let first = i32::from_le_bytes(self.ident);
            if first == 29 || first == 30 {
                return Err(FormatError::GoldSrc(first));
            }
            return Err(FormatError::BadMagic(self.ident));
        }

        let version = self.version;
        if version < MIN_BSP_VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }
        if version > MAX_BSP_VERSION {
            // Unknown newer branches usually keep the common layout
            log::warn!("BSP version {version} is newer than any known version, decoding anyway");
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        bytemuck::bytes_of(self).to_vec()
    }

    /// Same for every lump slot, whether compressed or not
    pub fn is_lzma(data: &[u8]) -> bool {
        data.len() >= 4 && data[..4] == LZMA_IDENT
    }
}

#[cfg(test)]
mod header_tests {
    use super::*;
    use crate::bsp::consts::HEADER_SIZE;

    #[test]
    fn header_layout() {
        assert_eq!(std::mem::size_of::<BSPHeader>(), HEADER_SIZE);
        assert_eq!(std::mem::size_of::<BSPLump>(), 16);
    }

    #[test]
    fn rejects_big_endian() {
        let header = BSPHeader {
            ident: PSBV_IDENT,
            ..Default::default()
        };
        assert_eq!(header.byte_order(), ByteOrder::BigEndian);
        assert_eq!(header.validate(), Err(FormatError::BigEndian));
    }

    #[test]
    fn rejects_goldsrc() {
        let header = BSPHeader {
            ident: 30i32.to_le_bytes(),
            ..Default::default()
        };
        assert_eq!(header.validate(), Err(FormatError::GoldSrc(30)));
    }

    #[test]
    fn version_range() {
        let mut header = BSPHeader::default();
        assert!(header.validate().is_ok());
        header.version = 12;
        assert_eq!(header.validate(), Err(FormatError::UnsupportedVersion(12)));
        header.version = 31;
        assert!(header.validate().is_ok());
    }
}
