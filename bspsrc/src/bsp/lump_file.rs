//! External `.lmp` files that replace a single lump of a map.

use num_traits::FromPrimitive;

use crate::{binaries::RecordReader, error::FormatError};

use super::consts::{LumpType, HEADER_LUMPS};

/// `offset`, `id`, `version`, `length`, `map revision`
pub const LUMP_FILE_HEADER_SIZE: usize = 20;

/// Lump files are numbered `<map>_l_0.lmp` upwards
pub const MAX_LUMP_FILES: usize = 128;

/// Lump contents loaded from a `.lmp` file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalLump {
    pub lump: LumpType,
    /// Offset of the contents inside the `.lmp` file. Game lump offsets are
    /// relative to it.
    pub offset: usize,
    pub version: i32,
    pub map_revision: i32,
    pub data: Vec<u8>,
}

impl ExternalLump {
    /// Reads the header and slices out the contents. A bad offset or length
    /// is clamped to the file like the engine does.
    pub fn read(file: &[u8]) -> Result<Self, FormatError> {
        let mut r = RecordReader::new(file, "lump file header");
        let offset: i32 = r.read()?;
        let id: i32 = r.read()?;
        let version: i32 = r.read()?;
        let length: i32 = r.read()?;
        let map_revision: i32 = r.read()?;

        let lump = usize::try_from(id)
            .ok()
            .filter(|&i| i < HEADER_LUMPS)
            .and_then(LumpType::from_usize)
            .ok_or(FormatError::BadLumpId(id))?;

        let offset = match usize::try_from(offset) {
            Ok(offset) if offset <= file.len() => offset,
            _ => {
                log::warn!("Invalid offset {offset} for lump {lump:?}, assuming {LUMP_FILE_HEADER_SIZE}");
                LUMP_FILE_HEADER_SIZE
            }
        };
        let available = file.len() - offset;
        let length = match usize::try_from(length) {
            Ok(length) if length <= available => length,
            _ => {
                log::warn!("Invalid size {length} for lump {lump:?}, assuming {available}");
                available
            }
        };

        log::debug!("Lump file holds {lump:?} v{version}, {length} bytes, revision {map_revision}");
        Ok(Self {
            lump,
            offset,
            version,
            map_revision,
            data: file[offset..offset + length].to_vec(),
        })
    }

    /// Serialized form, header followed by the contents
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(LUMP_FILE_HEADER_SIZE + self.data.len());
        out.extend((LUMP_FILE_HEADER_SIZE as i32).to_le_bytes());
        out.extend((self.lump as i32).to_le_bytes());
        out.extend(self.version.to_le_bytes());
        out.extend((self.data.len() as i32).to_le_bytes());
        out.extend(self.map_revision.to_le_bytes());
        out.extend(&self.data);
        out
    }
}

#[cfg(test)]
mod lump_file_tests {
    use super::*;

    fn header(offset: i32, id: i32, length: i32) -> Vec<u8> {
        [offset, id, 1, length, 7]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect()
    }

    #[test]
    fn reads_header_and_contents() {
        let lump = ExternalLump {
            lump: LumpType::Entities,
            offset: LUMP_FILE_HEADER_SIZE,
            version: 0,
            map_revision: 3,
            data: b"{\n\"classname\" \"worldspawn\"\n}\n".to_vec(),
        };
        assert_eq!(ExternalLump::read(&lump.to_bytes()), Ok(lump));
    }

    #[test]
    fn bad_ranges_are_clamped() {
        let mut file = header(-1, LumpType::Planes as i32, 1000);
        file.extend([1, 2, 3, 4]);
        let lump = ExternalLump::read(&file).unwrap();
        assert_eq!(lump.lump, LumpType::Planes);
        assert_eq!(lump.offset, LUMP_FILE_HEADER_SIZE);
        assert_eq!(lump.data, [1, 2, 3, 4]);
        assert_eq!(lump.map_revision, 7);
    }

    #[test]
    fn bad_headers_are_errors() {
        assert!(matches!(
            ExternalLump::read(&[0; 12]),
            Err(FormatError::Truncated { .. })
        ));
        assert_eq!(
            ExternalLump::read(&header(20, 64, 0)),
            Err(FormatError::BadLumpId(64))
        );
        assert_eq!(
            ExternalLump::read(&header(20, -2, 0)),
            Err(FormatError::BadLumpId(-2))
        );
    }
}
