use std::borrow::Cow;

use crate::{app::AppId, binaries::RecordReader, error::FormatError};

use super::{header::BSPHeader, lzma};

/// Static prop game lump tag
pub const SPRP_ID: [u8; 4] = *b"sprp";

/// Flag set on compressed game lumps
const GAME_LUMP_COMPRESSED: i32 = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameLumpEntry {
    /// Four character tag, stored reversed in the file
    pub id: [u8; 4],
    pub flags: i32,
    pub version: i32,
    /// Byte range relative to the start of the game lump
    pub range: std::ops::Range<usize>,
}

impl GameLumpEntry {
    pub fn name(&self) -> String {
        let name = String::from_utf8_lossy(&self.id).into_owned();
        if name.trim_matches(|c: char| c == '\0' || c.is_whitespace()).is_empty() {
            "<dummy>".to_owned()
        } else {
            name
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.flags & GAME_LUMP_COMPRESSED != 0
    }
}

/// Sub-directory stored inside the game lump
#[derive(Clone, Debug, Default)]
pub struct GameLumpDirectory {
    pub entries: Vec<GameLumpEntry>,
}

impl GameLumpDirectory {
    /// Parses the directory. `lump_offset` is the file offset of the game
    /// lump, entry offsets are usually relative to the whole file.
    pub fn read(data: &[u8], lump_offset: usize, app: AppId) -> Result<Self, FormatError> {
        if data.is_empty() {
            return Ok(Self::default());
        }
        let vindictus = app == AppId::Vindictus;
        let dark_messiah = app == AppId::DarkMessiah;
        let entry_size = if vindictus { 20 } else { 16 };
        let mut reader = RecordReader::new(data, "game lump directory");
        let count = reader.read_count()?;
        let mut entries = Vec::with_capacity(count.min(reader.remaining() / entry_size));

        for i in 0..count {
            if dark_messiah {
                reader.skip(4)?;
            }
            let mut id: [u8; 4] = reader.read()?;
            id.reverse();

            let (flags, version) = if vindictus {
                (reader.read::<i32>()?, reader.read::<i32>()?)
            } else {
                (reader.read::<u16>()? as i32, reader.read::<u16>()? as i32)
            };
            let mut offset = reader.read::<i32>()? as i64;
            let mut length = reader.read::<i32>()? as i64;

            if flags & GAME_LUMP_COMPRESSED != 0 {
                // length holds the uncompressed size, the stored size runs up to the next entry
                let skip = (if vindictus { 12 } else { 8 }) + (if dark_messiah { 4 } else { 0 });
                let next = data
                    .get(reader.position() + skip..)
                    .filter(|_| i + 1 < count)
                    .and_then(|rest| rest.get(..4))
                    .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i64)
                    .filter(|&next| next != 0)
                    .unwrap_or((lump_offset + data.len()) as i64);
                length = next - offset;
            }

            if offset - lump_offset as i64 > 0 {
                offset -= lump_offset as i64;
            }

            let lump_len = data.len() as i64;
            let name = String::from_utf8_lossy(&id).into_owned();
            if offset > lump_len || offset < 0 {
                log::warn!("Invalid game lump offset {offset} in {name}, assuming {lump_len}");
                offset = offset.clamp(0, lump_len);
                length = 0;
            }
            if offset + length > lump_len || length < 0 {
                let fixed = if length < 0 { 0 } else { lump_len - offset };
                log::warn!("Invalid game lump length {length} in {name}, assuming {fixed}");
                length = fixed;
            }

            entries.push(GameLumpEntry {
                id,
                flags,
                version,
                range: offset as usize..(offset + length) as usize,
            });
        }

        log::debug!("Game lumps: {}", entries.len());
        Ok(Self { entries })
    }

    pub fn find(&self, id: [u8; 4]) -> Option<&GameLumpEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Bytes of one entry, decompressed if needed
    pub fn bytes<'a>(
        &self,
        entry: &GameLumpEntry,
        data: &'a [u8],
    ) -> Result<Cow<'a, [u8]>, FormatError> {
        let bytes = data
            .get(entry.range.clone())
            .ok_or_else(|| FormatError::GameLumpOutOfBounds {
                tag: entry.name(),
                offset: entry.range.start as i64,
                length: entry.range.len() as i64,
            })?;
        if BSPHeader::is_lzma(bytes) {
            Ok(Cow::Owned(lzma::decompress(bytes)?))
        } else {
            Ok(Cow::Borrowed(bytes))
        }
    }
}

/// Vindictus stores flags and version as ints. Its directory reads as garbage
/// with the standard layout but parses cleanly with the wider one.
pub fn looks_like_vindictus(data: &[u8]) -> bool {
    !tags_valid(data, 16) && tags_valid(data, 20)
}

fn tags_valid(data: &[u8], entry_size: usize) -> bool {
    let mut reader = RecordReader::new(data, "game lump directory");
    let Ok(count) = reader.read_count() else {
        return false;
    };
    (0..count).all(|_| match reader.bytes(4) {
        Ok(tag) => {
            tag.iter().all(u8::is_ascii_alphanumeric) && reader.skip(entry_size - 4).is_ok()
        }
        Err(_) => false,
    })
}

#[cfg(test)]
mod gamelump_tests {
    use super::*;

    fn directory(entries: &[(&[u8; 4], u16, u16, &[u8])], lump_offset: usize) -> Vec<u8> {
        let header_len = 4 + entries.len() * 16;
        let mut out = (entries.len() as i32).to_le_bytes().to_vec();
        let mut payload = Vec::new();
        for (id, flags, version, data) in entries {
            let mut tag = **id;
            tag.reverse();
            out.extend(tag);
            out.extend(flags.to_le_bytes());
            out.extend(version.to_le_bytes());
            out.extend(((lump_offset + header_len + payload.len()) as i32).to_le_bytes());
            out.extend((data.len() as i32).to_le_bytes());
            payload.extend_from_slice(data);
        }
        out.extend(payload);
        out
    }

    #[test]
    fn reads_entries_and_skips_unknown() {
        let data = directory(&[(b"xxxx", 0, 3, b"abcdef"), (b"sprp", 0, 10, b"1234")], 1000);
        let dir = GameLumpDirectory::read(&data, 1000, AppId::Unknown).unwrap();
        assert_eq!(dir.entries.len(), 2);

        let sprp = dir.find(SPRP_ID).unwrap();
        assert_eq!(sprp.version, 10);
        assert_eq!(&dir.bytes(sprp, &data).unwrap()[..], b"1234");
        assert!(!looks_like_vindictus(&data));
    }

    #[test]
    fn compressed_entry() {
        let raw = b"static prop payload".repeat(4);
        let packed = lzma::compress(&raw);
        let data = directory(&[(b"sprp", 1, 6, &packed)], 0);
        let dir = GameLumpDirectory::read(&data, 0, AppId::Unknown).unwrap();
        let sprp = dir.find(SPRP_ID).unwrap();
        assert!(sprp.is_compressed());
        assert_eq!(sprp.range.len(), packed.len());
        assert_eq!(&dir.bytes(sprp, &data).unwrap()[..], &raw[..]);
    }

    #[test]
    fn bad_offsets_are_clamped() {
        let mut data = directory(&[(b"sprp", 0, 6, b"1234")], 0);
        // length runs past the end
        data[16..20].copy_from_slice(&100i32.to_le_bytes());
        let dir = GameLumpDirectory::read(&data, 0, AppId::Unknown).unwrap();
        assert_eq!(dir.entries[0].range, 20..24);
    }
}
