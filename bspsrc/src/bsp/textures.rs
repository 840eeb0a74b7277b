use flagset::FlagSet;
use glam::{Vec3, Vec4};

use super::{
    consts::{LumpType, SurfFlags, MAX_MAP_TEXDATA, MAX_MAP_TEXDATA_STRING_TABLE, MAX_MAP_TEXINFO},
    Lump,
};

// Texinfo
//
// The first array of floats is in essence two vectors that represent how the texture is orientated and scaled when rendered on the world geometry. The two vectors, s and t, are the mapping of the left-to-right and down-to-up directions in the texture pixel coordinate space, onto the world. Each vector has an x, y, and z component, plus an offset which is the "shift" of the texture in that direction relative to the world. The length of the vectors represent the scaling of the texture in each direction.
//
// The 2D coordinates (u, v) of a texture pixel (or texel) are mapped to the world coordinates (x, y, z) of a point on a face by:
//
// u = tv0,0 * x + tv0,1 * y + tv0,2 * z + tv0,3
//
// v = tv1,0 * x + tv1,1 * y + tv1,2 * z + tv1,3
//
// The lightmapVecs float array performs a similar mapping of the lightmap samples of the texture onto the world.
//
// The flags seem to be derived from the texture's .vmt file contents, and specify special properties of that texture.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BSPTexInfo {
    /// [s/t][xyz offset]
    pub texture_vecs: [[f32; 4]; 2],
    /// [s/t][xyz offset] - length is in units of texels/area
    pub lightmap_vecs: [[f32; 4]; 2],
    pub flags: i32,    // miptex flags overrides
    pub tex_data: i32, // Pointer to texture name, size, etc.
}

impl BSPTexInfo {
    pub fn flags(&self) -> FlagSet<SurfFlags> {
        FlagSet::new_truncated(self.flags)
    }

    /// Texture axes as (xyz, shift) pairs
    pub fn texture_axes(&self) -> [Vec4; 2] {
        self.texture_vecs.map(Vec4::from_array)
    }

    pub fn lightmap_scale(&self) -> f32 {
        Vec3::from_slice(&self.lightmap_vecs[0][..3]).length()
    }
}

impl Lump for BSPTexInfo {
    fn max() -> usize {
        MAX_MAP_TEXINFO
    }
    fn lump_type() -> LumpType {
        LumpType::TexInfo
    }
}

///Texdata
///
///The index of a Texinfo (referenced from a face or brushside) may be given as -1; this indicates that no texture information is associated with this face. This occurs on compiling brush faces given the SKIP, CLIP, or INVISIBLE type textures in the editor.
///
/// The nameStringTableID is an index into the TexdataStringTable array (below). The other members relate to the texture's source image.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BSPTexData {
    pub reflectivity: Vec3,         // RGB reflectivity
    pub name_string_table_id: i32, // index into TexdataStringTable
    pub width: i32,
    pub height: i32, // source image
    pub view_width: i32,
    pub view_height: i32,
}

impl Lump for BSPTexData {
    fn max() -> usize {
        MAX_MAP_TEXDATA
    }
    fn lump_type() -> LumpType {
        LumpType::TexData
    }
}

/// The TexdataStringTable (Lump 44) is an array of integers which are offsets into the TexdataStringData (lump 43). The TexdataStringData lump consists of concatenated null-terminated strings giving the texture name.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BSPTexDataStringTable {
    pub index: i32,
}

impl BSPTexDataStringTable {
    pub fn get_filename(&self, string_data: &[u8]) -> Option<String> {
        let start = usize::try_from(self.index).ok()?;
        let tail = string_data.get(start..)?;
        let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        Some(String::from_utf8_lossy(&tail[..end]).into_owned())
    }
}

impl Lump for BSPTexDataStringTable {
    fn max() -> usize {
        MAX_MAP_TEXDATA_STRING_TABLE
    }
    fn lump_type() -> LumpType {
        LumpType::TexDataStringTable
    }
}

/// Resolves every string table entry, keeping the table's indexing
pub fn texture_names(table: &[BSPTexDataStringTable], string_data: &[u8]) -> Vec<String> {
    table
        .iter()
        .map(|entry| {
            entry.get_filename(string_data).unwrap_or_else(|| {
                let index = entry.index;
                log::warn!("Texture name offset {index} outside string data");
                String::new()
            })
        })
        .collect()
}

#[cfg(test)]
mod textures_tests {
    use super::*;

    #[test]
    fn names_from_string_table() {
        let data = b"TOOLS/TOOLSNODRAW\0brick/brickwall001\0";
        let table = [
            BSPTexDataStringTable { index: 0 },
            BSPTexDataStringTable { index: 18 },
            BSPTexDataStringTable { index: 500 },
        ];
        let names = texture_names(&table, data);
        assert_eq!(names, vec!["TOOLS/TOOLSNODRAW", "brick/brickwall001", ""]);
    }

    #[test]
    fn layouts() {
        assert_eq!(std::mem::size_of::<BSPTexInfo>(), 72);
        assert_eq!(std::mem::size_of::<BSPTexData>(), 32);
    }
}
