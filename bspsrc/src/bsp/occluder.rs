use glam::Vec3;

use crate::{binaries::RecordReader, error::FormatError};

/// Occluder entity record. Lump version 0 files lack the `area` field.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BSPOccluderData {
    pub flags: i32,
    pub first_poly: i32, // index into doccluderpolys
    pub poly_count: i32,
    pub mins: Vec3,
    pub maxs: Vec3,
    pub area: i32,
}

pub const OCCLUDER_DATA_SIZE_V0: usize = 36;
pub const OCCLUDER_DATA_SIZE_V1: usize = 40;

impl BSPOccluderData {
    pub fn polys(&self) -> std::ops::Range<usize> {
        let first = self.first_poly.max(0) as usize;
        first..first + self.poly_count.max(0) as usize
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BSPOccluderPolyData {
    pub first_vertex_index: i32, // index into doccludervertindices
    pub vertex_count: i32,       // amount of vertex indices
    pub plane_num: i32,
}

impl BSPOccluderPolyData {
    pub fn vertex_indices(&self) -> std::ops::Range<usize> {
        let first = self.first_vertex_index.max(0) as usize;
        first..first + self.vertex_count.max(0) as usize
    }
}

/// Contents of the occlusion lump: three count-prefixed arrays back to back
#[derive(Clone, Debug, Default)]
pub struct Occlusion {
    pub occluders: Vec<BSPOccluderData>,
    pub polys: Vec<BSPOccluderPolyData>,
    /// Indices into the vertex lump
    pub vertex_indices: Vec<i32>,
}

impl Occlusion {
    pub fn read(data: &[u8], lump_version: i32) -> Result<Self, FormatError> {
        if data.is_empty() {
            return Ok(Self::default());
        }
        let mut reader = RecordReader::new(data, "occlusion lump");
        let record_size = if lump_version == 0 {
            OCCLUDER_DATA_SIZE_V0
        } else {
            OCCLUDER_DATA_SIZE_V1
        };

        let count = reader.read_count()?;
        let mut occluders = Vec::new();
        for _ in 0..count {
            occluders.push(reader.read_sized(record_size)?);
        }

        let count = reader.read_count()?;
        let polys = reader.read_vec(count)?;

        let count = reader.read_count()?;
        let vertex_indices = reader.read_vec(count)?;

        if reader.remaining() > 0 {
            log::warn!("{} bytes remaining after reading occlusion lump", reader.remaining());
        }

        Ok(Self {
            occluders,
            polys,
            vertex_indices,
        })
    }
}
