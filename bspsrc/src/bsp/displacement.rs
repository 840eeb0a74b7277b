use flagset::{flags, FlagSet};
use glam::Vec3;

use super::{
    consts::{
        num_disp_power_tris, num_disp_power_verts, LumpType, DISP_INFO_FLAG_MAGIC,
        MAX_MAP_DISPINFO,
    },
    Lump,
};

flags! {
    /// Per displacement surface flags, only present when `min_tess` carries the magic bit
    pub enum DispSurfFlags: i32 {
        Surface = 0x1,
        Walkable = 0x2,
        Buildable = 0x4,
        SurfProp1 = 0x8,
        SurfProp2 = 0x10,
    }

    /// Tags on each displacement triangle
    pub enum DispTriTags: u16 {
        Surface = 0x1,
        Walkable = 0x2,
        Buildable = 0x4,
        SurfProp1 = 0x8,
        SurfProp2 = 0x10,
        Remove = 0x20,
    }
}

/// Neighbour and corner info of a displacement, kept opaque
pub type DispNeighbours = [u32; 22];

// https://developer.valvesoftware.com/wiki/BSP_(Source)#Displacements
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BSPDispInfo {
    pub start_position: Vec3,        // start position used for orientation
    pub disp_vert_start: i32,        // Index into LUMP_DISP_VERTS.
    pub disp_tri_start: i32,         // Index into LUMP_DISP_TRIS.
    pub power: i32,                  // power - indicates size of surface (2^power	1)
    pub min_tess: i32,               // minimum tesselation allowed
    pub smoothing_angle: f32,        // lighting smoothing angle
    pub contents: i32,               // surface contents
    pub map_face: u16,               // Which map face this displacement comes from.
    pub padding: u16,
    pub lightmap_alpha_start: i32, // Index into ddisplightmapalpha.
    pub lightmap_sample_position_start: i32, // Index into LUMP_DISP_LIGHTMAP_SAMPLE_POSITIONS.
    pub neighbours: DispNeighbours,
    pub allowed_verts: [u32; 10], // active verticies
}

impl BSPDispInfo {
    pub fn power(&self) -> u32 {
        self.power.clamp(0, 8) as u32
    }

    /// Vertices along one edge
    pub fn power_size(&self) -> usize {
        (1 << self.power()) + 1
    }

    pub fn vertex_count(&self) -> usize {
        num_disp_power_verts(self.power())
    }

    pub fn triangle_count(&self) -> usize {
        num_disp_power_tris(self.power())
    }

    pub fn verts(&self) -> std::ops::Range<usize> {
        let first = self.disp_vert_start.max(0) as usize;
        first..first + self.vertex_count()
    }

    pub fn tris(&self) -> std::ops::Range<usize> {
        let first = self.disp_tri_start.max(0) as usize;
        first..first + self.triangle_count()
    }

    /// Surface flags, if this map version stores them
    pub fn surface_flags(&self) -> Option<FlagSet<DispSurfFlags>> {
        (self.min_tess & DISP_INFO_FLAG_MAGIC != 0)
            .then(|| FlagSet::new_truncated(self.min_tess & !DISP_INFO_FLAG_MAGIC))
    }
}

impl Lump for BSPDispInfo {
    fn max() -> usize {
        MAX_MAP_DISPINFO
    }
    fn lump_type() -> LumpType {
        LumpType::DispInfo
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BSPDispVert {
    pub vec: Vec3,  // Vector field defining displacement volume.
    pub dist: f32,  // Displacement distances.
    pub alpha: f32, // "per vertex" alpha values.
}

impl Lump for BSPDispVert {
    fn max() -> usize {
        usize::MAX
    }
    fn lump_type() -> LumpType {
        LumpType::DispVerts
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BSPDispTri {
    pub tags: u16,
}

impl BSPDispTri {
    pub fn tags(&self) -> FlagSet<DispTriTags> {
        FlagSet::new_truncated(self.tags)
    }
}

impl Lump for BSPDispTri {
    fn max() -> usize {
        usize::MAX
    }
    fn lump_type() -> LumpType {
        LumpType::DispTris
    }
}
