use glam::IVec3;

use super::{
    consts::{LumpType, MAX_MAP_CUBEMAPSAMPLES},
    Lump,
};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BSPCubemapSample {
    pub origin: IVec3, // position of light snapped to the nearest integer
    pub size: i32,     // resolution of cubemap, 0 - default
}

impl Lump for BSPCubemapSample {
    fn max() -> usize {
        MAX_MAP_CUBEMAPSAMPLES
    }
    fn lump_type() -> LumpType {
        LumpType::Cubemaps
    }
}
