use glam::Vec3;

use super::{
    consts::{LumpType, MAX_MAP_MODELS},
    Lump,
};

/// A brush model. Model 0 is the world, every other model belongs to one brush entity.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BSPModel {
    pub mins: Vec3,
    pub maxs: Vec3,
    pub origin: Vec3,
    pub headnode: i32,
    pub firstface: i32,
    pub numfaces: i32,
}

impl BSPModel {
    pub fn faces(&self) -> std::ops::Range<usize> {
        let first = self.firstface.max(0) as usize;
        first..first + self.numfaces.max(0) as usize
    }
}

impl Lump for BSPModel {
    fn max() -> usize {
        MAX_MAP_MODELS
    }

    fn lump_type() -> LumpType {
        LumpType::Models
    }
}
