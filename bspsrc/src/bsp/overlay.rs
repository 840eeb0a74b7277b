use glam::Vec3;

use super::{
    consts::{
        LumpType, MAX_MAP_OVERLAYS, OVERLAY_BSP_FACE_COUNT, OVERLAY_RENDER_ORDER_MASK,
        OVERLAY_RENDER_ORDER_NUM_BITS,
    },
    Lump,
};

/// Compiled `info_overlay`, projected onto up to 64 faces
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BSPOverlay {
    pub id: i32,
    pub tex_info: i16,
    pub face_count_and_render_order: u16, // render order in the top two bits
    pub ofaces: [i32; OVERLAY_BSP_FACE_COUNT],
    pub u: [f32; 2],
    pub v: [f32; 2],
    pub uv_points: [Vec3; 4],
    pub origin: Vec3,
    pub basis_normal: Vec3,
}

impl BSPOverlay {
    pub fn face_count(&self) -> usize {
        ((self.face_count_and_render_order & !OVERLAY_RENDER_ORDER_MASK) as usize)
            .min(OVERLAY_BSP_FACE_COUNT)
    }

    pub fn render_order(&self) -> u16 {
        self.face_count_and_render_order >> (16 - OVERLAY_RENDER_ORDER_NUM_BITS)
    }

    pub fn faces(&self) -> &[i32] {
        &self.ofaces[..self.face_count()]
    }
}

impl Lump for BSPOverlay {
    fn max() -> usize {
        MAX_MAP_OVERLAYS
    }
    fn lump_type() -> LumpType {
        LumpType::Overlays
    }
}
