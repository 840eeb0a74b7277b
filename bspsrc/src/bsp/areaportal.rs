use super::{
    consts::{LumpType, MAX_MAP_AREAPORTALS, MAX_MAP_PORTALVERTS},
    Lump,
};
use glam::Vec3;

/// Portal between two areas. Its polygon lives in the clip portal vertex lump.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BSPAreaPortal {
    pub portal_key: u16, // Entities have a key called portalnumber (and in vbsp a variable
    // called areaportalnum) which is used to bind them to the area portals by comparing with this value.
    pub other_area: u16, // The area this portal looks into.
    pub first_clip_portal_vert: u16, // Portal geometry.
    pub clip_portal_verts: u16,
    pub plane_num: i32,
}

impl BSPAreaPortal {
    pub fn verts(&self) -> std::ops::Range<usize> {
        let first = self.first_clip_portal_vert as usize;
        first..first + self.clip_portal_verts as usize
    }
}

impl Lump for BSPAreaPortal {
    fn max() -> usize {
        MAX_MAP_AREAPORTALS
    }
    fn lump_type() -> LumpType {
        LumpType::AreaPortals
    }
}

/// Vertex of an area portal polygon
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BSPClipPortalVert {
    pub point: Vec3,
}

impl Lump for BSPClipPortalVert {
    fn max() -> usize {
        MAX_MAP_PORTALVERTS
    }
    fn lump_type() -> LumpType {
        LumpType::ClipPortalVerts
    }
}

#[cfg(test)]
mod areaportal_tests {
    use super::*;

    #[test]
    fn layout() {
        assert_eq!(std::mem::size_of::<BSPAreaPortal>(), 12);
    }
}
