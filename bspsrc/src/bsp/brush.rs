use flagset::FlagSet;

use crate::app::AppId;

use super::{
    consts::{Contents, LumpType, MAX_MAP_BRUSHES, MAX_MAP_BRUSHSIDES},
    Lump,
};

/// Brushes are convex solids built from the intersection of their sides' half spaces.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BSPBrush {
    pub first_side: i32, // first brushside
    pub num_sides: i32,  // number of brushsides
    pub contents: i32,   // contents flags
}

impl BSPBrush {
    pub fn contents(&self) -> FlagSet<Contents> {
        FlagSet::new_truncated(self.contents)
    }

    /// Indices of the brush sides, clamped to the `side_count` sides the
    /// map actually has
    pub fn sides(&self, side_count: usize) -> std::ops::Range<usize> {
        let first = (self.first_side.max(0) as usize).min(side_count);
        let end = first
            .saturating_add(self.num_sides.max(0) as usize)
            .min(side_count);
        first..end
    }

    pub fn is_solid(&self) -> bool {
        self.contents().contains(Contents::SOLID)
    }

    pub fn is_detail(&self) -> bool {
        self.contents().contains(Contents::DETAIL)
    }

    pub fn is_areaportal(&self) -> bool {
        self.contents().contains(Contents::AREAPORTAL)
    }

    pub fn is_ladder(&self) -> bool {
        self.contents().contains(Contents::LADDER)
    }

    /// Solid detail brushes come from func_detail. Non-solid detail brushes are
    /// clips and triggers that the compiler also flags as detail. CS:GO ladders
    /// are func_detail too even though they are never solid.
    pub fn is_func_detail(&self, app: AppId) -> bool {
        if app == AppId::CounterStrikeGo {
            (self.is_solid() || self.is_ladder()) && self.is_detail()
        } else {
            self.is_solid() && self.is_detail()
        }
    }
}

impl Lump for BSPBrush {
    fn max() -> usize {
        MAX_MAP_BRUSHES
    }
    fn lump_type() -> LumpType {
        LumpType::Brushes
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BSPBrushSide {
    pub plane_num: u16, // facing out of the leaf
    pub tex_info: i16,  // texture info
    pub disp_info: i16, // displacement info
    pub bevel: u8,      // is the side a bevel plane?
    pub thin: u8,       // is a thin side?
}

impl BSPBrushSide {
    pub fn is_bevel(&self) -> bool {
        self.bevel != 0
    }
}

impl Lump for BSPBrushSide {
    fn max() -> usize {
        MAX_MAP_BRUSHSIDES
    }
    fn lump_type() -> LumpType {
        LumpType::BrushSides
    }
}
