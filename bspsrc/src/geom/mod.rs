pub mod aabb;
pub mod vector;
pub mod winding;

pub use aabb::Aabb;
pub use winding::Winding;

use crate::bsp::{brush::BSPBrush, BspData};

/// Bounds of all side windings of a brush
pub fn brush_bounds(bsp: &BspData, brush: &BSPBrush) -> Aabb {
    (0..brush.sides(bsp.brush_sides.len()).len())
        .map(|side| Winding::from_side(bsp, brush, side).bounds())
        .fold(Aabb::EMPTY, |bounds, side| bounds.include(&side))
}
