use glam::Vec3;

use super::{
    consts::{LumpType, MAX_MAP_PLANES},
    Lump,
};

///Plane
///
///The basis of the BSP geometry is defined by planes, which are used as splitting surfaces across the BSP tree structure.
///
/// The plane is represented by the element normal, a normal vector, which is a unit vector (length 1.0) perpendicular to the plane's surface. The position of the plane is given by dist, which is the distance from the map origin (0,0,0) to the nearest point on the plane.
///
/// Mathematically, the plane is described by the set of points (x, y, z) which satisfy the equation:
///
/// `Ax + By + Cz = D`
///
/// Note that planes have a particular orientation, corresponding to which side is considered "in front" of the plane, and which is "behind". The orientation of a plane can be flipped by negating the A, B, C, and D components.
///
/// The type member of the structure contains the axis that the plane is facing. It can be 0-5, with 0, 1, and 2 corresponding with X, Y, and Z respectively. Values of 3, 4 and 5 are used when planes are not along an axis, with each number corresponding to the axis it is closest to.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BSPPlane {
    pub normal: Vec3, // normal vector
    pub dist: f32,    // distance from origin
    pub axis: i32,    // plane axis identifier
}

impl BSPPlane {
    pub fn new(normal: Vec3, dist: f32) -> Self {
        let abs = normal.abs();
        let axis = if abs.x == 1.0 {
            0
        } else if abs.y == 1.0 {
            1
        } else if abs.z == 1.0 {
            2
        } else if abs.x >= abs.y && abs.x >= abs.z {
            3
        } else if abs.y >= abs.x && abs.y >= abs.z {
            4
        } else {
            5
        };
        Self { normal, dist, axis }
    }

    /// Plane facing the other way
    pub fn flip(&self) -> Self {
        Self::new(-self.normal, -self.dist)
    }

    pub fn distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) - self.dist
    }

    /// Plane through three points, winding clockwise when seen from the front
    pub fn from_points(a: Vec3, b: Vec3, c: Vec3) -> Option<Self> {
        let normal = (c - a).cross(b - a).try_normalize()?;
        Some(Self::new(normal, normal.dot(a)))
    }
}

impl Lump for BSPPlane {
    fn max() -> usize {
        MAX_MAP_PLANES
    }

    fn lump_type() -> LumpType {
        LumpType::Planes
    }
}
