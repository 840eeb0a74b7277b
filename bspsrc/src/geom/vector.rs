//! Vector helpers in the engine's conventions. Angles are pitch, yaw and roll
//! in degrees.

use glam::{DVec2, Vec3};

/// Rotates a point in a plane, keeping the quarter turns exact
fn rotate_2d(p: DVec2, degrees: f64) -> DVec2 {
    let angle = degrees % 360.0;
    if angle == 0.0 {
        p
    } else if angle == 90.0 {
        DVec2::new(-p.y, p.x)
    } else if angle == 180.0 {
        -p
    } else if angle == 270.0 {
        DVec2::new(p.y, -p.x)
    } else {
        let r = p.length();
        let theta = p.y.atan2(p.x) + angle.to_radians();
        DVec2::new(r * theta.cos(), r * theta.sin())
    }
}

/// Applies pitch around x, then yaw around y, then roll around z
pub fn rotate(v: Vec3, angles: Vec3) -> Vec3 {
    if angles == Vec3::ZERO {
        return v;
    }
    let (mut x, mut y, mut z) = (v.x as f64, v.y as f64, v.z as f64);
    if angles.x != 0.0 {
        let p = rotate_2d(DVec2::new(y, z), angles.x as f64);
        (y, z) = (p.x, p.y);
    }
    if angles.y != 0.0 {
        let p = rotate_2d(DVec2::new(x, z), angles.y as f64);
        (x, z) = (p.x, p.y);
    }
    if angles.z != 0.0 {
        let p = rotate_2d(DVec2::new(x, y), angles.z as f64);
        (x, y) = (p.x, p.y);
    }
    Vec3::new(x as f32, y as f32, z as f32)
}

/// Rounds every component to the nearest multiple of `value`
pub fn snap(v: Vec3, value: f32) -> Vec3 {
    (v / value).round() * value
}

pub fn is_valid(v: Vec3) -> bool {
    v.is_finite()
}

/// Stable "up" direction for building tangents on a plane: Y for floors and
/// ceilings, Z for everything else
pub fn face_basis_axis(normal: Vec3) -> Vec3 {
    let abs = normal.abs();
    if abs.z > abs.x && abs.z > abs.y {
        Vec3::Y
    } else {
        Vec3::Z
    }
}
