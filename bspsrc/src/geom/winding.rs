//! Convex planar polygons. Not wind like the air, but wind like a watch.

use glam::Vec3;

use crate::bsp::{
    areaportal::BSPAreaPortal, brush::BSPBrush, face::BSPFace, occluder::BSPOccluderPolyData,
    plane::BSPPlane, BspData,
};

use super::{vector, Aabb};

/// Half diagonal of the largest possible world, sqrt(3) * 32768
pub const MAX_LEN: f32 = 56756.0;
pub const MAX_COORD: f32 = 32768.0;

pub const EPS_SPLIT: f32 = 0.01;
pub const EPS_COMP: f32 = 0.5;
pub const EPS_DEGEN: f32 = 0.1;
pub const COLLINEAR_COS: f32 = 0.999;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Side {
    Front,
    Back,
    On,
}

/// Ordered vertices of a convex polygon. Clockwise when seen from the front
/// of the plane it lies on.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Winding {
    verts: Vec<Vec3>,
}

impl From<Vec<Vec3>> for Winding {
    fn from(verts: Vec<Vec3>) -> Self {
        Self { verts }
    }
}

impl std::ops::Deref for Winding {
    type Target = [Vec3];

    fn deref(&self) -> &[Vec3] {
        &self.verts
    }
}

impl Winding {
    pub fn new(verts: Vec<Vec3>) -> Self {
        Self { verts }
    }

    pub fn into_verts(self) -> Vec<Vec3> {
        self.verts
    }

    /// Huge square on the plane, clockwise seen from the front
    pub fn from_plane(plane: &BSPPlane) -> Self {
        let normal = plane.normal;
        let abs = normal.abs();
        if !normal.is_finite() || abs.max_element() <= 0.0 {
            log::warn!("Plane {plane:?} has a bad normal");
            return Self::default();
        }

        // z is up unless the normal is mostly along z itself
        let up = if abs.z > abs.x && abs.z > abs.y {
            Vec3::X
        } else {
            Vec3::Z
        };

        let up = (up - normal * up.dot(normal)).normalize();
        let origin = normal * plane.dist;
        let right = up.cross(normal);

        let up = up * MAX_LEN;
        let right = right * MAX_LEN;

        Self::new(vec![
            origin - right + up,
            origin + right + up,
            origin + right - up,
            origin - right - up,
        ])
    }

    /// One side of a brush, clipped by every other non-bevel side
    pub fn from_side(bsp: &BspData, brush: &BSPBrush, side: usize) -> Self {
        let sides = brush.sides(bsp.brush_sides.len());
        let Some(bside) = bsp.brush_sides.get(sides.start + side) else {
            return Self::default();
        };
        let Some(plane) = bsp.planes.get(bside.plane_num as usize) else {
            return Self::default();
        };

        let mut w = Self::from_plane(plane);
        for (i, other) in sides.clone().enumerate() {
            if i == side {
                continue;
            }
            let Some(other) = bsp.brush_sides.get(other) else {
                continue;
            };
            if other.is_bevel() {
                continue;
            }
            let Some(plane) = bsp.planes.get(other.plane_num as usize) else {
                continue;
            };
            // keep everything behind the other side
            w = w.clip_plane(&plane.flip(), false);
        }
        w
    }

    pub fn from_face(bsp: &BspData, face: &BSPFace) -> Self {
        face.get_verts(&bsp.edges, &bsp.surfedges)
            .into_iter()
            .filter_map(|v| bsp.vertexes.get(v).copied())
            .collect::<Vec<_>>()
            .into()
    }

    pub fn from_areaportal(bsp: &BspData, portal: &BSPAreaPortal) -> Self {
        bsp.clip_portal_verts
            .get(portal.verts())
            .unwrap_or_default()
            .iter()
            .map(|v| v.point)
            .collect::<Vec<_>>()
            .into()
    }

    pub fn from_occluder(bsp: &BspData, poly: &BSPOccluderPolyData) -> Self {
        bsp.occlusion
            .vertex_indices
            .get(poly.vertex_indices())
            .unwrap_or_default()
            .iter()
            .filter_map(|&v| bsp.vertexes.get(usize::try_from(v).ok()?).copied())
            .collect::<Vec<_>>()
            .into()
    }

    /// True if the winding still has a corner of the base winding, which
    /// means the brush was not closed
    pub fn is_huge(&self) -> bool {
        self.verts
            .iter()
            .any(|v| v.abs().max_element() > MAX_COORD)
    }

    /// Splits by the plane `normal . p = dist`, keeping the part in front of
    /// it, or behind it if `back` is set. Points within `eps` of the plane
    /// count as on it and are always kept.
    pub fn clip_epsilon(&self, normal: Vec3, dist: f32, eps: f32, back: bool) -> Self {
        let size = self.verts.len();
        let dists: Vec<f32> = self.verts.iter().map(|v| v.dot(normal) - dist).collect();
        let sides: Vec<Side> = dists
            .iter()
            .map(|&d| {
                if d > eps {
                    Side::Front
                } else if d < -eps {
                    Side::Back
                } else {
                    Side::On
                }
            })
            .collect();

        let front = sides.iter().filter(|&&s| s == Side::Front).count();
        let behind = sides.iter().filter(|&&s| s == Side::Back).count();

        if front == 0 {
            return if back { self.clone() } else { Self::default() };
        }
        if behind == 0 {
            return if back { Self::default() } else { self.clone() };
        }

        let keep = if back { Side::Back } else { Side::Front };
        let mut out = Vec::with_capacity(size + 4);
        for i in 0..size {
            let j = (i + 1) % size;
            let p1 = self.verts[i];

            if sides[i] == Side::On {
                out.push(p1);
                continue;
            }
            if sides[i] == keep {
                out.push(p1);
            }
            if sides[j] == Side::On || sides[j] == sides[i] {
                continue;
            }

            // crossing the plane between this vertex and the next
            let p2 = self.verts[j];
            let t = dists[i] / (dists[i] - dists[j]);
            let mut mid = p1 + (p2 - p1) * t;
            // avoid round off error when possible
            for axis in 0..3 {
                if normal[axis] == 1.0 {
                    mid[axis] = dist;
                } else if normal[axis] == -1.0 {
                    mid[axis] = -dist;
                }
            }
            out.push(mid);
        }

        Self::new(out)
    }

    pub fn clip_plane(&self, plane: &BSPPlane, back: bool) -> Self {
        self.clip_epsilon(plane.normal, plane.dist, EPS_SPLIT, back)
    }

    /// Compares two windings of the same size, allowing a different start vertex
    pub fn matches(&self, other: &Winding) -> bool {
        let size = self.verts.len();
        if size != other.verts.len() {
            return false;
        }
        if size == 0 {
            return true;
        }

        let min = (0..size)
            .map(|offset| {
                (0..size)
                    .map(|j| self.verts[j].distance(other.verts[(j + offset) % size]))
                    .sum::<f32>()
            })
            .fold(f32::MAX, f32::min);

        min < EPS_COMP
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.verts.iter().copied())
    }

    pub fn size(&self) -> Vec3 {
        self.bounds().size()
    }

    /// Average of all vertices
    pub fn center(&self) -> Vec3 {
        if self.verts.is_empty() {
            return Vec3::ZERO;
        }
        self.verts.iter().copied().sum::<Vec3>() / self.verts.len() as f32
    }

    pub fn area(&self) -> f32 {
        let Some(&first) = self.verts.first() else {
            return 0.0;
        };
        self.verts
            .windows(2)
            .skip(1)
            .map(|pair| (pair[0] - first).cross(pair[1] - first).length())
            .sum::<f32>()
            * 0.5
    }

    /// Three points spanning the largest triangle through the first vertex,
    /// in winding order
    pub fn vertex_plane(&self) -> Option<[Vec3; 3]> {
        let base = *self.verts.first()?;
        let mut best = None;
        let mut best_len = -1.0;
        for i in 1..self.verts.len() {
            for j in i + 1..self.verts.len() {
                let len = (self.verts[i] - base).cross(self.verts[j] - base).length();
                if len > best_len {
                    best_len = len;
                    best = Some([base, self.verts[i], self.verts[j]]);
                }
            }
        }
        best
    }

    /// Plane through the vertices, facing the side the winding is clockwise from
    pub fn plane(&self) -> Option<BSPPlane> {
        let [a, b, c] = self.vertex_plane()?;
        BSPPlane::from_points(a, b, c)
    }

    /// Drops vertices within [`EPS_DEGEN`] of the previous kept vertex, the
    /// last ones also against the first. Kept vertices are never closer than
    /// that to their neighbours, so a second pass removes nothing.
    /// Returns the cleaned winding and the number of dropped vertices.
    pub fn remove_degenerate(&self) -> (Self, usize) {
        let mut verts: Vec<Vec3> = Vec::with_capacity(self.verts.len());
        for &v in &self.verts {
            if verts.last().map_or(true, |last| last.distance(v) > EPS_DEGEN) {
                verts.push(v);
            }
        }
        while verts.len() > 1
            && verts
                .last()
                .is_some_and(|last| last.distance(verts[0]) <= EPS_DEGEN)
        {
            verts.pop();
        }
        let removed = self.verts.len() - verts.len();
        (Self::new(verts), removed)
    }

    /// Drops vertices whose incoming and outgoing edges are nearly parallel
    pub fn remove_collinear(&self) -> (Self, usize) {
        let size = self.verts.len();
        let verts: Vec<Vec3> = (0..size)
            .filter(|&i| {
                let next = self.verts[(i + 1) % size];
                let prev = self.verts[(i + size - 1) % size];
                let out = (next - self.verts[i]).normalize_or_zero();
                let inc = (self.verts[i] - prev).normalize_or_zero();
                out.dot(inc) < COLLINEAR_COS
            })
            .map(|i| self.verts[i])
            .collect();
        let removed = size - verts.len();
        (Self::new(verts), removed)
    }

    pub fn translate(&self, offset: Vec3) -> Self {
        Self::new(self.verts.iter().map(|&v| v + offset).collect())
    }

    pub fn rotate(&self, angles: Vec3) -> Self {
        Self::new(self.verts.iter().map(|&v| vector::rotate(v, angles)).collect())
    }

    pub fn reversed(&self) -> Self {
        Self::new(self.verts.iter().rev().copied().collect())
    }
}
