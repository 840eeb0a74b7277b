use glam::Vec3;

use super::{
    consts::{LumpType, MAX_MAP_EDGES, MAX_MAP_SURFEDGES, MAX_MAP_VERTS},
    Lump,
};

///Edge
///
///Each edge is simply a pair of vertex indices (which index into the vertex lump array). The edge is defined as the straight line between the two vertices. Usually, the edge array is referenced through the Surfedge array (see below).
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BSPEdge {
    pub v: [u16; 2], // vertex indices
}

impl Lump for BSPEdge {
    fn max() -> usize {
        MAX_MAP_EDGES
    }
    fn lump_type() -> LumpType {
        LumpType::Edges
    }
}

///Surfedge
///
///The value in the surfedge array can be positive or negative. The absolute value of this number is an index into the edge array:
/// if positive, it means the edge is defined from the first to the second vertex; if negative, from the second to the first vertex.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BSPSurfEdge {
    pub index: i32,
}

impl BSPSurfEdge {
    /// First vertex of the edge in the direction this surfedge walks it
    pub fn first_vertex(&self, edges: &[BSPEdge]) -> Option<usize> {
        let index = self.index;
        let edge = edges.get(index.unsigned_abs() as usize)?;
        Some(if index < 0 { edge.v[1] } else { edge.v[0] } as usize)
    }
}

impl Lump for BSPSurfEdge {
    fn max() -> usize {
        MAX_MAP_SURFEDGES
    }
    fn lump_type() -> LumpType {
        LumpType::SurfEdges
    }
}

impl Lump for Vec3 {
    fn max() -> usize {
        MAX_MAP_VERTS
    }
    fn lump_type() -> LumpType {
        LumpType::Vertexes
    }
}
