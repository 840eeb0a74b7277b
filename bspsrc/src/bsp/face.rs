use glam::IVec2;

use super::{
    consts::{LumpType, MAX_MAP_FACES},
    edges::{BSPEdge, BSPSurfEdge},
    Lump,
};

///The face array is limited to 65536 (MAX_MAP_FACES) entries.
///
///The original face lump (Lump 27) has the same structure as the face lump, but contains the array of faces before the BSP splitting process is done. These faces are therefore closer to the original brush faces present in the precompile map than the face array, and there are less of them. The origFace entry for all original faces is zero.
///
///Both the face and original face arrays are culled; that is, many faces present before compilation of the map (primarily those that face towards the "void" outside the map) are removed from the array.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BSPFace {
    /// the plane number
    pub plane_num: u16,
    /// faces opposite to the node's plane direction
    pub side: u8,
    /// 1 of on node, 0 if in leaf
    pub on_node: u8,
    /// Firstedge is an index into the Surfedge array; this and the following numedges entries in the surfedge array define the edges of the face.
    ///
    /// The vertices which make up the face are thus referenced in clockwise order; when looking towards the face,
    /// each edge is traced in a clockwise direction.
    pub first_edge: i32,
    /// number of surfedges
    pub num_edges: i16,
    ///Texinfo is an index into the Texinfo array, and represents the texture to be drawn on the face.
    pub tex_info: i16,
    /// Dispinfo is an index into the Dispinfo array is the face is a displacement surface (in which case, the face defines the boundaries of the surface); otherwise, it is -1.
    pub disp_info: i16,
    pub surface_fog_volume_id: i16,
    /// switchable lighting info
    pub styles: [u8; 4],
    /// offset into lightmap lump
    pub light_ofs: i32,
    /// face area in units^2
    pub area: f32,
    pub lightmap_texture_mins_in_luxels: IVec2,
    pub lightmap_texture_size_in_luxels: IVec2,
    ///OrigFace is the index of the original face which was split to produce this face.
    pub orig_face: i32,
    pub num_prims: u16,
    pub first_prim_id: u16,
    /// lightmap smoothing group
    pub smoothing_groups: u32,
}

impl BSPFace {
    /// Vertex indices in winding order, skipping references outside the edge lumps
    pub fn get_verts(&self, edges: &[BSPEdge], surfedges: &[BSPSurfEdge]) -> Vec<usize> {
        let first = self.first_edge.max(0) as usize;
        (0..self.num_edges.max(0) as usize)
            .filter_map(|i| surfedges.get(first + i)?.first_vertex(edges))
            .collect()
    }

    pub fn is_displacement(&self) -> bool {
        self.disp_info != -1
    }
}

impl Lump for BSPFace {
    fn max() -> usize {
        MAX_MAP_FACES
    }
    fn lump_type() -> LumpType {
        LumpType::Faces
    }
}

#[cfg(test)]
mod face_tests {
    use bytemuck::Zeroable;

    use super::*;

    #[test]
    fn face_layout() {
        assert_eq!(std::mem::size_of::<BSPFace>(), 56);
    }

    #[test]
    fn verts_follow_surfedges() {
        let edges = [
            BSPEdge { v: [0, 0] },
            BSPEdge { v: [0, 1] },
            BSPEdge { v: [1, 2] },
            BSPEdge { v: [2, 0] },
        ];
        let surfedges = [
            BSPSurfEdge { index: 1 },
            BSPSurfEdge { index: 2 },
            BSPSurfEdge { index: -3 },
        ];
        let face = BSPFace {
            first_edge: 0,
            num_edges: 3,
            ..BSPFace::zeroed()
        };
        assert_eq!(face.get_verts(&edges, &surfedges), vec![0, 1, 0]);
    }
}
