use super::{
    consts::{LumpType, MAX_MAP_NODES},
    Lump,
};

/// Node of the BSP tree. Children are node indices when positive and
/// `-1 - leaf` when negative.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BSPNode {
    pub plane_num: i32,
    pub children: [i32; 2], // negative numbers are -(leafs+1), not nodes
    pub mins: [i16; 3],     // for frustum culling
    pub maxs: [i16; 3],
    pub first_face: u16,
    pub num_faces: u16, // counting both sides
    pub area: i16,      // If all leaves below this node are in the same area, then this is the area index. If not, this is -1.
    pub padding: i16,
}

impl Lump for BSPNode {
    fn max() -> usize {
        MAX_MAP_NODES
    }
    fn lump_type() -> LumpType {
        LumpType::Nodes
    }
}

/// Common prefix of every leaf version. Version 0 leafs of early Half-Life 2
/// maps carry an extra ambient light cube after this.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BSPLeaf {
    pub contents: i32,
    pub cluster: i16,
    pub area_flags: i16, // area:9, flags:7
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub first_leaf_face: u16,
    pub num_leaf_faces: u16,
    pub first_leaf_brush: u16,
    pub num_leaf_brushes: u16,
    pub leaf_water_data_id: i16,
    pub padding: i16,
}

pub const LEAF_SIZE_V0: usize = 56;
pub const LEAF_SIZE_V1: usize = 32;

impl BSPLeaf {
    pub fn record_size(lump_version: i32, bsp_version: i32) -> usize {
        if lump_version == 0 && bsp_version == 19 {
            LEAF_SIZE_V0
        } else {
            LEAF_SIZE_V1
        }
    }

    pub fn brushes(&self) -> std::ops::Range<usize> {
        let first = self.first_leaf_brush as usize;
        first..first + self.num_leaf_brushes as usize
    }
}

/// Brush index range reached from one model's head node
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub min_brush: Option<usize>,
    pub max_brush: Option<usize>,
    pub leaves: usize,
}

impl TreeStats {
    /// Walks the tree below `headnode`, collecting the brushes referenced by its leaves
    pub fn walk(nodes: &[BSPNode], leafs: &[BSPLeaf], leaf_brushes: &[u16], headnode: i32) -> Self {
        let mut stats = Self::default();
        let mut stack = vec![headnode];
        // guards against cyclic trees in damaged files
        let mut visited = vec![false; nodes.len()];

        while let Some(index) = stack.pop() {
            if index < 0 {
                stats.visit_leaf(leafs, leaf_brushes, (-1 - index) as usize);
                continue;
            }
            let Some(node) = nodes.get(index as usize) else {
                log::warn!("Invalid node index {index} in BSP tree");
                continue;
            };
            if std::mem::replace(&mut visited[index as usize], true) {
                continue;
            }
            stack.push(node.children[1]);
            stack.push(node.children[0]);
        }
        stats
    }

    fn visit_leaf(&mut self, leafs: &[BSPLeaf], leaf_brushes: &[u16], ileaf: usize) {
        let Some(leaf) = leafs.get(ileaf) else {
            log::warn!("Invalid leaf index {ileaf} in BSP tree");
            return;
        };
        self.leaves += 1;
        for ileafbrush in leaf.brushes() {
            let Some(&ibrush) = leaf_brushes.get(ileafbrush) else {
                continue;
            };
            let ibrush = ibrush as usize;
            self.min_brush = Some(self.min_brush.map_or(ibrush, |m| m.min(ibrush)));
            self.max_brush = Some(self.max_brush.map_or(ibrush, |m| m.max(ibrush)));
        }
    }

    pub fn brush_range(&self) -> std::ops::Range<usize> {
        match (self.min_brush, self.max_brush) {
            (Some(min), Some(max)) => min..max + 1,
            _ => 0..0,
        }
    }
}

#[cfg(test)]
mod tree_tests {
    use bytemuck::Zeroable;

    use super::*;

    fn leaf(first: u16, num: u16) -> BSPLeaf {
        BSPLeaf {
            first_leaf_brush: first,
            num_leaf_brushes: num,
            ..BSPLeaf::zeroed()
        }
    }

    #[test]
    fn layouts() {
        assert_eq!(std::mem::size_of::<BSPNode>(), 32);
        assert_eq!(std::mem::size_of::<BSPLeaf>(), LEAF_SIZE_V1);
    }

    #[test]
    fn walk_collects_brush_range() {
        // node 0 splits into leaf 0 and node 1, node 1 into leafs 1 and 2
        let nodes = [
            BSPNode {
                children: [-1, 1],
                ..BSPNode::zeroed()
            },
            BSPNode {
                children: [-2, -3],
                ..BSPNode::zeroed()
            },
        ];
        let leafs = [leaf(0, 0), leaf(0, 2), leaf(2, 1)];
        let leaf_brushes = [3u16, 1, 4];

        let stats = TreeStats::walk(&nodes, &leafs, &leaf_brushes, 0);
        assert_eq!(stats.leaves, 3);
        assert_eq!(stats.brush_range(), 1..5);

        let sub = TreeStats::walk(&nodes, &leafs, &leaf_brushes, 1);
        assert_eq!(sub.brush_range(), 1..5);

        let empty = TreeStats::walk(&nodes, &leafs, &leaf_brushes, -1);
        assert_eq!(empty.brush_range(), 0..0);
    }
}
