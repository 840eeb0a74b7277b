use std::collections::BTreeSet;

use ahash::AHashMap;

use crate::{bsp::BspData, geom::Winding};

/// Faces and brush sides match when they share plane, texinfo and dispinfo
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct FaceKey {
    plane_num: u16,
    tex_info: i16,
    disp_info: i16,
}

/// Links brush sides to the original face compiled from them. A side has at
/// most one original face, a face may come from several sides.
#[derive(Debug, Default)]
pub struct BrushSideFaceMapper {
    side_to_orig_face: AHashMap<usize, usize>,
    orig_face_to_sides: AHashMap<usize, BTreeSet<usize>>,
}

impl BrushSideFaceMapper {
    /// Pairs every brush side with the first original face of the same key
    /// and an identical winding
    pub fn new(bsp: &BspData) -> Self {
        let mut mapper = Self::default();

        let mut candidates: AHashMap<FaceKey, Vec<usize>> = AHashMap::new();
        for (i, face) in bsp.orig_faces.iter().enumerate() {
            let key = FaceKey {
                plane_num: face.plane_num,
                tex_info: face.tex_info,
                disp_info: face.disp_info,
            };
            candidates.entry(key).or_default().push(i);
        }

        for brush in bsp.brushes.iter() {
            for (i, iside) in brush.sides(bsp.brush_sides.len()).enumerate() {
                let Some(side) = bsp.brush_sides.get(iside) else {
                    continue;
                };
                // sides count displacements from one
                let key = FaceKey {
                    plane_num: side.plane_num,
                    tex_info: side.tex_info,
                    disp_info: side.disp_info.wrapping_sub(1),
                };
                let Some(faces) = candidates.get_mut(&key) else {
                    continue;
                };
                let winding = Winding::from_side(bsp, brush, i);
                let found = faces
                    .iter()
                    .position(|&f| Winding::from_face(bsp, &bsp.orig_faces[f]).matches(&winding));
                if let Some(pos) = found {
                    let face = faces.swap_remove(pos);
                    mapper.side_to_orig_face.insert(iside, face);
                    mapper.orig_face_to_sides.entry(face).or_default().insert(iside);
                }
            }
        }

        let sides = bsp.brush_sides.len().max(1);
        log::debug!(
            "{} ({:.1}%) exact brush side to original face matches",
            mapper.side_to_orig_face.len(),
            100.0 * mapper.side_to_orig_face.len() as f64 / sides as f64
        );
        mapper
    }

    pub fn orig_face(&self, side: usize) -> Option<usize> {
        self.side_to_orig_face.get(&side).copied()
    }

    pub fn sides(&self, orig_face: usize) -> impl Iterator<Item = usize> + '_ {
        self.orig_face_to_sides
            .get(&orig_face)
            .into_iter()
            .flatten()
            .copied()
    }

    pub fn len(&self) -> usize {
        self.side_to_orig_face.len()
    }

    pub fn is_empty(&self) -> bool {
        self.side_to_orig_face.is_empty()
    }
}

#[cfg(test)]
mod side_face_mapper_tests {
    use glam::Vec3;

    use super::*;
    use crate::test_bsp::{BspBuilder, TestBox, CUBE_TEXTURE};

    #[test]
    fn boxes_map_to_their_faces() {
        let bsp = BspBuilder::boxes(&[
            TestBox::cube(64.0, CUBE_TEXTURE),
            TestBox::new(Vec3::splat(100.0), Vec3::splat(132.0), "METAL/METALWALL"),
        ])
        .data();
        let mapper = BrushSideFaceMapper::new(&bsp);
        assert_eq!(mapper.len(), 12);
        for side in 0..12 {
            assert_eq!(mapper.orig_face(side), Some(side));
            assert_eq!(mapper.sides(side).collect::<Vec<_>>(), vec![side]);
        }
    }

    #[test]
    fn texinfo_must_agree() {
        let mut bsp = BspBuilder::cube_map().data();
        let mut faces = bsp.orig_faces.to_vec();
        faces[0].tex_info = 2;
        bsp.orig_faces = faces.into();
        let mapper = BrushSideFaceMapper::new(&bsp);
        assert_eq!(mapper.orig_face(0), None);
        assert_eq!(mapper.orig_face(1), Some(1));
        assert_eq!(mapper.sides(0).count(), 0);
    }
}
