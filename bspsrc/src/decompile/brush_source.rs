use std::io::Write;

use glam::Vec3;
use thiserror::Error;

use crate::{
    app::AppId,
    geom::{vector, Winding},
    texture::TextureRequest,
};

use super::{back_normal, Decompiler};

pub(super) const PROTECTOR_VISGROUP: &str = "VMEX protector brushes";

/// Reasons a brush side is left out
#[derive(Debug, Error)]
enum BrushSideError {
    #[error("no vertices")]
    Empty,
    #[error("less than 3 vertices")]
    TooFewVertices,
    #[error("too big")]
    Huge,
    #[error("invalid plane")]
    InvalidPlane,
    #[error("duplicate plane point {0}")]
    DuplicatePoint(Vec3),
}

impl<W: Write> Decompiler<'_, W> {
    /// Writes every world brush the entity writers don't claim for themselves
    pub(super) fn write_brushes(&mut self) {
        log::info!("Writing brushes and planes");
        let bsp = self.bsp;
        let config = self.config;

        for ibrush in 0..self.world_brushes.min(bsp.brushes.len()) {
            let brush = &bsp.brushes[ibrush];

            if config.write_details && brush.is_func_detail(bsp.app) {
                continue;
            }
            if config.write_areaportals && brush.is_areaportal() {
                continue;
            }
            // CS:GO ladders are ordinary brushes with ladder contents
            if config.write_ladders && brush.is_ladder() && bsp.app != AppId::CounterStrikeGo {
                continue;
            }

            self.write_brush(ibrush, None, None);
        }
    }

    /// Writes all brushes of a brush model, placed by the owning entity
    pub(super) fn write_model_brushes(
        &mut self,
        imodel: usize,
        origin: Option<Vec3>,
        angles: Option<Vec3>,
    ) -> bool {
        let Some(brushes) = self.model_brushes.get(imodel).cloned() else {
            log::warn!("Invalid model index {imodel}");
            return false;
        };
        for ibrush in brushes {
            self.write_brush(ibrush, origin, angles);
        }
        true
    }

    /// Id of a written brush side
    pub(super) fn brush_side_id(&self, iside: usize) -> Option<i32> {
        self.brush_side_ids.get(&iside).copied()
    }

    /// Rebuilds one brush from its side planes. Returns false if the brush
    /// had too few usable sides to be written.
    pub(super) fn write_brush(
        &mut self,
        ibrush: usize,
        origin: Option<Vec3>,
        angles: Option<Vec3>,
    ) -> bool {
        let bsp = self.bsp;
        let Some(brush) = bsp.brushes.get(ibrush) else {
            log::warn!("Invalid brush index {ibrush}");
            return false;
        };

        let mut valid_sides = Vec::new();
        for (i, iside) in brush.sides(bsp.brush_sides.len()).enumerate() {
            let Some(side) = bsp.brush_sides.get(iside) else {
                continue;
            };
            // surplus bevels make bad brushes
            if side.is_bevel() {
                continue;
            }
            match side_winding(Winding::from_side(bsp, brush, i)) {
                Ok(mut winding) => {
                    if let Some(angles) = angles {
                        winding = winding.rotate(angles);
                    }
                    if let Some(origin) = origin {
                        winding = winding.translate(origin);
                    }
                    valid_sides.push((iside, winding));
                }
                Err(e) => {
                    self.stats.skipped_sides += 1;
                    if self.config.debug {
                        log::warn!("Skipped side {i} of brush {ibrush}: {e}");
                    }
                }
            }
        }

        if valid_sides.is_empty() {
            log::warn!("Skipped empty brush {ibrush}");
            self.stats.skipped_brushes += 1;
            return false;
        }
        // older Hammer builds crash on these
        if valid_sides.len() < 3 {
            log::warn!("Skipped brush {ibrush} with less than 3 sides");
            self.stats.skipped_brushes += 1;
            return false;
        }

        let brush_id = self.meta.uid();
        self.w.start("solid");
        self.w.put("id", brush_id);

        if self.config.debug {
            self.w.start("bspsrc_debug");
            self.w.put("brush_index", ibrush);
            self.w.put("brush_contents", format_args!("{:?}", brush.contents()));
            self.w.end("bspsrc_debug");
        }

        for (iside, winding) in valid_sides {
            self.write_side(iside, ibrush, &winding, origin, angles);
        }

        if !brush.is_detail() && self.protection.is_protector_brush(ibrush) {
            self.meta.write_meta_visgroups(&mut self.w, &[PROTECTOR_VISGROUP]);
        }

        self.w.end("solid");
        self.stats.brushes += 1;
        true
    }

    fn write_side(
        &mut self,
        iside: usize,
        ibrush: usize,
        winding: &Winding,
        origin: Option<Vec3>,
        angles: Option<Vec3>,
    ) {
        let bsp = self.bsp;
        let Some(side) = bsp.brush_sides.get(iside) else {
            return;
        };
        let Some(plane) = winding.vertex_plane() else {
            return;
        };
        // recalculated, the stored plane is wrong for rotated brushes
        let normal = back_normal(plane);

        let texture = self.build_texture(&TextureRequest {
            tex_info: side.tex_info as i32,
            normal: Some(normal),
            origin,
            angles,
            brush: Some(ibrush),
            brush_side: Some(iside),
            enable_fixing: self.side_mapper.orig_face(iside).is_none(),
        });

        let side_id = self.meta.uid();
        self.register_side(&texture, side_id);
        self.brush_side_ids.insert(iside, side_id);

        self.w.start("side");
        self.w.put("id", side_id);

        if self.config.debug {
            self.w.start("bspsrc_debug");
            self.w.put("brushside_index", iside);
            self.w.put_vec("normal", normal);
            self.w.put("winding", format_args!("{:?}", &**winding));
            if texture.override_name.is_some() {
                self.w.put("original_material", &texture.original);
            }
            if side.tex_info >= 0 {
                self.w.put("texinfo_index", side.tex_info);
            }
            self.w.end("bspsrc_debug");
        }

        self.w.put_plane("plane", plane);
        self.w.put("smoothing_groups", 0);
        self.w.put_texture(&texture);
        self.w.end("side");
    }
}

/// Checks a clipped side winding before it goes into a brush
fn side_winding(winding: Winding) -> Result<Winding, BrushSideError> {
    let (winding, _) = winding.remove_degenerate();
    if winding.is_empty() {
        return Err(BrushSideError::Empty);
    }
    if winding.len() < 3 {
        return Err(BrushSideError::TooFewVertices);
    }
    if winding.is_huge() {
        return Err(BrushSideError::Huge);
    }

    let plane = winding
        .vertex_plane()
        .ok_or(BrushSideError::InvalidPlane)?;
    if !plane.iter().all(|&p| vector::is_valid(p)) {
        return Err(BrushSideError::InvalidPlane);
    }
    // all three points must be unique to span a plane
    for (i, a) in plane.iter().enumerate() {
        if plane[i + 1..].contains(a) {
            return Err(BrushSideError::DuplicatePoint(*a));
        }
    }
    Ok(winding)
}

#[cfg(test)]
mod brush_source_tests {
    use super::*;
    use crate::{
        bsp::{brush::BSPBrush, consts::Contents, BspData},
        config::DecompileConfig,
        decompile::decompile_tests::{decompile, sections},
        test_bsp::{BspBuilder, TestBox, CUBE_TEXTURE},
    };

    fn written(bsp: &BspData, f: impl FnOnce(&mut Decompiler<Vec<u8>>)) -> String {
        let config = DecompileConfig::default();
        let mut decompiler = Decompiler::new(bsp, &config, Vec::new());
        f(&mut decompiler);
        let Decompiler { w, .. } = decompiler;
        String::from_utf8(w.finish().unwrap()).unwrap()
    }

    fn plane_points(vmf: &str) -> Vec<Vec3> {
        vmf.lines()
            .filter_map(|l| l.trim().strip_prefix("\"plane\" \""))
            .flat_map(|l| {
                l.trim_end_matches('"')
                    .split(['(', ')'])
                    .filter(|p| !p.trim().is_empty())
                    .map(|p| {
                        let c: Vec<f32> = p.split_whitespace().map(|c| c.parse().unwrap()).collect();
                        Vec3::new(c[0], c[1], c[2])
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn cube_sides_stay_on_the_cube() {
        let bsp = BspBuilder::cube_map().data();
        let vmf = written(&bsp, |d| assert!(d.write_brush(0, None, None)));
        let points = plane_points(&vmf);
        assert_eq!(points.len(), 18);
        for p in points {
            assert_eq!(p.abs().max_element(), 64.0, "{p}");
        }
    }

    #[test]
    fn placed_brushes_are_rotated_then_moved() {
        let bsp = BspBuilder::boxes(&[TestBox::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(32.0, 16.0, 16.0),
            CUBE_TEXTURE,
        )])
        .data();
        let origin = Vec3::new(100.0, 0.0, 0.0);
        let angles = Vec3::new(0.0, 0.0, 90.0);
        let vmf = written(&bsp, |d| assert!(d.write_brush(0, Some(origin), Some(angles))));
        let bounds = plane_points(&vmf)
            .into_iter()
            .fold((Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)), |(lo, hi), p| {
                (lo.min(p), hi.max(p))
            });
        // the quarter turn takes x to y before the move along x
        assert_eq!(bounds.0, Vec3::new(84.0, 0.0, 0.0));
        assert_eq!(bounds.1, Vec3::new(100.0, 32.0, 16.0));
    }

    #[test]
    fn side_ids_are_recorded() {
        let bsp = BspBuilder::cube_map().data();
        let config = DecompileConfig::default();
        let mut decompiler = Decompiler::new(&bsp, &config, Vec::new());
        assert!(decompiler.write_brush(0, None, None));
        // brush id first, then one id per side
        let ids: Vec<_> = (0..6).map(|i| decompiler.brush_side_id(i)).collect();
        assert_eq!(ids, (2..8).map(Some).collect::<Vec<_>>());
        assert_eq!(decompiler.brush_side_id(6), None);
    }

    #[test]
    fn open_brushes_are_skipped() {
        let mut bsp = BspBuilder::cube_map().data();
        let mut brushes = bsp.brushes.to_vec();
        brushes[0] = BSPBrush {
            num_sides: 2,
            ..brushes[0]
        };
        bsp.brushes = brushes.into();

        let (vmf, stats) = decompile(&bsp, &DecompileConfig::default());
        assert_eq!(sections(&vmf, "solid"), 0);
        assert_eq!(stats.skipped_brushes, 1);
        assert_eq!(stats.skipped_sides, 2);
    }

    #[test]
    fn side_counts_past_the_lump_are_clamped() {
        let mut bsp = BspBuilder::cube_map().data();
        let mut brushes = bsp.brushes.to_vec();
        brushes[0] = BSPBrush {
            num_sides: i32::MAX,
            ..brushes[0]
        };
        bsp.brushes = brushes.into();

        let (vmf, stats) = decompile(&bsp, &DecompileConfig::default());
        assert_eq!(sections(&vmf, "solid"), 1);
        assert_eq!(sections(&vmf, "side"), 6);
        assert_eq!(stats.brushes, 1);
    }

    #[test]
    fn world_brush_filters() {
        let bsp = BspBuilder::boxes(&[
            TestBox::cube(64.0, CUBE_TEXTURE),
            TestBox::new(Vec3::splat(100.0), Vec3::splat(164.0), CUBE_TEXTURE)
                .contents((Contents::SOLID | Contents::DETAIL).bits()),
            TestBox::new(Vec3::splat(200.0), Vec3::splat(264.0), "TOOLS/TOOLSAREAPORTAL")
                .contents(Contents::AREAPORTAL as i32),
            TestBox::new(Vec3::splat(300.0), Vec3::splat(364.0), "TOOLS/TOOLSINVISIBLELADDER")
                .contents(Contents::LADDER as i32),
        ])
        .data();

        let config = DecompileConfig {
            write_brush_entities: false,
            write_point_entities: false,
            ..Default::default()
        };
        let (vmf, _) = decompile(&bsp, &config);
        // details, areaportals and ladders are left to the entity writers
        assert_eq!(sections(&vmf, "solid"), 1);

        let config = DecompileConfig {
            write_details: false,
            write_areaportals: false,
            write_ladders: false,
            ..config
        };
        let (vmf, stats) = decompile(&bsp, &config);
        assert_eq!(sections(&vmf, "solid"), 4);
        assert_eq!(stats.brushes, 4);
    }

    #[test]
    fn debug_blocks() {
        let bsp = BspBuilder::cube_map().data();
        let config = DecompileConfig {
            debug: true,
            ..Default::default()
        };
        let (vmf, _) = decompile(&bsp, &config);
        assert!(vmf.contains("\"brush_index\" \"0\""));
        assert_eq!(sections(&vmf, "bspsrc_debug"), 7);
    }

    #[test]
    fn bad_windings_are_rejected() {
        let huge = Winding::new(vec![
            Vec3::ZERO,
            Vec3::new(0.0, 40000.0, 0.0),
            Vec3::new(40000.0, 40000.0, 0.0),
        ]);
        assert!(matches!(side_winding(huge), Err(BrushSideError::Huge)));
        let line = Winding::new(vec![Vec3::ZERO, Vec3::X * 8.0]);
        assert!(matches!(side_winding(line), Err(BrushSideError::TooFewVertices)));
        let point = Winding::new(vec![Vec3::ZERO, Vec3::splat(0.01), Vec3::splat(0.02)]);
        assert!(matches!(side_winding(point), Err(BrushSideError::Empty)));
        assert!(matches!(side_winding(Winding::default()), Err(BrushSideError::Empty)));
    }
}
