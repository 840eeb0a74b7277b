//! Turns decoded map data back into a Hammer map, one writer per map.

use std::{
    io::{self, Write},
    ops::Range,
};

use ahash::AHashMap;
use glam::Vec3;

use crate::{
    bsp::{entity::Entity, tree::TreeStats, BspData},
    config::{BrushMode, DecompileConfig},
    protection::{BspProtection, ProtectionReport},
    texture::{
        Texture, TextureBuilder, TextureRequest, TextureSource, TextureStats, ToolTextureMatcher,
        ToolTextureSet,
    },
    vmf::VmfWriter,
};

mod brush_source;
mod entity_source;
mod face_source;
pub mod meta;
pub mod side_face_mapper;

use face_source::FaceIndex;
pub use meta::{Camera, VmfMeta};
pub use side_face_mapper::BrushSideFaceMapper;

/// Counters of one decompiled map
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecompileStats {
    pub brushes: usize,
    pub skipped_brushes: usize,
    pub skipped_sides: usize,
    pub faces: usize,
    /// Original faces replaced by their split faces
    pub split_orig_faces: usize,
    pub entities: usize,
    pub fixed_texture_axes: usize,
    pub fixed_tool_textures: usize,
    pub protection: ProtectionReport,
}

impl DecompileStats {
    fn add_textures(&mut self, stats: TextureStats) {
        self.fixed_texture_axes += stats.fixed_axes;
        self.fixed_tool_textures += stats.fixed_tool_textures;
    }
}

/// Normal pointing behind the plane through `e1 e2 e3`, the reference
/// direction for face aligned textures and extruded back sides
fn back_normal([e1, e2, e3]: [Vec3; 3]) -> Vec3 {
    (e2 - e1).cross(e3 - e1).normalize()
}

pub struct Decompiler<'a, W: Write> {
    bsp: &'a BspData,
    config: &'a DecompileConfig,
    w: VmfWriter<W>,
    meta: VmfMeta,
    textures: TextureSource,
    matcher: ToolTextureMatcher,
    protection: ProtectionReport,
    /// Entities with the fixes applied for writing
    entities: Vec<Entity>,
    /// Brushes below this index belong to the world
    world_brushes: usize,
    model_brushes: Vec<Range<usize>>,
    side_mapper: BrushSideFaceMapper,
    brush_side_ids: AHashMap<usize, i32>,
    faces: FaceIndex,
    overlay_names: AHashMap<i32, String>,
    stats: DecompileStats,
}

impl<'a, W: Write> Decompiler<'a, W> {
    pub fn new(bsp: &'a BspData, config: &'a DecompileConfig, out: W) -> Self {
        let textures = TextureSource::new(bsp, config.fix_cubemap_textures);

        let protection = if config.skip_prot {
            ProtectionReport::default()
        } else {
            BspProtection::new(bsp, &textures).check()
        };
        if protection.is_protected() {
            log::warn!("Map contains anti-decompiling flags or is obfuscated!");
            log::warn!("Detected methods:");
            for method in protection.methods() {
                log::warn!("{method}");
            }
        }

        let model_brushes = model_brush_ranges(bsp);
        let world_brushes = match model_brushes.first() {
            Some(world) if !bsp.nodes.is_empty() => world.end,
            _ => bsp.brushes.len(),
        };
        log::debug!("Largest world brush: {world_brushes}");

        let side_mapper = if config.brush_mode == BrushMode::BrushPlanes {
            BrushSideFaceMapper::new(bsp)
        } else {
            BrushSideFaceMapper::default()
        };

        let mut decompiler = Self {
            bsp,
            config,
            w: VmfWriter::new(out),
            meta: VmfMeta::new(),
            textures,
            matcher: ToolTextureMatcher::new(ToolTextureSet::for_app(bsp.app)),
            protection,
            entities: bsp.entities.clone(),
            world_brushes,
            model_brushes,
            side_mapper,
            brush_side_ids: AHashMap::new(),
            faces: FaceIndex::new(bsp),
            overlay_names: AHashMap::new(),
            stats: DecompileStats::default(),
        };
        decompiler.process_entities();
        decompiler
    }

    pub fn protection(&self) -> &ProtectionReport {
        &self.protection
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.meta.set_comment(comment);
    }

    /// Writes the whole map and hands back the output
    pub fn run(mut self) -> io::Result<(W, DecompileStats)> {
        let config = self.config;

        let worldspawn = self
            .entities
            .iter()
            .find(|e| e.class_name() == "worldspawn")
            .cloned();
        self.meta.write_world_header(&mut self.w, worldspawn.as_ref());
        if config.write_world_brushes {
            self.write_world_geometry();
        }
        self.meta.write_world_footer(&mut self.w);

        if config.is_write_entities() {
            self.write_entity_groups();
        }
        if config.write_visgroups {
            self.meta.write_visgroups(&mut self.w);
        }
        if config.write_cameras {
            self.meta.write_cameras(&mut self.w);
        }

        let Self {
            w,
            mut stats,
            protection,
            ..
        } = self;
        stats.protection = protection;
        let out = w.finish()?;
        Ok((out, stats))
    }

    fn write_world_geometry(&mut self) {
        match self.config.brush_mode {
            BrushMode::BrushPlanes => {
                self.write_brushes();
                // face modes write displacements with the rest of the faces
                self.write_disp_faces();
            }
            BrushMode::OrigFace => self.write_orig_faces(),
            BrushMode::OrigFacePlus => self.write_orig_faces_plus(),
            BrushMode::SplitFace => self.write_faces(),
        }
    }

    fn write_entity_groups(&mut self) {
        let config = self.config;
        self.write_entities();

        if config.write_brush_entities
            && config.write_details
            && config.brush_mode == BrushMode::BrushPlanes
        {
            self.write_details();
        }

        if config.write_point_entities {
            if config.write_overlays {
                self.write_overlays();
            }
            if config.write_static_props {
                self.write_static_props();
            }
            if config.write_cubemaps {
                self.write_cubemaps();
            }
            if config.write_ladders {
                self.write_ladders();
            }
        }
    }

    fn build_texture(&mut self, req: &TextureRequest) -> Texture {
        let mut builder = TextureBuilder::new(
            self.bsp,
            &self.textures,
            &self.matcher,
            self.config.fix_tool_textures,
        );
        let mut texture = builder.build(req);
        self.stats.add_textures(builder.stats());

        if !self.config.face_texture.is_empty() {
            texture.set_override(self.config.face_texture.as_str());
        }
        texture
    }

    /// Remembers the side id for cubemaps using the side's texture
    fn register_side(&mut self, texture: &Texture, side_id: i32) {
        if let Some(texname) = texture.texname {
            self.textures.add_brush_side(texname, side_id);
        }
    }
}

/// Brush index range of every model, from the leaves below its head node
fn model_brush_ranges(bsp: &BspData) -> Vec<Range<usize>> {
    bsp.models
        .iter()
        .map(|model| {
            TreeStats::walk(&bsp.nodes, &bsp.leafs, &bsp.leaf_brushes, model.headnode)
                .brush_range()
        })
        .collect()
}
