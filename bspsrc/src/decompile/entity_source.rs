use std::{collections::BTreeSet, collections::VecDeque, io::Write};

use glam::Vec3;

use crate::{
    app::AppId,
    bsp::{
        consts::StaticPropFlags,
        entity::{Entity, ModelRef, IO_SEP_NEW, IO_SEP_OLD},
        static_prop::StaticProp,
    },
    config::{BrushMode, SourceFormat},
    geom::{self, Aabb},
};

use super::{brush_source::PROTECTOR_VISGROUP, Camera, Decompiler};

const FLAGGED_VISGROUP: &str = "VMEX flagged entities";
const AREAPORTAL_VISGROUP: &str = "Rebuild/areaportals";
const OCCLUDER_VISGROUP: &str = "Rebuild/occluders";

/// Light styles below this are engine presets, everything above was assigned
/// by the compiler to switchable lights
const FIRST_CUSTOM_LIGHT_STYLE: i32 = 32;

/// Instances were only compiled into maps from this version on
const INSTANCE_VERSION: i32 = 21;

fn hammer_id(entity: &Entity) -> Option<i32> {
    let value = entity.get("hammerid")?;
    match value.parse() {
        Ok(id) => Some(id),
        Err(_) => {
            log::warn!("Invalid hammerid format {value:?}");
            None
        }
    }
}

/// Moves compiler assigned styles back to the preset they came from
fn fix_light_style(entity: &mut Entity) {
    let Some(style) = entity.get("style") else {
        return;
    };
    match style.parse::<i32>() {
        Ok(style) if style < FIRST_CUSTOM_LIGHT_STYLE => return,
        Ok(_) => {}
        Err(_) => log::warn!("Invalid light style number format: {style}"),
    }
    match entity.remove("defaultstyle") {
        Some(default) => entity.set("style", default),
        None => {
            entity.remove("style");
        }
    }
}

fn convert_io(entity: &mut Entity, from: char, to: char) {
    for (_, value) in entity.io_mut() {
        *value = value.chars().map(|c| if c == from { to } else { c }).collect();
    }
}

/// Instance name prefix, `inst` for `inst-door`
fn instance_prefix(target_name: &str) -> Option<&str> {
    target_name
        .split_once('-')
        .map(|(prefix, _)| prefix)
        .filter(|prefix| !prefix.is_empty())
}

/// Splits boxes into groups of transitively touching boxes. Groups and their
/// members keep index order.
fn merge_touching(mut loose: Vec<(usize, Aabb)>, thresh: f32) -> Vec<Vec<usize>> {
    let mut groups = Vec::new();
    while !loose.is_empty() {
        let (first, bounds) = loose.remove(0);
        let mut group = vec![first];
        let mut pending = VecDeque::from([bounds]);

        while let Some(current) = pending.pop_front() {
            // grown a bit so touching boxes intersect reliably
            let test = current.expand(thresh);
            let (touching, rest): (Vec<_>, Vec<_>) =
                loose.into_iter().partition(|(_, b)| b.intersects(&test));
            loose = rest;
            for (i, b) in touching {
                group.push(i);
                pending.push_back(b);
            }
        }

        group.sort_unstable();
        groups.push(group);
    }
    groups
}

impl<W: Write> Decompiler<'_, W> {
    /// Cleans up the entity list before anything is written. Ids are only
    /// reserved here, never handed out.
    pub(super) fn process_entities(&mut self) {
        let bsp = self.bsp;
        let config = self.config;

        for entity in &mut self.entities {
            let class_name = entity.class_name().to_owned();

            if class_name == "worldspawn" {
                // unknown to Hammer
                entity.remove("world_mins");
                entity.remove("world_maxs");
                entity.remove("hammerid");

                if !entity.has("mapversion") {
                    entity.set("mapversion", bsp.map_revision);
                }
            }

            match config.source_format {
                SourceFormat::Auto => {}
                SourceFormat::New => convert_io(entity, IO_SEP_OLD, IO_SEP_NEW),
                SourceFormat::Old => convert_io(entity, IO_SEP_NEW, IO_SEP_OLD),
            }

            // engine only, replaced by an empty func_ladder with the same model
            if class_name == "func_simpleladder" {
                let model = entity.get("model").map(str::to_owned);
                *entity = Entity::new("func_ladder");
                if let Some(model) = model {
                    entity.set("model", model);
                }
            }

            if class_name.starts_with("light") && class_name != "light_dynamic" {
                fix_light_style(entity);
            }

            if class_name.starts_with("info_player_") {
                if let Some(origin) = entity.origin() {
                    let angles = entity.angles().unwrap_or(Vec3::ZERO);
                    self.meta.add_camera(Camera::behind(origin, angles));
                }
            }

            if let Some(id) = hammer_id(entity) {
                self.meta.reserve_uid(id);
            }
        }
    }

    fn end_entity(&mut self) {
        self.w.end("entity");
        self.stats.entities += 1;
    }

    /// Writes brush and point entities from the entity lump. Entities
    /// compiled into other lumps have their own writers.
    pub(super) fn write_entities(&mut self) {
        log::info!("Writing entities");
        let bsp = self.bsp;
        let config = self.config;

        let instances = bsp.version >= INSTANCE_VERSION;
        // only instances leave rotated brush entities behind
        let fix_rot = config.fix_entity_rot && instances;

        let entities = std::mem::take(&mut self.entities);
        for (index, entity) in entities.iter().enumerate() {
            let class_name = entity.class_name();
            if class_name == "worldspawn" {
                continue;
            }

            let is_areaportal = class_name.starts_with("func_areaportal");
            let is_occluder = class_name == "func_occluder";
            let model = entity.model();
            let has_brush =
                matches!(model, ModelRef::Brush(n) if n > 0) || is_areaportal || is_occluder;

            if !config.write_point_entities && !has_brush {
                continue;
            }
            if !config.write_brush_entities && has_brush {
                continue;
            }
            if !config.write_areaportals && is_areaportal {
                continue;
            }
            if !config.write_occluders && is_occluder {
                continue;
            }
            // bot navigation helper generated from func_ladder
            if class_name == "info_ladder" {
                continue;
            }

            if class_name == "info_overlay_accessor" {
                if let Some(id) = entity.get("OverlayID").and_then(|id| id.parse().ok()) {
                    let name = entity.target_name().unwrap_or_default().to_owned();
                    self.overlay_names.insert(id, name);
                    continue;
                }
            }

            let mut entity = entity.clone();

            // Hammer crashes on scaled sprite models
            if class_name == "env_sprite"
                && entity.get("model").is_some_and(|m| m.starts_with("model"))
            {
                entity.remove("scale");
            }

            let id = match hammer_id(&entity) {
                Some(id) => id,
                None => self.meta.uid(),
            };
            self.w.start("entity");
            self.w.put("id", id);

            let mut portal_num = None;
            let mut occluder_num = None;
            if is_areaportal {
                portal_num = entity.get("portalnumber").and_then(|n| n.parse::<u16>().ok());
                if !config.debug {
                    entity.remove("portalnumber");
                }
            }
            if is_occluder {
                occluder_num = entity.get("occludernumber").and_then(|n| n.parse::<usize>().ok());
                if !config.debug {
                    entity.remove("occludernumber");
                }
            }

            for (key, value) in entity.key_values() {
                let key = key.as_str();
                let skip = match key {
                    "angles" => {
                        (fix_rot && matches!(model, ModelRef::Brush(_)))
                            || is_areaportal
                            || is_occluder
                    }
                    "origin" => model == ModelRef::Brush(0) || is_areaportal || is_occluder,
                    // only studio models keep their model key
                    "model" => model != ModelRef::Other,
                    "hammerid" => true,
                    _ => false,
                };
                if !skip {
                    self.w.put(key, value);
                }
            }
            self.w.put("classname", entity.class_name());

            if !entity.io().is_empty() {
                self.w.start("connections");
                for (key, value) in entity.io() {
                    self.w.put(key, value);
                }
                self.w.end("connections");
            }

            let mut visgroups = Vec::new();
            let origin = entity.origin();
            // brush entities inside rotated instances must be rotated manually
            let angles = if fix_rot { entity.angles() } else { None };

            match model {
                ModelRef::Brush(imodel) if imodel > 0 => {
                    if config.brush_mode == BrushMode::BrushPlanes {
                        self.write_model_brushes(imodel, origin, angles);
                    } else {
                        self.write_model_faces(imodel, origin, angles);
                    }
                }
                _ => {
                    if let Some(portal_num) = portal_num {
                        self.write_areaportal(portal_num);
                        visgroups.push(AREAPORTAL_VISGROUP.to_owned());
                    }
                    if let Some(occluder_num) = occluder_num {
                        self.write_occluder(occluder_num);
                        visgroups.push(OCCLUDER_VISGROUP.to_owned());
                    }
                }
            }

            if instances {
                if let Some(prefix) = entity.target_name().and_then(instance_prefix) {
                    visgroups.push(prefix.to_owned());
                }
            }
            if self.protection.is_flagged_entity(index) {
                visgroups.push(FLAGGED_VISGROUP.to_owned());
            }
            if !visgroups.is_empty() {
                self.meta.write_meta_visgroups(&mut self.w, &visgroups);
            }

            self.end_entity();
        }
        self.entities = entities;
    }

    fn write_func_detail(&mut self, brushes: &[usize], visgroup: Option<&str>) {
        let id = self.meta.uid();
        self.w.start("entity");
        self.w.put("id", id);
        self.w.put("classname", "func_detail");
        for &ibrush in brushes {
            self.write_brush(ibrush, None, None);
        }
        if let Some(visgroup) = visgroup {
            self.meta.write_meta_visgroups(&mut self.w, &[visgroup]);
        }
        self.end_entity();
    }

    /// Writes detail world brushes as func_detail entities, one per brush or
    /// one per group of touching brushes
    pub(super) fn write_details(&mut self) {
        log::info!("Writing func_details");
        let bsp = self.bsp;
        let config = self.config;

        let mut details = Vec::new();
        let mut protectors = Vec::new();
        for ibrush in 0..self.world_brushes.min(bsp.brushes.len()) {
            if !bsp.brushes[ibrush].is_func_detail(bsp.app) {
                continue;
            }
            if self.protection.is_protector_brush(ibrush) {
                protectors.push(ibrush);
            } else {
                details.push(ibrush);
            }
        }

        if config.detail_merge {
            let bounds = details
                .iter()
                .map(|&i| (i, geom::brush_bounds(bsp, &bsp.brushes[i])))
                .collect();
            for group in merge_touching(bounds, config.detail_merge_thresh) {
                self.write_func_detail(&group, None);
            }
        } else {
            for ibrush in details {
                self.write_func_detail(&[ibrush], None);
            }
        }

        if !protectors.is_empty() {
            self.write_func_detail(&protectors, Some(PROTECTOR_VISGROUP));
        }
    }

    /// Brush side ids an overlay was projected on
    fn overlay_sides(&self, ioverlay: usize, faces: &[i32]) -> BTreeSet<i32> {
        let bsp = self.bsp;
        let max = self.config.max_overlay_sides;
        let mut sides = BTreeSet::new();

        let split_faces = faces
            .iter()
            .filter_map(|&f| usize::try_from(f).ok())
            .filter_map(|f| Some((f, bsp.faces.get(f)?)));

        if self.config.brush_mode != BrushMode::BrushPlanes {
            for (iface, face) in split_faces {
                let id = self.meta.face_id(iface).or_else(|| {
                    let orig = usize::try_from(face.orig_face).ok()?;
                    self.meta.orig_face_id(orig)
                });
                sides.extend(id);
            }
            return sides;
        }

        let orig_faces: BTreeSet<usize> = split_faces
            .filter_map(|(_, face)| usize::try_from(face.orig_face).ok())
            .filter(|&orig| orig < bsp.orig_faces.len())
            .collect();

        for orig in orig_faces {
            if sides.len() >= max {
                log::warn!("Too many brush sides for overlay {ioverlay}");
                break;
            }
            let face = &bsp.orig_faces[orig];
            // displacements are referenced by their dispinfo side
            if let Ok(idisp) = usize::try_from(face.disp_info) {
                sides.extend(self.meta.disp_info_id(idisp));
                continue;
            }
            let before = sides.len();
            for iside in self.side_mapper.sides(orig) {
                if sides.len() >= max {
                    break;
                }
                sides.extend(self.brush_side_id(iside));
            }
            if sides.len() == before {
                log::trace!("Overlay {ioverlay}: no side for original face {orig}");
            }
        }
        sides
    }

    pub(super) fn write_overlays(&mut self) {
        log::info!("Writing info_overlays");
        let bsp = self.bsp;

        for (i, overlay) in bsp.overlays.iter().enumerate() {
            // the compiler hides the u basis in the z components of the uv points
            let mut uv_points = overlay.uv_points;
            let u_basis = Vec3::new(uv_points[0].z, uv_points[1].z, uv_points[2].z);
            let v_flip = uv_points[3].z == 1.0;
            for p in &mut uv_points {
                p.z = 0.0;
            }
            let mut v_basis = overlay.basis_normal.cross(u_basis).normalize_or_zero();
            if v_flip {
                v_basis = -v_basis;
            }

            let material = usize::try_from(overlay.tex_info)
                .map(|ti| self.textures.texture_name(bsp, ti))
                .unwrap_or_default();
            let sides = self.overlay_sides(i, overlay.faces());

            let id = self.meta.uid();
            self.w.start("entity");
            self.w.put("id", id);
            self.w.put("classname", "info_overlay");
            self.w.put("material", material);
            self.w.put_float("StartU", overlay.u[0] as f64);
            self.w.put_float("EndU", overlay.u[1] as f64);
            self.w.put_float("StartV", overlay.v[0] as f64);
            self.w.put_float("EndV", overlay.v[1] as f64);
            self.w.put_vec("BasisOrigin", overlay.origin);
            self.w.put_vec("BasisU", u_basis);
            self.w.put_vec("BasisV", v_basis);
            self.w.put_vec("BasisNormal", overlay.basis_normal);
            self.w.put_vec("origin", overlay.origin);
            for (j, p) in uv_points.iter().enumerate() {
                self.w.put_vec(&format!("uv{j}"), *p);
            }
            self.w.put("RenderOrder", overlay.render_order());

            let sides = sides.iter().map(i32::to_string).collect::<Vec<_>>();
            self.w.put("sides", sides.join(" "));

            if let Some(name) = self.overlay_names.get(&overlay.id) {
                self.w.put("targetname", name);
            }
            self.end_entity();
        }
    }

    pub(super) fn write_static_props(&mut self) {
        log::info!("Writing prop_statics");
        let bsp = self.bsp;
        let is_csgo = bsp.app == AppId::CounterStrikeGo;

        // info_lighting names by origin, in order of first use
        let mut lighting_origins: Vec<(Vec3, String)> = Vec::new();

        for prop in &bsp.static_props.props {
            let flags = prop.flags();
            let id = self.meta.uid();
            self.w.start("entity");
            self.w.put("id", id);
            self.w.put("classname", "prop_static");
            self.w.put_vec("origin", prop.origin);
            self.w.put_vec("angles", prop.angles);
            self.w.put("skin", prop.skin);
            if prop.fade_min == 0.0 {
                self.w.put("fademindist", -1);
            } else {
                self.w.put_float("fademindist", prop.fade_min as f64);
            }
            self.w.put_float("fademaxdist", prop.fade_max as f64);
            self.w.put("solid", prop.solid);
            match bsp.static_props.model_name(prop) {
                Some(model) => self.w.put("model", model),
                None => log::warn!("Static prop with invalid model index {}", prop.prop_type),
            }

            // CS:GO reuses the screen space fade bit
            let fast_reflection = prop.flags_ex.is_some() && is_csgo;
            self.w.put_bool(
                "screenspacefade",
                !fast_reflection && flags.contains(StaticPropFlags::ScreenSpaceFade),
            );

            if prop.uses_lighting_origin() {
                let name = match lighting_origins.iter().find(|(o, _)| *o == prop.lighting_origin) {
                    Some((_, name)) => name.clone(),
                    None => {
                        let name = format!("sprp_lighting_{}", lighting_origins.len());
                        lighting_origins.push((prop.lighting_origin, name.clone()));
                        name
                    }
                };
                self.w.put("lightingorigin", name);
            }

            self.w.put_bool("disableshadows", flags.contains(StaticPropFlags::NoShadow));
            self.write_prop_extras(prop, fast_reflection);
            self.end_entity();
        }

        for (origin, name) in lighting_origins {
            let id = self.meta.uid();
            self.w.start("entity");
            self.w.put("id", id);
            self.w.put("classname", "info_lighting");
            self.w.put("targetname", name);
            self.w.put_vec("origin", origin);
            self.end_entity();
        }
    }

    /// Keys of the fields only newer prop versions store
    fn write_prop_extras(&mut self, prop: &StaticProp, fast_reflection: bool) {
        let flags = prop.flags();

        if let Some(scale) = prop.forced_fade_scale {
            self.w.put_float("fadescale", scale as f64);
            self.w.put_bool(
                "disableselfshadowing",
                flags.contains(StaticPropFlags::NoSelfShadowing),
            );
            self.w.put_bool(
                "disablevertexlighting",
                flags.contains(StaticPropFlags::NoPerVertexLighting),
            );
        }

        if let Some((min, max)) = prop.dx_level {
            self.w.put("maxdxlevel", max);
            self.w.put("mindxlevel", min);
            self.w.put_bool("ignorenormals", flags.contains(StaticPropFlags::IgnoreNormals));
        }

        if let Some((min, max)) = prop.cpu_level {
            self.w.put("maxcpulevel", max);
            self.w.put("mincpulevel", min);
        }
        if let Some((min, max)) = prop.gpu_level {
            self.w.put("maxgpulevel", max);
            self.w.put("mingpulevel", min);
        }

        // opaque white is the default, newer layouts leave it out
        if let Some([r, g, b, a]) = prop.diffuse_modulation.filter(|c| *c != [255; 4]) {
            self.w.put("rendercolor", format!("{r} {g} {b}"));
            self.w.put("renderamt", a);
        }

        if let Some(disable) = prop.disable_x360 {
            self.w.put_bool("disableX360", disable);
        }
        if let Some(name) = &prop.target_name {
            self.w.put("targetname", name);
        }

        if let Some((x, y)) = prop.lightmap_resolution {
            let generate = !flags.contains(StaticPropFlags::NoPerTexelLighting);
            self.w.put_bool("generatelightmaps", generate);
            if generate {
                self.w.put("lightmapresolutionx", x);
                self.w.put("lightmapresolutiony", y);
            }
        }

        if fast_reflection {
            self.w.put_bool(
                "drawinfastreflection",
                flags.contains(StaticPropFlags::ScreenSpaceFade),
            );
        }
        if let Some(scale) = prop.uniform_scale {
            self.w.put_float("uniformscale", scale as f64);
        }
    }

    pub(super) fn write_cubemaps(&mut self) {
        log::info!("Writing env_cubemaps");
        let bsp = self.bsp;
        let max = self.config.max_cubemap_sides;

        for (i, cubemap) in bsp.cubemaps.iter().enumerate() {
            let id = self.meta.uid();
            self.w.start("entity");
            self.w.put("id", id);
            self.w.put("classname", "env_cubemap");
            self.w.put_vec("origin", cubemap.origin.as_vec3());
            self.w.put("cubemapsize", cubemap.size);

            if let Some(sides) = self.textures.sides_for_cubemap(i) {
                if sides.len() > max {
                    log::trace!("Cubemap {i} has too many sides: {sides:?}");
                }
                if !sides.is_empty() && sides.len() < max {
                    let sides = sides.iter().map(i32::to_string).collect::<Vec<_>>();
                    self.w.put("sides", sides.join(" "));
                }
            }
            self.end_entity();
        }
    }

    /// Ladder world brushes as func_ladder. CS:GO ladders stay brushes.
    pub(super) fn write_ladders(&mut self) {
        log::info!("Writing func_ladders");
        let bsp = self.bsp;
        if bsp.app == AppId::CounterStrikeGo {
            return;
        }

        for ibrush in 0..self.world_brushes.min(bsp.brushes.len()) {
            if !bsp.brushes[ibrush].is_ladder() {
                continue;
            }
            let id = self.meta.uid();
            self.w.start("entity");
            self.w.put("id", id);
            self.w.put("classname", "func_ladder");
            self.write_brush(ibrush, None, None);
            self.end_entity();
        }
    }
}
