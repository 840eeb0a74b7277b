use std::{
    collections::{BTreeMap, BTreeSet},
    io::Write,
};

use ahash::{AHashMap, AHashSet};
use glam::Vec3;

use crate::{
    bsp::{displacement::BSPDispVert, face::BSPFace, BspData},
    geom::{vector, Winding},
    texture::{tool, Texture, TextureAxis, TextureRequest},
    vmf::{format_float, format_vec, VecStyle},
};

use super::{back_normal, Decompiler};

/// Triangle tags as Hammer stores them, by compiled tag bits
const TRICONV: [u8; 7] = [0, 0, 1, 0, 0, 0, 9];

/// Slop when comparing face areas, in square units
const AREA_EPS: f32 = 1.0;

/// Relations between split faces and the original faces they came from
#[derive(Debug, Default)]
pub(super) struct FaceIndex {
    has_orig_faces: bool,
    /// Texinfos of original faces, synced from their split faces
    orig_tex_infos: AHashMap<usize, i16>,
    orig_to_split: BTreeMap<usize, Vec<usize>>,
    /// Original faces smaller than the sum of their split faces
    undersized: BTreeSet<usize>,
}

impl FaceIndex {
    pub(super) fn new(bsp: &BspData) -> Self {
        let mut index = Self {
            has_orig_faces: !bsp.orig_faces.is_empty(),
            ..Default::default()
        };

        for (i, face) in bsp.faces.iter().enumerate() {
            let Some(orig) = index.orig_face(bsp, face) else {
                continue;
            };
            index.orig_tex_infos.insert(orig, face.tex_info);
            index.orig_to_split.entry(orig).or_default().push(i);
        }

        for (&orig, split) in &index.orig_to_split {
            let face = &bsp.orig_faces[orig];
            let area = if face.area == 0.0 {
                Winding::from_face(bsp, face).area()
            } else {
                face.area
            };
            let split_area: f32 = split
                .iter()
                .filter_map(|&i| bsp.faces.get(i))
                .map(|f| f.area)
                .sum();
            if split_area > area + AREA_EPS {
                log::trace!("Original face {orig} is undersized: {split_area} > {area}");
                index.undersized.insert(orig);
            }
        }
        index
    }

    /// Original face of a split face, if the map still has it
    fn orig_face(&self, bsp: &BspData, face: &BSPFace) -> Option<usize> {
        if !self.has_orig_faces {
            return None;
        }
        usize::try_from(face.orig_face)
            .ok()
            .filter(|&o| o < bsp.orig_faces.len())
    }

    fn tex_info(&self, iface: usize, face: &BSPFace, orig: bool) -> i16 {
        if orig {
            self.orig_tex_infos.get(&iface).copied().unwrap_or(face.tex_info)
        } else {
            face.tex_info
        }
    }

    fn is_undersized(&self, orig: usize) -> bool {
        self.undersized.contains(&orig)
    }

    fn split_faces(&self, orig: usize) -> &[usize] {
        self.orig_to_split.get(&orig).map_or(&[], Vec::as_slice)
    }
}

impl<W: Write> Decompiler<'_, W> {
    fn world_faces(&self) -> std::ops::Range<usize> {
        self.bsp
            .models
            .first()
            .map_or(0..0, |model| model.faces())
    }

    pub(super) fn write_faces(&mut self) {
        log::info!("Writing split faces");
        for iface in self.world_faces() {
            self.write_face(iface, false, None, None);
        }
    }

    /// Writes every original face once. Missing original faces leave gaps.
    pub(super) fn write_orig_faces(&mut self) {
        log::info!("Writing original faces");
        let bsp = self.bsp;
        let mut written = AHashSet::new();
        for iface in self.world_faces() {
            let Some(face) = bsp.faces.get(iface) else {
                continue;
            };
            let Some(orig) = self.faces.orig_face(bsp, face) else {
                continue;
            };
            if written.insert(orig) {
                self.write_face(orig, true, None, None);
            }
        }
    }

    /// Writes original faces where possible, split faces where the original
    /// face is undersized or missing
    pub(super) fn write_orig_faces_plus(&mut self) {
        log::info!("Writing original faces where possible");
        let bsp = self.bsp;
        let mut written = AHashSet::new();
        for iface in self.world_faces() {
            let Some(face) = bsp.faces.get(iface) else {
                continue;
            };
            let Some(orig) = self.faces.orig_face(bsp, face) else {
                self.write_face(iface, false, None, None);
                continue;
            };
            if !written.insert(orig) {
                continue;
            }
            if self.faces.is_undersized(orig) {
                self.stats.split_orig_faces += 1;
                let split = self.faces.split_faces(orig).to_vec();
                log::trace!("Original face {orig}: {split:?}");
                for iface in split {
                    self.write_face(iface, false, None, None);
                }
            } else {
                self.write_face(orig, true, None, None);
            }
        }
        log::info!(
            "{} original faces were written as split faces",
            self.stats.split_orig_faces
        );
    }

    /// Writes the faces carrying displacements
    pub(super) fn write_disp_faces(&mut self) {
        log::info!("Writing displacements");
        let bsp = self.bsp;
        if bsp.disp_infos.is_empty() {
            return;
        }
        for (iface, face) in bsp.faces.iter().enumerate() {
            if face.disp_info >= 0 {
                self.write_face(iface, false, None, None);
            }
        }
    }

    pub(super) fn write_model_faces(
        &mut self,
        imodel: usize,
        origin: Option<Vec3>,
        angles: Option<Vec3>,
    ) -> bool {
        let Some(model) = self.bsp.models.get(imodel) else {
            log::warn!("Invalid model index {imodel}");
            return false;
        };
        for iface in model.faces() {
            self.write_face(iface, false, origin, angles);
        }
        true
    }

    /// Writes a flat face as a thin solid behind it
    pub(super) fn write_face(
        &mut self,
        iface: usize,
        orig: bool,
        origin: Option<Vec3>,
        angles: Option<Vec3>,
    ) {
        let bsp = self.bsp;
        let config = self.config;
        let face = if orig {
            bsp.orig_faces.get(iface)
        } else {
            bsp.faces.get(iface)
        };
        let Some(face) = face else {
            log::warn!("Invalid face index {iface}");
            return;
        };
        // 0 or 1 edges, something must be wrong
        if face.num_edges < 2 {
            return;
        }

        let mut winding = Winding::from_face(bsp, face);
        if let Some(angles) = angles {
            winding = winding.rotate(angles);
        }
        if let Some(origin) = origin {
            winding = winding.translate(origin);
        }

        let Some(plane) = winding.vertex_plane() else {
            log::warn!("Face {iface} has no plane");
            return;
        };
        if !plane.iter().all(|&p| vector::is_valid(p)) {
            log::warn!("Face with winding {:?} is invalid", &*winding);
            return;
        }
        let normal = back_normal(plane);
        if !normal.is_finite() {
            log::debug!("Bad normal for face {iface}");
            return;
        }

        let tex_info = self.faces.tex_info(iface, face, orig);

        let solid_id = self.meta.uid();
        self.w.start("solid");
        self.w.put("id", solid_id);

        if config.debug {
            self.w.start("bspsrc_debug");
            self.w.put("face_index", iface);
            self.w.put_vec("normal", normal);
            self.w.put("winding", format!("{:?}", &*winding));
            if tex_info >= 0 {
                self.w.put("texinfo_index", tex_info);
            }
            self.w.end("bspsrc_debug");
        }

        let side_id = self.meta.uid();
        if orig {
            self.meta.set_orig_face_id(iface, side_id);
        } else {
            self.meta.set_face_id(iface, side_id);
        }

        let mut texture = self.build_texture(&TextureRequest {
            tex_info: tex_info as i32,
            normal: Some(normal),
            origin,
            angles,
            ..Default::default()
        });
        self.register_side(&texture, side_id);

        self.w.start("side");
        self.w.put("id", side_id);
        self.w.put_plane("plane", plane);
        self.w.put("smoothing_groups", face.smoothing_groups);
        self.w.put_texture(&texture);

        let disp = usize::try_from(face.disp_info).ok();
        if let Some(idisp) = disp.filter(|_| config.write_disp) {
            self.meta.set_disp_info_id(idisp, side_id);
            self.write_displacement(idisp);
        }
        self.w.end("side");

        if !config.backface_texture.is_empty() {
            texture.set_override(config.backface_texture.as_str());
        }
        if disp.is_some() {
            self.write_prism_back(&winding, texture, config.backface_depth);
        } else {
            self.write_pyramid_back(&winding, &texture, config.backface_depth);
        }

        self.w.end("solid");
        self.stats.faces += 1;
    }

    /// Back side parallel to the face plus one side per edge
    fn write_prism_back(&mut self, winding: &Winding, mut texture: Texture, depth: f32) {
        let Some([e1, e2, e3]) = winding.vertex_plane() else {
            return;
        };
        let bedge = back_normal([e1, e2, e3]) * depth;

        texture.u = TextureAxis::from_axis(-texture.u.axis);
        self.write_back_side(&texture, e1 + bedge, e2 + bedge, e3 + bedge);

        let v = bedge.normalize_or_zero();
        for (i, &e1) in winding.iter().enumerate() {
            let e2 = winding[(i + 1) % winding.len()];
            // e2 - e1 mirrors the texture
            let u = (e1 - e2).normalize_or_zero();
            texture.u = TextureAxis::from_axis(u);
            texture.v = TextureAxis::from_axis(v);
            self.write_back_side(&texture, e1, e2, e1 + bedge);
        }
    }

    /// One side per edge, meeting in a point behind the face center
    fn write_pyramid_back(&mut self, winding: &Winding, texture: &Texture, depth: f32) {
        let Some(plane) = winding.vertex_plane() else {
            return;
        };
        let apex = winding.center() + back_normal(plane) * depth;
        for (i, &e1) in winding.iter().enumerate() {
            let e2 = winding[(i + 1) % winding.len()];
            self.write_back_side(texture, e1, e2, apex);
        }
    }

    fn write_back_side(&mut self, texture: &Texture, e1: Vec3, e2: Vec3, e3: Vec3) {
        let id = self.meta.uid();
        self.w.start("side");
        self.w.put("id", id);
        self.w.put_plane("plane", [e1, e3, e2]);
        self.w.put("smoothing_groups", 0);
        self.w.put_texture(texture);
        self.w.end("side");
    }

    /// Writes the areaportal geometry of a portal key. Both portals of a key
    /// share their geometry, one is enough.
    pub(super) fn write_areaportal(&mut self, portal_key: u16) -> bool {
        let bsp = self.bsp;
        let Some(portal) = bsp.area_portals.iter().find(|p| p.portal_key == portal_key) else {
            log::warn!("Tried to write non existing areaportal with portal key {portal_key}");
            return false;
        };
        let winding = Winding::from_areaportal(bsp, portal);
        self.write_polygon(
            &winding,
            tool::AREAPORTAL,
            tool::AREAPORTAL,
            true,
            self.config.backface_depth,
        )
    }

    pub(super) fn write_occluder(&mut self, index: usize) -> bool {
        let bsp = self.bsp;
        let Some(occluder) = bsp.occlusion.occluders.get(index) else {
            log::warn!("Invalid occluder index {index}");
            return false;
        };
        let mut written = false;
        for ipoly in occluder.polys() {
            let Some(poly) = bsp.occlusion.polys.get(ipoly) else {
                continue;
            };
            let winding = Winding::from_occluder(bsp, poly);
            written |= self.write_polygon(&winding, tool::OCCLUDER, tool::NODRAW, true, 1.0);
        }
        written
    }

    /// Writes a solid from a raw polygon, extruded by `depth`
    pub(super) fn write_polygon(
        &mut self,
        winding: &Winding,
        front: &str,
        back: &str,
        prism: bool,
        depth: f32,
    ) -> bool {
        if winding.len() < 3 {
            return false;
        }
        let Some(plane) = winding.vertex_plane() else {
            return false;
        };
        if !plane.iter().all(|&p| vector::is_valid(p)) {
            log::warn!("Polygon with winding {:?} is invalid", &**winding);
            return false;
        }
        let normal = back_normal(plane);
        if !normal.is_finite() {
            log::debug!("Bad polygon normal");
            return false;
        }

        let solid_id = self.meta.uid();
        self.w.start("solid");
        self.w.put("id", solid_id);

        let side_id = self.meta.uid();
        let mut texture = Texture::aligned(front, normal);
        self.w.start("side");
        self.w.put("id", side_id);
        self.w.put_plane("plane", plane);
        self.w.put_texture(&texture);
        self.w.end("side");

        texture.original = back.to_owned();
        if prism {
            self.write_prism_back(winding, texture, depth);
        } else {
            self.write_pyramid_back(winding, &texture, depth);
        }

        self.w.end("solid");
        true
    }

    fn write_displacement(&mut self, idisp: usize) {
        let bsp = self.bsp;
        let Some(info) = bsp.disp_infos.get(idisp) else {
            log::warn!("Invalid dispinfo index {idisp}");
            return;
        };
        let Some(verts) = bsp.disp_verts.get(info.verts()) else {
            log::warn!("Displacement {idisp} has invalid vertices");
            return;
        };
        let tris = bsp.disp_tris.get(info.tris()).unwrap_or_default();

        let row_len = info.power_size();
        let rows = |f: &dyn Fn(&BSPDispVert) -> String| -> Vec<String> {
            verts
                .chunks(row_len)
                .map(|row| row.iter().map(f).collect::<Vec<_>>().join(" "))
                .collect()
        };
        let normals = rows(&|v| format_vec(v.vec, VecStyle::Plain));
        let distances = rows(&|v| format_float(v.dist as f64));
        let alphas = rows(&|v| format_float(v.alpha as f64));

        let tags: Vec<String> = tris
            .chunks(2 * (row_len - 1))
            .map(|row| {
                row.iter()
                    .map(|t| TRICONV.get(t.tags as usize).copied().unwrap_or(0).to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();

        let allowed = info
            .allowed_verts
            .iter()
            .map(|&v| (v as i32).to_string())
            .collect::<Vec<_>>()
            .join(" ");

        self.w.start("dispinfo");
        if self.config.debug {
            self.w.put("bspsrc_dispinfo_index", idisp);
        }
        self.w.put("power", info.power);
        self.w
            .put_vec_styled("startposition", info.start_position, VecStyle::Bracket);
        self.w.put("flags", info.surface_flags().map_or(0, |f| f.bits()));
        self.w.put("elevation", 0);
        self.w.put("subdiv", 0);

        for (name, rows) in [
            ("normals", &normals),
            ("distances", &distances),
            ("alphas", &alphas),
            ("triangle_tags", &tags),
        ] {
            self.w.start(name);
            for (i, row) in rows.iter().enumerate() {
                self.w.put(&format!("row{i}"), row);
            }
            self.w.end(name);
        }

        self.w.start("allowed_verts");
        self.w.put("10", allowed);
        self.w.end("allowed_verts");

        self.w.end("dispinfo");
    }
}
