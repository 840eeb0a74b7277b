use flagset::FlagSet;
use glam::Vec3;

use crate::{
    bsp::{
        consts::SurfFlags,
        textures::{BSPTexData, BSPTexInfo},
        BspData,
    },
    geom::vector,
};

use super::{Texture, TextureAxis, TextureSource, ToolTextureMatcher};

/// Texture axes this close to lying in the face plane get rebuilt
const EPS_PERP: f32 = 0.02;

/// Everything known about the side a texture is built for
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TextureRequest {
    /// Texinfo index, negative if the side has none
    pub tex_info: i32,
    /// Normal of the written face
    pub normal: Option<Vec3>,
    /// Placement of the owning brush entity
    pub origin: Option<Vec3>,
    pub angles: Option<Vec3>,
    pub brush: Option<usize>,
    pub brush_side: Option<usize>,
    /// The texinfo may not be the one the side was compiled with
    pub enable_fixing: bool,
}

impl Default for TextureRequest {
    fn default() -> Self {
        Self {
            tex_info: -1,
            normal: None,
            origin: None,
            angles: None,
            brush: None,
            brush_side: None,
            enable_fixing: true,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TextureStats {
    /// Textures whose axes lay in the face plane
    pub fixed_axes: usize,
    pub fixed_tool_textures: usize,
}

/// Turns texinfos back into Hammer texture projections
pub struct TextureBuilder<'a> {
    bsp: &'a BspData,
    source: &'a TextureSource,
    matcher: &'a ToolTextureMatcher,
    fix_tool_textures: bool,
    stats: TextureStats,
}

impl<'a> TextureBuilder<'a> {
    pub fn new(
        bsp: &'a BspData,
        source: &'a TextureSource,
        matcher: &'a ToolTextureMatcher,
        fix_tool_textures: bool,
    ) -> Self {
        Self {
            bsp,
            source,
            matcher,
            fix_tool_textures,
            stats: TextureStats::default(),
        }
    }

    pub fn stats(&self) -> TextureStats {
        self.stats
    }

    pub fn build(&mut self, req: &TextureRequest) -> Texture {
        let bsp = self.bsp;
        let mut texture = Texture::default();
        if let Some(normal) = req.normal {
            align_to_face(&mut texture, normal);
        }

        let fixing = self.fix_tool_textures && req.enable_fixing;

        // some tool textures lose their texinfo entirely
        let Ok(tex_info_index) = usize::try_from(req.tex_info) else {
            if fixing {
                if let Some(name) = self.fix_tool_texture(req, None) {
                    texture.set_override(name);
                }
            }
            return texture;
        };

        let Some(tex_info) = bsp.tex_infos.get(tex_info_index) else {
            log::warn!("Invalid texinfo index {tex_info_index}");
            return texture;
        };
        let Some(tex_data) = usize::try_from(tex_info.tex_data)
            .ok()
            .and_then(|i| bsp.tex_datas.get(i))
        else {
            let index = tex_info.tex_data;
            log::warn!("Invalid texdata index {index}");
            return texture;
        };

        texture.texname = usize::try_from(tex_data.name_string_table_id).ok();
        match bsp.texture_name(tex_data) {
            Some(name) => texture.original = name.to_owned(),
            None => {
                let index = tex_data.name_string_table_id;
                log::warn!("Invalid texture name index {index}");
            }
        }

        let mut name = self.source.texture_name(bsp, tex_info_index);
        let mut uses_fixed = false;
        if fixing {
            if let Some(fixed) = self.fix_tool_texture(req, Some(name.as_str())) {
                name = fixed.to_owned();
                uses_fixed = true;
            }
        }
        texture.set_override(name);

        if let Some(scale) = lightmap_scale(tex_info) {
            texture.lightmap_scale = scale;
        }

        let flags = tex_info.flags();
        if uses_fixed || flags.contains(SurfFlags::SKY) || flags.contains(SurfFlags::SKY2D) {
            if let Some(normal) = req.normal {
                align_to_face(&mut texture, normal);
            }
        } else {
            build_uv(&mut texture, tex_info, tex_data, req.origin, req.angles);
            if let Some(normal) = req.normal {
                if is_perpendicular(&texture, normal) {
                    log::debug!("Fixed texture axes lying in the face plane of {}", texture.name());
                    self.stats.fixed_axes += 1;
                    align_to_face(&mut texture, normal);
                }
            }
        }
        texture
    }

    fn fix_tool_texture(
        &mut self,
        req: &TextureRequest,
        original: Option<&str>,
    ) -> Option<&'static str> {
        req.brush_side?;
        let brush = self.bsp.brushes.get(req.brush?)?;

        let surface: Option<FlagSet<SurfFlags>> = usize::try_from(req.tex_info)
            .ok()
            .and_then(|i| self.bsp.tex_infos.get(i))
            .map(BSPTexInfo::flags);

        let fixed = self
            .matcher
            .fix_tool_texture(original, surface, brush.contents())?;
        self.stats.fixed_tool_textures += 1;
        Some(fixed)
    }
}

/// Face aligned axes, the same ones Hammer's "face" alignment produces
pub(super) fn align_to_face(texture: &mut Texture, normal: Vec3) {
    let vdir = vector::face_basis_axis(normal);
    let u = normal.cross(vdir).normalize_or_zero();
    let v = normal.cross(u).normalize_or_zero();
    texture.u = TextureAxis::from_axis(u);
    texture.v = TextureAxis::from_axis(v);
}

fn is_perpendicular(texture: &Texture, normal: Vec3) -> bool {
    let tex_normal = texture.u.axis.cross(texture.v.axis);
    normal.dot(tex_normal).abs() < EPS_PERP
}

fn lightmap_scale(tex_info: &BSPTexInfo) -> Option<i32> {
    let [s, t] = tex_info.lightmap_vecs;
    let u = Vec3::from_slice(&s[..3]).length();
    let v = Vec3::from_slice(&t[..3]).length();
    let ls = (u + v) / 2.0;
    (ls > 0.001).then(|| (1.0 / ls).round() as i32)
}

fn build_uv(
    texture: &mut Texture,
    tex_info: &BSPTexInfo,
    tex_data: &BSPTexData,
    origin: Option<Vec3>,
    angles: Option<Vec3>,
) {
    let [s, t] = tex_info.texture_vecs;
    let mut uaxis = Vec3::from_slice(&s[..3]);
    let mut vaxis = Vec3::from_slice(&t[..3]);

    let mut utw = 1.0 / uaxis.length();
    let mut vtw = 1.0 / vaxis.length();
    uaxis *= utw;
    vaxis *= vtw;

    let mut ushift = s[3];
    let mut vshift = t[3];

    if let Some(origin) = origin {
        ushift -= origin.dot(uaxis) / utw;
        vshift -= origin.dot(vaxis) / vtw;
    }

    if let Some(angles) = angles {
        uaxis = vector::rotate(uaxis, angles);
        vaxis = vector::rotate(vaxis, angles);

        // shift in texture space caused by rotating around the origin
        let origin = origin.unwrap_or(Vec3::ZERO);
        let shift = vector::rotate(-origin, angles) + origin;
        ushift -= shift.dot(uaxis) / utw;
        vshift -= shift.dot(vaxis) / vtw;
    }

    if tex_data.width != 0 {
        ushift %= tex_data.width as f32;
    }
    if tex_data.height != 0 {
        vshift %= tex_data.height as f32;
    }

    // 0.25000018 -> 0.25
    utw = (utw * 10000.0).round() / 10000.0;
    vtw = (vtw * 10000.0).round() / 10000.0;

    texture.u = TextureAxis::new(uaxis, ushift.round() as i32, utw);
    texture.v = TextureAxis::new(vaxis, vshift.round() as i32, vtw);
}

#[cfg(test)]
mod builder_tests {
    use bytemuck::Zeroable;

    use super::*;
    use crate::{
        app::AppId,
        bsp::{brush::BSPBrush, consts::Contents},
        texture::{tool, ToolTextureSet},
    };

    fn tex_info(u: [f32; 4], v: [f32; 4], flags: FlagSet<SurfFlags>) -> BSPTexInfo {
        BSPTexInfo {
            texture_vecs: [u, v],
            lightmap_vecs: [[0.0625, 0.0, 0.0, 0.0], [0.0, 0.0625, 0.0, 0.0]],
            flags: flags.bits(),
            tex_data: 0,
        }
    }

    fn bsp(infos: Vec<BSPTexInfo>, name: &str) -> BspData {
        BspData {
            tex_infos: infos.into(),
            tex_datas: vec![BSPTexData {
                width: 512,
                height: 256,
                ..BSPTexData::zeroed()
            }]
            .into(),
            texture_names: vec![name.to_owned()],
            brushes: vec![BSPBrush {
                first_side: 0,
                num_sides: 6,
                contents: (Contents::PLAYERCLIP | Contents::MONSTERCLIP | Contents::DETAIL).bits(),
            }]
            .into(),
            ..Default::default()
        }
    }

    fn matcher() -> ToolTextureMatcher {
        ToolTextureMatcher::new(ToolTextureSet::for_app(AppId::HalfLife2))
    }

    #[test]
    fn uv_from_texture_vecs() {
        let bsp = bsp(
            vec![tex_info(
                [0.0, 4.0, 0.0, 600.0],
                [0.0, 0.0, -4.0, -16.0],
                FlagSet::default(),
            )],
            "BRICK/BRICKWALL001",
        );
        let source = TextureSource::new(&bsp, true);
        let matcher = matcher();
        let mut builder = TextureBuilder::new(&bsp, &source, &matcher, true);

        let t = builder.build(&TextureRequest {
            tex_info: 0,
            normal: Some(Vec3::X),
            enable_fixing: false,
            ..Default::default()
        });
        assert_eq!(t.name(), "brick/brickwall001");
        assert_eq!(t.original, "BRICK/BRICKWALL001");
        assert_eq!(t.u, TextureAxis::new(Vec3::Y, 88, 0.25));
        assert_eq!(t.v, TextureAxis::new(Vec3::NEG_Z, -16, 0.25));
        assert_eq!(t.lightmap_scale, 16);
        assert_eq!(t.texname, Some(0));
        assert_eq!(builder.stats(), TextureStats::default());
    }

    #[test]
    fn origin_compensation() {
        let bsp = bsp(
            vec![tex_info([4.0, 0.0, 0.0, 0.0], [0.0, -4.0, 0.0, 0.0], FlagSet::default())],
            "concrete/floor",
        );
        let source = TextureSource::new(&bsp, true);
        let matcher = matcher();
        let mut builder = TextureBuilder::new(&bsp, &source, &matcher, false);

        let t = builder.build(&TextureRequest {
            tex_info: 0,
            normal: Some(Vec3::Z),
            origin: Some(Vec3::new(16.0, 8.0, 0.0)),
            ..Default::default()
        });
        // 0 - 16 * 4 and 0 - (-8 * 4)
        assert_eq!(t.u.shift, -64);
        assert_eq!(t.v.shift, 32);
    }

    #[test]
    fn perpendicular_axes_are_rebuilt() {
        // both axes lie in a plane containing the face normal
        let bsp = bsp(
            vec![tex_info([4.0, 0.0, 0.0, 0.0], [0.0, 0.0, 4.0, 0.0], FlagSet::default())],
            "concrete/wall",
        );
        let source = TextureSource::new(&bsp, true);
        let matcher = matcher();
        let mut builder = TextureBuilder::new(&bsp, &source, &matcher, false);

        let t = builder.build(&TextureRequest {
            tex_info: 0,
            normal: Some(Vec3::X),
            ..Default::default()
        });
        assert_eq!(t.u.axis, Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(t.v.axis, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(builder.stats().fixed_axes, 1);
    }

    #[test]
    fn tool_texture_recovery() {
        let flags = SurfFlags::NODRAW | SurfFlags::NOLIGHT;
        let bsp = bsp(
            vec![tex_info([4.0, 0.0, 0.0, 0.0], [0.0, -4.0, 0.0, 0.0], flags)],
            "TOOLS/TOOLSNODRAW",
        );
        let source = TextureSource::new(&bsp, true);
        let matcher = matcher();
        let mut builder = TextureBuilder::new(&bsp, &source, &matcher, true);

        let req = TextureRequest {
            tex_info: 0,
            normal: Some(Vec3::Z),
            brush: Some(0),
            brush_side: Some(0),
            ..Default::default()
        };
        let t = builder.build(&req);
        // the nodraw slot rules out the silent clip
        assert_eq!(t.name(), tool::PLAYERCLIP);
        assert_eq!(t.original, "TOOLS/TOOLSNODRAW");
        assert_eq!(builder.stats().fixed_tool_textures, 1);

        let t = builder.build(&TextureRequest {
            enable_fixing: false,
            ..req
        });
        assert_eq!(t.name(), tool::NODRAW);

        // no texinfo, only the brush contents are known
        let t = builder.build(&TextureRequest {
            tex_info: -1,
            ..req
        });
        assert_eq!(t.name(), tool::CLIP);
        assert_eq!(t.original, tool::SKIP);
    }

    #[test]
    fn sky_faces_get_face_alignment() {
        let bsp = bsp(
            vec![tex_info(
                [4.0, 0.0, 0.0, 12.0],
                [0.0, -4.0, 0.0, 0.0],
                SurfFlags::SKY | SurfFlags::NOLIGHT,
            )],
            "tools/toolsskybox",
        );
        let source = TextureSource::new(&bsp, true);
        let matcher = matcher();
        let mut builder = TextureBuilder::new(&bsp, &source, &matcher, false);
        let t = builder.build(&TextureRequest {
            tex_info: 0,
            normal: Some(Vec3::NEG_Z),
            ..Default::default()
        });
        assert_eq!(t.u.shift, 0);
        assert_eq!(t.u.scale, 0.25);
    }
}
