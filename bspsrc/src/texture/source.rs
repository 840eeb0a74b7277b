use std::{
    collections::{BTreeMap, BTreeSet},
    sync::OnceLock,
};

use ahash::AHashMap;
use regex::{Captures, Regex};

use crate::bsp::BspData;

use super::tool;

/// Compiler generated material names below `maps/<mapname>/`. Any map name
/// is accepted, compiled maps get renamed.
struct PatchPatterns {
    /// Cubemap position baked into an env-mapped material
    origin: Regex,
    /// World vertex transition patch
    wvt: Regex,
    /// Water depth patch
    water: Regex,
}

impl PatchPatterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            origin: Regex::new(r"maps/[^/]*/(?P<content>.+)_(?P<x>-?\d+)_(?P<y>-?\d+)_(?P<z>-?\d+)")?,
            wvt: Regex::new(r"maps/[^/]*/(?P<content>.+)_wvt_patch")?,
            water: Regex::new(r"maps/[^/]*/(?P<content>.+)_depth_-?\d+")?,
        })
    }

    fn get() -> Option<&'static Self> {
        static PATTERNS: OnceLock<Option<PatchPatterns>> = OnceLock::new();
        PATTERNS
            .get_or_init(|| {
                Self::new()
                    .map_err(|e| log::error!("Bad material patch pattern: {e}"))
                    .ok()
            })
            .as_ref()
    }
}

/// Lowercase with forward slashes
pub fn canonize_texture_name(name: &str) -> String {
    name.to_lowercase().replace('\\', "/")
}

/// True for materials the compiler writes into the embedded archive itself
pub fn is_patched_material(file_name: &str) -> bool {
    let name = canonize_texture_name(file_name);
    PatchPatterns::get().is_some_and(|p| {
        p.origin.is_match(&name) || p.wvt.is_match(&name) || p.water.is_match(&name)
    })
}

/// Replaces the matched path with its content group, keeping anything around it
fn strip_match(name: &str, captures: &Captures) -> String {
    let (Some(whole), Some(content)) = (captures.get(0), captures.name("content")) else {
        return name.to_owned();
    };
    format!(
        "{}{}{}",
        &name[..whole.start()],
        content.as_str(),
        &name[whole.end()..]
    )
}

fn parse_origin(captures: &Captures) -> Option<[i32; 3]> {
    let axis = |n: &str| captures.name(n)?.as_str().parse::<i32>().ok();
    Some([axis("x")?, axis("y")?, axis("z")?])
}

/// Texture names of a map, with compiler generated material names turned
/// back into the ones the mapper picked
#[derive(Debug, Default)]
pub struct TextureSource {
    fix_names: bool,
    names: Vec<String>,
    fixed_names: Vec<String>,
    texname_to_cubemap: AHashMap<usize, usize>,
    cubemap_to_sides: BTreeMap<usize, BTreeSet<i32>>,
}

impl TextureSource {
    pub fn new(bsp: &BspData, fix_names: bool) -> Self {
        let mut source = Self {
            fix_names,
            names: bsp.texture_names.clone(),
            ..Default::default()
        };

        let patterns = PatchPatterns::get();
        for (i, old) in bsp.texture_names.iter().enumerate() {
            let mut name = canonize_texture_name(old);

            if let Some(p) = patterns {
                if let Some(c) = p.wvt.captures(&name) {
                    name = strip_match(&name, &c);
                }
                if let Some(c) = p.water.captures(&name) {
                    name = strip_match(&name, &c);
                }
                if let Some(c) = p.origin.captures(&name) {
                    match parse_origin(&c) {
                        Some(origin) => source.link_cubemap(bsp, i, origin),
                        None => log::warn!("Bad cubemap position in texture name {name}"),
                    }
                    name = strip_match(&name, &c);
                }
            }

            if !name.eq_ignore_ascii_case(old) {
                log::trace!("{old} -> {name}");
            }
            source.fixed_names.push(name);
        }
        source
    }

    fn link_cubemap(&mut self, bsp: &BspData, texname: usize, origin: [i32; 3]) {
        let found = bsp
            .cubemaps
            .iter()
            .position(|c| c.origin.to_array() == origin);
        match found {
            Some(cubemap) => {
                log::trace!("Texture name {texname} uses cubemap {cubemap}");
                self.texname_to_cubemap.insert(texname, cubemap);
            }
            None => log::trace!("No cubemap at {origin:?}"),
        }
    }

    pub fn fixed_names(&self) -> &[String] {
        &self.fixed_names
    }

    /// Name of the texture a texinfo points to, `tools/toolsskip` if the
    /// chain of indices is broken
    pub fn texture_name(&self, bsp: &BspData, tex_info: usize) -> String {
        self.texname_index(bsp, tex_info)
            .and_then(|i| {
                if self.fix_names {
                    self.fixed_names.get(i)
                } else {
                    self.names.get(i)
                }
            })
            .cloned()
            .unwrap_or_else(|| tool::SKIP.to_owned())
    }

    pub fn texname_index(&self, bsp: &BspData, tex_info: usize) -> Option<usize> {
        let ti = bsp.tex_infos.get(tex_info)?;
        let td = bsp.tex_datas.get(usize::try_from(ti.tex_data).ok()?)?;
        usize::try_from(td.name_string_table_id).ok()
    }

    /// Remembers that a written side uses an env-mapped texture
    pub fn add_brush_side(&mut self, texname: usize, side_id: i32) {
        if let Some(&cubemap) = self.texname_to_cubemap.get(&texname) {
            self.cubemap_to_sides.entry(cubemap).or_default().insert(side_id);
        }
    }

    pub fn sides_for_cubemap(&self, cubemap: usize) -> Option<&BTreeSet<i32>> {
        self.cubemap_to_sides.get(&cubemap)
    }
}

#[cfg(test)]
mod source_tests {
    use bytemuck::Zeroable;
    use glam::IVec3;

    use super::*;
    use crate::bsp::{
        cubemap::BSPCubemapSample,
        textures::{BSPTexData, BSPTexInfo},
    };

    fn bsp(names: &[&str]) -> BspData {
        let mut bsp = BspData {
            texture_names: names.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        bsp.cubemaps = vec![
            BSPCubemapSample {
                origin: IVec3::new(0, 0, 0),
                size: 0,
            },
            BSPCubemapSample {
                origin: IVec3::new(-128, 64, 32),
                size: 0,
            },
        ]
        .into();
        bsp
    }

    #[test]
    fn strips_generated_suffixes() {
        let bsp = bsp(&[
            "MAPS\\DE_TEST\\BRICK\\BRICKWALL001_-128_64_32",
            "maps/de_renamed/nature/blendgrass_wvt_patch",
            "maps/de_test/liquids/water_depth_-12",
            "metal/metalfloor001",
        ]);
        let source = TextureSource::new(&bsp, true);
        assert_eq!(
            source.fixed_names(),
            &[
                "brick/brickwall001",
                "nature/blendgrass",
                "liquids/water",
                "metal/metalfloor001"
            ]
        );
        assert_eq!(source.texname_to_cubemap.get(&0), Some(&1));
        assert!(source.texname_to_cubemap.get(&3).is_none());
    }

    #[test]
    fn cubemap_side_bookkeeping() {
        let bsp = bsp(&["maps/x/glass/window_0_0_0", "glass/window"]);
        let mut source = TextureSource::new(&bsp, true);
        source.add_brush_side(0, 12);
        source.add_brush_side(0, 7);
        source.add_brush_side(1, 9);
        let sides: Vec<_> = source.sides_for_cubemap(0).unwrap().iter().copied().collect();
        assert_eq!(sides, vec![7, 12]);
        assert!(source.sides_for_cubemap(1).is_none());
    }

    #[test]
    fn names_through_texinfo() {
        let mut bsp = bsp(&["MAPS/X/GLASS/WINDOW_0_0_0"]);
        bsp.tex_datas = vec![BSPTexData::zeroed()].into();
        bsp.tex_infos = vec![BSPTexInfo::zeroed()].into();

        let fixed = TextureSource::new(&bsp, true);
        assert_eq!(fixed.texture_name(&bsp, 0), "glass/window");
        assert_eq!(fixed.texture_name(&bsp, 5), tool::SKIP);

        let raw = TextureSource::new(&bsp, false);
        assert_eq!(raw.texture_name(&bsp, 0), "MAPS/X/GLASS/WINDOW_0_0_0");
    }

    #[test]
    fn patched_materials() {
        assert!(is_patched_material("materials/maps/cp_well/concrete/wall_12_-4_96.vmt"));
        assert!(is_patched_material("MATERIALS\\MAPS\\CP_WELL\\NATURE\\GRASS_WVT_PATCH.VMT"));
        assert!(is_patched_material("materials/maps/cp_well/water/river_depth_64.vmt"));
        assert!(!is_patched_material("materials/concrete/wall.vmt"));
    }
}
