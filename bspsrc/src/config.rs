use std::{path::Path, str::FromStr};

use ini::Ini;
use thiserror::Error;

use crate::app::AppId;

pub const CONFIG_SECTION: &str = "decompile";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Ini(#[from] ini::Error),
    #[error(transparent)]
    Parse(#[from] ini::ParseError),
}

/// How world geometry is rebuilt
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum BrushMode {
    /// Brushes from their side planes
    #[default]
    BrushPlanes,
    /// Original faces, with split faces filling in undersized originals
    OrigFacePlus,
    /// Original faces only
    OrigFace,
    /// Split faces only
    SplitFace,
}

impl FromStr for BrushMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "brushplanes" => Ok(Self::BrushPlanes),
            "origfaceplus" => Ok(Self::OrigFacePlus),
            "origface" => Ok(Self::OrigFace),
            "splitface" => Ok(Self::SplitFace),
            _ => Err(format!("unknown brush mode {s:?}")),
        }
    }
}

/// Entity IO separator style of the written file
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SourceFormat {
    /// New format for maps that use it, otherwise old
    #[default]
    Auto,
    /// Comma separated, Hammer 3.x
    Old,
    /// ESC separated, Hammer 4.x and later
    New,
}

impl FromStr for SourceFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "old" => Ok(Self::Old),
            "new" => Ok(Self::New),
            _ => Err(format!("unknown source format {s:?}")),
        }
    }
}

/// Every switch of a decompile run. Built once, then shared read-only.
#[derive(Clone, Debug, PartialEq)]
pub struct DecompileConfig {
    /// Game override, `Unknown` detects it per file
    pub app_id: AppId,
    pub brush_mode: BrushMode,
    pub source_format: SourceFormat,
    /// Replaces the texture of every backface when not empty
    pub backface_texture: String,
    /// Replaces the texture of every face when not empty
    pub face_texture: String,
    pub backface_depth: f32,
    pub fix_cubemap_textures: bool,
    pub fix_entity_rot: bool,
    pub fix_tool_textures: bool,
    pub null_output: bool,
    pub skip_prot: bool,
    /// Replace lumps with `<map>_l_<n>.lmp` files found next to the map
    pub load_lump_files: bool,
    pub unpack_embedded: bool,
    /// Leave compiler generated files out when unpacking
    pub smart_unpack: bool,
    pub max_cubemap_sides: usize,
    pub max_overlay_sides: usize,
    pub detail_merge: bool,
    pub detail_merge_thresh: f32,
    pub write_areaportals: bool,
    pub write_brush_entities: bool,
    pub write_cameras: bool,
    pub write_cubemaps: bool,
    pub write_details: bool,
    pub write_disp: bool,
    pub write_occluders: bool,
    pub write_overlays: bool,
    pub write_point_entities: bool,
    pub write_static_props: bool,
    pub write_visgroups: bool,
    pub write_world_brushes: bool,
    pub write_ladders: bool,
    /// Worker threads, 0 for one per core
    pub threads: usize,
    pub debug: bool,
}

impl Default for DecompileConfig {
    fn default() -> Self {
        Self {
            app_id: AppId::Unknown,
            brush_mode: BrushMode::BrushPlanes,
            source_format: SourceFormat::Auto,
            backface_texture: String::new(),
            face_texture: String::new(),
            backface_depth: 1.0,
            fix_cubemap_textures: true,
            fix_entity_rot: true,
            fix_tool_textures: true,
            null_output: false,
            skip_prot: false,
            load_lump_files: true,
            unpack_embedded: false,
            smart_unpack: true,
            max_cubemap_sides: 8,
            max_overlay_sides: 64,
            detail_merge: false,
            detail_merge_thresh: 1.0,
            write_areaportals: true,
            write_brush_entities: true,
            write_cameras: true,
            write_cubemaps: true,
            write_details: true,
            write_disp: true,
            write_occluders: true,
            write_overlays: true,
            write_point_entities: true,
            write_static_props: true,
            write_visgroups: true,
            write_world_brushes: true,
            write_ladders: true,
            threads: 0,
            debug: false,
        }
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(format!("{value:?} is not a boolean")),
    }
}

fn parse<T: FromStr>(value: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| e.to_string())
}

impl DecompileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Ok(Self::from_ini(&Ini::load_from_file(path)?))
    }

    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        Ok(Self::from_ini(&Ini::load_from_str(text)?))
    }

    /// Reads the `[decompile]` section. Unknown keys are ignored, bad values
    /// keep their default.
    pub fn from_ini(ini: &Ini) -> Self {
        let mut config = Self::default();
        let Some(section) = ini.section(Some(CONFIG_SECTION)) else {
            log::debug!("No [{CONFIG_SECTION}] section, using defaults");
            return config;
        };
        for (key, value) in section.iter() {
            if let Err(e) = config.set(key, value) {
                log::warn!("Config {key}: {e}, keeping default");
            }
        }
        config
    }

    /// Sets one field by its name
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "app_id" => self.app_id = AppId::from_steam_id(parse(value)?),
            "brush_mode" => self.brush_mode = parse(value)?,
            "source_format" => self.source_format = parse(value)?,
            "backface_texture" => self.backface_texture = value.trim().to_owned(),
            "face_texture" => self.face_texture = value.trim().to_owned(),
            "backface_depth" => self.backface_depth = parse(value)?,
            "fix_cubemap_textures" => self.fix_cubemap_textures = parse_bool(value)?,
            "fix_entity_rot" => self.fix_entity_rot = parse_bool(value)?,
            "fix_tool_textures" => self.fix_tool_textures = parse_bool(value)?,
            "null_output" => self.null_output = parse_bool(value)?,
            "skip_prot" => self.skip_prot = parse_bool(value)?,
            "load_lump_files" => self.load_lump_files = parse_bool(value)?,
            "unpack_embedded" => self.unpack_embedded = parse_bool(value)?,
            "smart_unpack" => self.smart_unpack = parse_bool(value)?,
            "max_cubemap_sides" => self.max_cubemap_sides = parse(value)?,
            "max_overlay_sides" => self.max_overlay_sides = parse(value)?,
            "detail_merge" => self.detail_merge = parse_bool(value)?,
            "detail_merge_thresh" => self.detail_merge_thresh = parse(value)?,
            "write_areaportals" => self.write_areaportals = parse_bool(value)?,
            "write_brush_entities" => self.write_brush_entities = parse_bool(value)?,
            "write_cameras" => self.write_cameras = parse_bool(value)?,
            "write_cubemaps" => self.write_cubemaps = parse_bool(value)?,
            "write_details" => self.write_details = parse_bool(value)?,
            "write_disp" => self.write_disp = parse_bool(value)?,
            "write_occluders" => self.write_occluders = parse_bool(value)?,
            "write_overlays" => self.write_overlays = parse_bool(value)?,
            "write_point_entities" => self.write_point_entities = parse_bool(value)?,
            "write_static_props" => self.write_static_props = parse_bool(value)?,
            "write_visgroups" => self.write_visgroups = parse_bool(value)?,
            "write_world_brushes" => self.write_world_brushes = parse_bool(value)?,
            "write_ladders" => self.write_ladders = parse_bool(value)?,
            "write_entities" => self.set_write_entities(parse_bool(value)?),
            "threads" => self.threads = parse(value)?,
            "debug" => self.debug = parse_bool(value)?,
            _ => log::debug!("Ignoring unknown config key {key}"),
        }
        Ok(())
    }

    pub fn is_write_entities(&self) -> bool {
        self.write_brush_entities || self.write_point_entities
    }

    pub fn set_write_entities(&mut self, write: bool) {
        self.write_brush_entities = write;
        self.write_point_entities = write;
    }

    pub fn thread_count(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    pub fn dump_to_log(&self) {
        // the derived debug output lists every field
        for line in format!("{self:#?}").lines() {
            log::debug!("{line}");
        }
    }
}
