//! Material names and texture projections for written brush sides.

use glam::Vec3;

mod builder;
mod matcher;
pub mod source;
pub mod tool;

pub use builder::{TextureBuilder, TextureRequest, TextureStats};
pub use matcher::ToolTextureMatcher;
pub use source::TextureSource;
pub use tool::{ToolTextureDefinition, ToolTextureSet};

pub const DEFAULT_SCALE: f32 = 0.25;
pub const DEFAULT_LIGHTMAP_SCALE: i32 = 16;

/// One texture projection axis as Hammer stores it: `[x y z shift] scale`
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TextureAxis {
    pub axis: Vec3,
    pub shift: i32,
    pub scale: f32,
}

impl TextureAxis {
    pub fn new(axis: Vec3, shift: i32, scale: f32) -> Self {
        Self { axis, shift, scale }
    }

    pub fn from_axis(axis: Vec3) -> Self {
        Self::new(axis, 0, DEFAULT_SCALE)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    /// Name as stored in the map
    pub original: String,
    /// Name to write instead, if any
    pub override_name: Option<String>,
    pub u: TextureAxis,
    pub v: TextureAxis,
    pub lightmap_scale: i32,
    /// String table index of the texture, when it came from a texinfo
    pub texname: Option<usize>,
}

impl Default for Texture {
    fn default() -> Self {
        Self {
            original: tool::SKIP.to_owned(),
            override_name: None,
            u: TextureAxis::from_axis(Vec3::X),
            v: TextureAxis::from_axis(Vec3::Y),
            lightmap_scale: DEFAULT_LIGHTMAP_SCALE,
            texname: None,
        }
    }
}

impl Texture {
    /// Name that ends up in the output
    pub fn name(&self) -> &str {
        self.override_name.as_deref().unwrap_or(&self.original)
    }

    pub fn set_override(&mut self, name: impl Into<String>) {
        self.override_name = Some(name.into());
    }

    /// Plain texture of the given name aligned to a face
    pub fn aligned(name: &str, normal: Vec3) -> Self {
        let mut texture = Self {
            original: name.to_owned(),
            ..Default::default()
        };
        builder::align_to_face(&mut texture, normal);
        texture
    }
}
