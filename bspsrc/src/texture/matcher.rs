use flagset::FlagSet;

use crate::bsp::consts::{Contents, SurfFlags};

use super::tool::{ToolTextureDefinition, ToolTextureSet};

/// Guesses which tool texture a brush side carried before compiling, from
/// the flags the compiler kept
#[derive(Clone, Debug, Default)]
pub struct ToolTextureMatcher {
    set: ToolTextureSet,
}

impl ToolTextureMatcher {
    pub fn new(set: ToolTextureSet) -> Self {
        Self { set }
    }

    pub fn set(&self) -> &ToolTextureSet {
        &self.set
    }

    /// Best matching tool texture, or `None` if no definition applies.
    ///
    /// `original` is the texture currently in the slot; a candidate with a
    /// different surface property than that texture's definition is never
    /// picked. Unknown surface flags skip the surface requirements.
    pub fn fix_tool_texture(
        &self,
        original: Option<&str>,
        surface: Option<FlagSet<SurfFlags>>,
        contents: FlagSet<Contents>,
    ) -> Option<&'static str> {
        let property = original
            .and_then(|name| self.set.get(name))
            .map(|def| def.surface_property);

        self.set
            .iter()
            .filter(|(_, def)| match property {
                Some(p) => match (p, def.surface_property) {
                    (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                    (a, b) => a.is_none() && b.is_none(),
                },
                None => true,
            })
            .filter_map(|(name, def)| Some((name, score(def, surface, contents)?)))
            .filter(|&(_, score)| score > 0)
            // first of equal scores wins
            .fold(None, |best: Option<(&'static str, u32)>, candidate| match best {
                Some(b) if b.1 >= candidate.1 => Some(b),
                _ => Some(candidate),
            })
            .map(|(name, _)| name)
    }
}

/// Number of satisfied requirements, `None` if any is violated
fn score(
    def: &ToolTextureDefinition,
    surface: Option<FlagSet<SurfFlags>>,
    contents: FlagSet<Contents>,
) -> Option<u32> {
    if !def.matches_contents(contents) {
        return None;
    }
    let mut score = def.contents_requirements();
    if let Some(surface) = surface {
        if !def.matches_surface(surface) {
            return None;
        }
        score += def.surface_requirements();
    }
    Some(score)
}
