//! Editor-only materials and the flags the compiler leaves behind for them.

use flagset::FlagSet;

use crate::{
    app::AppId,
    bsp::consts::{Contents, SurfFlags},
};

pub const NODRAW: &str = "tools/toolsnodraw";
pub const WHITE: &str = "skybox/sky_fake_white";
pub const BLACK: &str = "tools/toolsblack";
pub const INVIS: &str = "tools/toolsinvisible";
pub const ORANGE: &str = "dev/dev_measuregeneric01";
pub const SKIP: &str = "tools/toolsskip";
pub const HINT: &str = "tools/toolshint";
pub const CLIP: &str = "tools/toolsclip";
pub const PLAYERCLIP: &str = "tools/toolsplayerclip";
pub const NPCCLIP: &str = "tools/toolsnpcclip";
pub const AREAPORTAL: &str = "tools/toolsareaportal";
pub const BLOCKLIGHT: &str = "tools/toolsblocklight";
pub const BLOCKBULLETS: &str = "tools/toolsblockbullets";
pub const BLOCKLOS: &str = "tools/toolsblock_los";
pub const INVISLADDER: &str = "tools/toolsinvisibleladder";
pub const DOTTED: &str = "tools/toolsdotted";
pub const OCCLUDER: &str = "tools/toolsoccluder";
pub const TRIGGER: &str = "tools/toolstrigger";
pub const FOG: &str = "tools/toolsfog";
pub const SKYBOX: &str = "tools/toolsskybox";
pub const SKYBOX2D: &str = "tools/toolsskybox2d";

pub const CSGO_GRENADECLIP: &str = "tools/toolsgrenadeclip";
pub const CSGO_DRONECLIP: &str = "tools/toolsdroneclip";

/// Material clips of CS:GO with the surface property each one carries
const CSGO_MATERIAL_CLIPS: [(&str, &str); 18] = [
    ("tools/toolsclip_concrete", "concrete"),
    ("tools/toolsclip_dirt", "dirt"),
    ("tools/toolsclip_glass", "glassfloor"),
    ("tools/toolsclip_grass", "grass"),
    ("tools/toolsclip_gravel", "gravel"),
    ("tools/toolsclip_metal", "metal"),
    ("tools/toolsclip_metal_sand_barrel", "metal_sand_barrel"),
    ("tools/toolsclip_metalgrate", "metalgrate"),
    ("tools/toolsclip_metalvehicle", "metalvehicle"),
    ("tools/toolsclip_plastic", "plastic"),
    ("tools/toolsclip_rubber", "rubber"),
    ("tools/toolsclip_rubbertire", "rubbertire"),
    ("tools/toolsclip_sand", "sand"),
    ("tools/toolsclip_snow", "snow"),
    ("tools/toolsclip_tile", "tile"),
    ("tools/toolsclip_wood", "wood"),
    ("tools/toolsclip_wood_basket", "Wood_Basket"),
    ("tools/toolsclip_wood_crate", "Wood_Crate"),
];

const SILENT: &str = "default_silent";

/// Flags a brush and its side must (or must not) carry for a tool texture to
/// be the one that produced them
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolTextureDefinition {
    pub surface_property: Option<&'static str>,
    pub required_contents: FlagSet<Contents>,
    pub forbidden_contents: FlagSet<Contents>,
    pub required_surface: FlagSet<SurfFlags>,
    pub forbidden_surface: FlagSet<SurfFlags>,
}

impl ToolTextureDefinition {
    pub fn new(
        required_contents: impl Into<FlagSet<Contents>>,
        required_surface: impl Into<FlagSet<SurfFlags>>,
    ) -> Self {
        Self {
            required_contents: required_contents.into(),
            required_surface: required_surface.into(),
            ..Default::default()
        }
    }

    pub fn surface_property(mut self, property: &'static str) -> Self {
        self.surface_property = Some(property);
        self
    }

    pub fn forbid_contents(mut self, contents: impl Into<FlagSet<Contents>>) -> Self {
        self.forbidden_contents = contents.into();
        self
    }

    pub fn without_surface_requirements(mut self) -> Self {
        self.required_surface = FlagSet::default();
        self.forbidden_surface = FlagSet::default();
        self
    }

    pub fn contents_requirements(&self) -> u32 {
        self.required_contents.bits().count_ones() + self.forbidden_contents.bits().count_ones()
    }

    pub fn surface_requirements(&self) -> u32 {
        self.required_surface.bits().count_ones() + self.forbidden_surface.bits().count_ones()
    }

    pub fn matches_contents(&self, contents: FlagSet<Contents>) -> bool {
        contents.contains(self.required_contents) && contents.is_disjoint(self.forbidden_contents)
    }

    pub fn matches_surface(&self, surface: FlagSet<SurfFlags>) -> bool {
        surface.contains(self.required_surface) && surface.is_disjoint(self.forbidden_surface)
    }
}

/// Tool texture definitions of one game, in a stable order
#[derive(Clone, Debug, Default)]
pub struct ToolTextureSet {
    definitions: Vec<(&'static str, ToolTextureDefinition)>,
}

impl ToolTextureSet {
    pub fn for_app(app: AppId) -> Self {
        match app {
            AppId::CounterStrikeSource => Self::counter_strike_source(),
            AppId::CounterStrikeGo => Self::counter_strike_go(),
            _ => Self::source_2013(),
        }
    }

    /// Adds a definition, replacing any previous one of the same name
    pub fn insert(&mut self, name: &'static str, definition: ToolTextureDefinition) {
        match self.definitions.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = definition,
            None => self.definitions.push((name, definition)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolTextureDefinition> {
        self.definitions
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, d)| d)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ToolTextureDefinition)> {
        self.definitions.iter().map(|(n, d)| (*n, d))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn source_2013() -> Self {
        use Contents as C;
        use SurfFlags as S;
        use ToolTextureDefinition as D;

        let mut set = Self::default();
        set.insert(AREAPORTAL, D::new(C::AREAPORTAL, S::NOLIGHT));
        set.insert(
            BLOCKBULLETS,
            D::new(C::WINDOW | C::TRANSLUCENT, S::TRANS | S::NODRAW | S::NOLIGHT),
        );
        set.insert(BLOCKLIGHT, D::new(C::OPAQUE | C::DETAIL, S::NODRAW | S::NOLIGHT));
        set.insert(BLOCKLOS, D::new(C::BLOCKLOS | C::DETAIL, S::NODRAW | S::NOLIGHT));
        set.insert(
            INVIS,
            D::new(C::GRATE | C::TRANSLUCENT, S::TRANS | S::NODRAW | S::NOLIGHT)
                .forbid_contents(C::SOLID),
        );
        set.insert(
            INVISLADDER,
            D::new(C::GRATE | C::TRANSLUCENT | C::LADDER, S::NODRAW | S::NOLIGHT)
                .forbid_contents(C::SOLID),
        );
        set.insert(NODRAW, D::new(FlagSet::<C>::default(), S::NODRAW | S::NOLIGHT));
        set.insert(TRIGGER, D::new(FlagSet::<C>::default(), S::NOLIGHT | S::TRIGGER));
        set.insert(HINT, D::new(FlagSet::<C>::default(), S::NODRAW | S::HINT | S::NOLIGHT));
        set.insert(SKIP, D::new(FlagSet::<C>::default(), S::NODRAW | S::SKIP | S::NOLIGHT));
        set.insert(
            CLIP,
            D::new(C::PLAYERCLIP | C::MONSTERCLIP | C::DETAIL, S::NODRAW | S::NOLIGHT)
                .surface_property(SILENT),
        );
        set.insert(
            NPCCLIP,
            D::new(C::MONSTERCLIP | C::DETAIL, S::NODRAW | S::NOLIGHT).surface_property(SILENT),
        );
        set.insert(PLAYERCLIP, D::new(C::PLAYERCLIP | C::DETAIL, S::NODRAW | S::NOLIGHT));
        set.insert(
            SKYBOX,
            D::new(C::SOLID, S::SKY | S::NOLIGHT).surface_property(SILENT),
        );
        set.insert(
            SKYBOX2D,
            D::new(C::SOLID, S::SKY | S::SKY2D | S::NOLIGHT).surface_property(SILENT),
        );
        set
    }

    /// CS:S clips keep their surface flags out of the compiled map
    pub fn counter_strike_source() -> Self {
        let mut set = Self::source_2013();
        for name in [CLIP, NPCCLIP, PLAYERCLIP] {
            if let Some(def) = set.get(name).cloned() {
                set.insert(name, def.without_surface_requirements());
            }
        }
        set
    }

    pub fn counter_strike_go() -> Self {
        use Contents as C;
        use SurfFlags as S;
        use ToolTextureDefinition as D;

        let mut set = Self::source_2013();
        set.insert(
            CSGO_GRENADECLIP,
            D::new(C::Current90 | C::DETAIL, S::NODRAW | S::NOLIGHT),
        );
        set.insert(
            CSGO_DRONECLIP,
            D::new(C::Current180 | C::DETAIL, S::NODRAW | S::NOLIGHT),
        );

        let clip = set.get(CLIP).cloned().unwrap_or_default();
        for (name, property) in CSGO_MATERIAL_CLIPS {
            set.insert(name, clip.clone().surface_property(property));
        }
        set
    }
}

#[cfg(test)]
mod tool_tests {
    use super::*;

    #[test]
    fn sets_per_app() {
        let base = ToolTextureSet::for_app(AppId::HalfLife2);
        assert_eq!(base.len(), 15);

        let css = ToolTextureSet::for_app(AppId::CounterStrikeSource);
        assert_eq!(css.len(), 15);
        assert_eq!(css.get(CLIP).unwrap().surface_requirements(), 0);
        assert_eq!(css.get(CLIP).unwrap().contents_requirements(), 3);

        let csgo = ToolTextureSet::for_app(AppId::CounterStrikeGo);
        assert_eq!(csgo.len(), 15 + 2 + CSGO_MATERIAL_CLIPS.len());
        let dirt = csgo.get("TOOLS/TOOLSCLIP_DIRT").unwrap();
        assert_eq!(dirt.surface_property, Some("dirt"));
        assert_eq!(dirt.required_contents, csgo.get(CLIP).unwrap().required_contents);
    }

    #[test]
    fn forbidden_contents() {
        let set = ToolTextureSet::source_2013();
        let invis = set.get(INVIS).unwrap();
        assert!(invis.matches_contents(Contents::GRATE | Contents::TRANSLUCENT));
        assert!(!invis.matches_contents(Contents::GRATE | Contents::TRANSLUCENT | Contents::SOLID));
        assert_eq!(invis.contents_requirements(), 3);
    }
}
