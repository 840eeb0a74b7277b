use flagset::flags;
use num_derive::FromPrimitive;

pub const HEADER_LUMPS: usize = 64;
pub const HEADER_SIZE: usize = 8 + HEADER_LUMPS * 16 + 4;

/// Little endian "VBSP"
pub const VBSP_IDENT: [u8; 4] = *b"VBSP";
/// Big endian console builds store the ident reversed
pub const PSBV_IDENT: [u8; 4] = *b"PSBV";
/// Marker at the start of a compressed lump or game lump
pub const LZMA_IDENT: [u8; 4] = *b"LZMA";

pub const MIN_BSP_VERSION: i32 = 17;
pub const MAX_BSP_VERSION: i32 = 29;

// upper design bounds
pub const MIN_MAP_DISP_POWER: u32 = 2; // Minimum and maximum power a displacement can be.
pub const MAX_MAP_DISP_POWER: u32 = 4;

pub const fn num_disp_power_verts(power: u32) -> usize {
    ((1 << (power)) + 1) * ((1 << (power)) + 1)
}
pub const fn num_disp_power_tris(power: u32) -> usize {
    (1 << (power)) * (1 << (power)) * 2
}

pub const MAX_MAP_MODELS: usize = 1024;
pub const MAX_MAP_BRUSHES: usize = 8192;
pub const MAX_MAP_TEXINFO: usize = 12288;
pub const MAX_MAP_TEXDATA: usize = 2048;
pub const MAX_MAP_DISPINFO: usize = 2048;
pub const MAX_MAP_AREAPORTALS: usize = 1024;
// Planes come in pairs, thus an even number.
pub const MAX_MAP_PLANES: usize = 65536;
pub const MAX_MAP_NODES: usize = 65536;
pub const MAX_MAP_BRUSHSIDES: usize = 65536;
pub const MAX_MAP_LEAFS: usize = 65536;
pub const MAX_MAP_VERTS: usize = 65536;
pub const MAX_MAP_FACES: usize = 65536;
pub const MAX_MAP_LEAFBRUSHES: usize = 65536;
pub const MAX_MAP_PORTALVERTS: usize = 128000;
pub const MAX_MAP_EDGES: usize = 256000;
pub const MAX_MAP_SURFEDGES: usize = 512000;
pub const MAX_MAP_CUBEMAPSAMPLES: usize = 1024;
pub const MAX_MAP_OVERLAYS: usize = 512;
pub const MAX_MAP_TEXDATA_STRING_TABLE: usize = 65536;

pub const TEXTURE_NAME_LENGTH: usize = 128;
pub const STATIC_PROP_NAME_LENGTH: usize = 128;

pub const OVERLAY_BSP_FACE_COUNT: usize = 64;
pub const OVERLAY_NUM_RENDER_ORDERS: u16 = 4;
pub const OVERLAY_RENDER_ORDER_NUM_BITS: u16 = 2;
pub const OVERLAY_RENDER_ORDER_MASK: u16 = 0xC000;

/// Set in `min_tess` when the field actually carries displacement surface flags
pub const DISP_INFO_FLAG_MAGIC: i32 = 0x80000000u32 as i32;

#[derive(Copy, Clone, FromPrimitive, Debug, PartialEq, Eq, Hash)]
pub enum LumpType {
    Entities = 0,
    Planes = 1,
    TexData = 2,
    Vertexes = 3,
    Visibility = 4,
    Nodes = 5,
    TexInfo = 6,
    Faces = 7,
    Lighting = 8,
    Occlusion = 9,
    Leafs = 10,
    FaceIds = 11,
    Edges = 12,
    SurfEdges = 13,
    Models = 14,
    WorldLights = 15,
    LeafFaces = 16,
    LeafBrushes = 17,
    Brushes = 18,
    BrushSides = 19,
    Areas = 20,
    AreaPortals = 21,
    DispInfo = 26,
    OriginalFaces = 27,
    PhysDisp = 28,
    PhysCollide = 29,
    VertNormals = 30,
    VertNormalIndices = 31,
    DispLightmapAlphas = 32,
    DispVerts = 33,
    DispLightmapSamplePositions = 34,
    GameLump = 35,
    LeafWaterData = 36,
    Primitives = 37,
    PrimVerts = 38,
    PrimIndices = 39,
    PakFile = 40,
    ClipPortalVerts = 41,
    Cubemaps = 42,
    TexDataStringData = 43,
    TexDataStringTable = 44,
    Overlays = 45,
    LeafMinDistToWater = 46,
    FaceMacroTextureInfo = 47,
    DispTris = 48,
    PropBlob = 49,
    WaterOverlays = 50,
    LeafAmbientIndexHdr = 51,
    LeafAmbientIndex = 52,
    LightingHdr = 53,
    WorldLightsHdr = 54,
    LeafAmbientLightingHdr = 55,
    LeafAmbientLighting = 56,
    XZipPakFile = 57,
    FacesHdr = 58,
    MapFlags = 59,
    OverlayFades = 60,
    OverlaySystemLevels = 61,
    PhysLevel = 62,
    DispMultiBlend = 63,
}

impl LumpType {
    /// Lumps without which no geometry can be rebuilt. A decode failure in one of
    /// these aborts the file, anything else degrades to an empty lump.
    pub fn is_geometry(self) -> bool {
        matches!(
            self,
            LumpType::Planes
                | LumpType::Vertexes
                | LumpType::Edges
                | LumpType::SurfEdges
                | LumpType::Faces
                | LumpType::Brushes
                | LumpType::BrushSides
                | LumpType::TexInfo
                | LumpType::TexData
                | LumpType::Models
        )
    }
}

flags! {
    pub enum Contents: i32 {
        SOLID = 0x1,           //an eye is never valid in a solid
        WINDOW = 0x2,          //translucent, but not watery (glass)
        AUX = 0x4,             //
        GRATE = 0x8, //alpha-tested "grate" textures. Bullets/sight pass through, but solids don't
        SLIME = 0x10, //
        WATER = 0x20, //
        BLOCKLOS = 0x40, // block AI line of sight (MIST in older games)
        OPAQUE = 0x80, //	things that cannot be seen through (may be non-solid though)
        TESTFOGVOLUME = 0x100, //
        UNUSED = 0x200, //unused
        BLOCKLIGHT = 0x400, // shadow casting on newer branches
        TEAM1 = 0x800, //per team contents used to differentiate collisions between players and objects on different teams
        TEAM2 = 0x1000,
        IgnoreNodrawOpaque = 0x2000, //ignore CONTENTS_OPAQUE on surfaces that have SURF_NODRAW
        MOVEABLE = 0x4000,             //hits entities which are MOVETYPE_PUSH (doors, plats, etc.)
        AREAPORTAL = 0x8000,           //remaining contents are non-visible, and don't eat brushes
        PLAYERCLIP = 0x10000,          //
        MONSTERCLIP = 0x20000,         //
        Current0 = 0x40000,           //currents can be added to any other contents, and may be mixed
        Current90 = 0x80000,
        Current180 = 0x100000,
        Current270 = 0x200000,
        CurrentUp = 0x400000,
        CurrentDown = 0x800000,
        ORIGIN = 0x1000000,       //	removed before bsping an entity
        MONSTER = 0x2000000,      //	should never be on a brush, only in game
        DEBRIS = 0x4000000,       //
        DETAIL = 0x8000000,       //	brushes to be added after vis leafs
        TRANSLUCENT = 0x10000000, // 	auto set if any surface has trans
        LADDER = 0x20000000,      //
        HITBOX = 0x40000000,      // 	use accurate hitboxes on trace
    }

    pub enum SurfFlags: i32 {
        LIGHT = 0x1,        // value will hold the light strength
        SKY2D = 0x2,        // don't draw, indicates we should skylight + draw 2d sky but not draw the 3D skybox
        SKY = 0x4,          // don't draw, but add to skybox
        WARP = 0x8,         // turbulent water warp
        TRANS = 0x10,
        NOPORTAL = 0x20,    // the surface can not have a portal placed on it
        TRIGGER = 0x40,     // xbox hack to work around elimination of trigger surfaces, which breaks occluders
        NODRAW = 0x80,      // don't bother referencing the texture
        HINT = 0x100,       // make a primary bsp splitter
        SKIP = 0x200,       // completely ignore, allowing non-closed brushes
        NOLIGHT = 0x400,    // Don't calculate light
        BUMPLIGHT = 0x800,  // calculate three lightmaps for the surface for bumpmapping
        NOSHADOWS = 0x1000, // Don't receive shadows
        NODECALS = 0x2000,  // Don't receive decals
        NOCHOP = 0x4000,    // Don't subdivide patches on this surface
        HITBOX = 0x8000,    // surface is part of a hitbox
    }

    pub enum StaticPropFlags: u32 {
        FADES = 0x1,
        UseLightingOrigin = 0x2,
        NoDraw = 0x4,
        IgnoreNormals = 0x8,
        NoShadow = 0x10,
        ScreenSpaceFade = 0x20,
        NoPerVertexLighting = 0x40,
        NoSelfShadowing = 0x80,
        NoPerTexelLighting = 0x100,
    }
}

#[cfg(test)]
mod consts_tests {
    use flagset::FlagSet;
    use num_traits::FromPrimitive;

    use super::*;

    #[test]
    fn header_size() {
        assert_eq!(HEADER_SIZE, 1036);
    }

    #[test]
    fn lump_indices() {
        assert_eq!(LumpType::from_usize(35), Some(LumpType::GameLump));
        assert_eq!(LumpType::from_usize(48), Some(LumpType::DispTris));
        assert_eq!(LumpType::from_usize(22), None);
    }

    #[test]
    fn truncated_flags() {
        let contents = FlagSet::<Contents>::new_truncated(0x8000001);
        assert!(contents.contains(Contents::DETAIL));
        assert!(contents.contains(Contents::SOLID));
        assert!(!contents.contains(Contents::LADDER));
    }

    #[test]
    fn disp_sizes() {
        assert_eq!(num_disp_power_verts(2), 25);
        assert_eq!(num_disp_power_tris(3), 128);
    }
}
