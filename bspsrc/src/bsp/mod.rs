pub mod areaportal;
pub mod brush;
pub mod consts;
pub mod cubemap;
pub mod displacement;
pub mod edges;
pub mod entity;
pub mod face;
pub mod gamelump;
pub mod header;
pub mod lump;
pub mod lump_file;
pub mod lzma;
pub mod model;
pub mod occluder;
pub mod overlay;
pub mod plane;
pub mod static_prop;
pub mod textures;
pub mod tree;

pub use lump::Lump;

// https://developer.valvesoftware.com/wiki/BSP_(Source)
//
// The BSP file contains the vast majority of the information needed by the Source engine to render and play a map.
// This includes the geometry of all the polygons in the level; references to the names and orientation of the textures
// to be drawn on those polygons; the data used to simulate the physical behaviour of the player and other items during
// the game; the location and properties of all brush-based, model (prop) based, and non-visible (logical) entities in
// the map; and the BSP tree and visibility table used to locate the player location in the map geometry and to render
// the visible map as efficiently as possible. Optionally, the map file can also contain any custom textures and models
// used on the level, embedded inside the map's Pakfile lump.
//
// The data in the BSP file can be stored in little-endian for PC or in big-endian for consoles such as the
// PlayStation 3 and Xbox 360. Only the little-endian layout is read here.

use std::{
    borrow::Cow,
    collections::HashSet,
    path::Path,
    sync::OnceLock,
};

use common::vfile::VFileSystem;
use glam::Vec3;
use num_traits::FromPrimitive;

use crate::{
    app::{AppDb, AppId},
    error::{BspError, FormatError, PipelineWarning},
};

use self::{
    areaportal::{BSPAreaPortal, BSPClipPortalVert},
    brush::{BSPBrush, BSPBrushSide},
    consts::{LumpType, HEADER_LUMPS, HEADER_SIZE},
    cubemap::BSPCubemapSample,
    displacement::{BSPDispInfo, BSPDispTri, BSPDispVert},
    edges::{BSPEdge, BSPSurfEdge},
    entity::{parse_entities, Entity},
    face::BSPFace,
    gamelump::{looks_like_vindictus, GameLumpDirectory, SPRP_ID},
    header::BSPHeader,
    lump::{decode_records, BSPLump},
    lump_file::{ExternalLump, MAX_LUMP_FILES},
    model::BSPModel,
    occluder::Occlusion,
    overlay::BSPOverlay,
    plane::BSPPlane,
    static_prop::StaticPropLump,
    textures::{texture_names, BSPTexData, BSPTexDataStringTable, BSPTexInfo},
    tree::{BSPLeaf, BSPNode},
};

/// Size of the per-face average light colors in front of version 18 faces
const FACE_BSP18_PREFIX: usize = 16;

/// One slot of the lump directory as stored in the header
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LumpInfo {
    pub lump: LumpType,
    pub offset: usize,
    /// Bytes occupied in the file
    pub stored_len: usize,
    /// Length after decompression
    pub declared_len: usize,
    pub version: i32,
    pub compressed: bool,
}

/// A loaded container. Lumps are sliced out of the file on demand,
/// compressed lumps are decompressed once and cached.
pub struct BspFile {
    name: String,
    data: Vec<u8>,
    header: BSPHeader,
    /// Lumps replaced by `.lmp` files
    external: [Option<ExternalLump>; HEADER_LUMPS],
    decompressed: [OnceLock<Result<Vec<u8>, FormatError>>; HEADER_LUMPS],
}

impl std::fmt::Debug for BspFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BspFile")
            .field("name", &self.name)
            .field("size", &self.data.len())
            .field("header", &self.header)
            .finish()
    }
}

impl BspFile {
    pub fn open(path: &Path) -> Result<Self, BspError> {
        let data = std::fs::read(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::load(name, data)?)
    }

    /// Validates the header and lump directory of an in-memory file
    pub fn load(name: impl Into<String>, data: Vec<u8>) -> Result<Self, FormatError> {
        if data.len() < HEADER_SIZE {
            return Err(FormatError::FileTooSmall(data.len()));
        }
        let header: BSPHeader = bytemuck::pod_read_unaligned(&data[..HEADER_SIZE]);
        header.validate()?;

        for (i, lump) in header.lumps.iter().enumerate() {
            let Some(lump_type) = LumpType::from_usize(i) else {
                continue;
            };
            lump.range(lump_type, data.len())?;
        }

        let version = header.version;
        log::debug!("Loaded BSP version {version}, revision {}", header.map_revision);

        Ok(Self {
            name: name.into(),
            data,
            header,
            external: std::array::from_fn(|_| None),
            decompressed: std::array::from_fn(|_| OnceLock::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &BSPHeader {
        &self.header
    }

    pub fn version(&self) -> i32 {
        self.header.version
    }

    pub fn map_revision(&self) -> i32 {
        self.header.map_revision
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Replaces the contents and version of one lump
    pub fn replace_lump(&mut self, external: ExternalLump) {
        let index = external.lump as usize;
        self.decompressed[index] = OnceLock::new();
        self.external[index] = Some(external);
    }

    pub fn is_replaced(&self, lump: LumpType) -> bool {
        self.external[lump as usize].is_some()
    }

    /// Loads `<name>_l_<n>.lmp` files next to the map, in order, until one
    /// is missing. Later files win over earlier ones.
    pub fn load_lump_files(&mut self, bsp_path: &Path) -> Vec<PipelineWarning> {
        let mut warnings = Vec::new();
        for i in 0..MAX_LUMP_FILES {
            let path = bsp_path.with_file_name(format!("{}_l_{i}.lmp", self.name));
            if !path.is_file() {
                break;
            }
            let file = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let loaded = std::fs::read(&path)
                .map_err(|e| e.to_string())
                .and_then(|data| ExternalLump::read(&data).map_err(|e| e.to_string()));
            match loaded {
                Ok(external) => {
                    log::info!("Loaded {:?} lump from {file}", external.lump);
                    self.replace_lump(external);
                }
                Err(error) => {
                    log::warn!("Unable to load lump file {file}: {error}");
                    warnings.push(PipelineWarning::LumpFile { file, error });
                }
            }
        }
        warnings
    }

    fn raw(&self, lump: LumpType) -> Result<&[u8], FormatError> {
        if let Some(external) = &self.external[lump as usize] {
            return Ok(&external.data);
        }
        let range = self.header.get_lump_header(lump).range(lump, self.data.len())?;
        Ok(&self.data[range])
    }

    /// Uncompressed contents of a lump
    pub fn lump_bytes(&self, lump: LumpType) -> Result<&[u8], FormatError> {
        let raw = self.raw(lump)?;
        if !BSPHeader::is_lzma(raw) {
            return Ok(raw);
        }
        self.decompressed[lump as usize]
            .get_or_init(|| {
                log::trace!("Decompressing {lump:?} lump");
                lzma::decompress(raw)
            })
            .as_ref()
            .map(Vec::as_slice)
            .map_err(Clone::clone)
    }

    pub fn lump_version(&self, lump: LumpType) -> i32 {
        if let Some(external) = &self.external[lump as usize] {
            return external.version;
        }
        self.header.get_lump_header(lump).version
    }

    /// Decodes a flat record lump
    pub fn decode<T: Lump + bytemuck::Pod>(&self) -> Result<Box<[T]>, FormatError> {
        let lump = T::lump_type();
        let records: Box<[T]> = decode_records(lump, self.lump_bytes(lump)?);
        if records.len() > T::max() {
            log::warn!("{lump:?} lump has {} records, limit is {}", records.len(), T::max());
        }
        Ok(records)
    }

    /// Decodes a lump of fixed size records that may be stored wider or
    /// narrower than `T`
    pub fn decode_sized<T: bytemuck::Pod>(
        &self,
        lump: LumpType,
        record_size: usize,
        skip: usize,
    ) -> Result<Box<[T]>, FormatError> {
        let bytes = self.lump_bytes(lump)?;
        if record_size == 0 {
            return Ok(Box::new([]));
        }
        let residual = bytes.len() % record_size;
        if residual != 0 {
            log::warn!("{lump:?} lump has {residual} residual bytes");
        }
        let mut out = Vec::with_capacity(bytes.len() / record_size);
        for chunk in bytes.chunks_exact(record_size) {
            let mut value = T::zeroed();
            let dst = bytemuck::bytes_of_mut(&mut value);
            let src = chunk.get(skip..).unwrap_or_default();
            let n = dst.len().min(src.len());
            dst[..n].copy_from_slice(&src[..n]);
            out.push(value);
        }
        Ok(out.into_boxed_slice())
    }

    /// The lump directory, with the uncompressed size of every lump
    pub fn directory(&self) -> Vec<LumpInfo> {
        self.header
            .lumps
            .iter()
            .enumerate()
            .filter_map(|(i, lump)| {
                let lump_type = LumpType::from_usize(i)?;
                Some(self.lump_info(lump_type, lump))
            })
            .collect()
    }

    fn lump_info(&self, lump_type: LumpType, lump: &BSPLump) -> LumpInfo {
        if let Some(external) = &self.external[lump_type as usize] {
            let compressed = BSPHeader::is_lzma(&external.data);
            let declared_len = if compressed {
                self.lump_bytes(lump_type).map_or(0, <[u8]>::len)
            } else {
                external.data.len()
            };
            return LumpInfo {
                lump: lump_type,
                offset: external.offset,
                stored_len: external.data.len(),
                declared_len,
                version: external.version,
                compressed,
            };
        }
        let compressed = self.raw(lump_type).is_ok_and(BSPHeader::is_lzma);
        let stored_len = lump.file_len.max(0) as usize;
        LumpInfo {
            lump: lump_type,
            offset: lump.file_ofs.max(0) as usize,
            stored_len,
            declared_len: if compressed {
                lump.uncompressed_len()
            } else {
                stored_len
            },
            version: lump.version,
            compressed,
        }
    }

    pub fn game_lumps(&self, app: AppId) -> Result<GameLumpDirectory, FormatError> {
        let data = self.lump_bytes(LumpType::GameLump)?;
        let offset = match &self.external[LumpType::GameLump as usize] {
            Some(external) => external.offset,
            None => self.header.get_lump_header(LumpType::GameLump).file_ofs.max(0) as usize,
        };
        GameLumpDirectory::read(data, offset, app)
    }

    /// Guesses the game from the map name, version and entity classes
    pub fn detect_app(&self, db: &AppDb) -> AppId {
        if self.version() == 20
            && self
                .lump_bytes(LumpType::GameLump)
                .is_ok_and(looks_like_vindictus)
        {
            log::debug!("Found Vindictus game lump header");
            return AppId::Vindictus;
        }

        let classes: HashSet<String> = self
            .lump_bytes(LumpType::Entities)
            .map(|data| parse_entities(data, self.version() == 17))
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.class_name().to_owned())
            .collect();
        let app = db.find(&self.name, self.version(), &classes);
        log::info!("Detected game: {}", app.name());
        app
    }
}

/// Every lump the decompiler reads, decoded
#[derive(Debug, Default)]
pub struct BspData {
    pub version: i32,
    pub map_revision: i32,
    pub app: AppId,

    pub planes: Box<[BSPPlane]>,
    pub vertexes: Box<[Vec3]>,
    pub edges: Box<[BSPEdge]>,
    pub surfedges: Box<[BSPSurfEdge]>,
    pub faces: Box<[BSPFace]>,
    pub orig_faces: Box<[BSPFace]>,
    pub brushes: Box<[BSPBrush]>,
    pub brush_sides: Box<[BSPBrushSide]>,
    pub tex_infos: Box<[BSPTexInfo]>,
    pub tex_datas: Box<[BSPTexData]>,
    /// Texture names indexed by string table id
    pub texture_names: Vec<String>,
    pub models: Box<[BSPModel]>,
    pub nodes: Box<[BSPNode]>,
    pub leafs: Box<[BSPLeaf]>,
    pub leaf_brushes: Box<[u16]>,
    pub area_portals: Box<[BSPAreaPortal]>,
    pub clip_portal_verts: Box<[BSPClipPortalVert]>,
    pub occlusion: Occlusion,
    pub overlays: Box<[BSPOverlay]>,
    pub cubemaps: Box<[BSPCubemapSample]>,
    pub disp_infos: Box<[BSPDispInfo]>,
    pub disp_verts: Box<[BSPDispVert]>,
    pub disp_tris: Box<[BSPDispTri]>,
    pub entities: Vec<Entity>,
    pub static_props: StaticPropLump,
    pub pak: VFileSystem,
}

impl BspData {
    /// Decodes everything. Geometry lumps are required, any other lump that
    /// fails to decode is left empty and reported in the returned warnings.
    pub fn read(
        file: &BspFile,
        app: AppId,
    ) -> Result<(Self, Vec<PipelineWarning>), FormatError> {
        let mut warnings = Vec::new();
        let version = file.version();

        let mut optional = OptionalLumps(&mut warnings);

        let face_size = if version == 18 { 72 } else { 56 };
        let face_skip = if version == 18 { FACE_BSP18_PREFIX } else { 0 };

        let mut data = Self {
            version,
            map_revision: file.map_revision(),
            app,
            planes: required(file.decode())?,
            vertexes: required(file.decode())?,
            edges: required(file.decode())?,
            surfedges: required(file.decode())?,
            faces: required_lump(
                LumpType::Faces,
                file.decode_sized(LumpType::Faces, face_size, face_skip),
            )?,
            brushes: required(file.decode())?,
            brush_sides: required(file.decode())?,
            tex_infos: required(file.decode())?,
            tex_datas: required(file.decode())?,
            models: required(file.decode())?,
            ..Default::default()
        };

        data.orig_faces = optional.get(
            LumpType::OriginalFaces,
            file.decode_sized(LumpType::OriginalFaces, face_size, face_skip),
        );

        let table: Box<[BSPTexDataStringTable]> =
            optional.get(LumpType::TexDataStringTable, file.decode());
        let string_data = optional.get(
            LumpType::TexDataStringData,
            file.lump_bytes(LumpType::TexDataStringData).map(<[u8]>::to_vec),
        );
        data.texture_names = texture_names(&table, &string_data);

        data.nodes = optional.get(LumpType::Nodes, file.decode());
        data.leafs = optional.get(
            LumpType::Leafs,
            file.decode_sized(
                LumpType::Leafs,
                BSPLeaf::record_size(file.lump_version(LumpType::Leafs), version),
                0,
            ),
        );
        data.leaf_brushes = optional.get(
            LumpType::LeafBrushes,
            file.lump_bytes(LumpType::LeafBrushes)
                .map(|b| decode_records(LumpType::LeafBrushes, b)),
        );
        data.area_portals = optional.get(LumpType::AreaPortals, file.decode());
        data.clip_portal_verts = optional.get(LumpType::ClipPortalVerts, file.decode());
        data.occlusion = optional.get(
            LumpType::Occlusion,
            file.lump_bytes(LumpType::Occlusion)
                .and_then(|b| Occlusion::read(b, file.lump_version(LumpType::Occlusion))),
        );
        data.overlays = optional.get(LumpType::Overlays, file.decode());
        data.cubemaps = optional.get(LumpType::Cubemaps, file.decode());
        data.disp_infos = optional.get(LumpType::DispInfo, file.decode());
        data.disp_verts = optional.get(LumpType::DispVerts, file.decode());
        data.disp_tris = optional.get(LumpType::DispTris, file.decode());
        data.entities = optional.get(
            LumpType::Entities,
            file.lump_bytes(LumpType::Entities)
                .map(|b| parse_entities(b, version == 17)),
        );
        data.static_props = optional.get(LumpType::GameLump, read_static_props(file, app));

        match file.lump_bytes(LumpType::PakFile) {
            Ok(bytes) => match VFileSystem::from_zip(bytes) {
                Ok(pak) => data.pak = pak,
                Err(e) => {
                    log::warn!("Couldn't read embedded archive: {e}");
                    optional.0.push(PipelineWarning::Extraction(e.to_string()));
                }
            },
            Err(e) => optional.warn(LumpType::PakFile, e),
        }

        Ok((data, warnings))
    }

    pub fn texture_name(&self, tex_data: &BSPTexData) -> Option<&str> {
        usize::try_from(tex_data.name_string_table_id)
            .ok()
            .and_then(|i| self.texture_names.get(i))
            .map(String::as_str)
    }

    pub fn worldspawn(&self) -> Option<&Entity> {
        self.entities
            .iter()
            .find(|e| e.class_name() == "worldspawn")
    }
}

/// Collects the failures of lumps the decompiler can do without
struct OptionalLumps<'a>(&'a mut Vec<PipelineWarning>);

impl OptionalLumps<'_> {
    fn get<T: Default>(&mut self, lump: LumpType, result: Result<T, FormatError>) -> T {
        result.unwrap_or_else(|e| {
            self.warn(lump, e);
            T::default()
        })
    }

    fn warn(&mut self, lump: LumpType, e: FormatError) {
        log::warn!("Couldn't read {lump:?} lump: {e}");
        self.0.push(PipelineWarning::Lump(lump, e.to_string()));
    }
}

fn required<T: Lump>(result: Result<Box<[T]>, FormatError>) -> Result<Box<[T]>, FormatError> {
    required_lump(T::lump_type(), result)
}

fn required_lump<T>(lump: LumpType, result: Result<T, FormatError>) -> Result<T, FormatError> {
    result.map_err(|reason| FormatError::RequiredLump {
        lump,
        reason: Box::new(reason),
    })
}

fn read_static_props(file: &BspFile, app: AppId) -> Result<StaticPropLump, FormatError> {
    let dir = file.game_lumps(app)?;
    let Some(entry) = dir.find(SPRP_ID) else {
        return Ok(StaticPropLump::default());
    };
    let data = file.lump_bytes(LumpType::GameLump)?;
    let bytes: Cow<[u8]> = dir.bytes(entry, data)?;
    StaticPropLump::read(&bytes, entry.version, app)
}

#[cfg(test)]
mod bsp_tests {
    use bytemuck::Zeroable;

    use super::*;
    use crate::test_bsp::BspBuilder;

    #[test]
    fn directory_roundtrip() {
        let planes = [BSPPlane::new(Vec3::X, 64.0), BSPPlane::new(Vec3::NEG_X, 64.0)];
        let names = b"tools/toolsnodraw\0".repeat(20);
        let image = BspBuilder::new()
            .lump(LumpType::Planes, bytemuck::cast_slice(&planes))
            .compressed(LumpType::TexDataStringData, &names)
            .build();

        let file = BspFile::load("test", image.clone()).unwrap();
        assert_eq!(&file.header().to_bytes()[..], &image[..HEADER_SIZE]);

        for info in file.directory() {
            let bytes = file.lump_bytes(info.lump).unwrap();
            assert_eq!(bytes.len(), info.declared_len, "{:?}", info.lump);
        }
        let strings = file
            .directory()
            .into_iter()
            .find(|info| info.lump == LumpType::TexDataStringData)
            .unwrap();
        assert!(strings.compressed);
        assert!(strings.stored_len < strings.declared_len);
        assert_eq!(file.lump_bytes(LumpType::TexDataStringData).unwrap(), &names[..]);
        assert_eq!(file.decode::<BSPPlane>().unwrap().len(), 2);
    }

    #[test]
    fn corrupt_compressed_lump_is_isolated() {
        let names = b"brick/brickwall001\0".repeat(8);
        let mut image = BspBuilder::new()
            .compressed(LumpType::TexDataStringData, &names)
            .compressed(LumpType::Entities, b"{\"classname\" \"worldspawn\"}\0")
            .build();

        // bump the declared compressed size past the stored bytes
        let lump = BspBuilder::lump_header(&image, LumpType::TexDataStringData);
        let ofs = lump.file_ofs as usize + 8;
        image[ofs..ofs + 4].copy_from_slice(&u32::MAX.to_le_bytes());

        let file = BspFile::load("test", image).unwrap();
        assert!(matches!(
            file.lump_bytes(LumpType::TexDataStringData),
            Err(FormatError::CompressedSizeMismatch { .. })
        ));
        let entities = parse_entities(file.lump_bytes(LumpType::Entities).unwrap(), false);
        assert_eq!(entities[0].class_name(), "worldspawn");
    }

    #[test]
    fn rejects_bad_directory() {
        let mut image = BspBuilder::new().lump(LumpType::Planes, &[0; 20]).build();
        let len = image.len() as i32;
        // planes lump length lives after ident, version and the entity lump slot
        let at = 8 + LumpType::Planes as usize * 16 + 4;
        image[at..at + 4].copy_from_slice(&len.to_le_bytes());
        assert!(matches!(
            BspFile::load("test", image),
            Err(FormatError::LumpOutOfBounds { lump: LumpType::Planes, .. })
        ));
        assert!(matches!(
            BspFile::load("tiny", vec![0; 10]),
            Err(FormatError::FileTooSmall(10))
        ));
    }

    #[test]
    fn optional_lumps_degrade() {
        let image = BspBuilder::cube_map().build();
        let file = BspFile::load("cube", image).unwrap();
        let (data, warnings) = BspData::read(&file, AppId::Unknown).unwrap();
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(data.brushes.len(), 1);
        assert_eq!(data.brush_sides.len(), 6);
        assert_eq!(data.worldspawn().map(Entity::class_name), Some("worldspawn"));
        assert_eq!(data.texture_name(&data.tex_datas[0]), Some("BRICK/BRICKWALL001"));
    }

    #[test]
    fn missing_geometry_is_fatal() {
        let mut builder = BspBuilder::cube_map();
        builder = builder.compressed(LumpType::Planes, &[1, 2, 3]);
        // truncate the compressed planes payload
        let mut image = builder.build();
        let lump = BspBuilder::lump_header(&image, LumpType::Planes);
        let ofs = lump.file_ofs as usize + 4;
        image[ofs..ofs + 4].copy_from_slice(&1000u32.to_le_bytes());
        let file = BspFile::load("cube", image).unwrap();
        assert!(matches!(
            BspData::read(&file, AppId::Unknown),
            Err(FormatError::RequiredLump { lump: LumpType::Planes, .. })
        ));
    }

    #[test]
    fn version_18_faces_skip_light_colors() {
        let mut face = BSPFace::zeroed();
        face.num_edges = 4;
        face.tex_info = 3;
        let mut record = vec![0xEE; FACE_BSP18_PREFIX];
        record.extend_from_slice(bytemuck::bytes_of(&face));
        let image = BspBuilder::new().version(18).lump(LumpType::Faces, &record).build();
        let file = BspFile::load("old", image).unwrap();
        let faces: Box<[BSPFace]> = file.decode_sized(LumpType::Faces, 72, FACE_BSP18_PREFIX).unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].num_edges, 4);
        assert_eq!(faces[0].tex_info, 3);
    }

    #[test]
    fn lump_files_replace_lumps() {
        let dir = tempfile::tempdir().unwrap();
        let bsp_path = dir.path().join("cube.bsp");
        let entities = b"{\n\"classname\" \"info_target\"\n}\n\0".to_vec();
        let replacement = ExternalLump {
            lump: LumpType::Entities,
            offset: lump_file::LUMP_FILE_HEADER_SIZE,
            version: 2,
            map_revision: 1,
            data: entities.clone(),
        };
        std::fs::write(dir.path().join("cube_l_0.lmp"), replacement.to_bytes()).unwrap();
        std::fs::write(dir.path().join("cube_l_1.lmp"), [0u8; 6]).unwrap();
        // not reached, numbering stops at the first gap
        std::fs::write(dir.path().join("cube_l_3.lmp"), [0u8; 6]).unwrap();

        let mut file = BspFile::load("cube", BspBuilder::cube_map().build()).unwrap();
        let warnings = file.load_lump_files(&bsp_path);

        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            &warnings[0],
            PipelineWarning::LumpFile { file, .. } if file == "cube_l_1.lmp"
        ));
        assert!(file.is_replaced(LumpType::Entities));
        assert_eq!(file.lump_version(LumpType::Entities), 2);
        assert_eq!(file.lump_bytes(LumpType::Entities).unwrap(), &entities[..]);

        let (data, _) = BspData::read(&file, AppId::Unknown).unwrap();
        assert_eq!(data.entities.len(), 1);
        assert_eq!(data.entities[0].class_name(), "info_target");
        assert_eq!(data.brushes.len(), 1);
    }

    #[test]
    fn no_lump_files_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = BspFile::load("cube", BspBuilder::cube_map().build()).unwrap();
        assert!(file.load_lump_files(&dir.path().join("cube.bsp")).is_empty());
        assert!(!file.is_replaced(LumpType::Entities));
    }
}
