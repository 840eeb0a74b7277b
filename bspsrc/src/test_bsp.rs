//! In-memory map images for tests

use std::collections::BTreeMap;

use bytemuck::Zeroable;
use glam::Vec3;

use crate::{
    app::AppId,
    bsp::{
        brush::{BSPBrush, BSPBrushSide},
        consts::{Contents, LumpType, HEADER_SIZE},
        edges::{BSPEdge, BSPSurfEdge},
        face::BSPFace,
        header::BSPHeader,
        lump::BSPLump,
        lzma,
        model::BSPModel,
        plane::BSPPlane,
        textures::{BSPTexData, BSPTexDataStringTable, BSPTexInfo},
        tree::{BSPLeaf, BSPNode},
        BspData, BspFile,
    },
};

pub const CUBE_TEXTURE: &str = "BRICK/BRICKWALL001";

/// Outward normals of a box, in brush side order
pub const BOX_NORMALS: [Vec3; 6] = [
    Vec3::X,
    Vec3::NEG_X,
    Vec3::Y,
    Vec3::NEG_Y,
    Vec3::Z,
    Vec3::NEG_Z,
];

#[derive(Clone, Debug)]
pub struct TestBox {
    pub mins: Vec3,
    pub maxs: Vec3,
    pub contents: i32,
    pub texture: &'static str,
    /// Brush model the box belongs to, 0 is the world
    pub model: usize,
}

impl TestBox {
    pub fn cube(half: f32, texture: &'static str) -> Self {
        Self {
            mins: Vec3::splat(-half),
            maxs: Vec3::splat(half),
            contents: Contents::SOLID as i32,
            texture,
            model: 0,
        }
    }

    pub fn new(mins: Vec3, maxs: Vec3, texture: &'static str) -> Self {
        Self {
            mins,
            maxs,
            contents: Contents::SOLID as i32,
            texture,
            model: 0,
        }
    }

    pub fn contents(mut self, contents: i32) -> Self {
        self.contents = contents;
        self
    }

    pub fn model(mut self, model: usize) -> Self {
        self.model = model;
        self
    }

    fn dist(&self, normal: Vec3) -> f32 {
        // the outward corner along this normal
        let corner = Vec3::select(normal.cmpgt(Vec3::ZERO), self.maxs, self.mins);
        normal.dot(corner)
    }

    /// Corners of one side, clockwise seen from outside
    fn quad(&self, normal: Vec3) -> [Vec3; 4] {
        let up = if normal.z.abs() > 0.5 { Vec3::Y } else { Vec3::Z };
        let right = (-normal).cross(up);
        let center = (self.mins + self.maxs) * 0.5;
        let half = (self.maxs - self.mins) * 0.5;
        let c = center + normal * (half * normal).abs().max_element();
        let u = up * (half * up).abs().max_element();
        let r = right * (half * right).abs().max_element();
        [c + u - r, c + u + r, c + r - u, c - u - r]
    }
}

fn axis_class(normal: Vec3) -> usize {
    let abs = normal.abs();
    if abs.x >= abs.y && abs.x >= abs.z {
        0
    } else if abs.y >= abs.z {
        1
    } else {
        2
    }
}

fn tex_info(axis: usize, tex_data: usize) -> BSPTexInfo {
    let (s, t) = match axis {
        0 => (Vec3::Y, Vec3::NEG_Z),
        1 => (Vec3::X, Vec3::NEG_Z),
        _ => (Vec3::X, Vec3::NEG_Y),
    };
    let vec = |v: Vec3, len: f32| {
        let v = v * len;
        [v.x, v.y, v.z, 0.0]
    };
    BSPTexInfo {
        texture_vecs: [vec(s, 4.0), vec(t, 4.0)],
        lightmap_vecs: [vec(s, 1.0 / 16.0), vec(t, 1.0 / 16.0)],
        flags: 0,
        tex_data: tex_data as i32,
    }
}

#[derive(Clone, Debug)]
struct TestLump {
    data: Vec<u8>,
    version: i32,
    compressed: bool,
}

/// Assembles a map image lump by lump
#[derive(Clone, Debug)]
pub struct BspBuilder {
    version: i32,
    map_revision: i32,
    lumps: BTreeMap<usize, TestLump>,
}

impl Default for BspBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BspBuilder {
    pub fn new() -> Self {
        Self {
            version: 20,
            map_revision: 1,
            lumps: BTreeMap::new(),
        }
    }

    pub fn version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    pub fn lump(mut self, lump: LumpType, data: &[u8]) -> Self {
        self.lumps.insert(
            lump as usize,
            TestLump {
                data: data.to_vec(),
                version: 0,
                compressed: false,
            },
        );
        self
    }

    pub fn records<T: bytemuck::Pod>(self, lump: LumpType, records: &[T]) -> Self {
        self.lump(lump, bytemuck::cast_slice(records))
    }

    pub fn compressed(mut self, lump: LumpType, data: &[u8]) -> Self {
        self = self.lump(lump, data);
        if let Some(l) = self.lumps.get_mut(&(lump as usize)) {
            l.compressed = true;
        }
        self
    }

    pub fn lump_version(mut self, lump: LumpType, version: i32) -> Self {
        self.lumps
            .entry(lump as usize)
            .or_insert_with(|| TestLump {
                data: Vec::new(),
                version: 0,
                compressed: false,
            })
            .version = version;
        self
    }

    pub fn entities(self, entities: &str) -> Self {
        let mut data = entities.as_bytes().to_vec();
        data.push(0);
        self.lump(LumpType::Entities, &data)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut header = BSPHeader {
            version: self.version,
            map_revision: self.map_revision,
            ..Default::default()
        };
        let mut body = Vec::new();
        for (&index, lump) in &self.lumps {
            while (HEADER_SIZE + body.len()) % 4 != 0 {
                body.push(0);
            }
            let (stored, four_cc) = if lump.compressed {
                (lzma::compress(&lump.data), (lump.data.len() as u32).to_le_bytes())
            } else {
                (lump.data.clone(), [0; 4])
            };
            header.lumps[index] = BSPLump {
                file_ofs: if stored.is_empty() { 0 } else { (HEADER_SIZE + body.len()) as i32 },
                file_len: stored.len() as i32,
                version: lump.version,
                four_cc,
            };
            body.extend_from_slice(&stored);
        }
        let mut image = header.to_bytes();
        image.extend_from_slice(&body);
        image
    }

    /// Builds and decodes the image, panicking on any problem
    pub fn data(&self) -> BspData {
        let file = BspFile::load("test", self.build()).unwrap();
        let (data, warnings) = BspData::read(&file, AppId::Unknown).unwrap();
        assert!(warnings.is_empty(), "{warnings:?}");
        data
    }

    pub fn lump_header(image: &[u8], lump: LumpType) -> BSPLump {
        let at = 8 + lump as usize * 16;
        bytemuck::pod_read_unaligned(&image[at..at + 16])
    }

    /// Single 128 unit cube in the world
    pub fn cube_map() -> Self {
        Self::boxes(&[TestBox::cube(64.0, CUBE_TEXTURE)])
            .entities("{\n\"classname\" \"worldspawn\"\n\"mapversion\" \"1\"\n}\n")
    }

    /// Axis aligned boxes, each with its own faces, planes and brush. Every
    /// model gets a one node tree holding its brushes.
    pub fn boxes(boxes: &[TestBox]) -> Self {
        let mut boxes = boxes.to_vec();
        boxes.sort_by_key(|b| b.model);
        let model_count = boxes.iter().map(|b| b.model + 1).max().unwrap_or(1);

        let mut textures: Vec<&str> = Vec::new();
        for b in &boxes {
            if !textures.contains(&b.texture) {
                textures.push(b.texture);
            }
        }
        let mut string_data = Vec::new();
        let mut string_table = Vec::new();
        let mut tex_datas = Vec::new();
        let mut tex_infos = Vec::new();
        for (i, name) in textures.iter().enumerate() {
            string_table.push(BSPTexDataStringTable {
                index: string_data.len() as i32,
            });
            string_data.extend_from_slice(name.as_bytes());
            string_data.push(0);
            tex_datas.push(BSPTexData {
                reflectivity: Vec3::splat(0.5),
                name_string_table_id: i as i32,
                width: 512,
                height: 512,
                view_width: 512,
                view_height: 512,
            });
            for axis in 0..3 {
                tex_infos.push(tex_info(axis, i));
            }
        }

        let mut planes = Vec::new();
        let mut vertexes = Vec::new();
        let mut edges = vec![BSPEdge { v: [0, 0] }];
        let mut surfedges = Vec::new();
        let mut faces = Vec::new();
        let mut brushes = Vec::new();
        let mut sides = Vec::new();

        for b in &boxes {
            let texture = textures.iter().position(|t| *t == b.texture).unwrap_or(0);
            brushes.push(BSPBrush {
                first_side: sides.len() as i32,
                num_sides: 6,
                contents: b.contents,
            });
            for normal in BOX_NORMALS {
                let plane_num = planes.len();
                let plane = BSPPlane::new(normal, b.dist(normal));
                planes.push(plane);
                planes.push(plane.flip());
                let tex = (texture * 3 + axis_class(normal)) as i16;
                sides.push(BSPBrushSide {
                    plane_num: plane_num as u16,
                    tex_info: tex,
                    disp_info: 0,
                    bevel: 0,
                    thin: 0,
                });

                let first_edge = surfedges.len() as i32;
                let first_vert = vertexes.len() as u16;
                let quad = b.quad(normal);
                vertexes.extend_from_slice(&quad);
                for i in 0..4u16 {
                    surfedges.push(BSPSurfEdge {
                        index: edges.len() as i32,
                    });
                    edges.push(BSPEdge {
                        v: [first_vert + i, first_vert + (i + 1) % 4],
                    });
                }
                let mut face = BSPFace::zeroed();
                face.plane_num = plane_num as u16;
                face.first_edge = first_edge;
                face.num_edges = 4;
                face.tex_info = tex;
                face.disp_info = -1;
                face.orig_face = faces.len() as i32;
                face.area = (quad[1] - quad[0]).length() * (quad[2] - quad[1]).length();
                faces.push(face);
            }
        }

        let mut models = Vec::new();
        let mut nodes = Vec::new();
        let mut leafs = Vec::new();
        let mut leaf_brushes: Vec<u16> = Vec::new();
        for m in 0..model_count {
            let first = boxes.iter().position(|b| b.model == m).unwrap_or(0);
            let count = boxes.iter().filter(|b| b.model == m).count();
            let (mins, maxs) = boxes
                .iter()
                .filter(|b| b.model == m)
                .fold((Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)), |(lo, hi), b| {
                    (lo.min(b.mins), hi.max(b.maxs))
                });

            let empty_leaf = leafs.len() as i32;
            leafs.push(BSPLeaf::zeroed());
            let mut solid = BSPLeaf::zeroed();
            solid.contents = Contents::SOLID as i32;
            solid.first_leaf_brush = leaf_brushes.len() as u16;
            solid.num_leaf_brushes = count as u16;
            leaf_brushes.extend((first..first + count).map(|i| i as u16));
            leafs.push(solid);

            let mut node = BSPNode::zeroed();
            node.plane_num = 0;
            node.children = [-(empty_leaf + 1), -(empty_leaf + 2)];
            let headnode = nodes.len() as i32;
            nodes.push(node);

            models.push(BSPModel {
                mins: if count > 0 { mins } else { Vec3::ZERO },
                maxs: if count > 0 { maxs } else { Vec3::ZERO },
                origin: Vec3::ZERO,
                headnode,
                firstface: (first * 6) as i32,
                numfaces: (count * 6) as i32,
            });
        }

        Self::new()
            .records(LumpType::Planes, &planes)
            .records(LumpType::Vertexes, &vertexes)
            .records(LumpType::Edges, &edges)
            .records(LumpType::SurfEdges, &surfedges)
            .records(LumpType::Faces, &faces)
            .records(LumpType::OriginalFaces, &faces)
            .records(LumpType::Brushes, &brushes)
            .records(LumpType::BrushSides, &sides)
            .records(LumpType::TexInfo, &tex_infos)
            .records(LumpType::TexData, &tex_datas)
            .records(LumpType::TexDataStringTable, &string_table)
            .lump(LumpType::TexDataStringData, &string_data)
            .records(LumpType::Models, &models)
            .records(LumpType::Nodes, &nodes)
            .records(LumpType::Leafs, &leafs)
            .lump_version(LumpType::Leafs, 1)
            .records(LumpType::LeafBrushes, &leaf_brushes)
            .entities("{\n\"classname\" \"worldspawn\"\n}\n")
    }
}
