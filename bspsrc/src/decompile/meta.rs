use std::io::Write;

use ahash::{AHashMap, AHashSet};
use glam::Vec3;

use crate::{
    bsp::entity::Entity,
    geom::vector,
    vmf::{VecStyle, VmfWriter},
};

/// Separates nested visgroup names, `Rebuild/areaportals`
pub const VISGROUP_SEPARATOR: char = '/';

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub look: Vec3,
}

impl Camera {
    /// Camera a little behind and above a spawn point, looking the way it faces
    pub fn behind(origin: Vec3, angles: Vec3) -> Self {
        let above = origin + Vec3::Z * 64.0;
        let look = vector::rotate(Vec3::new(192.0, 0.0, 0.0), angles) + origin;
        let position = above - (look - above).normalize_or_zero() * 64.0;
        Self { position, look }
    }
}

#[derive(Clone, Debug)]
struct Visgroup {
    name: String,
    parent: Option<usize>,
}

/// Bookkeeping shared by every part of one written map: unique ids,
/// visgroups, cameras and the ids given to written faces
#[derive(Debug)]
pub struct VmfMeta {
    next_uid: i32,
    uid_blacklist: AHashSet<i32>,
    visgroups: Vec<Visgroup>,
    cameras: Vec<Camera>,
    face_ids: AHashMap<usize, i32>,
    orig_face_ids: AHashMap<usize, i32>,
    disp_info_ids: AHashMap<usize, i32>,
    comment: Option<String>,
}

impl Default for VmfMeta {
    fn default() -> Self {
        Self::new()
    }
}

impl VmfMeta {
    pub fn new() -> Self {
        Self {
            next_uid: 1,
            uid_blacklist: AHashSet::new(),
            visgroups: Vec::new(),
            cameras: Vec::new(),
            face_ids: AHashMap::new(),
            orig_face_ids: AHashMap::new(),
            disp_info_ids: AHashMap::new(),
            comment: None,
        }
    }

    /// Next unused id, skipping ids reserved by entities
    pub fn uid(&mut self) -> i32 {
        while self.uid_blacklist.contains(&self.next_uid) {
            self.next_uid += 1;
        }
        let uid = self.next_uid;
        self.next_uid += 1;
        uid
    }

    /// Keeps an id from being handed out by [`VmfMeta::uid`]
    pub fn reserve_uid(&mut self, uid: i32) {
        self.uid_blacklist.insert(uid);
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = Some(comment.into());
    }

    pub fn add_camera(&mut self, camera: Camera) {
        self.cameras.push(camera);
    }

    pub fn cameras(&self) -> &[Camera] {
        &self.cameras
    }

    pub fn set_face_id(&mut self, face: usize, id: i32) {
        self.face_ids.insert(face, id);
    }

    pub fn face_id(&self, face: usize) -> Option<i32> {
        self.face_ids.get(&face).copied()
    }

    pub fn set_orig_face_id(&mut self, face: usize, id: i32) {
        self.orig_face_ids.insert(face, id);
    }

    pub fn orig_face_id(&self, face: usize) -> Option<i32> {
        self.orig_face_ids.get(&face).copied()
    }

    pub fn set_disp_info_id(&mut self, disp_info: usize, id: i32) {
        self.disp_info_ids.insert(disp_info, id);
    }

    pub fn disp_info_id(&self, disp_info: usize) -> Option<i32> {
        self.disp_info_ids.get(&disp_info).copied()
    }

    /// Id of a visgroup, registering it and its parents on first use
    pub fn visgroup_id(&mut self, path: &str) -> i32 {
        let mut parent = None;
        for name in path.split(VISGROUP_SEPARATOR).filter(|n| !n.is_empty()) {
            let existing = self
                .visgroups
                .iter()
                .position(|v| v.parent == parent && v.name == name);
            let index = match existing {
                Some(index) => index,
                None => {
                    self.visgroups.push(Visgroup {
                        name: name.to_owned(),
                        parent,
                    });
                    self.visgroups.len() - 1
                }
            };
            parent = Some(index);
        }
        parent.map_or(0, |i| i as i32 + 1)
    }

    pub fn write_world_header<W: Write>(&mut self, w: &mut VmfWriter<W>, worldspawn: Option<&Entity>) {
        let id = self.uid();
        w.start("world");
        w.put("id", id);
        if let Some(worldspawn) = worldspawn {
            if let Some(comment) = worldspawn.get("comment") {
                log::info!("Map comment: {comment}");
            }
            for (key, value) in worldspawn.key_values() {
                // replaced below
                if self.comment.is_some() && key == "comment" {
                    continue;
                }
                w.put(key, value);
            }
        }
        if let Some(comment) = &self.comment {
            w.put("comment", comment);
        }
        w.put("classname", "worldspawn");
    }

    pub fn write_world_footer<W: Write>(&mut self, w: &mut VmfWriter<W>) {
        w.end("world");
    }

    /// Editor block putting the current object into the given visgroups
    pub fn write_meta_visgroups<W: Write, S: AsRef<str>>(&mut self, w: &mut VmfWriter<W>, paths: &[S]) {
        w.start("editor");
        for path in paths {
            let id = self.visgroup_id(path.as_ref());
            w.put("visgroupid", id);
        }
        w.end("editor");
    }

    pub fn write_visgroups<W: Write>(&self, w: &mut VmfWriter<W>) {
        if self.visgroups.is_empty() {
            return;
        }
        w.start("visgroups");
        self.write_visgroup_children(w, None);
        w.end("visgroups");
    }

    fn write_visgroup_children<W: Write>(&self, w: &mut VmfWriter<W>, parent: Option<usize>) {
        for (i, visgroup) in self.visgroups.iter().enumerate() {
            if visgroup.parent != parent {
                continue;
            }
            w.start("visgroup");
            w.put("name", &visgroup.name);
            w.put("visgroupid", i + 1);
            self.write_visgroup_children(w, Some(i));
            w.end("visgroup");
        }
    }

    pub fn write_cameras<W: Write>(&self, w: &mut VmfWriter<W>) {
        w.start("cameras");
        if self.cameras.is_empty() {
            w.put("activecamera", -1);
        } else {
            w.put("activecamera", 0);
            for camera in &self.cameras {
                w.start("camera");
                w.put_vec_styled("position", camera.position, VecStyle::Bracket);
                w.put_vec_styled("look", camera.look, VecStyle::Bracket);
                w.end("camera");
            }
        }
        w.end("cameras");
    }
}
