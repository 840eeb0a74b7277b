//! Detection of the tricks map obfuscators use against decompilers. Every
//! check is a best effort pattern match tuned on real protected maps.

use glam::Vec3;

use crate::{
    bsp::{brush::BSPBrush, BspData},
    geom,
    texture::{tool, TextureSource},
};

/// File BSPProtect puts the encrypted entity lump in
pub const BSPPROTECT_FILE: &str = "entities.dat";
pub const VMEX_LOCKED_TEX: &str = "tools/locked";
pub const VMEX_LOCKED_ENT: &str = "no_decomp";

const EPS_SIZE: f32 = 0.01;
const ALIGNED_ALPHA: f32 = 0.99;
const NODRAW_RATIO_LIMIT: f64 = 0.9;

/// Sizes of the three VMEX protector brushes
const PROTECTOR_SIZES: [Vec3; 3] = [
    Vec3::new(1.0, 4.0, 9.0),
    Vec3::new(4.0, 9.0, 1.0),
    Vec3::new(9.0, 1.0, 4.0),
];

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProtectionReport {
    pub entity_flag: bool,
    pub texture_flag: bool,
    pub brush_flag: bool,
    pub encrypted_entities: bool,
    pub obfuscated_entities: bool,
    pub modified_texinfo: bool,
    /// Indices of the brushes forming protector prefabs
    pub protector_brushes: Vec<usize>,
    /// Indices of the entities carrying the lock key
    pub flagged_entities: Vec<usize>,
}

impl ProtectionReport {
    pub fn is_protected(&self) -> bool {
        self.entity_flag
            || self.texture_flag
            || self.brush_flag
            || self.encrypted_entities
            || self.obfuscated_entities
            || self.modified_texinfo
    }

    pub fn methods(&self) -> Vec<String> {
        [
            (self.entity_flag, "VMEX entity flag (no_decomp)"),
            (self.texture_flag, "VMEX texture flag (tools/locked)"),
            (self.brush_flag, "VMEX protector brush flag"),
            (self.encrypted_entities, "BSPProtect entity encryption"),
            (self.obfuscated_entities, "IID entity obfuscation"),
            (self.modified_texinfo, "IID nodraw texture hack"),
        ]
        .into_iter()
        .filter(|(found, _)| *found)
        .map(|(_, name)| name.to_owned())
        .collect()
    }

    pub fn is_protector_brush(&self, brush: usize) -> bool {
        self.protector_brushes.contains(&brush)
    }

    pub fn is_flagged_entity(&self, entity: usize) -> bool {
        self.flagged_entities.contains(&entity)
    }
}

pub struct BspProtection<'a> {
    bsp: &'a BspData,
    textures: &'a TextureSource,
}

impl<'a> BspProtection<'a> {
    pub fn new(bsp: &'a BspData, textures: &'a TextureSource) -> Self {
        Self { bsp, textures }
    }

    pub fn check(&self) -> ProtectionReport {
        let mut report = ProtectionReport::default();
        self.check_brushes(&mut report);
        self.check_brush_sides(&mut report);
        self.check_entities(&mut report);
        self.check_textures(&mut report);
        self.check_pakfile(&mut report);

        if report.is_protected() {
            log::debug!("Protection found: {:?}", report.methods());
        } else {
            log::debug!("No protection found");
        }
        report
    }

    /// VMEX hides three small brushes of fixed sizes in the map
    fn check_brushes(&self, report: &mut ProtectionReport) {
        let mut found: [Option<usize>; 3] = [None; 3];
        for (i, brush) in self.bsp.brushes.iter().enumerate() {
            if !self.is_aligned_brush(brush) || !self.is_same_texture_brush(brush) {
                continue;
            }
            let size = geom::brush_bounds(self.bsp, brush).size();
            for (slot, target) in found.iter_mut().zip(PROTECTOR_SIZES) {
                if target.distance(size) < EPS_SIZE {
                    *slot = Some(i);
                }
            }
            if let [Some(a), Some(b), Some(c)] = found {
                log::debug!("Found protector prefab, brushes {a}, {b}, {c}");
                report.brush_flag = true;
                report.protector_brushes.extend([a, b, c]);
                found = [None; 3];
            }
        }
    }

    /// Nearly every side on texinfo 0 means the texinfos were rewritten
    fn check_brush_sides(&self, report: &mut ProtectionReport) {
        let sides = &self.bsp.brush_sides;
        if sides.is_empty() {
            return;
        }
        let nodraw = sides.iter().filter(|s| s.tex_info == 0).count();
        let ratio = nodraw as f64 / sides.len() as f64;
        report.modified_texinfo = ratio > NODRAW_RATIO_LIMIT;
    }

    fn check_entities(&self, report: &mut ProtectionReport) {
        let mut target_names = 0;
        let mut numeric = 0;
        for (i, entity) in self.bsp.entities.iter().enumerate() {
            if let Some(name) = entity.target_name() {
                target_names += 1;
                if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
                    numeric += 1;
                }
            }
            if entity.has(VMEX_LOCKED_ENT) {
                log::debug!("Found lock key on entity {i}");
                report.entity_flag = true;
                report.flagged_entities.push(i);
            }
        }
        report.obfuscated_entities = target_names > 0 && target_names == numeric;
    }

    fn check_textures(&self, report: &mut ProtectionReport) {
        report.texture_flag = self
            .bsp
            .texture_names
            .iter()
            .any(|name| name.eq_ignore_ascii_case(VMEX_LOCKED_TEX));
    }

    /// BSPProtect only ever supported Orange Box maps
    fn check_pakfile(&self, report: &mut ProtectionReport) {
        report.encrypted_entities =
            self.bsp.version == 20 && self.bsp.pak.contains_file_name(BSPPROTECT_FILE);
    }

    fn is_aligned_brush(&self, brush: &BSPBrush) -> bool {
        if brush.num_sides != 6 {
            return false;
        }
        brush.sides(self.bsp.brush_sides.len()).all(|side| {
            self.bsp
                .brush_sides
                .get(side)
                .and_then(|s| self.bsp.planes.get(s.plane_num as usize))
                .is_some_and(|p| p.normal.abs().max_element() > ALIGNED_ALPHA)
        })
    }

    fn is_same_texture_brush(&self, brush: &BSPBrush) -> bool {
        let mut names = brush.sides(self.bsp.brush_sides.len()).map(|side| {
            let tex_info = self.bsp.brush_sides.get(side).map_or(-1, |s| s.tex_info);
            usize::try_from(tex_info)
                .map(|ti| self.textures.texture_name(self.bsp, ti))
                .unwrap_or_else(|_| tool::SKIP.to_owned())
        });
        let Some(first) = names.next() else {
            return false;
        };
        // no valid texture
        if first == tool::SKIP {
            return false;
        }
        names.all(|name| name.eq_ignore_ascii_case(&first))
    }
}

#[cfg(test)]
mod protection_tests {
    use super::*;
    use crate::{
        bsp::entity::Entity,
        test_bsp::{BspBuilder, TestBox, CUBE_TEXTURE},
    };

    fn sized(at: Vec3, size: Vec3) -> TestBox {
        TestBox::new(at, at + size, "METAL/METALWALL")
    }

    fn check(bsp: &BspData) -> ProtectionReport {
        let textures = TextureSource::new(bsp, true);
        BspProtection::new(bsp, &textures).check()
    }

    #[test]
    fn clean_map() {
        let bsp = BspBuilder::cube_map().data();
        let report = check(&bsp);
        assert!(!report.is_protected());
        assert!(report.methods().is_empty());
    }

    #[test]
    fn protector_prefab_in_any_order() {
        let bsp = BspBuilder::boxes(&[
            TestBox::cube(64.0, CUBE_TEXTURE),
            sized(Vec3::new(300.0, 0.0, 0.0), Vec3::new(9.0, 1.0, 4.0)),
            sized(Vec3::new(-300.0, 20.0, 8.0), Vec3::new(1.0, 4.0, 9.0)),
            sized(Vec3::new(0.0, 500.0, -64.0), Vec3::new(4.0, 9.0, 1.0)),
        ])
        .data();
        let report = check(&bsp);
        assert!(report.brush_flag);
        assert!(report.is_protected());
        let mut brushes = report.protector_brushes.clone();
        brushes.sort();
        assert_eq!(brushes, vec![1, 2, 3]);
        assert!(!report.is_protector_brush(0));
        assert_eq!(report.methods(), vec!["VMEX protector brush flag"]);
    }

    #[test]
    fn two_of_three_is_not_enough() {
        let bsp = BspBuilder::boxes(&[
            sized(Vec3::ZERO, Vec3::new(1.0, 4.0, 9.0)),
            sized(Vec3::new(50.0, 0.0, 0.0), Vec3::new(4.0, 9.0, 1.0)),
            sized(Vec3::new(100.0, 0.0, 0.0), Vec3::new(9.0, 1.0, 5.0)),
        ])
        .data();
        assert!(!check(&bsp).brush_flag);
    }

    #[test]
    fn entity_checks() {
        let mut bsp = BspBuilder::cube_map().data();
        let mut door = Entity::new("func_door");
        door.set("targetname", "1234");
        let mut relay = Entity::new("logic_relay");
        relay.set("targetname", "0042");
        relay.set(VMEX_LOCKED_ENT, "1");
        bsp.entities.extend([door, relay]);

        let report = check(&bsp);
        assert!(report.obfuscated_entities);
        assert!(report.entity_flag);
        assert_eq!(report.flagged_entities, vec![2]);

        bsp.entities[1].set("targetname", "door_1");
        assert!(!check(&bsp).obfuscated_entities);
    }

    #[test]
    fn texture_checks() {
        let mut bsp = BspBuilder::cube_map().data();
        bsp.texture_names.push("TOOLS/LOCKED".to_owned());
        for side in bsp.brush_sides.iter_mut() {
            side.tex_info = 0;
        }
        let report = check(&bsp);
        assert!(report.texture_flag);
        assert!(report.modified_texinfo);
        assert_eq!(
            report.methods(),
            vec!["VMEX texture flag (tools/locked)", "IID nodraw texture hack"]
        );
    }
}
