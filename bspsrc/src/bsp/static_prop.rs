use flagset::FlagSet;
use glam::Vec3;

use crate::{
    app::AppId,
    binaries::{fixed_str, RecordReader},
    error::FormatError,
};

use super::consts::{StaticPropFlags, STATIC_PROP_NAME_LENGTH};

const TARGET_NAME_LENGTH: usize = 128;

/// Every static prop record version normalized into one view. Fields a given
/// version does not store are `None`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StaticProp {
    pub origin: Vec3,
    pub angles: Vec3,
    pub prop_type: u16,
    pub first_leaf: u16,
    pub leaf_count: u16,
    pub solid: u8,
    pub flags: u32,
    pub skin: i32,
    pub fade_min: f32,
    pub fade_max: f32,
    pub lighting_origin: Vec3,
    pub forced_fade_scale: Option<f32>,
    pub dx_level: Option<(u16, u16)>,
    pub cpu_level: Option<(u8, u8)>,
    pub gpu_level: Option<(u8, u8)>,
    pub diffuse_modulation: Option<[u8; 4]>,
    pub disable_x360: Option<bool>,
    pub flags_ex: Option<u32>,
    pub lightmap_resolution: Option<(u16, u16)>,
    pub uniform_scale: Option<f32>,
    pub target_name: Option<String>,
    /// Non-uniform scale stored outside the record by Vindictus
    pub scaling: Option<Vec3>,
}

impl StaticProp {
    pub fn flags(&self) -> FlagSet<StaticPropFlags> {
        FlagSet::new_truncated(self.flags)
    }

    pub fn uses_lighting_origin(&self) -> bool {
        self.flags().contains(StaticPropFlags::UseLightingOrigin)
    }
}

/// Known record layouts. Several games reuse a standard layout under a
/// different version number.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PropLayout {
    V4,
    V5,
    V6,
    V7L4D,
    V7ZC,
    V5Ship,
    V6BGT,
    V6DM,
    V8,
    V9,
    V9DE,
    V10,
    V10CSGO,
    V11Lite,
    V11,
    V11CSGO,
}

impl PropLayout {
    pub const fn size(self) -> usize {
        match self {
            PropLayout::V4 => 56,
            PropLayout::V5 => 60,
            PropLayout::V6 => 64,
            PropLayout::V7L4D | PropLayout::V7ZC | PropLayout::V8 => 68,
            PropLayout::V9 | PropLayout::V10 => 72,
            PropLayout::V9DE | PropLayout::V10CSGO | PropLayout::V11Lite => 76,
            PropLayout::V11 | PropLayout::V11CSGO => 80,
            PropLayout::V6DM => 136,
            PropLayout::V5Ship => 188,
            PropLayout::V6BGT => 192,
        }
    }

    fn read(self, r: &mut RecordReader) -> Result<StaticProp, FormatError> {
        use PropLayout::*;

        if self == V9DE {
            return read_dear_esther(r);
        }

        let mut prop = read_v4(r)?;
        if self == V4 {
            return Ok(prop);
        }
        prop.forced_fade_scale = Some(r.read()?);

        match self {
            V5 => {}
            V5Ship => prop.target_name = Some(fixed_str(r.bytes(TARGET_NAME_LENGTH)?)),
            V8 | V9 | V10CSGO | V11CSGO => {
                read_levels(r, &mut prop)?;
                if self != V8 {
                    prop.disable_x360 = Some(r.read::<u8>()? != 0);
                    r.skip(3)?;
                }
                if matches!(self, V10CSGO | V11CSGO) {
                    prop.flags_ex = Some(r.read()?);
                }
                if self == V11CSGO {
                    prop.uniform_scale = Some(r.read()?);
                }
            }
            _ => {
                prop.dx_level = Some((r.read()?, r.read()?));
                match self {
                    V7L4D => prop.diffuse_modulation = Some(r.read()?),
                    V7ZC => r.skip(4)?,
                    V6DM => r.skip(72)?,
                    V6BGT => prop.target_name = Some(fixed_str(r.bytes(TARGET_NAME_LENGTH)?)),
                    V10 | V11Lite | V11 => {
                        prop.flags = r.read()?;
                        prop.lightmap_resolution = Some((r.read()?, r.read()?));
                        if self == V11Lite {
                            prop.diffuse_modulation = Some(r.read()?);
                        }
                        if self == V11 {
                            r.skip(8)?;
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(prop)
    }
}

fn read_v4(r: &mut RecordReader) -> Result<StaticProp, FormatError> {
    Ok(StaticProp {
        origin: r.read()?,
        angles: r.read()?,
        prop_type: r.read()?,
        first_leaf: r.read()?,
        leaf_count: r.read()?,
        solid: r.read()?,
        flags: r.read::<u8>()? as u32,
        skin: r.read()?,
        fade_min: r.read()?,
        fade_max: r.read()?,
        lighting_origin: r.read()?,
        ..Default::default()
    })
}

fn read_levels(r: &mut RecordReader, prop: &mut StaticProp) -> Result<(), FormatError> {
    prop.cpu_level = Some((r.read()?, r.read()?));
    prop.gpu_level = Some((r.read()?, r.read()?));
    prop.diffuse_modulation = Some(r.read()?);
    Ok(())
}

/// Dear Esther shuffles the v8 fields around and pads between them
fn read_dear_esther(r: &mut RecordReader) -> Result<StaticProp, FormatError> {
    let mut prop = StaticProp {
        origin: r.read()?,
        angles: r.read()?,
        prop_type: r.read()?,
        first_leaf: r.read()?,
        leaf_count: r.read()?,
        solid: r.read()?,
        flags: r.read::<u8>()? as u32,
        ..Default::default()
    };
    r.skip(4)?;
    prop.skin = r.read()?;
    prop.fade_min = r.read()?;
    prop.fade_max = r.read()?;
    // lighting origin is garbage in these files
    r.skip(12)?;
    prop.forced_fade_scale = Some(r.read()?);
    prop.cpu_level = Some((r.read()?, r.read()?));
    prop.gpu_level = Some((r.read()?, r.read()?));
    r.skip(1)?;
    prop.diffuse_modulation = Some(r.read()?);
    r.skip(3)?;
    Ok(prop)
}

/// (sprp version, app that uses it or `None` for everyone, layout)
const LAYOUTS: &[(i32, Option<AppId>, PropLayout)] = &[
    (4, None, PropLayout::V4),
    (5, None, PropLayout::V5),
    (6, None, PropLayout::V6),
    (8, None, PropLayout::V8),
    (9, None, PropLayout::V9),
    (10, None, PropLayout::V10),
    (11, None, PropLayout::V11Lite),
    (11, None, PropLayout::V11),
    (5, Some(AppId::TheShip), PropLayout::V5Ship),
    (6, Some(AppId::BloodyGoodTime), PropLayout::V6BGT),
    (7, Some(AppId::ZenoClash), PropLayout::V7ZC),
    (6, Some(AppId::DarkMessiah), PropLayout::V6DM),
    (9, Some(AppId::DearEsther), PropLayout::V9DE),
    // newer Vindictus maps report one version higher than their layout,
    // the extra scaling array comes before the records
    (6, Some(AppId::Vindictus), PropLayout::V5),
    (7, Some(AppId::Vindictus), PropLayout::V6),
    (7, Some(AppId::Left4Dead), PropLayout::V7L4D),
    // short lived TF2 v7, later renamed to v10
    (7, Some(AppId::TeamFortress2), PropLayout::V10),
    (10, Some(AppId::CounterStrikeGo), PropLayout::V10CSGO),
    (11, Some(AppId::CounterStrikeGo), PropLayout::V11CSGO),
    (10, Some(AppId::Insurgency), PropLayout::V10CSGO),
];

/// Picks the layout for a record size, preferring game specific layouts
pub fn select_layout(version: i32, app: AppId, size: usize) -> Option<PropLayout> {
    let mut candidates = LAYOUTS.iter().filter(|(v, a, layout)| {
        *v == version && a.map_or(true, |a| a == app) && layout.size() == size
    });
    let first = candidates.clone().find(|(_, a, _)| a.is_some());
    first.or_else(|| candidates.next()).map(|(_, _, layout)| *layout)
}

/// Decoded `sprp` game lump
#[derive(Clone, Debug, Default)]
pub struct StaticPropLump {
    pub names: Vec<String>,
    pub leafs: Vec<u16>,
    pub props: Vec<StaticProp>,
    /// Layout used, `None` when the fallback decode ran
    pub layout: Option<PropLayout>,
}

impl StaticPropLump {
    pub fn read(data: &[u8], version: i32, app: AppId) -> Result<Self, FormatError> {
        let mut r = RecordReader::new(data, "static prop lump");

        let count = r.read_count()?;
        let mut names = Vec::with_capacity(count.min(r.remaining() / STATIC_PROP_NAME_LENGTH));
        for _ in 0..count {
            names.push(fixed_str(r.bytes(STATIC_PROP_NAME_LENGTH)?));
        }

        // model path strings in Zeno Clash
        if app == AppId::ZenoClash {
            let extra = r.read_count()?;
            r.skip(extra.saturating_mul(STATIC_PROP_NAME_LENGTH))?;
        }

        let count = r.read_count()?;
        let leafs = r.read_vec::<u16>(count)?;

        let mut scaling = Vec::new();
        if app == AppId::Vindictus && version > 5 {
            let count = r.read_count()?;
            for _ in 0..count {
                let index: i32 = r.read()?;
                let scale: Vec3 = r.read()?;
                scaling.push((index, scale));
            }
        }

        let count = r.read_count()?;
        let mut lump = Self {
            names,
            leafs,
            ..Default::default()
        };
        if count == 0 {
            return Ok(lump);
        }

        let size = r.remaining() / count;
        if size == 0 {
            return Err(FormatError::Truncated {
                what: "static prop lump",
                needed: count,
                available: r.remaining(),
            });
        }
        lump.layout = select_layout(version, app, size);
        match lump.layout {
            Some(layout) => log::info!("Using {layout:?} for sprp version {version}"),
            None => {
                log::warn!(
                    "Couldn't find static prop struct for app {app:?}, version {version}, size {size}"
                );
                log::warn!("Falling back to static prop v4");
            }
        }

        lump.props.reserve(count.min(r.remaining() / size));
        let mut padded = Vec::new();
        for _ in 0..count {
            let record = r.bytes(size)?;
            let prop = match lump.layout {
                Some(layout) => layout.read(&mut RecordReader::new(record, "static prop"))?,
                None => {
                    // read the common v4 prefix, zero padding records shorter than that
                    padded.clear();
                    padded.extend_from_slice(record);
                    padded.resize(size.max(PropLayout::V4.size()), 0);
                    read_v4(&mut RecordReader::new(&padded, "static prop"))?
                }
            };
            lump.props.push(prop);
        }

        for (index, scale) in scaling {
            match lump.props.get_mut(index as usize) {
                Some(prop) => prop.scaling = Some(scale),
                None => log::warn!("Scaling for missing static prop {index}"),
            }
        }

        if r.remaining() > 0 {
            log::warn!("{} bytes remaining after reading static props", r.remaining());
        }
        Ok(lump)
    }

    pub fn model_name(&self, prop: &StaticProp) -> Option<&str> {
        self.names.get(prop.prop_type as usize).map(String::as_str)
    }
}

#[cfg(test)]
mod static_prop_tests {
    use super::*;

    fn push_f32s(out: &mut Vec<u8>, values: &[f32]) {
        for v in values {
            out.extend(v.to_le_bytes());
        }
    }

    /// v4 record prefix for a prop of the given type
    fn v4_record(prop_type: u16, origin: f32) -> Vec<u8> {
        let mut out = Vec::new();
        push_f32s(&mut out, &[origin, 2.0, 3.0, 0.0, 90.0, 0.0]);
        out.extend(prop_type.to_le_bytes());
        out.extend(4u16.to_le_bytes()); // first leaf
        out.extend(1u16.to_le_bytes()); // leaf count
        out.push(6); // solid
        out.push(0x2); // flags
        out.extend(1i32.to_le_bytes()); // skin
        push_f32s(&mut out, &[100.0, 200.0, 0.0, 0.0, 64.0]);
        assert_eq!(out.len(), 56);
        out
    }

    fn lump(records: &[Vec<u8>]) -> Vec<u8> {
        let mut out = 1i32.to_le_bytes().to_vec();
        let mut name = [0u8; STATIC_PROP_NAME_LENGTH];
        name[..14].copy_from_slice(b"models/box.mdl");
        out.extend(name);
        out.extend(2i32.to_le_bytes());
        out.extend(4u16.to_le_bytes());
        out.extend(5u16.to_le_bytes());
        out.extend((records.len() as i32).to_le_bytes());
        for record in records {
            out.extend(record);
        }
        out
    }

    #[test]
    fn picks_layout_by_size() {
        assert_eq!(select_layout(10, AppId::Unknown, 72), Some(PropLayout::V10));
        assert_eq!(select_layout(10, AppId::CounterStrikeGo, 76), Some(PropLayout::V10CSGO));
        assert_eq!(select_layout(11, AppId::Unknown, 76), Some(PropLayout::V11Lite));
        assert_eq!(select_layout(11, AppId::CounterStrikeGo, 80), Some(PropLayout::V11CSGO));
        assert_eq!(select_layout(11, AppId::Unknown, 80), Some(PropLayout::V11));
        assert_eq!(select_layout(7, AppId::TeamFortress2, 72), Some(PropLayout::V10));
        assert_eq!(select_layout(7, AppId::Unknown, 68), None);
    }

    #[test]
    fn reads_v5() {
        let mut records = Vec::new();
        for i in 0..2 {
            let mut record = v4_record(0, i as f32);
            record.extend(0.5f32.to_le_bytes());
            records.push(record);
        }
        let lump = StaticPropLump::read(&lump(&records), 5, AppId::Unknown).unwrap();
        assert_eq!(lump.layout, Some(PropLayout::V5));
        assert_eq!(lump.leafs, vec![4, 5]);
        assert_eq!(lump.props.len(), 2);
        let prop = &lump.props[1];
        assert_eq!(prop.origin, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(prop.angles, Vec3::new(0.0, 90.0, 0.0));
        assert_eq!(prop.forced_fade_scale, Some(0.5));
        assert_eq!(prop.lighting_origin, Vec3::new(0.0, 0.0, 64.0));
        assert!(prop.uses_lighting_origin());
        assert_eq!(lump.model_name(prop), Some("models/box.mdl"));
    }

    #[test]
    fn unknown_size_falls_back_without_desync() {
        // 70 byte records match nothing for version 10
        let records: Vec<_> = (0..3)
            .map(|i| {
                let mut record = v4_record(0, i as f32 * 10.0);
                record.extend([0xAB; 14]);
                record
            })
            .collect();
        let lump = StaticPropLump::read(&lump(&records), 10, AppId::Unknown).unwrap();
        assert_eq!(lump.layout, None);
        assert_eq!(lump.props.len(), 3);
        for (i, prop) in lump.props.iter().enumerate() {
            assert_eq!(prop.origin.x, i as f32 * 10.0);
            assert_eq!(prop.skin, 1);
            assert_eq!(prop.fade_max, 200.0);
        }
    }

    #[test]
    fn prop_count_past_the_end_is_an_error() {
        let mut data = Vec::new();
        data.extend(0i32.to_le_bytes()); // names
        data.extend(0i32.to_le_bytes()); // leafs
        data.extend(i32::MAX.to_le_bytes());
        data.extend([0u8; 8]);
        let err = StaticPropLump::read(&data, 10, AppId::Unknown).unwrap_err();
        assert!(matches!(
            err,
            FormatError::Truncated {
                needed: 0x7FFF_FFFF,
                available: 8,
                ..
            }
        ));
    }

    #[test]
    fn short_records_are_padded() {
        let records: Vec<_> = (0..2).map(|_| v4_record(0, 7.0)[..40].to_vec()).collect();
        let lump = StaticPropLump::read(&lump(&records), 4, AppId::Unknown).unwrap();
        assert_eq!(lump.props.len(), 2);
        assert_eq!(lump.props[1].origin.x, 7.0);
        assert_eq!(lump.props[1].lighting_origin, Vec3::ZERO);
    }

    #[test]
    fn v10_flags_are_wide() {
        let mut record = v4_record(0, 0.0);
        record.extend(1.0f32.to_le_bytes());
        record.extend(70u16.to_le_bytes());
        record.extend(95u16.to_le_bytes());
        record.extend(0x104u32.to_le_bytes());
        record.extend(32u16.to_le_bytes());
        record.extend(16u16.to_le_bytes());
        let lump = StaticPropLump::read(&lump(&[record]), 10, AppId::Unknown).unwrap();
        let prop = &lump.props[0];
        assert_eq!(prop.dx_level, Some((70, 95)));
        assert_eq!(prop.flags, 0x104);
        assert_eq!(prop.lightmap_resolution, Some((32, 16)));
    }
}
