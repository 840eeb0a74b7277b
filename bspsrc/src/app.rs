use std::collections::HashSet;

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use regex::Regex;

/// Steam application ids of the Source games with format quirks
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, FromPrimitive)]
pub enum AppId {
    #[default]
    Unknown = 0,
    HalfLife2 = 220,
    CounterStrikeSource = 240,
    HalfLifeSource = 280,
    DayOfDefeatSource = 300,
    HalfLife2Deathmatch = 320,
    HalfLife2Ep1 = 380,
    Portal = 400,
    HalfLife2Ep2 = 420,
    TeamFortress2 = 440,
    Left4Dead = 500,
    Left4Dead2 = 550,
    Portal2 = 620,
    AlienSwarm = 630,
    CounterStrikeGo = 730,
    DarkMessiah = 2100,
    TheShip = 2400,
    BloodyGoodTime = 2450,
    GarrysMod = 4000,
    ZenoClash = 22200,
    DearEsther = 203810,
    Vindictus = 212160,
    Insurgency = 222880,
    NoMoreRoomInHell = 224260,
    BlackMesa = 362890,
}

impl AppId {
    pub fn from_steam_id(id: u32) -> Self {
        Self::from_u32(id).unwrap_or_else(|| {
            log::warn!("Unknown app id {id}, using default settings");
            AppId::Unknown
        })
    }

    pub fn steam_id(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            AppId::Unknown => "Unknown",
            AppId::HalfLife2 => "Half-Life 2",
            AppId::CounterStrikeSource => "Counter-Strike: Source",
            AppId::HalfLifeSource => "Half-Life: Source",
            AppId::DayOfDefeatSource => "Day of Defeat: Source",
            AppId::HalfLife2Deathmatch => "Half-Life 2: Deathmatch",
            AppId::HalfLife2Ep1 => "Half-Life 2: Episode One",
            AppId::Portal => "Portal",
            AppId::HalfLife2Ep2 => "Half-Life 2: Episode Two",
            AppId::TeamFortress2 => "Team Fortress 2",
            AppId::Left4Dead => "Left 4 Dead",
            AppId::Left4Dead2 => "Left 4 Dead 2",
            AppId::Portal2 => "Portal 2",
            AppId::AlienSwarm => "Alien Swarm",
            AppId::CounterStrikeGo => "Counter-Strike: Global Offensive",
            AppId::DarkMessiah => "Dark Messiah of Might & Magic",
            AppId::TheShip => "The Ship",
            AppId::BloodyGoodTime => "Bloody Good Time",
            AppId::GarrysMod => "Garry's Mod",
            AppId::ZenoClash => "Zeno Clash",
            AppId::DearEsther => "Dear Esther",
            AppId::Vindictus => "Vindictus / Mabinogi: Heroes",
            AppId::Insurgency => "Insurgency",
            AppId::NoMoreRoomInHell => "No More Room in Hell",
            AppId::BlackMesa => "Black Mesa",
        }
    }
}

const POINTS_ENTITIES: f32 = 20.0;
const POINTS_FILE_PATTERN: f32 = 3.0;

/// Detection hints for one game
#[derive(Debug)]
pub struct SourceApp {
    pub id: AppId,
    pub version_min: Option<i32>,
    pub version_max: Option<i32>,
    pub file_pattern: Option<Regex>,
    pub entities: HashSet<&'static str>,
}

impl SourceApp {
    fn new(
        id: AppId,
        versions: (Option<i32>, Option<i32>),
        file_pattern: Option<&str>,
        entities: &[&'static str],
    ) -> Self {
        Self {
            id,
            version_min: versions.0,
            version_max: versions.1,
            // patterns are constants, a bad one only disables that hint
            file_pattern: file_pattern.and_then(|p| Regex::new(p).ok()),
            entities: entities.iter().copied().collect(),
        }
    }

    pub fn check_name(&self, name: &str) -> Option<bool> {
        let pattern = self.file_pattern.as_ref()?;
        Some(pattern.is_match(&name.to_lowercase()))
    }

    pub fn check_version(&self, version: i32) -> Option<bool> {
        if self.version_min.is_none() && self.version_max.is_none() {
            return None;
        }
        Some(
            self.version_min.map_or(true, |min| version >= min)
                && self.version_max.map_or(true, |max| version <= max),
        )
    }

    /// Fraction of this app's characteristic classes present in the map
    pub fn check_entities(&self, class_names: &HashSet<String>) -> Option<f32> {
        if self.entities.is_empty() {
            return None;
        }
        let matches = self
            .entities
            .iter()
            .filter(|e| class_names.contains(**e))
            .count();
        Some(matches as f32 / self.entities.len() as f32)
    }

    pub fn score(&self, name: &str, version: i32, class_names: &HashSet<String>) -> f32 {
        let version = if self.check_version(version).unwrap_or(true) {
            0.0
        } else {
            f32::NEG_INFINITY
        };
        let entities = self.check_entities(class_names).unwrap_or(0.0) * POINTS_ENTITIES;
        let file = if self.check_name(name).unwrap_or(false) {
            POINTS_FILE_PATTERN
        } else {
            0.0
        };
        version + entities + file
    }
}

/// Read-only game lookup, built once and passed by reference
#[derive(Debug)]
pub struct AppDb {
    apps: Vec<SourceApp>,
}

impl Default for AppDb {
    fn default() -> Self {
        Self::new()
    }
}

impl AppDb {
    pub fn new() -> Self {
        use AppId::*;
        let apps = vec![
            SourceApp::new(
                CounterStrikeGo,
                (Some(21), Some(21)),
                Some("^[de|cs]_"),
                &[
                    "flashbang_projectile",
                    "func_bomb_target",
                    "func_buyzone",
                    "func_hostage_rescue",
                    "func_no_defuse",
                    "hostage_entity",
                    "info_deathmatch_spawn",
                    "info_hostage_spawn",
                    "info_player_counterterrorist",
                    "info_player_terrorist",
                    "planted_c4_training",
                ],
            ),
            SourceApp::new(
                DarkMessiah,
                (Some(20), Some(20)),
                Some(r"^l\d{2}_"),
                &[
                    "env_entity_SpellCaster",
                    "func_mm_avoidsimplify",
                    "info_node_mm_link_controller",
                    "item_potion_life",
                    "item_potion_mana",
                    "mm_armor",
                    "mm_book",
                    "mm_butterflies",
                    "mm_func_fishes",
                    "mm_player_inputs",
                    "npc_ghoul",
                    "npc_goblin",
                    "npc_orc_sword",
                    "npc_undead",
                    "vehicle_mm_barge",
                    "weapon_arx_silver_sword",
                    "weapon_mm_bow_explosive",
                ],
            ),
            SourceApp::new(
                Insurgency,
                (Some(21), Some(21)),
                None,
                &[
                    "ins_blockzone",
                    "ins_rulesproxy",
                    "ins_spawnpoint",
                    "ins_spawnzone",
                    "ins_viewpoint",
                    "logic_checkpoint",
                    "logic_push",
                    "obj_weapon_cache",
                    "point_controlpoint",
                    "trigger_capture_zone",
                ],
            ),
            SourceApp::new(
                NoMoreRoomInHell,
                (Some(20), Some(20)),
                Some("^[nmo|nms]_"),
                &[
                    "func_nmrih_extractionzone",
                    "func_zombie_spawn",
                    "info_player_nmrih",
                    "nmrih_barricade",
                    "nmrih_extract_point",
                    "nmrih_game_state",
                    "nmrih_health_station",
                    "nmrih_objective_boundary",
                    "overlord_wave_controller",
                    "prop_door_breakable",
                ],
            ),
            SourceApp::new(
                Vindictus,
                (Some(20), None),
                None,
                &[
                    "func_brush_projectile_remove",
                    "info_custom_eye_target",
                    "info_player_dark_knight",
                    "info_player_paladin",
                    "npc_giant_spider",
                    "npc_glasgavelen",
                    "npc_gnoll",
                    "npc_kobold",
                    "npc_ogre",
                    "prop_vehicle_ballista",
                    "script_listener",
                    "trigger_givesubweapon",
                ],
            ),
            SourceApp::new(
                TeamFortress2,
                (Some(20), None),
                Some("^(arena|cp|ctf|pl(r?)|t[cr]|koth|sd|mvm|bc|rd)_"),
                &[
                    "bot_action_point",
                    "bot_generator",
                    "bot_hint_sentrygun",
                    "dispenser_touch_trigger",
                    "entity_spawn_manager",
                    "func_capturezone",
                    "func_regenerate",
                    "func_respawnroom",
                    "item_teamflag",
                    "team_control_point",
                    "team_round_timer",
                    "tf_gamerules",
                ],
            ),
            SourceApp::new(
                Portal,
                (Some(20), None),
                Some("^(testchmb_a|escape)_"),
                &[
                    "env_portal_credits",
                    "func_noportal_volume",
                    "func_portal_bumper",
                    "func_portal_detector",
                    "func_portal_orientation",
                    "npc_portal_turret_floor",
                    "npc_rocket_turret",
                    "npc_security_camera",
                    "prop_portal",
                    "weapon_portalgun",
                ],
            ),
            SourceApp::new(
                Left4Dead,
                (Some(20), None),
                Some("^l4d_"),
                &[
                    "env_outtro_stats",
                    "env_player_blocker",
                    "env_rock_launcher",
                    "env_tonemap_controller_ghost",
                    "env_tonemap_controller_infected",
                    "filter_activator_infected_class",
                    "func_button_timed",
                    "func_nav_avoidance_obstacle",
                    "info_survivor_position",
                    "info_zombie_spawn",
                ],
            ),
            SourceApp::new(
                ZenoClash,
                (Some(20), None),
                None,
                &[
                    "NPC_Zeno_FatherMother_Finale",
                    "NPC_Zeno_FatherMother_Naked",
                    "env_selfShadowing",
                    "func_endworld_pyre",
                    "item_healthFruit",
                    "item_zeno_skullbomb",
                    "npc_deadra",
                    "npc_flyingAnimal",
                    "npc_mucalosaurus",
                ],
            ),
            SourceApp::new(
                TheShip,
                (Some(20), None),
                None,
                &[
                    "ai_shipmate",
                    "ship_base_interaction",
                    "ship_container",
                    "ship_doctor",
                    "ship_item_spawner",
                    "ship_lift",
                    "ship_psychiatrist",
                    "ship_security_booth",
                    "ship_security_camera",
                ],
            ),
            SourceApp::new(
                HalfLife2Ep2,
                (Some(20), None),
                Some("^ep2_"),
                &[
                    "func_tank_combine_cannon",
                    "grenade_helicopter",
                    "npc_advisor",
                    "npc_antlion_grub",
                    "npc_hunter",
                    "npc_hunter_maker",
                    "npc_magnusson",
                    "weapon_striderbuster",
                ],
            ),
            SourceApp::new(
                HalfLifeSource,
                (Some(19), Some(19)),
                Some("^c[0-5]a[0-5][a-z]$"),
                &[
                    "ammo_357",
                    "ammo_9mmAR",
                    "ammo_9mmclip",
                    "ammo_ARgrenades",
                    "ammo_buckshot",
                    "ammo_crossbow",
                    "ammo_gaussclip",
                    "monster_barney",
                    "monster_scientist",
                ],
            ),
        ];
        Self { apps }
    }

    pub fn apps(&self) -> &[SourceApp] {
        &self.apps
    }

    /// Guesses the game a map was compiled for. The best scoring app wins,
    /// a negative best score means no app matched.
    pub fn find(&self, name: &str, version: i32, class_names: &HashSet<String>) -> AppId {
        let best = self
            .apps
            .iter()
            .map(|app| {
                let score = app.score(name, version, class_names);
                log::debug!("App {} has score {score}", app.id.name());
                (app.id, score)
            })
            // first of equal scores wins
            .fold(None, |best: Option<(AppId, f32)>, candidate| match best {
                Some(b) if b.1 >= candidate.1 => Some(b),
                _ => Some(candidate),
            });

        match best {
            Some((id, score)) if score >= 0.0 => id,
            _ => AppId::Unknown,
        }
    }
}

#[cfg(test)]
mod app_tests {
    use super::*;

    fn classes(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn steam_ids() {
        assert_eq!(AppId::from_steam_id(730), AppId::CounterStrikeGo);
        assert_eq!(AppId::from_steam_id(1), AppId::Unknown);
        assert_eq!(AppId::TeamFortress2.steam_id(), 440);
    }

    #[test]
    fn finds_by_entities() {
        let db = AppDb::new();
        let found = db.find(
            "de_dust2",
            21,
            &classes(&["func_buyzone", "info_player_terrorist", "worldspawn"]),
        );
        assert_eq!(found, AppId::CounterStrikeGo);

        let found = db.find("ctf_2fort", 20, &classes(&["item_teamflag", "func_respawnroom"]));
        assert_eq!(found, AppId::TeamFortress2);
    }

    #[test]
    fn version_is_a_hard_gate() {
        let db = AppDb::new();
        let app = db
            .apps()
            .iter()
            .find(|a| a.id == AppId::CounterStrikeGo)
            .unwrap();
        assert_eq!(app.score("de_x", 20, &classes(&["func_buyzone"])), f32::NEG_INFINITY);
        // no app accepts version 17
        let found = db.find("unrelated", 17, &classes(&[]));
        assert_eq!(found, AppId::Unknown);
    }
}
