use crate::entities::attributes::AttributeId;
use crate::entities::item::ItemProps;
use crate::entities::usable::Usable;
use crate::world::entity::{Entity, Payload};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Buff {
    pub id: u32,
    pub name: String,
    pub script: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LevelRow {
    pub level: i32,
    pub experience: i64,
    pub health: i32,
    pub mana: i32,
    #[serde(default)]
    pub skill_points: i32,
}

fn default_battle_speed() -> i32 {
    100
}

/// One drop table entry: `odds` is a percent chance rolled once per
/// kill.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DropChance {
    pub item: u32,
    pub odds: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonsterDef {
    pub id: u32,
    pub name: String,
    pub health: i32,
    #[serde(default)]
    pub mana: i32,
    #[serde(default = "default_battle_speed")]
    pub battle_speed: i32,
    pub min_damage: i32,
    pub max_damage: i32,
    #[serde(default)]
    pub armor: i32,
    #[serde(default)]
    pub evasion: i32,
    pub experience_given: i32,
    pub gold_given: i32,
    #[serde(default)]
    pub skills: Vec<u32>,
    #[serde(default)]
    pub drops: Vec<DropChance>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ZoneEncounter {
    pub monster: u32,
    pub odds: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Zone {
    pub id: u32,
    pub name: String,
    pub encounters: Vec<ZoneEncounter>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TraderRequirement {
    pub item: u32,
    pub count: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Trader {
    pub id: u32,
    pub name: String,
    pub reward_item: u32,
    pub reward_count: u16,
    #[serde(default)]
    pub reward_upgrades: u8,
    pub required: Vec<TraderRequirement>,
}

/// Static game data, loaded once at startup and shared read-only with
/// the whole simulation. Everything references everything else by id.
#[derive(Debug, Default)]
pub struct GameData {
    items: BTreeMap<u32, Usable>,
    buffs: BTreeMap<u32, Buff>,
    levels: Vec<LevelRow>,
    monsters: BTreeMap<u32, MonsterDef>,
    zones: BTreeMap<u32, Zone>,
    traders: BTreeMap<u32, Trader>,
}

fn load_yaml<T: for<'de> Deserialize<'de>>(dir: &Path, file: &str) -> Result<Vec<T>, String> {
    let path = dir.join(file);
    let text = fs::read_to_string(&path)
        .map_err(|err| format!("cannot read {}: {}", path.display(), err))?;
    serde_yaml::from_str(&text).map_err(|err| format!("cannot parse {}: {}", path.display(), err))
}

impl GameData {
    pub fn load(dir: &Path) -> Result<Self, String> {
        let usables: Vec<Usable> = load_yaml(dir, "usables.yaml")?;
        let buffs: Vec<Buff> = load_yaml(dir, "buffs.yaml")?;
        let levels: Vec<LevelRow> = load_yaml(dir, "levels.yaml")?;
        let monsters: Vec<MonsterDef> = load_yaml(dir, "monsters.yaml")?;
        let zones: Vec<Zone> = load_yaml(dir, "zones.yaml")?;
        let traders: Vec<Trader> = load_yaml(dir, "traders.yaml")?;

        let mut data = GameData {
            items: usables.into_iter().map(|usable| (usable.id, usable)).collect(),
            buffs: buffs.into_iter().map(|buff| (buff.id, buff)).collect(),
            levels,
            monsters: monsters
                .into_iter()
                .map(|monster| (monster.id, monster))
                .collect(),
            zones: zones.into_iter().map(|zone| (zone.id, zone)).collect(),
            traders: traders.into_iter().map(|trader| (trader.id, trader)).collect(),
        };
        data.levels.sort_by_key(|row| row.experience);
        data.validate()?;
        Ok(data)
    }

    fn validate(&self) -> Result<(), String> {
        if self.levels.is_empty() {
            return Err("level table is empty".to_string());
        }
        for trader in self.traders.values() {
            if !self.items.contains_key(&trader.reward_item) {
                return Err(format!(
                    "trader '{}' rewards unknown item {}",
                    trader.name, trader.reward_item
                ));
            }
            for requirement in &trader.required {
                if !self.items.contains_key(&requirement.item) {
                    return Err(format!(
                        "trader '{}' requires unknown item {}",
                        trader.name, requirement.item
                    ));
                }
            }
        }
        for monster in self.monsters.values() {
            for drop in &monster.drops {
                if !self.items.contains_key(&drop.item) {
                    return Err(format!(
                        "monster '{}' drops unknown item {}",
                        monster.name, drop.item
                    ));
                }
            }
        }
        for zone in self.zones.values() {
            for encounter in &zone.encounters {
                if !self.monsters.contains_key(&encounter.monster) {
                    return Err(format!(
                        "zone '{}' spawns unknown monster {}",
                        zone.name, encounter.monster
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn usable(&self, id: u32) -> Option<&Usable> {
        self.items.get(&id)
    }

    pub fn item_props(&self, id: u32) -> Option<&ItemProps> {
        self.usable(id).and_then(|usable| usable.item_props())
    }

    pub fn buff(&self, id: u32) -> Option<&Buff> {
        self.buffs.get(&id)
    }

    pub fn monster(&self, id: u32) -> Option<&MonsterDef> {
        self.monsters.get(&id)
    }

    pub fn zone(&self, id: u32) -> Option<&Zone> {
        self.zones.get(&id)
    }

    pub fn trader(&self, id: u32) -> Option<&Trader> {
        self.traders.get(&id)
    }

    pub fn levels(&self) -> &[LevelRow] {
        &self.levels
    }

    /// Highest level row whose threshold the experience total meets.
    pub fn level_for_experience(&self, experience: i64) -> &LevelRow {
        let mut best = &self.levels[0];
        for row in &self.levels {
            if row.experience <= experience {
                best = row;
            } else {
                break;
            }
        }
        best
    }

    /// Builds a fresh combat-ready entity from a monster definition.
    pub fn spawn_monster(&self, id: u32) -> Result<Entity, String> {
        let def = self
            .monster(id)
            .ok_or_else(|| format!("unknown monster id {}", id))?;
        let mut entity = Entity::monster(&def.name, def.id);
        if let Payload::Monster(data) = &mut entity.payload {
            data.skills = def.skills.clone();
        }
        entity.attributes.set_int(AttributeId::MAX_HEALTH, def.health);
        entity.attributes.set_int(AttributeId::HEALTH, def.health);
        entity.attributes.set_int(AttributeId::MAX_MANA, def.mana);
        entity.attributes.set_int(AttributeId::MANA, def.mana);
        entity
            .attributes
            .set_int(AttributeId::BATTLE_SPEED, def.battle_speed);
        entity.attributes.set_int(AttributeId::MIN_DAMAGE, def.min_damage);
        entity.attributes.set_int(AttributeId::MAX_DAMAGE, def.max_damage);
        entity.attributes.set_int(AttributeId::ARMOR, def.armor);
        entity.attributes.set_int(AttributeId::EVASION, def.evasion);
        entity
            .attributes
            .set_int(AttributeId::EXPERIENCE_GIVEN, def.experience_given);
        entity.attributes.set_int(AttributeId::GOLD_GIVEN, def.gold_given);
        Ok(entity)
    }
}

#[cfg(test)]
impl GameData {
    /// Hand-built tables shared by tests across the crate.
    pub fn fixture() -> GameData {
        use crate::entities::item::EquipCategory;
        use crate::entities::usable::{Scope, TargetType, UsableKind};

        fn item(
            id: u32,
            name: &str,
            script: &str,
            props: ItemProps,
            target: TargetType,
            scope: Scope,
            price: i64,
        ) -> Usable {
            Usable {
                id,
                name: name.to_string(),
                script: script.to_string(),
                kind: UsableKind::Item(props),
                max_level: 1,
                duration: 0.0,
                attack_delay: 0.0,
                attack_time: 0.0,
                cooldown: 0.0,
                target,
                scope,
                target_alive: true,
                price,
            }
        }

        fn skill(id: u32, name: &str, script: &str, target: TargetType, scope: Scope) -> Usable {
            Usable {
                id,
                name: name.to_string(),
                script: script.to_string(),
                kind: UsableKind::Skill,
                max_level: 5,
                duration: 0.0,
                attack_delay: 0.3,
                attack_time: 0.6,
                cooldown: 1.0,
                target,
                scope,
                target_alive: true,
                price: 0,
            }
        }

        let usables = vec![
            item(
                1,
                "short sword",
                "",
                ItemProps {
                    category: Some(EquipCategory::OneHandedWeapon),
                    ..ItemProps::default()
                },
                TargetType::None,
                Scope::None,
                50,
            ),
            item(
                2,
                "health potion",
                "health_potion",
                ItemProps {
                    consumable: true,
                    max_stack: 100,
                    ..ItemProps::default()
                },
                TargetType::SelfOnly,
                Scope::All,
                25,
            ),
            item(
                3,
                "tome of flames",
                "",
                ItemProps {
                    unlock_skill: Some(11),
                    tradable: false,
                    ..ItemProps::default()
                },
                TargetType::None,
                Scope::World,
                200,
            ),
            item(
                4,
                "iron shield",
                "",
                ItemProps {
                    category: Some(EquipCategory::Shield),
                    ..ItemProps::default()
                },
                TargetType::None,
                Scope::None,
                60,
            ),
            item(
                5,
                "greatsword",
                "",
                ItemProps {
                    category: Some(EquipCategory::TwoHandedWeapon),
                    ..ItemProps::default()
                },
                TargetType::None,
                Scope::None,
                150,
            ),
            item(
                6,
                "brass key",
                "",
                ItemProps {
                    key: true,
                    tradable: false,
                    ..ItemProps::default()
                },
                TargetType::None,
                Scope::World,
                0,
            ),
            item(
                7,
                "mana potion",
                "mana_potion",
                ItemProps {
                    consumable: true,
                    max_stack: 100,
                    ..ItemProps::default()
                },
                TargetType::SelfOnly,
                Scope::All,
                25,
            ),
        ];
        let skills = vec![
            skill(10, "basic attack", "attack", TargetType::Enemy, Scope::Battle),
            skill(11, "fireball", "fireball", TargetType::Enemy, Scope::Battle),
            skill(12, "heal", "heal", TargetType::Ally, Scope::All),
        ];

        let monsters = vec![
            MonsterDef {
                id: 100,
                name: "goblin".to_string(),
                health: 30,
                mana: 0,
                battle_speed: 100,
                min_damage: 2,
                max_damage: 5,
                armor: 1,
                evasion: 5,
                experience_given: 10,
                gold_given: 8,
                skills: vec![10],
                drops: vec![DropChance { item: 2, odds: 100 }],
            },
            MonsterDef {
                id: 101,
                name: "dire wolf".to_string(),
                health: 55,
                mana: 0,
                battle_speed: 130,
                min_damage: 4,
                max_damage: 9,
                armor: 0,
                evasion: 10,
                experience_given: 25,
                gold_given: 14,
                skills: vec![10],
                drops: Vec::new(),
            },
        ];

        GameData {
            items: usables
                .into_iter()
                .chain(skills)
                .map(|usable| (usable.id, usable))
                .collect(),
            buffs: [(
                1,
                Buff {
                    id: 1,
                    name: "burning".to_string(),
                    script: "burning".to_string(),
                    summary: String::new(),
                },
            )]
            .into_iter()
            .collect(),
            levels: vec![
                LevelRow { level: 1, experience: 0, health: 100, mana: 50, skill_points: 1 },
                LevelRow { level: 2, experience: 100, health: 120, mana: 60, skill_points: 1 },
                LevelRow { level: 3, experience: 300, health: 145, mana: 75, skill_points: 1 },
                LevelRow { level: 4, experience: 700, health: 175, mana: 95, skill_points: 2 },
            ],
            monsters: monsters
                .into_iter()
                .map(|monster| (monster.id, monster))
                .collect(),
            zones: [(
                1,
                Zone {
                    id: 1,
                    name: "mirefen".to_string(),
                    encounters: vec![
                        ZoneEncounter { monster: 100, odds: 70 },
                        ZoneEncounter { monster: 101, odds: 30 },
                    ],
                },
            )]
            .into_iter()
            .collect(),
            traders: [(
                50,
                Trader {
                    id: 50,
                    name: "swamp peddler".to_string(),
                    reward_item: 5,
                    reward_count: 1,
                    reward_upgrades: 0,
                    required: vec![
                        TraderRequirement { item: 2, count: 3 },
                        TraderRequirement { item: 6, count: 1 },
                    ],
                },
            )]
            .into_iter()
            .collect(),
        }
    }
}
