use crate::entities::action::Action;
use crate::entities::attributes::{AttributeId, AttributeTable};
use crate::entities::inventory::Inventory;
use crate::world::registry::NetworkId;
use std::collections::BTreeSet;

pub const ACTION_BAR_SIZE: usize = 8;

/// Player-only state.
#[derive(Debug, Clone, Default)]
pub struct PlayerData {
    pub account: String,
    pub inventory: Inventory,
    pub known_skills: BTreeSet<u32>,
    pub action_bar: Vec<Option<Action>>,
}

impl PlayerData {
    pub fn new(account: &str) -> Self {
        Self {
            account: account.to_string(),
            inventory: Inventory::new(),
            known_skills: BTreeSet::new(),
            action_bar: vec![None; ACTION_BAR_SIZE],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MonsterData {
    pub monster_id: u32,
    pub skills: Vec<u32>,
}

/// What kind of object a registry slot holds. Battles own no
/// attributes of their own; the marker exists so a battle has a
/// network identity with the same lifetime rules as everything else.
#[derive(Debug, Clone)]
pub enum Payload {
    Player(PlayerData),
    Monster(MonsterData),
    Battle,
}

/// One simulation object. Identity lives in `id`; everything the
/// object *is* lives in the attribute table and the payload.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: NetworkId,
    pub name: String,
    pub deleted: bool,
    pub attributes: AttributeTable,
    pub battle: Option<NetworkId>,
    pub battle_side: u8,
    pub fled: bool,
    pub payload: Payload,
    regen_timer: f64,
}

impl Entity {
    fn with_payload(name: &str, payload: Payload) -> Self {
        Self {
            id: NetworkId(0),
            name: name.to_string(),
            deleted: false,
            attributes: AttributeTable::new(),
            battle: None,
            battle_side: 0,
            fled: false,
            payload,
            regen_timer: 0.0,
        }
    }

    pub fn player(name: &str, account: &str) -> Self {
        Self::with_payload(name, Payload::Player(PlayerData::new(account)))
    }

    pub fn monster(name: &str, monster_id: u32) -> Self {
        Self::with_payload(
            name,
            Payload::Monster(MonsterData {
                monster_id,
                skills: Vec::new(),
            }),
        )
    }

    pub fn battle_marker() -> Self {
        Self::with_payload("battle", Payload::Battle)
    }

    pub fn is_player(&self) -> bool {
        matches!(self.payload, Payload::Player(_))
    }

    pub fn is_monster(&self) -> bool {
        matches!(self.payload, Payload::Monster(_))
    }

    pub fn health(&self) -> i32 {
        self.attributes.int(AttributeId::HEALTH)
    }

    pub fn max_health(&self) -> i32 {
        self.attributes.int(AttributeId::MAX_HEALTH)
    }

    pub fn mana(&self) -> i32 {
        self.attributes.int(AttributeId::MANA)
    }

    pub fn is_alive(&self) -> bool {
        self.health() > 0
    }

    pub fn in_battle(&self) -> bool {
        self.battle.is_some()
    }

    pub fn player_data(&self) -> Option<&PlayerData> {
        match &self.payload {
            Payload::Player(data) => Some(data),
            _ => None,
        }
    }

    pub fn player_data_mut(&mut self) -> Option<&mut PlayerData> {
        match &mut self.payload {
            Payload::Player(data) => Some(data),
            _ => None,
        }
    }

    pub fn monster_data(&self) -> Option<&MonsterData> {
        match &self.payload {
            Payload::Monster(data) => Some(data),
            _ => None,
        }
    }

    pub fn inventory(&self) -> Option<&Inventory> {
        self.player_data().map(|data| &data.inventory)
    }

    pub fn inventory_mut(&mut self) -> Option<&mut Inventory> {
        self.player_data_mut().map(|data| &mut data.inventory)
    }

    /// Monsters know the skills on their roster; players know what
    /// they have unlocked.
    pub fn knows_skill(&self, skill_id: u32) -> bool {
        match &self.payload {
            Payload::Player(data) => data.known_skills.contains(&skill_id),
            Payload::Monster(data) => data.skills.contains(&skill_id),
            Payload::Battle => false,
        }
    }

    /// Once per whole elapsed second, regen ticks the resource pools
    /// toward their maximums. Dead and deleted objects do not regen.
    pub fn update(&mut self, dt: f64) {
        if self.deleted || !self.is_alive() {
            return;
        }
        self.regen_timer += dt;
        while self.regen_timer >= 1.0 {
            self.regen_timer -= 1.0;
            let health_regen = self.attributes.int(AttributeId::HEALTH_REGEN);
            if health_regen != 0 {
                let max = self.max_health();
                let next = (self.health() + health_regen).clamp(0, max.max(0));
                self.attributes.set_int(AttributeId::HEALTH, next);
            }
            let mana_regen = self.attributes.int(AttributeId::MANA_REGEN);
            if mana_regen != 0 {
                let max = self.attributes.int(AttributeId::MAX_MANA);
                let next = (self.mana() + mana_regen).clamp(0, max.max(0));
                self.attributes.set_int(AttributeId::MANA, next);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wounded_player() -> Entity {
        let mut entity = Entity::player("eira", "eira");
        entity.attributes.set_int(AttributeId::MAX_HEALTH, 100);
        entity.attributes.set_int(AttributeId::HEALTH, 40);
        entity.attributes.set_int(AttributeId::HEALTH_REGEN, 5);
        entity
    }

    #[test]
    fn regen_ticks_on_whole_seconds() {
        let mut entity = wounded_player();
        entity.update(0.5);
        assert_eq!(entity.health(), 40);
        entity.update(0.5);
        assert_eq!(entity.health(), 45);
        entity.update(2.0);
        assert_eq!(entity.health(), 55);
    }

    #[test]
    fn regen_never_exceeds_max() {
        let mut entity = wounded_player();
        entity.attributes.set_int(AttributeId::HEALTH, 98);
        entity.update(1.0);
        assert_eq!(entity.health(), 100);
    }

    #[test]
    fn dead_entities_do_not_regen() {
        let mut entity = wounded_player();
        entity.attributes.set_int(AttributeId::HEALTH, 0);
        entity.update(3.0);
        assert_eq!(entity.health(), 0);
        assert!(!entity.is_alive());
    }

    #[test]
    fn skill_knowledge_per_payload() {
        let mut player = Entity::player("eira", "eira");
        player
            .player_data_mut()
            .expect("player payload")
            .known_skills
            .insert(11);
        assert!(player.knows_skill(11));
        assert!(!player.knows_skill(12));

        let mut monster = Entity::monster("goblin", 3);
        if let Payload::Monster(data) = &mut monster.payload {
            data.skills.push(20);
        }
        assert!(monster.knows_skill(20));
    }
}
