use crate::combat::rng::RollStream;
use crate::entities::action::{Action, ActionResult};
use crate::entities::attributes::{AttributeId, Value};
use crate::entities::inventory::Slot;
use crate::entities::statchange::StatChange;
use crate::entities::usable::{Scope, UseRequest};
use crate::net::packet::{PacketReader, PacketWriter};
use crate::scripting::effects::{EffectArgs, EffectEvaluator};
use crate::world::game_data::GameData;
use crate::world::registry::{NetworkId, Registry};

/// Base seconds between turns at battle speed 100.
const TURN_BASE: f64 = 3.0;
/// Seconds a freshly formed battle waits before the first turn.
const FORM_TIME: f64 = 1.0;
pub const SIDE_COUNT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleState {
    Forming,
    Active,
    Resolving,
    Ended,
}

impl BattleState {
    pub fn as_u8(self) -> u8 {
        match self {
            BattleState::Forming => 0,
            BattleState::Active => 1,
            BattleState::Resolving => 2,
            BattleState::Ended => 3,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingAction {
    usable_id: u32,
    level: i32,
    target: Option<NetworkId>,
}

#[derive(Debug, Clone)]
pub struct Member {
    pub id: NetworkId,
    pub side: u8,
    pub fled: bool,
    turn_timer: f64,
    pending: Option<PendingAction>,
}

/// Outbound announcements produced while the battle advances. The
/// world layer turns these into packets.
#[derive(Debug, Clone)]
pub enum BattleEvent {
    Action(ActionResult),
    Change(StatChange),
    Loot {
        winner: NetworkId,
        slots: Vec<Slot>,
    },
    Left(NetworkId),
    Ended {
        battle: NetworkId,
        winning_side: Option<u8>,
    },
}

/// One running battle. The battle owns its members' turn order and
/// its own roll stream; every combat roll comes from that stream, so
/// a battle with a known seed replays identically.
#[derive(Debug)]
pub struct Battle {
    pub id: NetworkId,
    pub state: BattleState,
    pub pvp: bool,
    pub boss: bool,
    cooldown: f64,
    members: Vec<Member>,
    side_count: [u8; SIDE_COUNT],
    rng: RollStream,
}

impl Battle {
    pub fn new(id: NetworkId, seed: u64) -> Self {
        Self {
            id,
            state: BattleState::Forming,
            pvp: false,
            boss: false,
            cooldown: FORM_TIME,
            members: Vec::new(),
            side_count: [0; SIDE_COUNT],
            rng: RollStream::from_seed(seed),
        }
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn side_object_ids(&self, side: u8) -> Vec<NetworkId> {
        self.members
            .iter()
            .filter(|member| member.side == side)
            .map(|member| member.id)
            .collect()
    }

    pub fn is_over(&self) -> bool {
        self.state == BattleState::Ended
    }

    fn initial_timer(registry: &Registry, id: NetworkId) -> f64 {
        let speed = registry
            .get(id)
            .map(|entity| entity.attributes.int(AttributeId::BATTLE_SPEED))
            .unwrap_or(100)
            .max(1);
        TURN_BASE * 100.0 / f64::from(speed)
    }

    /// Joins an object to a side. An object already fighting anywhere
    /// stays where it is.
    pub fn add_object(
        &mut self,
        registry: &mut Registry,
        id: NetworkId,
        side: u8,
    ) -> Result<(), String> {
        if (side as usize) >= SIDE_COUNT {
            return Err(format!("battle side {} does not exist", side));
        }
        if matches!(self.state, BattleState::Resolving | BattleState::Ended) {
            return Err("battle is already resolving".to_string());
        }
        let timer = Self::initial_timer(registry, id);
        let entity = registry
            .get_mut(id)
            .ok_or_else(|| format!("object {} is not resident", id))?;
        if entity.battle.is_some() {
            return Err(format!("object {} is already in a battle", id));
        }
        entity.battle = Some(self.id);
        entity.battle_side = side;
        entity.fled = false;
        self.members.push(Member {
            id,
            side,
            fled: false,
            turn_timer: timer,
            pending: None,
        });
        self.side_count[side as usize] += 1;
        Ok(())
    }

    /// Detaches an object (flight or disconnect). The end condition
    /// is re-evaluated immediately so a battle never lingers with one
    /// empty side.
    pub fn remove_object(
        &mut self,
        registry: &mut Registry,
        data: &GameData,
        id: NetworkId,
        events: &mut Vec<BattleEvent>,
    ) {
        let Some(member) = self.members.iter_mut().find(|member| member.id == id) else {
            return;
        };
        if member.fled {
            return;
        }
        member.fled = true;
        member.pending = None;
        if let Some(entity) = registry.get_mut(id) {
            entity.battle = None;
            entity.fled = true;
        }
        events.push(BattleEvent::Left(id));
        self.check_end(registry, data, events);
    }

    /// Queues a member's next action. One action per turn; a queued
    /// action stands until the turn resolves.
    pub fn set_action(
        &mut self,
        registry: &Registry,
        id: NetworkId,
        usable_id: u32,
        level: i32,
        target: Option<NetworkId>,
    ) -> Result<(), String> {
        if self.state != BattleState::Active && self.state != BattleState::Forming {
            return Err("battle is not accepting actions".to_string());
        }
        let alive = registry
            .get(id)
            .map(|entity| entity.is_alive())
            .unwrap_or(false);
        if !alive {
            return Err("dead fighters take no actions".to_string());
        }
        let member = self
            .members
            .iter_mut()
            .find(|member| member.id == id)
            .ok_or_else(|| format!("object {} is not in this battle", id))?;
        if member.fled {
            return Err("fled fighters take no actions".to_string());
        }
        if member.pending.is_some() {
            return Err("action already queued for this turn".to_string());
        }
        member.pending = Some(PendingAction {
            usable_id,
            level,
            target,
        });
        Ok(())
    }

    /// Advances the battle. Timers tick down for every living member;
    /// when several come due at once the lowest timer acts first, ties
    /// broken by side then join order so resolution is deterministic.
    pub fn update(
        &mut self,
        dt: f64,
        registry: &mut Registry,
        data: &GameData,
        eval: &dyn EffectEvaluator,
        events: &mut Vec<BattleEvent>,
    ) {
        match self.state {
            BattleState::Forming => {
                self.cooldown -= dt;
                if self.cooldown <= 0.0 {
                    self.state = BattleState::Active;
                }
            }
            BattleState::Active => {
                for member in &mut self.members {
                    let alive = registry
                        .get(member.id)
                        .map(|entity| entity.is_alive())
                        .unwrap_or(false);
                    if member.fled || !alive {
                        continue;
                    }
                    member.turn_timer -= dt;
                }
                self.fill_monster_actions(registry);
                while self.state == BattleState::Active {
                    let Some(index) = self.next_ready_member(registry) else {
                        break;
                    };
                    self.resolve_member(index, registry, data, eval, events);
                    self.check_end(registry, data, events);
                }
            }
            BattleState::Resolving | BattleState::Ended => {}
        }
    }

    /// Monsters pick for themselves: first known skill against a
    /// random living opponent.
    fn fill_monster_actions(&mut self, registry: &Registry) {
        let mut choices: Vec<(usize, PendingAction)> = Vec::new();
        for (index, member) in self.members.iter().enumerate() {
            if member.fled || member.pending.is_some() || member.turn_timer > 0.0 {
                continue;
            }
            let Some(entity) = registry.get(member.id) else {
                continue;
            };
            if !entity.is_monster() || !entity.is_alive() {
                continue;
            }
            let Some(skill_id) = entity.monster_data().and_then(|data| data.skills.first().copied())
            else {
                continue;
            };
            let opponents: Vec<NetworkId> = self
                .members
                .iter()
                .filter(|other| {
                    other.side != member.side
                        && !other.fled
                        && registry
                            .get(other.id)
                            .map(|entity| entity.is_alive())
                            .unwrap_or(false)
                })
                .map(|other| other.id)
                .collect();
            if opponents.is_empty() {
                continue;
            }
            let pick = self.rng.roll_range(0, opponents.len() as u32 - 1) as usize;
            choices.push((
                index,
                PendingAction {
                    usable_id: skill_id,
                    level: 1,
                    target: Some(opponents[pick]),
                },
            ));
        }
        for (index, pending) in choices {
            self.members[index].pending = Some(pending);
        }
    }

    fn next_ready_member(&self, registry: &Registry) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (index, member) in self.members.iter().enumerate() {
            if member.fled || member.turn_timer > 0.0 || member.pending.is_none() {
                continue;
            }
            let alive = registry
                .get(member.id)
                .map(|entity| entity.is_alive())
                .unwrap_or(false);
            if !alive {
                continue;
            }
            best = match best {
                None => Some(index),
                Some(current) => {
                    let a = &self.members[index];
                    let b = &self.members[current];
                    // Lowest timer first, then side, then join order.
                    let key_a = (a.turn_timer, a.side, index);
                    let key_b = (b.turn_timer, b.side, current);
                    if key_a < key_b {
                        Some(index)
                    } else {
                        Some(current)
                    }
                }
            };
        }
        best
    }

    fn resolve_member(
        &mut self,
        index: usize,
        registry: &mut Registry,
        data: &GameData,
        eval: &dyn EffectEvaluator,
        events: &mut Vec<BattleEvent>,
    ) {
        let member_id = self.members[index].id;
        let Some(pending) = self.members[index].pending.take() else {
            return;
        };
        self.members[index].turn_timer = Self::initial_timer(registry, member_id);

        let Some(usable) = data.usable(pending.usable_id) else {
            return;
        };
        let req = UseRequest {
            usable_id: pending.usable_id,
            level: pending.level,
            source: member_id,
            target: pending.target,
            scope: Scope::Battle,
            from_unlock_slot: false,
        };
        if !usable.can_use(&req, registry, eval) {
            return;
        }

        let mut result = ActionResult::new(
            Action::new(pending.usable_id, pending.level),
            Scope::Battle,
            member_id,
            pending.target,
        );
        {
            let Some(source) = registry.get(member_id) else {
                return;
            };
            let target = pending.target.and_then(|id| registry.get(id));
            let mut args = EffectArgs {
                level: pending.level,
                duration: usable.duration,
                source,
                target,
                rng: &mut self.rng,
            };
            usable.apply_cost(eval, &mut args, &mut result);
            usable.use_action(eval, &mut args, &mut result);
            usable.stats(eval, &mut args, &mut result);
        }

        if !result.source.is_empty() {
            if let Err(err) = result.source.apply(registry) {
                crate::telemetry::log_error(&format!("battle {}: {}", self.id, err));
            }
        }
        if result.target.owner.is_some() && !result.target.is_empty() {
            if let Err(err) = result.target.apply(registry) {
                crate::telemetry::log_error(&format!("battle {}: {}", self.id, err));
            }
        }
        for (item_id, count) in &result.inventory_cost {
            if let Some(inventory) = registry
                .get_mut(member_id)
                .and_then(|entity| entity.inventory_mut())
            {
                if let Err(err) = inventory.spend_items(data, *item_id, *count) {
                    crate::telemetry::log_error(&format!("battle {}: {}", self.id, err));
                }
            }
        }
        if let Some(source) = registry.get(member_id) {
            let (delay, time, cooldown) = usable.attack_times(eval, source);
            result.attack_delay = delay;
            result.attack_time = time;
            result.cooldown = cooldown;
            self.members[index].turn_timer += cooldown;
        }
        events.push(BattleEvent::Action(result));
    }

    fn living_on_side(&self, registry: &Registry, side: u8) -> usize {
        self.members
            .iter()
            .filter(|member| {
                member.side == side
                    && !member.fled
                    && registry
                        .get(member.id)
                        .map(|entity| entity.is_alive())
                        .unwrap_or(false)
            })
            .count()
    }

    fn check_end(&mut self, registry: &mut Registry, data: &GameData, events: &mut Vec<BattleEvent>) {
        if matches!(self.state, BattleState::Resolving | BattleState::Ended) {
            return;
        }
        let alive = [
            self.living_on_side(registry, 0),
            self.living_on_side(registry, 1),
        ];
        if alive[0] > 0 && alive[1] > 0 {
            return;
        }
        self.state = BattleState::Resolving;
        let winning_side = match (alive[0], alive[1]) {
            (0, 0) => None,
            (_, 0) => Some(0),
            (0, _) => Some(1),
            _ => unreachable!(),
        };
        self.resolve(registry, data, winning_side, events);
    }

    /// Tallies the losers' bounty and splits it across every living
    /// winner: total divided by winner count, never below one when
    /// there was anything to give.
    fn resolve(
        &mut self,
        registry: &mut Registry,
        data: &GameData,
        winning_side: Option<u8>,
        events: &mut Vec<BattleEvent>,
    ) {
        if let Some(side) = winning_side {
            let losing_side = 1 - side;
            let mut experience: i64 = 0;
            let mut gold: i64 = 0;
            for member in &self.members {
                if member.side != losing_side || member.fled {
                    continue;
                }
                if let Some(entity) = registry.get(member.id) {
                    if !entity.is_alive() {
                        experience +=
                            i64::from(entity.attributes.int(AttributeId::EXPERIENCE_GIVEN));
                        gold += i64::from(entity.attributes.int(AttributeId::GOLD_GIVEN));
                    }
                }
            }

            let winners: Vec<NetworkId> = self
                .members
                .iter()
                .filter(|member| {
                    member.side == side
                        && !member.fled
                        && registry
                            .get(member.id)
                            .map(|entity| entity.is_alive() && entity.is_player())
                            .unwrap_or(false)
                })
                .map(|member| member.id)
                .collect();
            if !winners.is_empty() {
                let count = winners.len() as i64;
                let experience_share = if experience > 0 { (experience / count).max(1) } else { 0 };
                let gold_share = if gold > 0 { (gold / count).max(1) } else { 0 };
                for id in winners.iter().copied() {
                    let mut change = StatChange::new(id);
                    if experience_share > 0 {
                        change.set(AttributeId::EXPERIENCE, Value::Int64(experience_share));
                    }
                    if gold_share > 0 {
                        change.set(AttributeId::GOLD, Value::Int64(gold_share));
                    }
                    if change.is_empty() {
                        continue;
                    }
                    if change.apply(registry).is_ok() {
                        events.push(BattleEvent::Change(change));
                    }
                }

                // Drop tables roll once per dead monster; each drop
                // lands with a random winner.
                let dead_monsters: Vec<u32> = self
                    .members
                    .iter()
                    .filter(|member| member.side == losing_side && !member.fled)
                    .filter_map(|member| registry.get(member.id))
                    .filter(|entity| !entity.is_alive())
                    .filter_map(|entity| entity.monster_data().map(|data| data.monster_id))
                    .collect();
                for monster_id in dead_monsters {
                    let Some(def) = data.monster(monster_id) else {
                        continue;
                    };
                    for drop in &def.drops {
                        if !self.rng.roll_percent(drop.odds) {
                            continue;
                        }
                        let pick = self.rng.roll_range(0, winners.len() as u32 - 1) as usize;
                        let winner = winners[pick];
                        let Some(inventory) = registry
                            .get_mut(winner)
                            .and_then(|entity| entity.inventory_mut())
                        else {
                            continue;
                        };
                        match inventory.add_item(data, drop.item, 0, 1) {
                            Ok(slots) => events.push(BattleEvent::Loot { winner, slots }),
                            Err(err) => crate::telemetry::log_battle(&format!(
                                "battle {}: drop lost, {}",
                                self.id, err
                            )),
                        }
                    }
                }
            }
        }

        for member in &self.members {
            if let Some(entity) = registry.get_mut(member.id) {
                entity.battle = None;
                entity.battle_side = 0;
                if entity.is_monster() && !entity.is_alive() {
                    entity.deleted = true;
                }
            }
        }
        registry.mark_deleted(self.id);
        self.state = BattleState::Ended;
        events.push(BattleEvent::Ended {
            battle: self.id,
            winning_side,
        });
    }

    /// Client snapshot: battle header, countdown, then each member's
    /// side, flight flag and turn timer. Enough for a late observer to
    /// pick up a running battle without replaying its history.
    pub fn serialize(&self, writer: &mut PacketWriter) {
        writer.write_u16_le(self.id.0);
        writer.write_u8(self.state.as_u8());
        writer.write_bool(self.pvp);
        writer.write_bool(self.boss);
        writer.write_f32_le(self.cooldown as f32);
        writer.write_u8(self.members.len().min(u8::MAX as usize) as u8);
        for member in &self.members {
            writer.write_u16_le(member.id.0);
            writer.write_u8(member.side);
            writer.write_bool(member.fled);
            writer.write_f32_le(member.turn_timer as f32);
        }
    }
}

/// Decoded form of [`Battle::serialize`].
#[derive(Debug, Clone, PartialEq)]
pub struct BattleSummary {
    pub id: NetworkId,
    pub state: u8,
    pub pvp: bool,
    pub boss: bool,
    pub cooldown: f32,
    pub members: Vec<MemberSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemberSummary {
    pub id: NetworkId,
    pub side: u8,
    pub fled: bool,
    pub turn_timer: f32,
}

impl BattleSummary {
    pub fn unserialize(reader: &mut PacketReader) -> Option<Self> {
        let id = NetworkId(reader.read_u16_le()?);
        let state = reader.read_u8()?;
        let pvp = reader.read_bool()?;
        let boss = reader.read_bool()?;
        let cooldown = reader.read_f32_le()?;
        let count = reader.read_u8()?;
        let mut members = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            members.push(MemberSummary {
                id: NetworkId(reader.read_u16_le()?),
                side: reader.read_u8()?,
                fled: reader.read_bool()?,
                turn_timer: reader.read_f32_le()?,
            });
        }
        Some(Self {
            id,
            state,
            pvp,
            boss,
            cooldown,
            members,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::effects::EffectTable;
    use crate::world::entity::Entity;

    fn player(registry: &mut Registry, name: &str, health: i32, speed: i32) -> NetworkId {
        let mut entity = Entity::player(name, name);
        entity.attributes.set_int(AttributeId::MAX_HEALTH, health);
        entity.attributes.set_int(AttributeId::HEALTH, health);
        entity.attributes.set_int(AttributeId::BATTLE_SPEED, speed);
        entity.attributes.set_int(AttributeId::MIN_DAMAGE, 5);
        entity.attributes.set_int(AttributeId::MAX_DAMAGE, 5);
        let id = registry.create(entity).expect("network id");
        registry
            .get_mut(id)
            .expect("resident")
            .player_data_mut()
            .expect("player payload")
            .known_skills
            .insert(10);
        id
    }

    fn battle_fixture() -> (Registry, GameData, Battle, NetworkId, NetworkId) {
        let mut registry = Registry::new(64);
        let data = GameData::fixture();
        let hero = player(&mut registry, "eira", 200, 100);
        let goblin_entity = data.spawn_monster(100).expect("goblin");
        let goblin = registry.create(goblin_entity).expect("network id");
        let marker = registry.create(Entity::battle_marker()).expect("network id");
        let mut battle = Battle::new(marker, 42);
        battle.add_object(&mut registry, hero, 0).expect("join");
        battle.add_object(&mut registry, goblin, 1).expect("join");
        (registry, data, battle, hero, goblin)
    }

    #[test]
    fn object_cannot_join_two_battles() {
        let (mut registry, _data, _battle, hero, _goblin) = battle_fixture();
        let marker = registry.create(Entity::battle_marker()).expect("network id");
        let mut other = Battle::new(marker, 7);
        let err = other
            .add_object(&mut registry, hero, 0)
            .expect_err("already fighting");
        assert!(err.contains("already in a battle"));
    }

    #[test]
    fn side_partition_tracks_membership() {
        let (_registry, _data, battle, hero, goblin) = battle_fixture();
        assert_eq!(battle.side_object_ids(0), vec![hero]);
        assert_eq!(battle.side_object_ids(1), vec![goblin]);
        assert_eq!(battle.members().len(), 2);
    }

    #[test]
    fn battle_runs_to_a_winner() {
        let (mut registry, data, mut battle, hero, goblin) = battle_fixture();
        let table = EffectTable::new();
        let mut events = Vec::new();

        // Warm through the forming countdown.
        battle.update(2.0, &mut registry, &data, &table, &mut events);
        assert_eq!(battle.state, BattleState::Active);

        let mut guard = 0;
        while !battle.is_over() && guard < 200 {
            if battle.state == BattleState::Active {
                let _ = battle.set_action(&registry, hero, 10, 1, Some(goblin));
            }
            battle.update(1.0, &mut registry, &data, &table, &mut events);
            guard += 1;
        }
        assert!(battle.is_over(), "battle never finished");
        assert!(events
            .iter()
            .any(|event| matches!(event, BattleEvent::Ended { winning_side: Some(0), .. })));

        // Turn results carry the skill's resolved timings.
        let action = events
            .iter()
            .find_map(|event| match event {
                BattleEvent::Action(result) => Some(result),
                _ => None,
            })
            .expect("turns were taken");
        assert_eq!(action.attack_delay, 0.3);
        assert_eq!(action.attack_time, 0.6);
        assert_eq!(action.cooldown, 1.0);

        // Winner collected the goblin's bounty and its guaranteed drop.
        let hero_entity = registry.get(hero).expect("resident");
        assert_eq!(hero_entity.attributes.int64(AttributeId::EXPERIENCE), 10);
        assert_eq!(hero_entity.attributes.int64(AttributeId::GOLD), 8);
        assert_eq!(hero_entity.inventory().expect("inventory").count_item(2), 1);
        assert!(hero_entity.battle.is_none());

        // Dead monster is queued for reclaim, battle marker too.
        registry.update(0.0);
        let released = registry.reclaim();
        assert!(released.contains(&goblin));
        assert!(released.contains(&battle.id));
    }

    #[test]
    fn fleeing_last_member_ends_the_battle() {
        let (mut registry, data, mut battle, hero, _goblin) = battle_fixture();
        let mut events = Vec::new();
        battle.update(2.0, &mut registry, &data, &EffectTable::new(), &mut events);
        battle.remove_object(&mut registry, &data, hero, &mut events);
        assert!(battle.is_over());
        assert!(events
            .iter()
            .any(|event| matches!(event, BattleEvent::Ended { winning_side: Some(1), .. })));
        assert!(registry.get(hero).expect("resident").battle.is_none());

        // Ended is terminal; nobody joins a finished battle.
        let late = player(&mut registry, "brom", 100, 100);
        let err = battle
            .add_object(&mut registry, late, 0)
            .expect_err("battle is done");
        assert!(err.contains("resolving"));
    }

    #[test]
    fn queued_action_cannot_be_replaced() {
        let (mut registry, data, mut battle, hero, goblin) = battle_fixture();
        let mut events = Vec::new();
        battle.update(2.0, &mut registry, &data, &EffectTable::new(), &mut events);
        battle
            .set_action(&registry, hero, 10, 1, Some(goblin))
            .expect("first action");
        let err = battle
            .set_action(&registry, hero, 10, 1, Some(goblin))
            .expect_err("turn already committed");
        assert!(err.contains("already queued"));
    }

    #[test]
    fn stats_hook_charges_the_actor() {
        struct Exhausting;
        impl EffectEvaluator for Exhausting {
            fn use_action(
                &self,
                _script: &str,
                _args: &mut EffectArgs,
                result: &mut ActionResult,
            ) -> bool {
                result.target.set_int(AttributeId::HEALTH, -5);
                true
            }

            fn stats(
                &self,
                _script: &str,
                _args: &mut EffectArgs,
                result: &mut ActionResult,
            ) -> bool {
                result.source.set_int(AttributeId::MANA, -2);
                true
            }
        }

        let (mut registry, data, mut battle, hero, goblin) = battle_fixture();
        {
            let entity = registry.get_mut(hero).expect("resident");
            entity.attributes.set_int(AttributeId::MAX_MANA, 30);
            entity.attributes.set_int(AttributeId::MANA, 30);
        }
        let mut events = Vec::new();
        battle.update(2.0, &mut registry, &data, &Exhausting, &mut events);
        battle
            .set_action(&registry, hero, 10, 1, Some(goblin))
            .expect("queued");
        battle.update(4.0, &mut registry, &data, &Exhausting, &mut events);
        assert_eq!(
            registry.get(hero).expect("resident").mana(),
            28,
            "one turn should have drained two mana"
        );
    }

    #[test]
    fn late_observer_reads_the_snapshot() {
        let (mut registry, data, mut battle, _hero, goblin) = battle_fixture();
        let mut events = Vec::new();
        battle.update(2.0, &mut registry, &data, &EffectTable::new(), &mut events);

        let mut writer = PacketWriter::new();
        battle.serialize(&mut writer);
        let mut reader = PacketReader::new(writer.as_slice());
        let summary = BattleSummary::unserialize(&mut reader).expect("well formed");
        assert_eq!(summary.id, battle.id);
        assert_eq!(summary.state, BattleState::Active.as_u8());
        assert_eq!(summary.members.len(), 2);
        let foe = summary
            .members
            .iter()
            .find(|member| member.id == goblin)
            .expect("goblin listed");
        assert_eq!(foe.side, 1);
        assert!(!foe.fled);
    }

    #[test]
    fn same_seed_replays_identically() {
        let run = || {
            let (mut registry, data, mut battle, hero, goblin) = battle_fixture();
            let table = EffectTable::new();
            let mut events = Vec::new();
            battle.update(2.0, &mut registry, &data, &table, &mut events);
            let mut guard = 0;
            while !battle.is_over() && guard < 200 {
                let _ = battle.set_action(&registry, hero, 10, 1, Some(goblin));
                battle.update(1.0, &mut registry, &data, &table, &mut events);
                guard += 1;
            }
            (
                guard,
                registry.get(hero).map(|entity| entity.health()),
            )
        };
        assert_eq!(run(), run());
    }
}
