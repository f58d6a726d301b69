use crate::combat::battle::{Battle, BattleEvent};
use crate::combat::rng::RollStream;
use crate::entities::action::{Action, ActionResult};
use crate::entities::attributes::AttributeId;
use crate::entities::inventory::{BagType, Slot};
use crate::entities::statchange::StatChange;
use crate::entities::usable::{Scope, UseRequest};
use crate::net::packet::{PacketReader, PacketWriter};
use crate::net::protocol::{self, PacketType};
use crate::scripting::effects::{EffectArgs, EffectEvaluator};
use crate::telemetry;
use crate::world::entity::Entity;
use crate::world::game_data::GameData;
use crate::world::registry::{NetworkId, Registry};
use std::collections::HashMap;

/// Messages the simulation wants delivered. The network layer maps
/// recipients to connections; the world only knows network ids.
#[derive(Debug, Clone)]
pub enum Outbound {
    Broadcast(Vec<u8>),
    To(NetworkId, Vec<u8>),
}

/// The authoritative simulation: one registry, the running battles,
/// static data and the effect evaluator. Advanced on a fixed timestep
/// from a single thread; nothing in here locks.
pub struct WorldState {
    pub registry: Registry,
    pub data: GameData,
    battles: HashMap<NetworkId, Battle>,
    evaluator: Box<dyn EffectEvaluator + Send>,
    rng: RollStream,
    timestep: f64,
    accumulator: f64,
    tick: u64,
    outbound: Vec<Outbound>,
}

impl WorldState {
    pub fn new(
        data: GameData,
        evaluator: Box<dyn EffectEvaluator + Send>,
        registry_capacity: usize,
        tick_rate: u32,
        seed: u64,
    ) -> Self {
        Self {
            registry: Registry::new(registry_capacity),
            data,
            battles: HashMap::new(),
            evaluator,
            rng: RollStream::from_seed(seed),
            timestep: 1.0 / f64::from(tick_rate.max(1)),
            accumulator: 0.0,
            tick: 0,
            outbound: Vec::new(),
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn battle_count(&self) -> usize {
        self.battles.len()
    }

    pub fn drain_outbound(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbound)
    }

    /// Fixed-timestep advance: wall-clock time accumulates and the
    /// simulation steps in whole increments, so results do not depend
    /// on how the caller slices time.
    pub fn tick(&mut self, dt: f64) {
        self.accumulator += dt;
        while self.accumulator >= self.timestep {
            self.accumulator -= self.timestep;
            self.step();
        }
    }

    /// One simulation step. Order matters: objects advance, battles
    /// resolve against the advanced state, and only then are deleted
    /// objects reclaimed, so anything addressed this step still
    /// resolves.
    pub fn step(&mut self) {
        self.tick += 1;
        self.registry.update(self.timestep);

        let mut events = Vec::new();
        let ids: Vec<NetworkId> = self.battles.keys().copied().collect();
        let mut level_check = false;
        for id in ids {
            // The battle leaves the map while it borrows the registry.
            let Some(mut battle) = self.battles.remove(&id) else {
                continue;
            };
            battle.update(
                self.timestep,
                &mut self.registry,
                &self.data,
                self.evaluator.as_ref(),
                &mut events,
            );
            if !battle.is_over() {
                self.battles.insert(id, battle);
            }
        }
        for event in events {
            if matches!(event, BattleEvent::Ended { .. } | BattleEvent::Change(_)) {
                level_check = true;
            }
            self.publish_battle_event(event);
        }
        if level_check {
            self.apply_level_ups();
        }

        for id in self.registry.reclaim() {
            self.outbound
                .push(Outbound::Broadcast(protocol::build_object_delete(id)));
        }
    }

    fn publish_battle_event(&mut self, event: BattleEvent) {
        match event {
            BattleEvent::Action(result) => match protocol::build_action_result(&result) {
                Ok(bytes) => self.outbound.push(Outbound::Broadcast(bytes)),
                Err(err) => telemetry::log_error(&format!("turn result encode: {}", err)),
            },
            BattleEvent::Change(change) => match protocol::build_stat_change(&change) {
                Ok(bytes) => self.outbound.push(Outbound::Broadcast(bytes)),
                Err(err) => telemetry::log_error(&format!("stat change encode: {}", err)),
            },
            BattleEvent::Loot { winner, slots } => {
                self.send_inventory_update(winner, &slots);
            }
            BattleEvent::Left(id) => {
                self.outbound
                    .push(Outbound::Broadcast(protocol::build_battle_leave(id)));
            }
            BattleEvent::Ended {
                battle,
                winning_side,
            } => {
                telemetry::log_battle(&format!(
                    "battle {} ended, winning side {:?}",
                    battle, winning_side
                ));
                self.outbound.push(Outbound::Broadcast(protocol::build_battle_end(
                    battle,
                    winning_side,
                )));
            }
        }
    }

    /// Experience thresholds crossed since the last check raise the
    /// character's level row: pools grow, current health/mana refill
    /// to the new maximum.
    fn apply_level_ups(&mut self) {
        let ids: Vec<NetworkId> = self.registry.ids().to_vec();
        for id in ids {
            let Some(entity) = self.registry.get_mut(id) else {
                continue;
            };
            if !entity.is_player() {
                continue;
            }
            let experience = entity.attributes.int64(AttributeId::EXPERIENCE);
            let row = *self.data.level_for_experience(experience);
            if entity.attributes.int(AttributeId::MAX_HEALTH) >= row.health {
                continue;
            }
            entity.attributes.set_int(AttributeId::MAX_HEALTH, row.health);
            entity.attributes.set_int(AttributeId::HEALTH, row.health);
            entity.attributes.set_int(AttributeId::MAX_MANA, row.mana);
            entity.attributes.set_int(AttributeId::MANA, row.mana);
            telemetry::log_game(&format!("{} reached level {}", entity.name, row.level));

            let mut change = StatChange::new(id);
            change.set_int(AttributeId::MAX_HEALTH, row.health);
            change.set_int(AttributeId::MAX_MANA, row.mana);
            if let Ok(bytes) = protocol::build_stat_change(&change) {
                self.outbound.push(Outbound::Broadcast(bytes));
            }
        }
    }

    pub fn spawn_player(&mut self, entity: Entity) -> Result<NetworkId, String> {
        self.registry.create(entity)
    }

    pub fn spawn_monster(&mut self, monster_id: u32) -> Result<NetworkId, String> {
        let entity = self.data.spawn_monster(monster_id)?;
        self.registry.create(entity)
    }

    /// Rolls a zone's encounter table and spawns the result.
    pub fn spawn_encounter(&mut self, zone_id: u32) -> Result<NetworkId, String> {
        let zone = self
            .data
            .zone(zone_id)
            .ok_or_else(|| format!("unknown zone {}", zone_id))?;
        let total: u32 = zone.encounters.iter().map(|encounter| encounter.odds).sum();
        if total == 0 {
            return Err(format!("zone {} has no encounters", zone_id));
        }
        let mut roll = self.rng.roll_range(1, total);
        let mut picked = zone.encounters[0].monster;
        for encounter in &zone.encounters {
            if roll <= encounter.odds {
                picked = encounter.monster;
                break;
            }
            roll -= encounter.odds;
        }
        self.spawn_monster(picked)
    }

    /// Forms a battle between two rosters. Partial failure unwinds:
    /// either every fighter joins or nobody does.
    pub fn start_battle(
        &mut self,
        side0: &[NetworkId],
        side1: &[NetworkId],
    ) -> Result<NetworkId, String> {
        if side0.is_empty() || side1.is_empty() {
            return Err("a battle needs fighters on both sides".to_string());
        }
        let marker = self.registry.create(Entity::battle_marker())?;
        let seed = (u64::from(self.rng.roll_range(1, u32::MAX - 1)) << 32)
            | u64::from(self.rng.roll_range(1, u32::MAX - 1));
        let mut battle = Battle::new(marker, seed);

        let mut joined: Vec<NetworkId> = Vec::new();
        let rosters = [(0u8, side0), (1u8, side1)];
        for (side, roster) in rosters {
            for id in roster {
                if let Err(err) = battle.add_object(&mut self.registry, *id, side) {
                    let mut events = Vec::new();
                    for fighter in joined {
                        battle.remove_object(&mut self.registry, &self.data, fighter, &mut events);
                    }
                    self.registry.mark_deleted(marker);
                    return Err(err);
                }
                joined.push(*id);
            }
        }

        self.outbound
            .push(Outbound::Broadcast(protocol::build_battle_start(&battle)));
        telemetry::log_battle(&format!(
            "battle {} formed, {} vs {}",
            marker,
            side0.len(),
            side1.len()
        ));
        self.battles.insert(marker, battle);
        Ok(marker)
    }

    /// Entry point for one decoded client message. Malformed packets
    /// and stale references are logged and dropped; rule violations go
    /// back to the sender as chat-channel rejections.
    pub fn handle_packet(&mut self, player: NetworkId, bytes: &[u8]) {
        let mut reader = PacketReader::new(bytes);
        let Some(discriminator) = reader.read_u8() else {
            return;
        };
        let Some(packet_type) = PacketType::from_u8(discriminator) else {
            telemetry::log_netload(&format!(
                "{}: unknown packet type {}",
                player, discriminator
            ));
            return;
        };
        match packet_type {
            PacketType::InventoryMove => {
                let Some((from, to)) = protocol::parse_inventory_move(&mut reader) else {
                    return;
                };
                self.with_inventory(player, |world, inventory| {
                    inventory.move_item(&world.data, from, to)
                });
            }
            PacketType::InventorySplit => {
                let Some((slot, count)) = protocol::parse_inventory_split(&mut reader) else {
                    return;
                };
                self.with_inventory(player, |world, inventory| {
                    inventory
                        .split_stack(&world.data, slot, count)
                        .map(|(source, target)| vec![source, target])
                });
            }
            PacketType::InventoryUse => {
                let Some(slot) = protocol::parse_inventory_use(&mut reader) else {
                    return;
                };
                if let Err(err) = self.use_item_from_slot(player, slot) {
                    self.reject(player, &err);
                }
            }
            PacketType::BattleAction => {
                let Some((usable_id, level, target)) = protocol::parse_battle_action(&mut reader)
                else {
                    return;
                };
                let battle_id = self.registry.get(player).and_then(|entity| entity.battle);
                let result = match battle_id.and_then(|id| self.battles.get_mut(&id)) {
                    Some(battle) => {
                        battle.set_action(&self.registry, player, usable_id, level, target)
                    }
                    None => Err("you are not in a battle".to_string()),
                };
                if let Err(err) = result {
                    self.reject(player, &err);
                }
            }
            PacketType::BattleLeave => {
                let Some(battle_id) = self.registry.get(player).and_then(|entity| entity.battle)
                else {
                    telemetry::log_netload(&format!("{}: battle leave outside battle", player));
                    return;
                };
                let mut events = Vec::new();
                let mut finished = false;
                if let Some(battle) = self.battles.get_mut(&battle_id) {
                    battle.remove_object(&mut self.registry, &self.data, player, &mut events);
                    finished = battle.is_over();
                }
                if finished {
                    self.battles.remove(&battle_id);
                }
                for event in events {
                    self.publish_battle_event(event);
                }
            }
            PacketType::TraderExchange => {
                let Some(trader_id) = protocol::parse_trader_exchange(&mut reader) else {
                    return;
                };
                if let Err(err) = self.trader_exchange(player, trader_id) {
                    self.reject(player, &err);
                }
            }
            PacketType::VendorExchange => {
                let Some((buying, item_id, count)) = protocol::parse_vendor_exchange(&mut reader)
                else {
                    return;
                };
                if let Err(err) = self.vendor_exchange(player, buying, item_id, count) {
                    self.reject(player, &err);
                }
            }
            PacketType::SkillAdjust => {
                let Some((skill_id, delta)) = protocol::parse_skill_adjust(&mut reader) else {
                    return;
                };
                if let Err(err) = self.adjust_action_level(player, skill_id, delta) {
                    self.reject(player, &err);
                }
            }
            PacketType::Chat => {
                let Some(text) = protocol::parse_chat(&mut reader) else {
                    return;
                };
                let speaker = self
                    .registry
                    .get(player)
                    .map(|entity| entity.name.clone())
                    .unwrap_or_default();
                self.outbound
                    .push(Outbound::Broadcast(protocol::build_chat(&speaker, &text)));
            }
            _ => {
                telemetry::log_netload(&format!(
                    "{}: unhandled packet type {:?}",
                    player, packet_type
                ));
            }
        }
    }

    fn with_inventory<F>(&mut self, player: NetworkId, op: F)
    where
        F: FnOnce(&WorldInventoryCtx, &mut crate::entities::inventory::Inventory) -> Result<Vec<Slot>, String>,
    {
        // Split the borrow: the inventory comes out of the entity, the
        // game data rides alongside read-only.
        let Some(entity) = self.registry.get_mut(player) else {
            return;
        };
        let ctx = WorldInventoryCtx { data: &self.data };
        let Some(inventory) = entity.inventory_mut() else {
            telemetry::log_netload(&format!("{}: inventory op from non-player", player));
            return;
        };
        match op(&ctx, inventory) {
            Ok(touched) => {
                let mut writer = PacketWriter::with_capacity(8 + touched.len() * 10);
                writer.write_u8(PacketType::InventoryUpdate.as_u8());
                writer.write_u8(touched.len().min(u8::MAX as usize) as u8);
                for slot in touched.iter().take(u8::MAX as usize) {
                    inventory.serialize_slot(*slot, &mut writer);
                }
                self.outbound.push(Outbound::To(player, writer.into_vec()));
            }
            Err(err) => {
                self.reject(player, &err);
            }
        }
    }

    /// Runs the full use pipeline for an item sitting in a bag slot,
    /// outside battle: eligibility, cost, effect, atomic application.
    fn use_item_from_slot(&mut self, player: NetworkId, slot: Slot) -> Result<(), String> {
        let item_id = self
            .registry
            .get(player)
            .and_then(|entity| entity.inventory())
            .and_then(|inventory| inventory.slot(slot))
            .and_then(|contents| contents.item)
            .ok_or_else(|| "that slot is empty".to_string())?;
        let usable = self
            .data
            .usable(item_id)
            .ok_or_else(|| format!("unknown item {}", item_id))?;
        let props = usable.item_props();
        let from_unlock_slot = props.map(|p| p.unlock_skill.is_some()).unwrap_or(false);
        let target = if usable.target_count() > 0 {
            Some(player)
        } else {
            None
        };
        let req = UseRequest {
            usable_id: item_id,
            level: 1,
            source: player,
            target,
            scope: Scope::World,
            from_unlock_slot,
        };
        if !usable.can_use(&req, &self.registry, self.evaluator.as_ref()) {
            return Err(format!("you cannot use {} right now", usable.name));
        }

        let mut result = ActionResult::new(
            Action::new(item_id, 1),
            Scope::World,
            player,
            target,
        );
        {
            let source = self
                .registry
                .get(player)
                .ok_or_else(|| "player left the world".to_string())?;
            let mut args = EffectArgs {
                level: 1,
                duration: usable.duration,
                source,
                target: target.and_then(|id| self.registry.get(id)),
                rng: &mut self.rng,
            };
            usable.apply_cost(self.evaluator.as_ref(), &mut args, &mut result);
            usable.use_action(self.evaluator.as_ref(), &mut args, &mut result);
        }
        if let Some(source) = self.registry.get(player) {
            let (delay, time, cooldown) = usable.attack_times(self.evaluator.as_ref(), source);
            result.attack_delay = delay;
            result.attack_time = time;
            result.cooldown = cooldown;
        }

        let unlock_skill = props.and_then(|p| p.unlock_skill);
        if let Some(skill_id) = unlock_skill {
            result.inventory_cost.push((item_id, 1));

            if let Some(data) = self
                .registry
                .get_mut(player)
                .and_then(|entity| entity.player_data_mut())
            {
                data.known_skills.insert(skill_id);
            }
        }

        if !result.source.is_empty() {
            result.source.apply(&mut self.registry)?;
        }
        if result.target.owner.is_some() && !result.target.is_empty() {
            result.target.apply(&mut self.registry)?;
        }
        let costs = result.inventory_cost.clone();
        for (cost_item, count) in costs {
            self.with_inventory(player, |world, inventory| {
                inventory.spend_items(&world.data, cost_item, count)
            });
        }
        if let Ok(bytes) = protocol::build_action_result(&result) {
            self.outbound.push(Outbound::To(player, bytes));
        }
        Ok(())
    }

    fn trader_exchange(&mut self, player: NetworkId, trader_id: u32) -> Result<(), String> {
        let trader = self
            .data
            .trader(trader_id)
            .ok_or_else(|| format!("unknown trader {}", trader_id))?
            .clone();
        let mut touched_result = Err("no inventory".to_string());
        if let Some(inventory) = self
            .registry
            .get_mut(player)
            .and_then(|entity| entity.inventory_mut())
        {
            touched_result = inventory.accept_trade(&self.data, &trader);
        }
        let touched = touched_result?;
        self.send_inventory_update(player, &touched);
        telemetry::log_game(&format!("{} traded with '{}'", player, trader.name));
        Ok(())
    }

    /// Gold-for-items vendor flow: prices come off the usable table,
    /// sales pay half price.
    fn vendor_exchange(
        &mut self,
        player: NetworkId,
        buying: bool,
        item_id: u32,
        count: u16,
    ) -> Result<(), String> {
        if count == 0 {
            return Err("nothing to exchange".to_string());
        }
        let price = self
            .data
            .usable(item_id)
            .filter(|usable| !usable.is_skill())
            .map(|usable| usable.price)
            .ok_or_else(|| format!("item {} is not for sale", item_id))?;
        let total = price
            .checked_mul(i64::from(count))
            .ok_or_else(|| "price overflow".to_string())?;

        let gold = self
            .registry
            .get(player)
            .map(|entity| entity.attributes.int64(AttributeId::GOLD))
            .ok_or_else(|| "player left the world".to_string())?;

        if buying {
            if gold < total {
                return Err("not enough gold".to_string());
            }
            let mut touched = Err("no inventory".to_string());
            if let Some(inventory) = self
                .registry
                .get_mut(player)
                .and_then(|entity| entity.inventory_mut())
            {
                touched = inventory.add_item(&self.data, item_id, 0, count);
            }
            let touched = touched?;
            self.adjust_gold(player, -total);
            self.send_inventory_update(player, &touched);
        } else {
            let mut touched = Err("no inventory".to_string());
            if let Some(inventory) = self
                .registry
                .get_mut(player)
                .and_then(|entity| entity.inventory_mut())
            {
                touched = inventory.spend_items(&self.data, item_id, count);
            }
            let touched = touched?;
            self.adjust_gold(player, total / 2);
            self.send_inventory_update(player, &touched);
        }
        Ok(())
    }

    fn adjust_gold(&mut self, player: NetworkId, delta: i64) {
        let mut change = StatChange::new(player);
        change.set(AttributeId::GOLD, crate::entities::attributes::Value::Int64(delta));
        if change.apply(&mut self.registry).is_ok() {
            if let Ok(bytes) = protocol::build_stat_change(&change) {
                self.outbound.push(Outbound::To(player, bytes));
            }
        }
    }

    fn send_inventory_update(&mut self, player: NetworkId, touched: &[Slot]) {
        let Some(inventory) = self
            .registry
            .get(player)
            .and_then(|entity| entity.inventory())
        else {
            return;
        };
        let mut writer = PacketWriter::with_capacity(8 + touched.len() * 10);
        writer.write_u8(PacketType::InventoryUpdate.as_u8());
        writer.write_u8(touched.len().min(u8::MAX as usize) as u8);
        for slot in touched.iter().take(u8::MAX as usize) {
            inventory.serialize_slot(*slot, &mut writer);
        }
        self.outbound.push(Outbound::To(player, writer.into_vec()));
    }

    /// Raises or lowers the level an action-bar entry fires at,
    /// clamped to the usable's maximum.
    fn adjust_action_level(
        &mut self,
        player: NetworkId,
        skill_id: u32,
        delta: i8,
    ) -> Result<(), String> {
        let max_level = self
            .data
            .usable(skill_id)
            .map(|usable| usable.max_level)
            .ok_or_else(|| format!("unknown skill {}", skill_id))?;
        let data = self
            .registry
            .get_mut(player)
            .and_then(|entity| entity.player_data_mut())
            .ok_or_else(|| "player left the world".to_string())?;
        if !data.known_skills.contains(&skill_id) {
            return Err("skill not known".to_string());
        }
        for entry in data.action_bar.iter_mut().flatten() {
            if entry.usable_id == skill_id {
                entry.level = (entry.level + i32::from(delta)).clamp(1, max_level);
                return Ok(());
            }
        }
        Err("skill is not on the action bar".to_string())
    }

    fn reject(&mut self, player: NetworkId, reason: &str) {
        self.outbound
            .push(Outbound::To(player, protocol::build_chat("", reason)));
    }
}

struct WorldInventoryCtx<'a> {
    data: &'a GameData,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::effects::EffectTable;

    fn world() -> WorldState {
        WorldState::new(GameData::fixture(), Box::new(EffectTable::new()), 256, 10, 42)
    }

    fn join_player(world: &mut WorldState, name: &str) -> NetworkId {
        let mut entity = Entity::player(name, name);
        entity.attributes.set_int(AttributeId::MAX_HEALTH, 100);
        entity.attributes.set_int(AttributeId::HEALTH, 100);
        entity.attributes.set_int(AttributeId::BATTLE_SPEED, 100);
        entity.attributes.set_int(AttributeId::MIN_DAMAGE, 6);
        entity.attributes.set_int(AttributeId::MAX_DAMAGE, 9);
        let id = world.spawn_player(entity).expect("network id");
        world
            .registry
            .get_mut(id)
            .expect("resident")
            .player_data_mut()
            .expect("player")
            .known_skills
            .insert(10);
        id
    }

    #[test]
    fn fixed_timestep_accumulates() {
        let mut world = world();
        world.tick(0.05);
        assert_eq!(world.tick_count(), 0);
        world.tick(0.06);
        assert_eq!(world.tick_count(), 1);
        world.tick(0.35);
        assert_eq!(world.tick_count(), 4);
    }

    #[test]
    fn battle_lifecycle_through_the_world() {
        let mut world = world();
        let hero = join_player(&mut world, "eira");
        let goblin = world.spawn_monster(100).expect("goblin");
        let battle_id = world.start_battle(&[hero], &[goblin]).expect("battle");
        assert_eq!(world.battle_count(), 1);
        assert!(world.registry.get(battle_id).is_some());

        // Drive the world until the battle resolves.
        let mut guard = 0;
        while world.battle_count() > 0 && guard < 4000 {
            if let Some(battle) = world.battles.get_mut(&battle_id) {
                let _ = battle.set_action(&world.registry, hero, 10, 1, Some(goblin));
            }
            world.tick(0.1);
            guard += 1;
        }
        assert_eq!(world.battle_count(), 0, "battle never resolved");
        assert!(world.registry.get(goblin).is_none(), "corpse reclaimed");
        assert!(world.registry.get(battle_id).is_none(), "marker reclaimed");
        let hero_entity = world.registry.get(hero).expect("resident");
        assert!(hero_entity.attributes.int64(AttributeId::EXPERIENCE) > 0);
        assert!(hero_entity.battle.is_none());
    }

    #[test]
    fn start_battle_unwinds_on_failure() {
        let mut world = world();
        let hero = join_player(&mut world, "eira");
        let goblin = world.spawn_monster(100).expect("goblin");
        world.start_battle(&[hero], &[goblin]).expect("first battle");

        let other = world.spawn_monster(101).expect("wolf");
        let err = world
            .start_battle(&[hero], &[other])
            .expect_err("hero is already fighting");
        assert!(err.contains("already in a battle"));
        assert!(
            world.registry.get(other).expect("resident").battle.is_none(),
            "unwound fighter is free again"
        );
    }

    #[test]
    fn unlock_item_teaches_and_consumes() {
        let mut world = world();
        let hero = join_player(&mut world, "eira");
        {
            let data = &world.data;
            let inventory = world
                .registry
                .get_mut(hero)
                .expect("resident")
                .inventory_mut()
                .expect("inventory");
            inventory.add_item(data, 3, 0, 1).expect("room");
        }
        let slot = Slot::new(BagType::Inventory, 0);
        world.use_item_from_slot(hero, slot).expect("unlock");
        let entity = world.registry.get(hero).expect("resident");
        assert!(entity.knows_skill(11), "fireball learned");
        assert_eq!(entity.inventory().expect("inventory").count_item(3), 0);

        // Second tome would be refused: the skill is already known.
        {
            let data = &world.data;
            let inventory = world
                .registry
                .get_mut(hero)
                .expect("resident")
                .inventory_mut()
                .expect("inventory");
            inventory.add_item(data, 3, 0, 1).expect("room");
        }
        assert!(world.use_item_from_slot(hero, slot).is_err());
    }

    #[test]
    fn consumable_use_heals_and_decrements() {
        let mut world = world();
        let hero = join_player(&mut world, "eira");
        world
            .registry
            .get_mut(hero)
            .expect("resident")
            .attributes
            .set_int(AttributeId::HEALTH, 30);
        {
            let data = &world.data;
            let inventory = world
                .registry
                .get_mut(hero)
                .expect("resident")
                .inventory_mut()
                .expect("inventory");
            inventory.add_item(data, 2, 0, 2).expect("room");
        }
        world
            .use_item_from_slot(hero, Slot::new(BagType::Inventory, 0))
            .expect("drink");
        let entity = world.registry.get(hero).expect("resident");
        assert_eq!(entity.health(), 80);
        assert_eq!(entity.inventory().expect("inventory").count_item(2), 1);
    }

    #[test]
    fn vendor_buy_and_sell_move_gold() {
        let mut world = world();
        let hero = join_player(&mut world, "eira");
        world
            .registry
            .get_mut(hero)
            .expect("resident")
            .attributes
            .set(AttributeId::GOLD, crate::entities::attributes::Value::Int64(100));

        world.vendor_exchange(hero, true, 2, 2).expect("buy potions");
        let entity = world.registry.get(hero).expect("resident");
        assert_eq!(entity.attributes.int64(AttributeId::GOLD), 50);
        assert_eq!(entity.inventory().expect("inventory").count_item(2), 2);

        world.vendor_exchange(hero, false, 2, 2).expect("sell back");
        let entity = world.registry.get(hero).expect("resident");
        assert_eq!(entity.attributes.int64(AttributeId::GOLD), 75);
        assert_eq!(entity.inventory().expect("inventory").count_item(2), 0);

        let err = world
            .vendor_exchange(hero, true, 5, 1000)
            .expect_err("cannot afford a thousand greatswords");
        assert!(err.contains("not enough gold"));
    }

    #[test]
    fn encounter_roll_spawns_from_the_zone_table() {
        let mut world = world();
        let id = world.spawn_encounter(1).expect("zone roll");
        let monster_id = world
            .registry
            .get(id)
            .expect("resident")
            .monster_data()
            .expect("monster payload")
            .monster_id;
        assert!(matches!(monster_id, 100 | 101));
        assert!(world.spawn_encounter(99).is_err());
    }

    #[test]
    fn malformed_packets_are_dropped() {
        let mut world = world();
        let hero = join_player(&mut world, "eira");
        world.handle_packet(hero, &[]);
        world.handle_packet(hero, &[200]);
        world.handle_packet(hero, &[PacketType::BattleAction.as_u8(), 0x01]);
        assert_eq!(world.tick_count(), 0);
    }
}
