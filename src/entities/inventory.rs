use crate::entities::item::{EquipCategory, EquipCell, ItemProps};
use crate::net::packet::{PacketReader, PacketWriter};
use crate::world::game_data::{GameData, Trader};
use serde::{Deserialize, Serialize};

pub const NO_SLOT_INDEX: u8 = 0xff;

/// Bags a character owns. Bag type plus index is the only slot
/// addressing scheme; nothing identifies a slot by raw offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BagType {
    None,
    Equipment,
    Inventory,
    Trade,
    Keys,
    Stash,
}

impl BagType {
    pub fn capacity(self) -> usize {
        match self {
            BagType::None => 0,
            BagType::Equipment => EquipCell::COUNT,
            BagType::Inventory => 24,
            BagType::Trade => 8,
            BagType::Keys => 16,
            BagType::Stash => 32,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            BagType::None => 0,
            BagType::Equipment => 1,
            BagType::Inventory => 2,
            BagType::Trade => 3,
            BagType::Keys => 4,
            BagType::Stash => 5,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(BagType::None),
            1 => Some(BagType::Equipment),
            2 => Some(BagType::Inventory),
            3 => Some(BagType::Trade),
            4 => Some(BagType::Keys),
            5 => Some(BagType::Stash),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub bag: BagType,
    pub index: usize,
}

impl Slot {
    pub const NONE: Slot = Slot {
        bag: BagType::None,
        index: 0,
    };

    pub fn new(bag: BagType, index: usize) -> Self {
        Self { bag, index }
    }

    pub fn is_none(self) -> bool {
        self.bag == BagType::None
    }

    pub fn serialize(self, writer: &mut PacketWriter) {
        writer.write_u8(self.bag.as_u8());
        if self.is_none() {
            writer.write_u8(NO_SLOT_INDEX);
        } else {
            writer.write_u8(self.index.min(NO_SLOT_INDEX as usize - 1) as u8);
        }
    }

    pub fn unserialize(reader: &mut PacketReader) -> Option<Slot> {
        let bag = BagType::from_u8(reader.read_u8()?)?;
        let index = reader.read_u8()?;
        if bag == BagType::None || index == NO_SLOT_INDEX {
            return Some(Slot::NONE);
        }
        if (index as usize) >= bag.capacity() {
            return None;
        }
        Some(Slot::new(bag, index as usize))
    }
}

/// One slot's contents: an item reference, its upgrade level and a
/// stack count. Empty slots hold no item and a zero count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySlot {
    pub item: Option<u32>,
    pub upgrades: u8,
    pub count: u16,
}

impl InventorySlot {
    pub fn filled(item: u32, upgrades: u8, count: u16) -> Self {
        Self {
            item: Some(item),
            upgrades,
            count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.item.is_none() || self.count == 0
    }

    pub fn clear(&mut self) {
        *self = InventorySlot::default();
    }

    fn matches(&self, item: u32, upgrades: u8) -> bool {
        self.item == Some(item) && self.upgrades == upgrades
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bag {
    pub bag_type: BagType,
    pub slots: Vec<InventorySlot>,
}

impl Bag {
    fn new(bag_type: BagType) -> Self {
        Self {
            bag_type,
            slots: vec![InventorySlot::default(); bag_type.capacity()],
        }
    }
}

const BAG_ORDER: [BagType; 5] = [
    BagType::Equipment,
    BagType::Inventory,
    BagType::Trade,
    BagType::Keys,
    BagType::Stash,
];

/// All bags of one character plus every operation that may touch
/// them. Mutating operations either complete fully or leave the bags
/// untouched and return an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inventory {
    bags: Vec<Bag>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

impl Inventory {
    pub fn new() -> Self {
        Self {
            bags: BAG_ORDER.iter().map(|bag| Bag::new(*bag)).collect(),
        }
    }

    pub fn bag(&self, bag_type: BagType) -> Option<&Bag> {
        self.bags.iter().find(|bag| bag.bag_type == bag_type)
    }

    fn bag_mut(&mut self, bag_type: BagType) -> Option<&mut Bag> {
        self.bags.iter_mut().find(|bag| bag.bag_type == bag_type)
    }

    pub fn slot(&self, slot: Slot) -> Option<&InventorySlot> {
        self.bag(slot.bag)?.slots.get(slot.index)
    }

    fn slot_mut(&mut self, slot: Slot) -> Option<&mut InventorySlot> {
        self.bag_mut(slot.bag)?.slots.get_mut(slot.index)
    }

    /// Total held count of an item across the bags a character can
    /// draw from directly (equipment, inventory, keys).
    pub fn count_item(&self, item_id: u32) -> u32 {
        [BagType::Equipment, BagType::Inventory, BagType::Keys]
            .iter()
            .filter_map(|bag_type| self.bag(*bag_type))
            .flat_map(|bag| &bag.slots)
            .filter(|slot| slot.item == Some(item_id))
            .map(|slot| u32::from(slot.count))
            .sum()
    }

    fn home_bag(props: &ItemProps) -> BagType {
        if props.key {
            BagType::Keys
        } else {
            BagType::Inventory
        }
    }

    /// Whether the item may be equipped into the cell right now,
    /// including hand exclusivity against the other hand's content.
    fn equip_allowed(&self, data: &GameData, props: &ItemProps, cell: EquipCell) -> bool {
        if !props.fits_cell(cell) {
            return false;
        }
        let hand_category = |cell: EquipCell| -> Option<EquipCategory> {
            self.slot(Slot::new(BagType::Equipment, cell as usize))
                .and_then(|slot| slot.item)
                .and_then(|item| data.item_props(item))
                .and_then(|props| props.category)
        };
        match cell {
            EquipCell::Hand1 if props.category == Some(EquipCategory::TwoHandedWeapon) => {
                hand_category(EquipCell::Hand2) != Some(EquipCategory::Shield)
                    && self
                        .slot(Slot::new(BagType::Equipment, EquipCell::Hand2 as usize))
                        .map(|slot| slot.is_empty())
                        .unwrap_or(true)
            }
            EquipCell::Hand2 => hand_category(EquipCell::Hand1) != Some(EquipCategory::TwoHandedWeapon),
            _ => true,
        }
    }

    /// Best slot for one incoming stack: an empty fitting equipment
    /// cell for a single equippable, then an existing stack with room,
    /// then the first empty slot of the item's home bag.
    pub fn find_slot_for_item(
        &self,
        data: &GameData,
        item_id: u32,
        upgrades: u8,
        count: u16,
    ) -> Option<Slot> {
        let props = data.item_props(item_id)?;
        if props.category.is_some() && count == 1 {
            for index in 0..EquipCell::COUNT {
                let cell = EquipCell::from_index(index)?;
                let slot = Slot::new(BagType::Equipment, index);
                let empty = self.slot(slot).map(|s| s.is_empty()).unwrap_or(false);
                if empty && self.equip_allowed(data, props, cell) {
                    return Some(slot);
                }
            }
        }

        let bag_type = Self::home_bag(props);
        let bag = self.bag(bag_type)?;
        if props.is_stackable() {
            for (index, slot) in bag.slots.iter().enumerate() {
                if slot.matches(item_id, upgrades)
                    && slot.count.saturating_add(count) <= props.max_stack
                {
                    return Some(Slot::new(bag_type, index));
                }
            }
        }
        bag.slots
            .iter()
            .position(|slot| slot.is_empty())
            .map(|index| Slot::new(bag_type, index))
    }

    /// Adds a batch of one item. All or nothing: if the full count
    /// does not fit, no slot changes and the caller gets an error.
    pub fn add_item(
        &mut self,
        data: &GameData,
        item_id: u32,
        upgrades: u8,
        count: u16,
    ) -> Result<Vec<Slot>, String> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let props = data
            .item_props(item_id)
            .ok_or_else(|| format!("cannot add unknown item {}", item_id))?;

        let mut remaining = count;
        let mut placements: Vec<(Slot, u16)> = Vec::new();

        // Single equippables may land straight in an open cell.
        if props.category.is_some() && !props.is_stackable() {
            for index in 0..EquipCell::COUNT {
                if remaining == 0 {
                    break;
                }
                let Some(cell) = EquipCell::from_index(index) else {
                    break;
                };
                let slot = Slot::new(BagType::Equipment, index);
                let empty = self.slot(slot).map(|s| s.is_empty()).unwrap_or(false);
                if empty && self.equip_allowed(data, props, cell) {
                    placements.push((slot, 1));
                    remaining -= 1;
                }
            }
        }

        let bag_type = Self::home_bag(props);
        let bag = self
            .bag(bag_type)
            .ok_or_else(|| "inventory bag missing".to_string())?;

        if props.is_stackable() {
            for (index, slot) in bag.slots.iter().enumerate() {
                if remaining == 0 {
                    break;
                }
                if slot.matches(item_id, upgrades) && slot.count < props.max_stack {
                    let room = props.max_stack - slot.count;
                    let take = room.min(remaining);
                    placements.push((Slot::new(bag_type, index), take));
                    remaining -= take;
                }
            }
        }
        for (index, slot) in bag.slots.iter().enumerate() {
            if remaining == 0 {
                break;
            }
            if slot.is_empty() {
                let take = props.max_stack.max(1).min(remaining);
                placements.push((Slot::new(bag_type, index), take));
                remaining -= take;
            }
        }

        if remaining > 0 {
            return Err(format!("no room for {} x item {}", count, item_id));
        }

        for (slot, take) in &placements {
            let target = self
                .slot_mut(*slot)
                .ok_or_else(|| "planned slot vanished".to_string())?;
            if target.is_empty() {
                *target = InventorySlot::filled(item_id, upgrades, *take);
            } else {
                target.count += take;
            }
        }
        Ok(placements.into_iter().map(|(slot, _)| slot).collect())
    }

    /// Whether the item sitting at `from` is allowed to sit at `to`.
    /// One direction only; `move_item` checks both.
    pub fn can_swap(&self, data: &GameData, from: Slot, to: Slot) -> bool {
        let Some(source) = self.slot(from) else {
            return false;
        };
        let Some(item_id) = source.item else {
            return false;
        };
        let Some(props) = data.item_props(item_id) else {
            return false;
        };
        match to.bag {
            BagType::None => false,
            BagType::Equipment => match EquipCell::from_index(to.index) {
                Some(cell) => self.equip_allowed(data, props, cell),
                None => false,
            },
            BagType::Trade => props.tradable,
            BagType::Keys => props.key,
            BagType::Inventory | BagType::Stash => !props.key,
        }
    }

    /// Moves or swaps between two slots. Identical stacks merge, with
    /// any spill-back staying in the source slot.
    pub fn move_item(&mut self, data: &GameData, from: Slot, to: Slot) -> Result<Vec<Slot>, String> {
        if from == to {
            return Err("source and destination are the same slot".to_string());
        }
        let source = *self
            .slot(from)
            .ok_or_else(|| "bad source slot".to_string())?;
        let dest = *self.slot(to).ok_or_else(|| "bad destination slot".to_string())?;
        let item_id = source.item.ok_or_else(|| "source slot is empty".to_string())?;
        let props = data
            .item_props(item_id)
            .ok_or_else(|| format!("source slot holds unknown item {}", item_id))?;

        if !self.can_swap(data, from, to) {
            return Err("item cannot go there".to_string());
        }

        if props.is_stackable() && dest.matches(item_id, source.upgrades) {
            let room = props.max_stack.saturating_sub(dest.count);
            let moved = room.min(source.count);
            if moved == 0 {
                return Err("destination stack is full".to_string());
            }
            if let Some(slot) = self.slot_mut(to) {
                slot.count += moved;
            }
            if let Some(slot) = self.slot_mut(from) {
                slot.count -= moved;
                if slot.count == 0 {
                    slot.clear();
                }
            }
            return Ok(vec![from, to]);
        }

        if !dest.is_empty() && !self.can_swap(data, to, from) {
            return Err("items cannot trade places".to_string());
        }

        if let Some(slot) = self.slot_mut(from) {
            *slot = dest;
        }
        if let Some(slot) = self.slot_mut(to) {
            *slot = source;
        }
        Ok(vec![from, to])
    }

    /// Splits `count` off a stack into the nearest eligible slot of
    /// the same bag, searching forward from the source with
    /// wrap-around. The source must keep at least one item.
    pub fn split_stack(
        &mut self,
        data: &GameData,
        from: Slot,
        count: u16,
    ) -> Result<(Slot, Slot), String> {
        if count == 0 {
            return Err("cannot split zero items".to_string());
        }
        if !matches!(from.bag, BagType::Inventory | BagType::Stash) {
            return Err("stacks only split inside storage bags".to_string());
        }
        let source = *self
            .slot(from)
            .ok_or_else(|| "bad source slot".to_string())?;
        let item_id = source.item.ok_or_else(|| "source slot is empty".to_string())?;
        let props = data
            .item_props(item_id)
            .ok_or_else(|| format!("source slot holds unknown item {}", item_id))?;
        if !props.is_stackable() {
            return Err("item does not stack".to_string());
        }
        if source.count <= count {
            return Err("split must leave the source stack nonempty".to_string());
        }

        let capacity = from.bag.capacity();
        let mut target = None;
        for offset in 1..capacity {
            let index = (from.index + offset) % capacity;
            let slot = Slot::new(from.bag, index);
            let Some(existing) = self.slot(slot) else {
                continue;
            };
            if existing.is_empty()
                || (existing.matches(item_id, source.upgrades)
                    && existing.count.saturating_add(count) <= props.max_stack)
            {
                target = Some(slot);
                break;
            }
        }
        let target = target.ok_or_else(|| "no slot available for split".to_string())?;

        if let Some(slot) = self.slot_mut(from) {
            slot.count -= count;
        }
        let dest = self
            .slot_mut(target)
            .ok_or_else(|| "split target vanished".to_string())?;
        if dest.is_empty() {
            *dest = InventorySlot::filled(item_id, source.upgrades, count);
        } else {
            dest.count += count;
        }
        Ok((from, target))
    }

    /// Adjusts a stack count in place. Dropping to zero clears the
    /// slot; overflowing the stack limit is an error.
    pub fn update_count(&mut self, data: &GameData, slot: Slot, delta: i32) -> Result<Slot, String> {
        let current = *self.slot(slot).ok_or_else(|| "bad slot".to_string())?;
        let item_id = current.item.ok_or_else(|| "slot is empty".to_string())?;
        let max_stack = data
            .item_props(item_id)
            .map(|props| props.max_stack)
            .unwrap_or(1);
        let next = i32::from(current.count) + delta;
        if next < 0 {
            return Err("stack count cannot go negative".to_string());
        }
        if next > i32::from(max_stack) {
            return Err("stack limit exceeded".to_string());
        }
        let target = self.slot_mut(slot).ok_or_else(|| "bad slot".to_string())?;
        if next == 0 {
            target.clear();
        } else {
            target.count = next as u16;
        }
        Ok(slot)
    }

    /// Removes a total count of one item, draining inventory slots
    /// first, then key slots, then equipment. The drain covers exactly
    /// the bags `count_item` counts, so a passing pre-check always
    /// spends in full. Fails without touching anything if the
    /// character does not hold enough.
    pub fn spend_items(
        &mut self,
        data: &GameData,
        item_id: u32,
        count: u16,
    ) -> Result<Vec<Slot>, String> {
        let _ = data
            .item_props(item_id)
            .ok_or_else(|| format!("cannot spend unknown item {}", item_id))?;
        if self.count_item(item_id) < u32::from(count) {
            return Err(format!("missing {} x item {}", count, item_id));
        }
        let mut remaining = count;
        let mut touched = Vec::new();
        for bag_type in [BagType::Inventory, BagType::Keys, BagType::Equipment] {
            let Some(bag) = self.bag_mut(bag_type) else {
                continue;
            };
            for (index, slot) in bag.slots.iter_mut().enumerate() {
                if remaining == 0 {
                    break;
                }
                if slot.item == Some(item_id) {
                    let take = slot.count.min(remaining);
                    slot.count -= take;
                    remaining -= take;
                    if slot.count == 0 {
                        slot.clear();
                    }
                    touched.push(Slot::new(bag_type, index));
                }
            }
        }
        Ok(touched)
    }

    /// Resolves a trader's exchange against these bags: one slot per
    /// requirement plus a landing slot for the reward. Any unmet
    /// requirement or a full inventory yields no reward slot, which is
    /// the caller's signal that the exchange cannot happen.
    pub fn get_required_item_slots(
        &self,
        data: &GameData,
        trader: &Trader,
    ) -> (Option<Slot>, Vec<Option<Slot>>) {
        let mut required = Vec::with_capacity(trader.required.len());
        let mut all_met = true;
        for requirement in &trader.required {
            let mut found = None;
            'bags: for bag_type in [BagType::Inventory, BagType::Keys, BagType::Equipment] {
                let Some(bag) = self.bag(bag_type) else {
                    continue;
                };
                for (index, slot) in bag.slots.iter().enumerate() {
                    if slot.item == Some(requirement.item) && slot.count >= requirement.count {
                        found = Some(Slot::new(bag_type, index));
                        break 'bags;
                    }
                }
            }
            if found.is_none() {
                all_met = false;
            }
            required.push(found);
        }

        let reward = if all_met {
            self.find_slot_for_item(
                data,
                trader.reward_item,
                trader.reward_upgrades,
                trader.reward_count,
            )
        } else {
            None
        };
        (reward, required)
    }

    /// Performs a trader exchange end to end. The requirement check
    /// runs first so failure leaves the bags untouched.
    pub fn accept_trade(&mut self, data: &GameData, trader: &Trader) -> Result<Vec<Slot>, String> {
        let (reward, _) = self.get_required_item_slots(data, trader);
        if reward.is_none() {
            return Err(format!("requirements for trader '{}' not met", trader.name));
        }
        let mut touched = Vec::new();
        for requirement in &trader.required {
            touched.extend(self.spend_items(data, requirement.item, requirement.count)?);
        }
        touched.extend(self.add_item(
            data,
            trader.reward_item,
            trader.reward_upgrades,
            trader.reward_count,
        )?);
        Ok(touched)
    }

    /// Returns everything parked in the trade bag to its home bag.
    /// Stacks that no longer fit stay behind in the trade bag.
    pub fn move_trade_to_inventory(&mut self, data: &GameData) -> Vec<Slot> {
        let mut touched = Vec::new();
        for index in 0..BagType::Trade.capacity() {
            let slot = Slot::new(BagType::Trade, index);
            let Some(contents) = self.slot(slot).copied() else {
                continue;
            };
            let Some(item_id) = contents.item else {
                continue;
            };
            match self.add_item(data, item_id, contents.upgrades, contents.count) {
                Ok(landed) => {
                    if let Some(source) = self.slot_mut(slot) {
                        source.clear();
                    }
                    touched.push(slot);
                    touched.extend(landed);
                }
                Err(_) => continue,
            }
        }
        touched
    }

    /// Wire layout of one addressed slot: the address, then item id
    /// (zero when empty), upgrade level and count.
    pub fn serialize_slot(&self, slot: Slot, writer: &mut PacketWriter) {
        slot.serialize(writer);
        match self.slot(slot) {
            Some(contents) if !contents.is_empty() => {
                writer.write_u32_le(contents.item.unwrap_or(0));
                writer.write_u8(contents.upgrades);
                writer.write_u16_le(contents.count);
            }
            _ => {
                writer.write_u32_le(0);
                writer.write_u8(0);
                writer.write_u16_le(0);
            }
        }
    }

    pub fn unserialize_slot(reader: &mut PacketReader) -> Option<(Slot, InventorySlot)> {
        let slot = Slot::unserialize(reader)?;
        let item = reader.read_u32_le()?;
        let upgrades = reader.read_u8()?;
        let count = reader.read_u16_le()?;
        let contents = if item == 0 || count == 0 {
            InventorySlot::default()
        } else {
            InventorySlot::filled(item, upgrades, count)
        };
        Some((slot, contents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory_with(data: &GameData, items: &[(u32, u16)]) -> Inventory {
        let mut inventory = Inventory::new();
        for (item, count) in items {
            inventory
                .add_item(data, *item, 0, *count)
                .expect("fixture items fit");
        }
        inventory
    }

    #[test]
    fn add_item_stacks_then_overflows_to_empty_slots() {
        let data = GameData::fixture();
        let mut inventory = inventory_with(&data, &[(2, 90)]);
        let touched = inventory.add_item(&data, 2, 0, 30).expect("room");
        assert_eq!(touched.len(), 2, "tops the stack then opens a second");
        assert_eq!(inventory.count_item(2), 120);
    }

    #[test]
    fn add_item_is_all_or_nothing() {
        let data = GameData::fixture();
        let mut inventory = Inventory::new();
        // First sword equips into a hand cell, the next 24 fill the
        // whole inventory bag.
        for _ in 0..25 {
            inventory.add_item(&data, 1, 0, 1).expect("room");
        }
        let before = inventory.clone();
        let err = inventory.add_item(&data, 2, 0, 2500).expect_err("no room");
        assert!(err.contains("no room"));
        assert_eq!(inventory.count_item(2), 0);
        assert_eq!(inventory.bag(BagType::Inventory).expect("bag").slots, before
            .bag(BagType::Inventory)
            .expect("bag")
            .slots);
    }

    #[test]
    fn keys_live_in_the_key_bag() {
        let data = GameData::fixture();
        let mut inventory = Inventory::new();
        let touched = inventory.add_item(&data, 6, 0, 1).expect("room");
        assert_eq!(touched, vec![Slot::new(BagType::Keys, 0)]);
        assert!(!inventory.can_swap(&data, Slot::new(BagType::Keys, 0), Slot::new(BagType::Inventory, 0)));
    }

    #[test]
    fn equippable_lands_in_open_cell() {
        let data = GameData::fixture();
        let mut inventory = Inventory::new();
        let touched = inventory.add_item(&data, 1, 0, 1).expect("room");
        assert_eq!(
            touched,
            vec![Slot::new(BagType::Equipment, EquipCell::Hand1 as usize)]
        );
    }

    #[test]
    fn two_handed_weapon_excludes_shield() {
        let data = GameData::fixture();
        let mut inventory = Inventory::new();
        inventory.add_item(&data, 4, 0, 1).expect("shield equips");
        // Shield occupies Hand2, so the greatsword cannot equip and
        // falls back to the inventory bag.
        let touched = inventory.add_item(&data, 5, 0, 1).expect("room");
        assert_eq!(touched, vec![Slot::new(BagType::Inventory, 0)]);
        let err = inventory
            .move_item(
                &data,
                Slot::new(BagType::Inventory, 0),
                Slot::new(BagType::Equipment, EquipCell::Hand1 as usize),
            )
            .expect_err("blocked by shield");
        assert!(err.contains("cannot go there"));
    }

    #[test]
    fn shield_blocked_by_two_handed_weapon() {
        let data = GameData::fixture();
        let mut inventory = Inventory::new();
        inventory.add_item(&data, 5, 0, 1).expect("greatsword equips");
        let touched = inventory.add_item(&data, 4, 0, 1).expect("room");
        assert_eq!(touched, vec![Slot::new(BagType::Inventory, 0)]);
    }

    #[test]
    fn move_there_and_back_restores_slots() {
        let data = GameData::fixture();
        let mut inventory = inventory_with(&data, &[(2, 12)]);
        let a = Slot::new(BagType::Inventory, 0);
        let b = Slot::new(BagType::Inventory, 7);
        let before = inventory.clone();

        inventory.move_item(&data, a, b).expect("move out");
        assert!(inventory.slot(a).expect("slot").is_empty());
        assert_eq!(inventory.slot(b), before.slot(a));

        inventory.move_item(&data, b, a).expect("move back");
        assert_eq!(inventory.slot(a), before.slot(a));
        assert!(inventory.slot(b).expect("slot").is_empty());
    }

    #[test]
    fn merge_spills_back_to_source() {
        let data = GameData::fixture();
        let mut inventory = Inventory::new();
        inventory.add_item(&data, 2, 0, 60).expect("room");
        inventory
            .split_stack(&data, Slot::new(BagType::Inventory, 0), 20)
            .expect("split");
        // 40 in slot 0, 20 in slot 1. Fill slot 1 to 90 and merge 40
        // into it: only 10 fits.
        inventory
            .update_count(&data, Slot::new(BagType::Inventory, 1), 70)
            .expect("within stack limit");
        inventory
            .move_item(
                &data,
                Slot::new(BagType::Inventory, 0),
                Slot::new(BagType::Inventory, 1),
            )
            .expect("partial merge");
        assert_eq!(
            inventory.slot(Slot::new(BagType::Inventory, 0)).expect("slot").count,
            30
        );
        assert_eq!(
            inventory.slot(Slot::new(BagType::Inventory, 1)).expect("slot").count,
            100
        );
    }

    #[test]
    fn split_searches_forward_with_wraparound() {
        let data = GameData::fixture();
        let mut inventory = Inventory::new();
        let capacity = BagType::Inventory.capacity();
        // Occupy every slot with swords except the first, then put
        // the stack in the last slot; the only split target is slot 0,
        // reachable only by wrapping.
        for index in 1..capacity - 1 {
            *inventory
                .slot_mut(Slot::new(BagType::Inventory, index))
                .expect("slot") = InventorySlot::filled(1, 0, 1);
        }
        *inventory
            .slot_mut(Slot::new(BagType::Inventory, capacity - 1))
            .expect("slot") = InventorySlot::filled(2, 0, 10);

        let (source, target) = inventory
            .split_stack(&data, Slot::new(BagType::Inventory, capacity - 1), 4)
            .expect("split");
        assert_eq!(source, Slot::new(BagType::Inventory, capacity - 1));
        assert_eq!(target, Slot::new(BagType::Inventory, 0));
        assert_eq!(inventory.slot(source).expect("slot").count, 6);
        assert_eq!(inventory.slot(target).expect("slot").count, 4);
    }

    #[test]
    fn split_must_leave_source_nonempty() {
        let data = GameData::fixture();
        let mut inventory = inventory_with(&data, &[(2, 5)]);
        let err = inventory
            .split_stack(&data, Slot::new(BagType::Inventory, 0), 5)
            .expect_err("whole stack is not a split");
        assert!(err.contains("nonempty"));
    }

    #[test]
    fn untradable_items_stay_out_of_the_trade_bag() {
        let data = GameData::fixture();
        let mut inventory = inventory_with(&data, &[(3, 1)]);
        let err = inventory
            .move_item(
                &data,
                Slot::new(BagType::Inventory, 0),
                Slot::new(BagType::Trade, 0),
            )
            .expect_err("tome is bound");
        assert!(err.contains("cannot go there"));
    }

    #[test]
    fn spending_reaches_equipped_items() {
        let data = GameData::fixture();
        let mut inventory = Inventory::new();
        let touched = inventory.add_item(&data, 1, 0, 1).expect("sword equips");
        let hand = Slot::new(BagType::Equipment, EquipCell::Hand1 as usize);
        assert_eq!(touched, vec![hand]);

        let touched = inventory.spend_items(&data, 1, 1).expect("held count suffices");
        assert_eq!(touched, vec![hand]);
        assert_eq!(inventory.count_item(1), 0);
        assert!(inventory.slot(hand).expect("slot").is_empty());
    }

    #[test]
    fn cancelled_trade_returns_to_home_bags() {
        let data = GameData::fixture();
        let mut inventory = inventory_with(&data, &[(2, 10)]);
        inventory
            .move_item(
                &data,
                Slot::new(BagType::Inventory, 0),
                Slot::new(BagType::Trade, 0),
            )
            .expect("potions are tradable");
        // Parked stock is out of reach until the trade resolves.
        assert_eq!(inventory.count_item(2), 0);

        let touched = inventory.move_trade_to_inventory(&data);
        assert_eq!(inventory.count_item(2), 10);
        assert!(touched.contains(&Slot::new(BagType::Trade, 0)));
        assert!(inventory
            .slot(Slot::new(BagType::Trade, 0))
            .expect("slot")
            .is_empty());
        assert_eq!(
            inventory.slot(Slot::new(BagType::Inventory, 0)).expect("slot").count,
            10
        );
    }

    #[test]
    fn trader_exchange_spends_and_rewards() {
        let data = GameData::fixture();
        let trader = data.trader(50).expect("fixture trader");
        let mut inventory = inventory_with(&data, &[(2, 3), (6, 1)]);

        let (reward, required) = inventory.get_required_item_slots(&data, trader);
        assert!(reward.is_some());
        assert!(required.iter().all(|slot| slot.is_some()));

        inventory.accept_trade(&data, trader).expect("exchange");
        assert_eq!(inventory.count_item(2), 0);
        assert_eq!(inventory.count_item(6), 0);
        assert_eq!(inventory.count_item(5), 1);
    }

    #[test]
    fn unmet_trader_requirement_voids_the_reward_slot() {
        let data = GameData::fixture();
        let trader = data.trader(50).expect("fixture trader");
        let inventory = inventory_with(&data, &[(2, 2)]);
        let (reward, required) = inventory.get_required_item_slots(&data, trader);
        assert!(reward.is_none());
        assert!(required.iter().any(|slot| slot.is_none()));
    }

    #[test]
    fn slot_wire_roundtrip() {
        let data = GameData::fixture();
        let inventory = inventory_with(&data, &[(2, 12)]);
        let slot = Slot::new(BagType::Inventory, 0);
        let mut writer = PacketWriter::new();
        inventory.serialize_slot(slot, &mut writer);
        let mut reader = PacketReader::new(writer.as_slice());
        let (decoded, contents) = Inventory::unserialize_slot(&mut reader).expect("well-formed");
        assert_eq!(decoded, slot);
        assert_eq!(contents, InventorySlot::filled(2, 0, 12));
    }

    #[test]
    fn none_slot_roundtrip() {
        let mut writer = PacketWriter::new();
        Slot::NONE.serialize(&mut writer);
        let mut reader = PacketReader::new(writer.as_slice());
        assert_eq!(Slot::unserialize(&mut reader), Some(Slot::NONE));
    }
}
