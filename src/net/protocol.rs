use crate::combat::battle::Battle;
use crate::entities::action::ActionResult;
use crate::entities::inventory::Slot;
use crate::entities::statchange::StatChange;
use crate::net::packet::{PacketReader, PacketWriter};
use crate::world::registry::NetworkId;

/// One-byte discriminator leading every message in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    AccountLogin = 0,
    AccountLogout = 1,
    CharacterList = 2,
    CharacterCreate = 3,
    CharacterPlay = 4,
    CharacterDelete = 5,
    InventoryMove = 6,
    InventorySplit = 7,
    InventoryUse = 8,
    InventoryGold = 9,
    InventoryUpdate = 10,
    TradeRequest = 11,
    TradeCancel = 12,
    TradeItem = 13,
    TradeGold = 14,
    TradeAccept = 15,
    TradeExchange = 16,
    BattleJoin = 17,
    BattleLeave = 18,
    BattleStart = 19,
    BattleAction = 20,
    BattleTurnResults = 21,
    BattleEnd = 22,
    StatChange = 23,
    VendorExchange = 24,
    TraderExchange = 25,
    ObjectCreate = 26,
    ObjectDelete = 27,
    ObjectUpdate = 28,
    ObjectPosition = 29,
    Chat = 30,
    SkillAdjust = 31,
    MinigameSeed = 32,
    MinigamePay = 33,
    MinigamePrize = 34,
}

impl PacketType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        use PacketType::*;
        Some(match value {
            0 => AccountLogin,
            1 => AccountLogout,
            2 => CharacterList,
            3 => CharacterCreate,
            4 => CharacterPlay,
            5 => CharacterDelete,
            6 => InventoryMove,
            7 => InventorySplit,
            8 => InventoryUse,
            9 => InventoryGold,
            10 => InventoryUpdate,
            11 => TradeRequest,
            12 => TradeCancel,
            13 => TradeItem,
            14 => TradeGold,
            15 => TradeAccept,
            16 => TradeExchange,
            17 => BattleJoin,
            18 => BattleLeave,
            19 => BattleStart,
            20 => BattleAction,
            21 => BattleTurnResults,
            22 => BattleEnd,
            23 => StatChange,
            24 => VendorExchange,
            25 => TraderExchange,
            26 => ObjectCreate,
            27 => ObjectDelete,
            28 => ObjectUpdate,
            29 => ObjectPosition,
            30 => Chat,
            31 => SkillAdjust,
            32 => MinigameSeed,
            33 => MinigamePay,
            34 => MinigamePrize,
            _ => return None,
        })
    }
}

fn message(packet_type: PacketType) -> PacketWriter {
    let mut writer = PacketWriter::with_capacity(64);
    writer.write_u8(packet_type.as_u8());
    writer
}

// Client -> server parse helpers. Each returns None for malformed
// input; the caller drops the packet.

pub fn parse_login(reader: &mut PacketReader) -> Option<(String, String)> {
    let account = reader.read_string()?;
    let password = reader.read_string()?;
    Some((account, password))
}

pub fn parse_inventory_move(reader: &mut PacketReader) -> Option<(Slot, Slot)> {
    let from = Slot::unserialize(reader)?;
    let to = Slot::unserialize(reader)?;
    Some((from, to))
}

pub fn parse_inventory_split(reader: &mut PacketReader) -> Option<(Slot, u16)> {
    let slot = Slot::unserialize(reader)?;
    let count = reader.read_u16_le()?;
    Some((slot, count))
}

pub fn parse_inventory_use(reader: &mut PacketReader) -> Option<Slot> {
    Slot::unserialize(reader)
}

pub fn parse_battle_action(reader: &mut PacketReader) -> Option<(u32, i32, Option<NetworkId>)> {
    let usable_id = reader.read_u32_le()?;
    let level = i32::from(reader.read_u8()?);
    let has_target = reader.read_bool()?;
    let target = if has_target {
        Some(NetworkId(reader.read_u16_le()?))
    } else {
        None
    };
    Some((usable_id, level, target))
}

pub fn parse_vendor_exchange(reader: &mut PacketReader) -> Option<(bool, u32, u16)> {
    let buying = reader.read_bool()?;
    let item_id = reader.read_u32_le()?;
    let count = reader.read_u16_le()?;
    Some((buying, item_id, count))
}

pub fn parse_trader_exchange(reader: &mut PacketReader) -> Option<u32> {
    reader.read_u32_le()
}

pub fn parse_skill_adjust(reader: &mut PacketReader) -> Option<(u32, i8)> {
    let skill_id = reader.read_u32_le()?;
    let delta = reader.read_u8()? as i8;
    Some((skill_id, delta))
}

pub fn parse_chat(reader: &mut PacketReader) -> Option<String> {
    reader.read_string()
}

// Server -> client builders.

pub fn build_login_response(accepted: bool, session_key: &str) -> Vec<u8> {
    let mut writer = message(PacketType::AccountLogin);
    writer.write_bool(accepted);
    writer.write_string(session_key);
    writer.into_vec()
}

pub fn build_stat_change(change: &StatChange) -> Result<Vec<u8>, String> {
    let mut writer = message(PacketType::StatChange);
    change.serialize(&mut writer)?;
    Ok(writer.into_vec())
}

pub fn build_action_result(result: &ActionResult) -> Result<Vec<u8>, String> {
    let mut writer = message(PacketType::BattleTurnResults);
    result.serialize(&mut writer)?;
    Ok(writer.into_vec())
}

pub fn build_battle_start(battle: &Battle) -> Vec<u8> {
    let mut writer = message(PacketType::BattleStart);
    battle.serialize(&mut writer);
    writer.into_vec()
}

pub fn build_battle_end(battle_id: NetworkId, winning_side: Option<u8>) -> Vec<u8> {
    let mut writer = message(PacketType::BattleEnd);
    writer.write_u16_le(battle_id.0);
    match winning_side {
        Some(side) => {
            writer.write_bool(true);
            writer.write_u8(side);
        }
        None => writer.write_bool(false),
    }
    writer.into_vec()
}

pub fn build_battle_leave(id: NetworkId) -> Vec<u8> {
    let mut writer = message(PacketType::BattleLeave);
    writer.write_u16_le(id.0);
    writer.into_vec()
}

pub fn build_object_delete(id: NetworkId) -> Vec<u8> {
    let mut writer = message(PacketType::ObjectDelete);
    writer.write_u16_le(id.0);
    writer.into_vec()
}

pub fn build_chat(speaker: &str, text: &str) -> Vec<u8> {
    let mut writer = message(PacketType::Chat);
    writer.write_string(speaker);
    writer.write_string(text);
    writer.into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_discriminator_roundtrips() {
        for value in 0..=34u8 {
            let packet_type = PacketType::from_u8(value).expect("known discriminator");
            assert_eq!(packet_type.as_u8(), value);
        }
        assert_eq!(PacketType::from_u8(200), None);
    }

    #[test]
    fn battle_action_roundtrip() {
        let mut writer = PacketWriter::new();
        writer.write_u32_le(11);
        writer.write_u8(3);
        writer.write_bool(true);
        writer.write_u16_le(42);
        let mut reader = PacketReader::new(writer.as_slice());
        assert_eq!(
            parse_battle_action(&mut reader),
            Some((11, 3, Some(NetworkId(42))))
        );
    }

    #[test]
    fn truncated_parse_is_none() {
        let mut reader = PacketReader::new(&[0x01]);
        assert_eq!(parse_battle_action(&mut reader), None);
    }
}
