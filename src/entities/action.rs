use crate::entities::statchange::StatChange;
use crate::entities::usable::Scope;
use crate::net::packet::PacketWriter;
use crate::world::registry::NetworkId;

/// A usable reference plus the level and duration it resolves at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Action {
    pub usable_id: u32,
    pub level: i32,
    pub duration: f64,
}

impl Action {
    pub fn new(usable_id: u32, level: i32) -> Self {
        Self {
            usable_id,
            level,
            duration: 0.0,
        }
    }
}

/// Everything one resolved action produced. The evaluator fills the
/// stat changes; the pipeline fills the timings and inventory cost and
/// applies the whole thing atomically afterwards.
#[derive(Debug, Clone)]
pub struct ActionResult {
    pub action: Action,
    pub scope: Scope,
    pub source: StatChange,
    pub target: StatChange,
    /// Item id and count pairs to deduct from the source's bags.
    pub inventory_cost: Vec<(u32, u16)>,
    pub attack_delay: f64,
    pub attack_time: f64,
    pub cooldown: f64,
}

impl ActionResult {
    pub fn new(action: Action, scope: Scope, source: NetworkId, target: Option<NetworkId>) -> Self {
        Self {
            action,
            scope,
            source: StatChange::new(source),
            target: match target {
                Some(id) => StatChange::new(id),
                None => StatChange::default(),
            },
            inventory_cost: Vec::new(),
            attack_delay: 0.0,
            attack_time: 0.0,
            cooldown: 0.0,
        }
    }

    /// Broadcast layout: action header, the three resolved timings,
    /// source change, then an optional target change behind a presence
    /// flag.
    pub fn serialize(&self, writer: &mut PacketWriter) -> Result<(), String> {
        writer.write_u32_le(self.action.usable_id);
        writer.write_u8(self.action.level.clamp(0, i32::from(u8::MAX)) as u8);
        writer.write_f32_le(self.attack_delay as f32);
        writer.write_f32_le(self.attack_time as f32);
        writer.write_f32_le(self.cooldown as f32);
        self.source.serialize(writer)?;
        match self.target.owner {
            Some(_) => {
                writer.write_bool(true);
                self.target.serialize(writer)?;
            }
            None => writer.write_bool(false),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::attributes::AttributeId;
    use crate::net::packet::PacketReader;

    #[test]
    fn serialize_marks_missing_target() {
        let result = ActionResult::new(Action::new(7, 1), Scope::World, NetworkId(3), None);
        let mut writer = PacketWriter::new();
        result.serialize(&mut writer).expect("serialize");
        let mut reader = PacketReader::new(writer.as_slice());
        assert_eq!(reader.read_u32_le(), Some(7));
        assert_eq!(reader.read_u8(), Some(1));
        assert_eq!(reader.read_f32_le(), Some(0.0));
        assert_eq!(reader.read_f32_le(), Some(0.0));
        assert_eq!(reader.read_f32_le(), Some(0.0));
        // source change header
        assert_eq!(reader.read_u16_le(), Some(3));
        assert_eq!(reader.read_u8(), Some(0));
        assert_eq!(reader.read_bool(), Some(false));
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn serialize_carries_target_change() {
        let mut result =
            ActionResult::new(Action::new(9, 2), Scope::Battle, NetworkId(1), Some(NetworkId(2)));
        result.target.set_int(AttributeId::HEALTH, -12);
        let mut writer = PacketWriter::new();
        result.serialize(&mut writer).expect("serialize");
        let mut reader = PacketReader::new(writer.as_slice());
        reader.skip(4 + 1 + 12).expect("action header and timings");
        reader.skip(2 + 1).expect("empty source change");
        assert_eq!(reader.read_bool(), Some(true));
        assert_eq!(reader.read_u16_le(), Some(2));
        assert_eq!(reader.read_u8(), Some(1));
    }
}
