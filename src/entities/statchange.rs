use crate::entities::attributes::{AttributeId, Value, ValueType};
use crate::net::packet::{PacketReader, PacketWriter};
use crate::world::registry::{NetworkId, Registry};

/// Sparse delta against one entity's attribute table. This is the only
/// unit in which attribute changes travel between the simulation, the
/// battle log, and the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatChange {
    pub owner: Option<NetworkId>,
    values: Vec<(AttributeId, Value)>,
}

impl StatChange {
    pub fn new(owner: NetworkId) -> Self {
        Self {
            owner: Some(owner),
            values: Vec::new(),
        }
    }

    pub fn set(&mut self, id: AttributeId, value: Value) {
        match self.values.iter_mut().find(|(existing, _)| *existing == id) {
            Some(entry) => entry.1 = value,
            None => self.values.push((id, value)),
        }
    }

    pub fn set_int(&mut self, id: AttributeId, value: i32) {
        self.set(id, Value::Int(value));
    }

    pub fn get(&self, id: AttributeId) -> Option<Value> {
        self.values
            .iter()
            .find(|(existing, _)| *existing == id)
            .map(|(_, value)| *value)
    }

    pub fn values(&self) -> &[(AttributeId, Value)] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.owner = None;
        self.values.clear();
    }

    /// Wire layout: owner id, value count, then one (rank, type
    /// discriminator, payload) triple per value. A change without an
    /// owner cannot be addressed on the other side, so it fails loudly
    /// rather than serializing garbage.
    pub fn serialize(&self, writer: &mut PacketWriter) -> Result<(), String> {
        let owner = self
            .owner
            .ok_or_else(|| "stat change has no owner".to_string())?;
        if self.values.len() > u8::MAX as usize {
            return Err(format!(
                "stat change for {} carries {} values, limit is {}",
                owner,
                self.values.len(),
                u8::MAX
            ));
        }
        writer.write_u16_le(owner.0);
        writer.write_u8(self.values.len() as u8);
        for (id, value) in &self.values {
            writer.write_u8(id.rank());
            writer.write_u8(value.value_type().discriminator());
            match value {
                Value::Int(v) => writer.write_i32_le(*v),
                Value::Int64(v) => writer.write_i64_le(*v),
                Value::Float(v) => writer.write_f32_le(*v),
                Value::Descriptor(v) => writer.write_u32_le(*v),
            }
        }
        Ok(())
    }

    /// Decodes one change and resolves its owner against the registry.
    /// A well-formed change whose owner already left the world decodes
    /// to `Ok(None)`: the caller drops it, it is not a protocol error.
    /// Malformed ranks or type discriminators are errors.
    pub fn unserialize(
        reader: &mut PacketReader,
        registry: &Registry,
    ) -> Result<Option<StatChange>, String> {
        let owner_id = reader
            .read_u16_le()
            .ok_or_else(|| "stat change truncated before owner id".to_string())?;
        let count = reader
            .read_u8()
            .ok_or_else(|| "stat change truncated before value count".to_string())?;

        let mut values = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let rank = reader
                .read_u8()
                .ok_or_else(|| "stat change truncated in value list".to_string())?;
            let id = AttributeId::from_rank(rank)
                .ok_or_else(|| format!("stat change references unknown attribute rank {}", rank))?;
            let discriminator = reader
                .read_u8()
                .ok_or_else(|| "stat change truncated before value type".to_string())?;
            let value_type = ValueType::from_discriminator(discriminator).ok_or_else(|| {
                format!("stat change carries unknown value type {}", discriminator)
            })?;
            if value_type != id.def().value_type {
                return Err(format!(
                    "stat change type mismatch for '{}': got {:?}, expected {:?}",
                    id.name(),
                    value_type,
                    id.def().value_type
                ));
            }
            let value = match value_type {
                ValueType::Int => Value::Int(
                    reader
                        .read_i32_le()
                        .ok_or_else(|| "stat change truncated in int value".to_string())?,
                ),
                ValueType::Int64 => Value::Int64(
                    reader
                        .read_i64_le()
                        .ok_or_else(|| "stat change truncated in int64 value".to_string())?,
                ),
                ValueType::Float => Value::Float(
                    reader
                        .read_f32_le()
                        .ok_or_else(|| "stat change truncated in float value".to_string())?,
                ),
                ValueType::Descriptor => Value::Descriptor(
                    reader
                        .read_u32_le()
                        .ok_or_else(|| "stat change truncated in descriptor value".to_string())?,
                ),
            };
            values.push((id, value));
        }

        let owner = NetworkId(owner_id);
        if registry.get(owner).is_none() {
            return Ok(None);
        }
        Ok(Some(StatChange {
            owner: Some(owner),
            values,
        }))
    }

    /// Applies every value to the owner's attribute table honoring the
    /// per-attribute update mode, then clamps the resource pools.
    pub fn apply(&self, registry: &mut Registry) -> Result<(), String> {
        let owner = self
            .owner
            .ok_or_else(|| "cannot apply ownerless stat change".to_string())?;
        let entity = registry
            .get_mut(owner)
            .ok_or_else(|| format!("stat change owner {} is not resident", owner))?;
        for (id, value) in &self.values {
            entity.attributes.apply(*id, *value);
        }

        let max_health = entity.attributes.int(AttributeId::MAX_HEALTH);
        let health = entity.attributes.int(AttributeId::HEALTH);
        entity
            .attributes
            .set_int(AttributeId::HEALTH, health.clamp(0, max_health.max(0)));

        let max_mana = entity.attributes.int(AttributeId::MAX_MANA);
        let mana = entity.attributes.int(AttributeId::MANA);
        entity
            .attributes
            .set_int(AttributeId::MANA, mana.clamp(0, max_mana.max(0)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::entity::Entity;
    use crate::world::registry::Registry;

    fn registry_with_fighter() -> (Registry, NetworkId) {
        let mut registry = Registry::new(64);
        let id = registry
            .create(Entity::monster("goblin", 0))
            .expect("network id");
        {
            let entity = registry.get_mut(id).expect("resident entity");
            entity.attributes.set_int(AttributeId::MAX_HEALTH, 100);
            entity.attributes.set_int(AttributeId::HEALTH, 80);
            entity.attributes.set_int(AttributeId::MAX_MANA, 50);
            entity.attributes.set_int(AttributeId::MANA, 50);
        }
        (registry, id)
    }

    #[test]
    fn roundtrip_resolves_owner() {
        let (registry, id) = registry_with_fighter();
        let mut change = StatChange::new(id);
        change.set_int(AttributeId::HEALTH, -25);
        change.set(AttributeId::EXPERIENCE, Value::Int64(120));

        let mut writer = PacketWriter::new();
        change.serialize(&mut writer).expect("serialize");
        let mut reader = PacketReader::new(writer.as_slice());
        let decoded = StatChange::unserialize(&mut reader, &registry)
            .expect("well-formed change")
            .expect("resident owner");
        assert_eq!(decoded, change);
    }

    #[test]
    fn descriptor_values_roundtrip_by_id() {
        let (registry, id) = registry_with_fighter();
        let mut change = StatChange::new(id);
        change.set(AttributeId::BUFF, Value::Descriptor(3));

        let mut writer = PacketWriter::new();
        change.serialize(&mut writer).expect("serialize");
        let mut reader = PacketReader::new(writer.as_slice());
        let decoded = StatChange::unserialize(&mut reader, &registry)
            .expect("well-formed change")
            .expect("resident owner");
        assert_eq!(decoded.get(AttributeId::BUFF), Some(Value::Descriptor(3)));
    }

    #[test]
    fn departed_owner_decodes_to_none() {
        let (registry, id) = registry_with_fighter();
        let mut change = StatChange::new(NetworkId(id.0 + 1));
        change.set_int(AttributeId::HEALTH, -10);
        let mut writer = PacketWriter::new();
        change.serialize(&mut writer).expect("serialize");
        let mut reader = PacketReader::new(writer.as_slice());
        let decoded = StatChange::unserialize(&mut reader, &registry).expect("well-formed change");
        assert!(decoded.is_none());
    }

    #[test]
    fn type_mismatch_is_an_error() {
        let (registry, id) = registry_with_fighter();
        let mut writer = PacketWriter::new();
        writer.write_u16_le(id.0);
        writer.write_u8(1);
        writer.write_u8(AttributeId::HEALTH.rank());
        writer.write_u8(ValueType::Float.discriminator());
        writer.write_f32_le(1.0);
        let mut reader = PacketReader::new(writer.as_slice());
        let err = StatChange::unserialize(&mut reader, &registry).expect_err("mismatched type");
        assert!(err.contains("health"));
    }

    #[test]
    fn ownerless_change_refuses_to_serialize() {
        let change = StatChange::default();
        let mut writer = PacketWriter::new();
        assert!(change.serialize(&mut writer).is_err());
    }

    #[test]
    fn apply_clamps_resource_pools() {
        let (mut registry, id) = registry_with_fighter();
        let mut change = StatChange::new(id);
        change.set_int(AttributeId::HEALTH, -200);
        change.apply(&mut registry).expect("resident owner");
        let entity = registry.get(id).expect("resident entity");
        assert_eq!(entity.attributes.int(AttributeId::HEALTH), 0);

        let mut heal = StatChange::new(id);
        heal.set_int(AttributeId::HEALTH, 500);
        heal.apply(&mut registry).expect("resident owner");
        let entity = registry.get(id).expect("resident entity");
        assert_eq!(entity.attributes.int(AttributeId::HEALTH), 100);
    }
}
