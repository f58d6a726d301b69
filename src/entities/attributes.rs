use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Int,
    Int64,
    Float,
    Descriptor,
}

impl ValueType {
    pub fn discriminator(self) -> u8 {
        match self {
            ValueType::Int => 0,
            ValueType::Int64 => 1,
            ValueType::Float => 2,
            ValueType::Descriptor => 3,
        }
    }

    pub fn from_discriminator(value: u8) -> Option<Self> {
        match value {
            0 => Some(ValueType::Int),
            1 => Some(ValueType::Int64),
            2 => Some(ValueType::Float),
            3 => Some(ValueType::Descriptor),
            _ => None,
        }
    }
}

/// A single attribute value. Descriptor values reference a shared
/// descriptor (a buff) by its catalog id, never by address.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i32),
    Int64(i64),
    Float(f32),
    Descriptor(u32),
}

impl Value {
    pub fn value_type(self) -> ValueType {
        match self {
            Value::Int(_) => ValueType::Int,
            Value::Int64(_) => ValueType::Int64,
            Value::Float(_) => ValueType::Float,
            Value::Descriptor(_) => ValueType::Descriptor,
        }
    }

    pub fn as_int(self) -> i32 {
        match self {
            Value::Int(value) => value,
            Value::Int64(value) => value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
            Value::Float(value) => value as i32,
            Value::Descriptor(value) => value as i32,
        }
    }

    pub fn as_int64(self) -> i64 {
        match self {
            Value::Int(value) => i64::from(value),
            Value::Int64(value) => value,
            Value::Float(value) => value as i64,
            Value::Descriptor(value) => i64::from(value),
        }
    }

    pub fn as_float(self) -> f32 {
        match self {
            Value::Int(value) => value as f32,
            Value::Int64(value) => value as f32,
            Value::Float(value) => value,
            Value::Descriptor(value) => value as f32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    Add,
    Set,
    Multiply,
}

#[derive(Debug)]
pub struct AttributeDef {
    pub name: &'static str,
    pub value_type: ValueType,
    pub mode: UpdateMode,
}

/// Attribute identity is positional: the rank of an attribute in this
/// table is stable for the process lifetime and is what goes on the
/// wire instead of the name.
pub const ATTRIBUTES: &[AttributeDef] = &[
    AttributeDef { name: "health", value_type: ValueType::Int, mode: UpdateMode::Add },
    AttributeDef { name: "max_health", value_type: ValueType::Int, mode: UpdateMode::Set },
    AttributeDef { name: "mana", value_type: ValueType::Int, mode: UpdateMode::Add },
    AttributeDef { name: "max_mana", value_type: ValueType::Int, mode: UpdateMode::Set },
    AttributeDef { name: "health_regen", value_type: ValueType::Int, mode: UpdateMode::Set },
    AttributeDef { name: "mana_regen", value_type: ValueType::Int, mode: UpdateMode::Set },
    AttributeDef { name: "battle_speed", value_type: ValueType::Int, mode: UpdateMode::Set },
    AttributeDef { name: "evasion", value_type: ValueType::Int, mode: UpdateMode::Set },
    AttributeDef { name: "hit_chance", value_type: ValueType::Int, mode: UpdateMode::Set },
    AttributeDef { name: "min_damage", value_type: ValueType::Int, mode: UpdateMode::Set },
    AttributeDef { name: "max_damage", value_type: ValueType::Int, mode: UpdateMode::Set },
    AttributeDef { name: "armor", value_type: ValueType::Int, mode: UpdateMode::Set },
    AttributeDef { name: "attack_power", value_type: ValueType::Float, mode: UpdateMode::Multiply },
    AttributeDef { name: "experience", value_type: ValueType::Int64, mode: UpdateMode::Add },
    AttributeDef { name: "gold", value_type: ValueType::Int64, mode: UpdateMode::Add },
    AttributeDef { name: "experience_given", value_type: ValueType::Int, mode: UpdateMode::Set },
    AttributeDef { name: "gold_given", value_type: ValueType::Int, mode: UpdateMode::Set },
    AttributeDef { name: "buff", value_type: ValueType::Descriptor, mode: UpdateMode::Set },
    AttributeDef { name: "buff_duration", value_type: ValueType::Float, mode: UpdateMode::Set },
    AttributeDef { name: "miss", value_type: ValueType::Int, mode: UpdateMode::Set },
    AttributeDef { name: "crit", value_type: ValueType::Int, mode: UpdateMode::Set },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttributeId(u8);

impl AttributeId {
    pub const HEALTH: AttributeId = AttributeId(0);
    pub const MAX_HEALTH: AttributeId = AttributeId(1);
    pub const MANA: AttributeId = AttributeId(2);
    pub const MAX_MANA: AttributeId = AttributeId(3);
    pub const HEALTH_REGEN: AttributeId = AttributeId(4);
    pub const MANA_REGEN: AttributeId = AttributeId(5);
    pub const BATTLE_SPEED: AttributeId = AttributeId(6);
    pub const EVASION: AttributeId = AttributeId(7);
    pub const HIT_CHANCE: AttributeId = AttributeId(8);
    pub const MIN_DAMAGE: AttributeId = AttributeId(9);
    pub const MAX_DAMAGE: AttributeId = AttributeId(10);
    pub const ARMOR: AttributeId = AttributeId(11);
    pub const ATTACK_POWER: AttributeId = AttributeId(12);
    pub const EXPERIENCE: AttributeId = AttributeId(13);
    pub const GOLD: AttributeId = AttributeId(14);
    pub const EXPERIENCE_GIVEN: AttributeId = AttributeId(15);
    pub const GOLD_GIVEN: AttributeId = AttributeId(16);
    pub const BUFF: AttributeId = AttributeId(17);
    pub const BUFF_DURATION: AttributeId = AttributeId(18);
    pub const MISS: AttributeId = AttributeId(19);
    pub const CRIT: AttributeId = AttributeId(20);

    pub fn from_name(name: &str) -> Result<Self, String> {
        ATTRIBUTES
            .iter()
            .position(|def| def.name == name)
            .map(|rank| AttributeId(rank as u8))
            .ok_or_else(|| format!("unknown attribute name '{}'", name))
    }

    pub fn from_rank(rank: u8) -> Option<Self> {
        if (rank as usize) < ATTRIBUTES.len() {
            Some(AttributeId(rank))
        } else {
            None
        }
    }

    pub fn rank(self) -> u8 {
        self.0
    }

    pub fn def(self) -> &'static AttributeDef {
        &ATTRIBUTES[self.0 as usize]
    }

    pub fn name(self) -> &'static str {
        self.def().name
    }
}

/// Typed attribute table for one entity. Missing attributes read as
/// zero of their declared type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeTable {
    values: BTreeMap<u8, Value>,
}

impl AttributeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: AttributeId) -> Value {
        match self.values.get(&id.rank()) {
            Some(value) => *value,
            None => match id.def().value_type {
                ValueType::Int => Value::Int(0),
                ValueType::Int64 => Value::Int64(0),
                ValueType::Float => Value::Float(0.0),
                ValueType::Descriptor => Value::Descriptor(0),
            },
        }
    }

    pub fn int(&self, id: AttributeId) -> i32 {
        self.get(id).as_int()
    }

    pub fn int64(&self, id: AttributeId) -> i64 {
        self.get(id).as_int64()
    }

    pub fn set(&mut self, id: AttributeId, value: Value) {
        self.values.insert(id.rank(), value);
    }

    pub fn set_int(&mut self, id: AttributeId, value: i32) {
        self.set(id, Value::Int(value));
    }

    /// Applies a delta honoring the attribute's declared update mode.
    pub fn apply(&mut self, id: AttributeId, delta: Value) {
        let updated = match id.def().mode {
            UpdateMode::Set => delta,
            UpdateMode::Add => match (self.get(id), delta) {
                (Value::Int(current), value) => Value::Int(current.saturating_add(value.as_int())),
                (Value::Int64(current), value) => {
                    Value::Int64(current.saturating_add(value.as_int64()))
                }
                (Value::Float(current), value) => Value::Float(current + value.as_float()),
                (Value::Descriptor(_), value) => value,
            },
            UpdateMode::Multiply => Value::Float(self.get(id).as_float() * delta.as_float()),
        };
        self.values.insert(id.rank(), updated);
    }

    pub fn iter(&self) -> impl Iterator<Item = (AttributeId, Value)> + '_ {
        self.values
            .iter()
            .filter_map(|(rank, value)| AttributeId::from_rank(*rank).map(|id| (id, *value)))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
