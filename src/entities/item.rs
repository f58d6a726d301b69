use serde::{Deserialize, Serialize};

/// Equip categories accepted by the equipment bag's fixed cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipCategory {
    Helmet,
    Armor,
    Boots,
    OneHandedWeapon,
    TwoHandedWeapon,
    Shield,
    Ring,
    Amulet,
}

/// The equipment bag's cell layout. Cell order is part of the wire
/// format for equipment slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquipCell {
    Head,
    Body,
    Legs,
    Hand1,
    Hand2,
    Ring1,
    Ring2,
    Amulet,
}

impl EquipCell {
    pub const COUNT: usize = 8;

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(EquipCell::Head),
            1 => Some(EquipCell::Body),
            2 => Some(EquipCell::Legs),
            3 => Some(EquipCell::Hand1),
            4 => Some(EquipCell::Hand2),
            5 => Some(EquipCell::Ring1),
            6 => Some(EquipCell::Ring2),
            7 => Some(EquipCell::Amulet),
            _ => None,
        }
    }
}

fn default_max_stack() -> u16 {
    1
}

fn default_tradable() -> bool {
    true
}

/// Static item-side properties of a usable. Skills carry none of
/// these; the tagged kind on `Usable` keeps the two apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemProps {
    #[serde(default)]
    pub category: Option<EquipCategory>,
    #[serde(default)]
    pub consumable: bool,
    #[serde(default)]
    pub key: bool,
    #[serde(default)]
    pub unlock_skill: Option<u32>,
    #[serde(default = "default_tradable")]
    pub tradable: bool,
    #[serde(default = "default_max_stack")]
    pub max_stack: u16,
}

impl Default for ItemProps {
    fn default() -> Self {
        Self {
            category: None,
            consumable: false,
            key: false,
            unlock_skill: None,
            tradable: true,
            max_stack: 1,
        }
    }
}

impl ItemProps {
    pub fn is_stackable(&self) -> bool {
        self.max_stack > 1
    }

    pub fn is_unlockable(&self) -> bool {
        self.unlock_skill.is_some()
    }

    /// Whether this item may sit in the given equipment cell. Hand
    /// exclusivity (two-handed weapon vs shield) is checked by the
    /// inventory engine, which sees both hands.
    pub fn fits_cell(&self, cell: EquipCell) -> bool {
        let Some(category) = self.category else {
            return false;
        };
        match cell {
            EquipCell::Head => category == EquipCategory::Helmet,
            EquipCell::Body => category == EquipCategory::Armor,
            EquipCell::Legs => category == EquipCategory::Boots,
            EquipCell::Hand1 => {
                category == EquipCategory::OneHandedWeapon
                    || category == EquipCategory::TwoHandedWeapon
            }
            EquipCell::Hand2 => category == EquipCategory::Shield,
            EquipCell::Ring1 | EquipCell::Ring2 => category == EquipCategory::Ring,
            EquipCell::Amulet => category == EquipCategory::Amulet,
        }
    }
}
