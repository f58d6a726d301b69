use crate::entities::attributes::{AttributeId, Value};
use crate::entities::inventory::Inventory;
use crate::world::entity::{Entity, Payload};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotValue {
    Int(i32),
    Int64(i64),
    Float(f32),
    Descriptor(u32),
}

impl From<Value> for SnapshotValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Int(v) => SnapshotValue::Int(v),
            Value::Int64(v) => SnapshotValue::Int64(v),
            Value::Float(v) => SnapshotValue::Float(v),
            Value::Descriptor(v) => SnapshotValue::Descriptor(v),
        }
    }
}

impl From<SnapshotValue> for Value {
    fn from(value: SnapshotValue) -> Self {
        match value {
            SnapshotValue::Int(v) => Value::Int(v),
            SnapshotValue::Int64(v) => Value::Int64(v),
            SnapshotValue::Float(v) => Value::Float(v),
            SnapshotValue::Descriptor(v) => Value::Descriptor(v),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeEntry {
    pub name: String,
    pub value: SnapshotValue,
}

/// Complete saved state of one character, written only after every
/// in-flight delta has been applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterSnapshot {
    pub name: String,
    pub account: String,
    pub attributes: Vec<AttributeEntry>,
    pub known_skills: Vec<u32>,
    pub inventory: Inventory,
}

impl CharacterSnapshot {
    pub fn from_entity(entity: &Entity) -> Result<Self, String> {
        let data = match &entity.payload {
            Payload::Player(data) => data,
            _ => return Err(format!("{} is not a player, nothing to save", entity.name)),
        };
        Ok(Self {
            name: entity.name.clone(),
            account: data.account.clone(),
            attributes: entity
                .attributes
                .iter()
                .map(|(id, value)| AttributeEntry {
                    name: id.name().to_string(),
                    value: value.into(),
                })
                .collect(),
            known_skills: data.known_skills.iter().copied().collect(),
            inventory: data.inventory.clone(),
        })
    }

    pub fn into_entity(self) -> Result<Entity, String> {
        let mut entity = Entity::player(&self.name, &self.account);
        for entry in &self.attributes {
            let id = AttributeId::from_name(&entry.name)?;
            entity.attributes.set(id, entry.value.into());
        }
        let data = entity
            .player_data_mut()
            .ok_or_else(|| "player payload missing".to_string())?;
        data.known_skills = self.known_skills.iter().copied().collect();
        data.inventory = self.inventory;
        Ok(entity)
    }
}

/// On-disk character store: one YAML file per character, a `.bak`
/// written before every overwrite, and a small LRU cache in front of
/// the disk for repeat loads.
pub struct SaveStore {
    dir: PathBuf,
    cache: LruCache<String, CharacterSnapshot>,
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl SaveStore {
    pub fn new(dir: PathBuf, cache_size: usize) -> Result<Self, String> {
        std::fs::create_dir_all(&dir)
            .map_err(|err| format!("save directory create failed: {}", err))?;
        let capacity =
            NonZeroUsize::new(cache_size.max(1)).ok_or_else(|| "bad cache size".to_string())?;
        Ok(Self {
            dir,
            cache: LruCache::new(capacity),
        })
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, String> {
        if !valid_name(name) {
            return Err(format!("invalid character name '{}'", name));
        }
        Ok(self.dir.join(format!("{}.yaml", name)))
    }

    pub fn save_snapshot(&mut self, snapshot: &CharacterSnapshot) -> Result<(), String> {
        let path = self.path_for(&snapshot.name)?;
        let text = serde_yaml::to_string(snapshot)
            .map_err(|err| format!("snapshot encode failed: {}", err))?;
        if path.exists() {
            let backup = path.with_extension("yaml.bak");
            std::fs::rename(&path, &backup)
                .map_err(|err| format!("snapshot backup failed: {}", err))?;
        }
        std::fs::write(&path, text)
            .map_err(|err| format!("snapshot write failed: {}", err))?;
        self.cache.put(snapshot.name.clone(), snapshot.clone());
        Ok(())
    }

    /// A character that was never saved is `Ok(None)`; unreadable or
    /// corrupt files are errors.
    pub fn load_snapshot(&mut self, name: &str) -> Result<Option<CharacterSnapshot>, String> {
        if let Some(snapshot) = self.cache.get(name) {
            return Ok(Some(snapshot.clone()));
        }
        let path = self.path_for(name)?;
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)
            .map_err(|err| format!("snapshot read failed: {}", err))?;
        let snapshot: CharacterSnapshot = serde_yaml::from_str(&text)
            .map_err(|err| format!("snapshot parse failed: {}", err))?;
        self.cache.put(name.to_string(), snapshot.clone());
        Ok(Some(snapshot))
    }

    pub fn delete_snapshot(&mut self, name: &str) -> Result<(), String> {
        let path = self.path_for(name)?;
        self.cache.pop(name);
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|err| format!("snapshot delete failed: {}", err))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::attributes::AttributeId;
    use crate::world::game_data::GameData;
    use std::sync::atomic::{AtomicU32, Ordering};

    static DIR_COUNTER: AtomicU32 = AtomicU32::new(0);

    fn scratch_dir() -> PathBuf {
        let unique = format!(
            "emberweald-store-{}-{}",
            std::process::id(),
            DIR_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        std::env::temp_dir().join(unique)
    }

    fn sample_entity() -> Entity {
        let data = GameData::fixture();
        let mut entity = Entity::player("eira", "eira");
        entity.attributes.set_int(AttributeId::MAX_HEALTH, 120);
        entity.attributes.set_int(AttributeId::HEALTH, 77);
        entity.attributes.set(AttributeId::GOLD, Value::Int64(340));
        let player = entity.player_data_mut().expect("player payload");
        player.known_skills.insert(10);
        player.known_skills.insert(12);
        player.inventory.add_item(&data, 2, 0, 5).expect("room");
        entity
    }

    #[test]
    fn snapshot_roundtrip_preserves_the_character() {
        let mut store = SaveStore::new(scratch_dir(), 8).expect("store");
        let entity = sample_entity();
        let snapshot = CharacterSnapshot::from_entity(&entity).expect("snapshot");
        store.save_snapshot(&snapshot).expect("save");

        // Bypass the cache with a fresh store on the same directory.
        let mut fresh = SaveStore::new(store.dir.clone(), 8).expect("store");
        let loaded = fresh
            .load_snapshot("eira")
            .expect("load")
            .expect("saved character");
        let restored = loaded.into_entity().expect("entity");
        assert_eq!(restored.health(), 77);
        assert_eq!(restored.attributes.int64(AttributeId::GOLD), 340);
        assert!(restored.knows_skill(12));
        assert_eq!(
            restored.inventory().expect("inventory").count_item(2),
            5
        );
    }

    #[test]
    fn overwrite_leaves_a_backup() {
        let mut store = SaveStore::new(scratch_dir(), 8).expect("store");
        let snapshot = CharacterSnapshot::from_entity(&sample_entity()).expect("snapshot");
        store.save_snapshot(&snapshot).expect("first save");
        store.save_snapshot(&snapshot).expect("second save");
        assert!(store.dir.join("eira.yaml").exists());
        assert!(store.dir.join("eira.yaml.bak").exists());
    }

    #[test]
    fn unknown_character_loads_as_none() {
        let mut store = SaveStore::new(scratch_dir(), 8).expect("store");
        assert!(store.load_snapshot("nobody").expect("no error").is_none());
    }

    #[test]
    fn hostile_names_are_rejected() {
        let mut store = SaveStore::new(scratch_dir(), 8).expect("store");
        assert!(store.load_snapshot("../etc/passwd").is_err());
    }

    #[test]
    fn monsters_do_not_snapshot() {
        let entity = Entity::monster("goblin", 100);
        assert!(CharacterSnapshot::from_entity(&entity).is_err());
    }
}
