use crate::world::entity::Entity;
use std::fmt;

/// Compact wire identity for a server-side object. Ids are issued by
/// the registry and recycled after release, so they are only
/// meaningful while the object is resident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetworkId(pub u16);

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Slot arena for every live simulation object. Allocation walks a
/// rolling cursor so a freshly released id is not reissued on the very
/// next create, which keeps stale client references from silently
/// binding to a new object.
#[derive(Debug)]
pub struct Registry {
    slots: Vec<Option<Entity>>,
    order: Vec<NetworkId>,
    cursor: usize,
    pending_release: Vec<NetworkId>,
}

impl Registry {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, u16::MAX as usize + 1);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            order: Vec::new(),
            cursor: 0,
            pending_release: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Places the entity at the next free id. Exhaustion is fatal for
    /// the caller to surface; the registry itself stays consistent.
    pub fn create(&mut self, entity: Entity) -> Result<NetworkId, String> {
        let capacity = self.slots.len();
        for probe in 0..capacity {
            let index = (self.cursor + probe) % capacity;
            if self.slots[index].is_none() {
                self.cursor = (index + 1) % capacity;
                let id = NetworkId(index as u16);
                return self.install(id, entity);
            }
        }
        Err("out of network ids".to_string())
    }

    /// Places the entity at a caller-chosen id, used when restoring a
    /// saved world. Fails if the id is taken or out of range.
    pub fn create_with_id(&mut self, id: NetworkId, entity: Entity) -> Result<NetworkId, String> {
        let index = id.0 as usize;
        if index >= self.slots.len() {
            return Err(format!("network id {} exceeds registry capacity", id));
        }
        if self.slots[index].is_some() {
            return Err(format!("network id {} is already taken", id));
        }
        self.install(id, entity)
    }

    fn install(&mut self, id: NetworkId, mut entity: Entity) -> Result<NetworkId, String> {
        entity.id = id;
        entity.deleted = false;
        self.slots[id.0 as usize] = Some(entity);
        self.order.push(id);
        Ok(id)
    }

    pub fn get(&self, id: NetworkId) -> Option<&Entity> {
        self.slots.get(id.0 as usize).and_then(|slot| slot.as_ref())
    }

    pub fn get_mut(&mut self, id: NetworkId) -> Option<&mut Entity> {
        self.slots
            .get_mut(id.0 as usize)
            .and_then(|slot| slot.as_mut())
    }

    /// Live ids in insertion order. Marked-deleted objects stay listed
    /// until the end-of-tick reclaim.
    pub fn ids(&self) -> &[NetworkId] {
        &self.order
    }

    pub fn mark_deleted(&mut self, id: NetworkId) {
        if let Some(entity) = self.get_mut(id) {
            entity.deleted = true;
        }
    }

    /// Per-tick advance. Deleted objects are gathered for release but
    /// remain resolvable so changes addressed to them this tick still
    /// land; `reclaim` runs after everything else has settled.
    pub fn update(&mut self, dt: f64) {
        let ids: Vec<NetworkId> = self.order.clone();
        for id in ids {
            if let Some(entity) = self.get_mut(id) {
                if entity.deleted {
                    continue;
                }
                entity.update(dt);
            }
        }
        for id in &self.order {
            if let Some(entity) = self.get(*id) {
                if entity.deleted && !self.pending_release.contains(id) {
                    self.pending_release.push(*id);
                }
            }
        }
    }

    /// Releases every id gathered by `update`, returning them so the
    /// caller can announce the departures.
    pub fn reclaim(&mut self) -> Vec<NetworkId> {
        let released = std::mem::take(&mut self.pending_release);
        for id in &released {
            self.slots[id.0 as usize] = None;
            self.order.retain(|existing| existing != id);
        }
        released
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.order.clear();
        self.pending_release.clear();
        self.cursor = 0;
    }
}
