use std::collections::BTreeMap;

use entstream_common::{EntityId, EntitySnapshot};

/// Entities currently streamed in for one observer, with the snapshot each
/// was streamed in with.
///
/// An id is present exactly between a delivered stream-in and its matching
/// stream-out. Iteration is in ascending id order.
#[derive(Debug, Clone, Default)]
pub struct Tracker {
    streamed_in: BTreeMap<EntityId, EntitySnapshot>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.streamed_in.contains_key(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&EntitySnapshot> {
        self.streamed_in.get(&id)
    }

    /// Record `entity` as streamed in under `id`, overwriting any prior entry.
    pub fn mark_in(&mut self, id: EntityId, entity: EntitySnapshot) {
        self.streamed_in.insert(id, entity);
    }

    /// Forget `id`, handing back the snapshot for the stream-out payload.
    pub fn mark_out(&mut self, id: EntityId) -> Option<EntitySnapshot> {
        self.streamed_in.remove(&id)
    }

    /// Swap the stored snapshot of an already tracked id. Returns false if
    /// the id is not tracked; untracked ids are never added here.
    pub fn refresh(&mut self, entity: EntitySnapshot) -> bool {
        match self.streamed_in.get_mut(&entity.id) {
            Some(slot) => {
                *slot = entity;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.streamed_in.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streamed_in.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.streamed_in.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntitySnapshot> {
        self.streamed_in.values()
    }
}
