//! # Entity Allocator
//!
//! Issues and recycles entity handles and tracks where each live entity's
//! row currently resides.
//!
//! ## Handle layout
//! An [`Entity`] is a packed `u64`: the low 32 bits are a slot index into
//! the allocator's tables, the high 32 bits are the slot's generation at
//! issue time. Destroying an entity bumps the slot generation, so every
//! handle issued before the destroy dereferences to nothing from then on.
//! Slots are recycled LIFO through a free list.
//!
//! ## Invariants
//! - A handle is live iff its slot is marked alive AND its generation
//!   matches the slot's current generation.
//! - `locations[index]` is meaningful only while the slot is alive.
//! - Generations wrap; a handle held across `u32::MAX` destroy cycles of
//!   its slot can alias. That is accepted.

use crate::engine::error::{CapacityError, StaleHandleError};
use crate::engine::types::{
    ArchetypeID, EntityCount, EntityID, GenerationID, IndexID, RowID, INDEX_BITS, INDEX_CAP,
    INDEX_MASK,
};

/// Opaque handle to an entity. Copy it freely; validity is checked at use.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity(pub EntityID);

#[inline]
const fn make_id(index: IndexID, generation: GenerationID) -> EntityID {
    ((generation as EntityID) << INDEX_BITS) | (index as EntityID)
}

#[inline]
const fn split_entity(entity: Entity) -> (IndexID, GenerationID) {
    let id = entity.0;
    let index = (id & INDEX_MASK) as IndexID;
    let generation = (id >> INDEX_BITS) as GenerationID;
    (index, generation)
}

impl Entity {
    /// Slot index half of the handle.
    #[inline]
    pub fn index(self) -> IndexID {
        (self.0 & INDEX_MASK) as IndexID
    }

    /// Generation half of the handle.
    #[inline]
    pub fn generation(self) -> GenerationID {
        (self.0 >> INDEX_BITS) as GenerationID
    }

    /// Both halves at once.
    #[inline]
    pub fn parts(self) -> (IndexID, GenerationID) {
        split_entity(self)
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (index, generation) = split_entity(*self);
        write!(f, "{index}v{generation}")
    }
}

/// Where an entity's row lives right now. Updated on every migration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntityLocation {
    /// Owning archetype.
    pub archetype: ArchetypeID,
    /// Row within that archetype's columns.
    pub row: RowID,
}

/// Slot tables for handle allocation, liveness, and location lookup.
#[derive(Default)]
pub struct Entities {
    generations: Vec<GenerationID>,
    alive: Vec<bool>,
    locations: Vec<EntityLocation>,
    free: Vec<IndexID>,
    live_count: EntityCount,
}

impl Entities {
    /// Creates an empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fresh handle, reusing a free slot if one exists.
    ///
    /// ## Errors
    /// [`CapacityError`] once all `2^32` slot indices are in use at once.
    pub fn create(&mut self) -> Result<Entity, CapacityError> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let next = self.generations.len() as EntityID;
                if next > INDEX_CAP as EntityID {
                    return Err(CapacityError {
                        entities_needed: next + 1,
                        capacity: INDEX_CAP as u64 + 1,
                    });
                }
                self.generations.push(0);
                self.alive.push(false);
                self.locations.push(EntityLocation::default());
                next as IndexID
            }
        };
        let slot = index as usize;
        self.alive[slot] = true;
        self.locations[slot] = EntityLocation::default();
        self.live_count += 1;
        Ok(Entity(make_id(index, self.generations[slot])))
    }

    /// Handle [`create`](Self::create) would issue next, without allocating.
    ///
    /// Validation hooks run against this preview before the entity exists;
    /// the subsequent `create` returns exactly this handle as long as no
    /// allocation happens in between.
    pub fn peek_next(&self) -> Result<Entity, CapacityError> {
        let index = match self.free.last() {
            Some(&index) => index,
            None => {
                let next = self.generations.len() as EntityID;
                if next > INDEX_CAP as EntityID {
                    return Err(CapacityError {
                        entities_needed: next + 1,
                        capacity: INDEX_CAP as u64 + 1,
                    });
                }
                return Ok(Entity(make_id(next as IndexID, 0)));
            }
        };
        Ok(Entity(make_id(index, self.generations[index as usize])))
    }

    /// Retires a handle. Returns `false` if it was already dead, without
    /// touching any state.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        let (index, generation) = entity.parts();
        let slot = index as usize;
        if slot >= self.generations.len()
            || !self.alive[slot]
            || self.generations[slot] != generation
        {
            return false;
        }
        self.alive[slot] = false;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.free.push(index);
        self.live_count -= 1;
        true
    }

    /// Returns `true` if the handle still dereferences to a live entity.
    #[inline]
    pub fn is_alive(&self, entity: Entity) -> bool {
        let (index, generation) = entity.parts();
        let slot = index as usize;
        slot < self.generations.len() && self.alive[slot] && self.generations[slot] == generation
    }

    /// Current storage location of a live entity.
    pub fn location(&self, entity: Entity) -> Result<EntityLocation, StaleHandleError> {
        let (index, generation) = entity.parts();
        let slot = index as usize;
        if slot >= self.generations.len()
            || !self.alive[slot]
            || self.generations[slot] != generation
        {
            return Err(StaleHandleError {
                index,
                generation,
                current: self.generations.get(slot).copied().unwrap_or(0),
            });
        }
        Ok(self.locations[slot])
    }

    /// Records a new location after a spawn or migration. The caller has
    /// already validated the handle.
    #[inline]
    pub(crate) fn set_location(&mut self, entity: Entity, location: EntityLocation) {
        self.locations[entity.index() as usize] = location;
    }

    /// Current live handle occupying `index`, if any.
    pub(crate) fn handle_for(&self, index: IndexID) -> Option<Entity> {
        let slot = index as usize;
        if slot < self.generations.len() && self.alive[slot] {
            Some(Entity(make_id(index, self.generations[slot])))
        } else {
            None
        }
    }

    /// Number of live entities.
    #[inline]
    pub fn live_count(&self) -> EntityCount {
        self.live_count
    }

    /// Number of slots ever allocated, live or free.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.generations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_round_trip_their_parts() {
        let entity = Entity(make_id(42, 7));
        assert_eq!(entity.index(), 42);
        assert_eq!(entity.generation(), 7);
        assert_eq!(entity.parts(), (42, 7));
    }

    #[test]
    fn destroyed_slots_are_recycled_with_new_generation() {
        let mut entities = Entities::new();
        let first = entities.create().unwrap();
        assert!(entities.destroy(first));
        let second = entities.create().unwrap();
        assert_eq!(first.index(), second.index());
        assert_ne!(first.generation(), second.generation());
        assert!(!entities.is_alive(first));
        assert!(entities.is_alive(second));
    }

    #[test]
    fn double_destroy_reports_false() {
        let mut entities = Entities::new();
        let entity = entities.create().unwrap();
        assert!(entities.destroy(entity));
        assert!(!entities.destroy(entity));
        assert_eq!(entities.live_count(), 0);
    }

    #[test]
    fn peek_matches_subsequent_create() {
        let mut entities = Entities::new();
        let preview = entities.peek_next().unwrap();
        let created = entities.create().unwrap();
        assert_eq!(preview, created);

        entities.destroy(created).then_some(()).unwrap();
        let preview = entities.peek_next().unwrap();
        let recycled = entities.create().unwrap();
        assert_eq!(preview, recycled);
    }

    #[test]
    fn stale_location_lookup_reports_generations() {
        let mut entities = Entities::new();
        let entity = entities.create().unwrap();
        entities.destroy(entity);
        let err = entities.location(entity).unwrap_err();
        assert_eq!(err.index, entity.index());
        assert_eq!(err.generation, entity.generation());
        assert_eq!(err.current, entity.generation().wrapping_add(1));
    }
}
