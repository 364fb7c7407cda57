// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Entity identifiers, location metadata and the generational slot allocator.

use std::fmt;

use crate::error::{EcsError, Result};

/// Unique entity identifier: a slot index plus the generation the slot had when issued.
///
/// Packs into 64 bits as `generation << 32 | index`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId {
    index: u32,
    generation: u32,
}

impl EntityId {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index in the allocator
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot at issue time
    pub const fn generation(self) -> u32 {
        self.generation
    }

    pub const fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    pub const fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Entity location in archetype (archetype_id, row)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityLocation {
    pub archetype_id: usize,
    pub archetype_row: usize,
}

impl EntityLocation {
    /// Sentinel stored in free slots
    pub const FREE: Self = Self {
        archetype_id: usize::MAX,
        archetype_row: usize::MAX,
    };

    pub const fn new(archetype_id: usize, archetype_row: usize) -> Self {
        Self {
            archetype_id,
            archetype_row,
        }
    }

    pub fn is_free(&self) -> bool {
        *self == Self::FREE
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    generation: u32,
    location: EntityLocation,
}

/// Issues entity ids and maps them to table locations.
///
/// Freed indices are reused LIFO. Every destroy bumps the slot generation with
/// `wrapping_add`; a slot recycled 2^32 times will hand out a generation that an
/// ancient id could match again, which is accepted as out of scope.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    alive: usize,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            alive: 0,
        }
    }

    /// Issue an id whose slot points at `location`.
    ///
    /// # Panics
    /// Panics if more than `u32::MAX` slots would be needed.
    pub fn create(&mut self, location: EntityLocation) -> EntityId {
        self.alive += 1;

        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.location = location;
            return EntityId::new(index, slot.generation);
        }

        let index = u32::try_from(self.slots.len())
            .ok()
            .filter(|&i| i != u32::MAX)
            .unwrap_or_else(|| panic!("Entity index exhaustion: {} slots", self.slots.len()));
        self.slots.push(Slot {
            generation: 0,
            location,
        });
        EntityId::new(index, 0)
    }

    /// Free the slot behind `entity`, returning where the entity lived.
    pub fn destroy(&mut self, entity: EntityId) -> Result<EntityLocation> {
        let slot = self
            .live_slot_mut(entity)
            .ok_or(EcsError::StaleEntity(entity))?;

        let location = slot.location;
        slot.generation = slot.generation.wrapping_add(1);
        slot.location = EntityLocation::FREE;

        self.free_list.push(entity.index);
        self.alive -= 1;
        Ok(location)
    }

    /// Check if an entity is alive
    #[inline]
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.live_slot(entity).is_some()
    }

    /// Current location of a live entity
    #[inline]
    pub fn location(&self, entity: EntityId) -> Result<EntityLocation> {
        self.live_slot(entity)
            .map(|slot| slot.location)
            .ok_or(EcsError::StaleEntity(entity))
    }

    /// Repoint a live entity at a new table row
    pub fn set_location(&mut self, entity: EntityId, location: EntityLocation) -> Result<()> {
        let slot = self
            .live_slot_mut(entity)
            .ok_or(EcsError::StaleEntity(entity))?;
        slot.location = location;
        Ok(())
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.alive
    }

    pub fn is_empty(&self) -> bool {
        self.alive == 0
    }

    /// Number of slots ever allocated (live + free)
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    pub fn reserve(&mut self, additional: usize) {
        let spare = self.free_list.len();
        if additional > spare {
            self.slots.reserve(additional - spare);
        }
    }

    /// Free every live slot. Generations are bumped so previously issued ids stay stale.
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate().rev() {
            if !slot.location.is_free() {
                slot.generation = slot.generation.wrapping_add(1);
                slot.location = EntityLocation::FREE;
                self.free_list.push(index as u32);
            }
        }
        self.alive = 0;
    }

    fn live_slot(&self, entity: EntityId) -> Option<&Slot> {
        self.slots
            .get(entity.index as usize)
            .filter(|slot| slot.generation == entity.generation && !slot.location.is_free())
    }

    fn live_slot_mut(&mut self, entity: EntityId) -> Option<&mut Slot> {
        self.slots
            .get_mut(entity.index as usize)
            .filter(|slot| slot.generation == entity.generation && !slot.location.is_free())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOC: EntityLocation = EntityLocation::new(0, 0);

    #[test]
    fn test_bits_round_trip() {
        let id = EntityId::new(12, 3);
        assert_eq!(id.to_bits(), (3u64 << 32) | 12);
        assert_eq!(EntityId::from_bits(id.to_bits()), id);
    }

    #[test]
    fn test_destroy_bumps_generation_and_reuses_lifo() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.create(LOC);
        let b = alloc.create(LOC);

        alloc.destroy(a).unwrap();
        alloc.destroy(b).unwrap();
        assert!(!alloc.is_alive(a));
        assert_eq!(alloc.free_count(), 2);

        // Most recently freed index comes back first
        let c = alloc.create(LOC);
        assert_eq!(c.index(), b.index());
        assert!(c.generation() > b.generation());
        assert!(!alloc.is_alive(b));
        assert!(alloc.is_alive(c));
    }

    #[test]
    fn test_double_destroy_is_stale() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.create(LOC);
        alloc.destroy(a).unwrap();
        assert_eq!(alloc.destroy(a), Err(EcsError::StaleEntity(a)));
        assert_eq!(alloc.len(), 0);
    }

    #[test]
    fn test_forged_id_on_free_slot_is_not_alive() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.create(LOC);
        alloc.destroy(a).unwrap();

        // Matches the slot's current generation, but the slot is free
        let forged = EntityId::new(a.index(), a.generation() + 1);
        assert!(!alloc.is_alive(forged));
        assert!(alloc.location(forged).is_err());
    }

    #[test]
    fn test_never_issued_index_is_stale() {
        let alloc = EntityAllocator::new();
        let ghost = EntityId::new(99, 0);
        assert!(!alloc.is_alive(ghost));
        assert_eq!(alloc.location(ghost), Err(EcsError::StaleEntity(ghost)));
    }

    #[test]
    fn test_clear_invalidates_everything() {
        let mut alloc = EntityAllocator::new();
        let ids: Vec<_> = (0..4).map(|_| alloc.create(LOC)).collect();
        alloc.clear();

        assert!(alloc.is_empty());
        assert!(ids.iter().all(|&id| !alloc.is_alive(id)));

        // Lowest index is handed out first after a clear
        let fresh = alloc.create(LOC);
        assert_eq!(fresh.index(), 0);
        assert_eq!(fresh.generation(), 1);
    }
}
