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

//! Archetype storage with row allocation and removal
//!
//! Each [`Archetype`] is a table: one [`ComponentPool`] per component type in its
//! signature plus an entity column. All columns always have the same length.
//! The [`ArchetypeRegistry`] owns every table, resolves signatures to tables and
//! moves rows between them when components are added or removed.

use std::any::{type_name, TypeId};

use ahash::AHashMap;
use rustc_hash::FxHashMap;

#[cfg(feature = "profiling")]
use tracing::{debug, info_span};

use crate::component::{Component, ComponentRegistry, ComponentSet};
use crate::config::WorldConfig;
use crate::entity::{EntityAllocator, EntityId, EntityLocation};
use crate::error::{EcsError, Result};
use crate::storage::{ComponentPool, ErasedPool};

/// Index of an archetype in its registry
pub type ArchetypeId = usize;

/// The zero-component archetype every new entity starts in
pub const EMPTY_ARCHETYPE: ArchetypeId = 0;

/// Archetype: Structure of Arrays storage
pub struct Archetype {
    id: ArchetypeId,
    signature: ComponentSet,
    entities: Vec<EntityId>,
    /// Ordered like `signature`
    columns: Vec<Box<dyn ErasedPool>>,
    column_indices: FxHashMap<TypeId, usize>,
}

impl Archetype {
    fn new(id: ArchetypeId, signature: ComponentSet, columns: Vec<Box<dyn ErasedPool>>) -> Self {
        let column_indices = columns
            .iter()
            .enumerate()
            .map(|(idx, column)| (column.item_type_id(), idx))
            .collect();

        Self {
            id,
            signature,
            entities: Vec::new(),
            columns,
            column_indices,
        }
    }

    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    /// Get signature
    pub fn signature(&self) -> &ComponentSet {
        &self.signature
    }

    /// Get all entities
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if archetype is empty
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Get column index for a component type
    pub fn column_index(&self, type_id: TypeId) -> Option<usize> {
        self.column_indices.get(&type_id).copied()
    }

    pub fn has_type(&self, type_id: TypeId) -> bool {
        self.column_indices.contains_key(&type_id)
    }

    /// Get column by index
    pub fn column_by_index(&self, index: usize) -> Option<&dyn ErasedPool> {
        self.columns.get(index).map(|column| column.as_ref())
    }

    /// Typed column for `T`
    pub fn column<T: Component>(&self) -> Result<&ComponentPool<T>> {
        self.column_index(TypeId::of::<T>())
            .and_then(|idx| self.columns[idx].downcast_ref::<T>())
            .ok_or(EcsError::ComponentNotFound(type_name::<T>()))
    }

    pub(crate) fn column_mut<T: Component>(&mut self) -> Result<&mut ComponentPool<T>> {
        let idx = self
            .column_index(TypeId::of::<T>())
            .ok_or(EcsError::ComponentNotFound(type_name::<T>()))?;
        self.columns[idx]
            .downcast_mut::<T>()
            .ok_or(EcsError::ComponentNotFound(type_name::<T>()))
    }

    /// Entity column plus disjoint mutable access to every component column
    pub(crate) fn split_mut(
        &mut self,
    ) -> (
        &[EntityId],
        &FxHashMap<TypeId, usize>,
        &mut [Box<dyn ErasedPool>],
    ) {
        (&self.entities, &self.column_indices, &mut self.columns)
    }

    /// Append the entity once every column has received its value for the new row
    pub(crate) fn push_entity(&mut self, entity: EntityId) -> usize {
        let row = self.entities.len();
        self.entities.push(entity);
        debug_assert!(self.rows_consistent(), "BUG: column lengths diverged");
        row
    }

    /// Remove row and return entity that was swapped in
    ///
    /// Returns Some(entity) if another entity was swapped into this row.
    pub(crate) fn remove_row(&mut self, row: usize) -> Result<Option<EntityId>> {
        if row >= self.entities.len() {
            return Err(EcsError::IndexOutOfRange {
                index: row,
                len: self.entities.len(),
            });
        }

        for column in &mut self.columns {
            column.swap_remove_drop(row)?;
        }
        self.entities.swap_remove(row);

        // If we swapped someone in, return their entity so we can update their location
        Ok(self.entities.get(row).copied())
    }

    /// Reserve space for additional rows
    pub fn reserve_rows(&mut self, additional: usize) {
        self.entities.reserve(additional);
        for column in &mut self.columns {
            column.reserve(additional);
        }
    }

    fn rows_consistent(&self) -> bool {
        self.columns
            .iter()
            .all(|column| column.len() == self.entities.len())
    }
}

impl std::fmt::Debug for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.columns.iter().map(|c| c.item_type_name()).collect();
        f.debug_struct("Archetype")
            .field("id", &self.id)
            .field("components", &names)
            .field("len", &self.entities.len())
            .finish()
    }
}

/// Direction of a cached archetype transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Add,
    Remove,
}

/// Owns every archetype table of a world
pub struct ArchetypeRegistry {
    /// All archetypes; ids are indices and never change
    archetypes: Vec<Archetype>,

    /// Maps component signatures to archetype indices
    index: AHashMap<ComponentSet, ArchetypeId>,

    /// Cache for archetype transitions when adding/removing components
    transitions: AHashMap<(ArchetypeId, TypeId, Transition), ArchetypeId>,

    rows_per_archetype: usize,
    max_archetypes: usize,
}

impl ArchetypeRegistry {
    pub fn new(config: &WorldConfig) -> Self {
        let mut registry = Self {
            archetypes: Vec::with_capacity(config.archetype_capacity),
            index: AHashMap::with_capacity(config.archetype_capacity),
            transitions: AHashMap::with_capacity(config.archetype_capacity * 2),
            rows_per_archetype: config.rows_per_archetype,
            max_archetypes: config.max_archetypes.max(1),
        };
        registry.push_empty();
        registry
    }

    fn push_empty(&mut self) {
        let mut empty = Archetype::new(EMPTY_ARCHETYPE, ComponentSet::new(), Vec::new());
        empty.reserve_rows(self.rows_per_archetype);
        self.archetypes.push(empty);
        self.index.insert(ComponentSet::new(), EMPTY_ARCHETYPE);
    }

    /// Resolve a signature to its archetype, creating the table on first use.
    ///
    /// `ComponentSet` is canonical (sorted, deduplicated), so `{A, B}` and
    /// `{B, A}` always resolve to the same id.
    pub fn get_or_create(&mut self, signature: &ComponentSet) -> Result<ArchetypeId> {
        if let Some(&id) = self.index.get(signature) {
            return Ok(id);
        }

        if self.archetypes.len() >= self.max_archetypes {
            return Err(EcsError::ArchetypeLimitExceeded(self.max_archetypes));
        }

        #[cfg(feature = "profiling")]
        let _span = info_span!("archetype.create", components = signature.len()).entered();

        let mut columns = Vec::with_capacity(signature.len());
        for &component in signature.iter() {
            let mut column = ComponentRegistry::info(component)?.new_pool();
            column.reserve(self.rows_per_archetype);
            columns.push(column);
        }

        let id = self.archetypes.len();
        let mut archetype = Archetype::new(id, signature.clone(), columns);
        archetype.entities.reserve(self.rows_per_archetype);

        #[cfg(feature = "profiling")]
        debug!(archetype = id, signature = ?archetype, "created archetype");

        // Push archetype FIRST to ensure it exists
        self.archetypes.push(archetype);
        self.index.insert(signature.clone(), id);
        Ok(id)
    }

    /// Archetype id for a signature, if it exists
    pub fn find(&self, signature: &ComponentSet) -> Option<ArchetypeId> {
        self.index.get(signature).copied()
    }

    pub fn transition(
        &self,
        from: ArchetypeId,
        component: TypeId,
        kind: Transition,
    ) -> Option<ArchetypeId> {
        self.transitions.get(&(from, component, kind)).copied()
    }

    pub fn cache_transition(
        &mut self,
        from: ArchetypeId,
        component: TypeId,
        kind: Transition,
        to: ArchetypeId,
    ) {
        self.transitions.insert((from, component, kind), to);
    }

    /// Relocate `entity` into archetype `to`.
    ///
    /// Columns present in both tables are moved value by value, columns only in
    /// the source are dropped, and `inserted` names the one column only in the
    /// destination, which `write` must push exactly one value into.
    ///
    /// Everything that can go wrong is checked before the first value moves; a
    /// rejected move returns [`EcsError::MoveFailed`] with the entity untouched.
    pub(crate) fn move_entity<F>(
        &mut self,
        entities: &mut EntityAllocator,
        entity: EntityId,
        to: ArchetypeId,
        inserted: Option<TypeId>,
        write: F,
    ) -> Result<EntityLocation>
    where
        F: FnOnce(&mut Archetype) -> Result<()>,
    {
        let from_loc = entities.location(entity)?;
        self.validate_move(entity, from_loc, to, inserted)?;

        #[cfg(feature = "profiling")]
        let _span = info_span!("archetype.move_entity", from = from_loc.archetype_id, to).entered();

        let from = from_loc.archetype_id;
        let row = from_loc.archetype_row;
        let (src, dst) = pair_mut(&mut self.archetypes, from, to);

        for (column, component) in src.columns.iter_mut().zip(src.signature.iter()) {
            match dst.signature.position(*component) {
                Some(idx) => column.move_row_into(row, dst.columns[idx].as_mut())?,
                None => column.swap_remove_drop(row)?,
            }
        }
        write(dst)?;

        let new_row = dst.push_entity(entity);
        src.entities.swap_remove(row);
        debug_assert!(src.rows_consistent(), "BUG: source columns diverged");

        if let Some(&swapped) = src.entities.get(row) {
            entities.set_location(swapped, EntityLocation::new(from, row))?;
        }

        let location = EntityLocation::new(to, new_row);
        entities.set_location(entity, location)?;
        Ok(location)
    }

    fn validate_move(
        &self,
        entity: EntityId,
        from_loc: EntityLocation,
        to: ArchetypeId,
        inserted: Option<TypeId>,
    ) -> Result<()> {
        let fail = |reason: String| -> Result<()> { Err(EcsError::MoveFailed(reason)) };

        if from_loc.archetype_id == to {
            return fail(format!("{entity} is already in archetype {to}"));
        }
        let Some(src) = self.archetypes.get(from_loc.archetype_id) else {
            return fail(format!("source archetype {} does not exist", from_loc.archetype_id));
        };
        let Some(dst) = self.archetypes.get(to) else {
            return fail(format!("destination archetype {to} does not exist"));
        };

        let row = from_loc.archetype_row;
        if src.entities.get(row) != Some(&entity) {
            return fail(format!(
                "slot of {entity} points at row {row} of archetype {}, which holds another entity",
                src.id
            ));
        }
        if !src.rows_consistent() {
            return fail(format!("archetype {} has columns of unequal length", src.id));
        }

        let mut inserted_covered = false;
        for (dst_column, component) in dst.columns.iter().zip(dst.signature.iter()) {
            match src.signature.position(*component) {
                Some(idx) => {
                    if src.columns[idx].item_type_id() != dst_column.item_type_id() {
                        return fail(format!(
                            "column type mismatch for {}",
                            dst_column.item_type_name()
                        ));
                    }
                }
                None if Some(dst_column.item_type_id()) == inserted => inserted_covered = true,
                None => {
                    return fail(format!(
                        "no value supplied for {}",
                        dst_column.item_type_name()
                    ));
                }
            }
        }

        if inserted.is_some() && !inserted_covered {
            return fail("inserted component is not exclusive to the destination".to_string());
        }
        Ok(())
    }

    /// Swap-remove `entity`'s row and repoint whichever entity filled the hole.
    ///
    /// The entity's slot itself is left for the caller to free.
    pub(crate) fn remove_entity(
        &mut self,
        entities: &mut EntityAllocator,
        entity: EntityId,
    ) -> Result<EntityLocation> {
        let location = entities.location(entity)?;
        let len = self.archetypes.len();
        let archetype = self
            .archetypes
            .get_mut(location.archetype_id)
            .ok_or(EcsError::IndexOutOfRange {
                index: location.archetype_id,
                len,
            })?;

        if archetype.entities.get(location.archetype_row) != Some(&entity) {
            return Err(EcsError::MoveFailed(format!(
                "slot of {entity} does not match its table row"
            )));
        }

        if let Some(swapped) = archetype.remove_row(location.archetype_row)? {
            entities.set_location(
                swapped,
                EntityLocation::new(location.archetype_id, location.archetype_row),
            )?;
        }
        Ok(location)
    }

    /// Ids of archetypes whose signature satisfies `matches`, ascending
    pub fn matching<'a, P>(&'a self, mut matches: P) -> impl Iterator<Item = ArchetypeId> + 'a
    where
        P: FnMut(&ComponentSet) -> bool + 'a,
    {
        self.archetypes
            .iter()
            .filter(move |archetype| matches(&archetype.signature))
            .map(|archetype| archetype.id)
    }

    /// Get archetype by ID
    pub fn get(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: ArchetypeId) -> Option<&mut Archetype> {
        self.archetypes.get_mut(id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Archetype> {
        self.archetypes.iter()
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Archetype] {
        &mut self.archetypes
    }

    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    /// Drop every table and recreate only the empty archetype
    pub(crate) fn clear(&mut self) {
        self.archetypes.clear();
        self.index.clear();
        self.transitions.clear();
        self.push_empty();
    }
}

/// Mutable access to two distinct archetypes
fn pair_mut(
    archetypes: &mut [Archetype],
    a: ArchetypeId,
    b: ArchetypeId,
) -> (&mut Archetype, &mut Archetype) {
    debug_assert_ne!(a, b);
    if a < b {
        let (left, right) = archetypes.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = archetypes.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
