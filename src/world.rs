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

//! World: central entity and archetype storage

use std::any::{type_name, TypeId};
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::archetype::{Archetype, ArchetypeId, ArchetypeRegistry, Transition, EMPTY_ARCHETYPE};
use crate::command::CommandBuffer;
use crate::component::{Bundle, Component, ComponentRegistry, ComponentSet};
use crate::config::WorldConfig;
use crate::entity::{EntityAllocator, EntityId, EntityLocation};
use crate::error::{EcsError, Result};
use crate::query::{Query, QueryFetch, QueryFetchMut, QueryFilter, QueryMut, QueryState};

static NEXT_LAYOUT_ID: AtomicU64 = AtomicU64::new(0);

fn next_layout_id() -> u64 {
    NEXT_LAYOUT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Central ECS world
///
/// Owns the entity slot table and every archetype table. All access is
/// single-writer: mutation needs `&mut World`, reads and queries take `&World`.
/// Dropping the world drops every stored component.
pub struct World {
    entities: EntityAllocator,
    archetypes: ArchetypeRegistry,

    /// Bundle type -> archetype it spawns into
    bundle_archetypes: AHashMap<TypeId, ArchetypeId>,

    /// Changes whenever archetype ids are invalidated, so cached query state can rebind
    layout_id: u64,

    config: WorldConfig,
}

impl World {
    /// Create new empty world
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    pub fn with_config(config: WorldConfig) -> Self {
        ComponentRegistry::init();

        let archetypes = ArchetypeRegistry::new(&config);
        Self {
            entities: EntityAllocator::with_capacity(config.entity_capacity),
            archetypes,
            bundle_archetypes: AHashMap::new(),
            layout_id: next_layout_id(),
            config,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Create an entity with no components
    pub fn create_entity(&mut self) -> EntityId {
        let row = self.archetypes.get(EMPTY_ARCHETYPE).map_or(0, Archetype::len);
        let entity = self
            .entities
            .create(EntityLocation::new(EMPTY_ARCHETYPE, row));
        if let Some(empty) = self.archetypes.get_mut(EMPTY_ARCHETYPE) {
            empty.push_entity(entity);
        }
        entity
    }

    /// Spawn entity with components
    ///
    /// The entity goes straight into the archetype of the bundle instead of
    /// passing through one archetype per component.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> Result<EntityId> {
        #[cfg(feature = "profiling")]
        let _span = info_span!("world.spawn", bundle = type_name::<B>()).entered();

        let archetype_id = match self.bundle_archetypes.get(&TypeId::of::<B>()) {
            Some(&id) => id,
            None => {
                if let Some(name) = B::duplicate() {
                    return Err(EcsError::DuplicateComponent(name));
                }
                let signature = ComponentSet::from_ids(B::component_ids());
                let id = self.archetypes.get_or_create(&signature)?;
                self.bundle_archetypes.insert(TypeId::of::<B>(), id);
                id
            }
        };

        let len = self.archetypes.len();
        let archetype = self
            .archetypes
            .get_mut(archetype_id)
            .ok_or(EcsError::IndexOutOfRange {
                index: archetype_id,
                len,
            })?;

        bundle.push_into(archetype)?;
        let row = archetype.len();
        let entity = self
            .entities
            .create(EntityLocation::new(archetype_id, row));
        archetype.push_entity(entity);
        Ok(entity)
    }

    /// Destroy an entity and drop all of its components
    pub fn destroy_entity(&mut self, entity: EntityId) -> Result<()> {
        self.archetypes.remove_entity(&mut self.entities, entity)?;
        self.entities.destroy(entity)?;
        Ok(())
    }

    /// Check if entity exists
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.is_alive(entity)
    }

    /// Add component to existing entity
    pub fn add_component<T: Component>(&mut self, entity: EntityId, component: T) -> Result<()> {
        let from = self.entities.location(entity)?.archetype_id;
        let type_id = TypeId::of::<T>();

        let current = self.archetype(from)?;
        if current.has_type(type_id) {
            return Err(EcsError::DuplicateComponent(type_name::<T>()));
        }

        let to = match self.archetypes.transition(from, type_id, Transition::Add) {
            Some(to) => to,
            None => {
                let signature = current.signature().with(ComponentRegistry::id_of::<T>());
                let to = self.archetypes.get_or_create(&signature)?;
                self.archetypes
                    .cache_transition(from, type_id, Transition::Add, to);
                to
            }
        };

        self.archetypes
            .move_entity(&mut self.entities, entity, to, Some(type_id), |dst| {
                dst.column_mut::<T>()?.push(component);
                Ok(())
            })?;
        Ok(())
    }

    /// Remove component from entity, dropping the value
    pub fn remove_component<T: Component>(&mut self, entity: EntityId) -> Result<()> {
        let from = self.entities.location(entity)?.archetype_id;
        let type_id = TypeId::of::<T>();

        let current = self.archetype(from)?;
        if !current.has_type(type_id) {
            return Err(EcsError::ComponentNotFound(type_name::<T>()));
        }

        let to = match self.archetypes.transition(from, type_id, Transition::Remove) {
            Some(to) => to,
            None => {
                let signature = current
                    .signature()
                    .without(ComponentRegistry::id_of::<T>());
                let to = self.archetypes.get_or_create(&signature)?;
                self.archetypes
                    .cache_transition(from, type_id, Transition::Remove, to);
                to
            }
        };

        self.archetypes
            .move_entity(&mut self.entities, entity, to, None, |_| Ok(()))?;
        Ok(())
    }

    /// Get component from entity
    pub fn get_component<T: Component>(&self, entity: EntityId) -> Result<&T> {
        let location = self.entities.location(entity)?;
        self.archetype(location.archetype_id)?
            .column::<T>()?
            .get(location.archetype_row)
    }

    /// Get mutable component from entity
    pub fn get_component_mut<T: Component>(&mut self, entity: EntityId) -> Result<&mut T> {
        let location = self.entities.location(entity)?;
        let len = self.archetypes.len();
        self.archetypes
            .get_mut(location.archetype_id)
            .ok_or(EcsError::IndexOutOfRange {
                index: location.archetype_id,
                len,
            })?
            .column_mut::<T>()?
            .get_mut(location.archetype_row)
    }

    /// Check if entity has component
    pub fn has_component<T: Component>(&self, entity: EntityId) -> Result<bool> {
        let location = self.entities.location(entity)?;
        Ok(self
            .archetype(location.archetype_id)?
            .has_type(TypeId::of::<T>()))
    }

    /// Query entities with components
    pub fn query<'w, Q>(&'w self) -> Query<'w, Q>
    where
        Q: QueryFetch<'w>,
    {
        Query::new(self)
    }

    /// Query entities with components mutably
    ///
    /// Fails with [`EcsError::ConflictingAccess`] if `Q` names a component twice.
    pub fn query_mut<'w, Q>(&'w mut self) -> Result<QueryMut<'w, Q>>
    where
        Q: QueryFetchMut<'w>,
    {
        QueryMut::new(self)
    }

    /// Reusable query state for repeated passes
    pub fn query_state<Q: QueryFilter>(&self) -> QueryState<Q> {
        QueryState::new(self)
    }

    /// Run every queued command against this world
    pub fn apply_commands(&mut self, commands: &mut CommandBuffer) -> Result<()> {
        commands.apply(self)
    }

    /// Reserve room for `additional` more entities
    pub fn reserve_entities(&mut self, additional: usize) {
        self.entities.reserve(additional);
        if let Some(empty) = self.archetypes.get_mut(EMPTY_ARCHETYPE) {
            empty.reserve_rows(additional);
        }
    }

    /// Get entity count
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Get archetype count
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Destroy every entity and drop every archetype except the empty one.
    ///
    /// Ids issued before the call stay stale afterwards.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.archetypes.clear();
        self.bundle_archetypes.clear();
        self.layout_id = next_layout_id();
    }

    pub(crate) fn entity_location(&self, entity: EntityId) -> Result<EntityLocation> {
        self.entities.location(entity)
    }

    pub(crate) fn archetypes(&self) -> &ArchetypeRegistry {
        &self.archetypes
    }

    pub(crate) fn archetypes_mut(&mut self) -> &mut ArchetypeRegistry {
        &mut self.archetypes
    }

    pub(crate) fn layout_id(&self) -> u64 {
        self.layout_id
    }

    fn archetype(&self, id: ArchetypeId) -> Result<&Archetype> {
        self.archetypes.get(id).ok_or(EcsError::IndexOutOfRange {
            index: id,
            len: self.archetypes.len(),
        })
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entities.len())
            .field("archetypes", &self.archetypes.len())
            .field("config", &self.config)
            .finish()
    }
}
