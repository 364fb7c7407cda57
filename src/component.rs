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

//! Component and Bundle traits, component type ids and component sets
//!
//! Components are data attached to entities.
//! Bundles group multiple components for spawning.
//!
//! # Component registry lifecycle
//! Component type ids come from one process-wide [`ComponentRegistry`]. It is
//! created by [`ComponentRegistry::init`] (every `World` constructor calls it),
//! is never reset, and after the first few registrations is only read.

use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::OnceLock;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smallvec::{smallvec, SmallVec};

use crate::archetype::Archetype;
use crate::error::{EcsError, Result};
use crate::storage::{ComponentPool, ErasedPool};

/// Maximum number of components supported by Bundle implementations
pub const MAX_BUNDLE_COMPONENTS: usize = 8;

/// Marker trait for components
///
/// Components must be 'static (no borrowed data)
pub trait Component: 'static + Send + Sync {}

/// Automatically implement Component for all valid types
impl<T: 'static + Send + Sync> Component for T {}

/// Stable process-wide id of a component type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentTypeId(u32);

impl ComponentTypeId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Registration record for one component type
#[derive(Debug, Clone, Copy)]
pub struct ComponentInfo {
    pub id: ComponentTypeId,
    pub type_id: TypeId,
    pub name: &'static str,
    pub size: usize,
    new_pool: fn() -> Box<dyn ErasedPool>,
}

impl ComponentInfo {
    /// Build an empty storage pool for this component type
    pub fn new_pool(&self) -> Box<dyn ErasedPool> {
        (self.new_pool)()
    }
}

fn new_pool<T: Component>() -> Box<dyn ErasedPool> {
    Box::new(ComponentPool::<T>::new())
}

/// Maps Rust types to [`ComponentTypeId`]s and holds their pool factories.
#[derive(Default)]
pub struct ComponentRegistry {
    by_type: FxHashMap<TypeId, ComponentTypeId>,
    infos: Vec<ComponentInfo>,
}

static REGISTRY: OnceLock<RwLock<ComponentRegistry>> = OnceLock::new();

impl ComponentRegistry {
    /// Initialize the process-wide registry. Idempotent.
    pub fn init() -> &'static RwLock<ComponentRegistry> {
        REGISTRY.get_or_init(|| RwLock::new(ComponentRegistry::default()))
    }

    /// Id for `T`, registering it on first use
    pub fn id_of<T: Component>() -> ComponentTypeId {
        let registry = Self::init();
        let type_id = TypeId::of::<T>();

        if let Some(&id) = registry.read().by_type.get(&type_id) {
            return id;
        }

        let mut registry = registry.write();
        // Another thread may have won the race between the two locks
        if let Some(&id) = registry.by_type.get(&type_id) {
            return id;
        }

        let id = ComponentTypeId(registry.infos.len() as u32);
        registry.infos.push(ComponentInfo {
            id,
            type_id,
            name: type_name::<T>(),
            size: std::mem::size_of::<T>(),
            new_pool: new_pool::<T>,
        });
        registry.by_type.insert(type_id, id);
        id
    }

    /// Id for a type if it was already registered
    pub fn lookup(type_id: TypeId) -> Option<ComponentTypeId> {
        Self::init().read().by_type.get(&type_id).copied()
    }

    pub fn info(id: ComponentTypeId) -> Result<ComponentInfo> {
        Self::init()
            .read()
            .infos
            .get(id.index())
            .copied()
            .ok_or(EcsError::UnregisteredComponent(id))
    }

    /// Number of component types registered so far in this process
    pub fn registered_count() -> usize {
        Self::init().read().infos.len()
    }
}

/// Sorted, deduplicated set of component type ids; the identity of an archetype.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ComponentSet {
    ids: SmallVec<[ComponentTypeId; 8]>,
}

impl ComponentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonicalize ids given in any order, dropping duplicates
    pub fn from_ids<I: IntoIterator<Item = ComponentTypeId>>(ids: I) -> Self {
        let mut ids: SmallVec<[ComponentTypeId; 8]> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self { ids }
    }

    pub fn contains(&self, id: ComponentTypeId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    /// Position of `id` in sorted order
    pub fn position(&self, id: ComponentTypeId) -> Option<usize> {
        self.ids.binary_search(&id).ok()
    }

    /// Returns true if every id in `other` is also in `self`
    pub fn is_superset_of(&self, other: &ComponentSet) -> bool {
        if other.len() > self.len() {
            return false;
        }
        // Both sides are sorted, so a single merge pass suffices
        let mut mine = self.ids.iter();
        'outer: for id in other.iter() {
            for candidate in mine.by_ref() {
                if candidate == id {
                    continue 'outer;
                }
                if candidate > id {
                    return false;
                }
            }
            return false;
        }
        true
    }

    /// Returns true if the sets share at least one id
    pub fn intersects(&self, other: &ComponentSet) -> bool {
        other.iter().any(|&id| self.contains(id))
    }

    /// `self ∪ {id}`
    pub fn with(&self, id: ComponentTypeId) -> Self {
        let mut ids = self.ids.clone();
        if let Err(pos) = ids.binary_search(&id) {
            ids.insert(pos, id);
        }
        Self { ids }
    }

    /// `self \ {id}`
    pub fn without(&self, id: ComponentTypeId) -> Self {
        let mut ids = self.ids.clone();
        if let Ok(pos) = ids.binary_search(&id) {
            ids.remove(pos);
        }
        Self { ids }
    }

    pub fn insert(&mut self, id: ComponentTypeId) -> bool {
        match self.ids.binary_search(&id) {
            Ok(_) => false,
            Err(pos) => {
                self.ids.insert(pos, id);
                true
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentTypeId> + '_ {
        self.ids.iter()
    }

    pub fn as_slice(&self) -> &[ComponentTypeId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<ComponentTypeId> for ComponentSet {
    fn from_iter<I: IntoIterator<Item = ComponentTypeId>>(iter: I) -> Self {
        Self::from_ids(iter)
    }
}

/// Bundle of components
///
/// Allows spawning entities with multiple components at once.
pub trait Bundle: Send + Sync + 'static {
    /// Rust type ids of the bundle members in declaration order
    fn type_ids() -> SmallVec<[TypeId; MAX_BUNDLE_COMPONENTS]>
    where
        Self: Sized;

    /// Component type ids of the bundle members, registering them if needed
    fn component_ids() -> SmallVec<[ComponentTypeId; MAX_BUNDLE_COMPONENTS]>
    where
        Self: Sized;

    /// Type name of the first member that appears twice, if any
    fn duplicate() -> Option<&'static str>
    where
        Self: Sized;

    /// Push every member into its column of `archetype`.
    ///
    /// The archetype must hold exactly the bundle's component types.
    fn push_into(self, archetype: &mut Archetype) -> Result<()>;
}

// DO NOT implement Bundle for T: Component
// This conflicts with tuple implementations
// Instead, implement only for tuples

// Macro for tuple Bundle implementations
macro_rules! impl_bundle {
    ($($T:ident),*) => {
        impl<$($T: Component),*> Bundle for ($($T,)*) {
            fn type_ids() -> SmallVec<[TypeId; MAX_BUNDLE_COMPONENTS]> {
                smallvec![$(TypeId::of::<$T>()),*]
            }

            fn component_ids() -> SmallVec<[ComponentTypeId; MAX_BUNDLE_COMPONENTS]> {
                smallvec![$(ComponentRegistry::id_of::<$T>()),*]
            }

            fn duplicate() -> Option<&'static str> {
                let ids = Self::type_ids();
                let names: SmallVec<[&'static str; MAX_BUNDLE_COMPONENTS]> =
                    smallvec![$(type_name::<$T>()),*];
                (1..ids.len())
                    .find(|&i| ids[..i].contains(&ids[i]))
                    .map(|i| names[i])
            }

            #[allow(non_snake_case)]
            fn push_into(self, archetype: &mut Archetype) -> Result<()> {
                let ($($T,)*) = self;
                $(archetype.column_mut::<$T>()?.push($T);)*
                Ok(())
            }
        }
    };
}

// Implement for tuples of 1-8 components
impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);
impl_bundle!(A, B, C, D, E, F, G);
impl_bundle!(A, B, C, D, E, F, G, H);
