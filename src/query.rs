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

//! Query system with archetype filtering
//!
//! Type-safe component queries with automatic archetype matching. An archetype
//! matches when its signature is a superset of the components the query
//! requires (and shares none of its `Without` filters). Matching archetypes are
//! visited in ascending id order, rows in ascending order within each.
//!
//! ```
//! use simply_ecs::prelude::*;
//!
//! #[derive(Debug, PartialEq)]
//! struct Position(f32);
//! struct Velocity(f32);
//!
//! let mut world = World::new();
//! world.spawn((Position(0.0), Velocity(1.0))).unwrap();
//! world.spawn((Position(5.0),)).unwrap();
//!
//! for (_entity, (pos, vel)) in world.query_mut::<(&mut Position, &Velocity)>().unwrap() {
//!     pos.0 += vel.0;
//! }
//! let total: f32 = world.query::<&Position>().iter().map(|(_, p)| p.0).sum();
//! assert_eq!(total, 6.0);
//! ```
//!
//! # Structural changes while iterating
//! [`Query`] borrows the world shared and [`QueryMut`] borrows it exclusively,
//! so creating, destroying or reshaping entities in the middle of a pass does
//! not compile. Queue such changes in a
//! [`CommandBuffer`](crate::command::CommandBuffer) and apply it afterwards.

use std::any::{type_name, TypeId};
use std::marker::PhantomData;

#[cfg(feature = "profiling")]
use tracing::info_span;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::archetype::{Archetype, ArchetypeId, ArchetypeRegistry};
use crate::component::{Component, ComponentRegistry, ComponentSet};
use crate::entity::EntityId;
use crate::error::{EcsError, Result};
use crate::storage::{ComponentPool, ErasedPool};
use crate::world::World;

const MAX_FILTER_COMPONENTS: usize = 8;

/// Components a query reads, writes, requires or excludes
#[derive(Debug, Clone, Default)]
pub struct QueryAccess {
    required: ComponentSet,
    excluded: ComponentSet,
    reads: SmallVec<[(TypeId, &'static str); MAX_FILTER_COMPONENTS]>,
    writes: SmallVec<[(TypeId, &'static str); MAX_FILTER_COMPONENTS]>,
}

impl QueryAccess {
    /// Collect the access declared by `Q`
    pub fn of<Q: QueryFilter>() -> Self {
        let mut access = Self::default();
        Q::register(&mut access);
        access
    }

    pub fn require<T: Component>(&mut self) {
        self.required.insert(ComponentRegistry::id_of::<T>());
    }

    pub fn exclude<T: Component>(&mut self) {
        self.excluded.insert(ComponentRegistry::id_of::<T>());
    }

    pub fn read<T: Component>(&mut self) {
        self.require::<T>();
        self.reads.push((TypeId::of::<T>(), type_name::<T>()));
    }

    pub fn write<T: Component>(&mut self) {
        self.require::<T>();
        self.writes.push((TypeId::of::<T>(), type_name::<T>()));
    }

    pub fn required(&self) -> &ComponentSet {
        &self.required
    }

    pub fn excluded(&self) -> &ComponentSet {
        &self.excluded
    }

    /// Set-containment test against an archetype signature
    pub fn matches(&self, signature: &ComponentSet) -> bool {
        signature.is_superset_of(&self.required) && !signature.intersects(&self.excluded)
    }

    /// Every fetched column must be distinct when columns are borrowed mutably
    pub fn validate_exclusive(&self) -> Result<()> {
        let mut seen: SmallVec<[TypeId; MAX_FILTER_COMPONENTS]> = SmallVec::new();
        for &(type_id, name) in self.writes.iter().chain(self.reads.iter()) {
            if seen.contains(&type_id) {
                return Err(EcsError::ConflictingAccess(name));
            }
            seen.push(type_id);
        }
        Ok(())
    }
}

/// Query filter trait for type-level archetype matching
pub trait QueryFilter {
    /// Declare the components this filter touches
    fn register(access: &mut QueryAccess);
}

/// Trait for fetching component data (immutable)
pub trait QueryFetch<'w>: QueryFilter {
    /// The type of data returned by the query
    type Item;
    /// Per-archetype cursor over the fetched columns
    type State;

    /// Prepare to fetch from an archetype
    fn prepare(archetype: &'w Archetype) -> Option<Self::State>;

    /// Fetch the next row
    fn fetch(state: &mut Self::State) -> Option<Self::Item>;
}

/// Trait for fetching component data (mutable)
pub trait QueryFetchMut<'w>: QueryFilter {
    type Item;
    type State;

    /// Claim the columns this fetch needs
    fn prepare(columns: &mut ColumnClaims<'w>) -> Option<Self::State>;

    fn fetch(state: &mut Self::State) -> Option<Self::Item>;
}

/// Hands out each component column of one archetype at most once
pub struct ColumnClaims<'w> {
    indices: &'w FxHashMap<TypeId, usize>,
    columns: SmallVec<[Option<&'w mut Box<dyn ErasedPool>>; MAX_FILTER_COMPONENTS]>,
}

impl<'w> ColumnClaims<'w> {
    fn new(indices: &'w FxHashMap<TypeId, usize>, columns: &'w mut [Box<dyn ErasedPool>]) -> Self {
        Self {
            indices,
            columns: columns.iter_mut().map(Some).collect(),
        }
    }

    /// Take the column of `T`; `None` if absent or already claimed
    pub fn claim<T: Component>(&mut self) -> Option<&'w mut ComponentPool<T>> {
        let idx = *self.indices.get(&TypeId::of::<T>())?;
        let column = self.columns.get_mut(idx)?.take()?;
        column.downcast_mut::<T>()
    }
}

impl<T: Component> QueryFilter for &T {
    fn register(access: &mut QueryAccess) {
        access.read::<T>();
    }
}

impl<T: Component> QueryFilter for &mut T {
    fn register(access: &mut QueryAccess) {
        access.write::<T>();
    }
}

/// Filter for entities with component T
pub struct With<T>(PhantomData<T>);

impl<T: Component> QueryFilter for With<T> {
    fn register(access: &mut QueryAccess) {
        access.require::<T>();
    }
}

/// Filter for entities without component T
pub struct Without<T>(PhantomData<T>);

impl<T: Component> QueryFilter for Without<T> {
    fn register(access: &mut QueryAccess) {
        access.exclude::<T>();
    }
}

impl<'w, T: Component> QueryFetch<'w> for &'w T {
    type Item = &'w T;
    type State = std::slice::Iter<'w, T>;

    fn prepare(archetype: &'w Archetype) -> Option<Self::State> {
        archetype.column::<T>().ok().map(ComponentPool::iter)
    }

    #[inline]
    fn fetch(state: &mut Self::State) -> Option<Self::Item> {
        state.next()
    }
}

impl<'w, T: Component> QueryFetchMut<'w> for &'w mut T {
    type Item = &'w mut T;
    type State = std::slice::IterMut<'w, T>;

    fn prepare(columns: &mut ColumnClaims<'w>) -> Option<Self::State> {
        columns.claim::<T>().map(ComponentPool::iter_mut)
    }

    #[inline]
    fn fetch(state: &mut Self::State) -> Option<Self::Item> {
        state.next()
    }
}

/// QueryFetchMut for immutable reference - allows mixed mutability tuples
/// Example: `world.query_mut::<(&mut Position, &Velocity)>()`
impl<'w, T: Component> QueryFetchMut<'w> for &'w T {
    type Item = &'w T;
    type State = std::slice::Iter<'w, T>;

    fn prepare(columns: &mut ColumnClaims<'w>) -> Option<Self::State> {
        let column: &'w ComponentPool<T> = columns.claim::<T>()?;
        Some(column.iter())
    }

    #[inline]
    fn fetch(state: &mut Self::State) -> Option<Self::Item> {
        state.next()
    }
}

macro_rules! impl_marker_fetch {
    ($($Filter:ident),*) => {
        $(
            impl<'w, T: Component> QueryFetch<'w> for $Filter<T> {
                type Item = ();
                type State = ();

                fn prepare(_archetype: &'w Archetype) -> Option<Self::State> {
                    Some(())
                }

                fn fetch(_state: &mut Self::State) -> Option<Self::Item> {
                    Some(())
                }
            }

            impl<'w, T: Component> QueryFetchMut<'w> for $Filter<T> {
                type Item = ();
                type State = ();

                fn prepare(_columns: &mut ColumnClaims<'w>) -> Option<Self::State> {
                    Some(())
                }

                fn fetch(_state: &mut Self::State) -> Option<Self::Item> {
                    Some(())
                }
            }
        )*
    };
}

impl_marker_fetch!(With, Without);

// Tuple implementations
macro_rules! impl_query_tuple {
    ($($T:ident),*) => {
        impl<$($T: QueryFilter),*> QueryFilter for ($($T,)*) {
            fn register(access: &mut QueryAccess) {
                $($T::register(access);)*
            }
        }

        #[allow(non_snake_case)]
        impl<'w, $($T: QueryFetch<'w>),*> QueryFetch<'w> for ($($T,)*) {
            type Item = ($($T::Item,)*);
            type State = ($($T::State,)*);

            fn prepare(archetype: &'w Archetype) -> Option<Self::State> {
                Some(($($T::prepare(archetype)?,)*))
            }

            #[inline]
            fn fetch(state: &mut Self::State) -> Option<Self::Item> {
                let ($($T,)*) = state;
                Some(($($T::fetch($T)?,)*))
            }
        }

        #[allow(non_snake_case)]
        impl<'w, $($T: QueryFetchMut<'w>),*> QueryFetchMut<'w> for ($($T,)*) {
            type Item = ($($T::Item,)*);
            type State = ($($T::State,)*);

            fn prepare(columns: &mut ColumnClaims<'w>) -> Option<Self::State> {
                Some(($($T::prepare(columns)?,)*))
            }

            #[inline]
            fn fetch(state: &mut Self::State) -> Option<Self::Item> {
                let ($($T,)*) = state;
                Some(($($T::fetch($T)?,)*))
            }
        }
    };
}

impl_query_tuple!(A);
impl_query_tuple!(A, B);
impl_query_tuple!(A, B, C);
impl_query_tuple!(A, B, C, D);
impl_query_tuple!(A, B, C, D, E);
impl_query_tuple!(A, B, C, D, E, F);
impl_query_tuple!(A, B, C, D, E, F, G);
impl_query_tuple!(A, B, C, D, E, F, G, H);

/// Cached query state
///
/// Pre-computes which archetypes match the query filter. Archetypes are only
/// ever appended, so [`update`](Self::update) just scans the ones created since
/// the last call. A state rebinds itself when used with a different world or
/// after [`World::clear`].
///
/// # Performance
/// Create a `QueryState` once and reuse it every frame instead of calling
/// `World::query`, which rebuilds the archetype match list on each call.
pub struct QueryState<Q> {
    access: QueryAccess,
    matched: Vec<ArchetypeId>,
    seen_archetypes: usize,
    layout_id: u64,
    _phantom: PhantomData<fn() -> Q>,
}

impl<Q: QueryFilter> QueryState<Q> {
    /// Create query state by scanning archetypes
    pub fn new(world: &World) -> Self {
        #[cfg(feature = "profiling")]
        let _span = info_span!("query_state.new", archetype_count = world.archetype_count()).entered();

        let mut state = Self {
            access: QueryAccess::of::<Q>(),
            matched: Vec::new(),
            seen_archetypes: 0,
            layout_id: world.layout_id(),
            _phantom: PhantomData,
        };
        state.update(world);
        state
    }

    /// Update query state with new archetypes (incremental)
    pub fn update(&mut self, world: &World) {
        if self.layout_id != world.layout_id() {
            self.matched.clear();
            self.seen_archetypes = 0;
            self.layout_id = world.layout_id();
        }

        let archetypes = world.archetypes();
        if archetypes.len() > self.seen_archetypes {
            let access = &self.access;
            self.matched.extend(
                archetypes
                    .iter()
                    .skip(self.seen_archetypes)
                    .filter(|archetype| access.matches(archetype.signature()))
                    .map(Archetype::id),
            );
            self.seen_archetypes = archetypes.len();
        }
    }

    /// Iterate query results
    ///
    /// Archetypes created since the last [`update`](Self::update) are still
    /// visited; `update` only makes the next pass cheaper.
    pub fn iter<'w>(&self, world: &'w World) -> QueryIter<'w, Q>
    where
        Q: QueryFetch<'w>,
    {
        QueryIter::new(world.archetypes(), self.current_matches(world))
    }

    /// Iterate query results mutably
    pub fn iter_mut<'w>(&self, world: &'w mut World) -> Result<QueryIterMut<'w, Q>>
    where
        Q: QueryFetchMut<'w>,
    {
        self.access.validate_exclusive()?;
        let matched = self.current_matches(world);
        Ok(QueryIterMut::new(world, matched))
    }

    /// Cached matches plus any archetype the cache has not seen yet, ascending
    fn current_matches(&self, world: &World) -> Vec<ArchetypeId> {
        let access = &self.access;
        if self.layout_id != world.layout_id() {
            return world
                .archetypes()
                .matching(|signature| access.matches(signature))
                .collect();
        }

        let mut matched = self.matched.clone();
        matched.extend(
            world
                .archetypes()
                .iter()
                .skip(self.seen_archetypes)
                .filter(|archetype| access.matches(archetype.signature()))
                .map(Archetype::id),
        );
        matched
    }

    /// Get number of matched archetypes
    pub fn matched_archetype_count(&self) -> usize {
        self.matched.len()
    }

    pub fn access(&self) -> &QueryAccess {
        &self.access
    }
}

/// Read-only query over a world
///
/// Every call to [`iter`](Self::iter) starts a fresh, independent pass.
pub struct Query<'w, Q>
where
    Q: QueryFetch<'w>,
{
    world: &'w World,
    state: QueryState<Q>,
}

impl<'w, Q> Query<'w, Q>
where
    Q: QueryFetch<'w>,
{
    pub(crate) fn new(world: &'w World) -> Self {
        Self {
            world,
            state: QueryState::new(world),
        }
    }

    /// Iterate `(EntityId, item)` pairs
    pub fn iter(&self) -> QueryIter<'w, Q> {
        QueryIter::new(self.world.archetypes(), self.state.matched.clone())
    }

    /// Count matching entities
    pub fn count(&self) -> usize {
        matched_len(self.world.archetypes(), &self.state.matched)
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Get number of matched archetypes
    pub fn matched_archetype_count(&self) -> usize {
        self.state.matched_archetype_count()
    }

    /// Run `func` for every match, spreading archetypes across the rayon pool.
    ///
    /// Requires the "parallel" feature.
    #[cfg(feature = "parallel")]
    pub fn par_for_each<F>(&self, func: F)
    where
        F: Fn(EntityId, Q::Item) + Send + Sync,
    {
        use rayon::prelude::*;

        let archetypes: &'w ArchetypeRegistry = self.world.archetypes();
        let func = &func;

        self.state.matched.par_iter().for_each(move |&id| {
            let Some(archetype) = archetypes.get(id) else {
                return;
            };
            let Some(mut state) = Q::prepare(archetype) else {
                return;
            };
            for &entity in archetype.entities() {
                match Q::fetch(&mut state) {
                    Some(item) => func(entity, item),
                    None => break,
                }
            }
        });
    }
}

impl<'q, 'w, Q> IntoIterator for &'q Query<'w, Q>
where
    Q: QueryFetch<'w>,
{
    type Item = (EntityId, Q::Item);
    type IntoIter = QueryIter<'w, Q>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Stateful mutable query wrapper
///
/// Consumed by iteration: `for (entity, item) in world.query_mut::<Q>()? { .. }`.
pub struct QueryMut<'w, Q>
where
    Q: QueryFetchMut<'w>,
{
    world: &'w mut World,
    state: QueryState<Q>,
}

impl<'w, Q> QueryMut<'w, Q>
where
    Q: QueryFetchMut<'w>,
{
    /// Fails with [`EcsError::ConflictingAccess`] if `Q` names a component twice
    pub(crate) fn new(world: &'w mut World) -> Result<Self> {
        let state = QueryState::<Q>::new(world);
        state.access.validate_exclusive()?;
        Ok(Self { world, state })
    }

    /// Count matching entities
    pub fn count(&self) -> usize {
        matched_len(self.world.archetypes(), &self.state.matched)
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

impl<'w, Q> IntoIterator for QueryMut<'w, Q>
where
    Q: QueryFetchMut<'w>,
{
    type Item = (EntityId, Q::Item);
    type IntoIter = QueryIterMut<'w, Q>;

    fn into_iter(self) -> Self::IntoIter {
        QueryIterMut::new(self.world, self.state.matched)
    }
}

fn matched_len(archetypes: &ArchetypeRegistry, matched: &[ArchetypeId]) -> usize {
    matched
        .iter()
        .filter_map(|&id| archetypes.get(id))
        .map(Archetype::len)
        .sum()
}

/// Immutable query iterator
pub struct QueryIter<'w, Q>
where
    Q: QueryFetch<'w>,
{
    archetypes: &'w ArchetypeRegistry,
    matched: std::vec::IntoIter<ArchetypeId>,
    current: Option<(std::slice::Iter<'w, EntityId>, Q::State)>,
    remaining: usize,
}

impl<'w, Q> QueryIter<'w, Q>
where
    Q: QueryFetch<'w>,
{
    fn new(archetypes: &'w ArchetypeRegistry, matched: Vec<ArchetypeId>) -> Self {
        Self {
            archetypes,
            remaining: matched_len(archetypes, &matched),
            matched: matched.into_iter(),
            current: None,
        }
    }
}

impl<'w, Q> Iterator for QueryIter<'w, Q>
where
    Q: QueryFetch<'w>,
{
    type Item = (EntityId, Q::Item);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((entities, state)) = &mut self.current {
                if let Some(&entity) = entities.next() {
                    if let Some(item) = Q::fetch(state) {
                        self.remaining = self.remaining.saturating_sub(1);
                        return Some((entity, item));
                    }
                    debug_assert!(false, "BUG: component column shorter than entity column");
                }
                self.current = None;
            }

            let id = self.matched.next()?;
            let Some(archetype) = self.archetypes.get(id) else {
                continue;
            };
            if archetype.is_empty() {
                continue;
            }
            if let Some(state) = Q::prepare(archetype) {
                self.current = Some((archetype.entities().iter(), state));
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'w, Q> ExactSizeIterator for QueryIter<'w, Q> where Q: QueryFetch<'w> {}

/// Mutable query iterator
pub struct QueryIterMut<'w, Q>
where
    Q: QueryFetchMut<'w>,
{
    archetypes: std::slice::IterMut<'w, Archetype>,
    matched: std::vec::IntoIter<ArchetypeId>,
    current: Option<(std::slice::Iter<'w, EntityId>, Q::State)>,
    remaining: usize,
}

impl<'w, Q> QueryIterMut<'w, Q>
where
    Q: QueryFetchMut<'w>,
{
    /// `matched` must be ascending, which `QueryState` guarantees
    fn new(world: &'w mut World, matched: Vec<ArchetypeId>) -> Self {
        let remaining = matched_len(world.archetypes(), &matched);
        Self {
            archetypes: world.archetypes_mut().as_mut_slice().iter_mut(),
            matched: matched.into_iter(),
            current: None,
            remaining,
        }
    }
}

impl<'w, Q> Iterator for QueryIterMut<'w, Q>
where
    Q: QueryFetchMut<'w>,
{
    type Item = (EntityId, Q::Item);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((entities, state)) = &mut self.current {
                if let Some(&entity) = entities.next() {
                    if let Some(item) = Q::fetch(state) {
                        self.remaining = self.remaining.saturating_sub(1);
                        return Some((entity, item));
                    }
                    debug_assert!(false, "BUG: component column shorter than entity column");
                }
                self.current = None;
            }

            let id = self.matched.next()?;
            // Walk the archetype slice forward to `id`; ids equal slice positions
            let archetype = loop {
                let candidate = self.archetypes.next()?;
                if candidate.id() == id {
                    break candidate;
                }
            };
            if archetype.is_empty() {
                continue;
            }

            let (entities, indices, columns) = archetype.split_mut();
            let mut claims = ColumnClaims::new(indices, columns);
            if let Some(state) = Q::prepare(&mut claims) {
                self.current = Some((entities.iter(), state));
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'w, Q> ExactSizeIterator for QueryIterMut<'w, Q> where Q: QueryFetchMut<'w> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct A(u32);
    #[derive(Debug, Clone, Copy, PartialEq)]
    struct B(u32);
    #[derive(Debug, Clone, Copy, PartialEq)]
    struct C(u32);

    #[test]
    fn test_query_state_creation() {
        struct NeverSpawned;
        let world = World::new();
        let state = QueryState::<&NeverSpawned>::new(&world);
        // There are no archetypes containing NeverSpawned yet
        assert_eq!(state.matched_archetype_count(), 0);
    }

    #[test]
    fn test_incremental_update() {
        let mut world = World::new();
        let mut state = QueryState::<&A>::new(&world);
        let initial_count = state.matched_archetype_count();

        world.spawn((A(10),)).unwrap();

        // Iteration sees the new archetype before the cache does
        assert_eq!(state.iter(&world).count(), 1);
        assert_eq!(state.matched_archetype_count(), initial_count);

        state.update(&world);
        assert!(state.matched_archetype_count() > initial_count);
    }

    #[test]
    fn test_state_rebinds_after_clear() {
        let mut world = World::new();
        world.spawn((A(1), B(1))).unwrap();
        let mut state = QueryState::<&A>::new(&world);
        assert_eq!(state.matched_archetype_count(), 1);

        world.clear();
        world.spawn((B(2),)).unwrap();
        world.spawn((A(3),)).unwrap();

        let seen: Vec<_> = state.iter(&world).map(|(_, a)| *a).collect();
        assert_eq!(seen, vec![A(3)]);

        state.update(&world);
        assert_eq!(state.matched_archetype_count(), 1);
    }

    #[test]
    fn test_query_filters() {
        let mut world = World::new();

        world.spawn((A(0), B(0))).unwrap();
        world.spawn((A(1),)).unwrap();
        world.spawn((B(2),)).unwrap();

        assert_eq!(world.query::<(&A, With<B>)>().count(), 1);
        assert_eq!(world.query::<(&A, Without<B>)>().count(), 1);
        assert_eq!(world.query::<With<B>>().count(), 2);
    }

    #[test]
    fn test_access_conflicts() {
        let access = QueryAccess::of::<(&mut A, &A)>();
        assert!(matches!(
            access.validate_exclusive(),
            Err(EcsError::ConflictingAccess(_))
        ));
        assert!(QueryAccess::of::<(&mut A, &B, With<C>)>()
            .validate_exclusive()
            .is_ok());

        let mut world = World::new();
        assert!(world.query_mut::<(&A, &A)>().is_err());
        assert!(world.query_mut::<(&mut A, &mut B)>().is_ok());
    }

    #[test]
    fn test_exact_size() {
        let mut world = World::new();
        for i in 0..5 {
            world.spawn((A(i),)).unwrap();
        }
        world.spawn((A(9), B(9))).unwrap();

        let query = world.query::<&A>();
        let mut iter = query.iter();
        assert_eq!(iter.len(), 6);
        iter.next();
        iter.next();
        assert_eq!(iter.len(), 4);
        assert_eq!(iter.count(), 4);
    }

    #[test]
    fn test_mutable_query_writes_through() {
        let mut world = World::new();
        let e = world.spawn((A(1), B(10))).unwrap();
        world.spawn((A(2),)).unwrap();

        for (_, (a, b)) in world.query_mut::<(&mut A, &B)>().unwrap() {
            a.0 += b.0;
        }

        assert_eq!(world.get_component::<A>(e), Ok(&A(11)));
        let sum: u32 = world.query::<&A>().iter().map(|(_, a)| a.0).sum();
        assert_eq!(sum, 13);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_par_for_each_visits_every_match() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let mut world = World::new();
        for i in 0..100 {
            if i % 3 == 0 {
                world.spawn((A(i), C(0))).unwrap();
            } else {
                world.spawn((A(i),)).unwrap();
            }
        }

        let total = AtomicU32::new(0);
        world.query::<&A>().par_for_each(|_, a| {
            total.fetch_add(a.0, Ordering::Relaxed);
        });
        assert_eq!(total.load(Ordering::Relaxed), (0..100).sum::<u32>());
    }
}
