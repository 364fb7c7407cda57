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

//! Dense component pools
//!
//! A [`ComponentPool<T>`] is one column of an archetype table. Archetypes hold
//! their columns as `Box<dyn ErasedPool>` so tables with different component
//! types can be handled uniformly; typed access goes through a downcast.
//!
//! Every index is checked. Out-of-range access returns
//! [`EcsError::IndexOutOfRange`] in debug and release builds alike.

use std::any::{type_name, Any, TypeId};

use crate::component::Component;
use crate::error::{EcsError, Result};

/// Densely packed column of `T`, indexed by table row
#[derive(Debug)]
pub struct ComponentPool<T> {
    items: Vec<T>,
}

impl<T: Component> ComponentPool<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    /// Append a value, returning its row
    #[inline]
    pub fn push(&mut self, value: T) -> usize {
        let row = self.items.len();
        self.items.push(value);
        row
    }

    /// Remove `row`, filling the hole with the last element
    pub fn swap_remove(&mut self, row: usize) -> Result<T> {
        self.check(row)?;
        Ok(self.items.swap_remove(row))
    }

    #[inline]
    pub fn get(&self, row: usize) -> Result<&T> {
        let len = self.items.len();
        self.items
            .get(row)
            .ok_or(EcsError::IndexOutOfRange { index: row, len })
    }

    #[inline]
    pub fn get_mut(&mut self, row: usize) -> Result<&mut T> {
        let len = self.items.len();
        self.items
            .get_mut(row)
            .ok_or(EcsError::IndexOutOfRange { index: row, len })
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn check(&self, row: usize) -> Result<()> {
        if row < self.items.len() {
            Ok(())
        } else {
            Err(EcsError::IndexOutOfRange {
                index: row,
                len: self.items.len(),
            })
        }
    }
}

impl<T: Component> Default for ComponentPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased view of a [`ComponentPool`]
pub trait ErasedPool: Any + Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `TypeId` of the stored component
    fn item_type_id(&self) -> TypeId;

    fn item_type_name(&self) -> &'static str;

    /// Swap-remove `row` and drop its value
    fn swap_remove_drop(&mut self, row: usize) -> Result<()>;

    /// Swap-remove `row` and append its value to `dst`, which must store the same type
    fn move_row_into(&mut self, row: usize, dst: &mut dyn ErasedPool) -> Result<()>;

    /// Fresh, empty pool of the same component type
    fn new_empty(&self) -> Box<dyn ErasedPool>;

    fn reserve(&mut self, additional: usize);

    fn clear(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedPool for ComponentPool<T> {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn item_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn item_type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn swap_remove_drop(&mut self, row: usize) -> Result<()> {
        self.swap_remove(row).map(drop)
    }

    fn move_row_into(&mut self, row: usize, dst: &mut dyn ErasedPool) -> Result<()> {
        let dst_name = dst.item_type_name();
        let dst = dst
            .as_any_mut()
            .downcast_mut::<ComponentPool<T>>()
            .ok_or_else(|| {
                EcsError::MoveFailed(format!(
                    "cannot move {} into a pool of {dst_name}",
                    type_name::<T>()
                ))
            })?;
        let value = self.swap_remove(row)?;
        dst.push(value);
        Ok(())
    }

    fn new_empty(&self) -> Box<dyn ErasedPool> {
        Box::new(ComponentPool::<T>::new())
    }

    fn reserve(&mut self, additional: usize) {
        self.items.reserve(additional);
    }

    fn clear(&mut self) {
        self.items.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl dyn ErasedPool {
    /// Typed view of this pool, if it stores `T`
    pub fn downcast_ref<T: Component>(&self) -> Option<&ComponentPool<T>> {
        self.as_any().downcast_ref::<ComponentPool<T>>()
    }

    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut ComponentPool<T>> {
        self.as_any_mut().downcast_mut::<ComponentPool<T>>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_swap_remove_moves_last_into_hole() {
        let mut pool = ComponentPool::new();
        for v in [10, 20, 30, 40] {
            pool.push(v);
        }

        assert_eq!(pool.swap_remove(1).unwrap(), 20);
        assert_eq!(pool.as_slice(), &[10, 40, 30]);

        // Removing the last row moves nothing
        assert_eq!(pool.swap_remove(2).unwrap(), 30);
        assert_eq!(pool.as_slice(), &[10, 40]);
    }

    #[test]
    fn test_out_of_range_is_reported() {
        let mut pool = ComponentPool::<u8>::new();
        pool.push(1);

        assert_eq!(
            pool.get(3).unwrap_err(),
            EcsError::IndexOutOfRange { index: 3, len: 1 }
        );
        assert!(pool.get_mut(1).is_err());
        assert!(pool.swap_remove(1).is_err());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_move_row_between_erased_pools() {
        let mut src: Box<dyn ErasedPool> = Box::new(ComponentPool::<u32>::new());
        let mut dst = src.new_empty();
        {
            let typed = src.downcast_mut::<u32>().unwrap();
            typed.push(1);
            typed.push(2);
        }

        src.move_row_into(0, dst.as_mut()).unwrap();
        assert_eq!(src.downcast_ref::<u32>().unwrap().as_slice(), &[2]);
        assert_eq!(dst.downcast_ref::<u32>().unwrap().as_slice(), &[1]);
    }

    #[test]
    fn test_move_row_type_mismatch_leaves_source_intact() {
        let mut src: Box<dyn ErasedPool> = Box::new(ComponentPool::<u32>::new());
        let mut dst: Box<dyn ErasedPool> = Box::new(ComponentPool::<i64>::new());
        src.downcast_mut::<u32>().unwrap().push(7);

        let err = src.move_row_into(0, dst.as_mut()).unwrap_err();
        assert!(matches!(err, EcsError::MoveFailed(_)));
        assert_eq!(src.len(), 1);
        assert!(dst.is_empty());
    }

    #[test]
    fn test_swap_remove_drop_runs_destructor() {
        struct Tracked(Arc<AtomicUsize>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        let mut pool: Box<dyn ErasedPool> = Box::new(ComponentPool::<Tracked>::new());
        let typed = pool.downcast_mut::<Tracked>().unwrap();
        typed.push(Tracked(drops.clone()));
        typed.push(Tracked(drops.clone()));

        pool.swap_remove_drop(0).unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        drop(pool);
        assert_eq!(drops.load(Ordering::SeqCst), 2);
    }
}
