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

//! World construction settings

/// Capacity hints and limits applied when a [`World`](crate::world::World) is built.
///
/// ```
/// use simply_ecs::{World, WorldConfig};
///
/// let world = World::with_config(WorldConfig::default().with_entity_capacity(1_000_000));
/// assert_eq!(world.entity_count(), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldConfig {
    /// Slots reserved in the entity allocator up front
    pub entity_capacity: usize,

    /// Archetype tables reserved up front
    pub archetype_capacity: usize,

    /// Rows reserved in every newly created archetype table
    pub rows_per_archetype: usize,

    /// Hard cap on the number of distinct archetypes
    pub max_archetypes: usize,
}

impl WorldConfig {
    pub const DEFAULT_ENTITY_CAPACITY: usize = 1024;
    pub const DEFAULT_ARCHETYPE_CAPACITY: usize = 64;
    pub const DEFAULT_ROWS_PER_ARCHETYPE: usize = 128;
    pub const DEFAULT_MAX_ARCHETYPES: usize = 10_000;

    pub fn with_entity_capacity(mut self, capacity: usize) -> Self {
        self.entity_capacity = capacity;
        self
    }

    pub fn with_archetype_capacity(mut self, capacity: usize) -> Self {
        self.archetype_capacity = capacity;
        self
    }

    pub fn with_rows_per_archetype(mut self, rows: usize) -> Self {
        self.rows_per_archetype = rows;
        self
    }

    /// Values below 1 are raised to 1; the empty archetype always exists.
    pub fn with_max_archetypes(mut self, max: usize) -> Self {
        self.max_archetypes = max.max(1);
        self
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            entity_capacity: Self::DEFAULT_ENTITY_CAPACITY,
            archetype_capacity: Self::DEFAULT_ARCHETYPE_CAPACITY,
            rows_per_archetype: Self::DEFAULT_ROWS_PER_ARCHETYPE,
            max_archetypes: Self::DEFAULT_MAX_ARCHETYPES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = WorldConfig::default()
            .with_entity_capacity(10)
            .with_rows_per_archetype(4)
            .with_max_archetypes(0);

        assert_eq!(config.entity_capacity, 10);
        assert_eq!(config.rows_per_archetype, 4);
        assert_eq!(config.max_archetypes, 1);
        assert_eq!(
            config.archetype_capacity,
            WorldConfig::DEFAULT_ARCHETYPE_CAPACITY
        );
    }
}
