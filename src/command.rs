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

//! Deferred world mutations
//!
//! Structural changes cannot be made while a query borrows the world. Record
//! them in a [`CommandBuffer`] during the pass and apply it afterwards:
//!
//! ```
//! use simply_ecs::prelude::*;
//!
//! struct Health(i32);
//!
//! let mut world = World::new();
//! world.spawn((Health(0),)).unwrap();
//! world.spawn((Health(5),)).unwrap();
//!
//! let mut commands = CommandBuffer::new();
//! for (entity, health) in world.query::<&Health>().iter() {
//!     if health.0 <= 0 {
//!         commands.destroy_entity(entity);
//!     }
//! }
//! world.apply_commands(&mut commands).unwrap();
//! assert_eq!(world.entity_count(), 1);
//! ```

use std::collections::VecDeque;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::component::{Bundle, Component};
use crate::entity::EntityId;
use crate::error::Result;
use crate::world::World;

/// Type alias for world mutation closures
pub type CommandClosure = Box<dyn FnOnce(&mut World) -> Result<()> + Send>;

/// Closure that creates one entity
pub type SpawnClosure = Box<dyn FnOnce(&mut World) -> Result<EntityId> + Send>;

/// Deferred command for world mutations
pub enum Command {
    /// Create an entity with no components
    Create,

    /// Create an entity from a queued bundle
    Spawn(SpawnClosure),

    /// Destroy entity
    Destroy(EntityId),

    /// Custom world mutation
    Custom(CommandClosure),
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Create => write!(f, "Create"),
            Command::Spawn(_) => write!(f, "Spawn(...)"),
            Command::Destroy(e) => f.debug_tuple("Destroy").field(e).finish(),
            Command::Custom(_) => write!(f, "Custom(...)"),
        }
    }
}

/// Command buffer for deferred operations
///
/// Commands run in the order they were queued.
#[derive(Default, Debug)]
pub struct CommandBuffer {
    commands: VecDeque<Command>,
    created: Vec<EntityId>,
}

impl CommandBuffer {
    /// Create new command buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: VecDeque::with_capacity(capacity),
            created: Vec::new(),
        }
    }

    /// Queue creation of an empty entity
    pub fn create_entity(&mut self) {
        self.commands.push_back(Command::Create);
    }

    /// Queue spawning an entity from a bundle
    pub fn spawn<B: Bundle>(&mut self, bundle: B) {
        self.commands
            .push_back(Command::Spawn(Box::new(move |world| world.spawn(bundle))));
    }

    /// Queue destroy command
    pub fn destroy_entity(&mut self, entity: EntityId) {
        self.commands.push_back(Command::Destroy(entity));
    }

    /// Queue a custom world mutation
    pub fn add<F>(&mut self, f: F)
    where
        F: FnOnce(&mut World) -> Result<()> + Send + 'static,
    {
        self.commands.push_back(Command::Custom(Box::new(f)));
    }

    /// Queue add component command
    pub fn add_component<T: Component>(&mut self, entity: EntityId, component: T) {
        self.add(move |world| world.add_component(entity, component));
    }

    /// Queue remove component command
    pub fn remove_component<T: Component>(&mut self, entity: EntityId) {
        self.add(move |world| world.remove_component::<T>(entity));
    }

    /// Apply queued commands in order.
    ///
    /// Stops at the first failing command and returns its error; that command is
    /// consumed and every command after it stays queued.
    pub fn apply(&mut self, world: &mut World) -> Result<()> {
        #[cfg(feature = "profiling")]
        let _span = info_span!("commands.apply", queued = self.commands.len()).entered();

        while let Some(command) = self.commands.pop_front() {
            match command {
                Command::Create => {
                    let entity = world.create_entity();
                    self.created.push(entity);
                }
                Command::Spawn(f) => {
                    let entity = f(world)?;
                    self.created.push(entity);
                }
                Command::Destroy(entity) => {
                    world.destroy_entity(entity)?;
                }
                Command::Custom(f) => {
                    f(world)?;
                }
            }
        }
        Ok(())
    }

    /// Ids of entities created by applied `create_entity`/`spawn` commands, oldest first
    pub fn take_created(&mut self) -> Vec<EntityId> {
        std::mem::take(&mut self.created)
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Get length
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Clear buffer
    pub fn clear(&mut self) {
        self.commands.clear();
        self.created.clear();
    }
}
