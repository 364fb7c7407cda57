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

//! Simply ECS - archetype Entity Component System data store
//!
//! Entities are generational ids. Components live in dense per-type columns
//! grouped into archetype tables, one table per distinct component set, so a
//! query walks contiguous memory in every table it matches.
//!
//! ```
//! use simply_ecs::prelude::*;
//!
//! #[derive(Debug, PartialEq)]
//! struct Position(i32);
//!
//! let mut world = World::new();
//! let e = world.create_entity();
//! world.add_component(e, Position(3)).unwrap();
//! assert_eq!(world.get_component::<Position>(e), Ok(&Position(3)));
//!
//! world.destroy_entity(e).unwrap();
//! assert!(!world.is_alive(e));
//! assert_eq!(world.destroy_entity(e), Err(EcsError::StaleEntity(e)));
//! ```
//!
//! # Features
//! - `parallel` (default): read-only `Query::par_for_each` on the rayon pool
//! - `profiling`: `tracing` spans around spawning, archetype moves, query setup and command flushing

pub mod archetype;
pub mod command;
pub mod component;
pub mod config;
pub mod entity;
pub mod error;
pub mod prelude;
pub mod query;
pub mod storage;
pub mod world;

pub use archetype::*;
pub use command::*;
pub use component::*;
pub use config::*;
pub use entity::*;
pub use error::*;
pub use query::*;
pub use storage::*;
pub use world::*;
