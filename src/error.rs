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

//! Error types

use std::fmt;

use crate::component::ComponentTypeId;
use crate::entity::EntityId;

/// ECS error type
///
/// Every variant is a logic error: nothing here is transient and nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Entity was destroyed or never existed (generation mismatch)
    StaleEntity(EntityId),

    /// Entity already has a component of this type
    DuplicateComponent(&'static str),

    /// Entity has no component of this type
    ComponentNotFound(&'static str),

    /// Storage pool accessed past its end
    IndexOutOfRange { index: usize, len: usize },

    /// Archetype transition rejected; the entity is left where it was
    MoveFailed(String),

    /// Query requests the same component type more than once with mutable access
    ConflictingAccess(&'static str),

    /// Component type id was never issued by the registry
    UnregisteredComponent(ComponentTypeId),

    /// World refused to create another archetype
    ArchetypeLimitExceeded(usize),
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::StaleEntity(entity) => write!(f, "Stale entity: {entity}"),
            EcsError::DuplicateComponent(name) => {
                write!(f, "Entity already has component {name}")
            }
            EcsError::ComponentNotFound(name) => write!(f, "Component not found: {name}"),
            EcsError::IndexOutOfRange { index, len } => {
                write!(f, "Index {index} out of range for pool of length {len}")
            }
            EcsError::MoveFailed(reason) => write!(f, "Archetype move failed: {reason}"),
            EcsError::ConflictingAccess(name) => {
                write!(f, "Conflicting query access to component {name}")
            }
            EcsError::UnregisteredComponent(id) => {
                write!(f, "Component type {id} is not registered")
            }
            EcsError::ArchetypeLimitExceeded(limit) => {
                write!(f, "Archetype limit exceeded ({limit})")
            }
        }
    }
}

impl std::error::Error for EcsError {}

/// Result type alias
pub type Result<T> = std::result::Result<T, EcsError>;
