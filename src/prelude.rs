//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use simply_ecs::prelude::*;
//! ```

pub use crate::command::CommandBuffer;
pub use crate::component::{Bundle, Component};
pub use crate::config::WorldConfig;
pub use crate::entity::EntityId;
pub use crate::error::EcsError;
pub use crate::query::{Query, QueryMut, QueryState, With, Without};
pub use crate::world::World;
