//! Arbor ECS -- archetype-table storage engine with a memoized table graph.
//!
//! Entities live in *tables*: one table per exact set of component/tag ids,
//! with component values stored in a Structure-of-Arrays layout. Adding or
//! removing an id moves the entity's row to a neighboring table; every such
//! transition is computed once and memoized as a graph edge, so the table
//! graph is a deterministic, content-addressed map from `(table, id,
//! direction)` to table, independent of discovery order. A two-tier id index
//! (array below a fixed threshold, hash map above it) serves per-id metadata
//! with identical behavior regardless of id magnitude.
//!
//! The crate is the storage substrate only: no queries, no systems, no
//! scheduling. It is driven by one owner thread; see the [`world`] module
//! docs for the concurrency contract.
//!
//! # Quick Start
//!
//! ```
//! use arbor_ecs::prelude::*;
//!
//! #[derive(Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
//! struct Position { x: f32, y: f32 }
//!
//! let mut world = World::new();
//! let position = world.register_component::<Position>("position");
//!
//! let entity = world.new_entity();
//! world.set(entity, Position { x: 1.0, y: 2.0 }).unwrap();
//! assert_eq!(world.get::<Position>(entity), Some(&Position { x: 1.0, y: 2.0 }));
//!
//! // Structural transitions are memoized: toggling an id brings the entity
//! // back to the identical table, not an equal copy.
//! let start = world.locate(entity).unwrap().table;
//! world.remove_id(entity, position).unwrap();
//! world.add_id(entity, position).unwrap();
//! assert_eq!(world.locate(entity).unwrap().table, start);
//! ```

#![deny(unsafe_code)]

#[allow(unsafe_code)]
pub mod component;
pub mod entity;
pub mod graph;
pub mod id;
pub mod id_index;
pub mod store;
#[allow(unsafe_code)]
pub mod table;
#[allow(unsafe_code)]
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by storage operations.
///
/// Absence (unknown id, missing component, nonexistent table) is expressed
/// as `Option::None`, never as an error; these variants cover the cases a
/// caller must be able to distinguish.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The entity handle is dead or was never allocated.
    #[error("entity {0:?} is dead or was never allocated")]
    StaleEntity(entity::Entity),

    /// A component type or name that was never registered.
    #[error("component '{0}' is not registered")]
    UnknownComponent(String),

    /// A dynamic value could not be converted to or from the component's
    /// concrete type.
    #[error("failed to convert component '{component}': {details}")]
    ComponentConversion {
        /// Registered name of the component.
        component: String,
        /// Underlying conversion error.
        details: String,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{Component, ComponentRegistry, TypeInfo};
    pub use crate::entity::{Entity, EntityIndex, EntityLocation};
    pub use crate::graph::{EdgeDiff, GraphEdge, GraphEdges};
    pub use crate::id::{Id, IdMap, HI_ID_THRESHOLD};
    pub use crate::id_index::{IdIndex, IdRecord};
    pub use crate::store::TableStore;
    pub use crate::table::{Table, TableId};
    pub use crate::world::World;
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
