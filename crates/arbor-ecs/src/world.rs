//! The [`World`] owns the whole storage engine: the entity directory, the
//! component registry, the id index, and the table store with its memoized
//! transition graph.
//!
//! All structural mutation goes through `&mut self`, which is the engine's
//! whole concurrency story: one owner thread drives it, every operation
//! completes before returning, and no partial state is ever observable. A
//! multi-threaded host wraps the world in its own mutual exclusion.
//!
//! Handles (`Entity`, `Id`, `TableId`) are plain copyable values, so callers
//! that interleave reads and mutations iterate over a snapshot
//! ([`table_ids`](World::table_ids), [`alive_entities`](World::alive_entities))
//! and re-resolve each handle as they go instead of holding borrows across a
//! mutation.

use crate::component::{Component, ComponentRegistry};
use crate::entity::{Entity, EntityIndex, EntityLocation};
use crate::graph::{EdgeDiff, GraphEdge};
use crate::id::Id;
use crate::id_index::IdIndex;
use crate::store::TableStore;
use crate::table::{Table, TableId};
use crate::EcsError;

use std::fmt;

/// The top-level storage engine container.
pub struct World {
    entities: EntityIndex,
    registry: ComponentRegistry,
    id_index: IdIndex,
    store: TableStore,
}

impl World {
    /// Create an empty world. The root table exists from the start.
    pub fn new() -> Self {
        Self {
            entities: EntityIndex::new(),
            registry: ComponentRegistry::new(),
            id_index: IdIndex::new(),
            store: TableStore::new(),
        }
    }

    // -- registration --------------------------------------------------------

    /// Register component type `T` under `name`, auto-assigning an id.
    /// Idempotent: re-registering `T` returns the original id.
    pub fn register_component<T: Component>(&mut self, name: &str) -> Id {
        self.registry.register::<T>(name, &mut self.id_index)
    }

    /// Register component type `T` under an explicit id (including ids in
    /// the map-backed high range). Idempotent by Rust type.
    pub fn register_component_as<T: Component>(&mut self, id: Id, name: &str) -> Id {
        self.registry.register_as::<T>(id, name, &mut self.id_index)
    }

    /// The component registry.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Ids of all registered component types, in registration order.
    pub fn component_ids(&self) -> &[Id] {
        self.registry.ids()
    }

    /// The id index, for record and low/high enumeration views.
    pub fn id_index(&self) -> &IdIndex {
        &self.id_index
    }

    // -- entity lifecycle ----------------------------------------------------

    /// Create a new entity in the root table.
    pub fn new_entity(&mut self) -> Entity {
        let row = self.store.root().len();
        let entity = self.entities.spawn(EntityLocation {
            table: TableStore::ROOT,
            row,
        });
        let pushed = self.store.root_mut().push_entity(entity);
        debug_assert_eq!(pushed, row);
        tracing::trace!(%entity, "created entity");
        entity
    }

    /// Delete an entity: remove its row and mark the handle dead.
    ///
    /// Returns `false` (and does nothing) if the handle is already dead or
    /// was never allocated.
    pub fn delete_entity(&mut self, entity: Entity) -> bool {
        let Some(location) = self.entities.free(entity) else {
            tracing::warn!(%entity, "delete of dead or unknown entity ignored");
            return false;
        };
        let moved = self.store.table_mut(location.table).remove_row(location.row);
        if let Some(swapped) = moved {
            self.entities.set_location(swapped, location);
        }
        true
    }

    /// Whether `entity` refers to a live entity.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// The table and row currently holding `entity`.
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleEntity`] if the handle is dead or unknown.
    pub fn locate(&self, entity: Entity) -> Result<EntityLocation, EcsError> {
        self.entities
            .location(entity)
            .ok_or(EcsError::StaleEntity(entity))
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.alive_count()
    }

    /// Snapshot of all live entity handles.
    pub fn alive_entities(&self) -> Vec<Entity> {
        self.entities.iter_alive().collect()
    }

    // -- structural transitions ---------------------------------------------

    /// Move `entity` to the table whose type is its current type plus `id`.
    ///
    /// Adding an id the entity already has is a no-op returning its current
    /// table. Otherwise the memoized add edge is followed (or computed once
    /// and cached, together with the symmetric remove edge on the
    /// destination), the row is moved with shared values preserved and the
    /// new column default-constructed, and the directory is updated for the
    /// entity and for whichever row got swapped into its old slot.
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleEntity`] if the handle is dead or unknown.
    pub fn add_id(&mut self, entity: Entity, id: Id) -> Result<TableId, EcsError> {
        let location = self.locate(entity)?;
        let src_id = location.table;
        if self.store.table(src_id).has_id(id) {
            return Ok(src_id);
        }

        let dst_id = match self.store.table(src_id).edges().add_edge(id) {
            Some(edge) => edge.to,
            None => {
                let mut ids = self.store.table(src_id).ids().to_vec();
                let slot = ids
                    .binary_search(&id)
                    .expect_err("id was checked absent from the table type");
                ids.insert(slot, id);
                let dst_id = self.store.get_or_create(&ids, &mut self.id_index);
                self.store.table_mut(src_id).edges_mut().cache_add(
                    id,
                    GraphEdge {
                        to: dst_id,
                        diff: EdgeDiff::added(id),
                    },
                );
                self.store.table_mut(dst_id).edges_mut().cache_remove(
                    id,
                    GraphEdge {
                        to: src_id,
                        diff: EdgeDiff::removed(id),
                    },
                );
                dst_id
            }
        };

        self.move_entity(entity, location, dst_id);
        Ok(dst_id)
    }

    /// Move `entity` to the table whose type is its current type minus `id`.
    ///
    /// Removing an id the entity does not have is a no-op returning its
    /// current table. The dropped column's value is destroyed.
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleEntity`] if the handle is dead or unknown.
    pub fn remove_id(&mut self, entity: Entity, id: Id) -> Result<TableId, EcsError> {
        let location = self.locate(entity)?;
        let src_id = location.table;
        if !self.store.table(src_id).has_id(id) {
            return Ok(src_id);
        }

        let dst_id = match self.store.table(src_id).edges().remove_edge(id) {
            Some(edge) => edge.to,
            None => {
                let ids: Vec<Id> = self
                    .store
                    .table(src_id)
                    .ids()
                    .iter()
                    .copied()
                    .filter(|other| *other != id)
                    .collect();
                let dst_id = self.store.get_or_create(&ids, &mut self.id_index);
                self.store.table_mut(src_id).edges_mut().cache_remove(
                    id,
                    GraphEdge {
                        to: dst_id,
                        diff: EdgeDiff::removed(id),
                    },
                );
                self.store.table_mut(dst_id).edges_mut().cache_add(
                    id,
                    GraphEdge {
                        to: src_id,
                        diff: EdgeDiff::added(id),
                    },
                );
                dst_id
            }
        };

        self.move_entity(entity, location, dst_id);
        Ok(dst_id)
    }

    /// Whether a live `entity` currently has `id` in its table's type.
    pub fn has_id(&self, entity: Entity, id: Id) -> bool {
        self.entities
            .location(entity)
            .is_some_and(|location| self.store.table(location.table).has_id(id))
    }

    /// Move one row between two distinct tables and publish the new
    /// locations of the moved entity and of any swapped occupant.
    fn move_entity(&mut self, entity: Entity, from: EntityLocation, dst_id: TableId) {
        let (src, dst) = self.store.pair_mut(from.table, dst_id);
        let (new_row, moved) = src.move_row_to(from.row, entity, dst);
        self.entities.set_location(
            entity,
            EntityLocation {
                table: dst_id,
                row: new_row,
            },
        );
        if let Some(swapped) = moved {
            self.entities.set_location(swapped, from);
        }
    }

    // -- component access ----------------------------------------------------

    /// The value of component `T` on `entity`, or `None` if the entity is
    /// dead, `T` is unregistered, or the entity does not have it.
    pub fn get<T: 'static>(&self, entity: Entity) -> Option<&T> {
        let location = self.entities.location(entity)?;
        let id = self.registry.lookup::<T>()?;
        self.store.table(location.table).get::<T>(location.row, id)
    }

    /// Mutable variant of [`get`](Self::get).
    pub fn get_mut<T: 'static>(&mut self, entity: Entity) -> Option<&mut T> {
        let location = self.entities.location(entity)?;
        let id = self.registry.lookup::<T>()?;
        self.store
            .table_mut(location.table)
            .get_mut::<T>(location.row, id)
    }

    /// Write a component value, adding the component first if the entity
    /// does not have it yet (the add-then-set flow).
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if `T` was never registered,
    /// [`EcsError::StaleEntity`] if the handle is dead or unknown.
    pub fn set<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), EcsError> {
        let id = self.registry.lookup::<T>().ok_or_else(|| {
            EcsError::UnknownComponent(std::any::type_name::<T>().to_owned())
        })?;
        self.add_id(entity, id)?;
        let location = self.locate(entity)?;
        // Zero-size types have no column; adding the id was the whole write.
        if let Some(slot) = self
            .store
            .table_mut(location.table)
            .get_mut::<T>(location.row, id)
        {
            *slot = value;
        }
        Ok(())
    }

    /// Read a component value as JSON, by registered name.
    ///
    /// Returns `Value::Null` when the entity does not have the component or
    /// the id carries no storage (tag-like), so inspector callers can render
    /// "nothing" without a special case.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] for unregistered names,
    /// [`EcsError::StaleEntity`] for dead handles,
    /// [`EcsError::ComponentConversion`] if the value cannot be serialized.
    pub fn component_json(
        &self,
        entity: Entity,
        name: &str,
    ) -> Result<serde_json::Value, EcsError> {
        let id = self
            .registry
            .lookup_by_name(name)
            .ok_or_else(|| EcsError::UnknownComponent(name.to_owned()))?;
        let location = self.locate(entity)?;
        let table = self.store.table(location.table);
        let Some(entry) = table.column_entry(id) else {
            return Ok(serde_json::Value::Null);
        };
        // Safety: the pointer and vtable both come from the column's info.
        let value = unsafe { (entry.info.vtable.to_json_fn)(entry.column.value_ptr(location.row)) };
        value.map_err(|details| EcsError::ComponentConversion {
            component: name.to_owned(),
            details,
        })
    }

    /// Overwrite a component value from JSON, by registered name, adding the
    /// component first if absent. Writing to a tag-like id records the id
    /// and ignores the value.
    ///
    /// # Errors
    ///
    /// As [`component_json`](Self::component_json), with
    /// [`EcsError::ComponentConversion`] when the JSON does not match the
    /// component's shape (the stored value is left untouched).
    pub fn set_component_json(
        &mut self,
        entity: Entity,
        name: &str,
        value: &serde_json::Value,
    ) -> Result<(), EcsError> {
        let id = self
            .registry
            .lookup_by_name(name)
            .ok_or_else(|| EcsError::UnknownComponent(name.to_owned()))?;
        self.add_id(entity, id)?;
        let location = self.locate(entity)?;
        let table = self.store.table_mut(location.table);
        let Some(set_json) = table.column_entry(id).map(|entry| entry.info.vtable.set_json_fn)
        else {
            return Ok(());
        };
        let slot = table
            .component_ptr_mut(location.row, id)
            .expect("located row must have the column");
        // Safety: the slot holds an initialized value of the column's type.
        unsafe { set_json(slot, value) }.map_err(|details| EcsError::ComponentConversion {
            component: name.to_owned(),
            details,
        })
    }

    // -- table enumeration ---------------------------------------------------

    /// Iterate all existing tables in creation order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.store.iter()
    }

    /// Snapshot of all table ids, safe to hold across mutations.
    pub fn table_ids(&self) -> Vec<TableId> {
        self.store.ids()
    }

    /// The table with `id`, or `None` if no such table exists.
    pub fn table(&self, id: TableId) -> Option<&Table> {
        self.store.get(id)
    }

    /// Whether a table with `id` exists.
    pub fn contains_table(&self, id: TableId) -> bool {
        self.store.contains(id)
    }

    /// Number of existing tables, root included.
    pub fn table_count(&self) -> usize {
        self.store.len()
    }

    /// The root table.
    pub fn root(&self) -> &Table {
        self.store.root()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entities.alive_count())
            .field("tables", &self.store.len())
            .field("ids", &self.id_index.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
