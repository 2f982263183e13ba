//! The table store: every existing table, addressable by id in O(1).
//!
//! Table ids are assigned densely in creation order, so the store is a plain
//! vector plus a content-addressed `type -> table` map that guarantees one
//! table per distinct id set. The table with the empty type is the *root*
//! table, created up front; newly created entities start there.
//!
//! Tables are never destroyed. A table whose last row is removed stays in
//! the store and is found again by the type map, so memoized graph edges
//! always point at live tables.

use crate::component::TypeInfo;
use crate::id::Id;
use crate::id_index::IdIndex;
use crate::table::{Table, TableId};

use std::collections::HashMap;

/// Dense registry of all existing tables.
#[derive(Debug)]
pub struct TableStore {
    /// Tables indexed by `TableId`.
    tables: Vec<Table>,
    /// Content addressing: sorted id set -> table.
    by_type: HashMap<Vec<Id>, TableId>,
}

impl TableStore {
    /// The root table's id.
    pub const ROOT: TableId = TableId::from_raw(0);

    /// Create a store holding only the empty root table.
    pub fn new() -> Self {
        let mut store = Self {
            tables: Vec::new(),
            by_type: HashMap::new(),
        };
        let root = store.create(Vec::new(), Vec::new());
        debug_assert_eq!(root, Self::ROOT);
        store
    }

    fn create(&mut self, ids: Vec<Id>, infos: Vec<TypeInfo>) -> TableId {
        let id = TableId::from_raw(self.tables.len() as u64);
        tracing::debug!(?id, ids = ?ids, "created table");
        self.by_type.insert(ids.clone(), id);
        self.tables.push(Table::new(id, ids, infos));
        id
    }

    /// The table for the exact id set `ids`, creating it if it does not
    /// exist yet. Creation registers the table with every id's index record
    /// (keep-alive and table cache) and allocates columns for the ids that
    /// carry non-zero-size type metadata.
    ///
    /// `ids` must be sorted and duplicate-free.
    pub fn get_or_create(&mut self, ids: &[Id], index: &mut IdIndex) -> TableId {
        if let Some(&existing) = self.by_type.get(ids) {
            return existing;
        }
        let table_id = TableId::from_raw(self.tables.len() as u64);
        let mut infos = Vec::new();
        for &id in ids {
            index.get_or_create(id);
            index.inc_keep_alive(id, table_id);
            if let Some(info) = index.get(id).and_then(|record| record.type_info()) {
                if info.size > 0 {
                    infos.push(info.clone());
                }
            }
        }
        self.create(ids.to_vec(), infos)
    }

    /// Look up a table by the exact id set defining it.
    pub fn find_by_type(&self, ids: &[Id]) -> Option<TableId> {
        self.by_type.get(ids).copied()
    }

    /// The table with `id`, or `None` if no such table exists.
    pub fn get(&self, id: TableId) -> Option<&Table> {
        self.tables.get(id.index())
    }

    /// Whether a table with `id` exists.
    pub fn contains(&self, id: TableId) -> bool {
        id.index() < self.tables.len()
    }

    /// The table with `id`.
    ///
    /// # Panics
    ///
    /// Panics if the id is unknown; internal callers hold ids obtained from
    /// this store, so a miss is a bug.
    pub(crate) fn table(&self, id: TableId) -> &Table {
        &self.tables[id.index()]
    }

    pub(crate) fn table_mut(&mut self, id: TableId) -> &mut Table {
        &mut self.tables[id.index()]
    }

    /// Mutable access to two distinct tables at once, as needed when moving
    /// a row between them.
    pub(crate) fn pair_mut(&mut self, a: TableId, b: TableId) -> (&mut Table, &mut Table) {
        assert_ne!(a, b, "pair_mut requires distinct tables");
        let (low, high, flipped) = if a.index() < b.index() {
            (a.index(), b.index(), false)
        } else {
            (b.index(), a.index(), true)
        };
        let (head, tail) = self.tables.split_at_mut(high);
        let (first, second) = (&mut head[low], &mut tail[0]);
        if flipped {
            (second, first)
        } else {
            (first, second)
        }
    }

    /// The root table.
    pub fn root(&self) -> &Table {
        self.table(Self::ROOT)
    }

    pub(crate) fn root_mut(&mut self) -> &mut Table {
        self.table_mut(Self::ROOT)
    }

    /// Number of existing tables (root included).
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Always `false`: the root table exists from construction.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Iterate all tables in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }

    /// Snapshot of all table ids. The copy stays valid across structural
    /// mutations, which is what callers that mutate while iterating need.
    pub fn ids(&self) -> Vec<TableId> {
        self.tables.iter().map(|table| table.id()).collect()
    }
}

impl Default for TableStore {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
