//! Memoized transitions between tables.
//!
//! Every table owns a [`GraphEdges`]: for each id, the table reached by
//! adding that id and the table reached by removing it. An edge is computed
//! at most once per `(table, id, direction)` and reused on every later
//! traversal, which is what makes the table graph a deterministic,
//! content-addressed map independent of discovery order. Edges are keyed by
//! the same low/high dual-indexed [`IdMap`] as the id index.

use crate::id::{Id, IdMap};
use crate::table::TableId;

use serde::Serialize;

// ---------------------------------------------------------------------------
// EdgeDiff
// ---------------------------------------------------------------------------

/// The structural delta an edge applies: ids gained and ids lost relative to
/// the source table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeDiff {
    /// Ids present in the destination but not the source.
    pub added: Vec<Id>,
    /// Ids present in the source but not the destination.
    pub removed: Vec<Id>,
}

impl EdgeDiff {
    /// Diff of a single-id add edge.
    pub fn added(id: Id) -> Self {
        Self {
            added: vec![id],
            removed: Vec::new(),
        }
    }

    /// Diff of a single-id remove edge.
    pub fn removed(id: Id) -> Self {
        Self {
            added: Vec::new(),
            removed: vec![id],
        }
    }
}

// ---------------------------------------------------------------------------
// GraphEdge
// ---------------------------------------------------------------------------

/// A directional transition from one table to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    /// The table this edge leads to.
    pub to: TableId,
    /// The structural delta between source and destination.
    pub diff: EdgeDiff,
}

// ---------------------------------------------------------------------------
// GraphEdges
// ---------------------------------------------------------------------------

/// The add/remove edges cached on one table.
#[derive(Debug, Default)]
pub struct GraphEdges {
    add: IdMap<GraphEdge>,
    remove: IdMap<GraphEdge>,
}

impl GraphEdges {
    /// Create an empty edge set.
    pub fn new() -> Self {
        Self {
            add: IdMap::new(),
            remove: IdMap::new(),
        }
    }

    /// The memoized add edge for `id`, if one has been traversed.
    pub fn add_edge(&self, id: Id) -> Option<&GraphEdge> {
        self.add.get(id)
    }

    /// The memoized remove edge for `id`, if one has been traversed.
    pub fn remove_edge(&self, id: Id) -> Option<&GraphEdge> {
        self.remove.get(id)
    }

    /// Memoize the add edge for `id`. Later traversals reuse it.
    pub(crate) fn cache_add(&mut self, id: Id, edge: GraphEdge) {
        debug_assert!(self.add.get(id).is_none(), "add edge computed twice");
        self.add.insert(id, edge);
    }

    /// Memoize the remove edge for `id`.
    pub(crate) fn cache_remove(&mut self, id: Id, edge: GraphEdge) {
        debug_assert!(self.remove.get(id).is_none(), "remove edge computed twice");
        self.remove.insert(id, edge);
    }

    /// Iterate the add edges, low-id branch first.
    pub fn iter_add(&self) -> impl Iterator<Item = (Id, &GraphEdge)> {
        self.add.iter()
    }

    /// Iterate the remove edges, low-id branch first.
    pub fn iter_remove(&self) -> impl Iterator<Item = (Id, &GraphEdge)> {
        self.remove.iter()
    }

    /// Number of memoized add edges.
    pub fn add_count(&self) -> usize {
        self.add.len()
    }

    /// Number of memoized remove edges.
    pub fn remove_count(&self) -> usize {
        self.remove.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
