//! Table (archetype) storage.
//!
//! A [`Table`] stores every entity that shares one exact, sorted,
//! duplicate-free set of component/tag ids. Component values are laid out in
//! a Structure-of-Arrays pattern: one [`Column`] per id with non-zero-size
//! type metadata, plus a parallel `Vec<Entity>` mapping row index to entity.
//! Tags and zero-size types join the table's type but get no column.
//!
//! Row removal is swap-and-pop: the last row is moved into the vacated slot
//! and the displaced entity is reported to the caller as a return value, so
//! this module never needs a reference back to the entity directory.
//!
//! # Safety
//!
//! Component data lives in type-erased byte buffers. Soundness rests on two
//! facts maintained here and in the world: every column operation uses the
//! [`TypeInfo`] the column was created with, and typed access verifies the
//! Rust `TypeId` before casting.

use crate::component::TypeInfo;
use crate::entity::Entity;
use crate::graph::GraphEdges;
use crate::id::Id;

use serde::{Deserialize, Serialize};
use std::alloc::{self, Layout};
use std::any::TypeId;
use std::fmt;
use std::ptr;

// ---------------------------------------------------------------------------
// TableId
// ---------------------------------------------------------------------------

/// Identifies a table. Assigned densely in creation order; `0` is the root.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId(u64);

impl TableId {
    /// Construct from a raw `u64` value.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw `u64` value.
    #[inline]
    pub const fn to_raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Column -- type-erased component storage
// ---------------------------------------------------------------------------

/// A densely packed, type-erased array of component values of one type.
///
/// Columns are only created for types with non-zero size, which keeps the
/// buffer management free of zero-size special cases.
pub struct Column {
    /// Heap allocation; null while capacity is zero.
    data: *mut u8,
    /// Live elements.
    len: usize,
    /// Elements the current allocation can hold.
    capacity: usize,
    item_size: usize,
    item_align: usize,
}

// The column holds raw bytes of types bounded `Send + Sync` at registration.
unsafe impl Send for Column {}
unsafe impl Sync for Column {}

impl Column {
    /// Create an empty column for the type described by `info`.
    pub(crate) fn new(info: &TypeInfo) -> Self {
        debug_assert!(info.size > 0, "zero-size types do not get columns");
        Self {
            data: ptr::null_mut(),
            len: 0,
            capacity: 0,
            item_size: info.size,
            item_align: info.align,
        }
    }

    /// Number of stored values.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the column holds no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn layout_for(&self, capacity: usize) -> Layout {
        Layout::from_size_align(self.item_size * capacity, self.item_align)
            .expect("column layout overflow")
    }

    /// Make room for one more element.
    fn reserve_one(&mut self) {
        if self.len < self.capacity {
            return;
        }
        let new_capacity = if self.capacity == 0 {
            4
        } else {
            self.capacity * 2
        };
        let new_layout = self.layout_for(new_capacity);
        let new_data = unsafe {
            if self.capacity == 0 {
                alloc::alloc(new_layout)
            } else {
                alloc::realloc(self.data, self.layout_for(self.capacity), new_layout.size())
            }
        };
        assert!(!new_data.is_null(), "column allocation failed");
        self.data = new_data;
        self.capacity = new_capacity;
    }

    /// Pointer to the value at `row`. Dereferencing it is on the caller.
    #[inline]
    fn ptr_at(&self, row: usize) -> *mut u8 {
        debug_assert!(row < self.len);
        unsafe { self.data.add(row * self.item_size) }
    }

    /// Append a default-constructed value.
    ///
    /// # Safety
    ///
    /// `info` must describe the type this column was created with.
    pub(crate) unsafe fn push_default(&mut self, info: &TypeInfo) {
        self.reserve_one();
        (info.vtable.default_fn)(self.data.add(self.len * self.item_size));
        self.len += 1;
    }

    /// Move the value at `row` onto the end of `dst`, then close the gap
    /// here by moving the last value into `row`. Nothing is dropped.
    ///
    /// # Safety
    ///
    /// `row` must be in bounds and `dst` must be a column of the same type.
    pub(crate) unsafe fn transfer(&mut self, row: usize, dst: &mut Column) {
        debug_assert!(row < self.len);
        debug_assert_eq!(self.item_size, dst.item_size);
        dst.reserve_one();
        ptr::copy_nonoverlapping(
            self.ptr_at(row),
            dst.data.add(dst.len * dst.item_size),
            self.item_size,
        );
        dst.len += 1;
        let last = self.len - 1;
        if row < last {
            ptr::copy_nonoverlapping(
                self.ptr_at(last),
                self.data.add(row * self.item_size),
                self.item_size,
            );
        }
        self.len -= 1;
    }

    /// Drop the value at `row` and move the last value into its place.
    ///
    /// # Safety
    ///
    /// `row` must be in bounds; `info` must describe the column's type.
    pub(crate) unsafe fn swap_remove(&mut self, row: usize, info: &TypeInfo) {
        debug_assert!(row < self.len);
        (info.vtable.drop_fn)(self.ptr_at(row));
        let last = self.len - 1;
        if row < last {
            ptr::copy_nonoverlapping(
                self.ptr_at(last),
                self.data.add(row * self.item_size),
                self.item_size,
            );
        }
        self.len -= 1;
    }

    /// Drop all remaining values and release the allocation.
    ///
    /// # Safety
    ///
    /// `info` must describe the column's type.
    pub(crate) unsafe fn drop_all(&mut self, info: &TypeInfo) {
        for row in 0..self.len {
            (info.vtable.drop_fn)(self.ptr_at(row));
        }
        if self.capacity > 0 {
            alloc::dealloc(self.data, self.layout_for(self.capacity));
        }
        self.data = ptr::null_mut();
        self.len = 0;
        self.capacity = 0;
    }

    /// Raw pointer to the value at `row`.
    pub(crate) fn value_ptr(&self, row: usize) -> *const u8 {
        self.ptr_at(row)
    }

    /// Raw mutable pointer to the value at `row`.
    pub(crate) fn value_ptr_mut(&mut self, row: usize) -> *mut u8 {
        self.ptr_at(row)
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .field("item_size", &self.item_size)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// A column plus the metadata needed to operate on its contents.
#[derive(Debug)]
pub(crate) struct ColumnEntry {
    pub(crate) column: Column,
    pub(crate) info: TypeInfo,
}

/// Storage for all entities sharing one exact component/tag set.
pub struct Table {
    id: TableId,
    /// The table's type: sorted, duplicate-free ids, tags included.
    ids: Vec<Id>,
    /// One column per id with non-zero-size metadata, sorted by id.
    columns: Vec<(Id, ColumnEntry)>,
    /// Row index -> entity. Row `i` of every column belongs to `entities[i]`.
    entities: Vec<Entity>,
    /// Memoized transitions out of this table.
    edges: GraphEdges,
}

impl Table {
    /// Create an empty table.
    ///
    /// `ids` must be sorted and duplicate-free. `column_infos` must hold the
    /// metadata of exactly the ids in `ids` that have non-zero size.
    pub(crate) fn new(id: TableId, ids: Vec<Id>, column_infos: Vec<TypeInfo>) -> Self {
        debug_assert!(ids.windows(2).all(|w| w[0] < w[1]), "type must be sorted and distinct");
        debug_assert!(column_infos.iter().all(|info| ids.contains(&info.id)));

        let mut columns: Vec<(Id, ColumnEntry)> = column_infos
            .into_iter()
            .map(|info| {
                (
                    info.id,
                    ColumnEntry {
                        column: Column::new(&info),
                        info,
                    },
                )
            })
            .collect();
        columns.sort_by_key(|(id, _)| *id);

        Self {
            id,
            ids,
            columns,
            entities: Vec::new(),
            edges: GraphEdges::new(),
        }
    }

    /// The table's id.
    #[inline]
    pub fn id(&self) -> TableId {
        self.id
    }

    /// The sorted id set defining this table.
    #[inline]
    pub fn ids(&self) -> &[Id] {
        &self.ids
    }

    /// Whether `id` is part of this table's type.
    #[inline]
    pub fn has_id(&self, id: Id) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    /// Number of rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the table has no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// The entities occupying each row.
    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Number of storage columns (ids with values; tags excluded).
    #[inline]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// The memoized transitions out of this table.
    #[inline]
    pub fn edges(&self) -> &GraphEdges {
        &self.edges
    }

    #[inline]
    pub(crate) fn edges_mut(&mut self) -> &mut GraphEdges {
        &mut self.edges
    }

    fn column_position(&self, id: Id) -> Option<usize> {
        self.columns.binary_search_by_key(&id, |(id, _)| *id).ok()
    }

    pub(crate) fn column_entry(&self, id: Id) -> Option<&ColumnEntry> {
        self.column_position(id).map(|pos| &self.columns[pos].1)
    }

    /// Metadata of the column storing `id`, if `id` has storage here.
    pub fn column_type_info(&self, id: Id) -> Option<&TypeInfo> {
        self.column_entry(id).map(|entry| &entry.info)
    }

    /// Append a row for `entity`; every column gets a default-constructed
    /// value. Returns the new row index.
    pub(crate) fn push_entity(&mut self, entity: Entity) -> usize {
        let row = self.entities.len();
        self.entities.push(entity);
        for (_, entry) in &mut self.columns {
            // Safety: the entry's info is the one its column was created with.
            unsafe { entry.column.push_default(&entry.info) };
        }
        row
    }

    /// Remove the row at `row`, dropping its component values. The last row
    /// is swapped into the gap; the entity that moved is returned so the
    /// caller can update the directory.
    pub(crate) fn remove_row(&mut self, row: usize) -> Option<Entity> {
        let last = self.entities.len() - 1;
        self.entities.swap_remove(row);
        for (_, entry) in &mut self.columns {
            // Safety: row is in bounds for every column; info matches.
            unsafe { entry.column.swap_remove(row, &entry.info) };
        }
        if row < last {
            Some(self.entities[row])
        } else {
            None
        }
    }

    /// Move the row at `row` into `dst`, preserving the values of every id
    /// the two types share, default-constructing columns only `dst` has, and
    /// dropping values for ids only this table has.
    ///
    /// Returns `(new_row_in_dst, entity_swapped_into_row)`.
    pub(crate) fn move_row_to(
        &mut self,
        row: usize,
        entity: Entity,
        dst: &mut Table,
    ) -> (usize, Option<Entity>) {
        debug_assert!(row < self.entities.len());
        debug_assert_eq!(self.entities[row], entity, "row does not hold the entity being moved");

        let new_row = dst.entities.len();
        dst.entities.push(entity);
        for (id, dst_entry) in &mut dst.columns {
            match self.column_position(*id) {
                // Safety: shared columns store the same type; row in bounds.
                Some(pos) => unsafe {
                    self.columns[pos].1.column.transfer(row, &mut dst_entry.column);
                },
                // Safety: the entry's info matches its column.
                None => unsafe { dst_entry.column.push_default(&dst_entry.info) },
            }
        }
        // Columns whose id the destination lacks lose their value for this row.
        for (id, entry) in &mut self.columns {
            if dst.column_position(*id).is_none() {
                // Safety: transfer has not touched this column; row in bounds.
                unsafe { entry.column.swap_remove(row, &entry.info) };
            }
        }

        let last = self.entities.len() - 1;
        self.entities.swap_remove(row);
        let moved = if row < last {
            Some(self.entities[row])
        } else {
            None
        };
        (new_row, moved)
    }

    /// Raw pointer to the component value for `id` at `row`, or `None` if
    /// `id` has no column in this table (absent or tag) or `row` is out of
    /// bounds.
    pub fn component_ptr(&self, row: usize, id: Id) -> Option<*const u8> {
        let entry = self.column_entry(id)?;
        if row >= entry.column.len() {
            return None;
        }
        Some(entry.column.value_ptr(row))
    }

    /// Mutable variant of [`component_ptr`](Self::component_ptr).
    pub fn component_ptr_mut(&mut self, row: usize, id: Id) -> Option<*mut u8> {
        let pos = self.column_position(id)?;
        let entry = &mut self.columns[pos].1;
        if row >= entry.column.len() {
            return None;
        }
        Some(entry.column.value_ptr_mut(row))
    }

    /// Typed reference to the component value for `id` at `row`.
    ///
    /// Returns `None` if `id` has no column here, `row` is out of bounds, or
    /// `T` is not the type registered under `id`.
    pub fn get<T: 'static>(&self, row: usize, id: Id) -> Option<&T> {
        let entry = self.column_entry(id)?;
        if row >= entry.column.len() || entry.info.rust_type != TypeId::of::<T>() {
            return None;
        }
        // Safety: the TypeId check proves the column stores `T`; row is in
        // bounds; the borrow is tied to &self.
        unsafe { Some(&*(entry.column.value_ptr(row) as *const T)) }
    }

    /// Typed mutable reference to the component value for `id` at `row`.
    pub fn get_mut<T: 'static>(&mut self, row: usize, id: Id) -> Option<&mut T> {
        let pos = self.column_position(id)?;
        let entry = &mut self.columns[pos].1;
        if row >= entry.column.len() || entry.info.rust_type != TypeId::of::<T>() {
            return None;
        }
        // Safety: as in `get`, with exclusivity from &mut self.
        unsafe { Some(&mut *(entry.column.value_ptr_mut(row) as *mut T)) }
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        for (_, entry) in &mut self.columns {
            // Safety: the entry's info is the one its column was created with.
            unsafe { entry.column.drop_all(&entry.info) };
        }
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("id", &self.id)
            .field("ids", &self.ids)
            .field("rows", &self.entities.len())
            .field("columns", &self.columns.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Pos {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Default, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Label(String);

    fn entity(n: u32) -> Entity {
        Entity::new(n, 0)
    }

    fn pos_info(id: Id) -> TypeInfo {
        TypeInfo::new::<Pos>(id, "position")
    }

    fn label_info(id: Id) -> TypeInfo {
        TypeInfo::new::<Label>(id, "label")
    }

    #[test]
    fn push_default_constructs_values() {
        let pos_id = Id::from_raw(1);
        let mut table = Table::new(TableId::from_raw(1), vec![pos_id], vec![pos_info(pos_id)]);

        let row = table.push_entity(entity(0));
        assert_eq!(row, 0);
        assert_eq!(table.get::<Pos>(0, pos_id), Some(&Pos { x: 0.0, y: 0.0 }));
    }

    #[test]
    fn tags_join_type_without_storage() {
        let pos_id = Id::from_raw(1);
        let tag_id = Id::from_raw(2);
        let mut table = Table::new(
            TableId::from_raw(1),
            vec![pos_id, tag_id],
            vec![pos_info(pos_id)],
        );

        table.push_entity(entity(0));
        assert!(table.has_id(tag_id));
        assert_eq!(table.column_count(), 1);
        assert!(table.component_ptr(0, tag_id).is_none());
        assert!(table.component_ptr(0, pos_id).is_some());
    }

    #[test]
    fn component_ptr_is_none_for_absent_id() {
        let pos_id = Id::from_raw(1);
        let mut table = Table::new(TableId::from_raw(1), vec![pos_id], vec![pos_info(pos_id)]);
        table.push_entity(entity(0));
        assert!(table.component_ptr(0, Id::from_raw(99)).is_none());
        assert!(table.component_ptr(5, pos_id).is_none(), "row out of bounds");
    }

    #[test]
    fn typed_access_rejects_wrong_type() {
        let pos_id = Id::from_raw(1);
        let mut table = Table::new(TableId::from_raw(1), vec![pos_id], vec![pos_info(pos_id)]);
        table.push_entity(entity(0));
        assert!(table.get::<Label>(0, pos_id).is_none());
        assert!(table.get::<Pos>(0, pos_id).is_some());
    }

    #[test]
    fn swap_and_pop_reports_moved_entity() {
        let pos_id = Id::from_raw(1);
        let mut table = Table::new(TableId::from_raw(1), vec![pos_id], vec![pos_info(pos_id)]);
        let (a, b, c) = (entity(0), entity(1), entity(2));
        table.push_entity(a);
        table.push_entity(b);
        table.push_entity(c);
        table.get_mut::<Pos>(0, pos_id).unwrap().x = 10.0;
        table.get_mut::<Pos>(2, pos_id).unwrap().x = 30.0;

        // Removing the first row swaps the last one in.
        let moved = table.remove_row(0);
        assert_eq!(moved, Some(c));
        assert_eq!(table.entities(), &[c, b]);
        assert_eq!(table.get::<Pos>(0, pos_id).unwrap().x, 30.0);

        // Removing the last row needs no swap.
        let moved = table.remove_row(1);
        assert_eq!(moved, None);
        assert_eq!(table.entities(), &[c]);
    }

    #[test]
    fn move_row_preserves_shared_values() {
        let pos_id = Id::from_raw(1);
        let label_id = Id::from_raw(2);
        let mut src = Table::new(TableId::from_raw(1), vec![pos_id], vec![pos_info(pos_id)]);
        let mut dst = Table::new(
            TableId::from_raw(2),
            vec![pos_id, label_id],
            vec![pos_info(pos_id), label_info(label_id)],
        );

        let e = entity(0);
        src.push_entity(e);
        *src.get_mut::<Pos>(0, pos_id).unwrap() = Pos { x: 3.0, y: 4.0 };

        let (new_row, moved) = src.move_row_to(0, e, &mut dst);
        assert_eq!(new_row, 0);
        assert_eq!(moved, None);
        assert!(src.is_empty());
        assert_eq!(dst.get::<Pos>(0, pos_id), Some(&Pos { x: 3.0, y: 4.0 }));
        assert_eq!(dst.get::<Label>(0, label_id), Some(&Label(String::new())));
    }

    #[test]
    fn move_row_drops_values_the_destination_lacks() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        #[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
        struct Counted(u32);

        impl Drop for Counted {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::SeqCst);
            }
        }

        let counted_id = Id::from_raw(1);
        let info = TypeInfo::new::<Counted>(counted_id, "counted");
        let mut src = Table::new(TableId::from_raw(1), vec![counted_id], vec![info]);
        let mut dst = Table::new(TableId::from_raw(2), vec![], vec![]);

        let e = entity(0);
        src.push_entity(e);
        let before = DROPS.load(Ordering::SeqCst);
        src.move_row_to(0, e, &mut dst);
        assert_eq!(DROPS.load(Ordering::SeqCst), before + 1, "removed id's value dropped once");
        assert_eq!(dst.len(), 1);
    }

    #[test]
    fn row_alignment_survives_churn() {
        let pos_id = Id::from_raw(1);
        let label_id = Id::from_raw(2);
        let mut table = Table::new(
            TableId::from_raw(1),
            vec![pos_id, label_id],
            vec![pos_info(pos_id), label_info(label_id)],
        );

        for n in 0..8u32 {
            let row = table.push_entity(entity(n));
            *table.get_mut::<Pos>(row, pos_id).unwrap() = Pos { x: n as f32, y: 0.0 };
            *table.get_mut::<Label>(row, label_id).unwrap() = Label(format!("e{n}"));
        }
        table.remove_row(0);
        table.remove_row(3);
        table.remove_row(1);

        // Whatever the shuffle did, row i's values must belong to entities[i].
        for row in 0..table.len() {
            let n = table.entities()[row].index();
            assert_eq!(table.get::<Pos>(row, pos_id).unwrap().x, n as f32);
            assert_eq!(table.get::<Label>(row, label_id).unwrap().0, format!("e{n}"));
        }
    }
}
