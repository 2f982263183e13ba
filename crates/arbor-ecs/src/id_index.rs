//! The id index: one record per distinct id ever referenced as a component
//! or tag.
//!
//! A record carries optional type metadata (absent for pure tags), a
//! keep-alive count of how many existing tables include the id, and a cache
//! of those tables. Records are created lazily on first use and retained
//! forever: dropping the keep-alive count to zero keeps the record in place
//! so the metadata stays warm for later table creation. Lookups never fail;
//! a never-seen id is simply "not found".

use crate::component::TypeInfo;
use crate::id::{Id, IdMap};
use crate::table::TableId;

// ---------------------------------------------------------------------------
// IdRecord
// ---------------------------------------------------------------------------

/// Everything the engine knows about one id.
#[derive(Debug)]
pub struct IdRecord {
    id: Id,
    /// Component metadata; `None` for pure tags.
    type_info: Option<TypeInfo>,
    /// Number of existing tables whose type includes this id.
    keep_alive: u32,
    /// The tables counted by `keep_alive`, in creation order.
    tables: Vec<TableId>,
}

impl IdRecord {
    fn new(id: Id) -> Self {
        Self {
            id,
            type_info: None,
            keep_alive: 0,
            tables: Vec::new(),
        }
    }

    /// The id this record describes.
    #[inline]
    pub fn id(&self) -> Id {
        self.id
    }

    /// Component metadata, if the id names a registered type.
    #[inline]
    pub fn type_info(&self) -> Option<&TypeInfo> {
        self.type_info.as_ref()
    }

    /// Registered name, if any.
    pub fn name(&self) -> Option<&str> {
        self.type_info.as_ref().map(|info| info.name.as_str())
    }

    /// Number of existing tables that include this id.
    #[inline]
    pub fn keep_alive(&self) -> u32 {
        self.keep_alive
    }

    /// Tables that include this id.
    #[inline]
    pub fn tables(&self) -> &[TableId] {
        &self.tables
    }
}

// ---------------------------------------------------------------------------
// IdIndex
// ---------------------------------------------------------------------------

/// Maps every referenced id to its [`IdRecord`].
///
/// Built on [`IdMap`], so low ids are array-indexed and high ids hash-mapped
/// behind one contract. This component never fails; reads on unknown ids
/// return `None`.
#[derive(Debug, Default)]
pub struct IdIndex {
    records: IdMap<IdRecord>,
}

impl IdIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            records: IdMap::new(),
        }
    }

    /// The record for `id`, or `None` if the id has never been referenced.
    pub fn get(&self, id: Id) -> Option<&IdRecord> {
        self.records.get(id)
    }

    /// The record for `id`, created empty (tag-like) if absent.
    pub fn get_or_create(&mut self, id: Id) -> &mut IdRecord {
        self.records.get_or_insert_with(id, || IdRecord::new(id))
    }

    /// Attach component metadata to `id`'s record, creating it if needed.
    pub(crate) fn attach_type_info(&mut self, id: Id, info: TypeInfo) {
        let record = self.get_or_create(id);
        debug_assert!(
            record.type_info.is_none() || record.type_info.as_ref().is_some_and(|t| t.rust_type == info.rust_type),
            "id {id:?} re-registered with a different type"
        );
        record.type_info = Some(info);
    }

    /// Record that a new table includes `id`.
    pub fn inc_keep_alive(&mut self, id: Id, table: TableId) {
        let record = self.get_or_create(id);
        record.keep_alive += 1;
        record.tables.push(table);
    }

    /// Record that a table including `id` was destroyed. Saturates at zero;
    /// the record itself is never purged.
    pub fn dec_keep_alive(&mut self, id: Id, table: TableId) {
        if let Some(record) = self.records.get_mut(id) {
            record.keep_alive = record.keep_alive.saturating_sub(1);
            record.tables.retain(|t| *t != table);
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no id has been referenced yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in the array-indexed (low) branch, ascending by id.
    pub fn iter_low_records(&self) -> impl Iterator<Item = &IdRecord> {
        self.records.iter_low().map(|(_, record)| record)
    }

    /// Records in the map-keyed (high) branch. Order is unspecified.
    pub fn iter_high_records(&self) -> impl Iterator<Item = &IdRecord> {
        self.records.iter_high().map(|(_, record)| record)
    }

    /// All records, low branch first.
    pub fn iter_records(&self) -> impl Iterator<Item = &IdRecord> {
        self.records.iter().map(|(_, record)| record)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::HI_ID_THRESHOLD;

    #[test]
    fn unknown_id_reads_as_none() {
        let index = IdIndex::new();
        assert!(index.get(Id::from_raw(5)).is_none());
        assert!(index.get(Id::from_raw(HI_ID_THRESHOLD + 5)).is_none());
    }

    #[test]
    fn record_created_on_first_use() {
        let mut index = IdIndex::new();
        let id = Id::from_raw(9);
        index.get_or_create(id);

        let record = index.get(id).unwrap();
        assert_eq!(record.id(), id);
        assert!(record.type_info().is_none(), "bare use makes a pure tag");
        assert_eq!(record.keep_alive(), 0);
    }

    #[test]
    fn keep_alive_tracks_tables() {
        let mut index = IdIndex::new();
        let id = Id::from_raw(400);
        let (t1, t2) = (TableId::from_raw(1), TableId::from_raw(2));

        index.inc_keep_alive(id, t1);
        index.inc_keep_alive(id, t2);
        let record = index.get(id).unwrap();
        assert_eq!(record.keep_alive(), 2);
        assert_eq!(record.tables(), &[t1, t2]);

        index.dec_keep_alive(id, t1);
        let record = index.get(id).unwrap();
        assert_eq!(record.keep_alive(), 1);
        assert_eq!(record.tables(), &[t2]);
    }

    #[test]
    fn records_survive_at_zero_keep_alive() {
        let mut index = IdIndex::new();
        let id = Id::from_raw(3);
        let table = TableId::from_raw(7);

        index.inc_keep_alive(id, table);
        index.dec_keep_alive(id, table);
        // Retention policy: the record stays, empty.
        let record = index.get(id).expect("record retained at zero count");
        assert_eq!(record.keep_alive(), 0);
        assert!(record.tables().is_empty());

        // Further decrements saturate rather than underflow.
        index.dec_keep_alive(id, table);
        assert_eq!(index.get(id).unwrap().keep_alive(), 0);
    }

    #[test]
    fn low_and_high_enumeration_split() {
        let mut index = IdIndex::new();
        index.get_or_create(Id::from_raw(1));
        index.get_or_create(Id::from_raw(2));
        index.get_or_create(Id::from_raw(HI_ID_THRESHOLD * 4));

        assert_eq!(index.iter_low_records().count(), 2);
        assert_eq!(index.iter_high_records().count(), 1);
        assert_eq!(index.iter_records().count(), 3);
    }
}
