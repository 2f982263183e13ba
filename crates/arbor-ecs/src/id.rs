//! Component/tag identifiers and the id-keyed map that backs every per-id
//! lookup structure in the engine.
//!
//! Ids live in a single 64-bit namespace. Ids below [`HI_ID_THRESHOLD`] are
//! served from a fixed-size array indexed directly by the id; ids at or above
//! the threshold are served from a hash map. [`IdMap`] hides the split behind
//! one contract, so callers never know which branch answered a lookup. The
//! only deliberate exceptions are the [`iter_low`](IdMap::iter_low) /
//! [`iter_high`](IdMap::iter_high) views, which inspector UIs use to render
//! the two branches separately.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Ids below this value are array-indexed; ids at or above it are map-keyed.
pub const HI_ID_THRESHOLD: u64 = 256;

// ---------------------------------------------------------------------------
// Id
// ---------------------------------------------------------------------------

/// Identifies a component type or tag within the engine's 64-bit id namespace.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id(u64);

impl Id {
    /// Construct an `Id` from its raw `u64` value.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw `u64` value.
    #[inline]
    pub const fn to_raw(self) -> u64 {
        self.0
    }

    /// Whether this id falls in the array-indexed range.
    #[inline]
    pub const fn is_low(self) -> bool {
        self.0 < HI_ID_THRESHOLD
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.0)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// IdMap
// ---------------------------------------------------------------------------

/// A map keyed by [`Id`] with two interchangeable backing strategies.
///
/// Low ids index straight into a fixed-size slot array; high ids go through a
/// `HashMap`. Both branches expose the identical read/write contract, chosen
/// per call by the threshold predicate. This is the one id-keyed container in
/// the crate: the id index uses it for records, and every table uses it for
/// its graph edges.
pub struct IdMap<T> {
    /// Slot per low id. Allocated once, length `HI_ID_THRESHOLD`.
    low: Box<[Option<T>]>,
    /// High ids, keyed by raw value.
    high: HashMap<u64, T>,
    /// Number of occupied entries across both branches.
    len: usize,
}

impl<T> IdMap<T> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            low: (0..HI_ID_THRESHOLD).map(|_| None).collect(),
            high: HashMap::new(),
            len: 0,
        }
    }

    /// Number of occupied entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the map holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Look up the entry for `id`. Never fails; a never-seen id is `None`.
    pub fn get(&self, id: Id) -> Option<&T> {
        if id.is_low() {
            self.low[id.to_raw() as usize].as_ref()
        } else {
            self.high.get(&id.to_raw())
        }
    }

    /// Mutable lookup.
    pub fn get_mut(&mut self, id: Id) -> Option<&mut T> {
        if id.is_low() {
            self.low[id.to_raw() as usize].as_mut()
        } else {
            self.high.get_mut(&id.to_raw())
        }
    }

    /// Whether `id` has an entry.
    pub fn contains(&self, id: Id) -> bool {
        self.get(id).is_some()
    }

    /// Insert an entry for `id`, returning the previous value if any.
    pub fn insert(&mut self, id: Id, value: T) -> Option<T> {
        let previous = if id.is_low() {
            self.low[id.to_raw() as usize].replace(value)
        } else {
            self.high.insert(id.to_raw(), value)
        };
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    /// Remove the entry for `id`, returning it if present.
    pub fn remove(&mut self, id: Id) -> Option<T> {
        let removed = if id.is_low() {
            self.low[id.to_raw() as usize].take()
        } else {
            self.high.remove(&id.to_raw())
        };
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Get the entry for `id`, inserting the result of `make` if absent.
    pub fn get_or_insert_with(&mut self, id: Id, make: impl FnOnce() -> T) -> &mut T {
        if id.is_low() {
            let slot = &mut self.low[id.to_raw() as usize];
            if slot.is_none() {
                *slot = Some(make());
                self.len += 1;
            }
            slot.as_mut().expect("slot was just filled")
        } else {
            let high = &mut self.high;
            if !high.contains_key(&id.to_raw()) {
                high.insert(id.to_raw(), make());
                self.len += 1;
            }
            high.get_mut(&id.to_raw()).expect("key was just inserted")
        }
    }

    /// Iterate the array-indexed branch in ascending id order.
    pub fn iter_low(&self) -> impl Iterator<Item = (Id, &T)> {
        self.low
            .iter()
            .enumerate()
            .filter_map(|(raw, slot)| slot.as_ref().map(|v| (Id::from_raw(raw as u64), v)))
    }

    /// Iterate the map-keyed branch. Order is unspecified.
    pub fn iter_high(&self) -> impl Iterator<Item = (Id, &T)> {
        self.high.iter().map(|(raw, v)| (Id::from_raw(*raw), v))
    }

    /// Iterate all entries, low branch first.
    pub fn iter(&self) -> impl Iterator<Item = (Id, &T)> {
        self.iter_low().chain(self.iter_high())
    }
}

impl<T> Default for IdMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for IdMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_on_never_seen_id_is_none() {
        let map: IdMap<u32> = IdMap::new();
        assert_eq!(map.get(Id::from_raw(3)), None);
        assert_eq!(map.get(Id::from_raw(1_000_000)), None);
    }

    #[test]
    fn insert_and_get_both_branches() {
        let mut map = IdMap::new();
        map.insert(Id::from_raw(7), "low");
        map.insert(Id::from_raw(7_000), "high");

        assert_eq!(map.get(Id::from_raw(7)), Some(&"low"));
        assert_eq!(map.get(Id::from_raw(7_000)), Some(&"high"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn threshold_boundary() {
        let below = Id::from_raw(HI_ID_THRESHOLD - 1);
        let at = Id::from_raw(HI_ID_THRESHOLD);
        assert!(below.is_low());
        assert!(!at.is_low());

        let mut map = IdMap::new();
        map.insert(below, 1u8);
        map.insert(at, 2u8);
        assert_eq!(map.iter_low().count(), 1);
        assert_eq!(map.iter_high().count(), 1);
        assert_eq!(map.get(below), Some(&1));
        assert_eq!(map.get(at), Some(&2));
    }

    #[test]
    fn remove_updates_len() {
        let mut map = IdMap::new();
        map.insert(Id::from_raw(1), ());
        map.insert(Id::from_raw(500), ());
        assert_eq!(map.remove(Id::from_raw(1)), Some(()));
        assert_eq!(map.remove(Id::from_raw(1)), None);
        assert_eq!(map.remove(Id::from_raw(500)), Some(()));
        assert!(map.is_empty());
    }

    #[test]
    fn get_or_insert_with_is_lazy() {
        let mut map = IdMap::new();
        *map.get_or_insert_with(Id::from_raw(9), || 10) += 1;
        // Existing entry: the closure must not overwrite it.
        *map.get_or_insert_with(Id::from_raw(9), || 999) += 1;
        assert_eq!(map.get(Id::from_raw(9)), Some(&12));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn identical_contract_across_branches() {
        // The same call sequence against a low and a high id must produce
        // the same observable results.
        let ids = [Id::from_raw(42), Id::from_raw(42 + HI_ID_THRESHOLD)];
        for id in ids {
            let mut map = IdMap::new();
            assert_eq!(map.get(id), None);
            assert!(!map.contains(id));
            assert_eq!(map.insert(id, 1u32), None);
            assert!(map.contains(id));
            assert_eq!(map.insert(id, 2u32), Some(1));
            *map.get_mut(id).unwrap() += 1;
            assert_eq!(map.get(id), Some(&3));
            assert_eq!(map.remove(id), Some(3));
            assert!(map.is_empty());
        }
    }
}
