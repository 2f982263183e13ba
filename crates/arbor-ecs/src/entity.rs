//! Entity handles and the directory that tracks where each one lives.
//!
//! An [`Entity`] is a 64-bit handle packing a *generation* counter in the
//! high 32 bits and an *index* in the low 32 bits. Indices are recycled
//! through a FIFO free list with the generation bumped on every delete, so a
//! stale handle is detected the moment it is used.
//!
//! The [`EntityIndex`] is the single source of truth for liveness and for an
//! entity's current `(table, row)` location. Table storage reports row moves
//! back to callers as return values; callers publish them here.

use crate::table::TableId;

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A generational entity handle.
///
/// Layout: `[generation: u32 | index: u32]`
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity(u64);

impl Entity {
    /// Construct from an index and generation.
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    /// The index portion (low 32 bits).
    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// The generation portion (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstruct from a raw `u64`.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// EntityLocation
// ---------------------------------------------------------------------------

/// Where a live entity resides: which table, and which row within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityLocation {
    /// The table holding the entity's row.
    pub table: TableId,
    /// Row index within that table.
    pub row: usize,
}

// ---------------------------------------------------------------------------
// EntityIndex
// ---------------------------------------------------------------------------

/// One slot per entity index ever allocated.
#[derive(Debug)]
struct Slot {
    /// Current generation for this index. Bumped on every free.
    generation: u32,
    /// `Some` while the slot's entity is alive.
    location: Option<EntityLocation>,
}

/// The entity directory: allocates handles and tracks each live entity's
/// location.
///
/// Free indices are kept in a FIFO queue so generations spread across slots
/// instead of concentrating on a hot index.
#[derive(Debug, Default)]
pub struct EntityIndex {
    slots: Vec<Slot>,
    free: VecDeque<u32>,
}

impl EntityIndex {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: VecDeque::new(),
        }
    }

    /// Allocate a live entity at `location`.
    ///
    /// Recycled indices come back with the generation that was bumped when
    /// they were freed, so handles from the previous life stay stale.
    pub fn spawn(&mut self, location: EntityLocation) -> Entity {
        if let Some(index) = self.free.pop_front() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.location.is_none(), "free list held a live slot");
            slot.location = Some(location);
            Entity::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                location: Some(location),
            });
            Entity::new(index, 0)
        }
    }

    /// Free `entity`, returning the location it occupied.
    ///
    /// Returns `None` (a no-op) if the handle is stale or was never
    /// allocated. The generation is bumped so outstanding copies of the
    /// handle become stale immediately.
    pub fn free(&mut self, entity: Entity) -> Option<EntityLocation> {
        let index = entity.index() as usize;
        let slot = self.slots.get_mut(index)?;
        if slot.generation != entity.generation() {
            return None;
        }
        let location = slot.location.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push_back(entity.index());
        Some(location)
    }

    /// Whether `entity` refers to a currently live entity.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.index() as usize)
            .is_some_and(|slot| slot.generation == entity.generation() && slot.location.is_some())
    }

    /// The location of a live entity, or `None` for stale/unknown handles.
    pub fn location(&self, entity: Entity) -> Option<EntityLocation> {
        let slot = self.slots.get(entity.index() as usize)?;
        if slot.generation != entity.generation() {
            return None;
        }
        slot.location
    }

    /// Publish a new location for a live entity.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not alive; moving a dead entity is a bug in the
    /// storage logic, not a recoverable condition.
    pub fn set_location(&mut self, entity: Entity, location: EntityLocation) {
        let slot = self
            .slots
            .get_mut(entity.index() as usize)
            .expect("location update for unknown entity");
        assert!(
            slot.generation == entity.generation() && slot.location.is_some(),
            "location update for dead entity {entity:?}"
        );
        slot.location = Some(location);
    }

    /// Number of live entities.
    pub fn alive_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.location.is_some()).count()
    }

    /// Iterate all live entity handles.
    pub fn iter_alive(&self) -> impl Iterator<Item = Entity> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.location
                .map(|_| Entity::new(index as u32, slot.generation))
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
